// Builders for synthetic CFF font programs.
//
// Every DICT integer is written in the 5 byte form and every INDEX uses 4 byte offsets, so the
// size of each structure doesn't depend on the offsets it contains. A FontSet is laid out twice,
// once to measure and once with the final offsets.

const OP_CHARSET: u8 = 15;
const OP_ENCODING: u8 = 16;
const OP_CHAR_STRINGS: u8 = 17;
const OP_PRIVATE: u8 = 18;
const OP_SUBRS: u8 = 19;
const OP_DEFAULT_WIDTH_X: u8 = 20;
const OP_ESCAPE: u8 = 12;
const OP_CHARSTRING_TYPE: u8 = 6;
const OP_ROS: u8 = 30;
const OP_FD_ARRAY: u8 = 36;
const OP_FD_SELECT: u8 = 37;

/// Number of standard strings predefined by CFF.
const STANDARD_STRINGS: u16 = 391;

/// Default width written to every Private DICT.
pub const DEFAULT_WIDTH: i32 = 500;

/// A CFF FontSet.
#[derive(Debug, Clone, Default)]
pub struct FontSetBuilder {
    pub fonts: Vec<FontBuilder>,
    pub global_subrs: Vec<Vec<u8>>,
    pub strings: Vec<String>,
    /// Extra bytes at the end of the header.
    pub header_padding: u8,
}

/// A font in a FontSet. CharStrings are Type 2 unless `charstring_type` says otherwise.
#[derive(Debug, Clone, Default)]
pub struct FontBuilder {
    pub name: String,
    pub char_strings: Vec<Vec<u8>>,
    /// Local subroutines of a non-CID font.
    pub local_subrs: Vec<Vec<u8>>,
    pub charstring_type: Option<i32>,
    pub cid: Option<CidBuilder>,
    /// Write a format 0 charset instead of using the ISOAdobe charset.
    pub custom_charset: bool,
    /// Write a format 0 encoding instead of using the Standard encoding.
    pub custom_encoding: bool,
}

/// The CID-keyed parts of a font.
#[derive(Debug, Clone, Default)]
pub struct CidBuilder {
    /// Local subroutines of each Font DICT. A Font DICT without subroutines has no Subrs entry.
    pub font_dict_subrs: Vec<Vec<Vec<u8>>>,
    /// `(first glyph, font dict)` ranges of a format 3 FDSelect. Empty assigns every glyph to
    /// Font DICT 0.
    pub fd_ranges: Vec<(u16, u8)>,
}

#[derive(Debug, Clone, Default)]
struct FontOffsets {
    charset: usize,
    encoding: usize,
    private: (usize, usize),
    fd_array: usize,
    fd_select: usize,
    char_strings: usize,
}

impl FontSetBuilder {
    pub fn build(&self) -> Vec<u8> {
        let mut strings = self
            .strings
            .iter()
            .map(|string| string.as_bytes().to_vec())
            .collect::<Vec<_>>();
        let ros = self
            .fonts
            .iter()
            .map(|font| {
                font.cid.as_ref().map(|_| {
                    let registry = string_id(&mut strings, b"Adobe");
                    let ordering = string_id(&mut strings, b"Identity");
                    (registry, ordering)
                })
            })
            .collect::<Vec<_>>();

        let mut header = vec![1, 0, 4 + self.header_padding, 4];
        header.resize(header.len() + usize::from(self.header_padding), 0);
        let name_index = index(
            &self
                .fonts
                .iter()
                .map(|font| font.name.as_bytes().to_vec())
                .collect::<Vec<_>>(),
        );
        let string_index = index(&strings);
        let global_subr_index = index(&self.global_subrs);

        let measure = self
            .fonts
            .iter()
            .zip(&ros)
            .map(|(font, ros)| font.top_dict(*ros, &FontOffsets::default()))
            .collect::<Vec<_>>();
        let mut position = header.len()
            + name_index.len()
            + index(&measure).len()
            + string_index.len()
            + global_subr_index.len();

        let mut top_dicts = Vec::with_capacity(self.fonts.len());
        let mut bodies = Vec::new();
        for (font, ros) in self.fonts.iter().zip(&ros) {
            let (body, offsets) = font.body(position);
            position += body.len();
            top_dicts.push(font.top_dict(*ros, &offsets));
            bodies.extend(body);
        }

        let mut data = header;
        data.extend(name_index);
        data.extend(index(&top_dicts));
        data.extend(string_index);
        data.extend(global_subr_index);
        data.extend(bodies);
        data
    }
}

impl FontBuilder {
    fn top_dict(&self, ros: Option<(u16, u16)>, offsets: &FontOffsets) -> Vec<u8> {
        let mut dict = Vec::new();
        if let Some((registry, ordering)) = ros {
            dict.extend(dict_int(i32::from(registry)));
            dict.extend(dict_int(i32::from(ordering)));
            dict.extend(dict_int(0));
            dict.extend([OP_ESCAPE, OP_ROS]);
        }
        if let Some(charstring_type) = self.charstring_type {
            dict.extend(dict_int(charstring_type));
            dict.extend([OP_ESCAPE, OP_CHARSTRING_TYPE]);
        }
        dict.extend(dict_int(offsets.charset as i32));
        dict.push(OP_CHARSET);
        if self.cid.is_some() {
            dict.extend(dict_int(offsets.fd_array as i32));
            dict.extend([OP_ESCAPE, OP_FD_ARRAY]);
            dict.extend(dict_int(offsets.fd_select as i32));
            dict.extend([OP_ESCAPE, OP_FD_SELECT]);
        } else {
            dict.extend(dict_int(offsets.encoding as i32));
            dict.push(OP_ENCODING);
            dict.extend(private_entry(offsets.private));
        }
        dict.extend(dict_int(offsets.char_strings as i32));
        dict.push(OP_CHAR_STRINGS);
        dict
    }

    /// Everything the Top DICT points at, placed at `start`.
    fn body(&self, start: usize) -> (Vec<u8>, FontOffsets) {
        let mut data = Vec::new();
        let mut offsets = FontOffsets::default();
        let n_glyphs = self.char_strings.len();

        match &self.cid {
            Some(cid) => {
                offsets.charset = start + data.len();
                data.extend(identity_charset(n_glyphs));

                offsets.fd_select = start + data.len();
                data.extend(fd_select(&cid.fd_ranges, n_glyphs));

                let font_dict_subrs = match cid.font_dict_subrs.is_empty() {
                    true => vec![Vec::new()],
                    false => cid.font_dict_subrs.clone(),
                };
                offsets.fd_array = start + data.len();
                let fd_array_len = index(&vec![private_entry((0, 0)); font_dict_subrs.len()]).len();

                let mut private_position = offsets.fd_array + fd_array_len;
                let mut font_dicts = Vec::with_capacity(font_dict_subrs.len());
                let mut privates = Vec::new();
                for subrs in &font_dict_subrs {
                    let (private, subrs) = private_dict(subrs);
                    font_dicts.push(private_entry((private.len(), private_position)));
                    private_position += private.len() + subrs.len();
                    privates.extend(private);
                    privates.extend(subrs);
                }
                data.extend(index(&font_dicts));
                data.extend(privates);
            }
            None => {
                if self.custom_charset {
                    offsets.charset = start + data.len();
                    data.push(0);
                    for sid in 1..n_glyphs as u16 {
                        data.extend(sid.to_be_bytes());
                    }
                }
                if self.custom_encoding {
                    offsets.encoding = start + data.len();
                    let n_codes = n_glyphs.saturating_sub(1) as u8;
                    data.extend([0, n_codes]);
                    data.extend(1..=n_codes);
                }
                let (private, subrs) = private_dict(&self.local_subrs);
                offsets.private = (private.len(), start + data.len());
                data.extend(private);
                data.extend(subrs);
            }
        }

        offsets.char_strings = start + data.len();
        data.extend(index(&self.char_strings));
        (data, offsets)
    }
}

/// A Private DICT with DefaultWidthX, and the INDEX of local subroutines that immediately
/// follows it if there are any.
fn private_dict(subrs: &[Vec<u8>]) -> (Vec<u8>, Vec<u8>) {
    let mut private = dict_int(DEFAULT_WIDTH).to_vec();
    private.push(OP_DEFAULT_WIDTH_X);
    if subrs.is_empty() {
        return (private, Vec::new());
    }
    private.extend(dict_int(12));
    private.push(OP_SUBRS);
    (private, index(subrs))
}

fn private_entry((size, offset): (usize, usize)) -> Vec<u8> {
    let mut entry = dict_int(size as i32).to_vec();
    entry.extend(dict_int(offset as i32));
    entry.push(OP_PRIVATE);
    entry
}

/// Format 2 charset mapping glyph `n` to CID `n`.
fn identity_charset(n_glyphs: usize) -> Vec<u8> {
    match n_glyphs.checked_sub(2) {
        Some(n_left) => {
            let mut charset = vec![2, 0, 1];
            charset.extend((n_left as u16).to_be_bytes());
            charset
        }
        None => vec![0],
    }
}

fn fd_select(ranges: &[(u16, u8)], n_glyphs: usize) -> Vec<u8> {
    let ranges = match ranges.is_empty() {
        true => &[(0, 0)][..],
        false => ranges,
    };
    let mut data = vec![3];
    data.extend((ranges.len() as u16).to_be_bytes());
    for (first, font_dict) in ranges {
        data.extend(first.to_be_bytes());
        data.push(*font_dict);
    }
    data.extend((n_glyphs as u16).to_be_bytes());
    data
}

fn string_id(strings: &mut Vec<Vec<u8>>, string: &[u8]) -> u16 {
    let position = match strings.iter().position(|candidate| candidate == string) {
        Some(position) => position,
        None => {
            strings.push(string.to_vec());
            strings.len() - 1
        }
    };
    STANDARD_STRINGS + position as u16
}

/// A DICT integer operand in its 5 byte form.
pub fn dict_int(value: i32) -> [u8; 5] {
    let [a, b, c, d] = value.to_be_bytes();
    [29, a, b, c, d]
}

/// An INDEX with 4 byte offsets.
pub fn index(objects: &[Vec<u8>]) -> Vec<u8> {
    let mut data = (objects.len() as u16).to_be_bytes().to_vec();
    if objects.is_empty() {
        return data;
    }

    data.push(4);
    let mut offset = 1u32;
    data.extend(offset.to_be_bytes());
    for object in objects {
        offset += object.len() as u32;
        data.extend(offset.to_be_bytes());
    }
    for object in objects {
        data.extend(object);
    }
    data
}
