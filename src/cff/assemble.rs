//! Lay out a subset font as an `OutputList`.
//!
//! The output has a single font and its structures are written in this order: header, Name
//! INDEX, Top DICT INDEX, String INDEX, Global Subrs INDEX, charset, Encoding, FDSelect, FDArray,
//! Private DICTs each followed by their local Subrs, then the CharStrings INDEX.

use std::convert::TryFrom;

use super::output::{ItemId, OffsetEncoding, OutputList};
use super::subset::{promote_strings, PromotedStrings, RebuiltIndices};
use super::{write_index, CFFVariant, Charset, Encoding, Font, Operand, Operator, CFF};
use crate::binary::write::{WriteBinary, WriteBuffer, WriteContext};
use crate::error::WriteError;

/// Top DICT entries that point at structures whose position changes. They are written separately.
const RELOCATED_TOP_DICT_OPERATORS: &[Operator] = &[
    Operator::CharStrings,
    Operator::Charset,
    Operator::Encoding,
    Operator::Private,
    Operator::FDArray,
    Operator::FDSelect,
];

/// A rebuilt Private DICT along with its local subroutines.
struct PrivateLayout {
    /// Entries of the Private DICT, excluding Subrs.
    dict: Vec<u8>,
    local_subrs: Option<Vec<u8>>,
}

/// Offsets in the Top DICT that are resolved once the structure they point at is placed.
struct TopDictOffsets {
    charset: Option<ItemId>,
    encoding: Option<ItemId>,
    private: Option<ItemId>,
    fd_array: Option<ItemId>,
    fd_select: Option<ItemId>,
    char_strings: ItemId,
}

impl PrivateLayout {
    /// Size of the Private DICT including the Subrs entry.
    fn size(&self) -> usize {
        match self.local_subrs {
            // 5 byte offset and the operator
            Some(_) => self.dict.len() + 6,
            None => self.dict.len(),
        }
    }
}

/// Assemble `font` with the rebuilt INDEXes into a CFF FontSet holding only that font.
///
/// When `promote` is set a non-CID font is converted to a CID-keyed font with a single Font
/// DICT covering every glyph.
pub fn assemble<'a>(
    cff: &CFF<'a>,
    font: &Font<'a>,
    rebuilt: RebuiltIndices,
    promote: bool,
) -> Result<Vec<u8>, WriteError> {
    if promote && font.is_cid_keyed() {
        return Err(WriteError::BadValue);
    }
    let promoted = if promote {
        Some(promote_strings(cff, font)?)
    } else {
        None
    };
    let cid_keyed = font.is_cid_keyed() || promote;

    let mut local_subrs = rebuilt.local_subrs.into_iter();
    let privates = (0..font.font_dict_count())
        .map(|font_dict| {
            let private_dict = font.private_dict(font_dict).ok_or(WriteError::BadValue)?;
            let mut buffer = WriteBuffer::new();
            private_dict.write_filtered(&mut buffer, &[Operator::Subrs])?;
            Ok(PrivateLayout {
                dict: buffer.into_inner(),
                local_subrs: local_subrs.next().flatten(),
            })
        })
        .collect::<Result<Vec<_>, WriteError>>()?;

    let mut out = OutputList::new(cff.data());

    // Header. A longer header is shortened to 4 bytes.
    if cff.header.hdr_size == 4 {
        out.range(0..4);
    } else {
        out.literal([cff.header.major, cff.header.minor, 4, cff.header.off_size]);
    }

    out.literal_with(|ctxt| write_index(ctxt, &[font.name]))?;

    // Top DICT INDEX with a single entry. The end offset is resolved after the DICT.
    out.literal([0, 1, 4, 0, 0, 0, 1]);
    let top_dict_end = out.offset(OffsetEncoding::Index(4));
    let top_dict_base = out.base();
    let offsets = write_top_dict(&mut out, font, promoted.as_ref(), &privates)?;
    out.marker(top_dict_end, Some(top_dict_base));

    match &promoted {
        Some(strings) => {
            out.literal(strings.string_index.clone());
        }
        None => {
            out.range(cff.string_index.range());
        }
    }

    out.literal(rebuilt.global_subrs);

    if let Some(charset) = offsets.charset {
        out.marker(charset, None);
        match (&font.charset, promote) {
            (_, true) => {
                out.literal(identity_charset(font.n_glyphs())?);
            }
            (Charset::Custom(custom), false) => {
                out.range(font.charset_offset..font.charset_offset + custom.size());
            }
            // Predefined charsets are written as operands
            (_, false) => return Err(WriteError::BadValue),
        }
    }

    if let (Some(encoding), CFFVariant::Type1(type1)) = (offsets.encoding, &font.data) {
        out.marker(encoding, None);
        match &type1.encoding {
            Encoding::Custom(custom) => {
                out.range(type1.encoding_offset..type1.encoding_offset + custom.size());
            }
            Encoding::Standard | Encoding::Expert => return Err(WriteError::BadValue),
        }
    }

    if let Some(fd_select) = offsets.fd_select {
        out.marker(fd_select, None);
        match &font.data {
            CFFVariant::CID(cid) => {
                out.range(cid.fd_select_offset..cid.fd_select_offset + cid.fd_select.size());
            }
            CFFVariant::Type1(_) => {
                out.literal(single_range_fd_select(font.n_glyphs())?);
            }
        }
    }

    let mut private_offsets = Vec::with_capacity(privates.len());
    if let Some(fd_array) = offsets.fd_array {
        out.marker(fd_array, None);
        private_offsets = write_fd_array(&mut out, font, promoted.as_ref(), &privates)?;
    } else if let Some(private) = offsets.private {
        private_offsets.push(private);
    }

    for (layout, private_offset) in privates.into_iter().zip(private_offsets) {
        out.marker(private_offset, None);
        let private_base = out.base();
        out.literal(layout.dict);
        if let Some(local_subrs) = layout.local_subrs {
            // Subrs is relative to the start of the Private DICT
            let subrs = dict_offset(&mut out, Operator::Subrs)?;
            out.marker(subrs, Some(private_base));
            out.literal(local_subrs);
        }
    }

    out.marker(offsets.char_strings, None);
    out.literal(rebuilt.char_strings);

    debug_assert!(cid_keyed == offsets.fd_array.is_some());
    out.assemble()
}

fn write_top_dict(
    out: &mut OutputList<'_>,
    font: &Font<'_>,
    promoted: Option<&PromotedStrings>,
    privates: &[PrivateLayout],
) -> Result<TopDictOffsets, WriteError> {
    // ROS must be the first entry of a CID-keyed font
    if let Some(strings) = promoted {
        out.literal_with(|ctxt| {
            write_entry(
                ctxt,
                &[
                    Operand::Offset(i32::from(strings.registry)),
                    Operand::Offset(i32::from(strings.ordering)),
                    Operand::Offset(0),
                ],
                Operator::ROS,
            )
        })?;
    }
    out.literal_with(|ctxt| font.top_dict.write_filtered(ctxt, RELOCATED_TOP_DICT_OPERATORS))?;
    if promoted.is_some() {
        let cid_count = i32::try_from(font.n_glyphs())?;
        out.literal_with(|ctxt| {
            write_entry(ctxt, &[Operand::Offset(cid_count)], Operator::CIDCount)
        })?;
    }

    let charset = match font.charset {
        Charset::Custom(_) => Some(dict_offset(out, Operator::Charset)?),
        _ if promoted.is_some() => Some(dict_offset(out, Operator::Charset)?),
        _ => {
            write_predefined(out, font.charset_offset, Operator::Charset)?;
            None
        }
    };

    let mut encoding = None;
    let mut private = None;
    let mut fd_array = None;
    let mut fd_select = None;
    match &font.data {
        CFFVariant::Type1(type1) if promoted.is_none() => {
            encoding = match type1.encoding {
                Encoding::Custom(_) => Some(dict_offset(out, Operator::Encoding)?),
                Encoding::Standard | Encoding::Expert => {
                    write_predefined(out, type1.encoding_offset, Operator::Encoding)?;
                    None
                }
            };
            let size = privates.first().ok_or(WriteError::BadValue)?.size();
            out.literal_with(|ctxt| Operand::write(ctxt, &Operand::Offset(i32::try_from(size)?)))?;
            private = Some(dict_offset(out, Operator::Private)?);
        }
        _ => {
            fd_array = Some(dict_offset(out, Operator::FDArray)?);
            fd_select = Some(dict_offset(out, Operator::FDSelect)?);
        }
    }
    let char_strings = dict_offset(out, Operator::CharStrings)?;

    Ok(TopDictOffsets {
        charset,
        encoding,
        private,
        fd_array,
        fd_select,
        char_strings,
    })
}

/// Write the FDArray INDEX, returning the Private DICT offset of each Font DICT.
fn write_fd_array(
    out: &mut OutputList<'_>,
    font: &Font<'_>,
    promoted: Option<&PromotedStrings>,
    privates: &[PrivateLayout],
) -> Result<Vec<ItemId>, WriteError> {
    let count = u16::try_from(privates.len())?;
    let [count_hi, count_lo] = count.to_be_bytes();
    out.literal([count_hi, count_lo, 4, 0, 0, 0, 1]);
    let ends = privates
        .iter()
        .map(|_| out.offset(OffsetEncoding::Index(4)))
        .collect::<Vec<_>>();
    let base = out.base();

    let mut private_offsets = Vec::with_capacity(privates.len());
    for (font_dict, (layout, end)) in privates.iter().zip(ends).enumerate() {
        match (&font.data, promoted) {
            (CFFVariant::CID(cid), _) => {
                let dict = cid.font_dicts.get(font_dict).ok_or(WriteError::BadValue)?;
                out.literal_with(|ctxt| dict.write_filtered(ctxt, &[Operator::Private]))?;
            }
            (CFFVariant::Type1(_), Some(strings)) => {
                let font_name = Operand::Offset(i32::from(strings.font_name));
                out.literal_with(|ctxt| write_entry(ctxt, &[font_name], Operator::FontName))?;
            }
            (CFFVariant::Type1(_), None) => return Err(WriteError::BadValue),
        }

        let size = i32::try_from(layout.size())?;
        out.literal_with(|ctxt| Operand::write(ctxt, &Operand::Offset(size)))?;
        private_offsets.push(dict_offset(out, Operator::Private)?);
        out.marker(end, Some(base));
    }

    Ok(private_offsets)
}

/// Push a DICT offset operand followed by `operator`, returning the offset to resolve.
fn dict_offset(out: &mut OutputList<'_>, operator: Operator) -> Result<ItemId, WriteError> {
    let offset = out.offset(OffsetEncoding::Dict);
    out.literal_with(|ctxt| Operator::write(ctxt, operator))?;
    Ok(offset)
}

fn write_predefined(
    out: &mut OutputList<'_>,
    id: usize,
    operator: Operator,
) -> Result<(), WriteError> {
    let id = Operand::Integer(i32::try_from(id)?);
    out.literal_with(|ctxt| write_entry(ctxt, &[id], operator))?;
    Ok(())
}

fn write_entry<C: WriteContext>(
    ctxt: &mut C,
    operands: &[Operand],
    operator: Operator,
) -> Result<(), WriteError> {
    for operand in operands {
        Operand::write(ctxt, operand)?;
    }
    Operator::write(ctxt, operator)
}

/// Charset format 2 mapping glyph 1 onwards to the same CID.
fn identity_charset(n_glyphs: usize) -> Result<Vec<u8>, WriteError> {
    match n_glyphs.checked_sub(2) {
        Some(n_left) => {
            let [hi, lo] = u16::try_from(n_left)?.to_be_bytes();
            Ok(vec![2, 0, 1, hi, lo])
        }
        // Only .notdef, which the charset omits
        None => Ok(vec![0]),
    }
}

/// FDSelect format 3 with one range assigning every glyph to Font DICT 0.
fn single_range_fd_select(n_glyphs: usize) -> Result<Vec<u8>, WriteError> {
    let [hi, lo] = u16::try_from(n_glyphs)?.to_be_bytes();
    Ok(vec![3, 0, 1, 0, 0, 0, hi, lo])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binary::read::ReadScope;
    use crate::cff::charstring::compute_used;
    use crate::cff::subset::rebuild_indices;
    use crate::cff::{read_dict_entries, FDSelect, Index};
    use crate::tests::{FontBuilder, FontSetBuilder};

    fn subset(data: &[u8], glyph_ids: &[u16], promote: bool) -> Vec<u8> {
        let cff = ReadScope::new(data).read::<CFF<'_>>().unwrap();
        let font = cff.font_at(0).unwrap();
        let usage = compute_used(&cff, &font, glyph_ids);
        let rebuilt = rebuild_indices(&cff, &font, &usage).unwrap();
        assemble(&cff, &font, rebuilt, promote).unwrap()
    }

    fn simple_font() -> FontSetBuilder {
        FontSetBuilder {
            fonts: vec![FontBuilder {
                name: String::from("Simple"),
                char_strings: vec![vec![14], vec![32, 10, 14], vec![33, 10, 14]],
                local_subrs: vec![vec![0x8b, 11], vec![0x8c, 11]],
                ..FontBuilder::default()
            }],
            ..FontSetBuilder::default()
        }
    }

    #[test]
    fn test_identity_charset() {
        assert_eq!(identity_charset(1).unwrap(), vec![0]);
        assert_eq!(identity_charset(2).unwrap(), vec![2, 0, 1, 0, 0]);
        assert_eq!(identity_charset(300).unwrap(), vec![2, 0, 1, 1, 42]);
    }

    #[test]
    fn test_promoted_layout() {
        let data = simple_font().build();
        let output = subset(&data, &[0, 1], true);

        let cff = ReadScope::new(&output).read::<CFF<'_>>().unwrap();
        assert_eq!(cff.header.hdr_size, 4);
        assert_eq!(cff.font_names().collect::<Vec<_>>(), vec![&b"Simple"[..]]);
        let font = cff.font_at(0).unwrap();
        assert!(font.is_cid_keyed());
        assert_eq!(font.top_dict.get_i32(Operator::CIDCount), Some(Ok(3)));
        assert!(font.top_dict.get(Operator::Encoding).is_none());
        assert!(font.top_dict.get(Operator::Private).is_none());

        // ROS is first
        let (operator, _) = font.top_dict.iter().next().unwrap();
        assert_eq!(*operator, Operator::ROS);

        match &font.data {
            CFFVariant::CID(cid) => {
                assert_eq!(cid.font_dict_index.count, 1);
                assert!(matches!(cid.fd_select, FDSelect::Format3 { sentinel: 3, .. }));
                let name_sid = cid.font_dicts[0].get_i32(Operator::FontName).unwrap().unwrap();
                assert_eq!(
                    cff.custom_string(name_sid as u16),
                    Some(&b"Simple-OneRange"[..])
                );
                assert_eq!(cid.private_dicts[0].get_i32(Operator::DefaultWidthX), Some(Ok(500)));
            }
            CFFVariant::Type1(_) => panic!("expected a CID-keyed font"),
        }

        let local_subrs = font.local_subr_index(0).unwrap();
        assert_eq!(local_subrs.iter().collect::<Vec<_>>(), vec![&[0x8b, 11][..], &[11][..]]);
    }

    #[test]
    fn test_unpromoted_layout() {
        let mut font_set = simple_font();
        font_set.fonts[0].custom_charset = true;
        font_set.fonts[0].custom_encoding = true;
        let data = font_set.build();
        let source = ReadScope::new(&data).read::<CFF<'_>>().unwrap();
        let source_font = source.font_at(0).unwrap();

        let output = subset(&data, &[2], false);
        let cff = ReadScope::new(&output).read::<CFF<'_>>().unwrap();
        let font = cff.font_at(0).unwrap();
        assert!(!font.is_cid_keyed());

        // The custom charset and encoding are copied unchanged
        let source_charset = source_font.charset_offset;
        let charset = font.charset_offset;
        assert_eq!(
            &output[charset..charset + 5],
            &data[source_charset..source_charset + 5]
        );
        match (&font.data, &source_font.data) {
            (CFFVariant::Type1(type1), CFFVariant::Type1(source_type1)) => {
                assert!(matches!(type1.encoding, Encoding::Custom(_)));
                assert_eq!(
                    &output[type1.encoding_offset..type1.encoding_offset + 4],
                    &data[source_type1.encoding_offset..source_type1.encoding_offset + 4]
                );

                // DefaultWidthX is re-encoded in 3 bytes and Subrs is relative to the rebuilt
                // Private DICT
                let private = type1.private_dict_offset;
                let entries =
                    read_dict_entries(&ReadScope::new(&output), private, private + 9).unwrap();
                assert_eq!(
                    entries,
                    vec![
                        (Operator::DefaultWidthX, vec![Operand::Integer(500)]),
                        (Operator::Subrs, vec![Operand::Integer(9)]),
                    ]
                );
                let local_subrs: &Index<'_> = type1.local_subr_index.as_ref().unwrap();
                assert_eq!(local_subrs.start(), private + 9);
                assert_eq!(
                    local_subrs.iter().collect::<Vec<_>>(),
                    vec![&[11][..], &[0x8c, 11][..]]
                );
            }
            _ => panic!("expected non-CID fonts"),
        }
    }

    #[test]
    fn test_long_header_is_shortened() {
        let mut font_set = simple_font();
        font_set.header_padding = 2;
        let data = font_set.build();
        assert_eq!(data[2], 6);

        let output = subset(&data, &[0], true);
        assert_eq!(&output[..4], &[1, 0, 4, 4]);
        assert!(ReadScope::new(&output).read::<CFF<'_>>().is_ok());
    }
}
