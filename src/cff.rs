//! CFF font handling.
//!
//! Refer to [Technical Note #5176](http://wwwimages.adobe.com/content/dam/Adobe/en/devnet/font/pdfs/5176.CFF.pdf)
//! for more information.

use std::iter;
use std::marker::PhantomData;
use std::ops;

use byteorder::{BigEndian, ByteOrder};
use itertools::Itertools;
use lazy_static::lazy_static;
use num_traits as num;
use tinyvec::{tiny_vec, TinyVec};

use crate::binary::read::{ReadArray, ReadBinary, ReadBinaryDep, ReadCtxt, ReadFrom, ReadScope};
use crate::binary::write::{WriteBinary, WriteBuffer, WriteContext};
use crate::binary::{I16Be, I32Be, U16Be, U24Be, U32Be, U8};
use crate::error::{ParseError, SubsetError, WriteError};

pub mod assemble;
pub mod charstring;
pub mod output;
pub mod subset;

// Technical Note #5176: An operator may be preceded by up to a maximum of 48 operands.
const MAX_OPERANDS: usize = 48;
const END_OF_FLOAT_FLAG: u8 = 0xf;

const OPERAND_ZERO: [Operand; 1] = [Operand::Integer(0)];
const DEFAULT_UNDERLINE_POSITION: [Operand; 1] = [Operand::Integer(-100)];
const DEFAULT_UNDERLINE_THICKNESS: [Operand; 1] = [Operand::Integer(50)];
const DEFAULT_CHARSTRING_TYPE: [Operand; 1] = [Operand::Integer(2)];
lazy_static! {
    static ref DEFAULT_FONT_MATRIX: [Operand; 6] = {
        let real_0_001 = Operand::Real(Real(tiny_vec![0x0a, 0x00, 0x1f])); // 0.001
        [
            real_0_001.clone(),
            Operand::Integer(0),
            Operand::Integer(0),
            real_0_001,
            Operand::Integer(0),
            Operand::Integer(0),
        ]
    };
}
const DEFAULT_BBOX: [Operand; 4] = [
    Operand::Integer(0),
    Operand::Integer(0),
    Operand::Integer(0),
    Operand::Integer(0),
];
const DEFAULT_CID_COUNT: [Operand; 1] = [Operand::Integer(8720)];
const DEFAULT_BLUE_SHIFT: [Operand; 1] = [Operand::Integer(7)];
const DEFAULT_BLUE_FUZZ: [Operand; 1] = [Operand::Integer(1)];
lazy_static! {
    static ref DEFAULT_BLUE_SCALE: [Operand; 1] =
        [Operand::Real(Real(tiny_vec![0x0a, 0x03, 0x96, 0x25, 0xff]))]; // 0.039625
    static ref DEFAULT_EXPANSION_FACTOR: [Operand; 1] =
        [Operand::Real(Real(tiny_vec![0x0a, 0x06, 0xff]))]; // 0.06
}

/// SIDs below this value refer to the predefined standard strings, the rest index the String
/// INDEX.
pub const STANDARD_STRING_COUNT: usize = 391;
pub(crate) const ADOBE: &[u8] = b"Adobe";
pub(crate) const IDENTITY: &[u8] = b"Identity";

pub type SID = u16;

/// A CFF FontSet: the header and the INDEXes that are shared by every font in it.
///
/// Fonts are built on demand with `font` or `font_at`, a subsetting job only ever needs one.
///
/// Refer to Technical Note #5176
#[derive(Clone)]
pub struct CFF<'a> {
    scope: ReadScope<'a>,
    pub header: Header,
    pub name_index: Index<'a>,
    pub top_dict_index: Index<'a>,
    pub string_index: Index<'a>,
    pub global_subr_index: Index<'a>,
}

/// CFF Font Header described in Section 6 of Technical Note #5176
#[derive(Clone, Debug, PartialEq)]
pub struct Header {
    pub major: u8,
    pub minor: u8,
    pub hdr_size: u8,
    pub off_size: u8,
}

/// A CFF INDEX described in Section 5 of Technical Note #5176
///
/// Besides the objects themselves the INDEX records where it starts in the font program so that
/// each object can be located as an absolute byte range.
#[derive(Clone)]
pub struct Index<'a> {
    pub count: usize,
    off_size: u8,
    offset_array: &'a [u8],
    data_array: &'a [u8],
    start: usize,
}

/// A single font within a CFF FontSet
///
/// Offsets recorded here are positions within the CFF data.
#[derive(Clone)]
pub struct Font<'a> {
    /// Name of the font from the Name INDEX.
    pub name: &'a [u8],
    pub top_dict: TopDict,
    pub charstring_type: CharstringType,
    pub char_strings_index: Index<'a>,
    pub charset: Charset<'a>,
    /// The charset operand: a predefined charset id (0 to 2) or the offset of a custom charset.
    pub charset_offset: usize,
    pub data: CFFVariant<'a>,
}

/// The dialect of the charstrings in a font.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum CharstringType {
    Type1,
    Type2,
}

#[derive(Clone)]
pub enum CFFVariant<'a> {
    CID(CIDData<'a>),
    Type1(Type1Data<'a>),
}

#[derive(Clone)]
pub struct CIDData<'a> {
    pub font_dict_index: Index<'a>,
    pub font_dicts: Vec<FontDict>,
    pub private_dicts: Vec<PrivateDict>,
    pub local_subr_indices: Vec<Option<Index<'a>>>,
    pub fd_select: FDSelect<'a>,
    pub fd_select_offset: usize,
    /// Font DICT index of each glyph, expanded from `fd_select`.
    glyph_font_dicts: Vec<u8>,
}

#[derive(Clone)]
pub struct Type1Data<'a> {
    pub encoding: Encoding<'a>,
    /// The Encoding operand: a predefined encoding id (0 or 1) or the offset of a custom encoding.
    pub encoding_offset: usize,
    pub private_dict: PrivateDict,
    pub private_dict_offset: usize,
    pub local_subr_index: Option<Index<'a>>,
}

#[derive(Clone)]
pub enum Encoding<'a> {
    Standard,
    Expert,
    Custom(CustomEncoding<'a>),
}

#[derive(Clone)]
pub enum Charset<'a> {
    ISOAdobe,
    Expert,
    ExpertSubset,
    Custom(CustomCharset<'a>),
}

/// An encoding stored in the font. `supplements` is present when the high bit of the format
/// byte is set.
#[derive(Clone)]
pub enum CustomEncoding<'a> {
    Format0 {
        codes: ReadArray<'a, U8>,
        supplements: Option<ReadArray<'a, (U8, U16Be)>>,
    },
    Format1 {
        ranges: ReadArray<'a, Range<u8, u8>>,
        supplements: Option<ReadArray<'a, (U8, U16Be)>>,
    },
}

#[derive(Clone)]
pub enum CustomCharset<'a> {
    Format0 {
        glyphs: ReadArray<'a, U16Be>,
    },
    Format1 {
        ranges: ReadArray<'a, Range<SID, u8>>,
    },
    Format2 {
        ranges: ReadArray<'a, Range<SID, u16>>,
    },
}

/// A Range from `first` to `first + n_left`
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Range<F, N> {
    pub first: F,
    pub n_left: N,
}

/// A CFF DICT described in Section 4 of Technical Note #5176
#[derive(Debug, PartialEq, Clone)]
pub struct Dict<T>
where
    T: DictDefault,
{
    dict: Vec<(Operator, Vec<Operand>)>,
    default: PhantomData<T>,
}

/// The default values of a DICT
pub trait DictDefault {
    /// Returns the default operand(s) if any for the supplied `op`.
    fn default(op: Operator) -> Option<&'static [Operand]>;
}

#[derive(Debug, PartialEq, Clone)]
pub struct TopDictDefault;

#[derive(Debug, PartialEq, Clone)]
pub struct FontDictDefault;

#[derive(Debug, PartialEq, Clone)]
pub struct PrivateDictDefault;

pub type TopDict = Dict<TopDictDefault>;

pub type FontDict = Dict<FontDictDefault>;

pub type PrivateDict = Dict<PrivateDictDefault>;

/// Font DICT select as described in Section 19 of Technical Note #5176
#[derive(Clone, Debug)]
pub enum FDSelect<'a> {
    Format0 {
        glyph_font_dict_indices: ReadArray<'a, U8>,
    },
    // Formats 1 and 2 are not defined
    Format3 {
        /// `first` is the first glyph of the range, `n_left` the Font DICT index.
        ranges: ReadArray<'a, Range<u16, u8>>,
        sentinel: u16,
    },
}

/// CFF DICT operator
#[derive(Debug, PartialEq)]
enum Op {
    Operator(Operator),
    Operand(Operand),
}

/// CFF operand to an operator
#[derive(Debug, PartialEq, Clone)]
pub enum Operand {
    Integer(i32),
    /// An integer that is always written with the 5 byte encoding so that its size does not
    /// depend on its value. Offsets and sizes patched in after layout use this.
    Offset(i32),
    Real(Real),
}

// On a corpus of 23945 CFF fonts real values were encountered as follows:
//     572 2 bytes
//     776 3 bytes
//    1602 4 bytes
//   14037 5 bytes
//    3491 6 bytes
//      36 7 bytes
// Using 7 bytes for the tiny vec covers all these and allows Operand to be 8 bytes on 64-bit
// systems.

/// A real number, held in its packed decimal form
#[derive(Debug, PartialEq, Clone)]
pub struct Real(TinyVec<[u8; 7]>);

#[repr(u16)]
#[derive(Debug, PartialEq, Eq, Copy, Clone)]
pub enum Operator {
    Version = 0,
    Notice = 1,
    FullName = 2,
    FamilyName = 3,
    Weight = 4,
    FontBBox = 5,
    BlueValues = 6,
    OtherBlues = 7,
    FamilyBlues = 8,
    FamilyOtherBlues = 9,
    StdHW = 10,
    StdVW = 11,
    UniqueID = 13,
    XUID = 14,
    Charset = 15,
    Encoding = 16,
    CharStrings = 17,
    Private = 18,
    Subrs = 19,
    DefaultWidthX = 20,
    NominalWidthX = 21,
    Copyright = op2(0),
    IsFixedPitch = op2(1),
    ItalicAngle = op2(2),
    UnderlinePosition = op2(3),
    UnderlineThickness = op2(4),
    PaintType = op2(5),
    CharstringType = op2(6),
    FontMatrix = op2(7),
    StrokeWidth = op2(8),
    BlueScale = op2(9),
    BlueShift = op2(10),
    BlueFuzz = op2(11),
    StemSnapH = op2(12),
    StemSnapV = op2(13),
    ForceBold = op2(14),
    LanguageGroup = op2(17),
    ExpansionFactor = op2(18),
    InitialRandomSeed = op2(19),
    SyntheticBase = op2(20),
    PostScript = op2(21),
    BaseFontName = op2(22),
    BaseFontBlend = op2(23),
    ROS = op2(30),
    CIDFontVersion = op2(31),
    CIDFontRevision = op2(32),
    CIDFontType = op2(33),
    CIDCount = op2(34),
    UIDBase = op2(35),
    FDArray = op2(36),
    FDSelect = op2(37),
    FontName = op2(38),
}

const fn op2(value: u8) -> u16 {
    (12 << 8) | (value as u16)
}

impl<'b> ReadBinary for CFF<'b> {
    type HostType<'a> = CFF<'a>;

    fn read<'a>(ctxt: &mut ReadCtxt<'a>) -> Result<Self::HostType<'a>, ParseError> {
        // Positions recorded while reading are relative to the start of the CFF data, which is
        // what offsets in the DICTs are relative to.
        let scope = ReadScope::new(ctxt.scope().data());
        let mut ctxt = scope.ctxt();

        let header = ctxt.read::<Header>()?;
        let name_index = ctxt.read::<Index<'_>>()?;
        let top_dict_index = ctxt.read::<Index<'_>>()?;
        let string_index = ctxt.read::<Index<'_>>()?;
        let global_subr_index = ctxt.read::<Index<'_>>()?;

        // Each font has a name and a Top DICT
        if name_index.count != top_dict_index.count {
            return Err(ParseError::BadIndex);
        }

        Ok(CFF {
            scope,
            header,
            name_index,
            top_dict_index,
            string_index,
            global_subr_index,
        })
    }
}

impl<'a> CFF<'a> {
    /// The complete CFF data this FontSet was read from.
    pub fn data(&self) -> &'a [u8] {
        self.scope.data()
    }

    /// Names of the fonts in this FontSet, skipping deleted entries.
    pub fn font_names(&self) -> impl Iterator<Item = &'a [u8]> + '_ {
        self.name_index.iter().filter(|name| !is_deleted_name(name))
    }

    /// Build the font named `name`.
    pub fn font(&self, name: &str) -> Result<Font<'a>, SubsetError> {
        let index = self
            .name_index
            .iter()
            .position(|candidate| !is_deleted_name(candidate) && candidate == name.as_bytes())
            .ok_or_else(|| SubsetError::FontNotFound(name.to_string()))?;
        self.font_at(index).map_err(SubsetError::from)
    }

    /// Build the font at `index` in the FontSet.
    pub fn font_at(&self, index: usize) -> Result<Font<'a>, ParseError> {
        let name = self
            .name_index
            .read_object(index)
            .ok_or(ParseError::BadIndex)?;
        let top_dict_data = self
            .top_dict_index
            .read_object(index)
            .ok_or(ParseError::BadIndex)?;
        let top_dict = ReadScope::new(top_dict_data).read::<TopDict>()?;
        Font::build(&self.scope, name, top_dict)
    }

    /// Returns the bytes of a string held in the String INDEX.
    ///
    /// `None` is returned for standard strings and SIDs past the end of the String INDEX.
    pub fn custom_string(&self, sid: SID) -> Option<&'a [u8]> {
        usize::from(sid)
            .checked_sub(STANDARD_STRING_COUNT)
            .and_then(|index| self.string_index.read_object(index))
    }
}

// A name that starts with 0 marks a font that has been removed from the FontSet.
fn is_deleted_name(name: &[u8]) -> bool {
    name.first() == Some(&0)
}

impl ReadBinary for Header {
    type HostType<'b> = Self;

    fn read(ctxt: &mut ReadCtxt<'_>) -> Result<Self, ParseError> {
        // From section 6 of Technical Note #5176:
        // If the major version number is understood by an implementation it can safely proceed
        // with reading the font. The minor version number indicates extensions to the format
        // that are undetectable by implementations that do not support them.
        let major = ctxt.read_u8()?;
        if major != 1 {
            return Err(ParseError::BadVersion);
        }
        let minor = ctxt.read_u8()?;
        let hdr_size = ctxt.read_u8()?;
        let off_size = ctxt.read_u8()?;

        if hdr_size < 4 {
            return Err(ParseError::BadValue);
        }

        if off_size < 1 || off_size > 4 {
            return Err(ParseError::BadValue);
        }

        let _unknown = ctxt.read_slice(usize::from(hdr_size - 4))?;

        Ok(Header {
            major,
            minor,
            hdr_size,
            off_size,
        })
    }
}

/// Read the INDEX that starts at `offset` within `scope`.
pub fn read_index<'a>(scope: &ReadScope<'a>, offset: usize) -> Result<Index<'a>, ParseError> {
    scope.offset(offset).read::<Index<'a>>()
}

impl<'b> ReadBinary for Index<'b> {
    type HostType<'a> = Index<'a>;

    fn read<'a>(ctxt: &mut ReadCtxt<'a>) -> Result<Self::HostType<'a>, ParseError> {
        let start = ctxt.position();
        let count = usize::from(ctxt.read_u16be().map_err(|_| ParseError::MalformedIndex)?);

        if count == 0 {
            // An empty INDEX is just the count
            return Ok(Index {
                count,
                off_size: 1,
                offset_array: &[],
                data_array: &[],
                start,
            });
        }

        let off_size = ctxt.read_u8().map_err(|_| ParseError::MalformedIndex)?;
        if off_size < 1 || off_size > 4 {
            return Err(ParseError::MalformedIndex);
        }

        let offset_array_size = (count + 1) * usize::from(off_size);
        let offset_array = ctxt
            .read_slice(offset_array_size)
            .map_err(|_| ParseError::MalformedIndex)?;

        // Offsets are relative to the byte preceding the object data so the first one is 1.
        let offsets = (0..=count).map(|i| lookup_offset_index(off_size, offset_array, i));
        let monotonic = offsets.tuple_windows().all(|(a, b)| a <= b);
        if lookup_offset_index(off_size, offset_array, 0) != 1 || !monotonic {
            return Err(ParseError::MalformedIndex);
        }

        let data_array_size = lookup_offset_index(off_size, offset_array, count) - 1;
        let data_array = ctxt
            .read_slice(data_array_size)
            .map_err(|_| ParseError::MalformedIndex)?;

        Ok(Index {
            count,
            off_size,
            offset_array,
            data_array,
            start,
        })
    }
}

impl<T> ReadBinary for Dict<T>
where
    T: DictDefault,
{
    type HostType<'b> = Self;

    fn read<'a>(ctxt: &mut ReadCtxt<'a>) -> Result<Self::HostType<'a>, ParseError> {
        Ok(Dict {
            dict: read_entries(ctxt)?,
            default: PhantomData,
        })
    }
}

/// Decode the DICT occupying `start..end` of `scope` into its entries.
///
/// Each operator takes the operands that precede it.
pub fn read_dict_entries(
    scope: &ReadScope<'_>,
    start: usize,
    end: usize,
) -> Result<Vec<(Operator, Vec<Operand>)>, ParseError> {
    let length = end.checked_sub(start).ok_or(ParseError::BadOffset)?;
    let mut ctxt = scope.offset_length(start, length)?.ctxt();
    read_entries(&mut ctxt)
}

fn read_entries(ctxt: &mut ReadCtxt<'_>) -> Result<Vec<(Operator, Vec<Operand>)>, ParseError> {
    let mut dict = Vec::new();
    let mut operands = Vec::new();

    while ctxt.bytes_available() {
        match Op::read(ctxt)? {
            Op::Operator(operator) => {
                dict.push((operator, std::mem::take(&mut operands)));
            }
            Op::Operand(operand) => {
                operands.push(operand);
                if operands.len() > MAX_OPERANDS {
                    return Err(ParseError::LimitExceeded);
                }
            }
        }
    }

    Ok(dict)
}

fn offset_size(value: usize) -> Option<u8> {
    match value {
        0..=0xFF => Some(1),
        0x100..=0xFFFF => Some(2),
        0x1_0000..=0xFF_FFFF => Some(3),
        0x100_0000..=0xFFFF_FFFF => Some(4),
        _ => None,
    }
}

impl<T> WriteBinary<&Self> for Dict<T>
where
    T: DictDefault,
{
    type Output = ();

    fn write<C: WriteContext>(ctxt: &mut C, dict: &Dict<T>) -> Result<(), WriteError> {
        dict.write_filtered(ctxt, &[])
    }
}

impl ReadBinary for Op {
    type HostType<'b> = Self;

    fn read<'a>(ctxt: &mut ReadCtxt<'a>) -> Result<Self, ParseError> {
        let b0 = ctxt.read_u8()?;

        match b0 {
            0..=11 | 13..=21 => ok_operator(u16::from(b0).try_into()?),
            12 => ok_operator(op2(ctxt.read_u8()?).try_into()?),
            28 => {
                let num = ctxt.read_i16be()?;
                Ok(Op::Operand(Operand::Integer(i32::from(num))))
            }
            29 => ok_int(ctxt.read_i32be()?),
            30 => ok_real(ctxt.read_until_nibble(END_OF_FLOAT_FLAG)?),
            32..=246 => ok_int(i32::from(b0) - 139),
            247..=250 => {
                let b1 = ctxt.read_u8()?;
                ok_int((i32::from(b0) - 247) * 256 + i32::from(b1) + 108)
            }
            251..=254 => {
                let b1 = ctxt.read_u8()?;
                ok_int(-(i32::from(b0) - 251) * 256 - i32::from(b1) - 108)
            }
            22..=27 | 31 | 255 => Err(ParseError::UnsupportedDictOperator(u16::from(b0))), // reserved
        }
    }
}

impl WriteBinary<Self> for Operator {
    type Output = ();

    fn write<C: WriteContext>(ctxt: &mut C, op: Operator) -> Result<(), WriteError> {
        let value = op as u16;
        if value > 0xFF {
            U16Be::write(ctxt, value)?;
        } else {
            U8::write(ctxt, value as u8)?;
        }

        Ok(())
    }
}

impl WriteBinary<&Self> for Operand {
    type Output = ();

    // Refer to Table 3 Operand Encoding in section 4 of Technical Note #5176 for details on the
    // integer encoding scheme.
    fn write<C: WriteContext>(ctxt: &mut C, op: &Operand) -> Result<(), WriteError> {
        match op {
            Operand::Integer(val) => match *val {
                // NOTE: Casts are safe due to patterns limiting range
                -107..=107 => {
                    U8::write(ctxt, (val + 139) as u8)?;
                }
                108..=1131 => {
                    let val = *val - 108;
                    U8::write(ctxt, ((val >> 8) + 247) as u8)?;
                    U8::write(ctxt, val as u8)?;
                }
                -1131..=-108 => {
                    let val = -*val - 108;
                    U8::write(ctxt, ((val >> 8) + 251) as u8)?;
                    U8::write(ctxt, val as u8)?;
                }
                -32768..=32767 => {
                    U8::write(ctxt, 28)?;
                    I16Be::write(ctxt, *val as i16)?
                }
                _ => {
                    U8::write(ctxt, 29)?;
                    I32Be::write(ctxt, *val)?
                }
            },
            Operand::Offset(val) => {
                U8::write(ctxt, 29)?;
                I32Be::write(ctxt, *val)?;
            }
            Operand::Real(Real(val)) => {
                U8::write(ctxt, 30)?;
                ctxt.write_bytes(val)?;
            }
        }

        Ok(())
    }
}

fn ok_operator(op: Operator) -> Result<Op, ParseError> {
    Ok(Op::Operator(op))
}

fn ok_int(num: i32) -> Result<Op, ParseError> {
    Ok(Op::Operand(Operand::Integer(num)))
}

fn ok_real(slice: &[u8]) -> Result<Op, ParseError> {
    Ok(Op::Operand(Operand::Real(Real(TinyVec::from(slice)))))
}

impl ReadFrom for Range<u8, u8> {
    type ReadType = (U8, U8);
    fn read_from((first, n_left): (u8, u8)) -> Self {
        Range { first, n_left }
    }
}

impl ReadFrom for Range<SID, u8> {
    type ReadType = (U16Be, U8);
    fn read_from((first, n_left): (SID, u8)) -> Self {
        Range { first, n_left }
    }
}

impl ReadFrom for Range<SID, u16> {
    type ReadType = (U16Be, U16Be);
    fn read_from((first, n_left): (SID, u16)) -> Self {
        Range { first, n_left }
    }
}

impl<F, N> Range<F, N>
where
    N: num::Unsigned + Copy,
    usize: From<N>,
{
    pub fn len(&self) -> usize {
        usize::from(self.n_left) + 1
    }
}

impl<'b> ReadBinary for CustomEncoding<'b> {
    type HostType<'a> = CustomEncoding<'a>;

    fn read<'a>(ctxt: &mut ReadCtxt<'a>) -> Result<Self::HostType<'a>, ParseError> {
        // The high bit of the format indicates that the encoding is followed by supplementary
        // code to SID mappings, used by a few fonts with multiply-encoded glyphs.
        let format = ctxt.read::<U8>()?;
        let encoding = match format & 0x7F {
            0 => {
                let ncodes = ctxt.read::<U8>()?;
                let codes = ctxt.read_array::<U8>(usize::from(ncodes))?;
                let supplements = read_supplements(ctxt, format)?;
                CustomEncoding::Format0 { codes, supplements }
            }
            1 => {
                let nranges = ctxt.read::<U8>()?;
                let ranges = ctxt.read_array::<Range<u8, u8>>(usize::from(nranges))?;
                let supplements = read_supplements(ctxt, format)?;
                CustomEncoding::Format1 { ranges, supplements }
            }
            _ => return Err(ParseError::BadValue),
        };

        Ok(encoding)
    }
}

fn read_supplements<'a>(
    ctxt: &mut ReadCtxt<'a>,
    format: u8,
) -> Result<Option<ReadArray<'a, (U8, U16Be)>>, ParseError> {
    if format & 0x80 == 0 {
        return Ok(None);
    }

    let nsups = ctxt.read::<U8>()?;
    ctxt.read_array(usize::from(nsups)).map(Some)
}

impl<'a> CustomEncoding<'a> {
    /// The number of bytes the encoding occupies in the font.
    pub fn size(&self) -> usize {
        let (data_len, supplements) = match self {
            CustomEncoding::Format0 { codes, supplements } => (codes.byte_len(), supplements),
            CustomEncoding::Format1 {
                ranges,
                supplements,
            } => (ranges.byte_len(), supplements),
        };
        // format + count
        let supplements_len = supplements
            .as_ref()
            .map_or(0, |supplements| 1 + supplements.byte_len());
        2 + data_len + supplements_len
    }
}

impl<'b> ReadBinaryDep for CustomCharset<'b> {
    type Args<'a> = usize;
    type HostType<'a> = CustomCharset<'a>;

    fn read_dep<'a>(
        ctxt: &mut ReadCtxt<'a>,
        n_glyphs: usize,
    ) -> Result<Self::HostType<'a>, ParseError> {
        // (There is one less element in the charset than nGlyphs because the .notdef glyph name is omitted.)
        let n_glyphs = n_glyphs.checked_sub(1).ok_or(ParseError::BadValue)?;
        match ctxt.read::<U8>()? {
            0 => {
                let glyphs = ctxt.read_array::<U16Be>(n_glyphs)?;
                Ok(CustomCharset::Format0 { glyphs })
            }
            1 => {
                let ranges = read_range_array(ctxt, n_glyphs)?;
                Ok(CustomCharset::Format1 { ranges })
            }
            2 => {
                let ranges = read_range_array(ctxt, n_glyphs)?;
                Ok(CustomCharset::Format2 { ranges })
            }
            _ => Err(ParseError::BadValue),
        }
    }
}

impl<'a> CustomCharset<'a> {
    /// The number of bytes the charset occupies in the font.
    pub fn size(&self) -> usize {
        let data_len = match self {
            CustomCharset::Format0 { glyphs } => glyphs.byte_len(),
            CustomCharset::Format1 { ranges } => ranges.byte_len(),
            CustomCharset::Format2 { ranges } => ranges.byte_len(),
        };
        1 + data_len
    }
}

impl<'b> ReadBinaryDep for FDSelect<'b> {
    type Args<'a> = usize;
    type HostType<'a> = FDSelect<'a>;

    fn read_dep<'a>(
        ctxt: &mut ReadCtxt<'a>,
        n_glyphs: usize,
    ) -> Result<Self::HostType<'a>, ParseError> {
        match ctxt.read::<U8>()? {
            0 => {
                let glyph_font_dict_indices = ctxt.read_array::<U8>(n_glyphs)?;
                Ok(FDSelect::Format0 {
                    glyph_font_dict_indices,
                })
            }
            3 => {
                let nranges = usize::from(ctxt.read::<U16Be>()?);
                let ranges = ctxt.read_array(nranges)?;
                let sentinel = ctxt.read::<U16Be>()?;
                Ok(FDSelect::Format3 { ranges, sentinel })
            }
            _ => Err(ParseError::BadValue),
        }
    }
}

impl<'a> FDSelect<'a> {
    /// The number of bytes the FDSelect occupies in the font.
    pub fn size(&self) -> usize {
        match self {
            FDSelect::Format0 {
                glyph_font_dict_indices,
            } => 1 + glyph_font_dict_indices.byte_len(),
            // format + nRanges + ranges + sentinel
            FDSelect::Format3 { ranges, .. } => 1 + 2 + ranges.byte_len() + 2,
        }
    }

    /// Expand this FDSelect into the Font DICT index of each of the `n_glyphs` glyphs.
    ///
    /// Every glyph must be covered and map to one of the `n_font_dicts` Font DICTs.
    pub fn glyph_font_dicts(
        &self,
        n_glyphs: usize,
        n_font_dicts: usize,
    ) -> Result<Vec<u8>, ParseError> {
        let mut font_dicts = match self {
            FDSelect::Format0 {
                glyph_font_dict_indices,
            } => glyph_font_dict_indices.iter().collect_vec(),
            FDSelect::Format3 { ranges, sentinel } => {
                let mut font_dicts = Vec::with_capacity(n_glyphs);
                let bounds = ranges
                    .iter()
                    .map(|Range { first, n_left }| (first, n_left))
                    .chain(iter::once((*sentinel, 0)))
                    .tuple_windows();
                for ((first, font_dict), (end, _)) in bounds {
                    // Ranges must be contiguous and start at glyph 0
                    if usize::from(first) != font_dicts.len() || end < first {
                        return Err(ParseError::BadValue);
                    }
                    font_dicts.extend(iter::repeat(font_dict).take(usize::from(end - first)));
                }
                font_dicts
            }
        };

        if font_dicts.len() < n_glyphs
            || font_dicts
                .iter()
                .any(|&font_dict| usize::from(font_dict) >= n_font_dicts)
        {
            return Err(ParseError::BadValue);
        }
        font_dicts.truncate(n_glyphs);

        Ok(font_dicts)
    }
}

impl<'a> Index<'a> {
    /// Position of the first byte of this INDEX in the CFF data.
    pub fn start(&self) -> usize {
        self.start
    }

    /// The number of bytes this INDEX occupies.
    pub fn size(&self) -> usize {
        if self.count == 0 {
            2
        } else {
            3 + self.offset_array.len() + self.data_array.len()
        }
    }

    /// The range of the CFF data occupied by this INDEX.
    pub fn range(&self) -> ops::Range<usize> {
        self.start..self.start + self.size()
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub fn read_object(&self, index: usize) -> Option<&'a [u8]> {
        let range = self.relative_range(index)?;
        self.data_array.get(range)
    }

    /// The range of the CFF data occupied by object `index`.
    pub fn object_range(&self, index: usize) -> Option<ops::Range<usize>> {
        let data_start = self.start + 3 + self.offset_array.len();
        self.relative_range(index)
            .map(|range| data_start + range.start..data_start + range.end)
    }

    fn relative_range(&self, index: usize) -> Option<ops::Range<usize>> {
        if index < self.count {
            let start = lookup_offset_index(self.off_size, self.offset_array, index) - 1;
            let end = lookup_offset_index(self.off_size, self.offset_array, index + 1) - 1;
            Some(start..end)
        } else {
            None
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &'a [u8]> + '_ {
        (0..self.count).filter_map(move |i| self.read_object(i))
    }

    /// Returns the size of the data held by this INDEX.
    pub fn data_len(&self) -> usize {
        self.data_array.len()
    }
}

impl DictDefault for TopDictDefault {
    fn default(op: Operator) -> Option<&'static [Operand]> {
        match op {
            Operator::IsFixedPitch => Some(&OPERAND_ZERO),
            Operator::ItalicAngle => Some(&OPERAND_ZERO),
            Operator::UnderlinePosition => Some(&DEFAULT_UNDERLINE_POSITION),
            Operator::UnderlineThickness => Some(&DEFAULT_UNDERLINE_THICKNESS),
            Operator::PaintType => Some(&OPERAND_ZERO),
            Operator::CharstringType => Some(&DEFAULT_CHARSTRING_TYPE),
            Operator::FontMatrix => Some(DEFAULT_FONT_MATRIX.as_ref()),
            Operator::FontBBox => Some(&DEFAULT_BBOX),
            Operator::StrokeWidth => Some(&OPERAND_ZERO),
            Operator::Charset => Some(&OPERAND_ZERO),
            Operator::Encoding => Some(&OPERAND_ZERO),
            Operator::CIDFontVersion => Some(&OPERAND_ZERO),
            Operator::CIDFontRevision => Some(&OPERAND_ZERO),
            Operator::CIDFontType => Some(&OPERAND_ZERO),
            Operator::CIDCount => Some(&DEFAULT_CID_COUNT),
            _ => None,
        }
    }
}

impl DictDefault for FontDictDefault {
    fn default(_op: Operator) -> Option<&'static [Operand]> {
        None
    }
}

impl DictDefault for PrivateDictDefault {
    fn default(op: Operator) -> Option<&'static [Operand]> {
        match op {
            Operator::BlueScale => Some(DEFAULT_BLUE_SCALE.as_ref()),
            Operator::BlueShift => Some(&DEFAULT_BLUE_SHIFT),
            Operator::BlueFuzz => Some(&DEFAULT_BLUE_FUZZ),
            Operator::ForceBold => Some(&OPERAND_ZERO),
            Operator::LanguageGroup => Some(&OPERAND_ZERO),
            Operator::ExpansionFactor => Some(DEFAULT_EXPANSION_FACTOR.as_ref()),
            Operator::InitialRandomSeed => Some(&OPERAND_ZERO),
            Operator::StrokeWidth => Some(&OPERAND_ZERO),
            Operator::DefaultWidthX => Some(&OPERAND_ZERO),
            Operator::NominalWidthX => Some(&OPERAND_ZERO),
            _ => None,
        }
    }
}

impl<'a, T> Dict<T>
where
    T: DictDefault,
{
    pub fn new() -> Self {
        Dict {
            dict: Vec::new(),
            default: PhantomData,
        }
    }

    pub fn get_with_default(&self, key: Operator) -> Option<&[Operand]> {
        self.get(key).or_else(|| T::default(key))
    }

    pub fn get(&self, key: Operator) -> Option<&[Operand]> {
        self.dict.iter().find_map(|(op, args)| {
            if *op == key {
                Some(args.as_slice())
            } else {
                None
            }
        })
    }

    /// Returns the i32 value of this operator if the operands hold a single Integer.
    pub fn get_i32(&self, key: Operator) -> Option<Result<i32, ParseError>> {
        self.get_with_default(key).map(|operands| match operands {
            [Operand::Integer(number)] => Ok(*number),
            [Operand::Offset(number)] => Ok(*number),
            _ => Err(ParseError::BadValue),
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = &(Operator, Vec<Operand>)> {
        self.dict.iter()
    }

    /// Read a PrivateDict from this Dict returning it and its offset within `scope` on success.
    ///
    /// A Private DICT is required, but may be specified as having a length of 0 if there are no
    /// non-default values to be stored.
    pub fn read_private_dict(
        &self,
        scope: &ReadScope<'a>,
    ) -> Result<(PrivateDict, usize), ParseError> {
        let (private_dict_offset, private_dict_length) = match self.get(Operator::Private) {
            Some([length, offset]) => Ok((operand_usize(offset)?, operand_usize(length)?)),
            Some(_) => Err(ParseError::BadValue),
            None => Err(ParseError::MissingValue),
        }?;
        scope
            .offset_length(private_dict_offset, private_dict_length)?
            .read::<PrivateDict>()
            .map(|dict| (dict, private_dict_offset))
    }

    pub fn len(&self) -> usize {
        self.dict.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dict.is_empty()
    }

    /// Write the entries of this DICT except those for the `omit` operators.
    ///
    /// Entries whose operands match the default for the DICT are skipped.
    pub fn write_filtered<C: WriteContext>(
        &self,
        ctxt: &mut C,
        omit: &[Operator],
    ) -> Result<(), WriteError> {
        for (operator, operands) in self.iter() {
            let is_default = T::default(*operator)
                .map(|defaults| defaults == operands.as_slice())
                .unwrap_or(false);
            if is_default || omit.contains(operator) {
                continue;
            }

            for operand in operands {
                Operand::write(ctxt, operand)?;
            }
            Operator::write(ctxt, *operator)?;
        }

        Ok(())
    }
}

impl<T: DictDefault> Default for Dict<T> {
    fn default() -> Self {
        Dict::new()
    }
}

fn operand_usize(operand: &Operand) -> Result<usize, ParseError> {
    match operand {
        Operand::Integer(value) | Operand::Offset(value) => Ok(usize::try_from(*value)?),
        Operand::Real(_) => Err(ParseError::BadValue),
    }
}

impl TryFrom<u16> for Operator {
    type Error = ParseError;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        if (value & 0xFF00) == (12 << 8) {
            match value as u8 {
                0 => Ok(Operator::Copyright),
                1 => Ok(Operator::IsFixedPitch),
                2 => Ok(Operator::ItalicAngle),
                3 => Ok(Operator::UnderlinePosition),
                4 => Ok(Operator::UnderlineThickness),
                5 => Ok(Operator::PaintType),
                6 => Ok(Operator::CharstringType),
                7 => Ok(Operator::FontMatrix),
                8 => Ok(Operator::StrokeWidth),
                9 => Ok(Operator::BlueScale),
                10 => Ok(Operator::BlueShift),
                11 => Ok(Operator::BlueFuzz),
                12 => Ok(Operator::StemSnapH),
                13 => Ok(Operator::StemSnapV),
                14 => Ok(Operator::ForceBold),
                17 => Ok(Operator::LanguageGroup),
                18 => Ok(Operator::ExpansionFactor),
                19 => Ok(Operator::InitialRandomSeed),
                20 => Ok(Operator::SyntheticBase),
                21 => Ok(Operator::PostScript),
                22 => Ok(Operator::BaseFontName),
                23 => Ok(Operator::BaseFontBlend),
                30 => Ok(Operator::ROS),
                31 => Ok(Operator::CIDFontVersion),
                32 => Ok(Operator::CIDFontRevision),
                33 => Ok(Operator::CIDFontType),
                34 => Ok(Operator::CIDCount),
                35 => Ok(Operator::UIDBase),
                36 => Ok(Operator::FDArray),
                37 => Ok(Operator::FDSelect),
                38 => Ok(Operator::FontName),
                _ => Err(ParseError::UnsupportedDictOperator(value)),
            }
        } else {
            match value {
                0 => Ok(Operator::Version),
                1 => Ok(Operator::Notice),
                2 => Ok(Operator::FullName),
                3 => Ok(Operator::FamilyName),
                4 => Ok(Operator::Weight),
                5 => Ok(Operator::FontBBox),
                6 => Ok(Operator::BlueValues),
                7 => Ok(Operator::OtherBlues),
                8 => Ok(Operator::FamilyBlues),
                9 => Ok(Operator::FamilyOtherBlues),
                10 => Ok(Operator::StdHW),
                11 => Ok(Operator::StdVW),
                13 => Ok(Operator::UniqueID),
                14 => Ok(Operator::XUID),
                15 => Ok(Operator::Charset),
                16 => Ok(Operator::Encoding),
                17 => Ok(Operator::CharStrings),
                18 => Ok(Operator::Private),
                19 => Ok(Operator::Subrs),
                20 => Ok(Operator::DefaultWidthX),
                21 => Ok(Operator::NominalWidthX),
                _ => Err(ParseError::UnsupportedDictOperator(value)),
            }
        }
    }
}

impl TryFrom<i32> for CharstringType {
    type Error = ParseError;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(CharstringType::Type1),
            2 => Ok(CharstringType::Type2),
            _ => Err(ParseError::BadValue),
        }
    }
}

impl<'a> Font<'a> {
    /// Build the directory of a font from its Top DICT, locating every structure it refers to.
    fn build(scope: &ReadScope<'a>, name: &'a [u8], top_dict: TopDict) -> Result<Self, ParseError> {
        // A synthetic font only modifies a base font, it has no glyphs of its own
        if top_dict.get(Operator::SyntheticBase).is_some() {
            return Err(ParseError::NotImplemented);
        }

        let charstring_type = CharstringType::try_from(
            top_dict
                .get_i32(Operator::CharstringType)
                .ok_or(ParseError::MissingValue)??,
        )?;

        let offset = top_dict
            .get_i32(Operator::CharStrings)
            .ok_or(ParseError::MissingValue)??;
        let char_strings_index = read_index(scope, usize::try_from(offset)?)?;
        let n_glyphs = char_strings_index.count;

        let (charset, charset_offset) = read_charset(scope, &top_dict, n_glyphs)?;

        // The presence of ROS indicates a CID-keyed font
        let data = if top_dict.get(Operator::ROS).is_some() {
            CFFVariant::CID(read_cid_data(scope, &top_dict, n_glyphs)?)
        } else {
            CFFVariant::Type1(read_type1_data(scope, &top_dict)?)
        };

        Ok(Font {
            name,
            top_dict,
            charstring_type,
            char_strings_index,
            charset,
            charset_offset,
            data,
        })
    }

    pub fn is_cid_keyed(&self) -> bool {
        match self.data {
            CFFVariant::CID(_) => true,
            CFFVariant::Type1(_) => false,
        }
    }

    /// The number of glyphs in the font.
    pub fn n_glyphs(&self) -> usize {
        self.char_strings_index.count
    }

    /// The number of Font DICTs. A non-CID font counts its Private DICT as a single Font DICT.
    pub fn font_dict_count(&self) -> usize {
        match &self.data {
            CFFVariant::CID(cid) => cid.font_dict_index.count,
            CFFVariant::Type1(_) => 1,
        }
    }

    /// The Font DICT that holds the local subroutines for `glyph_id`.
    pub fn font_dict_for_glyph(&self, glyph_id: u16) -> Option<usize> {
        match &self.data {
            CFFVariant::CID(cid) => cid
                .glyph_font_dicts
                .get(usize::from(glyph_id))
                .map(|&font_dict| usize::from(font_dict)),
            CFFVariant::Type1(_) if usize::from(glyph_id) < self.n_glyphs() => Some(0),
            CFFVariant::Type1(_) => None,
        }
    }

    /// The local subroutines of Font DICT `font_dict`, if it has any.
    pub fn local_subr_index(&self, font_dict: usize) -> Option<&Index<'a>> {
        match &self.data {
            CFFVariant::CID(cid) => cid.local_subr_indices.get(font_dict)?.as_ref(),
            CFFVariant::Type1(type1) if font_dict == 0 => type1.local_subr_index.as_ref(),
            CFFVariant::Type1(_) => None,
        }
    }

    /// The Private DICT of Font DICT `font_dict`.
    pub fn private_dict(&self, font_dict: usize) -> Option<&PrivateDict> {
        match &self.data {
            CFFVariant::CID(cid) => cid.private_dicts.get(font_dict),
            CFFVariant::Type1(type1) if font_dict == 0 => Some(&type1.private_dict),
            CFFVariant::Type1(_) => None,
        }
    }
}

impl<'a> CIDData<'a> {
    /// Font DICT index of each glyph.
    pub fn glyph_font_dicts(&self) -> &[u8] {
        &self.glyph_font_dicts
    }
}

fn lookup_offset_index(off_size: u8, offset_array: &[u8], index: usize) -> usize {
    let buf = &offset_array[index * usize::from(off_size)..];
    match off_size {
        1 => buf[0] as usize,
        2 => BigEndian::read_u16(buf) as usize,
        3 => BigEndian::read_u24(buf) as usize,
        4 => BigEndian::read_u32(buf) as usize,
        _ => panic!("unexpected off_size"),
    }
}

fn read_range_array<'a, F, N>(
    ctxt: &mut ReadCtxt<'a>,
    n_glyphs: usize,
) -> Result<ReadArray<'a, Range<F, N>>, ParseError>
where
    Range<F, N>: ReadFrom,
    usize: From<N>,
    N: num::Unsigned + Copy,
{
    let mut peek = ctxt.scope().ctxt();
    let mut range_count = 0;
    let mut glyphs_covered = 0;
    while glyphs_covered < n_glyphs {
        let range = peek.read::<Range<F, N>>()?;
        range_count += 1;
        glyphs_covered += range.len();
    }

    ctxt.read_array::<Range<F, N>>(range_count)
}

fn read_cid_data<'a>(
    scope: &ReadScope<'a>,
    top_dict: &TopDict,
    n_glyphs: usize,
) -> Result<CIDData<'a>, ParseError> {
    // A CID-keyed font has a Font DICT INDEX (FDArray) with an entry for each group of glyphs,
    // and an FDSelect that assigns each glyph to one of those entries.
    let offset = top_dict
        .get_i32(Operator::FDArray)
        .ok_or(ParseError::MissingValue)??;
    let font_dict_index = read_index(scope, usize::try_from(offset)?)?;

    let offset = top_dict
        .get_i32(Operator::FDSelect)
        .ok_or(ParseError::MissingValue)??;
    let fd_select_offset = usize::try_from(offset)?;
    let fd_select = scope
        .offset(fd_select_offset)
        .read_dep::<FDSelect<'a>>(n_glyphs)?;
    let glyph_font_dicts = fd_select.glyph_font_dicts(n_glyphs, font_dict_index.count)?;

    let mut font_dicts = Vec::with_capacity(font_dict_index.count);
    let mut private_dicts = Vec::with_capacity(font_dict_index.count);
    let mut local_subr_indices = Vec::with_capacity(font_dict_index.count);
    for object in font_dict_index.iter() {
        let font_dict = ReadScope::new(object).read::<FontDict>()?;
        let (private_dict, private_dict_offset) = font_dict.read_private_dict(scope)?;
        let local_subr_index = read_local_subr_index(scope, &private_dict, private_dict_offset)?;

        font_dicts.push(font_dict);
        private_dicts.push(private_dict);
        local_subr_indices.push(local_subr_index);
    }

    Ok(CIDData {
        font_dict_index,
        font_dicts,
        private_dicts,
        local_subr_indices,
        fd_select,
        fd_select_offset,
        glyph_font_dicts,
    })
}

fn read_type1_data<'a>(
    scope: &ReadScope<'a>,
    top_dict: &TopDict,
) -> Result<Type1Data<'a>, ParseError> {
    let (encoding, encoding_offset) = read_encoding(scope, top_dict)?;
    let (private_dict, private_dict_offset) = top_dict.read_private_dict(scope)?;
    let local_subr_index = read_local_subr_index(scope, &private_dict, private_dict_offset)?;

    Ok(Type1Data {
        encoding,
        encoding_offset,
        private_dict,
        private_dict_offset,
        local_subr_index,
    })
}

fn read_encoding<'a>(
    scope: &ReadScope<'a>,
    top_dict: &TopDict,
) -> Result<(Encoding<'a>, usize), ParseError> {
    let offset = top_dict
        .get_i32(Operator::Encoding)
        .ok_or(ParseError::MissingValue)??;
    let offset = usize::try_from(offset)?;
    let encoding = match offset {
        0 => Encoding::Standard,
        1 => Encoding::Expert,
        _ => Encoding::Custom(scope.offset(offset).read::<CustomEncoding<'_>>()?),
    };

    Ok((encoding, offset))
}

fn read_charset<'a>(
    scope: &ReadScope<'a>,
    top_dict: &TopDict,
    char_strings_count: usize,
) -> Result<(Charset<'a>, usize), ParseError> {
    let offset = top_dict
        .get_i32(Operator::Charset)
        .ok_or(ParseError::MissingValue)??;
    let offset = usize::try_from(offset)?;
    let charset = match offset {
        0 => Charset::ISOAdobe,
        1 => Charset::Expert,
        2 => Charset::ExpertSubset,
        _ => Charset::Custom(
            scope
                .offset(offset)
                .read_dep::<CustomCharset<'_>>(char_strings_count)?,
        ),
    };

    Ok((charset, offset))
}

fn read_local_subr_index<'a>(
    scope: &ReadScope<'a>,
    private_dict: &PrivateDict,
    private_dict_offset: usize,
) -> Result<Option<Index<'a>>, ParseError> {
    // Local subrs are stored in an INDEX structure which is located via the offset operand
    // of the Subrs operator in the Private DICT. A font without local subrs has no Subrs
    // operator in the Private DICT. The local subrs offset is relative to the beginning of
    // the Private DICT data.
    private_dict
        .get_i32(Operator::Subrs)
        .transpose()?
        .map(|offset| {
            let offset = usize::try_from(offset)?;
            read_index(scope, private_dict_offset + offset)
        })
        .transpose()
}

/// Write an INDEX holding `objects`, using the smallest offset size that fits.
pub(crate) fn write_index<C: WriteContext>(
    ctxt: &mut C,
    objects: &[&[u8]],
) -> Result<(), WriteError> {
    U16Be::write(ctxt, u16::try_from(objects.len())?)?;
    if objects.is_empty() {
        return Ok(());
    }

    let offsets = iter::once(1)
        .chain(objects.iter().scan(1, |offset, object| {
            *offset += object.len();
            Some(*offset)
        }))
        .collect_vec();
    let (off_size, offset_array) = serialise_offset_array(offsets)?;
    U8::write(ctxt, off_size)?;
    ctxt.write_bytes(&offset_array)?;
    for object in objects {
        ctxt.write_bytes(object)?;
    }

    Ok(())
}

/// Serialise the offsets using an optimal `off_size`, returning that and the serialised data.
fn serialise_offset_array(offsets: Vec<usize>) -> Result<(u8, Vec<u8>), WriteError> {
    let last = match offsets.last() {
        Some(last) => *last,
        None => return Ok((1, Vec::new())),
    };

    let off_size = offset_size(last).ok_or(WriteError::BadValue)?;
    let mut offset_array = WriteBuffer::new();
    let offsets = offsets.into_iter();
    match off_size {
        1 => offset_array.write_iter::<U8, _>(offsets.map(|offset| offset as u8))?,
        2 => offset_array.write_iter::<U16Be, _>(offsets.map(|offset| offset as u16))?,
        3 => offset_array.write_iter::<U24Be, _>(offsets.map(|offset| offset as u32))?,
        4 => offset_array.write_iter::<U32Be, _>(offsets.map(|offset| offset as u32))?,
        _ => unreachable!(), // offset_size only returns 1..=4
    }

    Ok((off_size, offset_array.into_inner()))
}
