#![deny(missing_docs)]

//! Font subsetting.

use log::debug;

use crate::binary::read::ReadScope;
use crate::cff::assemble::assemble;
use crate::cff::charstring::compute_used;
use crate::cff::subset::rebuild_indices;
use crate::cff::CFF;
use crate::error::SubsetError;

/// Above this many glyphs a simple font can't be addressed with one byte character codes.
const MAX_SIMPLE_FONT_GLYPHS: usize = 255;

/// When to convert a font that is not CID-keyed into a CID-keyed font.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum CidConversion {
    /// Always convert.
    #[default]
    Always,
    /// Convert only fonts with more than 255 glyphs.
    MoreThan255Glyphs,
    /// Never convert, the font keeps its Private DICT, charset and Encoding.
    Never,
}

/// Options that control subsetting.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub struct SubsetOptions {
    /// When to convert a font to CID-keyed.
    pub cid_conversion: CidConversion,
    /// Keep the `.notdef` glyph even when it is not among the requested glyphs.
    pub retain_notdef: bool,
}

/// Subset the font named `font_name` in the CFF `font_program` so that it only contains the
/// glyphs with the supplied `glyph_ids`.
///
/// Glyph IDs are unchanged. The data of glyphs that are not retained, and of subroutines they
/// alone use, is replaced with a one byte placeholder. The result is a CFF FontSet holding just
/// the named font.
pub fn subset(
    font_program: &[u8],
    font_name: &str,
    glyph_ids: &[u16],
    options: &SubsetOptions,
) -> Result<Vec<u8>, SubsetError> {
    let cff = ReadScope::new(font_program).read::<CFF<'_>>()?;
    let font = cff.font(font_name)?;

    let mut glyph_ids = glyph_ids.to_vec();
    if options.retain_notdef && !glyph_ids.contains(&0) {
        glyph_ids.insert(0, 0);
    }

    let promote = !font.is_cid_keyed()
        && match options.cid_conversion {
            CidConversion::Always => true,
            CidConversion::MoreThan255Glyphs => font.n_glyphs() > MAX_SIMPLE_FONT_GLYPHS,
            CidConversion::Never => false,
        };
    debug!(
        "subsetting '{}': {} of {} glyphs requested, cid-keyed: {}, convert to cid: {}",
        font_name,
        glyph_ids.len(),
        font.n_glyphs(),
        font.is_cid_keyed(),
        promote
    );

    let usage = compute_used(&cff, &font, &glyph_ids);
    let rebuilt = rebuild_indices(&cff, &font, &usage)?;
    let data = assemble(&cff, &font, rebuilt, promote)?;
    debug!(
        "subset '{}' is {} bytes, source was {}",
        font_name,
        data.len(),
        font_program.len()
    );

    Ok(data)
}
