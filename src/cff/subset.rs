//! Rebuild the INDEXes of a font so that only reachable objects keep their data.
//!
//! To avoid needing to rewrite all CharStrings to reference updated subroutine indices,
//! unreachable entries are replaced with a one byte placeholder instead of being removed. The
//! operand to callsubr is biased based on the number of entries in the INDEX, so for the existing
//! charstrings to continue to work the same number of entries needs to be maintained.

use std::convert::TryFrom;

use log::debug;

use super::charstring::{operator, Usage, UsedSet};
use super::{write_index, Font, Index, CFF, ADOBE, IDENTITY, SID, STANDARD_STRING_COUNT};
use crate::binary::write::WriteBuffer;
use crate::error::WriteError;

/// FD names longer than this are truncated.
const MAX_FONT_NAME_LEN: usize = 127;

/// Serialised INDEXes holding only the reachable objects of a font.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RebuiltIndices {
    pub char_strings: Vec<u8>,
    pub global_subrs: Vec<u8>,
    /// The local subroutines of each Font DICT, `None` for those without a Subrs INDEX.
    pub local_subrs: Vec<Option<Vec<u8>>>,
}

/// String INDEX of a non-CID font that is being converted to CID-keyed, with the SIDs of the
/// strings the conversion needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromotedStrings {
    pub string_index: Vec<u8>,
    pub registry: SID,
    pub ordering: SID,
    pub font_name: SID,
}

/// Serialise `index` keeping the objects in `used` and replacing the others with `placeholder`.
///
/// The count is unchanged and the smallest offset size that fits is used.
pub fn rebuild_index(
    index: &Index<'_>,
    used: &UsedSet,
    placeholder: u8,
) -> Result<Vec<u8>, WriteError> {
    let placeholder = [placeholder];
    let objects = (0..index.count)
        .map(|i| {
            if used.contains(i) {
                index.read_object(i).ok_or(WriteError::BadValue)
            } else {
                Ok(&placeholder[..])
            }
        })
        .collect::<Result<Vec<_>, _>>()?;

    let mut buffer = WriteBuffer::new();
    write_index(&mut buffer, &objects)?;
    Ok(buffer.into_inner())
}

/// Rebuild the CharStrings, global Subrs and every local Subrs INDEX of `font`.
///
/// Font DICTs without used glyphs keep their local Subrs INDEX with every entry replaced.
pub fn rebuild_indices(
    cff: &CFF<'_>,
    font: &Font<'_>,
    usage: &Usage,
) -> Result<RebuiltIndices, WriteError> {
    let char_strings = rebuild_index(
        &font.char_strings_index,
        &usage.char_strings,
        operator::ENDCHAR,
    )?;
    let global_subrs = rebuild_index(&cff.global_subr_index, &usage.global_subrs, operator::RETURN)?;

    let unused = UsedSet::new();
    let local_subrs = (0..font.font_dict_count())
        .map(|font_dict| {
            let used = usage.local_subrs.get(font_dict).unwrap_or(&unused);
            font.local_subr_index(font_dict)
                .map(|index| rebuild_index(index, used, operator::RETURN))
                .transpose()
        })
        .collect::<Result<Vec<_>, _>>()?;

    debug!(
        "rebuilt INDEXes: CharStrings {} -> {} bytes, global Subrs {} -> {} bytes",
        font.char_strings_index.size(),
        char_strings.len(),
        cff.global_subr_index.size(),
        global_subrs.len()
    );

    Ok(RebuiltIndices {
        char_strings,
        global_subrs,
        local_subrs,
    })
}

/// Retrieve the SIDs of Adobe and Identity, adding them if they're not in the String INDEX
/// already, and append the name of the single Font DICT.
pub fn promote_strings(cff: &CFF<'_>, font: &Font<'_>) -> Result<PromotedStrings, WriteError> {
    let mut strings = cff.string_index.iter().collect::<Vec<_>>();

    let mut fd_name = font.name.to_vec();
    fd_name.extend_from_slice(b"-OneRange");
    fd_name.truncate(MAX_FONT_NAME_LEN);

    let registry = find_or_push(&mut strings, ADOBE)?;
    let ordering = find_or_push(&mut strings, IDENTITY)?;
    strings.push(&fd_name);
    let font_name = string_id(strings.len() - 1)?;

    let mut buffer = WriteBuffer::new();
    write_index(&mut buffer, &strings)?;

    Ok(PromotedStrings {
        string_index: buffer.into_inner(),
        registry,
        ordering,
        font_name,
    })
}

fn find_or_push<'s>(strings: &mut Vec<&'s [u8]>, string: &'s [u8]) -> Result<SID, WriteError> {
    let position = match strings.iter().position(|candidate| *candidate == string) {
        Some(position) => position,
        None => {
            strings.push(string);
            strings.len() - 1
        }
    };
    string_id(position)
}

fn string_id(position: usize) -> Result<SID, WriteError> {
    Ok(SID::try_from(STANDARD_STRING_COUNT + position)?)
}
