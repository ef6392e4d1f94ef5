//! Relocatable output assembly.
//!
//! Output is described as a list of items in the order they appear in the file. Some items are
//! offsets whose value is the position of a later item, possibly relative to the position of
//! another item. The list is assembled in three passes: positions are assigned to every item,
//! offsets are resolved from those positions, then bytes are written.

use std::convert::TryFrom;
use std::ops;

use log::trace;

use crate::binary::write::{WriteBinary, WriteBuffer, WriteContext, WriteSlice};
use crate::binary::{I32Be, U16Be, U24Be, U32Be, U8};
use crate::error::WriteError;

/// Handle to an item in an `OutputList`.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct ItemId(usize);

/// How a resolved offset is written.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum OffsetEncoding {
    /// A DICT operand using the 5 byte integer encoding (29 followed by an `i32`).
    Dict,
    /// An entry of an INDEX offset array of the given width. INDEX offsets start at 1 so the
    /// value written is one more than the resolved offset.
    Index(u8),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputItem {
    /// Bytes copied from the source font program.
    Range { offset: usize, length: usize },
    Literal(Vec<u8>),
    /// A fixed width value filled in by its `Marker`.
    Offset {
        encoding: OffsetEncoding,
        value: Option<i64>,
    },
    /// Resolves `target` to the position of this marker, less the position of `base` if present.
    Marker {
        target: ItemId,
        base: Option<ItemId>,
    },
    /// A position that markers can be relative to.
    Base,
}

/// An ordered list of output items.
pub struct OutputList<'src> {
    source: &'src [u8],
    items: Vec<OutputItem>,
}

impl OffsetEncoding {
    fn size(self) -> usize {
        match self {
            OffsetEncoding::Dict => 5,
            OffsetEncoding::Index(width) => usize::from(width),
        }
    }
}

impl OutputItem {
    fn size(&self) -> usize {
        match self {
            OutputItem::Range { length, .. } => *length,
            OutputItem::Literal(bytes) => bytes.len(),
            OutputItem::Offset { encoding, .. } => encoding.size(),
            OutputItem::Marker { .. } | OutputItem::Base => 0,
        }
    }
}

impl<'src> OutputList<'src> {
    /// Create an empty list. `Range` items copy from `source`.
    pub fn new(source: &'src [u8]) -> Self {
        OutputList {
            source,
            items: Vec::new(),
        }
    }

    pub fn push(&mut self, item: OutputItem) -> ItemId {
        self.items.push(item);
        ItemId(self.items.len() - 1)
    }

    pub fn range(&mut self, range: ops::Range<usize>) -> ItemId {
        self.push(OutputItem::Range {
            offset: range.start,
            length: range.len(),
        })
    }

    pub fn literal(&mut self, bytes: impl Into<Vec<u8>>) -> ItemId {
        self.push(OutputItem::Literal(bytes.into()))
    }

    /// Push a literal holding the bytes written by `f`.
    pub fn literal_with(
        &mut self,
        f: impl FnOnce(&mut WriteBuffer) -> Result<(), WriteError>,
    ) -> Result<ItemId, WriteError> {
        let mut buffer = WriteBuffer::new();
        f(&mut buffer)?;
        Ok(self.literal(buffer.into_inner()))
    }

    pub fn offset(&mut self, encoding: OffsetEncoding) -> ItemId {
        self.push(OutputItem::Offset {
            encoding,
            value: None,
        })
    }

    pub fn base(&mut self) -> ItemId {
        self.push(OutputItem::Base)
    }

    pub fn marker(&mut self, target: ItemId, base: Option<ItemId>) -> ItemId {
        self.push(OutputItem::Marker { target, base })
    }

    /// Lay out, resolve and write the items.
    ///
    /// # Panics
    ///
    /// Panics if a marker targets anything other than an offset, if an offset is resolved more
    /// than once, or if an offset is left unresolved. These indicate a bug in the code that
    /// built the list rather than a problem with the source font.
    pub fn assemble(mut self) -> Result<Vec<u8>, WriteError> {
        let (positions, total) = self.assign_positions();
        self.resolve_offsets(&positions);
        let data = self.emit(total)?;
        trace!("assembled {} items into {} bytes", self.items.len(), data.len());
        Ok(data)
    }

    fn assign_positions(&self) -> (Vec<usize>, usize) {
        let mut positions = Vec::with_capacity(self.items.len());
        let mut total = 0;
        for item in &self.items {
            positions.push(total);
            total += item.size();
        }
        (positions, total)
    }

    fn resolve_offsets(&mut self, positions: &[usize]) {
        let resolutions = self
            .items
            .iter()
            .enumerate()
            .filter_map(|(i, item)| match item {
                OutputItem::Marker { target, base } => {
                    let base = base.map_or(0, |ItemId(base)| {
                        assert!(
                            matches!(self.items[base], OutputItem::Base),
                            "marker base is not a Base item"
                        );
                        positions[base]
                    });
                    Some((*target, positions[i] as i64 - base as i64))
                }
                _ => None,
            })
            .collect::<Vec<_>>();

        for (ItemId(target), resolved) in resolutions {
            match &mut self.items[target] {
                OutputItem::Offset { value, .. } => {
                    assert!(value.is_none(), "offset resolved more than once");
                    *value = Some(resolved);
                }
                _ => panic!("marker target is not an Offset item"),
            }
        }
    }

    fn emit(&self, total: usize) -> Result<Vec<u8>, WriteError> {
        let mut data = vec![0; total];
        let mut ctxt = WriteSlice::new(&mut data);
        for item in &self.items {
            match item {
                OutputItem::Range { offset, length } => {
                    let bytes = self
                        .source
                        .get(*offset..*offset + *length)
                        .ok_or(WriteError::BadValue)?;
                    ctxt.write_bytes(bytes)?;
                }
                OutputItem::Literal(bytes) => ctxt.write_bytes(bytes)?,
                OutputItem::Offset { encoding, value } => {
                    let value = value.expect("offset without a marker");
                    write_offset(&mut ctxt, *encoding, value)?;
                }
                OutputItem::Marker { .. } | OutputItem::Base => {}
            }
        }
        debug_assert!(ctxt.is_full());

        Ok(data)
    }
}

fn write_offset<C: WriteContext>(
    ctxt: &mut C,
    encoding: OffsetEncoding,
    value: i64,
) -> Result<(), WriteError> {
    match encoding {
        OffsetEncoding::Dict => {
            U8::write(ctxt, 29u8)?;
            I32Be::write(ctxt, i32::try_from(value)?)
        }
        OffsetEncoding::Index(width) => {
            let value = u32::try_from(value + 1)?;
            match width {
                1 => U8::write(ctxt, u8::try_from(value)?),
                2 => U16Be::write(ctxt, u16::try_from(value)?),
                3 => U24Be::write(ctxt, value),
                4 => U32Be::write(ctxt, value),
                _ => Err(WriteError::BadValue),
            }
        }
    }
}
