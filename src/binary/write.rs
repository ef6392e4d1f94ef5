#![deny(missing_docs)]

//! Write binary data

use crate::binary::{I16Be, I32Be, U16Be, U24Be, U32Be, U8};
use crate::error::WriteError;

/// An in-memory buffer that implements `WriteContext`.
#[derive(Default)]
pub struct WriteBuffer {
    data: Vec<u8>,
}

/// A `WriteContext` that fills a pre-sized slice from the front.
///
/// Writing past the end of the slice is an error rather than a reallocation.
pub struct WriteSlice<'a> {
    offset: usize,
    data: &'a mut [u8],
}

/// Trait that describes a type that can be written to a `WriteContext` in binary form.
pub trait WriteBinary<HostType = Self> {
    /// The type of the value returned by `write`.
    type Output;

    /// Write the binary representation of Self to `ctxt`.
    fn write<C: WriteContext>(ctxt: &mut C, val: HostType) -> Result<Self::Output, WriteError>;
}

/// Trait for types that can have binary data written to them.
pub trait WriteContext {
    /// Write each value yielded by `iter` using `T`.
    fn write_iter<T, HostType>(
        &mut self,
        iter: impl Iterator<Item = HostType>,
    ) -> Result<(), WriteError>
    where
        Self: Sized,
        T: WriteBinary<HostType>,
    {
        for val in iter {
            T::write(self, val)?;
        }

        Ok(())
    }

    /// Write a slice of bytes to a `WriteContext`.
    fn write_bytes(&mut self, data: &[u8]) -> Result<(), WriteError>;
}

impl<T> WriteBinary<T> for U8
where
    T: Into<u8>,
{
    type Output = ();

    fn write<C: WriteContext>(ctxt: &mut C, t: T) -> Result<(), WriteError> {
        let val: u8 = t.into();
        ctxt.write_bytes(&[val])
    }
}

impl<T> WriteBinary<T> for I16Be
where
    T: Into<i16>,
{
    type Output = ();

    fn write<C: WriteContext>(ctxt: &mut C, t: T) -> Result<(), WriteError> {
        let val: i16 = t.into();
        ctxt.write_bytes(&val.to_be_bytes())
    }
}

impl<T> WriteBinary<T> for U16Be
where
    T: Into<u16>,
{
    type Output = ();

    fn write<C: WriteContext>(ctxt: &mut C, t: T) -> Result<(), WriteError> {
        let val: u16 = t.into();
        ctxt.write_bytes(&val.to_be_bytes())
    }
}

impl<T> WriteBinary<T> for U24Be
where
    T: Into<u32>,
{
    type Output = ();

    fn write<C: WriteContext>(ctxt: &mut C, t: T) -> Result<(), WriteError> {
        let val: u32 = t.into();
        if val > 0xFF_FFFF {
            return Err(WriteError::BadValue);
        }
        ctxt.write_bytes(&val.to_be_bytes()[1..4])
    }
}

impl<T> WriteBinary<T> for I32Be
where
    T: Into<i32>,
{
    type Output = ();

    fn write<C: WriteContext>(ctxt: &mut C, t: T) -> Result<(), WriteError> {
        let val: i32 = t.into();
        ctxt.write_bytes(&val.to_be_bytes())
    }
}

impl<T> WriteBinary<T> for U32Be
where
    T: Into<u32>,
{
    type Output = ();

    fn write<C: WriteContext>(ctxt: &mut C, t: T) -> Result<(), WriteError> {
        let val: u32 = t.into();
        ctxt.write_bytes(&val.to_be_bytes())
    }
}

impl WriteContext for WriteBuffer {
    fn write_bytes(&mut self, data: &[u8]) -> Result<(), WriteError> {
        self.data.extend_from_slice(data);
        Ok(())
    }
}

impl<'a> WriteContext for WriteSlice<'a> {
    fn write_bytes(&mut self, data: &[u8]) -> Result<(), WriteError> {
        let end = self.offset + data.len();
        let dest = self
            .data
            .get_mut(self.offset..end)
            .ok_or(WriteError::BadValue)?;
        dest.copy_from_slice(data);
        self.offset = end;
        Ok(())
    }
}

impl WriteBuffer {
    /// Create a new, empty `WriteBuffer`
    pub fn new() -> Self {
        WriteBuffer { data: Vec::new() }
    }

    /// Retrieve a slice of the data held by this buffer
    pub fn bytes(&self) -> &[u8] {
        &self.data
    }

    /// Returns the current size of the data held by this buffer
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns `true` if nothing has been written to this buffer
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Consume `self` and return the inner buffer
    pub fn into_inner(self) -> Vec<u8> {
        self.data
    }
}

impl<'a> WriteSlice<'a> {
    /// Create a `WriteSlice` that will fill `data`.
    pub fn new(data: &'a mut [u8]) -> Self {
        WriteSlice { offset: 0, data }
    }

    /// Returns `true` once every byte of the slice has been written.
    pub fn is_full(&self) -> bool {
        self.offset == self.data.len()
    }
}
