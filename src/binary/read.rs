#![allow(missing_docs)]

//! Parse binary data
//!
//! Reading is split between two types. A `ReadScope` is a window onto the font program that
//! remembers where it starts relative to the scope it was derived from. This lets offsets found
//! inside one structure be turned back into positions within the whole program, which the
//! subsetter needs when it copies ranges of the source into its output. A `ReadCtxt` is a cursor
//! that consumes a scope from the front.

use std::fmt;
use std::marker::PhantomData;
use std::slice::ChunksExact;

use crate::binary::{I16Be, I32Be, U16Be, U24Be, U32Be, U8};
use crate::error::ParseError;
use crate::size;

#[derive(Debug, Copy, Clone)]
pub struct ReadEof {}

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct ReadScope<'a> {
    base: usize,
    data: &'a [u8],
}

#[derive(Clone)]
pub struct ReadCtxt<'a> {
    scope: ReadScope<'a>,
    offset: usize,
}

pub trait ReadBinary {
    type HostType<'a>: Sized;

    fn read<'a>(ctxt: &mut ReadCtxt<'a>) -> Result<Self::HostType<'a>, ParseError>;
}

pub trait ReadBinaryDep {
    type Args<'a>: Copy;
    type HostType<'a>: Sized;

    fn read_dep<'a>(
        ctxt: &mut ReadCtxt<'a>,
        args: Self::Args<'a>,
    ) -> Result<Self::HostType<'a>, ParseError>;
}

/// A value that always occupies `SIZE` bytes.
pub trait ReadFixed {
    type HostType: Sized;

    const SIZE: usize;

    /// Decode a value from `bytes`, which is exactly `SIZE` bytes long.
    fn decode(bytes: &[u8]) -> Self::HostType;
}

/// A type that is built from a value read with `ReadType`.
pub trait ReadFrom {
    type ReadType: ReadFixed;

    fn read_from(value: <Self::ReadType as ReadFixed>::HostType) -> Self;
}

impl<T> ReadFixed for T
where
    T: ReadFrom,
{
    type HostType = T;

    const SIZE: usize = T::ReadType::SIZE;

    fn decode(bytes: &[u8]) -> T {
        T::read_from(T::ReadType::decode(bytes))
    }
}

impl<T> ReadBinary for T
where
    T: ReadFixed,
{
    type HostType<'a> = T::HostType;

    fn read<'a>(ctxt: &mut ReadCtxt<'a>) -> Result<Self::HostType<'a>, ParseError> {
        let bytes = ctxt.read_slice(T::SIZE)?;
        Ok(T::decode(bytes))
    }
}

impl<T> ReadBinaryDep for T
where
    T: ReadBinary,
{
    type Args<'a> = ();
    type HostType<'a> = T::HostType<'a>;

    fn read_dep<'a>(
        ctxt: &mut ReadCtxt<'a>,
        (): Self::Args<'a>,
    ) -> Result<Self::HostType<'a>, ParseError> {
        T::read(ctxt)
    }
}

/// A borrowed array of fixed size values.
#[derive(Clone)]
pub struct ReadArray<'a, T: ReadFixed> {
    scope: ReadScope<'a>,
    length: usize,
    phantom: PhantomData<T>,
}

pub struct ReadArrayIter<'a, T: ReadFixed> {
    chunks: ChunksExact<'a, u8>,
    phantom: PhantomData<T>,
}

impl<'a> ReadScope<'a> {
    pub fn new(data: &'a [u8]) -> ReadScope<'a> {
        ReadScope { base: 0, data }
    }

    pub fn data(&self) -> &'a [u8] {
        self.data
    }

    /// Position of the start of this scope relative to the scope it was created from with `new`.
    pub fn base(&self) -> usize {
        self.base
    }

    pub fn offset(&self, offset: usize) -> ReadScope<'a> {
        let base = self.base + offset;
        let data = self.data.get(offset..).unwrap_or(&[]);
        ReadScope { base, data }
    }

    pub fn offset_length(&self, offset: usize, length: usize) -> Result<ReadScope<'a>, ParseError> {
        if offset < self.data.len() || length == 0 {
            let data = self.data.get(offset..).unwrap_or(&[]);
            match data.get(..length) {
                Some(data) => Ok(ReadScope {
                    base: self.base + offset,
                    data,
                }),
                None => Err(ParseError::BadEof),
            }
        } else {
            Err(ParseError::BadOffset)
        }
    }

    pub fn ctxt(&self) -> ReadCtxt<'a> {
        ReadCtxt::new(*self)
    }

    pub fn read<T: ReadBinaryDep<Args<'a> = ()>>(&self) -> Result<T::HostType<'a>, ParseError> {
        self.ctxt().read::<T>()
    }

    pub fn read_dep<T: ReadBinaryDep>(
        &self,
        args: T::Args<'a>,
    ) -> Result<T::HostType<'a>, ParseError> {
        self.ctxt().read_dep::<T>(args)
    }
}

impl<'a> ReadCtxt<'a> {
    /// ReadCtxt is constructed by calling `ReadScope::ctxt`.
    fn new(scope: ReadScope<'a>) -> ReadCtxt<'a> {
        ReadCtxt { scope, offset: 0 }
    }

    pub fn check(&self, cond: bool) -> Result<(), ParseError> {
        match cond {
            true => Ok(()),
            false => Err(ParseError::BadValue),
        }
    }

    /// The scope of the unread data.
    pub fn scope(&self) -> ReadScope<'a> {
        self.scope.offset(self.offset)
    }

    /// The position of the cursor, measured the same way as `ReadScope::base`.
    pub fn position(&self) -> usize {
        self.scope.base + self.offset
    }

    pub fn read<T: ReadBinaryDep<Args<'a> = ()>>(&mut self) -> Result<T::HostType<'a>, ParseError> {
        T::read_dep(self, ())
    }

    pub fn read_dep<T: ReadBinaryDep>(
        &mut self,
        args: T::Args<'a>,
    ) -> Result<T::HostType<'a>, ParseError> {
        T::read_dep(self, args)
    }

    pub fn bytes_available(&self) -> bool {
        self.offset < self.scope.data.len()
    }

    pub fn read_u8(&mut self) -> Result<u8, ReadEof> {
        let bytes = self.read_slice(size::U8)?;
        Ok(bytes[0])
    }

    pub fn read_u16be(&mut self) -> Result<u16, ReadEof> {
        let bytes = self.read_slice(size::U16)?;
        Ok(u16::from_be_bytes([bytes[0], bytes[1]]))
    }

    pub fn read_i16be(&mut self) -> Result<i16, ReadEof> {
        let bytes = self.read_slice(size::I16)?;
        Ok(i16::from_be_bytes([bytes[0], bytes[1]]))
    }

    pub fn read_i32be(&mut self) -> Result<i32, ReadEof> {
        let bytes = self.read_slice(size::I32)?;
        Ok(i32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    pub fn read_array<T: ReadFixed>(&mut self, length: usize) -> Result<ReadArray<'a, T>, ParseError> {
        let byte_len = length.checked_mul(T::SIZE).ok_or(ParseError::LimitExceeded)?;
        let scope = self.read_scope(byte_len)?;
        Ok(ReadArray {
            scope,
            length,
            phantom: PhantomData,
        })
    }

    /// Read up to and including the byte holding the supplied nibble.
    pub fn read_until_nibble(&mut self, nibble: u8) -> Result<&'a [u8], ReadEof> {
        let end = self.scope.data[self.offset..]
            .iter()
            .position(|&b| (b >> 4) == nibble || (b & 0xF) == nibble)
            .ok_or(ReadEof {})?;
        self.read_slice(end + 1)
    }

    pub fn read_scope(&mut self, length: usize) -> Result<ReadScope<'a>, ReadEof> {
        match self.scope.offset_length(self.offset, length) {
            Ok(scope) => {
                self.offset += length;
                Ok(scope)
            }
            Err(_) => Err(ReadEof {}),
        }
    }

    pub fn read_slice(&mut self, length: usize) -> Result<&'a [u8], ReadEof> {
        let scope = self.read_scope(length)?;
        Ok(scope.data)
    }
}

impl<'a, T: ReadFixed> ReadArray<'a, T> {
    pub fn len(&self) -> usize {
        self.length
    }

    pub fn is_empty(&self) -> bool {
        self.length == 0
    }

    /// The number of bytes the array occupies.
    pub fn byte_len(&self) -> usize {
        self.scope.data.len()
    }

    pub fn iter(&self) -> ReadArrayIter<'a, T> {
        ReadArrayIter {
            chunks: self.scope.data.chunks_exact(T::SIZE),
            phantom: PhantomData,
        }
    }
}

impl<'a, 'b, T: ReadFixed> IntoIterator for &'b ReadArray<'a, T> {
    type Item = T::HostType;
    type IntoIter = ReadArrayIter<'a, T>;

    fn into_iter(self) -> ReadArrayIter<'a, T> {
        self.iter()
    }
}

impl<'a, T: ReadFixed> Iterator for ReadArrayIter<'a, T> {
    type Item = T::HostType;

    fn next(&mut self) -> Option<T::HostType> {
        self.chunks.next().map(T::decode)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.chunks.size_hint()
    }
}

impl<'a, T: ReadFixed> ExactSizeIterator for ReadArrayIter<'a, T> {}

impl ReadFixed for U8 {
    type HostType = u8;

    const SIZE: usize = size::U8;

    fn decode(bytes: &[u8]) -> u8 {
        bytes[0]
    }
}

impl ReadFixed for U16Be {
    type HostType = u16;

    const SIZE: usize = size::U16;

    fn decode(bytes: &[u8]) -> u16 {
        u16::from_be_bytes([bytes[0], bytes[1]])
    }
}

impl ReadFixed for I16Be {
    type HostType = i16;

    const SIZE: usize = size::I16;

    fn decode(bytes: &[u8]) -> i16 {
        i16::from_be_bytes([bytes[0], bytes[1]])
    }
}

impl ReadFixed for U24Be {
    type HostType = u32;

    const SIZE: usize = size::U24;

    fn decode(bytes: &[u8]) -> u32 {
        u32::from_be_bytes([0, bytes[0], bytes[1], bytes[2]])
    }
}

impl ReadFixed for U32Be {
    type HostType = u32;

    const SIZE: usize = size::U32;

    fn decode(bytes: &[u8]) -> u32 {
        u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])
    }
}

impl ReadFixed for I32Be {
    type HostType = i32;

    const SIZE: usize = size::I32;

    fn decode(bytes: &[u8]) -> i32 {
        i32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])
    }
}

impl<T1, T2> ReadFixed for (T1, T2)
where
    T1: ReadFixed,
    T2: ReadFixed,
{
    type HostType = (T1::HostType, T2::HostType);

    const SIZE: usize = T1::SIZE + T2::SIZE;

    fn decode(bytes: &[u8]) -> Self::HostType {
        let (b1, b2) = bytes.split_at(T1::SIZE);
        (T1::decode(b1), T2::decode(b2))
    }
}

impl<'a, T> fmt::Debug for ReadArray<'a, T>
where
    T: ReadFixed,
    T::HostType: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> Result<(), fmt::Error> {
        f.debug_list().entries(self.iter()).finish()
    }
}
