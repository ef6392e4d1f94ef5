//! Error types

use crate::binary::read::ReadEof;
use std::fmt;

/// Errors that originate when parsing binary data
#[derive(Clone, Eq, PartialEq, Debug)]
pub enum ParseError {
    BadEof,
    BadValue,
    BadVersion,
    BadOffset,
    BadIndex,
    LimitExceeded,
    MissingValue,
    NotImplemented,
    /// An INDEX with a truncated header, an invalid offset size, or offsets that decrease or
    /// point past the end of the data.
    MalformedIndex,
    /// A DICT operator with no entry in the operator table. One byte operators hold the byte,
    /// escaped operators hold `12 << 8` plus the second byte.
    UnsupportedDictOperator(u16),
}

impl From<ReadEof> for ParseError {
    fn from(_error: ReadEof) -> Self {
        ParseError::BadEof
    }
}

impl From<std::num::TryFromIntError> for ParseError {
    fn from(_error: std::num::TryFromIntError) -> Self {
        ParseError::BadValue
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseError::BadEof => write!(f, "end of data reached unexpectedly"),
            ParseError::BadValue => write!(f, "invalid value"),
            ParseError::BadVersion => write!(f, "unexpected data version"),
            ParseError::BadOffset => write!(f, "invalid data offset"),
            ParseError::BadIndex => write!(f, "invalid data index"),
            ParseError::LimitExceeded => write!(f, "limit exceeded"),
            ParseError::MissingValue => write!(f, "an expected data value was missing"),
            ParseError::NotImplemented => write!(f, "feature not implemented"),
            ParseError::MalformedIndex => write!(f, "malformed INDEX"),
            ParseError::UnsupportedDictOperator(op) if *op > 0xFF => {
                write!(f, "unsupported DICT operator 12 {}", op & 0xFF)
            }
            ParseError::UnsupportedDictOperator(op) => {
                write!(f, "unsupported DICT operator {}", op)
            }
        }
    }
}

impl std::error::Error for ParseError {}

/// Errors that originate when writing binary data
#[derive(Clone, Eq, PartialEq, Debug)]
pub enum WriteError {
    BadValue,
}

impl From<std::num::TryFromIntError> for WriteError {
    fn from(_error: std::num::TryFromIntError) -> Self {
        WriteError::BadValue
    }
}

impl fmt::Display for WriteError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WriteError::BadValue => write!(f, "write: bad value"),
        }
    }
}

impl std::error::Error for WriteError {}

/// Errors that end a subsetting job
#[derive(Clone, Eq, PartialEq, Debug)]
pub enum SubsetError {
    /// The requested font name is not present in the FontSet.
    FontNotFound(String),
    Parse(ParseError),
    Write(WriteError),
}

impl From<ParseError> for SubsetError {
    fn from(error: ParseError) -> Self {
        SubsetError::Parse(error)
    }
}

impl From<WriteError> for SubsetError {
    fn from(error: WriteError) -> Self {
        SubsetError::Write(error)
    }
}

impl fmt::Display for SubsetError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SubsetError::FontNotFound(name) => write!(f, "font '{}' not found in FontSet", name),
            SubsetError::Parse(err) => write!(f, "subset: parse error: {}", err),
            SubsetError::Write(err) => write!(f, "subset: write error: {}", err),
        }
    }
}

impl std::error::Error for SubsetError {}
