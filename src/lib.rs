#![warn(rust_2018_idioms)]

//! Parsing and subsetting of CFF font programs.
//!
//! A CFF FontSet is read with [`cff::CFF`], and [`subset::subset`] produces a FontSet holding a
//! single font that only retains the data of the requested glyphs. Glyph IDs are not changed by
//! subsetting, which makes the output suitable for embedding in a PDF document alongside content
//! streams that reference the original glyph IDs.

/// Reading and writing of binary data.
pub mod binary;
pub mod cff;
pub mod error;
pub mod size;
pub mod subset;
