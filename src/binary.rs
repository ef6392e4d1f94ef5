/// Read binary data
pub mod read;

/// Write binary data
pub mod write;

#[derive(Copy, Clone)]
pub enum U8 {}

#[derive(Copy, Clone)]
pub enum U16Be {}

#[derive(Copy, Clone)]
pub enum I16Be {}

#[derive(Copy, Clone)]
pub enum U24Be {}

#[derive(Copy, Clone)]
pub enum U32Be {}

#[derive(Copy, Clone)]
pub enum I32Be {}
