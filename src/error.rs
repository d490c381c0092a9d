use std::io;
use thiserror::Error;

use crate::codec::CodecError;
use crate::cursor::CursorError;

/// Failures while reading a container or one of its entries.
///
/// `UnrecognizedFormat` is container-fatal: nothing in the directory can be
/// trusted.  Every other variant is scoped to a single entry and ends up as
/// a `Failed` manifest row.
#[derive(Error, Debug)]
pub enum BundleError {
    #[error("unrecognized container format: {0}")]
    UnrecognizedFormat(String),
    #[error("out of bounds: {0}")]
    OutOfBounds(CursorError),
    #[error("malformed record: {0}")]
    InvalidRecord(CursorError),
    #[error("entry '{entry}' declares {declared} decompressed bytes, more than {limit} allowed for {stored} stored bytes")]
    ImplausibleSize { entry: String, declared: u64, stored: u64, limit: u64 },
    #[error("checksum mismatch in entry '{entry}': expected {expected:08x}, got {actual:08x}")]
    ChecksumMismatch { entry: String, expected: u32, actual: u32 },
    #[error("decompression failed: {0}")]
    Decompression(#[from] CodecError),
    #[error("object id {0} is declared by more than one entry")]
    DuplicateObject(u64),
    #[error("object id 0 is reserved")]
    InvalidObjectId,
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

impl From<CursorError> for BundleError {
    fn from(e: CursorError) -> Self {
        match e {
            CursorError::OutOfBounds { .. } => BundleError::OutOfBounds(e),
            CursorError::InvalidUtf8 { .. } => BundleError::InvalidRecord(e),
        }
    }
}

impl BundleError {
    /// True for errors that invalidate the whole container.
    pub fn is_fatal(&self) -> bool {
        matches!(self, BundleError::UnrecognizedFormat(_) | BundleError::Io(_))
    }
}
