//! Entry compression codecs.
//!
//! # Identity rules
//! Each directory record (v2 layout) carries a `u16` compression id.  The
//! values are frozen and shared with the engine's own bundle tooling:
//!
//! | id | codec |
//! |----|-------|
//! | 0  | none  |
//! | 1  | LZMA (5-byte properties header, no size field) |
//! | 2  | LZ4 raw block |
//! | 3  | LZ4HC raw block (same wire format as LZ4) |
//!
//! The uncompressed size always comes from the directory record; codecs
//! never trust a size embedded in the payload.

use std::io::Cursor;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Compression {
    None,
    Lzma,
    Lz4,
    Lz4Hc,
}

impl Compression {
    pub fn from_id(id: u16) -> Option<Self> {
        match id {
            0 => Some(Compression::None),
            1 => Some(Compression::Lzma),
            2 => Some(Compression::Lz4),
            3 => Some(Compression::Lz4Hc),
            _ => None,
        }
    }

    pub fn id(self) -> u16 {
        match self {
            Compression::None  => 0,
            Compression::Lzma  => 1,
            Compression::Lz4   => 2,
            Compression::Lz4Hc => 3,
        }
    }

    /// Human-readable name (diagnostics only).
    pub fn name(self) -> &'static str {
        match self {
            Compression::None  => "none",
            Compression::Lzma  => "lzma",
            Compression::Lz4   => "lz4",
            Compression::Lz4Hc => "lz4hc",
        }
    }
}

// ── Error type ───────────────────────────────────────────────────────────────

#[derive(Error, Debug)]
pub enum CodecError {
    #[error("Compression error: {0}")]
    Compression(String),
    #[error("Decompression error: {0}")]
    Decompression(String),
    #[error("Unknown compression id {0}")]
    UnknownCompression(u16),
    #[error("Decompressed size {actual} does not match declared size {expected}")]
    SizeMismatch { expected: usize, actual: usize },
}

// ── Codec trait ──────────────────────────────────────────────────────────────

pub trait Codec: Send + Sync {
    fn compression(&self) -> Compression;
    fn compress(&self, data: &[u8]) -> Result<Vec<u8>, CodecError>;
    fn decompress(&self, data: &[u8], uncompressed_len: usize) -> Result<Vec<u8>, CodecError>;
}

pub struct NoneCodec;
impl Codec for NoneCodec {
    fn compression(&self) -> Compression { Compression::None }
    fn compress(&self, data: &[u8]) -> Result<Vec<u8>, CodecError> { Ok(data.to_vec()) }
    fn decompress(&self, data: &[u8], _: usize) -> Result<Vec<u8>, CodecError> { Ok(data.to_vec()) }
}

pub struct Lz4Codec(pub Compression);
impl Codec for Lz4Codec {
    fn compression(&self) -> Compression { self.0 }
    fn compress(&self, data: &[u8]) -> Result<Vec<u8>, CodecError> {
        Ok(lz4_flex::block::compress(data))
    }
    fn decompress(&self, data: &[u8], uncompressed_len: usize) -> Result<Vec<u8>, CodecError> {
        lz4_flex::block::decompress(data, uncompressed_len)
            .map_err(|e| CodecError::Decompression(e.to_string()))
    }
}

pub struct LzmaCodec;
impl Codec for LzmaCodec {
    fn compression(&self) -> Compression { Compression::Lzma }
    fn compress(&self, data: &[u8]) -> Result<Vec<u8>, CodecError> {
        let mut out = Vec::new();
        let opts = lzma_rs::compress::Options {
            unpacked_size: lzma_rs::compress::UnpackedSize::SkipWritingToHeader,
        };
        lzma_rs::lzma_compress_with_options(&mut Cursor::new(data), &mut out, &opts)
            .map_err(|e| CodecError::Compression(e.to_string()))?;
        Ok(out)
    }
    fn decompress(&self, data: &[u8], uncompressed_len: usize) -> Result<Vec<u8>, CodecError> {
        // Grows with the decoded stream; the declared size is not trusted for allocation.
        let mut out = Vec::new();
        let opts = lzma_rs::decompress::Options {
            unpacked_size: lzma_rs::decompress::UnpackedSize::UseProvided(Some(uncompressed_len as u64)),
            memlimit:      Some(MAX_ENTRY_SIZE as usize),
            ..Default::default()
        };
        lzma_rs::lzma_decompress_with_options(&mut Cursor::new(data), &mut out, &opts)
            .map_err(|e| CodecError::Decompression(e.to_string()))?;
        Ok(out)
    }
}

// ── Size limits ──────────────────────────────────────────────────────────────

/// Largest decompressed entry accepted, whatever the directory declares.
pub const MAX_ENTRY_SIZE: u64 = 1 << 30;

/// LZ4 block format cannot expand a byte by more than this factor.
const LZ4_MAX_RATIO: u64 = 255;

/// Upper bound on the decompressed size of `stored_len` bytes of `compression`.
pub fn max_uncompressed_len(compression: Compression, stored_len: u64) -> u64 {
    let bound = match compression {
        Compression::None                     => stored_len,
        Compression::Lz4 | Compression::Lz4Hc => stored_len.saturating_mul(LZ4_MAX_RATIO).saturating_add(16),
        Compression::Lzma                    => MAX_ENTRY_SIZE,
    };
    bound.min(MAX_ENTRY_SIZE)
}

// ── Factory ──────────────────────────────────────────────────────────────────

pub fn get_codec(compression: Compression) -> Box<dyn Codec> {
    match compression {
        Compression::None  => Box::new(NoneCodec),
        Compression::Lzma  => Box::new(LzmaCodec),
        Compression::Lz4   => Box::new(Lz4Codec(Compression::Lz4)),
        Compression::Lz4Hc => Box::new(Lz4Codec(Compression::Lz4Hc)),
    }
}

/// Decompress an entry payload and verify the result has the declared size.
pub fn decompress_entry(
    compression:      Compression,
    data:             &[u8],
    uncompressed_len: usize,
) -> Result<Vec<u8>, CodecError> {
    let out = get_codec(compression).decompress(data, uncompressed_len)?;
    if out.len() != uncompressed_len {
        return Err(CodecError::SizeMismatch { expected: uncompressed_len, actual: out.len() });
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Vec<u8> {
        b"texture texture texture audio audio mesh".repeat(20)
    }

    #[test]
    fn lz4_block_restores_payload() {
        let data = sample();
        let packed = get_codec(Compression::Lz4).compress(&data).unwrap();
        assert!(packed.len() < data.len());
        assert_eq!(decompress_entry(Compression::Lz4, &packed, data.len()).unwrap(), data);
    }

    #[test]
    fn lzma_without_size_header_restores_payload() {
        let data = sample();
        let packed = get_codec(Compression::Lzma).compress(&data).unwrap();
        assert_eq!(decompress_entry(Compression::Lzma, &packed, data.len()).unwrap(), data);
    }

    #[test]
    fn declared_size_is_enforced() {
        let err = decompress_entry(Compression::None, b"abc", 4).unwrap_err();
        assert!(matches!(err, CodecError::SizeMismatch { expected: 4, actual: 3 }));
    }

    #[test]
    fn lzma_declared_size_beyond_stream_fails() {
        let data = sample();
        let packed = get_codec(Compression::Lzma).compress(&data).unwrap();
        assert!(decompress_entry(Compression::Lzma, &packed, MAX_ENTRY_SIZE as usize).is_err());
    }

    #[test]
    fn size_bounds_follow_codec() {
        assert_eq!(max_uncompressed_len(Compression::None, 10), 10);
        assert_eq!(max_uncompressed_len(Compression::Lz4, 10), 10 * 255 + 16);
        assert_eq!(max_uncompressed_len(Compression::Lz4Hc, u64::MAX), MAX_ENTRY_SIZE);
        assert_eq!(max_uncompressed_len(Compression::Lzma, 1), MAX_ENTRY_SIZE);
    }

    #[test]
    fn ids_are_stable() {
        for id in 0..4u16 {
            assert_eq!(Compression::from_id(id).unwrap().id(), id);
        }
        assert_eq!(Compression::from_id(9), None);
    }
}
