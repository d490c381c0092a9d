//! Bounds-checked, endian-aware reading over shared immutable buffers.
//!
//! [`RawBlob`] is a cheaply clonable view into a reference-counted byte
//! buffer.  Slicing a blob never copies; it produces a new view that still
//! remembers where it sits inside the root buffer, so diagnostics can always
//! report absolute container offsets.
//!
//! [`ByteCursor`] walks a blob.  Every read checks the remaining span first
//! and fails with [`CursorError::OutOfBounds`] instead of panicking; callers
//! decide whether that is fatal for a container or only for one entry.

use byteorder::{BigEndian, ByteOrder, LittleEndian};
use std::fmt;
use std::ops::Deref;
use std::sync::Arc;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CursorError {
    #[error("read of {requested} bytes at offset {offset} exceeds buffer ({available} bytes left)")]
    OutOfBounds { offset: u64, requested: u64, available: u64 },
    #[error("invalid UTF-8 string at offset {offset}")]
    InvalidUtf8 { offset: u64 },
}

/// Byte order of multi-byte scalar reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endian {
    Little,
    Big,
}

// ── RawBlob ──────────────────────────────────────────────────────────────────

/// Immutable byte sequence plus its offset/length inside the root buffer.
#[derive(Clone)]
pub struct RawBlob {
    data:   Arc<[u8]>,
    offset: usize,
    len:    usize,
}

impl RawBlob {
    pub fn new(bytes: Vec<u8>) -> Self {
        let len = bytes.len();
        Self { data: Arc::from(bytes), offset: 0, len }
    }

    pub fn empty() -> Self {
        Self::new(Vec::new())
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.data[self.offset..self.offset + self.len]
    }

    pub fn len(&self) -> usize { self.len }

    pub fn is_empty(&self) -> bool { self.len == 0 }

    /// Offset of this view inside the root buffer it was cut from.
    pub fn source_offset(&self) -> u64 { self.offset as u64 }

    /// Sub-view of `len` bytes starting at `start` (relative to this view).
    pub fn slice(&self, start: u64, len: u64) -> Result<RawBlob, CursorError> {
        let out_of_bounds = || CursorError::OutOfBounds {
            offset:    self.offset as u64 + start,
            requested: len,
            available: (self.len as u64).saturating_sub(start),
        };
        let end = start.checked_add(len).ok_or_else(out_of_bounds)?;
        if end > self.len as u64 {
            return Err(out_of_bounds());
        }
        Ok(RawBlob {
            data:   Arc::clone(&self.data),
            offset: self.offset + start as usize,
            len:    len as usize,
        })
    }
}

impl Deref for RawBlob {
    type Target = [u8];
    fn deref(&self) -> &[u8] { self.as_slice() }
}

impl AsRef<[u8]> for RawBlob {
    fn as_ref(&self) -> &[u8] { self.as_slice() }
}

impl From<Vec<u8>> for RawBlob {
    fn from(v: Vec<u8>) -> Self { RawBlob::new(v) }
}

impl From<&[u8]> for RawBlob {
    fn from(v: &[u8]) -> Self { RawBlob::new(v.to_vec()) }
}

impl PartialEq for RawBlob {
    fn eq(&self, other: &Self) -> bool { self.as_slice() == other.as_slice() }
}

impl Eq for RawBlob {}

impl fmt::Debug for RawBlob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RawBlob({} bytes @ {})", self.len, self.offset)
    }
}

// ── ByteCursor ───────────────────────────────────────────────────────────────

pub struct ByteCursor {
    blob: RawBlob,
    pos:  usize,
}

impl ByteCursor {
    pub fn new(blob: RawBlob) -> Self {
        Self { blob, pos: 0 }
    }

    pub fn position(&self) -> u64 { self.pos as u64 }

    pub fn remaining(&self) -> u64 { (self.blob.len() - self.pos) as u64 }

    pub fn blob(&self) -> &RawBlob { &self.blob }

    /// Move to an absolute position within the blob.  Seeking to exactly the
    /// end is allowed; any further read will fail.
    pub fn seek(&mut self, pos: u64) -> Result<(), CursorError> {
        if pos > self.blob.len() as u64 {
            return Err(CursorError::OutOfBounds {
                offset:    self.blob.source_offset() + pos,
                requested: 0,
                available: 0,
            });
        }
        self.pos = pos as usize;
        Ok(())
    }

    fn take(&mut self, n: u64) -> Result<&[u8], CursorError> {
        if n > self.remaining() {
            return Err(CursorError::OutOfBounds {
                offset:    self.blob.source_offset() + self.pos as u64,
                requested: n,
                available: self.remaining(),
            });
        }
        let start = self.pos;
        self.pos += n as usize;
        Ok(&self.blob.as_slice()[start..self.pos])
    }

    pub fn read_u8(&mut self) -> Result<u8, CursorError> {
        Ok(self.take(1)?[0])
    }

    pub fn read_u16(&mut self, endian: Endian) -> Result<u16, CursorError> {
        let b = self.take(2)?;
        Ok(match endian {
            Endian::Little => LittleEndian::read_u16(b),
            Endian::Big    => BigEndian::read_u16(b),
        })
    }

    pub fn read_u32(&mut self, endian: Endian) -> Result<u32, CursorError> {
        let b = self.take(4)?;
        Ok(match endian {
            Endian::Little => LittleEndian::read_u32(b),
            Endian::Big    => BigEndian::read_u32(b),
        })
    }

    pub fn read_u64(&mut self, endian: Endian) -> Result<u64, CursorError> {
        let b = self.take(8)?;
        Ok(match endian {
            Endian::Little => LittleEndian::read_u64(b),
            Endian::Big    => BigEndian::read_u64(b),
        })
    }

    pub fn read_i32(&mut self, endian: Endian) -> Result<i32, CursorError> {
        Ok(self.read_u32(endian)? as i32)
    }

    pub fn read_i64(&mut self, endian: Endian) -> Result<i64, CursorError> {
        Ok(self.read_u64(endian)? as i64)
    }

    pub fn read_f32(&mut self, endian: Endian) -> Result<f32, CursorError> {
        Ok(f32::from_bits(self.read_u32(endian)?))
    }

    /// Read `len` bytes as strict UTF-8.
    pub fn read_string(&mut self, len: u64) -> Result<String, CursorError> {
        let offset = self.blob.source_offset() + self.pos as u64;
        let bytes = self.take(len)?;
        std::str::from_utf8(bytes)
            .map(str::to_owned)
            .map_err(|_| CursorError::InvalidUtf8 { offset })
    }

    /// Skip forward to the next multiple of `boundary` (relative to the blob
    /// start).  A no-op when already aligned.
    pub fn read_aligned(&mut self, boundary: u64) -> Result<(), CursorError> {
        if boundary <= 1 {
            return Ok(());
        }
        let pad = (boundary - self.pos as u64 % boundary) % boundary;
        self.take(pad).map(|_| ())
    }

    /// Zero-copy sub-view of the next `len` bytes.
    pub fn slice(&mut self, len: u64) -> Result<RawBlob, CursorError> {
        let view = self.blob.slice(self.pos as u64, len)?;
        self.pos += len as usize;
        Ok(view)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn reads_both_endians() {
        let mut c = ByteCursor::new(RawBlob::new(vec![0x01, 0x02, 0x01, 0x02, 0xFF]));
        assert_eq!(c.read_u16(Endian::Little).unwrap(), 0x0201);
        assert_eq!(c.read_u16(Endian::Big).unwrap(), 0x0102);
        assert_eq!(c.read_u8().unwrap(), 0xFF);
        assert_eq!(c.remaining(), 0);
    }

    #[test]
    fn out_of_bounds_does_not_advance() {
        let mut c = ByteCursor::new(RawBlob::new(vec![1, 2, 3]));
        c.read_u8().unwrap();
        let err = c.read_u32(Endian::Little).unwrap_err();
        assert_eq!(err, CursorError::OutOfBounds { offset: 1, requested: 4, available: 2 });
        assert_eq!(c.position(), 1);
    }

    #[test]
    fn alignment_skips_padding() {
        let mut c = ByteCursor::new(RawBlob::new(vec![0u8; 8]));
        c.read_u8().unwrap();
        c.read_aligned(4).unwrap();
        assert_eq!(c.position(), 4);
        c.read_aligned(4).unwrap();
        assert_eq!(c.position(), 4);
    }

    #[test]
    fn slice_is_a_view_with_source_offset() {
        let root = RawBlob::new((0u8..32).collect());
        let mut c = ByteCursor::new(root.slice(8, 16).unwrap());
        c.read_u32(Endian::Little).unwrap();
        let view = c.slice(4).unwrap();
        assert_eq!(view.as_slice(), &[12, 13, 14, 15]);
        assert_eq!(view.source_offset(), 12);
        assert!(c.slice(9).is_err());
    }

    #[test]
    fn invalid_utf8_is_reported() {
        let mut c = ByteCursor::new(RawBlob::new(vec![0xC3, 0x28]));
        assert!(matches!(c.read_string(2), Err(CursorError::InvalidUtf8 { offset: 0 })));
    }

    proptest! {
        #[test]
        fn arbitrary_reads_never_panic(data in proptest::collection::vec(any::<u8>(), 0..64),
                                       ops in proptest::collection::vec(0u8..6, 0..32)) {
            let mut c = ByteCursor::new(RawBlob::new(data));
            for op in ops {
                let _ = match op {
                    0 => c.read_u8().map(|_| ()),
                    1 => c.read_u16(Endian::Big).map(|_| ()),
                    2 => c.read_u32(Endian::Little).map(|_| ()),
                    3 => c.read_u64(Endian::Little).map(|_| ()),
                    4 => c.read_aligned(4),
                    _ => c.slice(3).map(|_| ()),
                };
                prop_assert!(c.position() <= c.blob().len() as u64);
            }
        }
    }
}
