//! Container authoring: the write side of the directory and record formats.
//!
//! ```
//! use unbundle::builder::{BundleBuilder, RecordWriter};
//! use unbundle::cursor::Endian;
//! use unbundle::schema::TypeTag;
//!
//! let text = RecordWriter::new(TypeTag::TEXT_ASSET, 1, Endian::Little)
//!     .string("readme")
//!     .int32(0)
//!     .bytes(b"hello")
//!     .finish();
//! let mut b = BundleBuilder::new(2);
//! b.add_entry("readme", TypeTag::TEXT_ASSET, text);
//! let container = b.build()?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use byteorder::{BigEndian, LittleEndian, WriteBytesExt};
use std::io;
use thiserror::Error;

use crate::codec::{get_codec, CodecError, Compression};
use crate::cursor::Endian;
use crate::directory::{ENTRY_FLAG_CRC, V1_NAME_LEN};
use crate::header::{BundleHeader, FLAG_BIG_ENDIAN, HEADER_SIZE};
use crate::schema::TypeTag;

/// Entry payloads start on this boundary.
const PAYLOAD_ALIGN: usize = 16;

#[derive(Error, Debug)]
pub enum BuildError {
    #[error("format version {0} cannot store {1}")]
    Unsupported(u32, String),
    #[error(transparent)]
    Codec(#[from] CodecError),
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

enum PendingEntry {
    Data {
        name:        String,
        tag:         TypeTag,
        bytes:       Vec<u8>,
        compression: Compression,
    },
    /// Descriptor written verbatim, pointing wherever the caller says.
    Raw {
        name:   String,
        tag:    TypeTag,
        offset: u64,
        length: u64,
    },
}

pub struct BundleBuilder {
    version: u32,
    flags:   u32,
    entries: Vec<PendingEntry>,
}

impl BundleBuilder {
    pub fn new(version: u32) -> Self {
        Self { version, flags: 0, entries: Vec::new() }
    }

    /// Store object records big-endian.
    pub fn big_endian(&mut self) -> &mut Self {
        self.flags |= FLAG_BIG_ENDIAN;
        self
    }

    pub fn object_endian(&self) -> Endian {
        if self.flags & FLAG_BIG_ENDIAN != 0 { Endian::Big } else { Endian::Little }
    }

    pub fn add_entry(&mut self, name: &str, tag: TypeTag, bytes: Vec<u8>) -> &mut Self {
        self.add_compressed_entry(name, tag, bytes, Compression::None)
    }

    pub fn add_compressed_entry(
        &mut self,
        name:        &str,
        tag:         TypeTag,
        bytes:       Vec<u8>,
        compression: Compression,
    ) -> &mut Self {
        self.entries.push(PendingEntry::Data { name: name.to_owned(), tag, bytes, compression });
        self
    }

    pub fn add_raw_descriptor(&mut self, name: &str, tag: TypeTag, offset: u64, length: u64) -> &mut Self {
        self.entries.push(PendingEntry::Raw { name: name.to_owned(), tag, offset, length });
        self
    }

    pub fn build(&self) -> Result<Vec<u8>, BuildError> {
        let mut out = vec![0u8; HEADER_SIZE];
        // (name, tag, offset, stored_len, uncompressed_len, compression, crc)
        let mut records = Vec::with_capacity(self.entries.len());

        for entry in &self.entries {
            match entry {
                PendingEntry::Data { name, tag, bytes, compression } => {
                    if self.version == 1 && *compression != Compression::None {
                        return Err(BuildError::Unsupported(1, "compressed entries".into()));
                    }
                    let stored = get_codec(*compression).compress(bytes)?;
                    let offset = if stored.is_empty() {
                        0
                    } else {
                        out.resize(out.len().next_multiple_of(PAYLOAD_ALIGN), 0);
                        out.len() as u64
                    };
                    let crc = crc32fast::hash(&stored);
                    out.extend_from_slice(&stored);
                    records.push((name, *tag, offset, stored.len() as u64, bytes.len() as u64, *compression, Some(crc)));
                }
                PendingEntry::Raw { name, tag, offset, length } => {
                    records.push((name, *tag, *offset, *length, *length, Compression::None, None));
                }
            }
        }

        out.resize(out.len().next_multiple_of(PAYLOAD_ALIGN), 0);
        let directory_offset = out.len() as u64;
        for (name, tag, offset, stored_len, uncompressed_len, compression, crc) in records {
            match self.version {
                1 => {
                    if name.len() > V1_NAME_LEN {
                        return Err(BuildError::Unsupported(1, format!("name longer than {V1_NAME_LEN} bytes")));
                    }
                    let offset = u32::try_from(offset)
                        .map_err(|_| BuildError::Unsupported(1, "offsets above 4 GiB".into()))?;
                    let length = u32::try_from(stored_len)
                        .map_err(|_| BuildError::Unsupported(1, "entries above 4 GiB".into()))?;
                    let mut padded = [0u8; V1_NAME_LEN];
                    padded[..name.len()].copy_from_slice(name.as_bytes());
                    out.extend_from_slice(&padded);
                    out.write_u32::<LittleEndian>(tag.0)?;
                    out.write_u32::<LittleEndian>(offset)?;
                    out.write_u32::<LittleEndian>(length)?;
                }
                2 => {
                    out.write_u16::<LittleEndian>(name.len() as u16)?;
                    out.extend_from_slice(name.as_bytes());
                    out.resize(out.len().next_multiple_of(4), 0);
                    out.write_u32::<LittleEndian>(tag.0)?;
                    out.write_u16::<LittleEndian>(compression.id())?;
                    out.write_u16::<LittleEndian>(if crc.is_some() { ENTRY_FLAG_CRC } else { 0 })?;
                    out.write_u64::<LittleEndian>(offset)?;
                    out.write_u64::<LittleEndian>(stored_len)?;
                    out.write_u64::<LittleEndian>(uncompressed_len)?;
                    out.write_u32::<LittleEndian>(crc.unwrap_or(0))?;
                }
                v => return Err(BuildError::Unsupported(v, "any directory".into())),
            }
        }

        let header = BundleHeader {
            version: self.version,
            flags: self.flags,
            directory_offset,
            entry_count: self.entries.len() as u32,
        };
        header.write(&mut out[..HEADER_SIZE])?;
        Ok(out)
    }
}

// ── RecordWriter ─────────────────────────────────────────────────────────────

/// Serializes one object record field by field.  The caller is responsible
/// for following the schema of `tag`.
pub struct RecordWriter {
    buf:    Vec<u8>,
    endian: Endian,
}

impl RecordWriter {
    pub fn new(tag: TypeTag, id: u64, endian: Endian) -> Self {
        let mut w = Self { buf: Vec::new(), endian };
        w.put_u32(tag.0);
        w.put_u64(id);
        w
    }

    fn put_u32(&mut self, v: u32) {
        // Writes into a Vec cannot fail.
        let _ = match self.endian {
            Endian::Little => self.buf.write_u32::<LittleEndian>(v),
            Endian::Big    => self.buf.write_u32::<BigEndian>(v),
        };
    }

    fn put_u64(&mut self, v: u64) {
        let _ = match self.endian {
            Endian::Little => self.buf.write_u64::<LittleEndian>(v),
            Endian::Big    => self.buf.write_u64::<BigEndian>(v),
        };
    }

    fn align(&mut self) {
        let len = self.buf.len().next_multiple_of(4);
        self.buf.resize(len, 0);
    }

    pub fn int32(mut self, v: i32) -> Self { self.put_u32(v as u32); self }

    pub fn uint32(mut self, v: u32) -> Self { self.put_u32(v); self }

    pub fn int64(mut self, v: i64) -> Self { self.put_u64(v as u64); self }

    pub fn float32(mut self, v: f32) -> Self { self.put_u32(v.to_bits()); self }

    pub fn string(self, s: &str) -> Self { self.bytes(s.as_bytes()) }

    pub fn bytes(mut self, b: &[u8]) -> Self {
        self.put_u32(b.len() as u32);
        self.buf.extend_from_slice(b);
        self.align();
        self
    }

    pub fn reference(mut self, id: u64) -> Self { self.put_u64(id); self }

    pub fn references(mut self, ids: &[u64]) -> Self {
        self.put_u32(ids.len() as u32);
        for &id in ids {
            self.put_u64(id);
        }
        self
    }

    pub fn finish(self) -> Vec<u8> { self.buf }
}
