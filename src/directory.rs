//! Container header + directory parsing.
//!
//! Record layouts differ per format version.  The layout is chosen once,
//! from [`LAYOUTS`], right after the header is read; nothing below that
//! point branches on the version again.
//!
//! ## v1 record (44 bytes, fixed)
//! ```text
//! name[32] (NUL padded) | type_tag u32 | offset u32 | length u32
//! ```
//!
//! ## v2 record (variable)
//! ```text
//! name_len u16 | name | align 4 | type_tag u32 | compression u16 | flags u16
//! offset u64 | stored_len u64 | uncompressed_len u64 | crc32 u32
//! ```

use serde::Serialize;
use tracing::debug;

use crate::codec::{CodecError, Compression};
use crate::cursor::{ByteCursor, CursorError, Endian, RawBlob};
use crate::error::BundleError;
use crate::header::BundleHeader;
use crate::schema::TypeTag;

pub const V1_NAME_LEN: usize = 32;
pub const V1_RECORD_SIZE: u64 = 44;
/// Smallest possible v2 record (empty name).
pub const V2_MIN_RECORD_SIZE: u64 = 2 + 4 + 2 + 2 + 8 + 8 + 8 + 4;
/// v2 record flag: `crc32` holds a checksum of the stored bytes.
pub const ENTRY_FLAG_CRC: u16 = 1 << 0;

/// One directory-listed region of the container.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EntryDescriptor {
    /// Position in the directory; the stable output order.
    pub index:            usize,
    pub name:             String,
    pub type_tag:         TypeTag,
    pub byte_offset:      u64,
    pub byte_length:      u64,
    pub uncompressed_len: u64,
    pub compression:      Compression,
    pub checksum:         Option<u32>,
}

impl EntryDescriptor {
    /// Zero-length entries stay in the directory but are never resolved.
    pub fn is_empty(&self) -> bool {
        self.byte_length == 0
    }

    pub fn fits_within(&self, container_len: u64) -> bool {
        self.byte_offset
            .checked_add(self.byte_length)
            .map_or(false, |end| end <= container_len)
    }
}

/// Fields common to every layout, before the entry index is assigned.
struct RawRecord {
    name:             String,
    type_tag:         u32,
    byte_offset:      u64,
    byte_length:      u64,
    uncompressed_len: u64,
    compression:      Compression,
    checksum:         Option<u32>,
}

#[derive(Debug)]
enum RecordError {
    Cursor(CursorError),
    Codec(CodecError),
}

impl From<CursorError> for RecordError {
    fn from(e: CursorError) -> Self { RecordError::Cursor(e) }
}

/// Parsing strategy for one format version.
pub struct DirectoryLayout {
    pub version:         u32,
    pub min_record_size: u64,
    read_record:         fn(&mut ByteCursor) -> Result<RawRecord, RecordError>,
}

pub static LAYOUTS: &[DirectoryLayout] = &[
    DirectoryLayout { version: 1, min_record_size: V1_RECORD_SIZE,     read_record: read_v1_record },
    DirectoryLayout { version: 2, min_record_size: V2_MIN_RECORD_SIZE, read_record: read_v2_record },
];

pub fn layout_for(version: u32) -> Option<&'static DirectoryLayout> {
    LAYOUTS.iter().find(|l| l.version == version)
}

fn read_v1_record(c: &mut ByteCursor) -> Result<RawRecord, RecordError> {
    let name_bytes = c.slice(V1_NAME_LEN as u64)?;
    let end = name_bytes.iter().position(|&b| b == 0).unwrap_or(V1_NAME_LEN);
    let name = String::from_utf8_lossy(&name_bytes[..end]).into_owned();
    let type_tag    = c.read_u32(Endian::Little)?;
    let byte_offset = c.read_u32(Endian::Little)? as u64;
    let byte_length = c.read_u32(Endian::Little)? as u64;
    Ok(RawRecord {
        name,
        type_tag,
        byte_offset,
        byte_length,
        uncompressed_len: byte_length,
        compression: Compression::None,
        checksum: None,
    })
}

fn read_v2_record(c: &mut ByteCursor) -> Result<RawRecord, RecordError> {
    let name_len = c.read_u16(Endian::Little)? as u64;
    let name = c.read_string(name_len)?;
    c.read_aligned(4)?;
    let type_tag = c.read_u32(Endian::Little)?;
    let compression_id = c.read_u16(Endian::Little)?;
    let compression = Compression::from_id(compression_id)
        .ok_or(RecordError::Codec(CodecError::UnknownCompression(compression_id)))?;
    let flags            = c.read_u16(Endian::Little)?;
    let byte_offset      = c.read_u64(Endian::Little)?;
    let byte_length      = c.read_u64(Endian::Little)?;
    let uncompressed_len = c.read_u64(Endian::Little)?;
    let crc              = c.read_u32(Endian::Little)?;
    Ok(RawRecord {
        name,
        type_tag,
        byte_offset,
        byte_length,
        uncompressed_len,
        compression,
        checksum: (flags & ENTRY_FLAG_CRC != 0).then_some(crc),
    })
}

/// Parsed container directory.
#[derive(Debug, Clone)]
pub struct Directory {
    pub header:  BundleHeader,
    pub entries: Vec<EntryDescriptor>,
}

impl Directory {
    /// Read the header and every directory record of `container`.
    ///
    /// Any failure here is container-fatal and reported as
    /// [`BundleError::UnrecognizedFormat`]: without a trustworthy directory
    /// no entry can be located.
    pub fn parse(container: &RawBlob) -> Result<Self, BundleError> {
        let mut cursor = ByteCursor::new(container.clone());
        let header = BundleHeader::read(&mut cursor)?;
        let layout = layout_for(header.version).ok_or_else(|| {
            BundleError::UnrecognizedFormat(format!("unsupported format version {}", header.version))
        })?;

        cursor.seek(header.directory_offset).map_err(|_| {
            BundleError::UnrecognizedFormat(format!(
                "directory offset {} beyond container end {}",
                header.directory_offset,
                container.len()
            ))
        })?;

        // Reject counts that cannot possibly fit before allocating for them.
        let needed = header.entry_count as u64 * layout.min_record_size;
        if needed > cursor.remaining() {
            return Err(BundleError::UnrecognizedFormat(format!(
                "directory claims {} entries but only {} bytes remain",
                header.entry_count,
                cursor.remaining()
            )));
        }

        let mut entries = Vec::with_capacity(header.entry_count as usize);
        for index in 0..header.entry_count as usize {
            let raw = (layout.read_record)(&mut cursor).map_err(|e| {
                BundleError::UnrecognizedFormat(match e {
                    RecordError::Cursor(e) => format!("directory record {index}: {e}"),
                    RecordError::Codec(e)  => format!("directory record {index}: {e}"),
                })
            })?;
            debug!(
                index,
                name = %raw.name,
                type_tag = raw.type_tag,
                offset = raw.byte_offset,
                length = raw.byte_length,
                compression = raw.compression.name(),
                "directory entry"
            );
            entries.push(EntryDescriptor {
                index,
                name:             raw.name,
                type_tag:         TypeTag(raw.type_tag),
                byte_offset:      raw.byte_offset,
                byte_length:      raw.byte_length,
                uncompressed_len: raw.uncompressed_len,
                compression:      raw.compression,
                checksum:         raw.checksum,
            });
        }

        Ok(Self { header, entries })
    }

    pub fn version(&self) -> u32 {
        self.header.version
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::BundleBuilder;
    use proptest::prelude::*;

    fn two_entry(version: u32) -> RawBlob {
        let mut b = BundleBuilder::new(version);
        b.add_entry("first", TypeTag::RAW_DATA, vec![1, 2, 3]);
        b.add_entry("second_with_a_long_name", TypeTag::TEXT_ASSET, vec![]);
        RawBlob::new(b.build().unwrap())
    }

    #[test]
    fn both_layouts_list_entries_in_order() {
        for version in [1, 2] {
            let dir = Directory::parse(&two_entry(version)).unwrap();
            assert_eq!(dir.version(), version);
            assert_eq!(dir.entries.len(), 2);
            assert_eq!(dir.entries[0].name, "first");
            assert_eq!(dir.entries[0].byte_length, 3);
            assert_eq!(dir.entries[1].type_tag, TypeTag::TEXT_ASSET);
            assert!(dir.entries[1].is_empty());
        }
    }

    #[test]
    fn unknown_version_is_fatal() {
        let mut bytes = two_entry(2).to_vec();
        bytes[8] = 9;
        let err = Directory::parse(&RawBlob::new(bytes)).unwrap_err();
        assert!(matches!(err, BundleError::UnrecognizedFormat(m) if m.contains("version 9")));
    }

    #[test]
    fn inflated_entry_count_is_fatal() {
        let mut bytes = two_entry(1).to_vec();
        bytes[24..28].copy_from_slice(&1_000_000u32.to_le_bytes());
        assert!(Directory::parse(&RawBlob::new(bytes)).unwrap_err().is_fatal());
    }

    #[test]
    fn out_of_range_entry_is_kept() {
        let mut b = BundleBuilder::new(2);
        b.add_entry("ok", TypeTag::RAW_DATA, vec![0; 8]);
        b.add_raw_descriptor("broken", TypeTag::RAW_DATA, 16, 1 << 20);
        let blob = RawBlob::new(b.build().unwrap());
        let dir = Directory::parse(&blob).unwrap();
        assert_eq!(dir.entries.len(), 2);
        assert!(dir.entries[0].fits_within(blob.len() as u64));
        assert!(!dir.entries[1].fits_within(blob.len() as u64));
    }

    proptest! {
        #[test]
        fn arbitrary_bytes_never_panic(data in proptest::collection::vec(any::<u8>(), 0..256)) {
            let _ = Directory::parse(&RawBlob::new(data));
        }

        #[test]
        fn valid_header_with_garbage_directory_never_panics(
            version in 1u32..3,
            count in 0u32..8,
            tail in proptest::collection::vec(any::<u8>(), 0..200),
        ) {
            let mut bytes = Vec::new();
            let mut h = BundleHeader::new(version);
            h.entry_count = count;
            h.write(&mut bytes).unwrap();
            bytes.extend(tail);
            let _ = Directory::parse(&RawBlob::new(bytes));
        }
    }
}
