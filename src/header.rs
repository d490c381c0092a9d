use byteorder::{LittleEndian, WriteBytesExt};
use std::io::{self, Write};

use crate::cursor::{ByteCursor, Endian};
use crate::error::BundleError;

pub const MAGIC: &[u8; 8] = b"ASSETBND";
pub const HEADER_SIZE: usize = 32;

/// Object records are stored big-endian.
pub const FLAG_BIG_ENDIAN: u32 = 1 << 0;

/// Fixed-size container header.  Always little-endian on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BundleHeader {
    pub version:          u32,
    pub flags:            u32,
    pub directory_offset: u64,
    pub entry_count:      u32,
}

impl BundleHeader {
    pub fn new(version: u32) -> Self {
        Self { version, flags: 0, directory_offset: HEADER_SIZE as u64, entry_count: 0 }
    }

    /// Byte order of the object records inside every entry.
    pub fn object_endian(&self) -> Endian {
        if self.flags & FLAG_BIG_ENDIAN != 0 { Endian::Big } else { Endian::Little }
    }

    pub fn write<W: Write>(&self, mut writer: W) -> io::Result<()> {
        writer.write_all(MAGIC)?;
        writer.write_u32::<LittleEndian>(self.version)?;
        writer.write_u32::<LittleEndian>(self.flags)?;
        writer.write_u64::<LittleEndian>(self.directory_offset)?;
        writer.write_u32::<LittleEndian>(self.entry_count)?;
        writer.write_u32::<LittleEndian>(0)?;
        Ok(())
    }

    /// Parse and validate the signature.  Version support is checked by the
    /// directory parser, which owns the layout table.
    pub fn read(cursor: &mut ByteCursor) -> Result<Self, BundleError> {
        let truncated = |_| BundleError::UnrecognizedFormat("truncated header".into());
        let magic = cursor.slice(MAGIC.len() as u64).map_err(truncated)?;
        if magic.as_slice() != MAGIC {
            return Err(BundleError::UnrecognizedFormat(format!(
                "bad signature {}",
                hex::encode(magic.as_slice())
            )));
        }
        let version          = cursor.read_u32(Endian::Little).map_err(truncated)?;
        let flags            = cursor.read_u32(Endian::Little).map_err(truncated)?;
        let directory_offset = cursor.read_u64(Endian::Little).map_err(truncated)?;
        let entry_count      = cursor.read_u32(Endian::Little).map_err(truncated)?;
        let _reserved        = cursor.read_u32(Endian::Little).map_err(truncated)?;
        Ok(Self { version, flags, directory_offset, entry_count })
    }
}
