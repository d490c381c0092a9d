//! High-level [`Bundle`] API: open a container, inspect it, extract it.
//!
//! ```no_run
//! use unbundle::bundle::Bundle;
//! use unbundle::extract::ExtractOptions;
//!
//! let bundle = Bundle::open("level1.bundle")?;
//! for entry in bundle.list() {
//!     println!("{} {} {}", entry.name, entry.type_name, entry.stored_size);
//! }
//! let manifest = bundle.extract_to("out", ExtractOptions::default())?;
//! println!("{}", manifest.summary());
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::codec::Compression;
use crate::cursor::RawBlob;
use crate::directory::{Directory, EntryDescriptor};
use crate::error::BundleError;
use crate::extract::{DirectorySink, ExtractOptions, Extractor, PayloadSink};
use crate::header::BundleHeader;
use crate::manifest::Manifest;
use crate::object::{ObjectGraph, Resolver};

// ── EntryInfo ────────────────────────────────────────────────────────────────

/// Lightweight descriptor returned by [`Bundle::list`].
#[derive(Debug, Clone)]
pub struct EntryInfo {
    pub index:        usize,
    pub name:         String,
    pub type_tag:     u32,
    pub type_name:    &'static str,
    pub stored_size:  u64,
    pub compression:  Compression,
    pub has_checksum: bool,
}

impl From<&EntryDescriptor> for EntryInfo {
    fn from(e: &EntryDescriptor) -> Self {
        EntryInfo {
            index:        e.index,
            name:         e.name.clone(),
            type_tag:     e.type_tag.0,
            type_name:    e.type_tag.name(),
            stored_size:  e.byte_length,
            compression:  e.compression,
            has_checksum: e.checksum.is_some(),
        }
    }
}

// ── Bundle ───────────────────────────────────────────────────────────────────

/// A container held in memory with its parsed directory.
pub struct Bundle {
    name:      String,
    data:      RawBlob,
    directory: Directory,
}

impl Bundle {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, BundleError> {
        let path = path.as_ref();
        let bytes = fs::read(path)?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        Self::from_bytes(name, bytes)
    }

    /// Parse a container already in memory.  Fails only when the header or
    /// directory cannot be read; entry-level problems surface later.
    pub fn from_bytes(name: impl Into<String>, bytes: Vec<u8>) -> Result<Self, BundleError> {
        let data = RawBlob::new(bytes);
        let directory = Directory::parse(&data)?;
        Ok(Self { name: name.into(), data, directory })
    }

    pub fn name(&self) -> &str { &self.name }

    pub fn header(&self) -> &BundleHeader { &self.directory.header }

    pub fn version(&self) -> u32 { self.directory.version() }

    pub fn entries(&self) -> &[EntryDescriptor] { &self.directory.entries }

    pub fn list(&self) -> Vec<EntryInfo> {
        self.directory.entries.iter().map(EntryInfo::from).collect()
    }

    pub fn container_size(&self) -> u64 { self.data.len() as u64 }

    /// Decompressed, checksum-verified bytes of one entry.
    pub fn read_entry(&self, entry: &EntryDescriptor) -> Result<RawBlob, BundleError> {
        Resolver::open_entry(&self.data, entry)
    }

    pub fn resolve(&self) -> ObjectGraph {
        self.resolve_with(&Resolver::default())
    }

    pub fn resolve_with(&self, resolver: &Resolver) -> ObjectGraph {
        resolver.resolve(&self.data, &self.directory)
    }

    /// Resolve and extract through a configured extractor.
    pub fn extract_with<S: PayloadSink>(&self, extractor: &Extractor<S>) -> Manifest {
        let graph = self.resolve();
        extractor.run(&self.name, &graph)
    }

    /// Extract every entry into `dest` with the built-in decoders.
    pub fn extract_to<P: AsRef<Path>>(&self, dest: P, options: ExtractOptions) -> Result<Manifest, BundleError> {
        let dest: PathBuf = dest.as_ref().to_owned();
        let extractor = Extractor::new(DirectorySink::new(&dest)?).with_options(options);
        let manifest = self.extract_with(&extractor);
        info!(bundle = %self.name, dest = %dest.display(), "extraction finished");
        Ok(manifest)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::{BundleBuilder, RecordWriter};
    use crate::cursor::Endian;
    use crate::schema::TypeTag;

    #[test]
    fn list_reports_directory_entries() {
        let mut b = BundleBuilder::new(2);
        b.add_compressed_entry(
            "notes",
            TypeTag::TEXT_ASSET,
            RecordWriter::new(TypeTag::TEXT_ASSET, 1, Endian::Little).string("notes").int32(0).bytes(b"hi").finish(),
            Compression::Lz4,
        );
        let bundle = Bundle::from_bytes("b", b.build().unwrap()).unwrap();
        let list = bundle.list();
        assert_eq!(list.len(), 1);
        assert_eq!(list[0].type_name, "TextAsset");
        assert_eq!(list[0].compression, Compression::Lz4);
        assert!(list[0].has_checksum);
        assert_eq!(bundle.version(), 2);
    }

    #[test]
    fn garbage_is_rejected_up_front() {
        let err = Bundle::from_bytes("x", b"not a bundle at all, just text".to_vec()).err().unwrap();
        assert!(matches!(err, BundleError::UnrecognizedFormat(_)));
    }
}
