//! Destinations for decoded payloads.

use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// Stores one output file.  Implementations must be all-or-nothing: a failed
/// or interrupted write leaves no partial file behind.
pub trait PayloadSink: Send + Sync {
    fn write(&self, relative: &Path, bytes: &[u8]) -> io::Result<()>;
}

/// Writes under a root directory.  Each file is written to a temporary file
/// in the destination directory and renamed into place.
pub struct DirectorySink {
    root: PathBuf,
}

impl DirectorySink {
    pub fn new<P: AsRef<Path>>(root: P) -> io::Result<Self> {
        let root = root.as_ref().to_owned();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl PayloadSink for DirectorySink {
    fn write(&self, relative: &Path, bytes: &[u8]) -> io::Result<()> {
        let target = self.root.join(relative);
        let dir = target.parent().unwrap_or(&self.root);
        fs::create_dir_all(dir)?;
        let mut tmp = NamedTempFile::new_in(dir)?;
        tmp.write_all(bytes)?;
        tmp.flush()?;
        tmp.persist(&target).map_err(|e| e.error)?;
        Ok(())
    }
}

/// Keeps outputs in memory; used for previews and tests.
#[derive(Default)]
pub struct MemorySink {
    files: Mutex<BTreeMap<PathBuf, Vec<u8>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, relative: &Path) -> Option<Vec<u8>> {
        self.files.lock().get(relative).cloned()
    }

    pub fn paths(&self) -> Vec<PathBuf> {
        self.files.lock().keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.files.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.lock().is_empty()
    }
}

impl PayloadSink for MemorySink {
    fn write(&self, relative: &Path, bytes: &[u8]) -> io::Result<()> {
        self.files.lock().insert(relative.to_owned(), bytes.to_vec());
        Ok(())
    }
}
