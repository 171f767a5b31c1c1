//! Bounded, read-only access to target executables.
//!
//! A [`MappedFile`] owns a read-only memory map wrapped in a `Bytes` handle.
//! The loader slices sections straight out of that handle, so nothing is
//! copied between the page cache and the debug-info walker.

pub mod error;

use crate::config::IoConfig;
use crate::io::error::{IoError, Result};
use bytes::Bytes;
use memmap2::Mmap;
use std::fs::File;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// A target executable mapped into memory under a size limit.
#[derive(Debug, Clone)]
pub struct MappedFile {
    path: PathBuf,
    data: Bytes,
}

impl MappedFile {
    /// Map `path`, refusing files larger than `config.max_file_size`.
    pub fn open<P: AsRef<Path>>(path: P, config: &IoConfig) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = File::open(&path)?;
        let len = file.metadata()?.len();
        check_size(&path, len, config.max_file_size)?;

        // Zero-length files cannot be mapped.
        let data = if len == 0 {
            Bytes::new()
        } else {
            // Safety: the map is read-only and the engine never writes through it.
            let map = unsafe { Mmap::map(&file)? };
            Bytes::from_owner(map)
        };
        debug!(path = %path.display(), len, "Mapped target");
        Ok(Self { path, data })
    }

    pub fn len(&self) -> u64 {
        self.data.len() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// A handle on the mapped contents; clones share the same mapping.
    pub fn bytes(&self) -> Bytes {
        self.data.clone()
    }
}

fn check_size(path: &Path, len: u64, limit: u64) -> Result<()> {
    if len <= limit {
        return Ok(());
    }
    warn!(path = %path.display(), len, limit, "Target exceeds size limit");
    Err(IoError::FileTooLarge { limit, found: len })
}

/// Map `path` under `config` and return its contents.
pub fn read_target<P: AsRef<Path>>(path: P, config: &IoConfig) -> Result<Bytes> {
    MappedFile::open(path, config).map(|file| file.bytes())
}
