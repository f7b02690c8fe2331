//! Exclusive access to a dump directory.
//!
//! A dump directory holds one artifact per segment plus a hidden lock file:
//!
//! ```text
//! <dump_dir>/
//! ├─ .segmerge.lock    # Advisory lock for single-writer condensation
//! ├─ 9fc00000.bin      # Segment loaded at 0x9fc00000
//! ├─ 9fc10000.bin
//! └─ a0000000.bin
//! ```
//!
//! Condensation rewrites and deletes artifacts, so it must not run
//! concurrently with anything else that touches the directory. The lock
//! makes a second segmerge process fail fast instead.

use crate::error::{CoreError, CoreResult};
use fs2::FileExt;
use segmerge_store::DirectoryStore;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Name of the lock file inside a dump directory.
pub const LOCK_FILE: &str = ".segmerge.lock";

/// A dump directory held under an exclusive advisory lock.
///
/// The lock is released when the value is dropped.
///
/// # Example
///
/// ```rust,ignore
/// use segmerge_core::{DumpDirectory, SegmentCondenser};
/// use std::path::Path;
///
/// let dir = DumpDirectory::open(Path::new("segments"))?;
/// let mut store = dir.store()?;
/// SegmentCondenser::with_defaults().condense(&mut store)?;
/// ```
#[derive(Debug)]
pub struct DumpDirectory {
    path: PathBuf,
    _lock_file: File,
}

impl DumpDirectory {
    /// Opens an existing dump directory and takes its lock.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The path does not exist or is not a directory
    /// - Another process holds the lock (returns `DirectoryLocked`)
    /// - I/O errors occur
    pub fn open(path: &Path) -> CoreResult<Self> {
        if !path.exists() {
            return Err(CoreError::invalid_directory(format!(
                "dump directory does not exist: {}",
                path.display()
            )));
        }
        if !path.is_dir() {
            return Err(CoreError::invalid_directory(format!(
                "path is not a directory: {}",
                path.display()
            )));
        }

        let lock_file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path.join(LOCK_FILE))?;

        if lock_file.try_lock_exclusive().is_err() {
            return Err(CoreError::DirectoryLocked {
                path: path.to_path_buf(),
            });
        }

        debug!(path = %path.display(), "locked dump directory");
        Ok(Self {
            path: path.to_path_buf(),
            _lock_file: lock_file,
        })
    }

    /// Returns the path to the dump directory.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Opens a [`DirectoryStore`] over the locked directory.
    ///
    /// # Errors
    ///
    /// Returns an error if artifact discovery fails.
    pub fn store(&self) -> CoreResult<DirectoryStore> {
        Ok(DirectoryStore::open(&self.path)?)
    }
}
