//! Directory-backed segment store.

use crate::error::{StoreError, StoreResult};
use crate::store::{SegmentInfo, SegmentStore};
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// File suffix used for artifacts created by [`DirectoryStore::create`].
pub const ARTIFACT_SUFFIX: &str = "bin";

/// Parses the load address encoded in an artifact file name.
///
/// The identity is everything before the first `.`, read as base-16. A
/// leading `0x` is tolerated. Everything after the separator is a free-form
/// suffix.
///
/// # Errors
///
/// Returns a discovery error if the name has no `.` separator or the
/// identity is not a hex number that fits in 64 bits.
///
/// # Example
///
/// ```rust
/// use segmerge_store::parse_identity;
///
/// assert_eq!(parse_identity("9fc00000.bin").unwrap(), 0x9fc0_0000);
/// assert_eq!(parse_identity("0x1000.dump").unwrap(), 0x1000);
/// assert!(parse_identity("boot.bin").is_err());
/// assert!(parse_identity("1000").is_err());
/// ```
pub fn parse_identity(file_name: &str) -> StoreResult<u64> {
    let Some((identity, _suffix)) = file_name.split_once('.') else {
        return Err(StoreError::discovery(format!(
            "artifact `{file_name}` has no `.` after its address"
        )));
    };

    let digits = identity
        .strip_prefix("0x")
        .or_else(|| identity.strip_prefix("0X"))
        .unwrap_or(identity);

    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(StoreError::discovery(format!(
            "artifact `{file_name}` is not named by a hex load address"
        )));
    }

    u64::from_str_radix(digits, 16).map_err(|err| {
        StoreError::discovery(format!("artifact `{file_name}` has an invalid address: {err}"))
    })
}

/// Returns the file name used for a new artifact at `address`.
#[must_use]
pub fn artifact_name(address: u64) -> String {
    format!("{address:x}.{ARTIFACT_SUFFIX}")
}

/// A segment store backed by a directory of dump files.
///
/// Every regular file in the directory is one artifact, named by the hex
/// load address of its first byte (see [`parse_identity`]). Hidden entries
/// and subdirectories are not artifacts and are skipped.
///
/// # Indexing
///
/// The store keeps an address-to-path index that is rebuilt by every call
/// to [`SegmentStore::list_segments`]. Operations on an address look the
/// path up in the index; an artifact removed behind the store's back
/// surfaces as `NotFound`.
///
/// # Example
///
/// ```no_run
/// use segmerge_store::{DirectoryStore, SegmentStore};
/// use std::path::Path;
///
/// let store = DirectoryStore::open(Path::new("segments")).unwrap();
/// for segment in store.list_segments().unwrap() {
///     println!("{:#x} + {:#x}", segment.address, segment.length);
/// }
/// ```
#[derive(Debug)]
pub struct DirectoryStore {
    root: PathBuf,
    index: RwLock<BTreeMap<u64, PathBuf>>,
}

impl DirectoryStore {
    /// Opens a store over an existing directory and indexes its artifacts.
    ///
    /// # Errors
    ///
    /// Returns a discovery error if the directory does not exist, cannot be
    /// enumerated, or holds an artifact with an unparseable or duplicate
    /// address.
    pub fn open(root: &Path) -> StoreResult<Self> {
        if !root.is_dir() {
            return Err(StoreError::discovery(format!(
                "segment directory does not exist: {}",
                root.display()
            )));
        }

        let store = Self {
            root: root.to_path_buf(),
            index: RwLock::new(BTreeMap::new()),
        };
        store.rescan()?;
        Ok(store)
    }

    /// Returns the directory this store operates on.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Returns the path of the artifact at `address`.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the address is not indexed.
    pub fn artifact_path(&self, address: u64) -> StoreResult<PathBuf> {
        self.index
            .read()
            .get(&address)
            .cloned()
            .ok_or(StoreError::NotFound { address })
    }

    /// Rebuilds the index from the directory contents.
    ///
    /// The previous index is kept if discovery fails.
    fn rescan(&self) -> StoreResult<Vec<SegmentInfo>> {
        let entries = fs::read_dir(&self.root).map_err(|err| {
            StoreError::discovery(format!("cannot enumerate {}: {err}", self.root.display()))
        })?;

        let mut found: BTreeMap<u64, (PathBuf, u64)> = BTreeMap::new();

        for entry in entries {
            let entry = entry.map_err(|err| {
                StoreError::discovery(format!("cannot enumerate {}: {err}", self.root.display()))
            })?;

            let file_name = entry.file_name();
            let Some(name) = file_name.to_str() else {
                return Err(StoreError::discovery(format!(
                    "artifact name is not valid UTF-8: {:?}",
                    file_name
                )));
            };

            if name.starts_with('.') {
                continue;
            }

            let metadata = entry.metadata().map_err(|err| {
                StoreError::discovery(format!("cannot stat artifact `{name}`: {err}"))
            })?;
            if !metadata.is_file() {
                debug!(entry = name, "skipping non-file entry");
                continue;
            }

            let address = parse_identity(name)?;
            if let Some((existing, _)) = found.get(&address) {
                let existing = existing
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default();
                let (first, second) = if existing.as_str() <= name {
                    (existing, name.to_string())
                } else {
                    (name.to_string(), existing)
                };
                return Err(StoreError::DuplicateAddress {
                    address,
                    first,
                    second,
                });
            }

            found.insert(address, (entry.path(), metadata.len()));
        }

        let segments: Vec<SegmentInfo> = found
            .iter()
            .map(|(&address, &(_, length))| SegmentInfo::new(address, length))
            .collect();

        *self.index.write() = found
            .into_iter()
            .map(|(address, (path, _))| (address, path))
            .collect();

        debug!(root = %self.root.display(), count = segments.len(), "indexed segments");
        Ok(segments)
    }

    fn open_for_append(&self, address: u64) -> StoreResult<File> {
        let path = self.artifact_path(address)?;
        OpenOptions::new()
            .append(true)
            .open(&path)
            .map_err(|err| StoreError::from_io(address, err))
    }
}

/// An open artifact that can be cut back to an earlier length.
trait Truncate: Write {
    fn truncate_to(&mut self, len: u64) -> io::Result<()>;
}

impl Truncate for File {
    fn truncate_to(&mut self, len: u64) -> io::Result<()> {
        self.set_len(len)
    }
}

/// Appends `data` to an artifact currently `before` bytes long.
///
/// A torn write is rolled back so the artifact keeps its old length.
fn write_or_truncate<W: Truncate>(
    file: &mut W,
    address: u64,
    before: u64,
    data: &[u8],
) -> StoreResult<u64> {
    if let Err(err) = file.write_all(data) {
        if let Err(rollback) = file.truncate_to(before) {
            warn!(
                address = format_args!("{address:#x}"),
                error = %rollback,
                "failed to roll back partial append"
            );
        }
        return Err(StoreError::Io(err));
    }

    Ok(before + data.len() as u64)
}

impl SegmentStore for DirectoryStore {
    fn list_segments(&self) -> StoreResult<Vec<SegmentInfo>> {
        self.rescan()
    }

    fn read(&self, address: u64) -> StoreResult<Vec<u8>> {
        let path = self.artifact_path(address)?;
        fs::read(&path).map_err(|err| StoreError::from_io(address, err))
    }

    fn segment_len(&self, address: u64) -> StoreResult<u64> {
        let path = self.artifact_path(address)?;
        let metadata = fs::metadata(&path).map_err(|err| StoreError::from_io(address, err))?;
        Ok(metadata.len())
    }

    fn append(&mut self, address: u64, data: &[u8]) -> StoreResult<u64> {
        let mut file = self.open_for_append(address)?;
        let before = file.metadata()?.len();

        if data.is_empty() {
            return Ok(before);
        }

        write_or_truncate(&mut file, address, before, data)
    }

    fn delete(&mut self, address: u64) -> StoreResult<()> {
        let path = self.artifact_path(address)?;
        fs::remove_file(&path).map_err(|err| StoreError::from_io(address, err))?;
        self.index.write().remove(&address);
        Ok(())
    }

    fn create(&mut self, address: u64, data: &[u8]) -> StoreResult<()> {
        if self.index.read().contains_key(&address) {
            return Err(StoreError::AlreadyExists { address });
        }

        let path = self.root.join(artifact_name(address));
        let mut file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .map_err(|err| StoreError::from_io(address, err))?;

        if let Err(err) = file.write_all(data) {
            drop(file);
            if let Err(cleanup) = fs::remove_file(&path) {
                warn!(
                    address = format_args!("{address:#x}"),
                    path = %path.display(),
                    error = %cleanup,
                    "failed to remove partially created artifact"
                );
            }
            return Err(StoreError::Io(err));
        }

        self.index.write().insert(address, path);
        Ok(())
    }

    fn sync(&mut self, address: u64) -> StoreResult<()> {
        let file = self.open_for_append(address)?;
        file.sync_all()?;
        Ok(())
    }
}
