//! Dump directory fixtures.
//!
//! Provides temporary dump directories populated with segment artifacts,
//! plus helpers for comparing store contents byte by byte.

use segmerge_store::{artifact_name, DirectoryStore, SegmentStore};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

/// A temporary dump directory with automatic cleanup.
pub struct DumpFixture {
    dir: TempDir,
}

impl DumpFixture {
    /// Creates an empty dump directory.
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().expect("Failed to create temp directory"),
        }
    }

    /// Creates a dump directory holding one artifact per `(address, bytes)`.
    pub fn with_segments(segments: &[(u64, Vec<u8>)]) -> Self {
        let fixture = Self::new();
        for (address, data) in segments {
            fixture.add(*address, data);
        }
        fixture
    }

    /// Writes an artifact named by `address`.
    pub fn add(&self, address: u64, data: &[u8]) {
        self.write(&artifact_name(address), data);
    }

    /// Writes a file with an arbitrary name.
    pub fn write(&self, name: &str, data: &[u8]) {
        fs::write(self.dir.path().join(name), data).expect("Failed to write artifact");
    }

    /// Returns the directory path.
    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Opens a directory store over the fixture.
    pub fn store(&self) -> DirectoryStore {
        DirectoryStore::open(self.dir.path()).expect("Failed to open directory store")
    }

    /// Returns the sorted names of all entries in the directory.
    pub fn file_names(&self) -> Vec<String> {
        let mut names: Vec<String> = fs::read_dir(self.dir.path())
            .expect("Failed to read fixture directory")
            .map(|entry| {
                entry
                    .expect("Failed to read directory entry")
                    .file_name()
                    .to_string_lossy()
                    .into_owned()
            })
            .collect();
        names.sort();
        names
    }
}

impl Default for DumpFixture {
    fn default() -> Self {
        Self::new()
    }
}

/// Maps every load address covered by `segments` to the byte stored there.
pub fn address_bytes<'a, I>(segments: I) -> BTreeMap<u64, u8>
where
    I: IntoIterator<Item = (u64, &'a [u8])>,
{
    let mut bytes = BTreeMap::new();
    for (address, data) in segments {
        for (offset, byte) in data.iter().enumerate() {
            bytes.insert(address + offset as u64, *byte);
        }
    }
    bytes
}

/// Maps every load address held by `store` to the byte stored there.
pub fn store_bytes<S: SegmentStore + ?Sized>(store: &S) -> BTreeMap<u64, u8> {
    let contents: Vec<(u64, Vec<u8>)> = store
        .list_segments()
        .expect("Failed to list segments")
        .into_iter()
        .map(|segment| {
            let data = store.read(segment.address).expect("Failed to read segment");
            (segment.address, data)
        })
        .collect();
    address_bytes(contents.iter().map(|(a, d)| (*a, d.as_slice())))
}
