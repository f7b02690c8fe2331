//! Per-segment metadata table.
//!
//! The table is a JSON array of entries, one per dumped segment:
//!
//! ```json
//! [
//!   { "name": "boot", "load_addr": 2684354560, "perms": 5 },
//!   { "name": "data", "load_addr": 2684420096, "perms": 6 }
//! ]
//! ```
//!
//! Entries are looked up by load address. Segments without an entry fall
//! back to the configured default permissions and have no name.

use crate::error::{CoreError, CoreResult};
use crate::region::Permissions;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Metadata for one segment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SegmentEntry {
    /// Human-readable segment name.
    pub name: String,
    /// Load address the segment was dumped from.
    pub load_addr: u64,
    /// Permission bits (execute = 1, write = 2, read = 4).
    pub perms: Permissions,
}

/// Segment metadata keyed by load address.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SegmentTable {
    entries: BTreeMap<u64, SegmentEntry>,
}

impl SegmentTable {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a table from entries.
    ///
    /// # Errors
    ///
    /// Returns an error if two entries share a load address.
    pub fn from_entries(entries: Vec<SegmentEntry>) -> CoreResult<Self> {
        let mut table = Self::new();
        for entry in entries {
            table.insert(entry)?;
        }
        Ok(table)
    }

    /// Parses a table from its JSON form.
    ///
    /// # Errors
    ///
    /// Returns an error if the JSON is malformed, a permission value has
    /// unknown bits, or two entries share a load address.
    pub fn from_json(data: &[u8]) -> CoreResult<Self> {
        let entries: Vec<SegmentEntry> = serde_json::from_slice(data)?;
        Self::from_entries(entries)
    }

    /// Loads a table from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: &Path) -> CoreResult<Self> {
        let data = std::fs::read(path)?;
        Self::from_json(&data)
    }

    /// Encodes the table as pretty-printed JSON, ordered by address.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_json(&self) -> CoreResult<String> {
        let entries: Vec<&SegmentEntry> = self.entries.values().collect();
        Ok(serde_json::to_string_pretty(&entries)?)
    }

    /// Adds an entry.
    ///
    /// # Errors
    ///
    /// Returns an error if an entry already exists at the same load address.
    pub fn insert(&mut self, entry: SegmentEntry) -> CoreResult<()> {
        if let Some(existing) = self.entries.get(&entry.load_addr) {
            return Err(CoreError::segment_table(format!(
                "`{}` and `{}` both load at {:#x}",
                existing.name, entry.name, entry.load_addr
            )));
        }
        self.entries.insert(entry.load_addr, entry);
        Ok(())
    }

    /// Returns the entry for `address`, if any.
    #[must_use]
    pub fn get(&self, address: u64) -> Option<&SegmentEntry> {
        self.entries.get(&address)
    }

    /// Returns the permissions for `address`, or `default` if it has no entry.
    #[must_use]
    pub fn permissions_for(&self, address: u64, default: Permissions) -> Permissions {
        self.get(address).map_or(default, |entry| entry.perms)
    }

    /// Returns the name for `address`, if it has an entry.
    #[must_use]
    pub fn name_for(&self, address: u64) -> Option<&str> {
        self.get(address).map(|entry| entry.name.as_str())
    }

    /// Returns the number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if the table has no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates over entries in address order.
    pub fn entries(&self) -> impl Iterator<Item = &SegmentEntry> {
        self.entries.values()
    }
}
