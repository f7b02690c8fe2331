//! In-memory segment store for testing.

use crate::error::{StoreError, StoreResult};
use crate::store::{SegmentInfo, SegmentStore};
use parking_lot::RwLock;
use std::collections::BTreeMap;

/// An in-memory segment store.
///
/// This store keeps every artifact in memory and is suitable for:
/// - Unit tests
/// - Integration tests
/// - Callers that already hold their segment dumps in memory
///
/// # Example
///
/// ```rust
/// use segmerge_store::{InMemoryStore, SegmentStore};
///
/// let store = InMemoryStore::with_segments([(0x1000, vec![0u8; 16])]);
/// assert_eq!(store.segment_len(0x1000).unwrap(), 16);
/// ```
#[derive(Debug, Default)]
pub struct InMemoryStore {
    segments: RwLock<BTreeMap<u64, Vec<u8>>>,
}

impl InMemoryStore {
    /// Creates a new empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store pre-populated with `(address, bytes)` pairs.
    ///
    /// A later pair replaces an earlier one at the same address.
    #[must_use]
    pub fn with_segments<I>(segments: I) -> Self
    where
        I: IntoIterator<Item = (u64, Vec<u8>)>,
    {
        Self {
            segments: RwLock::new(segments.into_iter().collect()),
        }
    }

    /// Returns a copy of every artifact, keyed by address.
    ///
    /// Useful for testing and debugging.
    #[must_use]
    pub fn snapshot(&self) -> BTreeMap<u64, Vec<u8>> {
        self.segments.read().clone()
    }

    /// Returns the total number of bytes held across all artifacts.
    #[must_use]
    pub fn total_bytes(&self) -> u64 {
        self.segments.read().values().map(|v| v.len() as u64).sum()
    }
}

impl SegmentStore for InMemoryStore {
    fn list_segments(&self) -> StoreResult<Vec<SegmentInfo>> {
        Ok(self
            .segments
            .read()
            .iter()
            .map(|(&address, data)| SegmentInfo::new(address, data.len() as u64))
            .collect())
    }

    fn read(&self, address: u64) -> StoreResult<Vec<u8>> {
        self.segments
            .read()
            .get(&address)
            .cloned()
            .ok_or(StoreError::NotFound { address })
    }

    fn segment_len(&self, address: u64) -> StoreResult<u64> {
        self.segments
            .read()
            .get(&address)
            .map(|data| data.len() as u64)
            .ok_or(StoreError::NotFound { address })
    }

    fn append(&mut self, address: u64, data: &[u8]) -> StoreResult<u64> {
        let mut segments = self.segments.write();
        let target = segments
            .get_mut(&address)
            .ok_or(StoreError::NotFound { address })?;
        target.extend_from_slice(data);
        Ok(target.len() as u64)
    }

    fn delete(&mut self, address: u64) -> StoreResult<()> {
        self.segments
            .write()
            .remove(&address)
            .map(|_| ())
            .ok_or(StoreError::NotFound { address })
    }

    fn create(&mut self, address: u64, data: &[u8]) -> StoreResult<()> {
        let mut segments = self.segments.write();
        if segments.contains_key(&address) {
            return Err(StoreError::AlreadyExists { address });
        }
        segments.insert(address, data.to_vec());
        Ok(())
    }

    fn sync(&mut self, address: u64) -> StoreResult<()> {
        // Nothing to make durable, but the address must still exist.
        self.segment_len(address).map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn memory_new_is_empty() {
        let store = InMemoryStore::new();
        assert!(store.list_segments().unwrap().is_empty());
        assert_eq!(store.total_bytes(), 0);
    }

    #[test]
    fn memory_create_and_read() {
        let mut store = InMemoryStore::new();
        store.create(0x1000, b"hello").unwrap();

        assert_eq!(store.read(0x1000).unwrap(), b"hello");
        assert_eq!(store.segment_len(0x1000).unwrap(), 5);
    }

    #[test]
    fn memory_create_twice_fails() {
        let mut store = InMemoryStore::new();
        store.create(0x1000, b"a").unwrap();

        let result = store.create(0x1000, b"b");
        assert!(matches!(result, Err(StoreError::AlreadyExists { .. })));
        assert_eq!(store.read(0x1000).unwrap(), b"a");
    }

    #[test]
    fn memory_list_is_sorted() {
        let store = InMemoryStore::with_segments([
            (0x3000, vec![0; 3]),
            (0x1000, vec![0; 1]),
            (0x2000, vec![0; 2]),
        ]);

        let addresses: Vec<u64> = store
            .list_segments()
            .unwrap()
            .iter()
            .map(|s| s.address)
            .collect();
        assert_eq!(addresses, vec![0x1000, 0x2000, 0x3000]);
    }

    #[test]
    fn memory_append_returns_new_length() {
        let mut store = InMemoryStore::with_segments([(0x1000, b"hello".to_vec())]);

        assert_eq!(store.append(0x1000, b" world").unwrap(), 11);
        assert_eq!(store.read(0x1000).unwrap(), b"hello world");
    }

    #[test]
    fn memory_append_missing_fails() {
        let mut store = InMemoryStore::new();
        assert!(store.append(0x1000, b"x").unwrap_err().is_not_found());
    }

    #[test]
    fn memory_delete() {
        let mut store = InMemoryStore::with_segments([(0x1000, vec![1])]);
        store.delete(0x1000).unwrap();

        assert!(store.list_segments().unwrap().is_empty());
        assert!(store.delete(0x1000).unwrap_err().is_not_found());
        assert!(store.read(0x1000).unwrap_err().is_not_found());
    }

    #[test]
    fn memory_sync_checks_existence() {
        let mut store = InMemoryStore::with_segments([(0x1000, vec![1])]);
        assert!(store.sync(0x1000).is_ok());
        assert!(store.sync(0x2000).unwrap_err().is_not_found());
    }

    proptest! {
        #[test]
        fn appended_length_matches_contents(chunks in prop::collection::vec(
            prop::collection::vec(any::<u8>(), 0..64),
            1..16,
        )) {
            let mut store = InMemoryStore::new();
            store.create(0x8000, &chunks[0]).unwrap();

            let mut expected = chunks[0].clone();
            for chunk in &chunks[1..] {
                let len = store.append(0x8000, chunk).unwrap();
                expected.extend_from_slice(chunk);
                prop_assert_eq!(len, expected.len() as u64);
            }

            prop_assert_eq!(store.read(0x8000).unwrap(), expected);
        }
    }
}
