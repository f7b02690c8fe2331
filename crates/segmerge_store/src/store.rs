//! Segment store trait definition.

use crate::error::StoreResult;

/// Load address and byte length of one stored artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SegmentInfo {
    /// Absolute load address the artifact was dumped from.
    pub address: u64,
    /// Number of bytes held by the artifact.
    pub length: u64,
}

impl SegmentInfo {
    /// Creates a new segment descriptor.
    #[must_use]
    pub const fn new(address: u64, length: u64) -> Self {
        Self { address, length }
    }
}

/// Durable owner of segment artifacts addressed by load address.
///
/// Stores are opaque byte containers. Each artifact is identified by the
/// absolute load address of its first byte; no two artifacts share an
/// address.
///
/// # Invariants
///
/// - `list_segments` returns artifacts sorted by address, with no duplicates
/// - the length reported for an artifact always equals the number of bytes
///   `read` returns for it
/// - `append` either extends the artifact by exactly `data.len()` bytes or
///   leaves it unchanged and returns an error
/// - after `delete` the address is no longer listed
///
/// # Implementors
///
/// - [`super::DirectoryStore`] - one file per artifact
/// - [`super::InMemoryStore`] - for testing
pub trait SegmentStore: Send + Sync {
    /// Enumerates all artifacts currently in the store, sorted by address.
    ///
    /// # Errors
    ///
    /// Returns a discovery error if the backing location cannot be
    /// enumerated, an artifact identity is not a hex address, or two
    /// artifacts claim the same address.
    fn list_segments(&self) -> StoreResult<Vec<SegmentInfo>>;

    /// Returns the full contents of the artifact at `address`.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if no artifact exists at `address`.
    fn read(&self, address: u64) -> StoreResult<Vec<u8>>;

    /// Returns the byte length of the artifact at `address`.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if no artifact exists at `address`.
    fn segment_len(&self, address: u64) -> StoreResult<u64>;

    /// Appends `data` to the end of the artifact at `address`.
    ///
    /// Returns the new length of the artifact.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the artifact does not exist, or an I/O error
    /// if the write fails. A failed append leaves the artifact at its
    /// previous length.
    fn append(&mut self, address: u64, data: &[u8]) -> StoreResult<u64>;

    /// Removes the artifact at `address`.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if no artifact exists at `address`.
    fn delete(&mut self, address: u64) -> StoreResult<()>;

    /// Materializes a new artifact at `address` holding `data`.
    ///
    /// # Errors
    ///
    /// Returns `AlreadyExists` if the address is taken.
    fn create(&mut self, address: u64, data: &[u8]) -> StoreResult<()>;

    /// Makes all previous writes to the artifact at `address` durable.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the artifact does not exist, or an I/O error
    /// if the sync fails.
    fn sync(&mut self, address: u64) -> StoreResult<()>;
}
