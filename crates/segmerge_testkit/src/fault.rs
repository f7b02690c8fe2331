//! Fault injection for segment stores.
//!
//! [`FaultyStore`] wraps any store and fails chosen operations on demand,
//! so failure paths of the condenser can be exercised without a broken
//! disk.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use segmerge_testkit::FaultyStore;
//!
//! let store = FaultyStore::new(InMemoryStore::new());
//! store.fail_appends_after(1);
//! ```

use segmerge_store::{SegmentInfo, SegmentStore, StoreError, StoreResult};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

/// A store wrapper that can simulate storage failures.
///
/// A failed append never touches the inner store, matching the contract
/// that a failed append leaves the artifact at its previous length.
pub struct FaultyStore<S> {
    inner: S,
    fail_after_appends: AtomicUsize,
    appends: AtomicUsize,
    fail_on_delete: AtomicBool,
    fail_on_sync: AtomicBool,
    misreport_length: AtomicBool,
    failed: AtomicBool,
}

impl<S: SegmentStore> FaultyStore<S> {
    /// Creates a wrapper that passes every operation through.
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            fail_after_appends: AtomicUsize::new(usize::MAX),
            appends: AtomicUsize::new(0),
            fail_on_delete: AtomicBool::new(false),
            fail_on_sync: AtomicBool::new(false),
            misreport_length: AtomicBool::new(false),
            failed: AtomicBool::new(false),
        }
    }

    /// Lets `count` appends succeed, then fails every later one.
    pub fn fail_appends_after(&self, count: usize) {
        self.fail_after_appends.store(count, Ordering::SeqCst);
    }

    /// Sets whether delete should fail.
    pub fn set_fail_on_delete(&self, fail: bool) {
        self.fail_on_delete.store(fail, Ordering::SeqCst);
    }

    /// Sets whether sync should fail.
    pub fn set_fail_on_sync(&self, fail: bool) {
        self.fail_on_sync.store(fail, Ordering::SeqCst);
    }

    /// Sets whether a successful append should report one byte more than
    /// the artifact actually holds.
    pub fn set_misreport_length(&self, misreport: bool) {
        self.misreport_length.store(misreport, Ordering::SeqCst);
    }

    /// Resets all injected faults.
    pub fn reset(&self) {
        self.fail_after_appends.store(usize::MAX, Ordering::SeqCst);
        self.appends.store(0, Ordering::SeqCst);
        self.fail_on_delete.store(false, Ordering::SeqCst);
        self.fail_on_sync.store(false, Ordering::SeqCst);
        self.misreport_length.store(false, Ordering::SeqCst);
        self.failed.store(false, Ordering::SeqCst);
    }

    /// Returns whether an injected fault has fired.
    pub fn has_failed(&self) -> bool {
        self.failed.load(Ordering::SeqCst)
    }

    /// Returns the wrapped store.
    pub fn inner(&self) -> &S {
        &self.inner
    }

    /// Returns the wrapped store mutably.
    pub fn inner_mut(&mut self) -> &mut S {
        &mut self.inner
    }

    fn fault(&self, what: &str) -> StoreError {
        self.failed.store(true, Ordering::SeqCst);
        StoreError::Io(std::io::Error::new(
            std::io::ErrorKind::Other,
            format!("simulated failure during {what}"),
        ))
    }
}

impl<S: SegmentStore> SegmentStore for FaultyStore<S> {
    fn list_segments(&self) -> StoreResult<Vec<SegmentInfo>> {
        self.inner.list_segments()
    }

    fn read(&self, address: u64) -> StoreResult<Vec<u8>> {
        self.inner.read(address)
    }

    fn segment_len(&self, address: u64) -> StoreResult<u64> {
        self.inner.segment_len(address)
    }

    fn append(&mut self, address: u64, data: &[u8]) -> StoreResult<u64> {
        let done = self.appends.fetch_add(1, Ordering::SeqCst);
        if done >= self.fail_after_appends.load(Ordering::SeqCst) {
            return Err(self.fault("append"));
        }
        let length = self.inner.append(address, data)?;
        if self.misreport_length.load(Ordering::SeqCst) {
            self.failed.store(true, Ordering::SeqCst);
            return Ok(length + 1);
        }
        Ok(length)
    }

    fn delete(&mut self, address: u64) -> StoreResult<()> {
        if self.fail_on_delete.load(Ordering::SeqCst) {
            return Err(self.fault("delete"));
        }
        self.inner.delete(address)
    }

    fn create(&mut self, address: u64, data: &[u8]) -> StoreResult<()> {
        self.inner.create(address, data)
    }

    fn sync(&mut self, address: u64) -> StoreResult<()> {
        if self.fail_on_sync.load(Ordering::SeqCst) {
            return Err(self.fault("sync"));
        }
        self.inner.sync(address)
    }
}
