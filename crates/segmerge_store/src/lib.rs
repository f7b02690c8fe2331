//! # segmerge store
//!
//! Segment artifact stores for segmerge.
//!
//! A store owns the raw bytes of firmware segments, one artifact per
//! segment, each identified by the absolute load address the segment was
//! dumped from. Stores are **opaque byte containers**: they know nothing
//! about adjacency, permissions or images. That interpretation lives in
//! `segmerge_core`.
//!
//! ## Operations
//!
//! - enumerate artifacts as `(address, length)` pairs
//! - read, append to, create and delete an artifact by address
//!
//! ## Available Stores
//!
//! - [`DirectoryStore`] - one file per segment, named by its hex load address
//! - [`InMemoryStore`] - for tests and for dumps already held in memory
//!
//! ## Example
//!
//! ```rust
//! use segmerge_store::{InMemoryStore, SegmentStore};
//!
//! let mut store = InMemoryStore::new();
//! store.create(0x1000, &[0xAA; 0x10]).unwrap();
//! store.append(0x1000, &[0xBB; 0x10]).unwrap();
//!
//! let segments = store.list_segments().unwrap();
//! assert_eq!(segments.len(), 1);
//! assert_eq!(segments[0].length, 0x20);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod directory;
mod error;
mod memory;
mod store;

pub use directory::{artifact_name, parse_identity, DirectoryStore, ARTIFACT_SUFFIX};
pub use error::{StoreError, StoreResult};
pub use memory::InMemoryStore;
pub use store::{SegmentInfo, SegmentStore};
