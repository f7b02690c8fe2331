//! # segmerge core
//!
//! Reconstruction of a minimal memory image from per-segment firmware dumps.
//!
//! This crate provides:
//! - The [`Region`] model with read/write/execute [`Permissions`]
//! - [`SegmentCondenser`], which merges address-adjacent segments until no
//!   two remaining regions touch, consolidating their backing artifacts
//! - [`SegmentTable`], optional per-segment names and permissions
//! - [`DumpDirectory`], exclusive access to an on-disk dump directory
//! - Image assembly through the [`ImageSink`] seam, with [`FlatImage`] as
//!   the built-in flat-file assembler
//!
//! ## Example
//!
//! ```rust
//! use segmerge_core::SegmentCondenser;
//! use segmerge_store::{InMemoryStore, SegmentStore};
//!
//! let mut store = InMemoryStore::with_segments([
//!     (0x1000, vec![0u8; 0x10]),
//!     (0x1010, vec![0u8; 0x20]),
//! ]);
//!
//! let report = SegmentCondenser::with_defaults().condense(&mut store).unwrap();
//! assert_eq!(report.regions.len(), 1);
//! assert_eq!(report.regions[0].end(), 0x1030);
//! assert!(store.read(0x1010).is_err());
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod condenser;
mod config;
#[cfg(feature = "std")]
mod dir;
mod error;
mod image;
mod region;
mod table;

pub use condenser::{
    check_overlaps, condense_regions, find_adjacent, CondenseReport, MergeStep, SegmentCondenser,
};
pub use config::CondenseConfig;
#[cfg(feature = "std")]
pub use dir::{DumpDirectory, LOCK_FILE};
pub use error::{CoreError, CoreResult};
pub use image::{assemble, read_region, FlatImage, ImageManifest, ImageSegment, ImageSink};
pub use region::{Permissions, Region};
pub use table::{SegmentEntry, SegmentTable};

pub use segmerge_store::{DirectoryStore, InMemoryStore, SegmentInfo, SegmentStore, StoreError};

/// Crate version, as reported by the CLI.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
