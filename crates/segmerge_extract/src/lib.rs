//! # segmerge extract
//!
//! Decoders that turn firmware update containers into segment artifacts.
//!
//! Update files rarely arrive as plain per-segment dumps. This crate peels
//! the usual layers off and hands each contiguous block of flash contents
//! to a [`segmerge_store::SegmentStore`]:
//!
//! - [`pjl`] - printer jobs whose raster transfers carry the payload
//! - [`lzss`] - 4 KiB window LZSS compression
//! - [`srecord`] - Motorola S-records, ASCII or binary encoded
//! - [`raster`] - PCL raster row decompression, for bitmap payloads
//!
//! ## Example
//!
//! ```rust
//! use segmerge_extract::{ExtractOptions, Extractor};
//! use segmerge_store::{InMemoryStore, SegmentStore};
//!
//! let input = b"S3090000100001020304DC\nS307000010040506D9\n";
//! let mut store = InMemoryStore::new();
//!
//! let report = Extractor::new(ExtractOptions::new())
//!     .extract(&mut store, input)
//!     .unwrap();
//! assert_eq!(report.segments.len(), 1);
//! assert_eq!(store.read(0x1000).unwrap(), vec![1, 2, 3, 4, 5, 6]);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod error;
mod extract;
pub mod lzss;
pub mod pjl;
pub mod raster;
pub mod srecord;

pub use error::{ExtractError, ExtractResult};
pub use extract::{data_runs, DataRun, ExtractOptions, ExtractReport, Extractor, PageLayout};
pub use pjl::{combine_sections, parse_pjl, GraphicsCommand, PjlCommand};
pub use raster::{decompress_row, extract_bitmap};
pub use srecord::{
    checksum, from_binary_header, parse_srecords, Encoding, RecordKind, RecordReader, SRecord,
};
