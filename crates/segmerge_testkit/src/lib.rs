//! # segmerge testkit
//!
//! Test utilities for segmerge.
//!
//! This crate provides:
//! - Temporary dump directory fixtures
//! - Property-based generators for segment layouts using proptest
//! - A fault-injecting store wrapper for failure-path tests
//!
//! ## Usage
//!
//! ```rust,ignore
//! use segmerge_testkit::prelude::*;
//!
//! #[test]
//! fn condenses_on_disk() {
//!     let fixture = DumpFixture::with_segments(&[(0x1000, vec![0; 16])]);
//!     let mut store = fixture.store();
//!     // ... run the condenser
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fault;
pub mod fixtures;
pub mod generators;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::fault::*;
    pub use crate::fixtures::*;
    pub use crate::generators::*;
}

pub use fault::*;
pub use fixtures::*;
pub use generators::*;
