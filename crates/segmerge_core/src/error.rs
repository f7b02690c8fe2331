//! Error types for segmerge core.

use segmerge_store::StoreError;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur while condensing or assembling segments.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Segment store error (discovery, missing artifact, storage I/O).
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// Two regions claim overlapping address ranges.
    #[error(
        "regions overlap: [{first_start:#x}, {first_end:#x}) and [{second_start:#x}, {second_end:#x})"
    )]
    Overlap {
        /// Start of the lower region.
        first_start: u64,
        /// Exclusive end of the lower region.
        first_end: u64,
        /// Start of the higher region.
        second_start: u64,
        /// Exclusive end of the higher region.
        second_end: u64,
    },

    /// An artifact holds no bytes.
    #[error("segment at {address:#x} is empty")]
    EmptyRegion {
        /// Load address of the empty artifact.
        address: u64,
    },

    /// A region's end address does not fit in the address space.
    #[error("segment at {address:#x} with length {length:#x} overflows the address space")]
    AddressOverflow {
        /// Load address of the region.
        address: u64,
        /// Length of the region.
        length: u64,
    },

    /// The backing artifact's length differs from the region's length.
    #[error("segment at {address:#x} holds {actual:#x} bytes, expected {expected:#x}")]
    LengthMismatch {
        /// Load address of the region.
        address: u64,
        /// Length the region was expected to have.
        expected: u64,
        /// Length the store actually reported.
        actual: u64,
    },

    /// The absorbed bytes were appended to the target, but the absorbed
    /// artifact could not be synced or deleted.
    ///
    /// No bytes are lost: the target now holds a superset of the absorbed
    /// artifact. Deleting `absorbed` completes the merge.
    #[error("merge of {absorbed:#x} into {target:#x} left {absorbed:#x} in place: {source}")]
    IncompleteMerge {
        /// Start of the region that received the bytes.
        target: u64,
        /// Start of the region whose artifact is still present.
        absorbed: u64,
        /// The failure that interrupted the merge.
        #[source]
        source: StoreError,
    },

    /// Another process holds the dump directory lock.
    #[error("dump directory locked: {}", path.display())]
    DirectoryLocked {
        /// The locked directory.
        path: PathBuf,
    },

    /// The dump directory is missing or not a directory.
    #[error("invalid dump directory: {message}")]
    InvalidDirectory {
        /// Description of the problem.
        message: String,
    },

    /// The segment metadata table is invalid.
    #[error("invalid segment table: {message}")]
    SegmentTable {
        /// Description of the problem.
        message: String,
    },

    /// JSON encoding or decoding failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl CoreError {
    /// Creates an invalid directory error.
    pub fn invalid_directory(message: impl Into<String>) -> Self {
        Self::InvalidDirectory {
            message: message.into(),
        }
    }

    /// Creates a segment table error.
    pub fn segment_table(message: impl Into<String>) -> Self {
        Self::SegmentTable {
            message: message.into(),
        }
    }

    /// Returns true if artifact discovery failed.
    #[must_use]
    pub fn is_discovery(&self) -> bool {
        matches!(self, Self::Store(err) if err.is_discovery())
    }

    /// Returns true if an operation referenced a missing artifact.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::Store(err) | Self::IncompleteMerge { source: err, .. } => err.is_not_found(),
            _ => false,
        }
    }

    /// Returns true if the storage layer failed to read, write or delete.
    #[must_use]
    pub fn is_io(&self) -> bool {
        match self {
            Self::Io(_) => true,
            Self::Store(StoreError::Io(_)) => true,
            Self::IncompleteMerge {
                source: StoreError::Io(_),
                ..
            } => true,
            _ => false,
        }
    }

    /// Returns true if two regions overlap.
    #[must_use]
    pub fn is_overlap(&self) -> bool {
        matches!(self, Self::Overlap { .. })
    }

    /// Returns the address of an artifact left behind by an interrupted merge.
    ///
    /// Deleting it from the store completes the merge.
    #[must_use]
    pub fn pending_delete(&self) -> Option<u64> {
        match self {
            Self::IncompleteMerge { absorbed, .. } => Some(*absorbed),
            _ => None,
        }
    }
}
