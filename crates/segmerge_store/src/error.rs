//! Error types for store operations.

use std::io;
use thiserror::Error;

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors that can occur during store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The backing location could not be enumerated, or an artifact identity
    /// could not be parsed as a load address.
    #[error("discovery failed: {message}")]
    Discovery {
        /// Description of the failure.
        message: String,
    },

    /// Two artifacts claim the same load address.
    #[error("duplicate load address {address:#x}: `{first}` and `{second}`")]
    DuplicateAddress {
        /// The contested load address.
        address: u64,
        /// Identity of the first artifact.
        first: String,
        /// Identity of the second artifact.
        second: String,
    },

    /// No artifact exists at the given address.
    #[error("no segment at address {address:#x}")]
    NotFound {
        /// The requested load address.
        address: u64,
    },

    /// An artifact already exists at the given address.
    #[error("segment already exists at address {address:#x}")]
    AlreadyExists {
        /// The requested load address.
        address: u64,
    },

    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl StoreError {
    /// Creates a discovery error.
    pub fn discovery(message: impl Into<String>) -> Self {
        Self::Discovery {
            message: message.into(),
        }
    }

    /// Returns true for failures raised while enumerating artifacts.
    #[must_use]
    pub fn is_discovery(&self) -> bool {
        matches!(self, Self::Discovery { .. } | Self::DuplicateAddress { .. })
    }

    /// Returns true if an operation referenced a missing artifact.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Maps an I/O error raised while touching the artifact at `address`.
    ///
    /// A missing file becomes [`StoreError::NotFound`], anything else stays I/O.
    pub(crate) fn from_io(address: u64, err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::NotFound => Self::NotFound { address },
            io::ErrorKind::AlreadyExists => Self::AlreadyExists { address },
            _ => Self::Io(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_not_found_maps_to_not_found() {
        let err = StoreError::from_io(0x40, io::Error::from(io::ErrorKind::NotFound));
        assert!(matches!(err, StoreError::NotFound { address: 0x40 }));
        assert!(err.is_not_found());
    }

    #[test]
    fn other_io_stays_io() {
        let err = StoreError::from_io(0x40, io::Error::from(io::ErrorKind::PermissionDenied));
        assert!(matches!(err, StoreError::Io(_)));
        assert!(!err.is_discovery());
    }

    #[test]
    fn duplicate_is_a_discovery_failure() {
        let err = StoreError::DuplicateAddress {
            address: 0x2000,
            first: "2000.bin".into(),
            second: "0x2000.bin".into(),
        };
        assert!(err.is_discovery());
        assert_eq!(
            err.to_string(),
            "duplicate load address 0x2000: `2000.bin` and `0x2000.bin`"
        );
    }
}
