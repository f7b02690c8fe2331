//! Error types for firmware extraction.

use segmerge_store::StoreError;
use thiserror::Error;

/// Result type for extraction operations.
pub type ExtractResult<T> = Result<T, ExtractError>;

/// Errors that can occur while decoding a firmware container.
///
/// Offsets are byte positions in the buffer being decoded at that stage
/// (the raw input, the combined printer job payload or a raster row).
#[derive(Debug, Error)]
pub enum ExtractError {
    /// Input ended in the middle of a record or token.
    #[error("unexpected end of input at offset {offset:#x}")]
    Truncated {
        /// Offset of the incomplete record or token.
        offset: usize,
    },

    /// A character that must be a hex digit is not one.
    #[error("invalid hex digit {byte:#04x} at offset {offset:#x}")]
    InvalidHex {
        /// Offset of the offending character.
        offset: usize,
        /// The character found.
        byte: u8,
    },

    /// An S-record carries a type that has no defined layout.
    #[error("unknown S-record type {kind:#04x} at offset {offset:#x}")]
    UnknownRecordType {
        /// Offset of the record.
        offset: usize,
        /// The type byte found.
        kind: u8,
    },

    /// An S-record's byte count cannot hold its address and checksum.
    #[error("S-record at offset {offset:#x} declares only {count} bytes")]
    RecordTooShort {
        /// Offset of the record.
        offset: usize,
        /// Declared byte count.
        count: usize,
    },

    /// An S-record's checksum does not match its contents.
    #[error("S-record at offset {offset:#x} has checksum {found:#04x}, expected {expected:#04x}")]
    BadChecksum {
        /// Offset of the record.
        offset: usize,
        /// Checksum computed from the record.
        expected: u8,
        /// Checksum stored in the record.
        found: u8,
    },

    /// A printer job command is malformed or unsupported.
    #[error("printer job command at offset {offset:#x}: {message}")]
    Pjl {
        /// Offset of the command's escape byte.
        offset: usize,
        /// Description of the problem.
        message: String,
    },

    /// A delta-row replacement runs past the end of the seed row.
    #[error("raster replacement at {position} runs past row width {width}")]
    RasterOverflow {
        /// Column the replacement starts at.
        position: usize,
        /// Width of the seed row.
        width: usize,
    },

    /// No raster graphics block is delimited by start and end commands.
    #[error("no raster graphics block found")]
    MissingRaster,

    /// Writing the extracted segments failed.
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

impl ExtractError {
    /// Creates a printer job command error.
    pub fn pjl(offset: usize, message: impl Into<String>) -> Self {
        Self::Pjl {
            offset,
            message: message.into(),
        }
    }

    /// Returns true if the input itself is corrupt, as opposed to the store
    /// failing.
    #[must_use]
    pub fn is_corrupt_input(&self) -> bool {
        !matches!(self, Self::Store(_))
    }

    /// Returns true if a record failed its checksum.
    #[must_use]
    pub fn is_checksum(&self) -> bool {
        matches!(self, Self::BadChecksum { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn checksum_message() {
        let err = ExtractError::BadChecksum {
            offset: 0x20,
            expected: 0xdc,
            found: 0xdd,
        };
        assert!(err.is_checksum());
        assert!(err.is_corrupt_input());
        assert_eq!(
            err.to_string(),
            "S-record at offset 0x20 has checksum 0xdd, expected 0xdc"
        );
    }

    #[test]
    fn store_errors_are_not_corrupt_input() {
        let err: ExtractError = StoreError::AlreadyExists { address: 0x1000 }.into();
        assert!(!err.is_corrupt_input());
    }
}
