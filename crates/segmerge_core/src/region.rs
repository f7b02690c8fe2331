//! Region and permission types.

use crate::error::{CoreError, CoreResult};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Read/write/execute permission bits of a region.
///
/// The bit layout follows the segment flags used by common disassembler
/// loaders: execute = 1, write = 2, read = 4.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct Permissions(u8);

impl Permissions {
    /// No access.
    pub const NONE: Self = Self(0);
    /// Executable.
    pub const EXECUTE: Self = Self(1);
    /// Writable.
    pub const WRITE: Self = Self(2);
    /// Readable.
    pub const READ: Self = Self(4);
    /// Read, write and execute.
    pub const ALL: Self = Self(7);

    /// Creates permissions from raw bits, rejecting unknown bits.
    #[must_use]
    pub const fn from_bits(bits: u8) -> Option<Self> {
        if bits & !Self::ALL.0 == 0 {
            Some(Self(bits))
        } else {
            None
        }
    }

    /// Returns the raw bits.
    #[must_use]
    pub const fn bits(self) -> u8 {
        self.0
    }

    /// Returns true if every bit in `other` is set.
    #[must_use]
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// Returns the union of both permission sets.
    #[must_use]
    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }
}

impl Default for Permissions {
    fn default() -> Self {
        Self::ALL
    }
}

impl TryFrom<u8> for Permissions {
    type Error = String;

    fn try_from(bits: u8) -> Result<Self, Self::Error> {
        Self::from_bits(bits).ok_or_else(|| format!("invalid permission bits {bits:#x}"))
    }
}

impl From<Permissions> for u8 {
    fn from(perms: Permissions) -> Self {
        perms.0
    }
}

impl fmt::Display for Permissions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let flag = |bit: Self, c: char| if self.contains(bit) { c } else { '-' };
        write!(
            f,
            "{}{}{}",
            flag(Self::READ, 'r'),
            flag(Self::WRITE, 'w'),
            flag(Self::EXECUTE, 'x')
        )
    }
}

/// A contiguous range of load addresses backed by one artifact.
///
/// # Invariants
///
/// - `length > 0`
/// - `start + length` fits in a `u64`, so `end()` is always representable.
///   A region cannot cover the top byte of the address space: its
///   exclusive end would be 2^64.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Region {
    start: u64,
    length: u64,
    permissions: Permissions,
}

impl Region {
    /// Creates a region, validating its range.
    ///
    /// # Errors
    ///
    /// Returns `EmptyRegion` for a zero length and `AddressOverflow` if the
    /// end address does not fit in 64 bits.
    pub fn new(start: u64, length: u64, permissions: Permissions) -> CoreResult<Self> {
        if length == 0 {
            return Err(CoreError::EmptyRegion { address: start });
        }
        if start.checked_add(length).is_none() {
            return Err(CoreError::AddressOverflow {
                address: start,
                length,
            });
        }
        Ok(Self {
            start,
            length,
            permissions,
        })
    }

    /// Load address of the first byte.
    #[must_use]
    pub const fn start(&self) -> u64 {
        self.start
    }

    /// Number of bytes in the region.
    #[must_use]
    pub const fn length(&self) -> u64 {
        self.length
    }

    /// Exclusive end address.
    #[must_use]
    pub const fn end(&self) -> u64 {
        self.start + self.length
    }

    /// Permissions carried by the region.
    #[must_use]
    pub const fn permissions(&self) -> Permissions {
        self.permissions
    }

    /// Returns true if `next` begins exactly where this region ends.
    #[must_use]
    pub const fn touches(&self, next: &Self) -> bool {
        self.end() == next.start
    }

    /// Returns true if the two address ranges share at least one byte.
    #[must_use]
    pub const fn overlaps(&self, other: &Self) -> bool {
        self.start < other.end() && other.start < self.end()
    }

    /// Returns true if `address` falls inside the region.
    #[must_use]
    pub const fn contains(&self, address: u64) -> bool {
        self.start <= address && address < self.end()
    }

    /// Extends the region forward by the length of `next`.
    ///
    /// The start address and permissions are unchanged.
    pub(crate) fn absorb(&mut self, next: &Self) {
        debug_assert!(self.touches(next));
        self.length += next.length;
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{:#010x}, {:#010x}) {:#x} bytes {}",
            self.start,
            self.end(),
            self.length,
            self.permissions
        )
    }
}
