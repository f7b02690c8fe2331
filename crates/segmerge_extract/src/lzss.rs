//! LZSS decompression.
//!
//! The stream is a sequence of groups: one flag byte followed by up to
//! eight items, least significant flag bit first. A set bit is a literal
//! byte. A clear bit is a two-byte back reference into a 4 KiB ring
//! buffer:
//!
//! ```text
//! byte 0: position bits 0-7
//! byte 1: position bits 8-11 (high nibble) | length - 3 (low nibble)
//! ```
//!
//! The ring buffer starts zero-filled, with the write position at `0xfee`.

use crate::error::{ExtractError, ExtractResult};
use tracing::debug;

/// Size of the sliding window.
pub const WINDOW_SIZE: usize = 0x1000;

/// Shortest match a back reference encodes.
pub const MIN_MATCH: usize = 3;

/// Longest match a back reference encodes.
pub const MAX_MATCH: usize = MIN_MATCH + 0xf;

const WINDOW_MASK: usize = WINDOW_SIZE - 1;

/// Ring buffer holding the most recent output.
struct Window {
    buf: [u8; WINDOW_SIZE],
    cursor: usize,
}

impl Window {
    fn new() -> Self {
        Self {
            buf: [0; WINDOW_SIZE],
            cursor: WINDOW_SIZE - MAX_MATCH,
        }
    }

    fn get(&self, position: usize) -> u8 {
        self.buf[position & WINDOW_MASK]
    }

    fn push(&mut self, byte: u8) {
        self.buf[self.cursor] = byte;
        self.cursor = (self.cursor + 1) & WINDOW_MASK;
    }
}

/// Decompresses an LZSS stream.
///
/// A flag byte with nothing after it ends the stream.
///
/// # Errors
///
/// Returns `Truncated` if the input ends inside a back reference.
pub fn decompress(src: &[u8]) -> ExtractResult<Vec<u8>> {
    let mut window = Window::new();
    let mut out = Vec::with_capacity(src.len() * 2);
    let mut pos = 0;
    let mut flags: u32 = 0;

    while pos < src.len() {
        // The high byte counts down the items left in the current group.
        if flags & 0x100 == 0 {
            flags = 0xff00 | u32::from(src[pos]);
            pos += 1;
            continue;
        }

        let literal = flags & 1 == 1;
        flags >>= 1;

        if literal {
            let byte = src[pos];
            pos += 1;
            out.push(byte);
            window.push(byte);
            continue;
        }

        let Some(&[low, high]) = src.get(pos..pos + 2) else {
            return Err(ExtractError::Truncated { offset: pos });
        };
        pos += 2;

        let start = usize::from(low) | (usize::from(high & 0xf0) << 4);
        let length = usize::from(high & 0x0f) + MIN_MATCH;
        for i in 0..length {
            let byte = window.get(start + i);
            out.push(byte);
            window.push(byte);
        }
    }

    debug!(input = src.len(), output = out.len(), "decompressed LZSS stream");
    Ok(out)
}
