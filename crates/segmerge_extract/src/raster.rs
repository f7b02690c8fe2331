//! Raster row decompression for printer job bitmaps.
//!
//! Supported compression modes:
//!
//! - 0: unencoded
//! - 2: run-length (TIFF PackBits)
//! - 3: delta row against the previous row
//!
//! Rows sent by plane (`V`) are zero-filled to the row width; rows sent by
//! row (`W`) are not.

use crate::error::{ExtractError, ExtractResult};
use crate::pjl::PjlCommand;
use tracing::{debug, warn};

/// Width of a raster row in bytes.
pub const ROW_WIDTH: usize = 16384;

/// Decompresses one transferred row.
///
/// `seed` is the previous decompressed row; delta-row mode edits a copy of
/// it. Unknown modes are passed through unchanged.
///
/// # Errors
///
/// Returns `Truncated` if the row data ends inside a code, or
/// `RasterOverflow` if a delta replacement runs past the seed row.
pub fn decompress_row(
    compression: u8,
    method: u8,
    data: &[u8],
    seed: &[u8],
) -> ExtractResult<Vec<u8>> {
    let mut row = match compression {
        0 => data.to_vec(),
        2 => unpack_bits(data)?,
        3 => return apply_delta(data, seed),
        mode => {
            warn!(mode, "unknown raster compression, leaving row as-is");
            return Ok(data.to_vec());
        }
    };

    if method == b'V' {
        row.resize(ROW_WIDTH, 0);
    }
    Ok(row)
}

/// Decodes every row between the raster start (`ESC * r A`) and the
/// following raster end (`ESC * r C`).
///
/// # Errors
///
/// Returns `MissingRaster` if no delimited block exists, or any error from
/// [`decompress_row`].
pub fn extract_bitmap(commands: &[PjlCommand]) -> ExtractResult<Vec<u8>> {
    let is_raster = |command: &PjlCommand, method: u8| {
        matches!(command, PjlCommand::Graphics(g) if g.is_raster(method))
    };

    let start = commands
        .iter()
        .position(|c| is_raster(c, b'A'))
        .ok_or(ExtractError::MissingRaster)?;
    let end = commands[start..]
        .iter()
        .position(|c| is_raster(c, b'C'))
        .map(|i| start + i)
        .ok_or(ExtractError::MissingRaster)?;

    let mut compression = 0;
    let mut seed = vec![0u8; ROW_WIDTH];
    let mut bitmap = Vec::new();

    for command in &commands[start + 1..end] {
        let PjlCommand::Graphics(graphics) = command else {
            continue;
        };
        if let Some(mode) = graphics.compression {
            debug!(mode, offset = graphics.offset, "raster compression changed");
            compression = mode;
        }
        if graphics.is_transfer() {
            seed = decompress_row(compression, graphics.method, &graphics.data, &seed)?;
            bitmap.extend_from_slice(&seed);
        }
    }

    Ok(bitmap)
}

fn unpack_bits(data: &[u8]) -> ExtractResult<Vec<u8>> {
    let mut out = Vec::new();
    let mut pos = 0;

    while let Some(&control) = data.get(pos) {
        pos += 1;
        match control as i8 {
            0..=127 => {
                let len = usize::from(control) + 1;
                let literal = data
                    .get(pos..pos + len)
                    .ok_or(ExtractError::Truncated { offset: pos })?;
                out.extend_from_slice(literal);
                pos += len;
            }
            -128 => {}
            repeat => {
                let byte = *data.get(pos).ok_or(ExtractError::Truncated { offset: pos })?;
                let count = usize::from(repeat.unsigned_abs()) + 1;
                out.resize(out.len() + count, byte);
                pos += 1;
            }
        }
    }
    Ok(out)
}

fn apply_delta(data: &[u8], seed: &[u8]) -> ExtractResult<Vec<u8>> {
    let mut row = seed.to_vec();
    let mut column = 0;
    let mut pos = 0;

    while let Some(&control) = data.get(pos) {
        pos += 1;
        let count = usize::from(control >> 5) + 1;
        let mut skip = usize::from(control & 0x1f);
        if skip == 0x1f {
            loop {
                let extra = *data.get(pos).ok_or(ExtractError::Truncated { offset: pos })?;
                pos += 1;
                skip += usize::from(extra);
                if extra != 0xff {
                    break;
                }
            }
        }
        column += skip;

        let replacement = data
            .get(pos..pos + count)
            .ok_or(ExtractError::Truncated { offset: pos })?;
        let width = row.len();
        row.get_mut(column..column + count)
            .ok_or(ExtractError::RasterOverflow {
                position: column,
                width,
            })?
            .copy_from_slice(replacement);

        pos += count;
        column += count;
    }
    Ok(row)
}
