//! Motorola S-record decoding.
//!
//! Records come in two encodings, which may be mixed in one stream:
//!
//! - ASCII: `S`, the type digit, then count, address, data and checksum as
//!   pairs of hex digits, terminated by a newline
//! - binary: one byte `0x30 | type`, one count byte, then the raw address,
//!   data and checksum bytes
//!
//! The count covers address, data and checksum. The checksum is the ones'
//! complement of the low byte of the sum of the count, address and data
//! bytes.
//!
//! Lines starting with `F` or `P` are printer chatter between records and
//! are skipped.

use crate::error::{ExtractError, ExtractResult};
use tracing::debug;

/// S-record type, the digit following the `S`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordKind {
    /// S0: header text.
    Header,
    /// S1: data at a 16-bit address.
    Data16,
    /// S2: data at a 24-bit address.
    Data24,
    /// S3: data at a 32-bit address.
    Data32,
    /// S5: 16-bit record count.
    Count16,
    /// S6: 24-bit record count.
    Count24,
    /// S7: 32-bit start address.
    Start32,
    /// S8: 24-bit start address.
    Start24,
    /// S9: 16-bit start address.
    Start16,
    /// SA: vendor record without an address field.
    Vendor,
}

impl RecordKind {
    /// Decodes a type digit (`0x0..=0xa`).
    #[must_use]
    pub const fn from_digit(digit: u8) -> Option<Self> {
        Some(match digit {
            0x0 => Self::Header,
            0x1 => Self::Data16,
            0x2 => Self::Data24,
            0x3 => Self::Data32,
            0x5 => Self::Count16,
            0x6 => Self::Count24,
            0x7 => Self::Start32,
            0x8 => Self::Start24,
            0x9 => Self::Start16,
            0xa => Self::Vendor,
            _ => return None,
        })
    }

    /// Width of the address field in bytes.
    #[must_use]
    pub const fn address_width(self) -> usize {
        match self {
            Self::Header | Self::Data16 | Self::Count16 | Self::Start16 => 2,
            Self::Data24 | Self::Count24 | Self::Start24 => 3,
            Self::Data32 | Self::Start32 => 4,
            Self::Vendor => 0,
        }
    }

    /// Returns true for records whose payload is loaded at their address.
    #[must_use]
    pub const fn is_data(self) -> bool {
        matches!(self, Self::Data16 | Self::Data24 | Self::Data32)
    }
}

/// How a record was encoded in the stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoding {
    /// Hex digits, one record per line.
    Ascii,
    /// Raw bytes.
    Binary,
}

/// One decoded S-record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SRecord {
    /// Record type.
    pub kind: RecordKind,
    /// Encoding the record was read from.
    pub encoding: Encoding,
    /// Address field, zero for records without one.
    pub address: u64,
    /// Payload between the address field and the checksum.
    pub data: Vec<u8>,
    /// Offset of the record's first byte in the input.
    pub offset: usize,
}

/// Computes the S-record checksum over a count byte and the address and
/// data bytes that follow it.
#[must_use]
pub fn checksum(count: u8, fields: &[u8]) -> u8 {
    !fields.iter().fold(count, |sum, &byte| sum.wrapping_add(byte))
}

/// Decodes every S-record at the start of `bytes`.
///
/// Decoding stops at the end of input or at the first byte that cannot
/// begin a record; see [`RecordReader::remaining`].
///
/// # Errors
///
/// Returns an error for a truncated record, a non-hex digit in an ASCII
/// record, an unknown record type, or a checksum mismatch.
pub fn parse_srecords(bytes: &[u8]) -> ExtractResult<Vec<SRecord>> {
    let mut reader = RecordReader::new(bytes);
    let mut records = Vec::new();
    while let Some(record) = reader.next_record()? {
        records.push(record);
    }
    debug!(
        records = records.len(),
        unparsed = reader.remaining().len(),
        "decoded S-records"
    );
    Ok(records)
}

/// Returns the records from the first binary-encoded header onwards.
///
/// Update images carry an ASCII preamble before the flash contents start
/// with a binary S0. Without such a header the result is empty.
#[must_use]
pub fn from_binary_header(records: &[SRecord]) -> &[SRecord] {
    let start = records
        .iter()
        .position(|r| r.kind == RecordKind::Header && r.encoding == Encoding::Binary)
        .unwrap_or(records.len());
    &records[start..]
}

/// Streaming S-record reader.
pub struct RecordReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> RecordReader<'a> {
    /// Creates a reader over `data`.
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    /// Current offset into the input.
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Bytes not consumed by the records read so far.
    pub fn remaining(&self) -> &'a [u8] {
        &self.data[self.pos.min(self.data.len())..]
    }

    /// Reads the next record, or returns `None` once no record follows.
    ///
    /// # Errors
    ///
    /// See [`parse_srecords`].
    pub fn next_record(&mut self) -> ExtractResult<Option<SRecord>> {
        loop {
            let Some(&lead) = self.data.get(self.pos) else {
                return Ok(None);
            };
            match lead {
                b'S' => return self.read_ascii().map(Some),
                0x30..=0x3f => return self.read_binary().map(Some),
                b'F' | b'P' => self.skip_line(),
                b'\r' | b'\n' => self.pos += 1,
                _ => {
                    debug!(offset = self.pos, byte = lead, "no further S-records");
                    return Ok(None);
                }
            }
        }
    }

    fn read_ascii(&mut self) -> ExtractResult<SRecord> {
        let offset = self.pos;
        let digit = self.byte_at(offset + 1, offset)?;
        let kind = hex_value(digit)
            .and_then(RecordKind::from_digit)
            .ok_or(ExtractError::UnknownRecordType { offset, kind: digit })?;

        let count = self.hex_byte(offset + 2, offset)?;
        let fields = (0..usize::from(count))
            .map(|i| self.hex_byte(offset + 4 + 2 * i, offset))
            .collect::<ExtractResult<Vec<_>>>()?;

        self.pos = offset + 4 + 2 * usize::from(count);
        if self.data.get(self.pos) == Some(&b'\r') {
            self.pos += 1;
        }
        if self.data.get(self.pos) == Some(&b'\n') {
            self.pos += 1;
        }

        finish(kind, Encoding::Ascii, offset, count, fields)
    }

    fn read_binary(&mut self) -> ExtractResult<SRecord> {
        let offset = self.pos;
        let lead = self.data[offset];
        let kind = RecordKind::from_digit(lead & 0x0f)
            .ok_or(ExtractError::UnknownRecordType { offset, kind: lead })?;

        let count = self.byte_at(offset + 1, offset)?;
        let end = offset + 2 + usize::from(count);
        let fields = self
            .data
            .get(offset + 2..end)
            .ok_or(ExtractError::Truncated { offset })?
            .to_vec();
        self.pos = end;

        finish(kind, Encoding::Binary, offset, count, fields)
    }

    fn skip_line(&mut self) {
        let rest = &self.data[self.pos..];
        let line = rest.iter().position(|&b| b == b'\n').unwrap_or(rest.len());
        debug!(
            offset = self.pos,
            line = %String::from_utf8_lossy(&rest[..line]),
            "skipped non-record line"
        );
        self.pos += (line + 1).min(rest.len());
    }

    fn byte_at(&self, at: usize, record: usize) -> ExtractResult<u8> {
        self.data
            .get(at)
            .copied()
            .ok_or(ExtractError::Truncated { offset: record })
    }

    fn hex_byte(&self, at: usize, record: usize) -> ExtractResult<u8> {
        let digit = |at: usize| {
            let byte = self.byte_at(at, record)?;
            hex_value(byte).ok_or(ExtractError::InvalidHex { offset: at, byte })
        };
        Ok((digit(at)? << 4) | digit(at + 1)?)
    }
}

fn hex_value(byte: u8) -> Option<u8> {
    char::from(byte).to_digit(16).map(|d| d as u8)
}

/// Splits count-covered `fields` into address, data and checksum.
fn finish(
    kind: RecordKind,
    encoding: Encoding,
    offset: usize,
    count: u8,
    mut fields: Vec<u8>,
) -> ExtractResult<SRecord> {
    let width = kind.address_width();
    let found = match fields.pop() {
        Some(byte) if fields.len() >= width => byte,
        _ => {
            return Err(ExtractError::RecordTooShort {
                offset,
                count: usize::from(count),
            })
        }
    };

    let expected = checksum(count, &fields);
    if found != expected {
        return Err(ExtractError::BadChecksum {
            offset,
            expected,
            found,
        });
    }

    let data = fields.split_off(width);
    let address = fields
        .iter()
        .fold(0u64, |acc, &byte| (acc << 8) | u64::from(byte));

    Ok(SRecord {
        kind,
        encoding,
        address,
        data,
        offset,
    })
}
