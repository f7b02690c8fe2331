//! Printer job stream decoding.
//!
//! Some printer firmware updates arrive as a print job: a universal exit
//! language (UEL) header, then PCL escape sequences. The firmware travels
//! in raster transfer commands (`ESC * b <count> W`), whose data sections
//! concatenate to the update payload.
//!
//! A graphics command is `ESC *`, a lower-case group character, then
//! value/parameter pairs. Lower-case parameters continue the command; the
//! first upper-case parameter terminates it.

use crate::error::{ExtractError, ExtractResult};
use tracing::debug;

const ESC: u8 = 0x1b;
const UEL: &[u8] = b"%-12345X";

/// One decoded printer job command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PjlCommand {
    /// `ESC %-12345X`, with the job language text that follows it.
    Uel {
        /// Text up to the next escape.
        text: String,
    },
    /// `ESC E`, printer reset, with the text that follows it.
    Reset {
        /// Text up to the next escape.
        text: String,
    },
    /// `ESC * ...`, a parameterized graphics command.
    Graphics(GraphicsCommand),
}

/// A parameterized `ESC *` command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GraphicsCommand {
    /// Group character: `r` for raster control, `b` for raster data.
    pub group: u8,
    /// Terminating parameter character.
    pub method: u8,
    /// Compression mode set by an `m` parameter.
    pub compression: Option<u8>,
    /// Value given to the terminating parameter.
    pub value: Option<u64>,
    /// Bytes carried by a raster transfer (`ESC * b <n> V` or `W`).
    pub data: Vec<u8>,
    /// Offset of the command's escape byte.
    pub offset: usize,
}

impl GraphicsCommand {
    /// Returns true for a raster transfer carrying row data.
    #[must_use]
    pub fn is_transfer(&self) -> bool {
        self.group == b'b' && matches!(self.method, b'V' | b'W')
    }

    /// Returns true for a raster control command with the given method.
    #[must_use]
    pub fn is_raster(&self, method: u8) -> bool {
        self.group == b'r' && self.method == method
    }
}

/// Decodes the printer job commands at the start of `bytes`.
///
/// Decoding stops at the end of input or at a byte that is not an escape
/// where a command should begin.
///
/// # Errors
///
/// Returns an error for a malformed UEL, an unsupported command, a
/// transfer without a byte count, or a transfer running past the input.
pub fn parse_pjl(bytes: &[u8]) -> ExtractResult<Vec<PjlCommand>> {
    let mut parser = Parser { data: bytes, pos: 0 };
    let mut commands = Vec::new();

    while let Some(&lead) = bytes.get(parser.pos) {
        if lead != ESC {
            debug!(offset = parser.pos, byte = lead, "no further printer job commands");
            break;
        }
        commands.push(parser.command()?);
    }

    debug!(commands = commands.len(), "decoded printer job");
    Ok(commands)
}

/// Concatenates the data of every raster transfer, in stream order.
#[must_use]
pub fn combine_sections(commands: &[PjlCommand]) -> Vec<u8> {
    commands
        .iter()
        .filter_map(|command| match command {
            PjlCommand::Graphics(graphics) if graphics.is_transfer() => {
                Some(graphics.data.as_slice())
            }
            _ => None,
        })
        .flatten()
        .copied()
        .collect()
}

struct Parser<'a> {
    data: &'a [u8],
    pos: usize,
}

impl Parser<'_> {
    fn command(&mut self) -> ExtractResult<PjlCommand> {
        let offset = self.pos;
        self.pos += 1;

        match self.data.get(self.pos) {
            Some(b'%') => {
                if !self.data[self.pos..].starts_with(UEL) {
                    return Err(ExtractError::pjl(offset, "malformed universal exit language"));
                }
                self.pos += UEL.len();
                Ok(PjlCommand::Uel {
                    text: self.text_to_escape(),
                })
            }
            Some(b'E') => {
                self.pos += 1;
                Ok(PjlCommand::Reset {
                    text: self.text_to_escape(),
                })
            }
            Some(b'*') => {
                self.pos += 1;
                self.graphics(offset).map(PjlCommand::Graphics)
            }
            Some(&other) => Err(ExtractError::pjl(
                offset,
                format!("unsupported command {:?}", char::from(other)),
            )),
            None => Err(ExtractError::Truncated { offset }),
        }
    }

    fn graphics(&mut self, offset: usize) -> ExtractResult<GraphicsCommand> {
        let group = self.next_byte(offset)?;
        if !group.is_ascii_lowercase() {
            return Err(ExtractError::pjl(offset, "graphics group must be lower-case"));
        }

        let mut command = GraphicsCommand {
            group,
            offset,
            ..GraphicsCommand::default()
        };

        loop {
            let value = self.number(offset)?;
            let param = self.next_byte(offset)?;
            match param {
                b'm' => {
                    let mode = u8::try_from(value.unwrap_or(0))
                        .map_err(|_| ExtractError::pjl(offset, "compression mode out of range"))?;
                    command.compression = Some(mode);
                }
                b'a'..=b'z' => {
                    debug!(offset, param = %char::from(param), "skipped graphics parameter");
                }
                b'A'..=b'Z' => {
                    command.method = param;
                    command.value = value;
                    break;
                }
                _ => {
                    return Err(ExtractError::pjl(
                        offset,
                        format!("unexpected byte {param:#04x} in graphics command"),
                    ))
                }
            }
        }

        if command.is_transfer() {
            let count = command
                .value
                .ok_or_else(|| ExtractError::pjl(offset, "raster transfer without a byte count"))?;
            let end = usize::try_from(count)
                .ok()
                .and_then(|count| self.pos.checked_add(count))
                .ok_or(ExtractError::Truncated { offset })?;
            command.data = self
                .data
                .get(self.pos..end)
                .ok_or(ExtractError::Truncated { offset })?
                .to_vec();
            self.pos = end;
        } else if group == b'b' {
            let start = self.pos;
            self.text_to_escape();
            debug!(
                offset,
                method = %char::from(command.method),
                skipped = self.pos - start,
                "skipped unknown raster method"
            );
        }

        Ok(command)
    }

    fn next_byte(&mut self, offset: usize) -> ExtractResult<u8> {
        let byte = *self
            .data
            .get(self.pos)
            .ok_or(ExtractError::Truncated { offset })?;
        self.pos += 1;
        Ok(byte)
    }

    /// Reads an optional decimal value.
    fn number(&mut self, offset: usize) -> ExtractResult<Option<u64>> {
        let start = self.pos;
        while self.data.get(self.pos).is_some_and(u8::is_ascii_digit) {
            self.pos += 1;
        }
        if start == self.pos {
            return Ok(None);
        }

        self.data[start..self.pos]
            .iter()
            .try_fold(0u64, |acc, &digit| {
                acc.checked_mul(10)?.checked_add(u64::from(digit - b'0'))
            })
            .map(Some)
            .ok_or_else(|| ExtractError::pjl(offset, "value out of range"))
    }

    /// Consumes bytes up to the next escape and returns them as text.
    fn text_to_escape(&mut self) -> String {
        let rest = &self.data[self.pos..];
        let len = rest.iter().position(|&b| b == ESC).unwrap_or(rest.len());
        self.pos += len;
        String::from_utf8_lossy(&rest[..len]).into_owned()
    }
}
