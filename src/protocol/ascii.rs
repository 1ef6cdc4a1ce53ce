//! ASCII fallback protocol.
//!
//! One command per newline-terminated line:
//!
//! | Line          | Meaning |
//! |---------------|---------|
//! | `S`           | stop, e-stop semantics |
//! | `D <l> <r>`   | drive, speeds in `[-1.0, 1.0]` (clamped), requests enable |
//! | `E`           | enable with zero speeds |
//! | `X`           | disable, zero speeds, stop |
//!
//! Telemetry in ASCII mode is a `T <left> <right> <bus_mv> <faults> <age>` line.

use core::fmt::Write;

use heapless::{String, Vec};
use libm::roundf;

use crate::consts::{ASCII_LINE_TERM, ASCII_MAX_LINE_LEN, Q15_FULL_SCALE};
use crate::error::AsciiError;
use crate::flags::DriveFlags;
use crate::protocol::messages::{Command, DriveCommand, TelemetryPayload};

/// Longest telemetry line: `T -10000 -10000 65535 65535 65535\n`.
pub const TELEMETRY_LINE_LEN: usize = 48;

/// A formatted ASCII telemetry line.
pub type TelemetryLine = String<TELEMETRY_LINE_LEN>;

/// Result of parsing one ASCII line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt-0-3", derive(defmt::Format))]
pub struct AsciiCommand {
    /// The equivalent drive command record.
    pub command: DriveCommand,
    /// `S` and `X` stop the rover.
    pub is_stop: bool,
}

impl AsciiCommand {
    /// The command the controller acts on. Stop lines become [`Command::Stop`].
    pub fn into_command(self) -> Command {
        if self.is_stop {
            Command::Stop
        } else {
            Command::Drive(self.command)
        }
    }
}

/// Parses a single line, with or without its `\n` (a trailing `\r` is tolerated).
///
/// # Errors
/// - [`AsciiError::Empty`] for a blank line
/// - [`AsciiError::UnknownCommand`] for anything but `S`, `D`, `E`, `X` or extra fields
/// - [`AsciiError::InvalidNumber`] for a missing or non-numeric `D` speed
pub fn parse_line(line: &str) -> Result<AsciiCommand, AsciiError> {
    let line = line.strip_suffix('\n').unwrap_or(line);
    let line = line.strip_suffix('\r').unwrap_or(line);
    let mut fields = line.split_ascii_whitespace();
    let verb = fields.next().ok_or(AsciiError::Empty)?;

    let parsed = match verb {
        "S" => AsciiCommand {
            command: DriveCommand::estop(),
            is_stop: true,
        },
        "D" => {
            let left = parse_speed(fields.next())?;
            let right = parse_speed(fields.next())?;
            AsciiCommand {
                command: DriveCommand::new(left, right, DriveFlags::ENABLE_REQUEST),
                is_stop: false,
            }
        }
        "E" => AsciiCommand {
            command: DriveCommand::new(0, 0, DriveFlags::ENABLE_REQUEST),
            is_stop: false,
        },
        "X" => AsciiCommand {
            command: DriveCommand::new(0, 0, DriveFlags::empty()),
            is_stop: true,
        },
        _ => return Err(AsciiError::UnknownCommand),
    };

    if fields.next().is_some() {
        return Err(AsciiError::UnknownCommand);
    }
    Ok(parsed)
}

fn parse_speed(field: Option<&str>) -> Result<i16, AsciiError> {
    let value: f32 = field
        .ok_or(AsciiError::InvalidNumber)?
        .parse()
        .map_err(|_| AsciiError::InvalidNumber)?;
    if value.is_nan() {
        return Err(AsciiError::InvalidNumber);
    }
    Ok(speed_to_q15(value))
}

/// Converts a speed fraction to Q15, clamping to `[-1.0, 1.0]` and rounding to nearest.
pub fn speed_to_q15(speed: f32) -> i16 {
    let clamped = speed.clamp(-1.0, 1.0);
    roundf(clamped * f32::from(Q15_FULL_SCALE)) as i16
}

/// Accumulates received bytes into lines and parses each completed line.
#[derive(Debug, Clone, Default)]
pub struct LineBuffer<const N: usize = ASCII_MAX_LINE_LEN> {
    buf: Vec<u8, N>,
    overflowed: bool,
}

impl<const N: usize> LineBuffer<N> {
    /// Creates an empty line buffer.
    pub fn new() -> Self {
        Self {
            buf: Vec::new(),
            overflowed: false,
        }
    }

    /// Feeds one byte.
    ///
    /// Returns `None` while a line is still being collected and the parse result
    /// once the terminator arrives. A line longer than `N` is discarded up to its
    /// terminator and reported as [`AsciiError::LineTooLong`].
    pub fn push(&mut self, byte: u8) -> Option<Result<AsciiCommand, AsciiError>> {
        if byte == ASCII_LINE_TERM {
            let result = if self.overflowed {
                Err(AsciiError::LineTooLong)
            } else {
                core::str::from_utf8(&self.buf)
                    .map_err(|_| AsciiError::InvalidEncoding)
                    .and_then(parse_line)
            };
            self.clear();
            return Some(result);
        }

        if !self.overflowed && self.buf.push(byte).is_err() {
            self.overflowed = true;
        }
        None
    }

    /// Drops any partial line.
    pub fn clear(&mut self) {
        self.buf.clear();
        self.overflowed = false;
    }
}

/// Formats a telemetry record as an ASCII `T` line, terminator included.
pub fn format_telemetry_line(payload: &TelemetryPayload) -> TelemetryLine {
    let mut line = TelemetryLine::new();
    // Cannot overflow: the widest line is 34 bytes.
    let _ = writeln!(
        line,
        "T {} {} {} {} {}",
        payload.left_duty,
        payload.right_duty,
        payload.bus_mv,
        payload.faults.bits(),
        payload.age_ms
    );
    line
}
