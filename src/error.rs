//! Error types.
//!
//! None of these ever escape the control tick. The frame encoder returns
//! [`Error`], the message decoders return [`DecodeError`] and the ASCII adapter
//! returns [`AsciiError`]; the command link counts and logs the latter two and
//! drops the offending input.

use thiserror::Error;

/// Frame encoding errors.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt-0-3", derive(defmt::Format))]
pub enum Error {
    /// The payload does not fit the single-byte length field.
    #[error("payload of {0} bytes exceeds the 255 byte frame limit")]
    PayloadTooLarge(usize),
    /// The output buffer cannot hold the encoded frame.
    #[error("output buffer holds {available} bytes, frame needs {needed}")]
    BufferTooSmall {
        /// Bytes required for the encoded frame.
        needed: usize,
        /// Bytes offered by the caller.
        available: usize,
    },
}

/// Errors turning a validated frame into a command.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt-0-3", derive(defmt::Format))]
pub enum DecodeError {
    /// The message type is unknown or not one the controller accepts.
    #[error("unsupported message type {0:#04x}")]
    UnsupportedMessage(u8),
    /// A known message arrived with the wrong payload length.
    #[error("payload length {actual}, expected {expected}")]
    InvalidPayloadLength {
        /// Length the message type requires.
        expected: usize,
        /// Length the frame carried.
        actual: usize,
    },
}

/// Errors from the ASCII fallback adapter.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt-0-3", derive(defmt::Format))]
pub enum AsciiError {
    /// The line held nothing but whitespace.
    #[error("empty line")]
    Empty,
    /// The line is not one of `S`, `D <l> <r>`, `E` or `X`.
    #[error("unknown command")]
    UnknownCommand,
    /// A speed field of a `D` line is missing or not a number.
    #[error("invalid number")]
    InvalidNumber,
    /// The line grew past the buffer before a terminator arrived.
    #[error("line too long")]
    LineTooLong,
    /// The line is not valid UTF-8.
    #[error("line is not valid utf-8")]
    InvalidEncoding,
}
