//! Binary frame parser and encoder.
//!
//! The parser is fed one byte at a time, typically straight from the UART receive
//! interrupt, and never blocks or allocates. Any framing error (bad version, bad
//! length, CRC mismatch) bumps a counter and drops the parser back to scanning for
//! the next `0xAA 0x55`; there is no need to drain the line.

use heapless::Vec;

use crate::consts::{
    FRAME_CRC_LEN, FRAME_HEADER_LEN, FRAME_MAX_LEN, FRAME_MAX_PAYLOAD, FRAME_OVERHEAD,
    FRAME_SOF_LEN, PROTOCOL_VERSION, SOF_BYTE_0, SOF_BYTE_1,
};
use crate::crc::{crc_ccitt_update, crc16_ccitt_false};
use crate::error::Error;
use crate::protocol::messages::MessageType;

/// An encoded frame, ready for the UART.
pub type FrameBuf = Vec<u8, FRAME_MAX_LEN>;

/// A CRC-validated frame.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt-0-3", derive(defmt::Format))]
pub struct Frame {
    /// Protocol version, always [`PROTOCOL_VERSION`] for an accepted frame.
    pub version: u8,
    /// Raw message type byte. See [`Frame::message_type`].
    pub msg_type: u8,
    /// Sender's sequence number.
    pub seq: u8,
    /// Payload length as announced in the header.
    pub len: u8,
    /// Payload bytes.
    pub payload: Vec<u8, FRAME_MAX_PAYLOAD>,
    /// CRC as received.
    pub crc: u16,
}

impl Frame {
    /// The message type, if it is one this protocol version defines.
    pub fn message_type(&self) -> Option<MessageType> {
        MessageType::try_from(self.msg_type).ok()
    }

    /// The payload as a slice.
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }
}

/// Parser position within a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt-0-3", derive(defmt::Format))]
pub enum ParserState {
    /// Sliding a two byte window over the stream looking for `0xAA 0x55`.
    #[default]
    ScanningSof,
    /// Collecting version, type, sequence and length.
    ReadingHeader,
    /// Collecting `len` payload bytes.
    ReadingPayload,
    /// Collecting the two CRC bytes.
    ReadingCrc,
}

/// Parser counters. All of them wrap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt-0-3", derive(defmt::Format))]
pub struct ParserStats {
    /// Frames that passed the CRC check.
    pub frames_received: u32,
    /// Frames dropped on CRC mismatch.
    pub crc_errors: u32,
    /// Frames dropped on an unknown protocol version.
    pub version_errors: u32,
    /// Frames dropped on an impossible payload length.
    pub length_errors: u32,
}

/// Byte-at-a-time frame parser.
///
/// ## Example
///
/// ```rust
/// use rover_drive::protocol::{FrameParser, encode_frame};
///
/// let bytes = encode_frame(0x01, 7, &[0, 64, 0, 64, 2, 0]).unwrap();
/// let mut parser = FrameParser::new();
/// let mut complete = false;
/// for &b in bytes.iter() {
///     complete = parser.feed(b);
/// }
/// assert!(complete);
/// assert_eq!(parser.frame().seq, 7);
/// ```
#[derive(Debug, Clone, Default)]
pub struct FrameParser {
    state: ParserState,
    sof_buf: [u8; FRAME_SOF_LEN],
    header_buf: [u8; FRAME_HEADER_LEN],
    header_idx: usize,
    frame: Frame,
    crc_buf: [u8; FRAME_CRC_LEN],
    crc_idx: usize,
    stats: ParserStats,
}

impl FrameParser {
    /// Creates a parser scanning for the first start-of-frame.
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds one received byte.
    ///
    /// Returns `true` exactly when this byte completes a CRC-valid frame. The frame
    /// is then available through [`frame()`](FrameParser::frame) until the next call.
    pub fn feed(&mut self, byte: u8) -> bool {
        match self.state {
            ParserState::ScanningSof => {
                self.sof_buf[0] = self.sof_buf[1];
                self.sof_buf[1] = byte;
                if self.sof_buf == [SOF_BYTE_0, SOF_BYTE_1] {
                    self.sof_buf = [0; FRAME_SOF_LEN];
                    self.header_idx = 0;
                    self.state = ParserState::ReadingHeader;
                }
            }
            ParserState::ReadingHeader => {
                self.header_buf[self.header_idx] = byte;
                self.header_idx += 1;
                if self.header_idx >= FRAME_HEADER_LEN {
                    self.finish_header();
                }
            }
            ParserState::ReadingPayload => {
                // Capacity is 255 and len is a u8, so this cannot overflow.
                let _ = self.frame.payload.push(byte);
                if self.frame.payload.len() >= usize::from(self.frame.len) {
                    self.crc_idx = 0;
                    self.state = ParserState::ReadingCrc;
                }
            }
            ParserState::ReadingCrc => {
                self.crc_buf[self.crc_idx] = byte;
                self.crc_idx += 1;
                if self.crc_idx >= FRAME_CRC_LEN {
                    self.state = ParserState::ScanningSof;
                    return self.finish_crc();
                }
            }
        }
        false
    }

    fn finish_header(&mut self) {
        let [version, msg_type, seq, len] = self.header_buf;
        self.frame.version = version;
        self.frame.msg_type = msg_type;
        self.frame.seq = seq;
        self.frame.len = len;
        self.frame.payload.clear();

        if version != PROTOCOL_VERSION {
            self.stats.version_errors = self.stats.version_errors.wrapping_add(1);
            debug!("frame dropped: version {}", version);
            self.state = ParserState::ScanningSof;
            return;
        }
        if usize::from(len) > FRAME_MAX_PAYLOAD {
            self.stats.length_errors = self.stats.length_errors.wrapping_add(1);
            debug!("frame dropped: length {}", len);
            self.state = ParserState::ScanningSof;
            return;
        }

        self.crc_idx = 0;
        self.state = if len == 0 {
            ParserState::ReadingCrc
        } else {
            ParserState::ReadingPayload
        };
    }

    fn finish_crc(&mut self) -> bool {
        self.frame.crc = u16::from_le_bytes(self.crc_buf);
        let computed = self
            .frame
            .payload
            .iter()
            .fold(crc16_ccitt_false(&self.header_buf), crc_ccitt_update);

        if computed == self.frame.crc {
            self.stats.frames_received = self.stats.frames_received.wrapping_add(1);
            true
        } else {
            self.stats.crc_errors = self.stats.crc_errors.wrapping_add(1);
            debug!(
                "frame dropped: crc {} != computed {}",
                self.frame.crc, computed
            );
            false
        }
    }

    /// The most recently completed frame.
    ///
    /// Only meaningful right after [`feed()`](FrameParser::feed) returned `true`.
    pub fn frame(&self) -> &Frame {
        &self.frame
    }

    /// Current parser state.
    pub fn state(&self) -> ParserState {
        self.state
    }

    /// Snapshot of the parser counters.
    pub fn stats(&self) -> ParserStats {
        self.stats
    }

    /// Abandons any partial frame and goes back to scanning. Counters are kept.
    pub fn reset(&mut self) {
        self.state = ParserState::ScanningSof;
        self.sof_buf = [0; FRAME_SOF_LEN];
        self.header_idx = 0;
        self.crc_idx = 0;
        self.frame.payload.clear();
    }
}

/// Encodes a frame into `out` and returns the number of bytes written.
///
/// # Errors
/// - [`Error::PayloadTooLarge`] if `payload` is longer than 255 bytes
/// - [`Error::BufferTooSmall`] if `out` cannot hold the frame
pub fn encode_frame_into(
    msg_type: u8,
    seq: u8,
    payload: &[u8],
    out: &mut [u8],
) -> Result<usize, Error> {
    let len = u8::try_from(payload.len()).map_err(|_| Error::PayloadTooLarge(payload.len()))?;
    let total = payload.len() + FRAME_OVERHEAD;
    if out.len() < total {
        return Err(Error::BufferTooSmall {
            needed: total,
            available: out.len(),
        });
    }

    out[0] = SOF_BYTE_0;
    out[1] = SOF_BYTE_1;
    out[2] = PROTOCOL_VERSION;
    out[3] = msg_type;
    out[4] = seq;
    out[5] = len;

    let payload_start = FRAME_SOF_LEN + FRAME_HEADER_LEN;
    let crc_start = payload_start + payload.len();
    out[payload_start..crc_start].copy_from_slice(payload);

    let crc = crc16_ccitt_false(&out[FRAME_SOF_LEN..crc_start]);
    out[crc_start..total].copy_from_slice(&crc.to_le_bytes());
    Ok(total)
}

/// Encodes a frame into a fresh [`FrameBuf`].
///
/// # Errors
/// [`Error::PayloadTooLarge`] if `payload` is longer than 255 bytes.
pub fn encode_frame(msg_type: u8, seq: u8, payload: &[u8]) -> Result<FrameBuf, Error> {
    let mut buf = [0u8; FRAME_MAX_LEN];
    let len = encode_frame_into(msg_type, seq, payload, &mut buf)?;
    FrameBuf::from_slice(&buf[..len]).map_err(|_| Error::BufferTooSmall {
        needed: len,
        available: FRAME_MAX_LEN,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const DRIVE: [u8; 6] = [0x00, 0x40, 0x00, 0x40, 0x02, 0x00];

    fn feed_all(parser: &mut FrameParser, bytes: &[u8]) -> usize {
        bytes.iter().filter(|&&b| parser.feed(b)).count()
    }

    #[test]
    fn test_encode_layout() {
        let bytes = encode_frame(0x01, 0x2A, &DRIVE).unwrap();
        assert_eq!(bytes.len(), 6 + DRIVE.len() + 2);
        assert_eq!(&bytes[..6], &[0xAA, 0x55, 0x01, 0x01, 0x2A, 0x06]);
        assert_eq!(&bytes[6..12], &DRIVE);
        let crc = crc16_ccitt_false(&bytes[2..12]);
        assert_eq!(&bytes[12..], &crc.to_le_bytes());
    }

    #[test]
    fn test_encode_rejects_oversized_payload() {
        let payload = [0u8; 256];
        assert_eq!(
            encode_frame(0x10, 0, &payload),
            Err(Error::PayloadTooLarge(256))
        );
    }

    #[test]
    fn test_encode_into_small_buffer() {
        let mut out = [0u8; 10];
        assert_eq!(
            encode_frame_into(0x01, 0, &DRIVE, &mut out),
            Err(Error::BufferTooSmall {
                needed: 14,
                available: 10
            })
        );
    }

    #[test]
    fn test_parse_round_trip() {
        let bytes = encode_frame(0x01, 200, &DRIVE).unwrap();
        let mut parser = FrameParser::new();
        let (last, head) = bytes.split_last().unwrap();
        assert_eq!(feed_all(&mut parser, head), 0);
        assert!(parser.feed(*last));

        let frame = parser.frame();
        assert_eq!(frame.version, PROTOCOL_VERSION);
        assert_eq!(frame.msg_type, 0x01);
        assert_eq!(frame.message_type(), Some(MessageType::DriveCmd));
        assert_eq!(frame.seq, 200);
        assert_eq!(frame.payload(), &DRIVE);
        assert_eq!(parser.stats().frames_received, 1);
        assert_eq!(parser.state(), ParserState::ScanningSof);
    }

    #[test]
    fn test_empty_payload_and_max_payload() {
        let mut parser = FrameParser::new();
        let empty = encode_frame(0x02, 1, &[]).unwrap();
        assert_eq!(feed_all(&mut parser, &empty), 1);
        assert!(parser.frame().payload().is_empty());

        let big: [u8; 255] = core::array::from_fn(|i| i as u8);
        let full = encode_frame(0xFE, 2, &big).unwrap();
        assert_eq!(feed_all(&mut parser, &full), 1);
        assert_eq!(parser.frame().payload(), &big[..]);
    }

    #[test]
    fn test_crc_corruption_then_resync() {
        let mut parser = FrameParser::new();
        let mut bad = encode_frame(0x01, 1, &DRIVE).unwrap();
        let last = bad.len() - 1;
        bad[last] ^= 0x01;
        assert_eq!(feed_all(&mut parser, &bad), 0);
        assert_eq!(parser.stats().crc_errors, 1);

        let good = encode_frame(0x01, 2, &DRIVE).unwrap();
        assert_eq!(feed_all(&mut parser, &good), 1);
        assert_eq!(parser.frame().seq, 2);
        assert_eq!(parser.stats().crc_errors, 1);
        assert_eq!(parser.stats().frames_received, 1);
    }

    #[test]
    fn test_version_error_resyncs() {
        let mut parser = FrameParser::new();
        let mut bad = encode_frame(0x01, 1, &DRIVE).unwrap();
        bad[2] = 0x02;
        assert_eq!(feed_all(&mut parser, &bad), 0);
        assert_eq!(parser.stats().version_errors, 1);

        let good = encode_frame(0x01, 3, &DRIVE).unwrap();
        assert_eq!(feed_all(&mut parser, &good), 1);
        assert_eq!(parser.frame().seq, 3);
    }

    #[test]
    fn test_garbage_before_and_between_frames() {
        let mut parser = FrameParser::new();
        let noise = [0x00, 0xAA, 0xAA, 0x13, 0x55, 0xFF, 0xAA];
        assert_eq!(feed_all(&mut parser, &noise), 0);

        // The trailing 0xAA slides out of the window as the real SOF arrives.
        let good = encode_frame(0x01, 9, &DRIVE).unwrap();
        assert_eq!(feed_all(&mut parser, &good), 1);
        assert_eq!(feed_all(&mut parser, &noise), 0);
        assert_eq!(feed_all(&mut parser, &good), 1);
        assert_eq!(parser.stats().frames_received, 2);
    }

    #[test]
    fn test_truncated_frame_never_completes() {
        let mut parser = FrameParser::new();
        let good = encode_frame(0x01, 1, &DRIVE).unwrap();
        assert_eq!(feed_all(&mut parser, &good[..good.len() - 1]), 0);
        assert_eq!(parser.state(), ParserState::ReadingCrc);
        parser.reset();
        assert_eq!(parser.state(), ParserState::ScanningSof);
        assert_eq!(feed_all(&mut parser, &good), 1);
    }

    #[test]
    fn test_single_bit_flips_are_never_accepted() {
        let good = encode_frame(0x01, 5, &DRIVE).unwrap();
        for idx in 2..good.len() {
            for bit in 0..8 {
                let mut bytes = good.clone();
                bytes[idx] ^= 1 << bit;
                let mut parser = FrameParser::new();
                let completed = feed_all(&mut parser, &bytes);
                // A flipped length byte may leave the parser waiting for more bytes.
                assert_eq!(completed, 0, "byte {idx} bit {bit}");
            }
        }
    }
}
