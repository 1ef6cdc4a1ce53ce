//! Host link protocols.
//!
//! The host talks to the controller over a 115200 8N1 serial link in one of two
//! formats:
//!
//! - [`frame`]: the framed binary protocol (version 1). A byte-at-a-time
//!   [`FrameParser`](frame::FrameParser) validates the CRC and resynchronizes on
//!   the next start-of-frame after any error; [`encode_frame`](frame::encode_frame)
//!   builds outgoing frames.
//! - [`ascii`]: a newline-terminated fallback meant for bench testing from a
//!   terminal.
//!
//! Both produce the same [`Command`](messages::Command) values, defined in
//! [`messages`] together with the payload codecs.
//!
//! ## Frame layout
//!
//! | offset | size | field |
//! |--------|------|-------|
//! | 0      | 1    | SOF0 = `0xAA` |
//! | 1      | 1    | SOF1 = `0x55` |
//! | 2      | 1    | version = `0x01` |
//! | 3      | 1    | message type |
//! | 4      | 1    | sequence (wraps) |
//! | 5      | 1    | payload length N |
//! | 6      | N    | payload |
//! | 6+N    | 2    | CRC16 over bytes `2..6+N`, little-endian |

pub mod ascii;
pub mod frame;
pub mod messages;

pub use frame::{Frame, FrameBuf, FrameParser, ParserState, ParserStats, encode_frame};
pub use messages::{Command, DriveCommand, EncoderData, MessageType, TelemetryPayload};
