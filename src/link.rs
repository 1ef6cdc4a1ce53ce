//! Command link: received bytes in, decoded [`Command`]s out.
//!
//! A [`CommandLink`] is owned by the UART receive interrupt. It runs either the
//! binary frame parser or the ASCII line assembler, depending on the configured
//! [`ProtocolMode`], and turns every complete message into the same [`Command`]
//! values. Malformed input is counted, logged, and dropped.

use crate::config::{Config, ProtocolMode};
use crate::protocol::ascii::LineBuffer;
use crate::protocol::frame::{FrameParser, ParserStats};
use crate::protocol::messages::Command;

/// Link-level counters. All of them wrap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt-0-3", derive(defmt::Format))]
pub struct LinkStats {
    /// Commands handed to the controller.
    pub commands: u32,
    /// CRC-valid frames that did not decode to a command.
    pub decode_errors: u32,
    /// ASCII lines that did not parse.
    pub ascii_errors: u32,
}

/// Protocol front end for the receive path.
#[derive(Debug, Clone)]
pub struct CommandLink {
    mode: ProtocolMode,
    parser: FrameParser,
    lines: LineBuffer,
    stats: LinkStats,
}

impl CommandLink {
    /// Creates a link speaking `config.protocol`.
    pub fn new(config: &Config) -> Self {
        Self {
            mode: config.protocol,
            parser: FrameParser::new(),
            lines: LineBuffer::new(),
            stats: LinkStats::default(),
        }
    }

    /// Feeds one received byte, returning a command when it completes one.
    pub fn push_byte(&mut self, byte: u8) -> Option<Command> {
        let command = match self.mode {
            ProtocolMode::Binary => self.push_binary(byte),
            ProtocolMode::Ascii => self.push_ascii(byte),
        }?;
        self.stats.commands = self.stats.commands.wrapping_add(1);
        Some(command)
    }

    fn push_binary(&mut self, byte: u8) -> Option<Command> {
        if !self.parser.feed(byte) {
            return None;
        }
        match Command::from_frame(self.parser.frame()) {
            Ok(command) => Some(command),
            Err(e) => {
                self.stats.decode_errors = self.stats.decode_errors.wrapping_add(1);
                debug!("dropping frame: {}", e);
                None
            }
        }
    }

    fn push_ascii(&mut self, byte: u8) -> Option<Command> {
        match self.lines.push(byte)? {
            Ok(parsed) => Some(parsed.into_command()),
            Err(e) => {
                self.stats.ascii_errors = self.stats.ascii_errors.wrapping_add(1);
                warn!("dropping line: {}", e);
                None
            }
        }
    }

    /// Feeds a run of bytes, returning the last command it completes.
    pub fn push_bytes(&mut self, bytes: &[u8]) -> Option<Command> {
        bytes.iter().fold(None, |last, &b| self.push_byte(b).or(last))
    }

    /// The protocol this link speaks.
    pub fn mode(&self) -> ProtocolMode {
        self.mode
    }

    /// Link counters.
    pub fn stats(&self) -> LinkStats {
        self.stats
    }

    /// Frame parser counters.
    pub fn parser_stats(&self) -> ParserStats {
        self.parser.stats()
    }

    /// Drops any partially received frame or line. Counters are kept.
    pub fn reset(&mut self) {
        self.parser.reset();
        self.lines.clear();
    }
}
