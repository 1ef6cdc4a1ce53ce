//! Message types and payload codecs.
//!
//! All multi-byte fields are little-endian.

use crate::consts::{DRIVE_CMD_LEN, ENCODER_DATA_LEN, TELEMETRY_LEN};
use crate::error::DecodeError;
use crate::flags::{DriveFlags, FaultFlags};
use crate::protocol::frame::Frame;

/// Message types of protocol version 1.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt-0-3", derive(defmt::Format))]
pub enum MessageType {
    /// Host → controller: wheel speeds and flags.
    DriveCmd = 0x01,
    /// Host → controller: emergency stop, no payload.
    StopCmd = 0x02,
    /// Controller → host: status record.
    Telemetry = 0x10,
    /// Controller → host: wheel encoder record. Reserved.
    EncoderData = 0x11,
    /// Either direction: keepalive.
    Heartbeat = 0xFE,
    /// Controller → host: error details. Reserved.
    ErrorReport = 0xFF,
}

impl TryFrom<u8> for MessageType {
    type Error = DecodeError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0x01 => Ok(Self::DriveCmd),
            0x02 => Ok(Self::StopCmd),
            0x10 => Ok(Self::Telemetry),
            0x11 => Ok(Self::EncoderData),
            0xFE => Ok(Self::Heartbeat),
            0xFF => Ok(Self::ErrorReport),
            other => Err(DecodeError::UnsupportedMessage(other)),
        }
    }
}

impl From<MessageType> for u8 {
    fn from(msg: MessageType) -> u8 {
        msg as u8
    }
}

/// Two-wheel speed command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt-0-3", derive(defmt::Format))]
pub struct DriveCommand {
    /// Left wheel speed, Q15 in `[-32767, 32767]`.
    pub left_q15: i16,
    /// Right wheel speed, Q15 in `[-32767, 32767]`.
    pub right_q15: i16,
    /// Control flags.
    pub flags: DriveFlags,
}

impl DriveCommand {
    /// Creates a drive command.
    pub const fn new(left_q15: i16, right_q15: i16, flags: DriveFlags) -> Self {
        Self {
            left_q15,
            right_q15,
            flags,
        }
    }

    /// Zero speeds with the e-stop flag, the meaning of a `STOP_CMD`.
    pub const fn estop() -> Self {
        Self::new(0, 0, DriveFlags::ESTOP)
    }

    /// Decodes a `DRIVE_CMD` payload.
    ///
    /// # Errors
    /// [`DecodeError::InvalidPayloadLength`] unless `payload` is exactly 6 bytes.
    pub fn decode(payload: &[u8]) -> Result<Self, DecodeError> {
        let &[l0, l1, r0, r1, f0, f1] = payload else {
            return Err(DecodeError::InvalidPayloadLength {
                expected: DRIVE_CMD_LEN,
                actual: payload.len(),
            });
        };
        Ok(Self {
            left_q15: i16::from_le_bytes([l0, l1]),
            right_q15: i16::from_le_bytes([r0, r1]),
            flags: DriveFlags::from_bits_retain(u16::from_le_bytes([f0, f1])),
        })
    }

    /// Encodes the `DRIVE_CMD` payload.
    pub fn encode(&self) -> [u8; DRIVE_CMD_LEN] {
        let [l0, l1] = self.left_q15.to_le_bytes();
        let [r0, r1] = self.right_q15.to_le_bytes();
        let [f0, f1] = self.flags.bits().to_le_bytes();
        [l0, l1, r0, r1, f0, f1]
    }

    /// Whether the e-stop flag is set.
    pub fn is_estop(&self) -> bool {
        self.flags.contains(DriveFlags::ESTOP)
    }

    /// Whether the enable-request flag is set.
    pub fn requests_enable(&self) -> bool {
        self.flags.contains(DriveFlags::ENABLE_REQUEST)
    }
}

/// A decoded host command, whichever protocol it arrived on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt-0-3", derive(defmt::Format))]
pub enum Command {
    /// Wheel speeds and flags.
    Drive(DriveCommand),
    /// Emergency stop.
    Stop,
    /// Keepalive. Does not feed the command watchdog.
    Heartbeat,
}

impl Command {
    /// Interprets a validated frame.
    ///
    /// # Errors
    /// - [`DecodeError::UnsupportedMessage`] for unknown types and for types the
    ///   controller only ever sends
    /// - [`DecodeError::InvalidPayloadLength`] for a malformed `DRIVE_CMD`
    pub fn from_frame(frame: &Frame) -> Result<Self, DecodeError> {
        match MessageType::try_from(frame.msg_type)? {
            MessageType::DriveCmd => DriveCommand::decode(frame.payload()).map(Self::Drive),
            MessageType::StopCmd => Ok(Self::Stop),
            MessageType::Heartbeat => Ok(Self::Heartbeat),
            MessageType::Telemetry | MessageType::EncoderData | MessageType::ErrorReport => {
                Err(DecodeError::UnsupportedMessage(frame.msg_type))
            }
        }
    }

    /// The drive command this stands for, if any. `Stop` maps to [`DriveCommand::estop`].
    pub fn drive(&self) -> Option<DriveCommand> {
        match self {
            Self::Drive(cmd) => Some(*cmd),
            Self::Stop => Some(DriveCommand::estop()),
            Self::Heartbeat => None,
        }
    }

    /// Whether this command requests an emergency stop.
    pub fn is_stop(&self) -> bool {
        self.drive().is_some_and(|cmd| cmd.is_estop())
    }
}

/// Status record sent to the host at 20 Hz.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt-0-3", derive(defmt::Format))]
pub struct TelemetryPayload {
    /// Current (ramped) left duty, `±10000`.
    pub left_duty: i16,
    /// Current (ramped) right duty, `±10000`.
    pub right_duty: i16,
    /// Bus voltage in millivolts.
    pub bus_mv: u16,
    /// Active faults.
    pub faults: FaultFlags,
    /// Milliseconds since the last accepted drive command, saturated.
    pub age_ms: u16,
}

impl TelemetryPayload {
    /// Packs the record into its 10 byte wire form.
    pub fn to_bytes(&self) -> [u8; TELEMETRY_LEN] {
        let mut out = [0u8; TELEMETRY_LEN];
        out[0..2].copy_from_slice(&self.left_duty.to_le_bytes());
        out[2..4].copy_from_slice(&self.right_duty.to_le_bytes());
        out[4..6].copy_from_slice(&self.bus_mv.to_le_bytes());
        out[6..8].copy_from_slice(&self.faults.bits().to_le_bytes());
        out[8..10].copy_from_slice(&self.age_ms.to_le_bytes());
        out
    }

    /// Unpacks a 10 byte wire record.
    ///
    /// # Errors
    /// [`DecodeError::InvalidPayloadLength`] unless `payload` is exactly 10 bytes.
    pub fn from_bytes(payload: &[u8]) -> Result<Self, DecodeError> {
        if payload.len() != TELEMETRY_LEN {
            return Err(DecodeError::InvalidPayloadLength {
                expected: TELEMETRY_LEN,
                actual: payload.len(),
            });
        }
        let word = |i: usize| [payload[i], payload[i + 1]];
        Ok(Self {
            left_duty: i16::from_le_bytes(word(0)),
            right_duty: i16::from_le_bytes(word(2)),
            bus_mv: u16::from_le_bytes(word(4)),
            faults: FaultFlags::from_bits_retain(u16::from_le_bytes(word(6))),
            age_ms: u16::from_le_bytes(word(8)),
        })
    }
}

/// Wheel encoder record. Reserved: the control path never produces it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt-0-3", derive(defmt::Format))]
pub struct EncoderData {
    /// Cumulative left encoder ticks.
    pub left_ticks: i32,
    /// Cumulative right encoder ticks.
    pub right_ticks: i32,
    /// Left velocity in ticks per second.
    pub left_vel: i16,
    /// Right velocity in ticks per second.
    pub right_vel: i16,
    /// Sample time in milliseconds.
    pub timestamp_ms: u32,
}

impl EncoderData {
    /// Packs the record into its 16 byte wire form.
    pub fn to_bytes(&self) -> [u8; ENCODER_DATA_LEN] {
        let mut out = [0u8; ENCODER_DATA_LEN];
        out[0..4].copy_from_slice(&self.left_ticks.to_le_bytes());
        out[4..8].copy_from_slice(&self.right_ticks.to_le_bytes());
        out[8..10].copy_from_slice(&self.left_vel.to_le_bytes());
        out[10..12].copy_from_slice(&self.right_vel.to_le_bytes());
        out[12..16].copy_from_slice(&self.timestamp_ms.to_le_bytes());
        out
    }

    /// Unpacks a 16 byte wire record.
    ///
    /// # Errors
    /// [`DecodeError::InvalidPayloadLength`] unless `payload` is exactly 16 bytes.
    pub fn from_bytes(payload: &[u8]) -> Result<Self, DecodeError> {
        let Ok(raw) = <[u8; ENCODER_DATA_LEN]>::try_from(payload) else {
            return Err(DecodeError::InvalidPayloadLength {
                expected: ENCODER_DATA_LEN,
                actual: payload.len(),
            });
        };
        let dword = |i: usize| [raw[i], raw[i + 1], raw[i + 2], raw[i + 3]];
        Ok(Self {
            left_ticks: i32::from_le_bytes(dword(0)),
            right_ticks: i32::from_le_bytes(dword(4)),
            left_vel: i16::from_le_bytes([raw[8], raw[9]]),
            right_vel: i16::from_le_bytes([raw[10], raw[11]]),
            timestamp_ms: u32::from_le_bytes(dword(12)),
        })
    }
}
