//! Constants used across the rover drive core.
//!
//! This module defines the protocol-wide framing constants, the safety thresholds
//! and the timing constants of the control loop. They are the defaults that
//! [`Config`](crate::config::Config) starts from.
//!
//! ## Key Concepts
//!
//! - **Framing**: two start-of-frame bytes, a fixed 4-byte header, up to 255 payload
//!   bytes and a little-endian CRC16 trailer.
//! - **Duty**: signed PWM command in `[-PWM_FULL_SCALE, PWM_FULL_SCALE]`.
//! - **Q15**: host speed fraction where `Q15_FULL_SCALE` is `1.0`.
//! - **Ramps**: duty units per millisecond tick, one for normal driving and one for e-stop.
//! - **Voltage window**: bus voltage band outside of which the outputs are muted.

use core::num::NonZeroU16;

/// First start-of-frame byte.
pub const SOF_BYTE_0: u8 = 0xAA;

/// Second start-of-frame byte.
pub const SOF_BYTE_1: u8 = 0x55;

/// Protocol version carried in every frame header.
pub const PROTOCOL_VERSION: u8 = 0x01;

/// Number of start-of-frame bytes.
pub const FRAME_SOF_LEN: usize = 2;

/// Length (in bytes) of the fixed frame header: version, type, sequence, length.
pub const FRAME_HEADER_LEN: usize = 4;

/// Length (in bytes) of the CRC trailer.
pub const FRAME_CRC_LEN: usize = 2;

/// Bytes in a frame that are not payload.
pub const FRAME_OVERHEAD: usize = FRAME_SOF_LEN + FRAME_HEADER_LEN + FRAME_CRC_LEN;

/// Maximum payload length. The length field is a single byte.
pub const FRAME_MAX_PAYLOAD: usize = 255;

/// Size of the largest possible encoded frame.
pub const FRAME_MAX_LEN: usize = FRAME_OVERHEAD + FRAME_MAX_PAYLOAD;

/// Payload length of a drive command: `left_q15: i16`, `right_q15: i16`, `flags: u16`.
pub const DRIVE_CMD_LEN: usize = 6;

/// Payload length of a telemetry record.
pub const TELEMETRY_LEN: usize = 10;

/// Payload length of the reserved encoder record.
pub const ENCODER_DATA_LEN: usize = 16;

/// PWM full scale. `±10000` is `±100.00 %`.
pub const PWM_FULL_SCALE: i16 = 10_000;

/// Q15 value that stands for `1.0`.
pub const Q15_FULL_SCALE: i16 = 32_767;

/// H-bridge PWM carrier frequency.
pub const PWM_FREQUENCY_HZ: u32 = 20_000;

/// Serial link baud rate (8N1).
pub const UART_BAUDRATE: u32 = 115_200;

/// Control loop frequency.
pub const TICK_HZ: u32 = 1_000;

/// Control loop period in milliseconds.
pub const TICK_PERIOD_MS: u32 = 1;

/// Telemetry period in milliseconds (20 Hz).
pub const TELEMETRY_PERIOD_MS: u32 = 50;

/// A command older than this trips the watchdog.
pub const WATCHDOG_TIMEOUT_MS: u16 = 200;

/// Time for a full-scale change at the normal ramp.
pub const NORMAL_RAMP_TIME_MS: i16 = 2_000;

/// Time for a full-scale stop at the e-stop ramp.
pub const ESTOP_RAMP_TIME_MS: i16 = 50;

/// Duty change per tick during normal operation (5 / ms).
pub const NORMAL_RAMP_RATE: NonZeroU16 = ramp_rate(NORMAL_RAMP_TIME_MS);

/// Duty change per tick while the e-stop is active (200 / ms).
pub const ESTOP_RAMP_RATE: NonZeroU16 = ramp_rate(ESTOP_RAMP_TIME_MS);

const fn ramp_rate(full_scale_ms: i16) -> NonZeroU16 {
    match NonZeroU16::new((PWM_FULL_SCALE / full_scale_ms).unsigned_abs()) {
        Some(rate) => rate,
        None => panic!("ramp time longer than full scale"),
    }
}

/// Lowest acceptable bus voltage in millivolts.
pub const VOLTAGE_MIN_MV: u16 = 9_000;

/// Highest acceptable bus voltage in millivolts.
pub const VOLTAGE_MAX_MV: u16 = 13_000;

/// Nominal bus voltage (3S LiPo) in millivolts.
pub const VOLTAGE_NOMINAL_MV: u16 = 11_100;

/// Longest ASCII command line accepted, terminator excluded.
pub const ASCII_MAX_LINE_LEN: usize = 128;

/// ASCII line terminator.
pub const ASCII_LINE_TERM: u8 = b'\n';

/// Firmware version, major.
pub const FW_VERSION_MAJOR: u8 = 1;

/// Firmware version, minor.
pub const FW_VERSION_MINOR: u8 = 0;

/// Firmware version, patch.
pub const FW_VERSION_PATCH: u8 = 0;
