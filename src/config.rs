//! Runtime configuration.
//!
//! A [`Config`] is handed to [`Controller::new`](crate::controller::Controller::new)
//! and [`CommandLink::new`](crate::link::CommandLink::new) once at start-up. It is not
//! persisted and cannot be changed while running. [`Config::default`] reproduces the
//! constants in [`crate::consts`].

use core::num::NonZeroU16;

use crate::consts::{
    ESTOP_RAMP_RATE, NORMAL_RAMP_RATE, TELEMETRY_PERIOD_MS, VOLTAGE_MAX_MV, VOLTAGE_MIN_MV,
    WATCHDOG_TIMEOUT_MS,
};

/// Which wire format the host speaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt-0-3", derive(defmt::Format))]
pub enum ProtocolMode {
    /// Line-oriented ASCII fallback (`S`, `D <l> <r>`, `E`, `X`).
    Ascii,
    /// Framed binary protocol, version 1.
    #[default]
    Binary,
}

/// Tunables of the control core.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt-0-3", derive(defmt::Format))]
pub struct Config {
    /// Wire format for commands and telemetry.
    pub protocol: ProtocolMode,
    /// Command age, in ms, at which the watchdog trips.
    pub watchdog_timeout_ms: u16,
    /// Telemetry period in ms.
    pub telemetry_period_ms: u32,
    /// Duty change per tick in normal operation.
    pub normal_ramp_rate: NonZeroU16,
    /// Duty change per tick while the e-stop is active.
    pub estop_ramp_rate: NonZeroU16,
    /// Undervoltage threshold in mV. Readings below it trip the fault.
    pub voltage_min_mv: u16,
    /// Overvoltage threshold in mV. Readings above it trip the fault.
    pub voltage_max_mv: u16,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            protocol: ProtocolMode::default(),
            watchdog_timeout_ms: WATCHDOG_TIMEOUT_MS,
            telemetry_period_ms: TELEMETRY_PERIOD_MS,
            normal_ramp_rate: NORMAL_RAMP_RATE,
            estop_ramp_rate: ESTOP_RAMP_RATE,
            voltage_min_mv: VOLTAGE_MIN_MV,
            voltage_max_mv: VOLTAGE_MAX_MV,
        }
    }
}

impl Config {
    /// Default configuration speaking the ASCII fallback protocol.
    pub fn ascii() -> Self {
        Self {
            protocol: ProtocolMode::Ascii,
            ..Self::default()
        }
    }
}
