//! Typed bit sets for the drive command flags and the fault bitmap.
//!
//! Both travel on the wire as little-endian `u16`. Bit positions are fixed by the
//! protocol and must not be renumbered.

/// Control flags carried by a drive command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "defmt-0-3", derive(defmt::Format))]
pub struct DriveFlags(u16);

bitflags::bitflags! {
    impl DriveFlags: u16 {
        /// Emergency stop: fast ramp to zero, system goes faulted.
        const ESTOP = 0x0001;
        /// Ask the controller to (re-)enable its outputs.
        const ENABLE_REQUEST = 0x0002;
    }
}

/// Active fault bitmap, reported in every telemetry frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "defmt-0-3", derive(defmt::Format))]
pub struct FaultFlags(u16);

bitflags::bitflags! {
    impl FaultFlags: u16 {
        /// No drive command within the watchdog timeout.
        const WATCHDOG_TIMEOUT = 0x0001;
        /// The host requested an emergency stop.
        const ESTOP_ACTIVE = 0x0002;
        /// Bus voltage below the window.
        const UNDERVOLTAGE = 0x0004;
        /// Bus voltage above the window.
        const OVERVOLTAGE = 0x0008;
        /// The H-bridge reported a fault.
        const DRIVER_FAULT = 0x0010;
        /// Current sense tripped.
        const OVERCURRENT = 0x0020;
        /// Driver temperature warning, informational only.
        const THERMAL_WARNING = 0x0040;
    }
}

impl FaultFlags {
    /// Faults that refuse an enable request while set.
    ///
    /// Under- and overvoltage clear on their own once the bus is back in band,
    /// but they still block enable while present.
    pub const ENABLE_BLOCKING: Self = Self::DRIVER_FAULT
        .union(Self::OVERCURRENT)
        .union(Self::UNDERVOLTAGE)
        .union(Self::OVERVOLTAGE);

    /// Faults that stay set until a fresh enable request finds their input clear.
    pub const LATCHED: Self = Self::DRIVER_FAULT.union(Self::OVERCURRENT);

    /// Whether any enable-blocking fault is set.
    pub fn blocks_enable(&self) -> bool {
        self.intersects(Self::ENABLE_BLOCKING)
    }
}

impl From<FaultFlags> for u16 {
    fn from(flags: FaultFlags) -> u16 {
        flags.bits()
    }
}

impl From<DriveFlags> for u16 {
    fn from(flags: DriveFlags) -> u16 {
        flags.bits()
    }
}
