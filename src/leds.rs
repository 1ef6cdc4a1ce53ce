//! Status and fault indicator LEDs.
//!
//! Meant for the foreground loop, which samples [`Controller::status`] and hands
//! the snapshot to [`StatusLeds::update`].
//!
//! | state     | status LED           | fault LED |
//! |-----------|----------------------|-----------|
//! | `Boot`    | blinks at 1 Hz       | off unless a blocking fault is set |
//! | `Enabled` | on                   | off unless a blocking fault is set |
//! | `Faulted` | off                  | on        |
//!
//! [`Controller::status`]: crate::controller::Controller::status

use embedded_hal::digital::{OutputPin, PinState};

use crate::controller::Status;
use crate::motor::SystemState;

/// Half period of the boot blink in ms.
pub const BOOT_BLINK_HALF_PERIOD_MS: u32 = 500;

/// Drives a status LED and a fault LED from controller snapshots.
#[derive(Debug)]
pub struct StatusLeds<STATUS, FAULT> {
    status: STATUS,
    fault: FAULT,
}

impl<STATUS: OutputPin, FAULT: OutputPin> StatusLeds<STATUS, FAULT> {
    /// Wraps the two LED pins. Both are active high.
    pub fn new(status: STATUS, fault: FAULT) -> Self {
        Self { status, fault }
    }

    /// Writes both LEDs for `status`.
    pub fn update(&mut self, status: &Status) {
        let (status_on, fault_on) = led_levels(status);
        if self.status.set_state(PinState::from(status_on)).is_err() {
            error!("status led write failed");
        }
        if self.fault.set_state(PinState::from(fault_on)).is_err() {
            error!("fault led write failed");
        }
    }

    /// Returns the pins.
    pub fn release(self) -> (STATUS, FAULT) {
        (self.status, self.fault)
    }
}

/// `(status, fault)` LED levels for a snapshot.
pub fn led_levels(status: &Status) -> (bool, bool) {
    let fault_on = status.state == SystemState::Faulted || status.faults.blocks_enable();
    let status_on = match status.state {
        SystemState::Boot => (status.now_ms / BOOT_BLINK_HALF_PERIOD_MS) % 2 == 0,
        SystemState::Enabled => true,
        SystemState::Faulted => false,
    };
    (status_on, fault_on)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flags::FaultFlags;
    use embedded_hal_mock::eh1::digital::{
        Mock as PinMock, State as PinState, Transaction as PinTransaction,
    };

    fn status(state: SystemState, faults: FaultFlags, now_ms: u32) -> Status {
        Status {
            state,
            faults,
            now_ms,
            command_age_ms: 0,
        }
    }

    #[test]
    fn test_levels() {
        let none = FaultFlags::empty();
        assert_eq!(led_levels(&status(SystemState::Boot, none, 0)), (true, false));
        assert_eq!(led_levels(&status(SystemState::Boot, none, 500)), (false, false));
        assert_eq!(led_levels(&status(SystemState::Boot, none, 1000)), (true, false));
        assert_eq!(
            led_levels(&status(SystemState::Boot, FaultFlags::OVERVOLTAGE, 0)),
            (true, true)
        );
        assert_eq!(led_levels(&status(SystemState::Enabled, none, 7)), (true, false));
        assert_eq!(
            led_levels(&status(SystemState::Enabled, FaultFlags::THERMAL_WARNING, 7)),
            (true, false)
        );
        assert_eq!(led_levels(&status(SystemState::Faulted, none, 7)), (false, true));
    }

    #[test]
    fn test_update_writes_pins() {
        let status_pin = PinMock::new(&[
            PinTransaction::set(PinState::High),
            PinTransaction::set(PinState::Low),
        ]);
        let fault_pin = PinMock::new(&[
            PinTransaction::set(PinState::Low),
            PinTransaction::set(PinState::High),
        ]);
        let mut leds = StatusLeds::new(status_pin, fault_pin);
        leds.update(&status(SystemState::Enabled, FaultFlags::empty(), 10));
        leds.update(&status(
            SystemState::Faulted,
            FaultFlags::ESTOP_ACTIVE,
            20,
        ));

        let (mut status_pin, mut fault_pin) = leds.release();
        status_pin.done();
        fault_pin.done();
    }
}
