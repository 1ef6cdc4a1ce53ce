//! Hardware seams.
//!
//! The control core never touches peripherals directly. It drives the motors
//! through [`MotorOutputs`], samples the supply through [`PowerMonitor`] and sends
//! telemetry through [`FrameSink`]. This module also provides `embedded-hal`
//! backed implementations of the first and last of these:
//!
//! - [`HBridge`] / [`DualHBridge`]: one PWM channel plus two direction inputs per
//!   motor (IN1/IN2 style drivers such as the DRV8871 or L298).
//! - [`SerialSink`]: any `embedded_hal_nb::serial::Write<u8>` UART.
//!
//! Write errors from the underlying HAL are logged and otherwise ignored; the
//! control tick cannot fail.

use embedded_hal::digital::OutputPin;
use embedded_hal::pwm::SetDutyCycle;
use embedded_hal_nb::serial::Write;

use crate::consts::{PWM_FULL_SCALE, VOLTAGE_NOMINAL_MV};
use crate::motor::{Channel, Direction};

/// PWM and direction outputs for both motor channels.
pub trait MotorOutputs {
    /// Sets a channel's duty magnitude, `0..=10000`.
    fn set_pwm(&mut self, channel: Channel, duty: u16);
    /// Sets a channel's bridge direction.
    fn set_direction(&mut self, channel: Channel, direction: Direction);
}

/// Supply and driver health inputs, sampled once per tick.
pub trait PowerMonitor {
    /// Bus voltage in millivolts.
    fn bus_mv(&mut self) -> u16;

    /// Whether the H-bridge fault line is asserted.
    fn driver_fault_asserted(&mut self) -> bool {
        false
    }

    /// Whether the current sense has tripped.
    fn overcurrent_asserted(&mut self) -> bool {
        false
    }

    /// Whether the driver reports a thermal warning.
    fn thermal_warning_asserted(&mut self) -> bool {
        false
    }
}

/// Destination for encoded telemetry.
pub trait FrameSink {
    /// Sends `frame` in order. May block until the bytes are queued.
    fn write_frame(&mut self, frame: &[u8]);
}

impl<T: MotorOutputs + ?Sized> MotorOutputs for &mut T {
    fn set_pwm(&mut self, channel: Channel, duty: u16) {
        T::set_pwm(self, channel, duty);
    }

    fn set_direction(&mut self, channel: Channel, direction: Direction) {
        T::set_direction(self, channel, direction);
    }
}

impl<T: FrameSink + ?Sized> FrameSink for &mut T {
    fn write_frame(&mut self, frame: &[u8]) {
        T::write_frame(self, frame);
    }
}

/// A [`PowerMonitor`] for boards without voltage sensing. Always reports the
/// nominal bus voltage and no driver faults.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct NominalPower;

impl PowerMonitor for NominalPower {
    fn bus_mv(&mut self) -> u16 {
        VOLTAGE_NOMINAL_MV
    }
}

/// One motor on an IN1/IN2 H-bridge.
///
/// | direction | IN1 | IN2 |
/// |-----------|-----|-----|
/// | forward   | H   | L   |
/// | reverse   | L   | H   |
/// | coast     | L   | L   |
#[derive(Debug)]
pub struct HBridge<PWM, IN1, IN2> {
    pwm: PWM,
    in1: IN1,
    in2: IN2,
}

impl<PWM, IN1, IN2> HBridge<PWM, IN1, IN2>
where
    PWM: SetDutyCycle,
    IN1: OutputPin,
    IN2: OutputPin,
{
    /// Wraps a PWM channel and the two bridge inputs. The pins are not touched.
    pub fn new(pwm: PWM, in1: IN1, in2: IN2) -> Self {
        Self { pwm, in1, in2 }
    }

    /// Sets the duty as a fraction of [`PWM_FULL_SCALE`]. Larger values saturate.
    pub fn set_duty(&mut self, duty: u16) -> Result<(), PWM::Error> {
        let full_scale = PWM_FULL_SCALE.unsigned_abs();
        self.pwm
            .set_duty_cycle_fraction(duty.min(full_scale), full_scale)
    }

    /// Drives the bridge inputs. The input going low is always written first.
    pub fn set_direction(&mut self, direction: Direction) -> Result<(), BridgeError<IN1, IN2>> {
        match direction {
            Direction::Forward => {
                self.in2.set_low().map_err(BridgeError::In2)?;
                self.in1.set_high().map_err(BridgeError::In1)
            }
            Direction::Reverse => {
                self.in1.set_low().map_err(BridgeError::In1)?;
                self.in2.set_high().map_err(BridgeError::In2)
            }
            Direction::Coast => {
                self.in1.set_low().map_err(BridgeError::In1)?;
                self.in2.set_low().map_err(BridgeError::In2)
            }
        }
    }

    /// Returns the PWM channel and pins.
    pub fn release(self) -> (PWM, IN1, IN2) {
        (self.pwm, self.in1, self.in2)
    }
}

/// A failed write to one of the bridge inputs.
#[derive(Debug)]
pub enum BridgeError<IN1: OutputPin, IN2: OutputPin> {
    /// IN1 rejected the write.
    In1(IN1::Error),
    /// IN2 rejected the write.
    In2(IN2::Error),
}

/// Left and right [`HBridge`]s.
#[derive(Debug)]
pub struct DualHBridge<LP, LA, LB, RP, RA, RB> {
    /// Left channel.
    pub left: HBridge<LP, LA, LB>,
    /// Right channel.
    pub right: HBridge<RP, RA, RB>,
}

impl<LP, LA, LB, RP, RA, RB> DualHBridge<LP, LA, LB, RP, RA, RB>
where
    LP: SetDutyCycle,
    LA: OutputPin,
    LB: OutputPin,
    RP: SetDutyCycle,
    RA: OutputPin,
    RB: OutputPin,
{
    /// Pairs two bridges.
    pub fn new(left: HBridge<LP, LA, LB>, right: HBridge<RP, RA, RB>) -> Self {
        Self { left, right }
    }
}

impl<LP, LA, LB, RP, RA, RB> MotorOutputs for DualHBridge<LP, LA, LB, RP, RA, RB>
where
    LP: SetDutyCycle,
    LA: OutputPin,
    LB: OutputPin,
    RP: SetDutyCycle,
    RA: OutputPin,
    RB: OutputPin,
{
    fn set_pwm(&mut self, channel: Channel, duty: u16) {
        let result = match channel {
            Channel::Left => self.left.set_duty(duty).is_ok(),
            Channel::Right => self.right.set_duty(duty).is_ok(),
        };
        if !result {
            error!("pwm write failed on {:?}", channel);
        }
    }

    fn set_direction(&mut self, channel: Channel, direction: Direction) {
        let result = match channel {
            Channel::Left => self.left.set_direction(direction).is_ok(),
            Channel::Right => self.right.set_direction(direction).is_ok(),
        };
        if !result {
            error!("direction write failed on {:?}", channel);
        }
    }
}

/// Sends frames over a non-blocking serial writer, spinning on `WouldBlock`.
///
/// The sink does not flush: a frame is handed over once every byte is queued.
#[derive(Debug)]
pub struct SerialSink<W> {
    serial: W,
}

impl<W: Write<u8>> SerialSink<W> {
    /// Wraps a serial writer.
    pub fn new(serial: W) -> Self {
        Self { serial }
    }

    /// Returns the serial writer.
    pub fn release(self) -> W {
        self.serial
    }
}

impl<W: Write<u8>> FrameSink for SerialSink<W> {
    fn write_frame(&mut self, frame: &[u8]) {
        for &byte in frame {
            if nb::block!(self.serial.write(byte)).is_err() {
                error!("serial write failed, dropping {} byte frame", frame.len());
                return;
            }
        }
    }
}
