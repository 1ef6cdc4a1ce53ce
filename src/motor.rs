//! Motor ramper and system state machine.
//!
//! Each channel keeps a target and a current duty in `[-10000, 10000]`. Once per
//! tick [`MotorController::update_ramps`] moves the current duty towards the
//! target by at most the ramp rate, and [`MotorController::apply_outputs`] writes
//! it to the hardware. The outputs are muted (zero duty, coast) whenever the
//! system is not [`SystemState::Enabled`].

use core::num::NonZeroU16;

use crate::config::Config;
use crate::consts::{PWM_FULL_SCALE, Q15_FULL_SCALE};
use crate::flags::FaultFlags;
use crate::hal::MotorOutputs;

/// A motor channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt-0-3", derive(defmt::Format))]
pub enum Channel {
    /// Left wheel.
    Left,
    /// Right wheel.
    Right,
}

impl Channel {
    /// Both channels, left first.
    pub const ALL: [Channel; 2] = [Channel::Left, Channel::Right];

    fn index(self) -> usize {
        match self {
            Channel::Left => 0,
            Channel::Right => 1,
        }
    }
}

/// H-bridge drive direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt-0-3", derive(defmt::Format))]
pub enum Direction {
    /// Both bridge inputs low, motor freewheels.
    #[default]
    Coast,
    /// Positive duty.
    Forward,
    /// Negative duty.
    Reverse,
}

impl Direction {
    /// The direction a signed duty drives in. Zero coasts.
    pub fn of(duty: i16) -> Self {
        match duty {
            d if d > 0 => Direction::Forward,
            d if d < 0 => Direction::Reverse,
            _ => Direction::Coast,
        }
    }
}

/// System-level state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt-0-3", derive(defmt::Format))]
pub enum SystemState {
    /// Power-up, waiting for the first enable request.
    #[default]
    Boot,
    /// Outputs follow the ramped duty.
    Enabled,
    /// Outputs muted until a fresh enable request succeeds.
    Faulted,
}

/// Per-channel ramp state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt-0-3", derive(defmt::Format))]
pub struct MotorState {
    /// Duty the ramp is heading for.
    pub target_duty: i16,
    /// Duty applied on the last tick.
    pub current_duty: i16,
    /// Rate used by the last ramp step.
    pub ramp_rate: u16,
    /// Whether this channel may drive.
    pub enabled: bool,
}

/// Converts a Q15 speed to a duty, truncating towards zero.
pub fn q15_to_duty(q15: i16) -> i16 {
    let duty = i32::from(q15) * i32::from(PWM_FULL_SCALE) / i32::from(Q15_FULL_SCALE);
    clamp_duty(duty)
}

fn clamp_duty(duty: i32) -> i16 {
    let limit = i32::from(PWM_FULL_SCALE);
    // In range after the clamp.
    duty.clamp(-limit, limit) as i16
}

/// Two-channel ramper plus the BOOT / ENABLED / FAULTED state machine.
#[derive(Debug, Clone)]
pub struct MotorController {
    motors: [MotorState; 2],
    state: SystemState,
    faults: FaultFlags,
    normal_ramp_rate: NonZeroU16,
    estop_ramp_rate: NonZeroU16,
}

impl Default for MotorController {
    fn default() -> Self {
        Self::new(&Config::default())
    }
}

impl MotorController {
    /// Creates a controller in [`SystemState::Boot`] with both channels at rest.
    pub fn new(config: &Config) -> Self {
        Self {
            motors: [MotorState::default(); 2],
            state: SystemState::Boot,
            faults: FaultFlags::empty(),
            normal_ramp_rate: config.normal_ramp_rate,
            estop_ramp_rate: config.estop_ramp_rate,
        }
    }

    /// Sets a channel's target duty, clamped to `±10000`.
    pub fn set_target(&mut self, channel: Channel, duty: i16) {
        self.motors[channel.index()].target_duty = clamp_duty(i32::from(duty));
    }

    /// Sets both targets.
    pub fn set_targets(&mut self, left: i16, right: i16) {
        self.set_target(Channel::Left, left);
        self.set_target(Channel::Right, right);
    }

    /// Moves each current duty one step towards its target.
    ///
    /// The step is the e-stop rate while `is_estop`, the normal rate otherwise.
    /// A channel within one step of its target snaps onto it.
    pub fn update_ramps(&mut self, is_estop: bool) {
        let rate = if is_estop {
            self.estop_ramp_rate
        } else {
            self.normal_ramp_rate
        };
        let step = i32::from(rate.get());
        for motor in self.motors.iter_mut() {
            motor.ramp_rate = rate.get();
            let error = i32::from(motor.target_duty) - i32::from(motor.current_duty);
            let next = if error.abs() <= step {
                i32::from(motor.target_duty)
            } else {
                i32::from(motor.current_duty) + error.signum() * step
            };
            motor.current_duty = clamp_duty(next);
        }
    }

    /// Writes duty and direction for both channels.
    pub fn apply_outputs<M: MotorOutputs>(&self, outputs: &mut M) {
        for channel in Channel::ALL {
            let motor = &self.motors[channel.index()];
            if self.state == SystemState::Enabled && motor.enabled {
                outputs.set_pwm(channel, motor.current_duty.unsigned_abs());
                outputs.set_direction(channel, Direction::of(motor.current_duty));
            } else {
                outputs.set_pwm(channel, 0);
                outputs.set_direction(channel, Direction::Coast);
            }
        }
    }

    /// Zeroes both targets, disables both channels and enters [`SystemState::Faulted`].
    ///
    /// The current duty is left to ramp down.
    pub fn disable_all(&mut self) {
        for motor in self.motors.iter_mut() {
            motor.target_duty = 0;
            motor.enabled = false;
        }
        if self.state != SystemState::Faulted {
            info!("motors disabled, state {:?} -> Faulted", self.state);
        }
        self.state = SystemState::Faulted;
    }

    /// Enables both channels unless an enable-blocking fault is set.
    pub fn enable(&mut self) -> bool {
        if self.faults.blocks_enable() {
            warn!("enable refused, faults {}", self.faults.bits());
            return false;
        }
        for motor in self.motors.iter_mut() {
            motor.enabled = true;
        }
        if self.state != SystemState::Enabled {
            info!("motors enabled, state {:?} -> Enabled", self.state);
        }
        self.state = SystemState::Enabled;
        true
    }

    /// Current system state.
    pub fn state(&self) -> SystemState {
        self.state
    }

    /// Active faults.
    pub fn faults(&self) -> FaultFlags {
        self.faults
    }

    /// Mutable access to the fault bitmap for the fault scanner.
    pub fn faults_mut(&mut self) -> &mut FaultFlags {
        &mut self.faults
    }

    /// A channel's ramp state.
    pub fn motor(&self, channel: Channel) -> &MotorState {
        &self.motors[channel.index()]
    }

    /// A channel's current duty.
    pub fn current_duty(&self, channel: Channel) -> i16 {
        self.motor(channel).current_duty
    }

    /// A channel's target duty.
    pub fn target_duty(&self, channel: Channel) -> i16 {
        self.motor(channel).target_duty
    }
}
