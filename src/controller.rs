//! The 1 kHz control tick.
//!
//! [`Controller`] owns every piece of control state (motor ramps, system state,
//! faults, watchdog, telemetry pacing) together with the hardware handles it
//! drives. It is meant to live inside the timer interrupt: the receive path
//! hands it commands through [`handle_command`](Controller::handle_command) and
//! the timer calls [`tick`](Controller::tick) once per millisecond.
//!
//! ## Tick order
//!
//! 1. advance the millisecond counter
//! 2. scan faults (bus voltage, watchdog, driver inputs)
//! 3. ramp both channels, fast while the e-stop is active
//! 4. write duty and direction
//! 5. emit telemetry if a period has elapsed
//!
//! ## Example
//!
//! ```rust
//! use rover_drive::config::Config;
//! use rover_drive::controller::Controller;
//! use rover_drive::flags::DriveFlags;
//! use rover_drive::hal::{FrameSink, MotorOutputs, NominalPower};
//! use rover_drive::motor::{Channel, Direction, SystemState};
//! use rover_drive::protocol::{Command, DriveCommand};
//!
//! struct Bench;
//! impl MotorOutputs for Bench {
//!     fn set_pwm(&mut self, _: Channel, _: u16) {}
//!     fn set_direction(&mut self, _: Channel, _: Direction) {}
//! }
//! impl FrameSink for Bench {
//!     fn write_frame(&mut self, _: &[u8]) {}
//! }
//!
//! let mut ctrl = Controller::new(Config::default(), Bench, NominalPower, Bench);
//! ctrl.handle_command(Command::Drive(DriveCommand::new(
//!     16384,
//!     16384,
//!     DriveFlags::ENABLE_REQUEST,
//! )));
//! ctrl.tick();
//! assert_eq!(ctrl.state(), SystemState::Enabled);
//! assert_eq!(ctrl.motors().current_duty(Channel::Left), 5);
//! ```

use crate::config::{Config, ProtocolMode};
use crate::consts::{FW_VERSION_MAJOR, FW_VERSION_MINOR, FW_VERSION_PATCH};
use crate::flags::FaultFlags;
use crate::hal::{FrameSink, MotorOutputs, PowerMonitor};
use crate::motor::{Channel, MotorController, SystemState, q15_to_duty};
use crate::protocol::messages::{Command, DriveCommand, TelemetryPayload};
use crate::telemetry::TelemetryPacer;
use crate::watchdog::Watchdog;

/// A snapshot of the controller, for indicators and diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt-0-3", derive(defmt::Format))]
pub struct Status {
    /// System state.
    pub state: SystemState,
    /// Active faults.
    pub faults: FaultFlags,
    /// Controller time in ms.
    pub now_ms: u32,
    /// Age of the last drive command in ms.
    pub command_age_ms: u16,
}

/// Motion-control core over a set of hardware handles.
#[derive(Debug)]
pub struct Controller<M, P, S> {
    config: Config,
    motors: MotorController,
    watchdog: Watchdog,
    telemetry: TelemetryPacer,
    outputs: M,
    power: P,
    sink: S,
    now_ms: u32,
    bus_mv: u16,
    driver_fault_input: bool,
    overcurrent_input: bool,
    heartbeats: u32,
}

impl<M, P, S> Controller<M, P, S>
where
    M: MotorOutputs,
    P: PowerMonitor,
    S: FrameSink,
{
    /// Creates a controller in [`SystemState::Boot`] at time zero.
    ///
    /// Nothing is written to the hardware until the first tick.
    pub fn new(config: Config, outputs: M, power: P, sink: S) -> Self {
        info!(
            "rover-drive firmware {}.{}.{}, protocol {:?}",
            FW_VERSION_MAJOR,
            FW_VERSION_MINOR,
            FW_VERSION_PATCH,
            config.protocol
        );
        Self {
            motors: MotorController::new(&config),
            watchdog: Watchdog::new(config.watchdog_timeout_ms),
            telemetry: TelemetryPacer::new(config.telemetry_period_ms),
            config,
            outputs,
            power,
            sink,
            now_ms: 0,
            bus_mv: 0,
            driver_fault_input: false,
            overcurrent_input: false,
            heartbeats: 0,
        }
    }

    /// Applies a host command at the current controller time.
    pub fn handle_command(&mut self, command: Command) {
        match command.drive() {
            Some(drive) => self.handle_drive(drive),
            None => {
                self.heartbeats = self.heartbeats.wrapping_add(1);
                trace!("heartbeat at {}", self.now_ms);
            }
        }
    }

    fn handle_drive(&mut self, cmd: DriveCommand) {
        self.watchdog.feed(self.now_ms);
        self.motors.faults_mut().remove(FaultFlags::WATCHDOG_TIMEOUT);

        if cmd.is_estop() {
            if !self.motors.faults().contains(FaultFlags::ESTOP_ACTIVE) {
                warn!("e-stop requested at {}", self.now_ms);
            }
            self.motors.faults_mut().insert(FaultFlags::ESTOP_ACTIVE);
            self.motors.set_targets(0, 0);
            self.motors.disable_all();
            return;
        }

        self.motors.faults_mut().remove(FaultFlags::ESTOP_ACTIVE);
        if cmd.requests_enable() && self.motors.state() != SystemState::Enabled {
            self.clear_resolved_latches();
            let _ = self.motors.enable();
        }

        if self.motors.state() == SystemState::Enabled {
            self.motors
                .set_targets(q15_to_duty(cmd.left_q15), q15_to_duty(cmd.right_q15));
        }
    }

    /// Clears latched driver faults whose input was clear at the last scan.
    fn clear_resolved_latches(&mut self) {
        let mut resolved = FaultFlags::empty();
        resolved.set(FaultFlags::DRIVER_FAULT, !self.driver_fault_input);
        resolved.set(FaultFlags::OVERCURRENT, !self.overcurrent_input);
        let cleared = self.motors.faults() & FaultFlags::LATCHED & resolved;
        if !cleared.is_empty() {
            info!("clearing latched faults {}", cleared.bits());
            self.motors.faults_mut().remove(cleared);
        }
    }

    /// Runs one control period.
    pub fn tick(&mut self) {
        self.now_ms = self.now_ms.wrapping_add(1);
        self.check_faults();

        let is_estop = self.motors.faults().contains(FaultFlags::ESTOP_ACTIVE);
        self.motors.update_ramps(is_estop);
        self.motors.apply_outputs(&mut self.outputs);

        if self.telemetry.should_send(self.now_ms) {
            let payload = self.telemetry_payload();
            match self.config.protocol {
                ProtocolMode::Binary => self.telemetry.send(&payload, self.now_ms, &mut self.sink),
                ProtocolMode::Ascii => {
                    self.telemetry
                        .send_line(&payload, self.now_ms, &mut self.sink)
                }
            }
        }
    }

    /// Samples the supply, the watchdog and the driver inputs and updates the
    /// fault bitmap. Disables the motors on a watchdog trip or while any
    /// enable-blocking fault is set.
    pub fn check_faults(&mut self) {
        let before = self.motors.faults();
        self.bus_mv = self.power.bus_mv();
        self.driver_fault_input = self.power.driver_fault_asserted();
        self.overcurrent_input = self.power.overcurrent_asserted();
        let thermal = self.power.thermal_warning_asserted();

        let bus_mv = self.bus_mv;
        let under = bus_mv < self.config.voltage_min_mv;
        let over = bus_mv > self.config.voltage_max_mv;
        let tripped = self.watchdog.update(self.now_ms);
        let timed_out = self.watchdog.is_timed_out();

        let faults = self.motors.faults_mut();
        faults.set(FaultFlags::UNDERVOLTAGE, under);
        faults.set(FaultFlags::OVERVOLTAGE, over);
        faults.set(FaultFlags::WATCHDOG_TIMEOUT, timed_out);
        if self.driver_fault_input {
            faults.insert(FaultFlags::DRIVER_FAULT);
        }
        if self.overcurrent_input {
            faults.insert(FaultFlags::OVERCURRENT);
        }
        faults.set(FaultFlags::THERMAL_WARNING, thermal);
        let after = *faults;

        if tripped {
            warn!("watchdog timeout at {}", self.now_ms);
            self.motors.set_targets(0, 0);
            self.motors.disable_all();
        }
        if after.blocks_enable() {
            self.motors.disable_all();
        }

        if after != before {
            debug!(
                "faults {} -> {} at {} (bus {} mV)",
                before.bits(),
                after.bits(),
                self.now_ms,
                bus_mv
            );
        }
    }

    /// The record the next telemetry emission would carry.
    pub fn telemetry_payload(&self) -> TelemetryPayload {
        TelemetryPayload {
            left_duty: self.motors.current_duty(Channel::Left),
            right_duty: self.motors.current_duty(Channel::Right),
            bus_mv: self.bus_mv,
            faults: self.motors.faults(),
            age_ms: self.watchdog.age(),
        }
    }

    /// State, faults and timing at a glance.
    pub fn status(&self) -> Status {
        Status {
            state: self.motors.state(),
            faults: self.motors.faults(),
            now_ms: self.now_ms,
            command_age_ms: self.watchdog.age(),
        }
    }

    /// Controller time in ms, advanced by every tick. Wraps.
    pub fn now_ms(&self) -> u32 {
        self.now_ms
    }

    /// System state.
    pub fn state(&self) -> SystemState {
        self.motors.state()
    }

    /// Active faults.
    pub fn faults(&self) -> FaultFlags {
        self.motors.faults()
    }

    /// The ramper and state machine.
    pub fn motors(&self) -> &MotorController {
        &self.motors
    }

    /// The command watchdog.
    pub fn watchdog(&self) -> &Watchdog {
        &self.watchdog
    }

    /// The telemetry pacer.
    pub fn telemetry(&self) -> &TelemetryPacer {
        &self.telemetry
    }

    /// Bus voltage from the last fault scan.
    pub fn bus_mv(&self) -> u16 {
        self.bus_mv
    }

    /// Heartbeats received, wrapping.
    pub fn heartbeats(&self) -> u32 {
        self.heartbeats
    }

    /// The configuration in use.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// The motor outputs.
    pub fn outputs(&self) -> &M {
        &self.outputs
    }

    /// The power monitor, mutably.
    pub fn power_mut(&mut self) -> &mut P {
        &mut self.power
    }

    /// The telemetry sink.
    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// The telemetry sink, mutably.
    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }

    /// Returns the hardware handles.
    pub fn release(self) -> (M, P, S) {
        (self.outputs, self.power, self.sink)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flags::DriveFlags;
    use crate::motor::Direction;

    #[derive(Debug, Default)]
    struct Outputs {
        pwm: [u16; 2],
        dir: [Direction; 2],
    }

    impl MotorOutputs for Outputs {
        fn set_pwm(&mut self, channel: Channel, duty: u16) {
            self.pwm[channel as usize] = duty;
        }

        fn set_direction(&mut self, channel: Channel, direction: Direction) {
            self.dir[channel as usize] = direction;
        }
    }

    #[derive(Debug)]
    struct Power {
        bus_mv: u16,
        driver_fault: bool,
        overcurrent: bool,
        thermal: bool,
    }

    impl Default for Power {
        fn default() -> Self {
            Self {
                bus_mv: 11_100,
                driver_fault: false,
                overcurrent: false,
                thermal: false,
            }
        }
    }

    impl PowerMonitor for Power {
        fn bus_mv(&mut self) -> u16 {
            self.bus_mv
        }

        fn driver_fault_asserted(&mut self) -> bool {
            self.driver_fault
        }

        fn overcurrent_asserted(&mut self) -> bool {
            self.overcurrent
        }

        fn thermal_warning_asserted(&mut self) -> bool {
            self.thermal
        }
    }

    #[derive(Debug, Default)]
    struct Sink {
        frames: usize,
        bytes: Vec<u8>,
    }

    impl FrameSink for Sink {
        fn write_frame(&mut self, frame: &[u8]) {
            self.frames += 1;
            self.bytes.extend_from_slice(frame);
        }
    }

    type TestController = Controller<Outputs, Power, Sink>;

    fn controller() -> TestController {
        Controller::new(
            Config::default(),
            Outputs::default(),
            Power::default(),
            Sink::default(),
        )
    }

    fn drive(left: i16, right: i16) -> Command {
        Command::Drive(DriveCommand::new(left, right, DriveFlags::ENABLE_REQUEST))
    }

    #[test]
    fn test_boot_state() {
        let mut ctrl = controller();
        assert_eq!(ctrl.state(), SystemState::Boot);
        ctrl.tick();
        assert_eq!(ctrl.state(), SystemState::Boot);
        assert!(ctrl.faults().contains(FaultFlags::WATCHDOG_TIMEOUT));
        assert_eq!(ctrl.outputs().pwm, [0, 0]);
        assert_eq!(ctrl.outputs().dir, [Direction::Coast; 2]);
        assert_eq!(ctrl.bus_mv(), 11_100);
    }

    #[test]
    fn test_drive_without_enable_request_keeps_boot() {
        let mut ctrl = controller();
        ctrl.handle_command(Command::Drive(DriveCommand::new(
            1000,
            1000,
            DriveFlags::empty(),
        )));
        ctrl.tick();
        assert_eq!(ctrl.state(), SystemState::Boot);
        assert_eq!(ctrl.motors().target_duty(Channel::Left), 0);
        assert!(!ctrl.faults().contains(FaultFlags::WATCHDOG_TIMEOUT));
    }

    #[test]
    fn test_enable_and_ramp() {
        let mut ctrl = controller();
        ctrl.handle_command(drive(16384, -16384));
        assert_eq!(ctrl.state(), SystemState::Enabled);
        ctrl.tick();
        assert_eq!(ctrl.motors().target_duty(Channel::Left), 5000);
        assert_eq!(ctrl.motors().target_duty(Channel::Right), -5000);
        assert_eq!(ctrl.outputs().pwm, [5, 5]);
        assert_eq!(ctrl.outputs().dir, [Direction::Forward, Direction::Reverse]);
    }

    #[test]
    fn test_heartbeat_does_not_feed_watchdog() {
        let mut ctrl = controller();
        ctrl.handle_command(drive(0, 0));
        for _ in 0..150 {
            ctrl.tick();
        }
        ctrl.handle_command(Command::Heartbeat);
        for _ in 0..50 {
            ctrl.tick();
        }
        assert_eq!(ctrl.heartbeats(), 1);
        assert!(ctrl.watchdog().is_timed_out());
        assert_eq!(ctrl.state(), SystemState::Faulted);
    }

    #[test]
    fn test_stop_then_reenable() {
        let mut ctrl = controller();
        ctrl.handle_command(drive(32767, 32767));
        ctrl.tick();
        ctrl.handle_command(Command::Stop);
        assert_eq!(ctrl.state(), SystemState::Faulted);
        assert!(ctrl.faults().contains(FaultFlags::ESTOP_ACTIVE));
        ctrl.tick();
        assert_eq!(ctrl.outputs().pwm, [0, 0]);

        ctrl.handle_command(drive(100, 100));
        assert_eq!(ctrl.state(), SystemState::Enabled);
        assert!(!ctrl.faults().contains(FaultFlags::ESTOP_ACTIVE));
        assert_eq!(ctrl.motors().target_duty(Channel::Right), 30);
    }

    #[test]
    fn test_undervoltage_disables_and_blocks_enable() {
        let mut ctrl = controller();
        ctrl.handle_command(drive(16384, 16384));
        ctrl.tick();
        ctrl.power_mut().bus_mv = 8_999;
        ctrl.tick();
        assert!(ctrl.faults().contains(FaultFlags::UNDERVOLTAGE));
        assert_eq!(ctrl.state(), SystemState::Faulted);

        ctrl.handle_command(drive(16384, 16384));
        assert_eq!(ctrl.state(), SystemState::Faulted);

        ctrl.power_mut().bus_mv = 9_000;
        ctrl.tick();
        assert!(!ctrl.faults().contains(FaultFlags::UNDERVOLTAGE));
        ctrl.handle_command(drive(16384, 16384));
        assert_eq!(ctrl.state(), SystemState::Enabled);
    }

    #[test]
    fn test_overvoltage() {
        let mut ctrl = controller();
        ctrl.power_mut().bus_mv = 13_001;
        ctrl.tick();
        assert!(ctrl.faults().contains(FaultFlags::OVERVOLTAGE));
        ctrl.handle_command(drive(100, 100));
        assert_ne!(ctrl.state(), SystemState::Enabled);
    }

    #[test]
    fn test_voltage_window_edges_are_in_band() {
        let mut ctrl = controller();
        for mv in [9_000, 13_000] {
            ctrl.power_mut().bus_mv = mv;
            ctrl.tick();
            assert!(!ctrl.faults().intersects(FaultFlags::UNDERVOLTAGE | FaultFlags::OVERVOLTAGE));
        }
        ctrl.power_mut().bus_mv = 8_999;
        ctrl.tick();
        assert!(ctrl.faults().contains(FaultFlags::UNDERVOLTAGE));
    }

    #[test]
    fn test_driver_fault_latches_until_enable_with_input_clear() {
        let mut ctrl = controller();
        ctrl.handle_command(drive(16384, 16384));
        ctrl.power_mut().driver_fault = true;
        ctrl.tick();
        assert_eq!(ctrl.state(), SystemState::Faulted);
        assert!(ctrl.faults().contains(FaultFlags::DRIVER_FAULT));

        ctrl.power_mut().driver_fault = false;
        ctrl.tick();
        assert!(ctrl.faults().contains(FaultFlags::DRIVER_FAULT));

        ctrl.handle_command(Command::Drive(DriveCommand::new(
            0,
            0,
            DriveFlags::empty(),
        )));
        assert!(ctrl.faults().contains(FaultFlags::DRIVER_FAULT));

        ctrl.handle_command(drive(16384, 16384));
        assert!(!ctrl.faults().contains(FaultFlags::DRIVER_FAULT));
        assert_eq!(ctrl.state(), SystemState::Enabled);
    }

    #[test]
    fn test_overcurrent_refuses_enable_while_asserted() {
        let mut ctrl = controller();
        ctrl.power_mut().overcurrent = true;
        ctrl.tick();
        ctrl.handle_command(drive(16384, 16384));
        assert!(ctrl.faults().contains(FaultFlags::OVERCURRENT));
        assert_eq!(ctrl.state(), SystemState::Faulted);
    }

    #[test]
    fn test_thermal_warning_is_informational() {
        let mut ctrl = controller();
        ctrl.power_mut().thermal = true;
        ctrl.handle_command(drive(16384, 16384));
        ctrl.tick();
        assert!(ctrl.faults().contains(FaultFlags::THERMAL_WARNING));
        assert_eq!(ctrl.state(), SystemState::Enabled);
        ctrl.power_mut().thermal = false;
        ctrl.tick();
        assert!(!ctrl.faults().contains(FaultFlags::THERMAL_WARNING));
    }

    #[test]
    fn test_telemetry_payload_and_cadence() {
        let mut ctrl = controller();
        ctrl.handle_command(drive(32767, 0));
        for _ in 0..50 {
            ctrl.tick();
        }
        assert_eq!(ctrl.sink().frames, 1);
        assert_eq!(ctrl.sink().bytes.len(), 18);
        let payload = ctrl.telemetry_payload();
        assert_eq!(payload.left_duty, 250);
        assert_eq!(payload.right_duty, 0);
        assert_eq!(payload.bus_mv, 11_100);
        assert_eq!(payload.age_ms, 50);
        assert_eq!(
            TelemetryPayload::from_bytes(&ctrl.sink().bytes[6..16]),
            Ok(payload)
        );
    }

    #[test]
    fn test_ascii_mode_telemetry() {
        let mut ctrl = Controller::new(
            Config::ascii(),
            Outputs::default(),
            Power::default(),
            Sink::default(),
        );
        for _ in 0..50 {
            ctrl.tick();
        }
        assert_eq!(ctrl.sink().bytes, b"T 0 0 11100 1 65535\n");
    }

    #[test]
    fn test_status_snapshot() {
        let mut ctrl = controller();
        ctrl.handle_command(drive(0, 0));
        ctrl.tick();
        ctrl.tick();
        let status = ctrl.status();
        assert_eq!(status.state, SystemState::Enabled);
        assert_eq!(status.now_ms, 2);
        assert_eq!(status.command_age_ms, 2);
        assert!(status.faults.is_empty());
    }
}
