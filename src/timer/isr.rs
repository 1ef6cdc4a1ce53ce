use core::cell::{Cell, RefCell};
use core::fmt;

use critical_section::{CriticalSection, Mutex};

use crate::config::Config;
use crate::controller::{Controller, Status};
use crate::hal::{FrameSink, MotorOutputs, PowerMonitor};
use crate::link::CommandLink;
use crate::protocol::messages::Command;

/// A `critical_section` protected slot for the [`Controller`] owned by the tick ISR.
pub type GlobalController<M, P, S> = Mutex<RefCell<Option<Controller<M, P, S>>>>;

/// A `critical_section` protected slot for the [`CommandLink`] owned by the RX ISR.
pub type GlobalLink = Mutex<RefCell<Option<CommandLink>>>;

/// Single-slot hand-off of decoded commands from the RX ISR to the tick ISR.
///
/// A pending stop is never replaced by a later non-stop command, and a heartbeat
/// never replaces anything; otherwise the newest command wins. Every command
/// lost either way is counted.
pub struct Mailbox {
    slot: Mutex<Cell<Option<Command>>>,
    overwrites: Mutex<Cell<u32>>,
}

impl fmt::Debug for Mailbox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Mailbox").finish_non_exhaustive()
    }
}

impl Default for Mailbox {
    fn default() -> Self {
        Self::new()
    }
}

impl Mailbox {
    /// An empty mailbox, usable in a `static`.
    pub const fn new() -> Self {
        Self {
            slot: Mutex::new(Cell::new(None)),
            overwrites: Mutex::new(Cell::new(0)),
        }
    }

    /// Posts `command` inside an existing critical section.
    ///
    /// Returns `false` when the command was dropped in favour of the pending one.
    pub fn post_in(&self, cs: CriticalSection<'_>, command: Command) -> bool {
        let slot = self.slot.borrow(cs);
        let stored = match slot.get() {
            Some(pending) if pending.is_stop() && !command.is_stop() => false,
            Some(_) if command == Command::Heartbeat => false,
            Some(_) => {
                slot.set(Some(command));
                true
            }
            None => {
                slot.set(Some(command));
                return true;
            }
        };
        let overwrites = self.overwrites.borrow(cs);
        overwrites.set(overwrites.get().wrapping_add(1));
        debug!("mailbox overwrite, new command kept: {}", stored);
        stored
    }

    /// Posts `command`. See [`post_in`](Mailbox::post_in).
    pub fn post(&self, command: Command) -> bool {
        critical_section::with(|cs| self.post_in(cs, command))
    }

    /// Takes the pending command inside an existing critical section.
    pub fn take_in(&self, cs: CriticalSection<'_>) -> Option<Command> {
        self.slot.borrow(cs).take()
    }

    /// Takes the pending command.
    pub fn take(&self) -> Option<Command> {
        critical_section::with(|cs| self.take_in(cs))
    }

    /// Commands lost to a newer command or a pending stop, wrapping.
    pub fn overwrites(&self) -> u32 {
        critical_section::with(|cs| self.overwrites.borrow(cs).get())
    }
}

/// Used to initialize the global static [`Controller`] for use with `critical_section`.
///
/// # Example
/// ```rust,ignore
/// static CONTROLLER: GlobalController<Motors, Adc, Uart> = global_controller_init();
/// ```
pub const fn global_controller_init<M, P, S>() -> GlobalController<M, P, S>
where
    M: MotorOutputs,
    P: PowerMonitor,
    S: FrameSink,
{
    Mutex::new(RefCell::new(None))
}

/// Used to initialize the global static [`CommandLink`] for use with `critical_section`.
pub const fn global_link_init() -> GlobalLink {
    Mutex::new(RefCell::new(None))
}

/// Stores a fresh [`Controller`] in the global slot, replacing any previous one.
///
/// # Example
/// ```rust,ignore
/// fn main() -> ! {
///     global_controller_setup(&CONTROLLER, Config::default(), motors, adc, uart_tx);
///     // start the 1 kHz timer
/// }
/// ```
pub fn global_controller_setup<M, P, S>(
    global_controller: &'static GlobalController<M, P, S>,
    config: Config,
    outputs: M,
    power: P,
    sink: S,
) where
    M: MotorOutputs,
    P: PowerMonitor,
    S: FrameSink,
{
    critical_section::with(|cs| {
        let _ = global_controller
            .borrow(cs)
            .replace(Some(Controller::new(config, outputs, power, sink)));
    });
}

/// Stores a fresh [`CommandLink`] in the global slot, replacing any previous one.
pub fn global_link_setup(global_link: &'static GlobalLink, config: &Config) {
    critical_section::with(|cs| {
        let _ = global_link.borrow(cs).replace(Some(CommandLink::new(config)));
    });
}

/// Runs one control tick: applies the pending command, if any, then ticks.
///
/// Does nothing until the controller has been set up; a pending command then
/// stays in the mailbox.
///
/// # Example
/// ```rust,ignore
/// #[interrupt]
/// fn TIM2() {
///     global_rover_tick(&CONTROLLER, &MAILBOX);
/// }
/// ```
pub fn global_rover_tick<M, P, S>(
    global_controller: &'static GlobalController<M, P, S>,
    mailbox: &'static Mailbox,
) where
    M: MotorOutputs,
    P: PowerMonitor,
    S: FrameSink,
{
    critical_section::with(|cs| {
        if let Some(controller) = global_controller.borrow(cs).borrow_mut().as_mut() {
            if let Some(command) = mailbox.take_in(cs) {
                controller.handle_command(command);
            }
            controller.tick();
        }
    });
}

/// Feeds one received byte to the link and posts any completed command.
///
/// Returns the command, if the byte completed one. Bytes arriving before the
/// link is set up are dropped.
///
/// # Example
/// ```rust,ignore
/// #[interrupt]
/// fn USART1() {
///     if let Ok(byte) = rx.read() {
///         let _ = global_rx_byte(&LINK, &MAILBOX, byte);
///     }
/// }
/// ```
pub fn global_rx_byte(
    global_link: &'static GlobalLink,
    mailbox: &'static Mailbox,
    byte: u8,
) -> Option<Command> {
    critical_section::with(|cs| {
        let command = global_link.borrow(cs).borrow_mut().as_mut()?.push_byte(byte)?;
        let _ = mailbox.post_in(cs, command);
        Some(command)
    })
}

/// A [`Status`] snapshot of the global controller, if it has been set up.
pub fn global_rover_status<M, P, S>(
    global_controller: &'static GlobalController<M, P, S>,
) -> Option<Status>
where
    M: MotorOutputs,
    P: PowerMonitor,
    S: FrameSink,
{
    critical_section::with(|cs| {
        global_controller
            .borrow(cs)
            .borrow()
            .as_ref()
            .map(Controller::status)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flags::DriveFlags;
    use crate::protocol::messages::DriveCommand;

    const FORWARD: Command = Command::Drive(DriveCommand::new(
        1000,
        1000,
        DriveFlags::ENABLE_REQUEST,
    ));
    const BACKWARD: Command = Command::Drive(DriveCommand::new(
        -1000,
        -1000,
        DriveFlags::ENABLE_REQUEST,
    ));

    #[test]
    fn test_newest_command_wins() {
        let mailbox = Mailbox::new();
        assert!(mailbox.post(FORWARD));
        assert!(mailbox.post(BACKWARD));
        assert_eq!(mailbox.overwrites(), 1);
        assert_eq!(mailbox.take(), Some(BACKWARD));
        assert_eq!(mailbox.take(), None);
    }

    #[test]
    fn test_pending_stop_survives() {
        let mailbox = Mailbox::new();
        assert!(mailbox.post(Command::Stop));
        assert!(!mailbox.post(FORWARD));
        assert!(!mailbox.post(Command::Heartbeat));
        assert_eq!(mailbox.overwrites(), 2);
        assert_eq!(mailbox.take(), Some(Command::Stop));
    }

    #[test]
    fn test_heartbeat_keeps_pending_drive() {
        let mailbox = Mailbox::new();
        assert!(mailbox.post(FORWARD));
        assert!(!mailbox.post(Command::Heartbeat));
        assert_eq!(mailbox.overwrites(), 1);
        assert_eq!(mailbox.take(), Some(FORWARD));

        assert!(mailbox.post(Command::Heartbeat));
        assert!(mailbox.post(BACKWARD));
        assert_eq!(mailbox.take(), Some(BACKWARD));
    }

    #[test]
    fn test_stop_replaces_pending_drive() {
        let mailbox = Mailbox::new();
        assert!(mailbox.post(FORWARD));
        let estop = Command::Drive(DriveCommand::estop());
        assert!(mailbox.post(estop));
        assert!(mailbox.post(Command::Stop));
        assert_eq!(mailbox.take(), Some(Command::Stop));
    }
}
