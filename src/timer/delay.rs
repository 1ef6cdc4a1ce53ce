use embedded_hal::delay::DelayNs;
use embedded_hal_nb::serial::Read;

use crate::consts::TICK_PERIOD_MS;
use crate::controller::Controller;
use crate::hal::{FrameSink, MotorOutputs, PowerMonitor};
use crate::link::CommandLink;

/// Runs one iteration of the polled control loop.
///
/// Drains every byte the serial port has ready into `link`, applies each
/// completed command, then ticks the controller once.
///
/// # Returns
/// - The number of commands applied
pub fn control_step<M, P, S, R>(
    controller: &mut Controller<M, P, S>,
    link: &mut CommandLink,
    serial: &mut R,
) -> usize
where
    M: MotorOutputs,
    P: PowerMonitor,
    S: FrameSink,
    R: Read<u8>,
{
    let mut applied = 0;
    loop {
        match serial.read() {
            Ok(byte) => {
                if let Some(command) = link.push_byte(byte) {
                    controller.handle_command(command);
                    applied += 1;
                }
            }
            Err(nb::Error::WouldBlock) => break,
            Err(nb::Error::Other(_)) => {
                warn!("serial read error, resetting link");
                link.reset();
                break;
            }
        }
    }
    controller.tick();
    applied
}

/// Runs a blocking loop that services the serial port and ticks the controller
/// once per millisecond.
///
/// This is a simple timing loop for environments where interrupts are
/// unavailable or undesired. The period is [`TICK_PERIOD_MS`] plus the time
/// the step itself takes, so the controller clock runs slightly slow.
///
/// # Arguments
/// - `controller`: the controller to drive
/// - `link`: the command link decoding the serial stream
/// - `serial`: a non-blocking serial reader
/// - `delay`: a delay provider implementing `DelayNs`, typically from the HAL
///
/// # Example
/// ```rust,ignore
/// use rover_drive::timer::run_control_loop;
/// let mut controller = Controller::new(config, bridges, adc, SerialSink::new(tx));
/// let mut link = CommandLink::new(&config);
/// run_control_loop(&mut controller, &mut link, &mut rx, &mut delay);
/// ```
///
/// # Notes
/// - This loop never returns.
pub fn run_control_loop<M, P, S, R, D>(
    controller: &mut Controller<M, P, S>,
    link: &mut CommandLink,
    serial: &mut R,
    delay: &mut D,
) -> !
where
    M: MotorOutputs,
    P: PowerMonitor,
    S: FrameSink,
    R: Read<u8>,
    D: DelayNs,
{
    loop {
        let _ = control_step(controller, link, serial);
        delay.delay_ms(TICK_PERIOD_MS);
    }
}
