//! Tick scheduling and peripheral timing helpers.
//!
//! The control tick can be driven in two ways: from a 1 kHz timer interrupt using
//! the `critical_section` globals in this module (`timer-isr` feature), or from a
//! blocking foreground loop built on `embedded_hal::delay::DelayNs`
//! (`delay-loop` feature).
//!
//! The module also holds the divisor math needed to bring up the peripherals the
//! core depends on:
//! - `compute_timer_period` / `const_timer_period`: timer reload for the tick
//! - `compute_uart_divisor` / `const_uart_divisor`: UART baud rate generator
//! - `const_pwm_period`: PWM carrier period in timer counts
//!
//! Common period register values for a 100 MHz timer clock at 1 kHz:
//!
//! | PRESCALER | PERIOD |
//! |-----------|--------|
//! |         1 | 99 999 |
//! |         8 | 12 499 |
//! |        64 |  1 562 |
//! |       256 |    390 |

use libm::round;

#[cfg(feature = "delay-loop")]
mod delay;
#[cfg_attr(feature = "delay-loop", allow(unused_imports))]
#[cfg(feature = "delay-loop")]
pub use delay::*;

#[cfg(feature = "timer-isr")]
mod isr;
#[cfg_attr(feature = "timer-isr", allow(unused_imports))]
#[cfg(feature = "timer-isr")]
pub use isr::*;

#[cfg(feature = "timer-isr")]
mod macros;
#[cfg_attr(feature = "timer-isr", allow(unused_imports))]
#[cfg(feature = "timer-isr")]
pub use macros::*;

/// UART oversampling in standard-speed mode.
pub const UART_OVERSAMPLING_16X: u32 = 16;
/// UART oversampling in high-speed mode.
pub const UART_OVERSAMPLING_4X: u32 = 4;

/// Computes the timer period register value for a periodic interrupt
/// (`PR = f_clk / (prescaler * tick_hz) - 1`).
///
/// # Arguments
/// - `f_clk`: timer input clock in Hz
/// - `prescaler`: timer prescaler (e.g. 1, 8, 64, 256)
/// - `tick_hz`: desired interrupt rate (e.g. [`TICK_HZ`](crate::consts::TICK_HZ))
///
/// # Returns
/// - Counts per tick rounded to the nearest integer, minus one, saturated at zero
pub fn compute_timer_period(f_clk: u32, prescaler: u32, tick_hz: u32) -> u32 {
    let counts = f64::from(f_clk) / f64::from(prescaler) / f64::from(tick_hz);
    (round(counts) as u32).saturating_sub(1)
}

/// Compile-time timer period calculator, rounding to nearest.
///
/// Same arguments as [`compute_timer_period`].
pub const fn const_timer_period(f_clk: u32, prescaler: u32, tick_hz: u32) -> u32 {
    let divisor = prescaler as u64 * tick_hz as u64;
    (((f_clk as u64 + divisor / 2) / divisor) as u32).saturating_sub(1)
}

/// Computes the UART baud rate generator value (`BRG = f_clk / (k * baud) - 1`).
///
/// # Arguments
/// - `f_clk`: UART input clock in Hz
/// - `baud`: desired baud rate (e.g. [`UART_BAUDRATE`](crate::consts::UART_BAUDRATE))
/// - `oversampling`: [`UART_OVERSAMPLING_16X`] or [`UART_OVERSAMPLING_4X`]
///
/// # Returns
/// - The divisor, rounded to the nearest integer and saturated to `u16`
pub fn compute_uart_divisor(f_clk: u32, baud: u32, oversampling: u32) -> u16 {
    let divisor = round(f64::from(f_clk) / (f64::from(oversampling) * f64::from(baud))) - 1.0;
    divisor.clamp(0.0, f64::from(u16::MAX)) as u16
}

/// Compile-time baud rate generator calculator.
///
/// Same arguments as [`compute_uart_divisor`].
pub const fn const_uart_divisor(f_clk: u32, baud: u32, oversampling: u32) -> u16 {
    let k = oversampling as u64 * baud as u64;
    let counts = (f_clk as u64 + k / 2) / k;
    if counts == 0 {
        0
    } else if counts - 1 > u16::MAX as u64 {
        u16::MAX
    } else {
        (counts - 1) as u16
    }
}

/// Baud rate a given divisor actually produces.
pub fn actual_baud(f_clk: u32, oversampling: u32, divisor: u16) -> u32 {
    f_clk / (oversampling * (u32::from(divisor) + 1))
}

/// PWM carrier period in timer counts for an edge-aligned generator.
pub const fn const_pwm_period(f_clk: u32, pwm_hz: u32) -> u32 {
    f_clk / pwm_hz
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consts::{PWM_FREQUENCY_HZ, TICK_HZ, UART_BAUDRATE};

    const FCY: u32 = 100_000_000;

    #[test]
    fn test_timer_period() {
        assert_eq!(compute_timer_period(FCY, 1, TICK_HZ), 99_999);
        assert_eq!(compute_timer_period(FCY, 8, TICK_HZ), 12_499);
        assert_eq!(compute_timer_period(FCY, 64, TICK_HZ), 1_562);
        assert_eq!(const_timer_period(FCY, 8, TICK_HZ), 12_499);
        assert_eq!(const_timer_period(FCY, 64, TICK_HZ), 1_562);
        assert_eq!(const_timer_period(FCY, 256, TICK_HZ), 390);
        assert_eq!(compute_timer_period(1_000, 1, TICK_HZ), 0);
        assert_eq!(const_timer_period(400, 1, TICK_HZ), 0);
    }

    #[test]
    fn test_uart_divisor() {
        assert_eq!(compute_uart_divisor(FCY, UART_BAUDRATE, UART_OVERSAMPLING_16X), 53);
        assert_eq!(compute_uart_divisor(FCY, UART_BAUDRATE, UART_OVERSAMPLING_4X), 216);
        assert_eq!(const_uart_divisor(FCY, UART_BAUDRATE, UART_OVERSAMPLING_16X), 53);
        assert_eq!(const_uart_divisor(FCY, UART_BAUDRATE, UART_OVERSAMPLING_4X), 216);

        let baud = actual_baud(FCY, UART_OVERSAMPLING_4X, 216);
        assert!(baud.abs_diff(UART_BAUDRATE) * 100 < UART_BAUDRATE);
    }

    #[test]
    fn test_pwm_period() {
        assert_eq!(const_pwm_period(FCY, PWM_FREQUENCY_HZ), 5_000);
    }
}
