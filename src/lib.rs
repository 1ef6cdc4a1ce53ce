//! # rover-drive
//!
//! A portable, no_std motion-control core for differential-drive rovers.
//!
//! The crate takes two-wheel speed commands from a host computer over a serial
//! link, drives two H-bridge channels with ramped PWM, and reports status back
//! at 20 Hz. It brings the motors to rest and latches a fault on its own when
//! the host goes quiet, asks for an emergency stop, or the battery leaves its
//! voltage window.
//!
//! Built from:
//! - `embedded-hal` 1.0 traits for PWM, direction pins and delays
//! - `embedded-hal-nb` serial traits for the host link
//! - interrupt-safe globals with `critical-section`
//! - optional tick sources using either a timer interrupt or a blocking delay
//!
//! ## Crate features
//! | Feature               | Description |
//! |-----------------------|-------------|
//! | `std`                 | Disables `#![no_std]`, for host tests and tooling |
//! | `delay-loop`          | Polled control loop over `embedded_hal::delay::DelayNs` |
//! | `timer-isr` (default) | `critical_section` globals, command mailbox and ISR macros |
//! | `defmt-0-3`           | Uses `defmt` logging |
//! | `log`                 | Uses `log` logging |
//!
//! ## Layout
//!
//! - [`protocol`]: framed binary protocol with CRC-16/CCITT-FALSE, plus an ASCII fallback
//! - [`link`]: turns received bytes into [`Command`](protocol::Command)s
//! - [`watchdog`]: host command staleness detector
//! - [`motor`]: duty ramps and the BOOT / ENABLED / FAULTED state machine
//! - [`telemetry`]: 20 Hz status frames
//! - [`controller`]: the 1 kHz tick tying it all together
//! - [`hal`]: the hardware seams and their `embedded-hal` implementations
//! - [`leds`]: status and fault indicators
//! - [`timer`]: ISR glue, polled loop, timer and UART divisor math
//!
//! ## Usage
//!
//! ```rust,ignore
//! use rover_drive::config::Config;
//! use rover_drive::hal::{DualHBridge, HBridge, NominalPower, SerialSink};
//!
//! rover_drive::init_rover_controller!(Bridges, NominalPower, SerialSink<UartTx>);
//!
//! fn main() -> ! {
//!     let bridges = DualHBridge::new(
//!         HBridge::new(pwm_left, left_in1, left_in2),
//!         HBridge::new(pwm_right, right_in1, right_in2),
//!     );
//!     rover_drive::setup_rover_controller!(Config::default(), bridges, NominalPower, SerialSink::new(tx));
//!     // start the 1 kHz timer, unmask UART RX
//!     loop {}
//! }
//!
//! #[interrupt]
//! fn TIM2() {
//!     rover_drive::tick_rover_controller!();
//! }
//!
//! #[interrupt]
//! fn USART1() {
//!     if let Ok(byte) = rx.read() {
//!         let _ = rover_drive::rx_rover_byte!(byte);
//!     }
//! }
//! ```
//!
//! ## Integration Notes
//!
//! - The tick must run at 1 kHz; ramp rates, the watchdog and the telemetry
//!   period are all counted in ticks.
//! - A command received between two ticks is applied at the start of the next
//!   one. Only one command is buffered; a pending stop is never replaced.
//! - Only one controller instance should be active at a time in interrupt-driven mode.

#![deny(
    bad_style,
    dead_code,
    improper_ctypes,
    non_shorthand_field_patterns,
    no_mangle_generic_items,
    overflowing_literals,
    path_statements,
    patterns_in_fns_without_body,
    unconditional_recursion,
    unused,
    while_true,
    missing_debug_implementations,
    missing_docs,
    trivial_casts,
    trivial_numeric_casts,
    unused_extern_crates,
    unused_import_braces,
    unused_qualifications,
    unused_results
)]
#![cfg_attr(not(feature = "std"), no_std)]

pub mod error;

#[macro_use]
mod fmt;

#[cfg(feature = "timer-isr")]
pub use critical_section;

pub use heapless;

pub mod config;
pub mod consts;
pub mod controller;
pub mod crc;
pub mod flags;
pub mod hal;
pub mod leds;
pub mod link;
pub mod motor;
pub mod protocol;
pub mod telemetry;
pub mod timer;
pub mod watchdog;

pub use config::{Config, ProtocolMode};
pub use controller::Controller;
pub use error::{AsciiError, DecodeError, Error};
