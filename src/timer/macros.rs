/// Declares the static globals shared by the tick and RX interrupts.
///
/// This macro creates three `static` singletons suitable for interrupt-driven
/// firmware, all protected by `critical_section`:
/// - `ROVER_CONTROLLER`: the [`Controller`](crate::controller::Controller), owned by the tick ISR
/// - `ROVER_LINK`: the [`CommandLink`](crate::link::CommandLink), owned by the RX ISR
/// - `ROVER_MAILBOX`: the [`Mailbox`](crate::timer::Mailbox) between the two
///
/// # Arguments
/// - `$outputs`: the concrete [`MotorOutputs`](crate::hal::MotorOutputs) type
/// - `$power`: the concrete [`PowerMonitor`](crate::hal::PowerMonitor) type
/// - `$sink`: the concrete [`FrameSink`](crate::hal::FrameSink) type
///
/// # Example
/// ```rust,ignore
/// init_rover_controller!(MyBridges, MyAdc, SerialSink<MyUartTx>);
/// ```
#[macro_export]
macro_rules! init_rover_controller {
    ( $outputs:ty, $power:ty, $sink:ty ) => {
        pub static ROVER_CONTROLLER: $crate::critical_section::Mutex<
            core::cell::RefCell<Option<$crate::controller::Controller<$outputs, $power, $sink>>>,
        > = $crate::critical_section::Mutex::new(core::cell::RefCell::new(None));
        pub static ROVER_LINK: $crate::critical_section::Mutex<
            core::cell::RefCell<Option<$crate::link::CommandLink>>,
        > = $crate::critical_section::Mutex::new(core::cell::RefCell::new(None));
        pub static ROVER_MAILBOX: $crate::timer::Mailbox = $crate::timer::Mailbox::new();
    };
}

/// Builds the controller and the command link and stores them in the globals
/// declared by `init_rover_controller!`.
///
/// # Arguments
/// - `$config`: a [`Config`](crate::config::Config)
/// - `$outputs`, `$power`, `$sink`: the hardware handles
///
/// # Example
/// ```rust,ignore
/// fn main() -> ! {
///     setup_rover_controller!(Config::default(), bridges, adc, SerialSink::new(tx));
///     // start the 1 kHz timer and unmask the UART RX interrupt
/// }
/// ```
///
/// # Notes
/// - Requires `init_rover_controller!` to have been used earlier.
/// - Replaces any controller stored before, which restarts it in `Boot`.
#[macro_export]
macro_rules! setup_rover_controller {
    ( $config:expr, $outputs:expr, $power:expr, $sink:expr ) => {{
        let config: $crate::config::Config = $config;
        $crate::timer::global_link_setup(&ROVER_LINK, &config);
        $crate::timer::global_controller_setup(&ROVER_CONTROLLER, config, $outputs, $power, $sink);
    }};
}

/// Runs one control tick on the global controller, applying the pending
/// mailbox command first.
///
/// # Example
/// ```rust,ignore
/// #[interrupt]
/// fn TIM2() {
///     tick_rover_controller!();
/// }
/// ```
///
/// # Notes
/// - Safe to call before setup; it does nothing until the controller exists.
#[macro_export]
macro_rules! tick_rover_controller {
    () => {
        $crate::timer::global_rover_tick(&ROVER_CONTROLLER, &ROVER_MAILBOX)
    };
}

/// Feeds one received byte to the global command link, posting any completed
/// command to the mailbox. Evaluates to the `Option<Command>` completed.
///
/// # Example
/// ```rust,ignore
/// #[interrupt]
/// fn USART1() {
///     if let Ok(byte) = rx.read() {
///         let _ = rx_rover_byte!(byte);
///     }
/// }
/// ```
#[macro_export]
macro_rules! rx_rover_byte {
    ( $byte:expr ) => {
        $crate::timer::global_rx_byte(&ROVER_LINK, &ROVER_MAILBOX, $byte)
    };
}
