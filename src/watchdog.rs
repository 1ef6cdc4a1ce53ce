//! Host command watchdog.
//!
//! Every accepted drive command feeds the watchdog. The control tick calls
//! [`Watchdog::update`] once per millisecond and reacts to the rising edge of the
//! timeout.

use crate::consts::WATCHDOG_TIMEOUT_MS;

/// Staleness detector for host commands.
///
/// A fresh watchdog has never been fed: it reports the maximum age and is
/// already timed out, so the outputs stay disabled until the host speaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt-0-3", derive(defmt::Format))]
pub struct Watchdog {
    timeout_ms: u16,
    last_feed_ms: Option<u32>,
    age_ms: u16,
    timeout_active: bool,
}

impl Default for Watchdog {
    fn default() -> Self {
        Self::new(WATCHDOG_TIMEOUT_MS)
    }
}

impl Watchdog {
    /// Creates a tripped, never-fed watchdog.
    pub const fn new(timeout_ms: u16) -> Self {
        Self {
            timeout_ms,
            last_feed_ms: None,
            age_ms: u16::MAX,
            timeout_active: true,
        }
    }

    /// Records a fresh command at `now_ms` and clears the timeout.
    pub fn feed(&mut self, now_ms: u32) {
        self.last_feed_ms = Some(now_ms);
        self.age_ms = 0;
        self.timeout_active = false;
    }

    /// Recomputes the command age.
    ///
    /// Returns `true` only on the tick the watchdog trips. Before the first feed
    /// it stays tripped and always returns `false`.
    pub fn update(&mut self, now_ms: u32) -> bool {
        let Some(last) = self.last_feed_ms else {
            return false;
        };
        let age = now_ms.wrapping_sub(last);
        self.age_ms = u16::try_from(age).unwrap_or(u16::MAX);

        let was_active = self.timeout_active;
        self.timeout_active = self.age_ms >= self.timeout_ms;
        self.timeout_active && !was_active
    }

    /// Milliseconds since the last feed, saturated at 65535.
    pub fn age(&self) -> u16 {
        self.age_ms
    }

    /// Whether the command stream is stale.
    pub fn is_timed_out(&self) -> bool {
        self.timeout_active
    }

    /// The configured timeout in ms.
    pub fn timeout(&self) -> u16 {
        self.timeout_ms
    }
}
