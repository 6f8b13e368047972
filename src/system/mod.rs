//! Board services the control loop depends on.
//!
//! These are the only places the node waits, looks at the clock, resets
//! itself or shows something to a human:
//!
//! - [`Delay`]: blocking waits (WiFi polling, back-off, the cycle sleep)
//! - [`Platform`]: monotonic uptime, wall-clock sync and the hard reset
//! - [`Signal`]: LED blink patterns for diagnosing a node without a display
//!
//! ```rust,no_run
//! use sensornode::system::{BlinkPattern, Signal};
//!
//! struct Led;
//! impl Signal for Led {
//!     fn blink(&mut self, pattern: BlinkPattern) {
//!         for _ in 0..pattern.count {
//!             // toggle the pin, wait pattern.interval_ms twice
//!         }
//!     }
//! }
//! ```

use crate::network::error::TransportError;

/// Blocking millisecond delay.
pub trait Delay {
    /// Wait `ms` milliseconds.
    fn delay_ms(&mut self, ms: u32);
}

/// Board-level services of the orchestrator.
pub trait Platform: Delay {
    /// Seconds since boot, monotonic.
    fn uptime_secs(&self) -> u64;

    /// Set the wall clock from the network (NTP). Best effort.
    fn sync_time(&mut self) -> Result<(), TransportError>;

    /// Hard-reset the device.
    ///
    /// On hardware this does not return; test doubles record the call and
    /// return so the orchestrator can stop its loop.
    fn reset(&mut self);
}

/// A blink sequence: `count` flashes, each `interval_ms` on and off.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlinkPattern {
    /// Number of flashes.
    pub count: u8,
    /// On time and off time of one flash.
    pub interval_ms: u16,
}

impl BlinkPattern {
    /// No network could be joined at startup; a reset follows.
    pub const LINK_EXHAUSTED: Self = Self::new(10, 100);
    /// The link dropped and could not be restored this cycle.
    pub const LINK_DOWN: Self = Self::new(5, 100);
    /// The broker is unreachable or a publish failed.
    pub const BROKER: Self = Self::new(3, 400);
    /// A sensor failed to deliver.
    pub const SENSOR: Self = Self::new(2, 150);

    /// A custom pattern.
    pub const fn new(count: u8, interval_ms: u16) -> Self {
        Self { count, interval_ms }
    }
}

/// Fire-and-forget visual indication.
pub trait Signal {
    /// Show `pattern`. Never affects control flow.
    fn blink(&mut self, pattern: BlinkPattern);
}
