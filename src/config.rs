//! The knobs the core itself consumes.
//!
//! CLI/config-file parsing lives in an external collaborator (see
//! spec.md §1); this is just the subset of settings the transaction
//! engine and input pipeline need to run standalone in tests.

use std::time::Duration;

use smithay::input::keyboard::XkbConfig;

/// Recommended transaction deadline from spec.md §4.3.
pub const DEFAULT_TRANSACTION_TIMEOUT: Duration = Duration::from_millis(200);

#[derive(Debug, Clone)]
pub struct Config {
    /// Bounded wait before a transaction force-commits.
    pub transaction_timeout: Duration,
    /// Keyboard repeat rate/delay, forwarded to `Seat::add_keyboard`.
    pub repeat_rate: i32,
    pub repeat_delay: i32,
}

impl Default for Config {
    fn default() -> Self {
        Self { transaction_timeout: DEFAULT_TRANSACTION_TIMEOUT, repeat_rate: 25, repeat_delay: 200 }
    }
}

impl Config {
    pub fn xkb_config(&self) -> XkbConfig<'_> {
        XkbConfig::default()
    }
}
