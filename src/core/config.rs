//! # Global runtime configuration.
//!
//! Provides [`Config`], the process-wide settings for the patching runtime.
//! It is validated once by [`PatcherBuilder::build`](crate::PatcherBuilder::build)
//! and is read-only afterwards.
//!
//! ## Sentinel values
//! - `max_threads = 0` → unlimited registry
//! - `trigger_sleep = 0s` → clamped to 1ms (the coordinator never spins)

use std::time::Duration;

use crate::error::RuntimeError;

/// Global configuration for the patching runtime.
///
/// ## Field semantics
/// - `amount_priorities`: number of priority levels (`1..=255`)
/// - `trigger_sleep`: delay between quiescence scans
/// - `max_threads`: registry capacity (`0` = unlimited)
/// - `bus_capacity`: event bus ring buffer size (min 1; clamped by Bus)
/// - `patch_signal`: raw unix signal number that acts as `signal_patching`
#[derive(Clone, Debug)]
pub struct Config {
    /// Number of priority levels. Levels are `0..amount_priorities`,
    /// higher values are scanned first.
    pub amount_priorities: u8,

    /// Sleep between two scans while waiting for quiescence or migration.
    pub trigger_sleep: Duration,

    /// Maximum number of registered threads.
    ///
    /// - `0` = unlimited
    /// - `n > 0` = `thread_birth` fails with `CapacityExceeded` beyond `n`
    pub max_threads: usize,

    /// Capacity of the event bus broadcast channel ring buffer.
    pub bus_capacity: usize,

    /// Optional OS signal (unix only) that wakes the coordinator like
    /// [`Patcher::signal_patching`](crate::Patcher::signal_patching).
    pub patch_signal: Option<i32>,
}

impl Config {
    /// Returns the registry capacity as an `Option` (`None` = unlimited).
    #[inline]
    pub fn thread_limit(&self) -> Option<usize> {
        if self.max_threads == 0 {
            None
        } else {
            Some(self.max_threads)
        }
    }

    /// Returns the poll interval clamped to a minimum of 1ms.
    #[inline]
    pub fn trigger_sleep_clamped(&self) -> Duration {
        self.trigger_sleep.max(Duration::from_millis(1))
    }

    /// Returns a bus capacity clamped to a minimum of 1.
    #[inline]
    pub fn bus_capacity_clamped(&self) -> usize {
        self.bus_capacity.max(1)
    }

    /// Checks the configuration once before the runtime starts.
    pub fn validate(&self) -> Result<(), RuntimeError> {
        if self.amount_priorities == 0 {
            return Err(RuntimeError::InvalidConfig {
                reason: "amount_priorities must be at least 1",
            });
        }
        Ok(())
    }
}

impl Default for Config {
    /// Default configuration:
    ///
    /// - `amount_priorities = 4` (LOW, MEDIUM, HIGH, CRITICAL)
    /// - `trigger_sleep = 10ms`
    /// - `max_threads = 0` (unlimited)
    /// - `bus_capacity = 1024`
    /// - `patch_signal = None`
    fn default() -> Self {
        Self {
            amount_priorities: 4,
            trigger_sleep: Duration::from_millis(10),
            max_threads: 0,
            bus_capacity: 1024,
            patch_signal: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        let cfg = Config::default();
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.thread_limit(), None);
        assert_eq!(cfg.trigger_sleep_clamped(), Duration::from_millis(10));
    }

    #[test]
    fn zero_priorities_rejected() {
        let cfg = Config {
            amount_priorities: 0,
            ..Config::default()
        };
        assert!(matches!(
            cfg.validate(),
            Err(RuntimeError::InvalidConfig { .. })
        ));
    }

    #[test]
    fn sentinels_are_clamped() {
        let cfg = Config {
            trigger_sleep: Duration::ZERO,
            bus_capacity: 0,
            max_threads: 8,
            ..Config::default()
        };
        assert_eq!(cfg.trigger_sleep_clamped(), Duration::from_millis(1));
        assert_eq!(cfg.bus_capacity_clamped(), 1);
        assert_eq!(cfg.thread_limit(), Some(8));
    }
}
