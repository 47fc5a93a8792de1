//! Breaker policy: probe budget, timing windows, and the pluggable predicates
//!
//! Every builder method sets exactly one field and may be called any number
//! of times; the last call wins. Unset fields keep their defaults:
//!
//! | field                    | default                          |
//! |--------------------------|----------------------------------|
//! | `max_half_open_requests` | 10                               |
//! | `closed_reset_interval`  | 5s                               |
//! | `open_timeout`           | 10s                              |
//! | `ready_to_trip`          | more than 5 consecutive failures |
//! | `is_successful`          | every error is a failure         |
//! | `on_state_change`        | none                             |
//!
//! # Example
//!
//! ```
//! use tripwire::{CircuitBreaker, Settings};
//! use std::time::Duration;
//!
//! let settings = Settings::default()
//!     .max_half_open_requests(3)
//!     .open_timeout(Duration::from_secs(30))
//!     .ready_to_trip(|counts| counts.total_failures >= 10)
//!     .on_state_change(|name, from, to| println!("{name}: {from} -> {to}"));
//!
//! let breaker = CircuitBreaker::new("inventory", settings).unwrap();
//! assert_eq!(breaker.name(), "inventory");
//! ```

use crate::error::ConfigError;
use crate::state::{Counts, State};
use std::error::Error as StdError;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

pub const DEFAULT_MAX_HALF_OPEN_REQUESTS: u32 = 10;
pub const DEFAULT_CLOSED_RESET_INTERVAL: Duration = Duration::from_secs(5);
pub const DEFAULT_OPEN_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_TRIP_AFTER_CONSECUTIVE_FAILURES: u32 = 5;

pub(crate) type ReadyToTripFn = Arc<dyn Fn(Counts) -> bool + Send + Sync>;
pub(crate) type IsSuccessfulFn = Arc<dyn Fn(&(dyn StdError + 'static)) -> bool + Send + Sync>;
pub(crate) type OnStateChangeFn = Arc<dyn Fn(&str, State, State) + Send + Sync>;

/// Immutable policy for a [`CircuitBreaker`](crate::CircuitBreaker)
#[derive(Clone)]
pub struct Settings {
    pub(crate) max_half_open_requests: u32,
    pub(crate) closed_reset_interval: Duration,
    pub(crate) open_timeout: Duration,
    pub(crate) ready_to_trip: ReadyToTripFn,
    pub(crate) is_successful: IsSuccessfulFn,
    pub(crate) on_state_change: Option<OnStateChangeFn>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            max_half_open_requests: DEFAULT_MAX_HALF_OPEN_REQUESTS,
            closed_reset_interval: DEFAULT_CLOSED_RESET_INTERVAL,
            open_timeout: DEFAULT_OPEN_TIMEOUT,
            ready_to_trip: Arc::new(default_ready_to_trip),
            is_successful: Arc::new(default_is_successful),
            on_state_change: None,
        }
    }
}

impl fmt::Debug for Settings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Settings")
            .field("max_half_open_requests", &self.max_half_open_requests)
            .field("closed_reset_interval", &self.closed_reset_interval)
            .field("open_timeout", &self.open_timeout)
            .field("on_state_change", &self.on_state_change.is_some())
            .finish_non_exhaustive()
    }
}

impl Settings {
    /// Maximum number of probes admitted while half-open. `0` admits exactly one.
    pub fn max_half_open_requests(mut self, max: u32) -> Self {
        self.max_half_open_requests = max;
        self
    }

    /// How long counts accumulate while closed before they are zeroed
    pub fn closed_reset_interval(mut self, interval: Duration) -> Self {
        self.closed_reset_interval = interval;
        self
    }

    /// How long the breaker stays open before probing recovery
    pub fn open_timeout(mut self, timeout: Duration) -> Self {
        self.open_timeout = timeout;
        self
    }

    /// Decides, after each failure while closed, whether to open
    pub fn ready_to_trip<F>(mut self, f: F) -> Self
    where
        F: Fn(Counts) -> bool + Send + Sync + 'static,
    {
        self.ready_to_trip = Arc::new(f);
        self
    }

    /// Classifies an operation error. Returning `true` counts the call as a success.
    ///
    /// Useful for errors that say nothing about the health of the remote side,
    /// such as a "not found" answer from an otherwise healthy service.
    pub fn is_successful<F>(mut self, f: F) -> Self
    where
        F: Fn(&(dyn StdError + 'static)) -> bool + Send + Sync + 'static,
    {
        self.is_successful = Arc::new(f);
        self
    }

    /// Observer called with `(name, from, to)` after every transition
    pub fn on_state_change<F>(mut self, f: F) -> Self
    where
        F: Fn(&str, State, State) + Send + Sync + 'static,
    {
        self.on_state_change = Some(Arc::new(f));
        self
    }

    /// Effective probe budget (`0` is treated as one)
    pub(crate) fn half_open_budget(&self) -> u32 {
        self.max_half_open_requests.max(1)
    }

    pub(crate) fn validate(&self) -> Result<(), ConfigError> {
        if self.closed_reset_interval.is_zero() {
            return Err(ConfigError::InvalidDuration {
                field: "closed_reset_interval",
            });
        }
        if self.open_timeout.is_zero() {
            return Err(ConfigError::InvalidDuration {
                field: "open_timeout",
            });
        }
        Ok(())
    }
}

/// Trip predicate that opens once the failure streak exceeds `threshold`
pub fn consecutive_failures_above(threshold: u32) -> impl Fn(Counts) -> bool + Send + Sync + Clone {
    move |counts: Counts| counts.consecutive_failures > threshold
}

fn default_ready_to_trip(counts: Counts) -> bool {
    counts.consecutive_failures > DEFAULT_TRIP_AFTER_CONSECUTIVE_FAILURES
}

fn default_is_successful(_err: &(dyn StdError + 'static)) -> bool {
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = Settings::default();
        assert_eq!(settings.max_half_open_requests, 10);
        assert_eq!(settings.closed_reset_interval, Duration::from_secs(5));
        assert_eq!(settings.open_timeout, Duration::from_secs(10));
        assert!(settings.on_state_change.is_none());
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_default_ready_to_trip() {
        let settings = Settings::default();
        let mut counts = Counts {
            consecutive_failures: 5,
            ..Default::default()
        };
        assert!(!(settings.ready_to_trip)(counts));
        counts.consecutive_failures = 6;
        assert!((settings.ready_to_trip)(counts));
    }

    #[test]
    fn test_default_is_successful() {
        let settings = Settings::default();
        let err = std::io::Error::other("boom");
        assert!(!(settings.is_successful)(&err));
    }

    #[test]
    fn test_zero_budget_means_one() {
        let settings = Settings::default().max_half_open_requests(0);
        assert_eq!(settings.half_open_budget(), 1);
        let settings = settings.max_half_open_requests(4);
        assert_eq!(settings.half_open_budget(), 4);
    }

    #[test]
    fn test_builder_last_call_wins() {
        let settings = Settings::default()
            .open_timeout(Duration::from_secs(1))
            .open_timeout(Duration::from_secs(2));
        assert_eq!(settings.open_timeout, Duration::from_secs(2));
    }

    #[test]
    fn test_validate_rejects_zero_durations() {
        let err = Settings::default()
            .closed_reset_interval(Duration::ZERO)
            .validate()
            .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidDuration {
                field: "closed_reset_interval"
            }
        ));

        let err = Settings::default()
            .open_timeout(Duration::ZERO)
            .validate()
            .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidDuration {
                field: "open_timeout"
            }
        ));
    }

    #[test]
    fn test_consecutive_failures_above() {
        let trip = consecutive_failures_above(2);
        let counts = Counts {
            consecutive_failures: 3,
            ..Default::default()
        };
        assert!(trip(counts));
        assert!(!trip(Counts::default()));
    }
}
