/*!
 * File-based configuration for circuit breakers
 *
 * Only the plain-data part of [`Settings`] can come from a file. Predicates and
 * observers are attached in code on top of the loaded settings.
 */

use crate::breaker::CircuitBreaker;
use crate::error::ConfigError;
use crate::settings::{
    consecutive_failures_above, Settings, DEFAULT_CLOSED_RESET_INTERVAL,
    DEFAULT_MAX_HALF_OPEN_REQUESTS, DEFAULT_OPEN_TIMEOUT, DEFAULT_TRIP_AFTER_CONSECUTIVE_FAILURES,
};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Breaker configuration as it appears in a TOML file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BreakerConfig {
    /// Name reported in logs and to the state change observer
    #[serde(default = "default_name")]
    pub name: String,

    /// Probe budget while half-open (0 = exactly one probe)
    #[serde(default = "default_max_half_open_requests")]
    pub max_half_open_requests: u32,

    /// Closed window length in milliseconds
    #[serde(default = "default_closed_reset_interval_ms")]
    pub closed_reset_interval_ms: u64,

    /// Open timeout in milliseconds
    #[serde(default = "default_open_timeout_ms")]
    pub open_timeout_ms: u64,

    /// Trip once the failure streak exceeds this many calls
    #[serde(default = "default_trip_after_consecutive_failures")]
    pub trip_after_consecutive_failures: u32,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            max_half_open_requests: default_max_half_open_requests(),
            closed_reset_interval_ms: default_closed_reset_interval_ms(),
            open_timeout_ms: default_open_timeout_ms(),
            trip_after_consecutive_failures: default_trip_after_consecutive_failures(),
        }
    }
}

impl BreakerConfig {
    /// Parse a configuration from TOML text
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(s)?)
    }

    /// Load a configuration from a TOML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    /// Settings described by this configuration, with default predicates
    pub fn settings(&self) -> Settings {
        Settings::default()
            .max_half_open_requests(self.max_half_open_requests)
            .closed_reset_interval(Duration::from_millis(self.closed_reset_interval_ms))
            .open_timeout(Duration::from_millis(self.open_timeout_ms))
            .ready_to_trip(consecutive_failures_above(
                self.trip_after_consecutive_failures,
            ))
    }

    /// Build a breaker from this configuration alone
    pub fn build(&self) -> Result<CircuitBreaker, ConfigError> {
        CircuitBreaker::new(self.name.clone(), self.settings())
    }
}

fn default_name() -> String {
    "default".to_string()
}

fn default_max_half_open_requests() -> u32 {
    DEFAULT_MAX_HALF_OPEN_REQUESTS
}

fn default_closed_reset_interval_ms() -> u64 {
    DEFAULT_CLOSED_RESET_INTERVAL.as_millis() as u64
}

fn default_open_timeout_ms() -> u64 {
    DEFAULT_OPEN_TIMEOUT.as_millis() as u64
}

fn default_trip_after_consecutive_failures() -> u32 {
    DEFAULT_TRIP_AFTER_CONSECUTIVE_FAILURES
}
