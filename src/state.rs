//! Breaker lifecycle states and the outcome tallies that drive them.

use std::fmt;
use std::str::FromStr;

/// State of a circuit breaker
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum State {
    /// Normal operation, every call is admitted
    #[default]
    Closed,
    /// Probing recovery, a limited number of calls is admitted
    HalfOpen,
    /// Every call is rejected until the open timeout elapses
    Open,
}

impl State {
    /// Name used in logs and observability output
    pub fn as_str(&self) -> &'static str {
        match self {
            State::Closed => "closed",
            State::HalfOpen => "half-open",
            State::Open => "open",
        }
    }
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when parsing an unrecognised state name
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown circuit breaker state: {0:?}")]
pub struct UnknownState(pub String);

impl FromStr for State {
    type Err = UnknownState;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "closed" => Ok(State::Closed),
            "half-open" => Ok(State::HalfOpen),
            "open" => Ok(State::Open),
            other => Err(UnknownState(other.to_string())),
        }
    }
}

/// Outcome tallies since the last reset.
///
/// Handed to [`Settings::ready_to_trip`](crate::Settings::ready_to_trip) as a copy,
/// so a predicate can never mutate the breaker's own counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Counts {
    /// Calls admitted since the last reset
    pub requests: u32,
    /// Successful outcomes since the last reset
    pub total_successes: u32,
    /// Failed outcomes since the last reset
    pub total_failures: u32,
    /// Length of the current run of successes
    pub consecutive_successes: u32,
    /// Length of the current run of failures
    pub consecutive_failures: u32,
}

impl Counts {
    pub(crate) fn on_request(&mut self) {
        self.requests = self.requests.saturating_add(1);
    }

    pub(crate) fn on_success(&mut self) {
        self.total_successes = self.total_successes.saturating_add(1);
        self.consecutive_successes = self.consecutive_successes.saturating_add(1);
        self.consecutive_failures = 0;
    }

    pub(crate) fn on_failure(&mut self) {
        self.total_failures = self.total_failures.saturating_add(1);
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);
        self.consecutive_successes = 0;
    }

    pub(crate) fn reset(&mut self) {
        *self = Counts::default();
    }

    /// True when nothing has been counted since the last reset
    pub fn is_zero(&self) -> bool {
        *self == Counts::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_names() {
        assert_eq!(State::Closed.to_string(), "closed");
        assert_eq!(State::HalfOpen.to_string(), "half-open");
        assert_eq!(State::Open.to_string(), "open");
        assert_eq!(State::default(), State::Closed);
    }

    #[test]
    fn test_state_parse() {
        for state in [State::Closed, State::HalfOpen, State::Open] {
            assert_eq!(state.as_str().parse::<State>(), Ok(state));
        }
        assert_eq!(
            "halfopen".parse::<State>(),
            Err(UnknownState("halfopen".to_string()))
        );
    }

    #[test]
    fn test_streaks_reset_each_other() {
        let mut counts = Counts::default();
        counts.on_request();
        counts.on_failure();
        counts.on_request();
        counts.on_failure();
        assert_eq!(counts.consecutive_failures, 2);
        assert_eq!(counts.consecutive_successes, 0);

        counts.on_request();
        counts.on_success();
        assert_eq!(counts.consecutive_failures, 0);
        assert_eq!(counts.consecutive_successes, 1);
        assert_eq!(counts.total_failures, 2);
        assert_eq!(counts.total_successes, 1);
        assert_eq!(
            counts.total_successes + counts.total_failures,
            counts.requests
        );
    }

    #[test]
    fn test_reset() {
        let mut counts = Counts::default();
        counts.on_request();
        counts.on_success();
        assert!(!counts.is_zero());

        counts.reset();
        assert!(counts.is_zero());
    }
}
