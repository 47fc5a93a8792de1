//! Error types for circuit breaker operations

use crate::state::State;
use std::path::PathBuf;
use thiserror::Error;

/// A call was refused without invoking the protected operation.
///
/// Raised while the breaker is open, or while it is half-open and the probe
/// budget for the current window is spent.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("circuit breaker '{breaker}' rejected the call ({state})")]
pub struct Rejected {
    /// Name of the breaker that refused the call
    pub breaker: String,
    /// State the breaker was in when it refused
    pub state: State,
}

/// Result of running an operation through a breaker
#[derive(Debug, Error)]
pub enum CallError<E> {
    /// The breaker refused the call, the operation never ran
    #[error(transparent)]
    Rejected(#[from] Rejected),

    /// The operation ran and returned this error, passed through unchanged
    #[error("{0}")]
    Operation(E),
}

impl<E> CallError<E> {
    /// Whether the breaker refused the call
    pub fn is_rejected(&self) -> bool {
        matches!(self, CallError::Rejected(_))
    }

    /// The operation's own error, if the operation ran
    pub fn into_operation(self) -> Option<E> {
        match self {
            CallError::Operation(e) => Some(e),
            CallError::Rejected(_) => None,
        }
    }

    /// Borrow the operation's own error, if the operation ran
    pub fn operation(&self) -> Option<&E> {
        match self {
            CallError::Operation(e) => Some(e),
            CallError::Rejected(_) => None,
        }
    }
}

/// Invalid breaker configuration. Only raised while building a breaker.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A timing window was zero
    #[error("{field} must be greater than zero")]
    InvalidDuration { field: &'static str },

    /// The configuration file could not be parsed
    #[error("failed to parse breaker configuration: {0}")]
    Parse(#[from] toml::de::Error),

    /// The configuration file could not be read
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The log subscriber could not be installed
    #[error("failed to initialise logging: {0}")]
    Logging(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejected_message() {
        let err = Rejected {
            breaker: "payments".to_string(),
            state: State::Open,
        };
        assert_eq!(
            err.to_string(),
            "circuit breaker 'payments' rejected the call (open)"
        );
    }

    #[test]
    fn test_call_error_accessors() {
        let rejected: CallError<std::io::Error> = Rejected {
            breaker: "db".to_string(),
            state: State::HalfOpen,
        }
        .into();
        assert!(rejected.is_rejected());
        assert!(rejected.operation().is_none());

        let failed: CallError<&str> = CallError::Operation("boom");
        assert!(!failed.is_rejected());
        assert_eq!(failed.to_string(), "boom");
        assert_eq!(failed.into_operation(), Some("boom"));
    }

    #[test]
    fn test_config_error_message() {
        let err = ConfigError::InvalidDuration {
            field: "open_timeout",
        };
        assert_eq!(err.to_string(), "open_timeout must be greater than zero");
    }
}
