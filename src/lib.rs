//! Tripwire: a three-state circuit breaker
//!
//! # Overview
//!
//! A circuit breaker wraps a fallible operation, usually a remote call, and
//! stops issuing calls once the operation is known to be failing:
//!
//! - **Closed**: every call is admitted and its outcome tallied. Tallies are
//!   zeroed every `closed_reset_interval`, so old failures stop counting.
//! - **Open**: `ready_to_trip` said the operation is broken. Every call is
//!   rejected until `open_timeout` elapses.
//! - **HalfOpen**: up to `max_half_open_requests` probe calls are admitted.
//!   One failure reopens the breaker, all probes succeeding closes it.
//!
//! # Key Principles
//!
//! - One breaker per protected operation, no global state
//! - One lock per breaker, never held while the operation runs
//! - No background timers: windows are checked whenever the breaker is called
//! - The operation's own errors pass through untouched; the breaker only adds
//!   its own rejection, which is easy to tell apart
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │         Your Application                │
//! └─────────────┬───────────────────────────┘
//!               │ execute / call / allow
//!               ▼
//! ┌─────────────────────────────────────────┐
//! │       Gate (Mutex)                      │  ← admit or reject
//! │  State · Counts · generation · expiry   │
//! └─────────────┬───────────────────────────┘
//!               │ Permit
//!               ▼
//!         Protected operation
//!               │ outcome, classified by is_successful
//!               ▼
//! ┌─────────────────────────────────────────┐
//! │       Gate (Mutex)                      │  ← record, maybe transition
//! └─────────────┬───────────────────────────┘
//!               ▼
//!      on_state_change(name, from, to)
//! ```
//!
//! # Usage Example
//!
//! ## Wrapping an async call
//!
//! ```no_run
//! use tripwire::{CallError, CircuitBreaker, Settings};
//! use std::time::Duration;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let settings = Settings::default()
//!     .open_timeout(Duration::from_secs(30))
//!     .max_half_open_requests(3);
//! let breaker = CircuitBreaker::new("inventory", settings)?;
//!
//! match breaker.execute(|| async { Ok::<_, std::io::Error>(42) }).await {
//!     Ok(stock) => println!("in stock: {stock}"),
//!     Err(CallError::Rejected(_)) => println!("inventory unavailable, using cached value"),
//!     Err(CallError::Operation(err)) => return Err(err.into()),
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Two-step admission
//!
//! ```
//! use tripwire::CircuitBreaker;
//!
//! let breaker = CircuitBreaker::with_defaults("search");
//! if let Ok(permit) = breaker.allow() {
//!     let healthy = true; // run the operation here
//!     permit.record(healthy);
//! }
//! assert_eq!(breaker.counts().total_successes, 1);
//! ```

pub mod breaker;
pub mod config;
pub mod error;
pub mod logging;
pub mod settings;
pub mod state;

// Re-export main types for convenience
pub use breaker::{CircuitBreaker, Permit};
pub use config::BreakerConfig;
pub use error::{CallError, ConfigError, Rejected};
pub use settings::{consecutive_failures_above, Settings};
pub use state::{Counts, State};

/// Prelude module for convenient imports
///
/// # Example
/// ```
/// use tripwire::prelude::*;
/// ```
pub mod prelude {
    pub use super::breaker::{CircuitBreaker, Permit};
    pub use super::error::{CallError, Rejected};
    pub use super::settings::Settings;
    pub use super::state::{Counts, State};
}
