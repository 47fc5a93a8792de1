//! Circuit breaker gate: admission, outcome recording and state transitions
//!
//! The breaker has three states:
//! - Closed: normal operation, calls pass through and outcomes are tallied
//! - Open: the operation is assumed broken, calls are rejected immediately
//! - HalfOpen: a bounded number of probe calls test whether it recovered
//!
//! ```text
//!            ready_to_trip(counts)              open_timeout elapsed
//!   Closed ─────────────────────────▶ Open ─────────────────────────▶ HalfOpen
//!     ▲                                ▲                                 │
//!     │                                └──────── any failure ────────────┤
//!     └────────────────── every probe in the budget succeeded ───────────┘
//! ```
//!
//! Time is only looked at when somebody calls into the breaker. There is no
//! background task: an expired closed window or open timeout is noticed by the
//! next admission, recording or state query.
//!
//! Every state transition starts a new generation. A [`Permit`] remembers the
//! generation it was admitted in and its outcome is dropped if the breaker has
//! changed state since, so a slow call admitted before a trip can never close
//! or reopen the breaker afterwards. A closed-window roll-over only zeroes the
//! counts: calls still in flight report into the new window.

use crate::error::{CallError, ConfigError, Rejected};
use crate::settings::Settings;
use crate::state::{Counts, State};
use std::error::Error as StdError;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// A state change that still has to be reported to the observer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Transition {
    from: State,
    to: State,
}

/// Everything guarded by the breaker's lock
#[derive(Debug)]
struct Gate {
    state: State,
    counts: Counts,
    generation: u64,
    /// End of the closed reset window or of the open timeout; none while half-open
    expiry: Option<Instant>,
}

impl Gate {
    fn new(now: Instant, settings: &Settings) -> Self {
        Self {
            state: State::Closed,
            counts: Counts::default(),
            generation: 0,
            expiry: now.checked_add(settings.closed_reset_interval),
        }
    }

    /// Apply any time-based change that is due at `now`
    fn refresh(&mut self, now: Instant, settings: &Settings) -> Option<Transition> {
        let expired = self.expiry.is_some_and(|expiry| now >= expiry);
        match self.state {
            State::Closed if expired => {
                // Calls admitted in the old window still report into the new one
                self.new_window(now, settings);
                debug!(generation = self.generation, "Closed window elapsed, counts reset");
                None
            }
            State::Open if expired => self.set_state(State::HalfOpen, now, settings),
            _ => None,
        }
    }

    /// Admit one call, returning its generation, or the state that refused it
    fn admit(&mut self, budget: u32) -> Result<u64, State> {
        match self.state {
            State::Open => return Err(State::Open),
            State::HalfOpen if self.counts.requests >= budget => return Err(State::HalfOpen),
            State::Closed | State::HalfOpen => {}
        }
        self.counts.on_request();
        Ok(self.generation)
    }

    fn on_success(&mut self, now: Instant, settings: &Settings) -> Option<Transition> {
        self.counts.on_success();
        match self.state {
            State::HalfOpen
                if self.counts.consecutive_successes >= settings.half_open_budget() =>
            {
                self.set_state(State::Closed, now, settings)
            }
            _ => None,
        }
    }

    fn on_failure(&mut self, now: Instant, settings: &Settings) -> Option<Transition> {
        self.counts.on_failure();
        match self.state {
            State::Closed if (settings.ready_to_trip)(self.counts) => {
                self.set_state(State::Open, now, settings)
            }
            State::HalfOpen => self.set_state(State::Open, now, settings),
            _ => None,
        }
    }

    fn set_state(&mut self, to: State, now: Instant, settings: &Settings) -> Option<Transition> {
        if self.state == to {
            return None;
        }
        let from = self.state;
        self.state = to;
        self.generation = self.generation.wrapping_add(1);
        self.new_window(now, settings);
        Some(Transition { from, to })
    }

    /// Zero the counts and start the current state's window. A window too
    /// long to represent never expires.
    fn new_window(&mut self, now: Instant, settings: &Settings) {
        self.counts.reset();
        self.expiry = match self.state {
            State::Closed => now.checked_add(settings.closed_reset_interval),
            State::Open => now.checked_add(settings.open_timeout),
            State::HalfOpen => None,
        };
    }
}

/// Circuit breaker protecting one operation.
///
/// Clones share the same state, so a breaker can be handed to every task that
/// calls the protected operation.
///
/// # Example
/// ```no_run
/// use tripwire::{CallError, CircuitBreaker};
///
/// # async fn fetch_quote() -> Result<u64, std::io::Error> { Ok(42) }
/// #[tokio::main]
/// async fn main() {
///     let breaker = CircuitBreaker::with_defaults("quotes");
///
///     match breaker.execute(|| fetch_quote()).await {
///         Ok(quote) => println!("quote: {quote}"),
///         Err(CallError::Rejected(rejected)) => println!("serving cached quote: {rejected}"),
///         Err(CallError::Operation(err)) => println!("quote service failed: {err}"),
///     }
/// }
/// ```
#[derive(Debug, Clone)]
pub struct CircuitBreaker {
    name: Arc<str>,
    settings: Arc<Settings>,
    gate: Arc<Mutex<Gate>>,
}

impl CircuitBreaker {
    /// Create a breaker, failing if a timing window in `settings` is zero
    pub fn new(name: impl Into<String>, settings: Settings) -> Result<Self, ConfigError> {
        settings.validate()?;
        Ok(Self::from_validated(name.into(), settings))
    }

    /// Create a breaker with the default settings
    pub fn with_defaults(name: impl Into<String>) -> Self {
        Self::from_validated(name.into(), Settings::default())
    }

    fn from_validated(name: String, settings: Settings) -> Self {
        let gate = Gate::new(Instant::now(), &settings);
        Self {
            name: Arc::from(name),
            settings: Arc::new(settings),
            gate: Arc::new(Mutex::new(gate)),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Current state, after applying any expired window
    pub fn state(&self) -> State {
        let (state, transition) = {
            let mut gate = self.lock();
            let transition = gate.refresh(Instant::now(), &self.settings);
            (gate.state, transition)
        };
        self.notify(transition);
        state
    }

    /// Snapshot of the counts in the current window
    pub fn counts(&self) -> Counts {
        let (counts, transition) = {
            let mut gate = self.lock();
            let transition = gate.refresh(Instant::now(), &self.settings);
            (gate.counts, transition)
        };
        self.notify(transition);
        counts
    }

    /// Ask to make one call.
    ///
    /// On success the returned [`Permit`] must be resolved with the call's
    /// outcome. Dropping it unresolved records a failure.
    pub fn allow(&self) -> Result<Permit, Rejected> {
        let (admitted, transition) = {
            let mut gate = self.lock();
            let transition = gate.refresh(Instant::now(), &self.settings);
            (gate.admit(self.settings.half_open_budget()), transition)
        };
        self.notify(transition);

        match admitted {
            Ok(generation) => Ok(Permit {
                breaker: self.clone(),
                generation,
                resolved: false,
            }),
            Err(state) => {
                debug!(breaker = %self.name, %state, "Circuit breaker rejected call");
                Err(Rejected {
                    breaker: self.name.to_string(),
                    state,
                })
            }
        }
    }

    /// Run an async operation through the breaker.
    ///
    /// The operation is not polled at all when the breaker rejects. Its own
    /// error is returned unchanged inside [`CallError::Operation`] after being
    /// classified with [`Settings::is_successful`]. If the returned future is
    /// dropped before completing, the call is recorded as a failure.
    ///
    /// `E` must implement [`std::error::Error`] so the predicate can inspect
    /// it. Error types that do not, such as `anyhow::Error` or
    /// `Box<dyn Error>`, go through [`allow`](Self::allow) and
    /// [`Permit::record`] instead.
    pub async fn execute<F, Fut, T, E>(&self, op: F) -> Result<T, CallError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: StdError + 'static,
    {
        let permit = self.allow()?;
        let result = op().await;
        permit.record(self.is_success(&result));
        result.map_err(CallError::Operation)
    }

    /// Run a blocking operation through the breaker. Same error bound as [`execute`](Self::execute).
    pub fn call<F, T, E>(&self, op: F) -> Result<T, CallError<E>>
    where
        F: FnOnce() -> Result<T, E>,
        E: StdError + 'static,
    {
        let permit = self.allow()?;
        let result = op();
        permit.record(self.is_success(&result));
        result.map_err(CallError::Operation)
    }

    /// Classify an outcome with this breaker's success predicate
    pub fn is_success<T, E>(&self, result: &Result<T, E>) -> bool
    where
        E: StdError + 'static,
    {
        match result {
            Ok(_) => true,
            Err(err) => (self.settings.is_successful)(err),
        }
    }

    fn on_result(&self, generation: u64, success: bool) {
        let transition = {
            let mut gate = self.lock();
            let now = Instant::now();
            let refreshed = gate.refresh(now, &self.settings);
            // Every transition starts a new generation, so a matching
            // generation means the refresh above changed no state
            if gate.generation != generation {
                debug!(
                    breaker = %self.name,
                    generation,
                    current = gate.generation,
                    "Discarding outcome admitted before a state change"
                );
                refreshed
            } else if success {
                gate.on_success(now, &self.settings)
            } else {
                gate.on_failure(now, &self.settings)
            }
        };
        self.notify(transition);
    }

    /// Report a transition. Runs outside the lock so an observer may query the breaker.
    fn notify(&self, transition: Option<Transition>) {
        let Some(Transition { from, to }) = transition else {
            return;
        };
        info!(breaker = %self.name, %from, %to, "Circuit breaker state changed");
        if let Some(on_state_change) = &self.settings.on_state_change {
            on_state_change(&self.name, from, to);
        }
    }

    fn lock(&self) -> MutexGuard<'_, Gate> {
        // Nothing in the gate is left half-updated across a panic point
        self.gate.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Admission for one call, obtained from [`CircuitBreaker::allow`]
#[must_use = "dropping a permit without recording its outcome counts as a failure"]
#[derive(Debug)]
pub struct Permit {
    breaker: CircuitBreaker,
    generation: u64,
    resolved: bool,
}

impl Permit {
    /// Record the call as a success
    pub fn success(self) {
        self.record(true);
    }

    /// Record the call as a failure
    pub fn failure(self) {
        self.record(false);
    }

    /// Record the outcome of the call
    pub fn record(mut self, success: bool) {
        self.resolve(success);
    }

    /// Record a result, classified with the breaker's success predicate
    pub fn record_result<T, E>(self, result: &Result<T, E>)
    where
        E: StdError + 'static,
    {
        let success = self.breaker.is_success(result);
        self.record(success);
    }

    fn resolve(&mut self, success: bool) {
        if !self.resolved {
            self.resolved = true;
            self.breaker.on_result(self.generation, success);
        }
    }
}

impl Drop for Permit {
    fn drop(&mut self) {
        if !self.resolved {
            warn!(breaker = %self.breaker.name, "Permit dropped without an outcome, recording failure");
            self.resolve(false);
        }
    }
}
