//! Circuit breaker guarding the remote payment service.
//!
//! State machine (initial state `Closed`):
//! - **Closed**: calls run; each failure increments the consecutive-failure count and the breaker
//!   opens once the count reaches `failure_threshold`.
//! - **Open**: calls are rejected with `ResilienceError::CircuitOpen` without running, until
//!   `reset_timeout` has elapsed since the last failure. The first call after that moves the
//!   breaker to half-open and runs as a trial.
//! - **HalfOpen**: a successful trial closes the breaker, a failed one re-opens it.
//!
//! Any success resets the failure count to zero before the state transition is evaluated.
//! Rejections never touch the count.
//!
//! State, count and last-failure time live behind one mutex so every transition is a single atomic
//! step; the lock is never held across the guarded operation.

use crate::clock::{Clock, MonotonicClock};
use crate::error::ConfigError;
use crate::ResilienceError;
use std::fmt;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

/// Current state of the circuit breaker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "SCREAMING_SNAKE_CASE"))]
pub enum CircuitState {
    /// Normal operating mode.
    Closed,
    /// Short-circuits calls until the reset timeout elapses.
    Open,
    /// Trial mode probing whether the remote recovered.
    HalfOpen,
}

impl fmt::Display for CircuitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CircuitState::Closed => write!(f, "CLOSED"),
            CircuitState::Open => write!(f, "OPEN"),
            CircuitState::HalfOpen => write!(f, "HALF_OPEN"),
        }
    }
}

/// Validated configuration for the circuit breaker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CircuitBreakerConfig {
    failure_threshold: usize,
    reset_timeout: Duration,
    half_open_max_calls: Option<usize>,
}

impl Default for CircuitBreakerConfig {
    /// Open after 5 consecutive failures, try again after one minute.
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            reset_timeout: Duration::from_secs(60),
            half_open_max_calls: None,
        }
    }
}

impl CircuitBreakerConfig {
    /// Create a config with validation.
    pub fn new(failure_threshold: usize, reset_timeout: Duration) -> Result<Self, ConfigError> {
        let cfg = Self { failure_threshold, reset_timeout, half_open_max_calls: None };
        cfg.validate()?;
        Ok(cfg)
    }

    /// A breaker that never opens.
    pub fn disabled() -> Self {
        Self { failure_threshold: usize::MAX, reset_timeout: Duration::MAX, half_open_max_calls: None }
    }

    /// Cap concurrent trial calls while half-open; extra callers are rejected as if open.
    /// Without a cap every caller is let through once the breaker is half-open.
    pub fn with_half_open_limit(mut self, limit: usize) -> Result<Self, ConfigError> {
        if limit == 0 {
            return Err(ConfigError::InvalidHalfOpenLimit { provided: limit });
        }
        self.half_open_max_calls = Some(limit);
        Ok(self)
    }

    pub(crate) fn validate(&self) -> Result<(), ConfigError> {
        if self.failure_threshold == 0 {
            return Err(ConfigError::InvalidFailureThreshold { provided: 0 });
        }
        // the reset timer ticks in whole milliseconds
        if self.reset_timeout < Duration::from_millis(1) {
            return Err(ConfigError::InvalidResetTimeout(self.reset_timeout));
        }
        if self.half_open_max_calls == Some(0) {
            return Err(ConfigError::InvalidHalfOpenLimit { provided: 0 });
        }
        Ok(())
    }

    /// Consecutive failures before opening from Closed.
    pub fn failure_threshold(&self) -> usize {
        self.failure_threshold
    }

    /// Duration to stay Open before a trial call.
    pub fn reset_timeout(&self) -> Duration {
        self.reset_timeout
    }

    /// Cap on concurrent trial calls while HalfOpen; `None` admits every caller.
    pub fn half_open_max_calls(&self) -> Option<usize> {
        self.half_open_max_calls
    }

    fn reset_timeout_millis(&self) -> u64 {
        u64::try_from(self.reset_timeout.as_millis()).unwrap_or(u64::MAX)
    }
}

/// Point-in-time view of the breaker, taken under a single lock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BreakerSnapshot {
    pub state: CircuitState,
    pub failure_count: usize,
}

#[derive(Debug)]
struct BreakerState {
    state: CircuitState,
    failure_count: usize,
    last_failure_millis: u64,
    half_open_in_flight: usize,
}

/// Circuit breaker guarding an async operation.
///
/// Clones share the same underlying state via `Arc`, so every handle observes and affects the
/// same circuit lifecycle.
#[derive(Debug, Clone)]
pub struct CircuitBreaker {
    state: Arc<Mutex<BreakerState>>,
    config: CircuitBreakerConfig,
    clock: Arc<dyn Clock>,
}

impl CircuitBreaker {
    /// Create a breaker from a validated config.
    ///
    /// # Examples
    /// ```
    /// use paygate::{CircuitBreaker, CircuitBreakerConfig, CircuitState};
    /// use std::time::Duration;
    /// let cfg = CircuitBreakerConfig::new(5, Duration::from_secs(60)).unwrap();
    /// let breaker = CircuitBreaker::new(cfg);
    /// assert_eq!(breaker.state(), CircuitState::Closed);
    /// ```
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            state: Arc::new(Mutex::new(BreakerState {
                state: CircuitState::Closed,
                failure_count: 0,
                last_failure_millis: 0,
                half_open_in_flight: 0,
            })),
            config,
            clock: Arc::new(MonotonicClock::default()),
        }
    }

    /// Override the clock (useful for deterministic tests).
    pub fn with_clock<C: Clock + 'static>(mut self, clock: C) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    pub(crate) fn with_shared_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn config(&self) -> &CircuitBreakerConfig {
        &self.config
    }

    pub fn state(&self) -> CircuitState {
        self.lock().state
    }

    pub fn failure_count(&self) -> usize {
        self.lock().failure_count
    }

    pub fn snapshot(&self) -> BreakerSnapshot {
        let inner = self.lock();
        BreakerSnapshot { state: inner.state, failure_count: inner.failure_count }
    }

    /// Executes the provided async operation under circuit breaker protection.
    ///
    /// The operation runs at most once. Its result or error is returned unchanged; the breaker
    /// only updates its own state on the way out.
    ///
    /// # Errors
    /// Returns `ResilienceError::CircuitOpen` if the breaker is open and the reset timeout has not
    /// elapsed, or if the half-open trial limit is reached. Otherwise returns whatever the
    /// operation returned.
    pub async fn execute<T, E, Fut, Op>(&self, operation: Op) -> Result<T, ResilienceError<E>>
    where
        T: Send,
        Fut: Future<Output = Result<T, ResilienceError<E>>> + Send,
        Op: FnOnce() -> Fut + Send,
    {
        let trial = self.admit()?;

        let result = operation().await;
        drop(trial);

        match &result {
            Ok(_) => self.on_success(),
            Err(_) => self.on_failure(),
        }

        result
    }

    fn admit<E>(&self) -> Result<TrialGuard<'_>, ResilienceError<E>> {
        let mut inner = self.lock();
        match inner.state {
            CircuitState::Closed => Ok(TrialGuard { breaker: self, counted: false }),
            CircuitState::Open => {
                let elapsed = self.now_millis().saturating_sub(inner.last_failure_millis);
                let timeout = self.config.reset_timeout_millis();
                if elapsed >= timeout {
                    inner.state = CircuitState::HalfOpen;
                    inner.half_open_in_flight = 1;
                    tracing::info!(elapsed_ms = elapsed, "Circuit breaker → half-open");
                    Ok(TrialGuard { breaker: self, counted: true })
                } else {
                    Err(ResilienceError::CircuitOpen {
                        failure_count: inner.failure_count,
                        open_for: Duration::from_millis(elapsed),
                        retry_after: Duration::from_millis(timeout - elapsed),
                    })
                }
            }
            CircuitState::HalfOpen => {
                if let Some(limit) = self.config.half_open_max_calls {
                    if inner.half_open_in_flight >= limit {
                        let elapsed = self.now_millis().saturating_sub(inner.last_failure_millis);
                        return Err(ResilienceError::CircuitOpen {
                            failure_count: inner.failure_count,
                            open_for: Duration::from_millis(elapsed),
                            retry_after: Duration::ZERO,
                        });
                    }
                }
                inner.half_open_in_flight += 1;
                tracing::debug!(
                    in_flight = inner.half_open_in_flight,
                    "Circuit breaker: half-open trial call"
                );
                Ok(TrialGuard { breaker: self, counted: true })
            }
        }
    }

    fn on_success(&self) {
        let mut inner = self.lock();
        inner.failure_count = 0;
        if inner.state == CircuitState::HalfOpen {
            inner.state = CircuitState::Closed;
            inner.half_open_in_flight = 0;
            tracing::info!("Circuit breaker → closed");
        }
    }

    fn on_failure(&self) {
        let now = self.now_millis();
        let mut inner = self.lock();
        inner.failure_count = inner.failure_count.saturating_add(1);
        inner.last_failure_millis = now;
        let failures = inner.failure_count;

        match inner.state {
            CircuitState::HalfOpen => {
                inner.state = CircuitState::Open;
                inner.half_open_in_flight = 0;
                tracing::warn!(failures, "Circuit breaker: trial failed → open");
            }
            CircuitState::Closed if failures >= self.config.failure_threshold => {
                inner.state = CircuitState::Open;
                tracing::error!(
                    failures,
                    threshold = self.config.failure_threshold,
                    "Circuit breaker → open"
                );
            }
            // still open: the failure only pushes the reset timer forward
            CircuitState::Closed | CircuitState::Open => {}
        }
    }

    fn lock(&self) -> MutexGuard<'_, BreakerState> {
        // each update is a single assignment sequence, so a poisoned guard is still consistent
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn now_millis(&self) -> u64 {
        self.clock.now_millis()
    }
}

/// Releases a half-open trial slot even if the operation panics or is dropped.
struct TrialGuard<'a> {
    breaker: &'a CircuitBreaker,
    counted: bool,
}

impl Drop for TrialGuard<'_> {
    fn drop(&mut self) {
        if self.counted {
            let mut inner = self.breaker.lock();
            inner.half_open_in_flight = inner.half_open_in_flight.saturating_sub(1);
        }
    }
}
