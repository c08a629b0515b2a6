//! Exponential backoff for the retry executor.
//!
//! Attempt semantics: `attempt` is 0-indexed over *retries*, so `delay(0)` is the wait before the
//! second call. The deterministic part grows as `base * multiplier^attempt`, is capped at
//! `max_delay`, and jitter is layered on top. The final value never exceeds `max_delay`.
//!
//! Example
//! ```rust
//! use std::time::Duration;
//! use paygate::{BackoffPolicy, Jitter, RetryConfig};
//!
//! let config = RetryConfig::new(3, Duration::from_secs(1), Duration::from_secs(10), 2.0).unwrap();
//! let backoff = BackoffPolicy::new(&config).with_jitter(Jitter::None);
//! assert_eq!(backoff.delay(0), Duration::from_secs(1));
//! assert_eq!(backoff.delay(1), Duration::from_secs(2));
//! assert_eq!(backoff.delay(5), Duration::from_secs(10)); // capped
//! ```

use crate::error::ConfigError;
use crate::Jitter;
use rand::Rng;
use std::time::Duration;

/// Retry budget and delay shape.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryConfig {
    max_retries: usize,
    base_delay: Duration,
    max_delay: Duration,
    multiplier: f64,
}

impl Default for RetryConfig {
    /// 3 retries, 1s base, 10s cap, doubling.
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(10),
            multiplier: 2.0,
        }
    }
}

impl RetryConfig {
    /// Create a validated config. `max_retries` counts retries after the first call, so the
    /// transport is invoked at most `max_retries + 1` times.
    pub fn new(
        max_retries: usize,
        base_delay: Duration,
        max_delay: Duration,
        multiplier: f64,
    ) -> Result<Self, ConfigError> {
        let cfg = Self { max_retries, base_delay, max_delay, multiplier };
        cfg.validate()?;
        Ok(cfg)
    }

    pub(crate) fn validate(&self) -> Result<(), ConfigError> {
        if self.base_delay.is_zero() {
            return Err(ConfigError::ZeroBaseDelay);
        }
        // delays are slept in whole milliseconds
        if self.base_delay < Duration::from_millis(1) {
            return Err(ConfigError::BaseDelayTooShort(self.base_delay));
        }
        if self.base_delay > self.max_delay {
            return Err(ConfigError::MaxLessThanBase { base: self.base_delay, max: self.max_delay });
        }
        if !self.multiplier.is_finite() || self.multiplier <= 1.0 {
            return Err(ConfigError::InvalidMultiplier(self.multiplier));
        }
        Ok(())
    }

    pub fn max_retries(&self) -> usize {
        self.max_retries
    }

    /// Total transport invocations allowed for one request.
    pub fn max_attempts(&self) -> usize {
        self.max_retries.saturating_add(1)
    }

    pub fn base_delay(&self) -> Duration {
        self.base_delay
    }

    pub fn max_delay(&self) -> Duration {
        self.max_delay
    }

    pub fn multiplier(&self) -> f64 {
        self.multiplier
    }
}

/// Computes the wait before each retry.
#[derive(Debug, Clone, PartialEq)]
pub struct BackoffPolicy {
    base: Duration,
    max: Duration,
    multiplier: f64,
    jitter: Jitter,
}

impl BackoffPolicy {
    /// Build from a validated config using the default proportional jitter.
    pub fn new(config: &RetryConfig) -> Self {
        Self {
            base: config.base_delay,
            max: config.max_delay,
            multiplier: config.multiplier,
            jitter: Jitter::default(),
        }
    }

    pub fn with_jitter(mut self, jitter: Jitter) -> Self {
        self.jitter = jitter;
        self
    }

    pub fn jitter(&self) -> Jitter {
        self.jitter
    }

    /// Deterministic part of the delay: `min(base * multiplier^attempt, max)`.
    pub fn exponential(&self, attempt: usize) -> Duration {
        let millis = self.exponential_millis(attempt);
        if millis >= millis_of(self.max) {
            return self.max;
        }
        Duration::from_nanos((millis * 1_000_000.0).round() as u64)
    }

    /// Jittered delay for the given retry attempt.
    pub fn delay(&self, attempt: usize) -> Duration {
        self.delay_with_rng(attempt, &mut rand::rng())
    }

    /// Jittered delay using a caller-supplied RNG, for deterministic tests.
    pub fn delay_with_rng<R: Rng>(&self, attempt: usize, rng: &mut R) -> Duration {
        let jittered = self.jitter.apply_millis(self.exponential_millis(attempt), rng);
        // `as` saturates on overflow
        Duration::from_millis(jittered.floor() as u64).min(self.max)
    }

    fn exponential_millis(&self, attempt: usize) -> f64 {
        let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
        let max_millis = millis_of(self.max);
        let raw = millis_of(self.base) * self.multiplier.powi(exponent);
        if !raw.is_finite() || raw >= max_millis {
            return max_millis;
        }
        raw
    }
}

fn millis_of(duration: Duration) -> f64 {
    duration.as_nanos() as f64 / 1_000_000.0
}
