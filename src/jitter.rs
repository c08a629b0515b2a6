//! Jitter strategies to prevent synchronized retry storms.
//!
//! When to use which strategy:
//! - `None`: deterministic retries for tests or tightly controlled workflows.
//! - `Proportional`: adds `uniform[0, ratio) * delay` on top of the delay; the computed backoff is a
//!   floor and never shrinks. The gateway default uses a ratio of `0.3`.
//! - `Full`: uniform in `[0, delay]`, trades the floor for maximum spread.
//!
//! Notes:
//! - RNG: uses `rand`'s thread-local RNG by default; deterministic RNGs can be injected via
//!   `apply_with_rng`.
//! - Precision: `apply` works on whole milliseconds. Backoff jitters the exact exponential value
//!   and floors once at the end.

use crate::error::ConfigError;
use rand::{rng, Rng};
use std::time::Duration;

/// Default spread added on top of each backoff delay.
pub const DEFAULT_JITTER_RATIO: f64 = 0.3;

/// Validated ratio for proportional jitter; private so it can only be built through
/// [`Jitter::proportional`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProportionalConfig {
    ratio: f64,
}

impl ProportionalConfig {
    pub fn ratio(&self) -> f64 {
        self.ratio
    }
}

/// Jitter strategy for randomizing retry delays
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Jitter {
    /// No jitter - use exact backoff delay
    None,
    /// Additive jitter: delay + random in `[0, ratio * delay)`
    Proportional(ProportionalConfig),
    /// Full jitter: random between 0 and delay
    Full,
}

impl Default for Jitter {
    fn default() -> Self {
        Jitter::Proportional(ProportionalConfig { ratio: DEFAULT_JITTER_RATIO })
    }
}

impl Jitter {
    /// Additive jitter with the given ratio. Ratio must be finite and within `[0, 1]`.
    pub fn proportional(ratio: f64) -> Result<Self, ConfigError> {
        if !ratio.is_finite() || !(0.0..=1.0).contains(&ratio) {
            return Err(ConfigError::InvalidJitterRatio(ratio));
        }
        Ok(Jitter::Proportional(ProportionalConfig { ratio }))
    }

    /// Create a full jitter strategy
    pub fn full() -> Self {
        Jitter::Full
    }

    /// Largest value `apply` can return for `delay`, used for bounds checks.
    pub fn upper_bound(&self, delay: Duration) -> Duration {
        match self {
            Jitter::None | Jitter::Full => delay,
            Jitter::Proportional(cfg) => {
                let millis = as_millis_saturated(delay) as f64;
                Duration::from_millis((millis * (1.0 + cfg.ratio)).floor() as u64)
            }
        }
    }

    /// Apply jitter to a delay duration
    pub fn apply(&self, delay: Duration) -> Duration {
        let mut rng = rng();
        self.apply_with_rng(delay, &mut rng)
    }

    /// Apply jitter with a custom RNG (for testing)
    pub fn apply_with_rng<R: Rng>(&self, delay: Duration, rng: &mut R) -> Duration {
        if matches!(self, Jitter::None) {
            return delay;
        }
        let jittered = self.apply_millis(as_millis_saturated(delay) as f64, rng);
        // `as` saturates on overflow
        Duration::from_millis(jittered.floor() as u64)
    }

    /// Jitter a fractional millisecond value without rounding.
    pub(crate) fn apply_millis<R: Rng>(&self, millis: f64, rng: &mut R) -> f64 {
        if millis <= 0.0 {
            return 0.0;
        }
        match self {
            Jitter::None => millis,
            Jitter::Proportional(cfg) if cfg.ratio == 0.0 => millis,
            Jitter::Proportional(cfg) => millis + rng.random::<f64>() * cfg.ratio * millis,
            Jitter::Full => rng.random_range(0.0..=millis),
        }
    }
}

fn as_millis_saturated(duration: Duration) -> u64 {
    duration.as_millis().try_into().unwrap_or(u64::MAX)
}
