//! Gateway-wide settings.
//!
//! ## Environment variables
//! - `PAYGATE_MAX_RETRIES`: retries after the first call
//! - `PAYGATE_BASE_DELAY_MS`: first backoff delay in milliseconds
//! - `PAYGATE_MAX_DELAY_MS`: backoff cap in milliseconds
//! - `PAYGATE_BACKOFF_MULTIPLIER`: growth factor between retries
//! - `PAYGATE_FAILURE_THRESHOLD`: consecutive failures that open the circuit
//! - `PAYGATE_RESET_TIMEOUT_MS`: time an open circuit waits before a trial call
//!
//! Unset variables keep the defaults; set but unparsable ones are an error.

use crate::error::ConfigError;
use crate::{CircuitBreakerConfig, RetryConfig};
use std::str::FromStr;
use std::time::Duration;

pub const ENV_MAX_RETRIES: &str = "PAYGATE_MAX_RETRIES";
pub const ENV_BASE_DELAY_MS: &str = "PAYGATE_BASE_DELAY_MS";
pub const ENV_MAX_DELAY_MS: &str = "PAYGATE_MAX_DELAY_MS";
pub const ENV_BACKOFF_MULTIPLIER: &str = "PAYGATE_BACKOFF_MULTIPLIER";
pub const ENV_FAILURE_THRESHOLD: &str = "PAYGATE_FAILURE_THRESHOLD";
pub const ENV_RESET_TIMEOUT_MS: &str = "PAYGATE_RESET_TIMEOUT_MS";

/// Retry and breaker settings for one [`PaymentGateway`](crate::PaymentGateway).
#[derive(Debug, Clone, PartialEq, Default)]
pub struct GatewayConfig {
    pub retry: RetryConfig,
    pub circuit_breaker: CircuitBreakerConfig,
}

impl GatewayConfig {
    pub fn new(retry: RetryConfig, circuit_breaker: CircuitBreakerConfig) -> Self {
        Self { retry, circuit_breaker }
    }

    /// Load from `PAYGATE_*` process environment variables.
    ///
    /// # Errors
    /// `ConfigError::InvalidEnv` when a variable cannot be parsed, or the validation error of
    /// the resulting retry/breaker config.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Load from any key/value source, e.g. a parsed config file or a test map.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let max_retries = parse_or(&lookup, ENV_MAX_RETRIES, defaults.retry.max_retries())?;
        let base_delay = millis_or(&lookup, ENV_BASE_DELAY_MS, defaults.retry.base_delay())?;
        let max_delay = millis_or(&lookup, ENV_MAX_DELAY_MS, defaults.retry.max_delay())?;
        let multiplier = parse_or(&lookup, ENV_BACKOFF_MULTIPLIER, defaults.retry.multiplier())?;
        let retry = RetryConfig::new(max_retries, base_delay, max_delay, multiplier)?;

        let threshold = parse_or(
            &lookup,
            ENV_FAILURE_THRESHOLD,
            defaults.circuit_breaker.failure_threshold(),
        )?;
        let reset_timeout =
            millis_or(&lookup, ENV_RESET_TIMEOUT_MS, defaults.circuit_breaker.reset_timeout())?;
        let circuit_breaker = CircuitBreakerConfig::new(threshold, reset_timeout)?;

        tracing::debug!(
            max_retries,
            base_delay_ms = base_delay.as_millis() as u64,
            max_delay_ms = max_delay.as_millis() as u64,
            multiplier,
            failure_threshold = threshold,
            reset_timeout_ms = reset_timeout.as_millis() as u64,
            "gateway configuration loaded"
        );

        Ok(Self { retry, circuit_breaker })
    }

    /// Check both halves. Useful after building the struct by hand through its public fields.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.retry.validate()?;
        self.circuit_breaker.validate()
    }
}

fn parse_or<F, T>(lookup: &F, var: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(var) {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidEnv { var, value: raw }),
    }
}

fn millis_or<F>(lookup: &F, var: &'static str, default: Duration) -> Result<Duration, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let fallback = u64::try_from(default.as_millis()).unwrap_or(u64::MAX);
    parse_or(lookup, var, fallback).map(Duration::from_millis)
}
