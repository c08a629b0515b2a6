//! Error types for the gateway and its policies
use crate::classify::Classify;
use crate::transport::TransportError;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
/// Cap the number of stored failures inside RetryExhausted to avoid unbounded growth.
pub const MAX_RETRY_FAILURES: usize = 10;
/// Policy-level error produced by the breaker and the retry executor
#[derive(Debug, Clone)]
pub enum ResilienceError<E> {
    /// The circuit breaker rejected the call without running it
    CircuitOpen { failure_count: usize, open_for: Duration, retry_after: Duration },
    /// All attempts were spent on retryable failures
    RetryExhausted { attempts: usize, failures: Arc<Vec<E>> },
    /// The operation failed with an error that must not be retried
    Inner(E),
}
impl<E: fmt::Display> fmt::Display for ResilienceError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CircuitOpen { failure_count, open_for, retry_after } => {
                write!(
                    f,
                    "circuit breaker open ({} failures, open for {:?}, retry after {:?})",
                    failure_count, open_for, retry_after
                )
            }
            Self::RetryExhausted { attempts, failures } => {
                let recorded = failures.len();
                let truncated_note = if recorded < *attempts {
                    format!(" (recorded last {} failures)", recorded)
                } else {
                    String::new()
                };
                match failures.last() {
                    Some(last) => write!(
                        f,
                        "retry exhausted after {} attempts{}; last error: {}",
                        attempts, truncated_note, last
                    ),
                    None => write!(
                        f,
                        "retry exhausted after {} attempts{}; no recorded failures",
                        attempts, truncated_note
                    ),
                }
            }
            Self::Inner(e) => write!(f, "{}", e),
        }
    }
}
impl<E: std::error::Error + 'static> std::error::Error for ResilienceError<E> {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Inner(e) => Some(e),
            Self::RetryExhausted { failures, .. } => {
                failures.last().map(|e| e as &dyn std::error::Error)
            }
            Self::CircuitOpen { .. } => None,
        }
    }
}
impl<E> ResilienceError<E> {
    /// Construct a `RetryExhausted` variant keeping only the most recent `MAX_RETRY_FAILURES`.
    pub fn retry_exhausted(attempts: usize, failures: Vec<E>) -> Self {
        let trimmed = if failures.len() > MAX_RETRY_FAILURES {
            let skip = failures.len() - MAX_RETRY_FAILURES;
            failures.into_iter().skip(skip).collect()
        } else {
            failures
        };
        ResilienceError::RetryExhausted { attempts, failures: Arc::new(trimmed) }
    }
    pub fn is_circuit_open(&self) -> bool {
        matches!(self, Self::CircuitOpen { .. })
    }
    pub fn is_retry_exhausted(&self) -> bool {
        matches!(self, Self::RetryExhausted { .. })
    }
    pub fn is_inner(&self) -> bool {
        matches!(self, Self::Inner(_))
    }
    /// Get the inner error if this is an Inner variant
    pub fn into_inner(self) -> Option<E> {
        match self {
            Self::Inner(e) => Some(e),
            _ => None,
        }
    }
    /// Access all recorded failures for RetryExhausted, if present.
    pub fn failures(&self) -> Option<&[E]> {
        match self {
            Self::RetryExhausted { failures, .. } => Some(failures.as_slice()),
            _ => None,
        }
    }
    /// The most recent underlying failure: the inner error or the last recorded retry failure.
    pub fn last_failure(&self) -> Option<&E> {
        match self {
            Self::Inner(e) => Some(e),
            Self::RetryExhausted { failures, .. } => failures.last(),
            Self::CircuitOpen { .. } => None,
        }
    }
    /// Remaining cool-down if the breaker rejected the call.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::CircuitOpen { retry_after, .. } => Some(*retry_after),
            _ => None,
        }
    }
}

/// Invalid configuration values.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    #[error("base_delay must be > 0")]
    ZeroBaseDelay,
    #[error("base_delay must be at least 1ms (got {0:?})")]
    BaseDelayTooShort(Duration),
    #[error("max_delay ({max:?}) must be >= base_delay ({base:?})")]
    MaxLessThanBase { base: Duration, max: Duration },
    #[error("backoff multiplier must be finite and > 1 (got {0})")]
    InvalidMultiplier(f64),
    #[error("jitter ratio must be within [0, 1] (got {0})")]
    InvalidJitterRatio(f64),
    #[error("failure_threshold must be > 0 (got {provided})")]
    InvalidFailureThreshold { provided: usize },
    #[error("reset_timeout must be at least 1ms (got {0:?})")]
    InvalidResetTimeout(Duration),
    #[error("half_open_max_calls must be > 0 (got {provided})")]
    InvalidHalfOpenLimit { provided: usize },
    #[error("environment variable {var} has invalid value {value:?}")]
    InvalidEnv { var: &'static str, value: String },
}

/// Normalized terminal error surfaced by [`PaymentGateway`](crate::PaymentGateway).
///
/// Every one of these is raised exactly once per failed payment, after the request was placed in
/// the failure queue.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GatewayError {
    /// The breaker rejected the call; the remote was not contacted.
    #[error("circuit breaker is open - payment gateway unavailable (retry after {retry_after:?})")]
    CircuitOpen { failure_count: usize, retry_after: Duration },
    /// The remote rejected the payment; retrying the same request cannot help.
    #[error("payment rejected by gateway: {status} - {reason}")]
    Client { status: u16, reason: String },
    /// Single-attempt budget ended in a timeout.
    #[error("payment gateway timeout: {message}")]
    Timeout { message: String },
    /// Single-attempt budget ended without any response.
    #[error("no response received from payment gateway: {message}")]
    Transport { message: String },
    /// Every permitted attempt failed with a retryable error.
    #[error("payment failed after {attempts} attempts: {last}")]
    ExhaustedRetries {
        attempts: usize,
        #[source]
        last: TransportError,
    },
}

impl GatewayError {
    pub fn is_circuit_open(&self) -> bool {
        matches!(self, Self::CircuitOpen { .. })
    }

    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::Client { .. })
    }

    /// True for a timeout, including one that ended a retry budget.
    pub fn is_timeout(&self) -> bool {
        match self {
            Self::Timeout { .. } => true,
            Self::ExhaustedRetries { last, .. } => last.is_timeout(),
            _ => false,
        }
    }

    /// Whether resubmitting later could plausibly succeed.
    pub fn is_retryable_later(&self) -> bool {
        !self.is_client_error()
    }

    /// The last transport failure behind an exhausted budget.
    pub fn last_failure(&self) -> Option<&TransportError> {
        match self {
            Self::ExhaustedRetries { last, .. } => Some(last),
            _ => None,
        }
    }

    fn from_single(failure: TransportError) -> Self {
        let retryable = failure.retryability().is_retryable();
        match failure {
            TransportError::Status { status, reason } if !retryable => {
                Self::Client { status, reason }
            }
            TransportError::Timeout { message } => Self::Timeout { message },
            TransportError::NoResponse { message } | TransportError::Other { message } => {
                Self::Transport { message }
            }
            status @ TransportError::Status { .. } => {
                Self::ExhaustedRetries { attempts: 1, last: status }
            }
        }
    }
}

impl From<ResilienceError<TransportError>> for GatewayError {
    fn from(err: ResilienceError<TransportError>) -> Self {
        match err {
            ResilienceError::CircuitOpen { failure_count, retry_after, .. } => {
                Self::CircuitOpen { failure_count, retry_after }
            }
            ResilienceError::Inner(failure) => Self::from_single(failure),
            ResilienceError::RetryExhausted { attempts, failures } => {
                let last = failures
                    .last()
                    .cloned()
                    .unwrap_or_else(|| TransportError::other("no recorded failures"));
                if attempts <= 1 {
                    Self::from_single(last)
                } else {
                    Self::ExhaustedRetries { attempts, last }
                }
            }
        }
    }
}
