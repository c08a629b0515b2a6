//! Bounded retry loop for a single logical payment.
//!
//! Semantics:
//! - `max_retries` counts retries after the first call, so the operation runs at most
//!   `max_retries + 1` times.
//! - Each failure is classified through [`Classify`]; a non-retryable failure returns
//!   `ResilienceError::Inner` immediately, whatever budget is left.
//! - Retryable failures wait `BackoffPolicy::delay(attempt)` (0-indexed over retries) and try
//!   again. The wait goes through the [`Sleeper`], which is the only suspension point.
//! - When the budget is spent the result is `ResilienceError::RetryExhausted` carrying the
//!   recorded failures, most recent last.
//!
//! Invariants:
//! - Attempts never exceed `max_retries + 1`.
//! - Backoff is computed exactly once per retry, never after the final attempt.
//!
//! Example
//! ```rust
//! use paygate::{InstantSleeper, RetryConfig, RetryExecutor, TransportError};
//!
//! # tokio::runtime::Runtime::new().unwrap().block_on(async {
//! let executor = RetryExecutor::new(&RetryConfig::default()).with_sleeper(InstantSleeper);
//! let result: Result<(), _> =
//!     executor.execute(|| async { Err(TransportError::status(400, "Bad Request")) }).await;
//! assert!(result.unwrap_err().is_inner());
//! # });
//! ```

use crate::classify::Classify;
use crate::error::MAX_RETRY_FAILURES;
use crate::transport::{PaymentTransport, TransportError};
use crate::{
    BackoffPolicy, Jitter, PaymentRequest, PaymentResponse, ResilienceError, RetryConfig, Sleeper,
    TokioSleeper,
};
use std::collections::VecDeque;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use tracing::Instrument;

/// Retry executor combining the retry budget, backoff, and sleeper.
#[derive(Debug, Clone)]
pub struct RetryExecutor {
    max_retries: usize,
    backoff: BackoffPolicy,
    sleeper: Arc<dyn Sleeper>,
}

impl RetryExecutor {
    /// Executor using the tokio timer and the default proportional jitter.
    pub fn new(config: &RetryConfig) -> Self {
        Self {
            max_retries: config.max_retries(),
            backoff: BackoffPolicy::new(config),
            sleeper: Arc::new(TokioSleeper),
        }
    }

    /// Provide a custom sleeper implementation.
    pub fn with_sleeper<S>(self, sleeper: S) -> Self
    where
        S: Sleeper + 'static,
    {
        self.with_shared_sleeper(Arc::new(sleeper))
    }

    pub(crate) fn with_shared_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    pub fn with_jitter(mut self, jitter: Jitter) -> Self {
        self.backoff = self.backoff.with_jitter(jitter);
        self
    }

    pub fn max_attempts(&self) -> usize {
        self.max_retries.saturating_add(1)
    }

    pub fn backoff(&self) -> &BackoffPolicy {
        &self.backoff
    }

    /// Execute an async operation with retry semantics.
    pub async fn execute<T, E, Fut, Op>(&self, mut operation: Op) -> Result<T, ResilienceError<E>>
    where
        T: Send,
        E: Classify + fmt::Display + Send,
        Fut: Future<Output = Result<T, E>> + Send,
        Op: FnMut() -> Fut + Send,
    {
        let max_attempts = self.max_attempts();
        let mut failures: VecDeque<E> = VecDeque::new();
        let mut attempt = 0;

        loop {
            tracing::debug!(attempt = attempt + 1, max_attempts, "sending attempt");

            let error = match operation().await {
                Ok(value) => return Ok(value),
                Err(e) => e,
            };

            if !error.retryability().is_retryable() {
                tracing::error!(attempt = attempt + 1, error = %error, "non-retryable failure, not retrying");
                return Err(ResilienceError::Inner(error));
            }

            if attempt + 1 >= max_attempts {
                tracing::error!(attempts = max_attempts, error = %error, "all retry attempts exhausted");
                failures.push_back(error);
                return Err(ResilienceError::retry_exhausted(max_attempts, failures.into()));
            }

            let delay = self.backoff.delay(attempt);
            tracing::warn!(
                attempt = attempt + 1,
                delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                error = %error,
                "attempt failed, retrying"
            );

            failures.push_back(error);
            while failures.len() > MAX_RETRY_FAILURES {
                failures.pop_front();
            }

            self.sleeper.sleep(delay).await;
            attempt += 1;
        }
    }

    /// Send one payment through the transport with retries.
    pub async fn execute_with_retry<Tr>(
        &self,
        request: &PaymentRequest,
        transport: &Tr,
    ) -> Result<PaymentResponse, ResilienceError<TransportError>>
    where
        Tr: PaymentTransport + ?Sized,
    {
        let span = tracing::debug_span!("payment_attempts", order_id = %request.order_id());
        let result = self.execute(|| transport.send(request)).instrument(span).await;
        if let Ok(response) = &result {
            tracing::info!(
                order_id = %request.order_id(),
                transaction_id = %response.transaction_id,
                status = %response.status,
                "payment accepted"
            );
        }
        result
    }
}
