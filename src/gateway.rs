//! Payment gateway: the breaker wraps the retry loop, terminal failures go to the queue.
//!
//! ```text
//! process_payment ─▶ CircuitBreaker::execute ─▶ RetryExecutor ─▶ PaymentTransport::send
//!        │                                                              │
//!        └──────── terminal failure: enqueue once, return GatewayError ◀┘
//! ```
//!
//! Example
//! ```rust
//! use async_trait::async_trait;
//! use paygate::prelude::*;
//!
//! struct Approve;
//!
//! #[async_trait]
//! impl PaymentTransport for Approve {
//!     async fn send(&self, request: &PaymentRequest) -> Result<PaymentResponse, TransportError> {
//!         Ok(PaymentResponse::new(format!("txn_{}", request.order_id()), PaymentStatus::Success))
//!     }
//! }
//!
//! # tokio::runtime::Runtime::new().unwrap().block_on(async {
//! let gateway = PaymentGateway::builder(Approve).build().unwrap();
//! let request = PaymentRequest::new(100.0, "USD", "cust_123", "order_123").unwrap();
//! let response = gateway.process_payment(request).await.unwrap();
//! assert_eq!(response.transaction_id, "txn_order_123");
//! assert_eq!(gateway.status().await.queued_payments, 0);
//! # });
//! ```

use crate::clock::{Clock, MonotonicClock};
use crate::error::{ConfigError, GatewayError};
use crate::queue::{FailureQueue, InMemoryFailureQueue};
use crate::transport::PaymentTransport;
use crate::{
    CircuitBreaker, CircuitBreakerConfig, CircuitState, GatewayConfig, Jitter, PaymentRequest,
    PaymentResponse, RetryConfig, RetryExecutor, Sleeper, TokioSleeper,
};
use futures::future::BoxFuture;
use std::fmt;
use std::sync::Arc;
use std::task::{Context, Poll};

/// Breaker state and queue depth at one point in time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub struct GatewayStatus {
    pub state: CircuitState,
    pub queued_payments: usize,
    pub failure_count: usize,
}

/// Outcome of one replay pass over the failure queue.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub struct ReplaySummary {
    /// Entries taken off the queue at the start of the pass.
    pub attempted: usize,
    pub succeeded: usize,
    /// Entries that failed again and were queued as fresh entries.
    pub requeued: usize,
}

struct Inner<T, Q> {
    transport: T,
    queue: Q,
    breaker: CircuitBreaker,
    retry: RetryExecutor,
}

/// Resilient front for a [`PaymentTransport`].
///
/// Clones share the same breaker, queue, and transport, so one gateway per remote dependency can
/// be handed to every request handler.
pub struct PaymentGateway<T, Q = InMemoryFailureQueue> {
    inner: Arc<Inner<T, Q>>,
}

impl<T, Q> Clone for PaymentGateway<T, Q> {
    fn clone(&self) -> Self {
        Self { inner: Arc::clone(&self.inner) }
    }
}

impl<T, Q> fmt::Debug for PaymentGateway<T, Q> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PaymentGateway")
            .field("breaker", &self.inner.breaker)
            .field("retry", &self.inner.retry)
            .finish_non_exhaustive()
    }
}

impl<T> PaymentGateway<T>
where
    T: PaymentTransport,
{
    /// Start configuring a gateway around `transport`.
    pub fn builder(transport: T) -> PaymentGatewayBuilder<T> {
        PaymentGatewayBuilder::new(transport)
    }

    /// Gateway with default settings and an in-memory failure queue.
    pub fn new(transport: T) -> Self {
        let retry = RetryExecutor::new(&RetryConfig::default());
        let breaker = CircuitBreaker::new(CircuitBreakerConfig::default());
        Self::from_parts(transport, InMemoryFailureQueue::new(), breaker, retry)
    }
}

impl<T, Q> PaymentGateway<T, Q>
where
    T: PaymentTransport,
    Q: FailureQueue,
{
    fn from_parts(transport: T, queue: Q, breaker: CircuitBreaker, retry: RetryExecutor) -> Self {
        Self { inner: Arc::new(Inner { transport, queue, breaker, retry }) }
    }

    /// Send a payment through the breaker and the retry loop.
    ///
    /// On success the transport's response is returned unchanged and nothing is queued. Any
    /// terminal failure (breaker rejection, non-retryable rejection, exhausted retries) puts the
    /// request in the failure queue exactly once before the error is returned.
    pub async fn process_payment(
        &self,
        request: PaymentRequest,
    ) -> Result<PaymentResponse, GatewayError> {
        let inner = &*self.inner;
        tracing::info!(
            order_id = %request.order_id(),
            amount = request.amount(),
            currency = %request.currency(),
            "processing payment"
        );

        let result = inner
            .breaker
            .execute(|| inner.retry.execute_with_retry(&request, &inner.transport))
            .await;

        match result {
            Ok(response) => Ok(response),
            Err(err) => {
                let error = GatewayError::from(err);
                tracing::error!(
                    order_id = %request.order_id(),
                    error = %error,
                    "payment failed, adding to failure queue"
                );
                inner.queue.enqueue(request).await;
                Err(error)
            }
        }
    }

    /// Replay every queued payment once, in queue order.
    ///
    /// The queue is drained before the first replay, so payments that fail again come back as new
    /// entries and this pass always terminates. Individual failures never abort the pass.
    pub async fn retry_failed_payments(&self) -> ReplaySummary {
        let pending = self.inner.queue.drain_all().await;
        if pending.is_empty() {
            tracing::info!("failure queue empty, nothing to replay");
            return ReplaySummary::default();
        }

        tracing::info!(count = pending.len(), "replaying failed payments");
        let mut summary = ReplaySummary { attempted: pending.len(), ..ReplaySummary::default() };

        for request in pending {
            let order_id = request.order_id().to_owned();
            match self.process_payment(request).await {
                Ok(response) => {
                    summary.succeeded += 1;
                    tracing::info!(
                        order_id = %order_id,
                        transaction_id = %response.transaction_id,
                        "queued payment succeeded"
                    );
                }
                Err(error) => {
                    summary.requeued += 1;
                    tracing::warn!(order_id = %order_id, error = %error, "queued payment failed again");
                }
            }
        }

        tracing::info!(
            attempted = summary.attempted,
            succeeded = summary.succeeded,
            requeued = summary.requeued,
            "replay pass complete"
        );
        summary
    }

    /// Current breaker state and queue size. Has no side effects.
    pub async fn status(&self) -> GatewayStatus {
        let snapshot = self.inner.breaker.snapshot();
        GatewayStatus {
            state: snapshot.state,
            queued_payments: self.inner.queue.len().await,
            failure_count: snapshot.failure_count,
        }
    }

    pub fn circuit_breaker(&self) -> &CircuitBreaker {
        &self.inner.breaker
    }

    pub fn retry_executor(&self) -> &RetryExecutor {
        &self.inner.retry
    }

    pub fn failure_queue(&self) -> &Q {
        &self.inner.queue
    }

    pub fn transport(&self) -> &T {
        &self.inner.transport
    }
}

impl<T, Q> tower_service::Service<PaymentRequest> for PaymentGateway<T, Q>
where
    T: PaymentTransport + 'static,
    Q: FailureQueue + 'static,
{
    type Response = PaymentResponse;
    type Error = GatewayError;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, request: PaymentRequest) -> Self::Future {
        let gateway = self.clone();
        Box::pin(async move { gateway.process_payment(request).await })
    }
}

/// Builder for [`PaymentGateway`].
pub struct PaymentGatewayBuilder<T, Q = InMemoryFailureQueue> {
    transport: T,
    queue: Q,
    config: GatewayConfig,
    jitter: Jitter,
    sleeper: Arc<dyn Sleeper>,
    clock: Arc<dyn Clock>,
}

impl<T> PaymentGatewayBuilder<T> {
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            queue: InMemoryFailureQueue::new(),
            config: GatewayConfig::default(),
            jitter: Jitter::default(),
            sleeper: Arc::new(TokioSleeper),
            clock: Arc::new(MonotonicClock::default()),
        }
    }
}

impl<T, Q> PaymentGatewayBuilder<T, Q> {
    /// Replace both retry and breaker settings.
    pub fn config(mut self, config: GatewayConfig) -> Self {
        self.config = config;
        self
    }

    pub fn retry(mut self, retry: RetryConfig) -> Self {
        self.config.retry = retry;
        self
    }

    pub fn circuit_breaker(mut self, circuit_breaker: CircuitBreakerConfig) -> Self {
        self.config.circuit_breaker = circuit_breaker;
        self
    }

    pub fn jitter(mut self, jitter: Jitter) -> Self {
        self.jitter = jitter;
        self
    }

    /// Sleeper used for backoff waits. Tests use `InstantSleeper` or `TrackingSleeper`.
    pub fn sleeper<S>(mut self, sleeper: S) -> Self
    where
        S: Sleeper + 'static,
    {
        self.sleeper = Arc::new(sleeper);
        self
    }

    /// Clock used by the breaker's reset timer.
    pub fn clock<C>(mut self, clock: C) -> Self
    where
        C: Clock + 'static,
    {
        self.clock = Arc::new(clock);
        self
    }

    /// Swap the failure queue, e.g. for a durable store.
    pub fn queue<Q2>(self, queue: Q2) -> PaymentGatewayBuilder<T, Q2> {
        PaymentGatewayBuilder {
            transport: self.transport,
            queue,
            config: self.config,
            jitter: self.jitter,
            sleeper: self.sleeper,
            clock: self.clock,
        }
    }

    /// # Errors
    /// `ConfigError` when the retry or breaker settings are invalid.
    pub fn build(self) -> Result<PaymentGateway<T, Q>, ConfigError>
    where
        T: PaymentTransport,
        Q: FailureQueue,
    {
        self.config.validate()?;

        let retry = RetryExecutor::new(&self.config.retry)
            .with_jitter(self.jitter)
            .with_shared_sleeper(self.sleeper);
        let breaker = CircuitBreaker::new(self.config.circuit_breaker).with_shared_clock(self.clock);

        Ok(PaymentGateway::from_parts(self.transport, self.queue, breaker, retry))
    }
}
