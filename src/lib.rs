#![forbid(unsafe_code)]
#![deny(warnings)]
#![cfg_attr(not(test), deny(clippy::all))]

//! # paygate
//!
//! Resilience core for an outbound payment call: bounded retries with exponential backoff and
//! jitter, a three-state circuit breaker, and an in-memory failure queue for manual replay.
//!
//! ## Features
//!
//! - **Retry executor** with per-attempt failure classification (4xx stops, 408/429/5xx retry)
//! - **Circuit breaker** with half-open recovery, safe under concurrent callers
//! - **Failure queue** behind a small trait so a durable store can be swapped in
//! - **Deterministic testing** via injectable [`Sleeper`] and [`Clock`]
//! - **Tower integration**: wrap a `tower::Service` as the transport, or call the gateway as one
//!
//! ## Quick Start
//!
//! ```rust
//! use async_trait::async_trait;
//! use paygate::prelude::*;
//!
//! struct HttpClient;
//!
//! #[async_trait]
//! impl PaymentTransport for HttpClient {
//!     async fn send(&self, _req: &PaymentRequest) -> Result<PaymentResponse, TransportError> {
//!         Err(TransportError::status(400, "Bad Request"))
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() {
//!     let gateway = PaymentGateway::builder(HttpClient).build().unwrap();
//!     let request = PaymentRequest::new(49.99, "usd", "cust_1", "order_1").unwrap();
//!
//!     let err = gateway.process_payment(request).await.unwrap_err();
//!     assert!(err.is_client_error());
//!     assert_eq!(gateway.status().await.queued_payments, 1);
//! }
//! ```

pub mod backoff;
pub mod circuit_breaker;
pub mod classify;
pub mod clock;
pub mod config;
pub mod error;
pub mod gateway;
pub mod jitter;
pub mod payment;
pub mod prelude;
pub mod queue;
pub mod retry;
pub mod sleeper;
pub mod transport;

// Re-exports
pub use backoff::{BackoffPolicy, RetryConfig};
pub use circuit_breaker::{BreakerSnapshot, CircuitBreaker, CircuitBreakerConfig, CircuitState};
pub use classify::{classify, Classify, FailureSignal, Retryability};
pub use clock::{Clock, ManualClock, MonotonicClock};
pub use config::GatewayConfig;
pub use error::{ConfigError, GatewayError, ResilienceError};
pub use gateway::{GatewayStatus, PaymentGateway, PaymentGatewayBuilder, ReplaySummary};
pub use jitter::Jitter;
pub use payment::{InvalidPayment, PaymentRequest, PaymentResponse, PaymentStatus};
pub use queue::{FailureQueue, InMemoryFailureQueue};
pub use retry::RetryExecutor;
pub use sleeper::{InstantSleeper, Sleeper, TokioSleeper, TrackingSleeper};
pub use transport::{PaymentTransport, ServiceTransport, TransportError};
