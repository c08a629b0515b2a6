//! Convenient re-exports for common paygate types.
pub use crate::{
    backoff::{BackoffPolicy, RetryConfig},
    circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitState},
    config::GatewayConfig,
    error::{ConfigError, GatewayError, ResilienceError},
    gateway::{GatewayStatus, PaymentGateway, ReplaySummary},
    jitter::Jitter,
    payment::{PaymentRequest, PaymentResponse, PaymentStatus},
    queue::{FailureQueue, InMemoryFailureQueue},
    retry::RetryExecutor,
    transport::{PaymentTransport, TransportError},
};
