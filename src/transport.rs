//! The outbound call the gateway protects.
//!
//! The actual HTTP client lives outside this crate. Anything that can send a
//! [`PaymentRequest`] and report a [`TransportError`] can be plugged in, either by implementing
//! [`PaymentTransport`] directly or by wrapping a `tower::Service` in [`ServiceTransport`].

use crate::classify::{Classify, FailureSignal};
use crate::{PaymentRequest, PaymentResponse};
use async_trait::async_trait;
use std::sync::Arc;
use tower::{Service, ServiceExt};

/// Failure reported by the transport for a single attempt.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    /// The call timed out or the connection was aborted.
    #[error("request timed out: {message}")]
    Timeout { message: String },
    /// The remote answered with an error status.
    #[error("payment gateway error: {status} - {reason}")]
    Status { status: u16, reason: String },
    /// The request was sent but nothing came back.
    #[error("no response received from payment gateway: {message}")]
    NoResponse { message: String },
    /// Anything the transport could not categorize.
    #[error("transport failure: {message}")]
    Other { message: String },
}

impl TransportError {
    pub fn timeout(message: impl Into<String>) -> Self {
        Self::Timeout { message: message.into() }
    }

    pub fn status(status: u16, reason: impl Into<String>) -> Self {
        Self::Status { status, reason: reason.into() }
    }

    pub fn no_response(message: impl Into<String>) -> Self {
        Self::NoResponse { message: message.into() }
    }

    pub fn other(message: impl Into<String>) -> Self {
        Self::Other { message: message.into() }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }

    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn response_received(&self) -> bool {
        matches!(self, Self::Status { .. })
    }
}

impl Classify for TransportError {
    fn failure_signal(&self) -> FailureSignal {
        match self {
            Self::Timeout { .. } => FailureSignal::timeout(),
            Self::Status { status, .. } => FailureSignal::status(*status),
            Self::NoResponse { .. } => FailureSignal::no_response(),
            // unknown: no status, and we cannot claim nothing arrived
            Self::Other { .. } => {
                FailureSignal { timed_out: false, status: None, response_received: true }
            }
        }
    }
}

/// Sends one payment to the remote service.
///
/// Implementations enforce their own request timeout and report it as
/// [`TransportError::Timeout`]; the gateway never aborts an in-flight call.
#[async_trait]
pub trait PaymentTransport: Send + Sync {
    async fn send(&self, request: &PaymentRequest) -> Result<PaymentResponse, TransportError>;
}

#[async_trait]
impl<T> PaymentTransport for Arc<T>
where
    T: PaymentTransport + ?Sized,
{
    async fn send(&self, request: &PaymentRequest) -> Result<PaymentResponse, TransportError> {
        (**self).send(request).await
    }
}

/// Adapts a `tower::Service` into a [`PaymentTransport`].
///
/// The service is cloned per call, so middleware such as rate limits or load balancing can sit
/// underneath the gateway.
#[derive(Debug, Clone)]
pub struct ServiceTransport<S> {
    inner: S,
}

impl<S> ServiceTransport<S> {
    pub fn new(inner: S) -> Self {
        Self { inner }
    }

    pub fn into_inner(self) -> S {
        self.inner
    }
}

#[async_trait]
impl<S> PaymentTransport for ServiceTransport<S>
where
    S: Service<PaymentRequest, Response = PaymentResponse, Error = TransportError>
        + Clone
        + Send
        + Sync
        + 'static,
    S::Future: Send,
{
    async fn send(&self, request: &PaymentRequest) -> Result<PaymentResponse, TransportError> {
        self.inner.clone().oneshot(request.clone()).await
    }
}
