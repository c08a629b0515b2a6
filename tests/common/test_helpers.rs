use async_trait::async_trait;
use paygate::{PaymentRequest, PaymentResponse, PaymentStatus, PaymentTransport, TransportError};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Transport that plays back queued outcomes in order and succeeds once the script runs out.
#[derive(Debug, Default)]
pub struct ScriptedTransport {
    outcomes: Mutex<VecDeque<Result<(), TransportError>>>,
    calls: AtomicUsize,
    seen: Mutex<Vec<String>>,
}

impl ScriptedTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn with_failures(failures: impl IntoIterator<Item = TransportError>) -> Arc<Self> {
        let transport = Self::new();
        for failure in failures {
            transport.push_failure(failure);
        }
        transport
    }

    pub fn push_failure(&self, failure: TransportError) {
        self.outcomes.lock().unwrap().push_back(Err(failure));
    }

    pub fn push_failures(&self, failure: TransportError, times: usize) {
        for _ in 0..times {
            self.push_failure(failure.clone());
        }
    }

    pub fn push_success(&self) {
        self.outcomes.lock().unwrap().push_back(Ok(()));
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Order ids in the order the transport saw them.
    pub fn seen_orders(&self) -> Vec<String> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl PaymentTransport for ScriptedTransport {
    async fn send(&self, request: &PaymentRequest) -> Result<PaymentResponse, TransportError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.seen.lock().unwrap().push(request.order_id().to_owned());
        let next = self.outcomes.lock().unwrap().pop_front().unwrap_or(Ok(()));
        next.map(|()| {
            PaymentResponse::new(format!("txn_{}", request.order_id()), PaymentStatus::Success)
        })
    }
}

/// Transport that always fails with the same error.
#[derive(Debug)]
pub struct FailingTransport {
    failure: TransportError,
    calls: AtomicUsize,
}

impl FailingTransport {
    pub fn new(failure: TransportError) -> Arc<Self> {
        Arc::new(Self { failure, calls: AtomicUsize::new(0) })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PaymentTransport for FailingTransport {
    async fn send(&self, _request: &PaymentRequest) -> Result<PaymentResponse, TransportError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::task::yield_now().await;
        Err(self.failure.clone())
    }
}

pub fn payment(order_id: &str) -> PaymentRequest {
    PaymentRequest::new(100.0, "USD", "cust_123", order_id).unwrap()
}

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}
