//! Holding area for payments that failed terminally.
//!
//! The gateway only needs three operations, so the queue sits behind the small
//! [`FailureQueue`] trait and a durable store can replace [`InMemoryFailureQueue`] without
//! touching retry or breaker logic.

use crate::PaymentRequest;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// FIFO store of payments awaiting manual replay.
#[async_trait]
pub trait FailureQueue: Send + Sync {
    /// Append a payment at the back.
    async fn enqueue(&self, request: PaymentRequest);

    /// Atomically take every queued payment, oldest first, leaving the queue empty.
    async fn drain_all(&self) -> Vec<PaymentRequest>;

    async fn len(&self) -> usize;

    async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl<Q> FailureQueue for Arc<Q>
where
    Q: FailureQueue + ?Sized,
{
    async fn enqueue(&self, request: PaymentRequest) {
        (**self).enqueue(request).await
    }

    async fn drain_all(&self) -> Vec<PaymentRequest> {
        (**self).drain_all().await
    }

    async fn len(&self) -> usize {
        (**self).len().await
    }
}

/// Unbounded in-process queue. Contents are lost when the process exits.
///
/// Clones share the same storage.
#[derive(Debug, Clone, Default)]
pub struct InMemoryFailureQueue {
    entries: Arc<Mutex<VecDeque<PaymentRequest>>>,
}

impl InMemoryFailureQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of the queued payments without removing them.
    pub fn snapshot(&self) -> Vec<PaymentRequest> {
        self.lock().iter().cloned().collect()
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<PaymentRequest>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl FailureQueue for InMemoryFailureQueue {
    async fn enqueue(&self, request: PaymentRequest) {
        let order_id = request.order_id().to_owned();
        let size = {
            let mut entries = self.lock();
            entries.push_back(request);
            entries.len()
        };
        tracing::warn!(order_id = %order_id, queue_size = size, "payment added to failure queue");
    }

    async fn drain_all(&self) -> Vec<PaymentRequest> {
        std::mem::take(&mut *self.lock()).into()
    }

    async fn len(&self) -> usize {
        self.lock().len()
    }
}
