//! Failure classification for retry decisions.
//!
//! Classification is a pure function of a [`FailureSignal`], so any transport can plug in by
//! describing its errors through [`Classify`] without the retry executor knowing the concrete
//! error type.
//!
//! Rules, in order:
//! 1. timeout / aborted connection → retryable
//! 2. status in `[400, 500)` other than 408 and 429 → non-retryable
//! 3. status 408, 429 or `>= 500` → retryable
//! 4. nothing received at all → retryable
//! 5. anything else → retryable (unknown failures may be transient)

/// Transport-agnostic description of one failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FailureSignal {
    /// The call timed out or the connection was aborted.
    pub timed_out: bool,
    /// Status code, if the remote answered.
    pub status: Option<u16>,
    /// Whether any response arrived.
    pub response_received: bool,
}

impl FailureSignal {
    pub fn timeout() -> Self {
        Self { timed_out: true, status: None, response_received: false }
    }

    pub fn status(status: u16) -> Self {
        Self { timed_out: false, status: Some(status), response_received: true }
    }

    pub fn no_response() -> Self {
        Self::default()
    }
}

/// Whether another attempt may help.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Retryability {
    Retryable,
    NonRetryable,
}

impl Retryability {
    pub fn is_retryable(self) -> bool {
        matches!(self, Retryability::Retryable)
    }
}

/// Classify a single failed attempt.
pub fn classify(signal: &FailureSignal) -> Retryability {
    if signal.timed_out {
        return Retryability::Retryable;
    }
    match signal.status {
        Some(408) | Some(429) => Retryability::Retryable,
        Some(status) if (400..500).contains(&status) => Retryability::NonRetryable,
        // server errors, no response at all, or something unrecognized
        Some(_) | None => Retryability::Retryable,
    }
}

/// Errors that can describe themselves as a [`FailureSignal`].
pub trait Classify {
    fn failure_signal(&self) -> FailureSignal;

    fn retryability(&self) -> Retryability {
        classify(&self.failure_signal())
    }
}
