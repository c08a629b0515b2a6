//! Payment request and response types passed through the gateway.
//!
//! A [`PaymentRequest`] is immutable once built: fields are private and only readable through
//! accessors. Validation mirrors what the inbound handler checks before a request ever reaches the
//! resilience layer, so anything that gets this far is well-formed.

use std::collections::BTreeMap;
use std::fmt;

/// Reasons a payment request is rejected at construction time.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum InvalidPayment {
    /// Amount must be a finite number greater than zero.
    #[error("amount must be a positive finite number (got {0})")]
    Amount(f64),
    /// Currency must be a three-letter alphabetic code.
    #[error("currency must be a 3-letter code (got {0:?})")]
    Currency(String),
    /// A required identifier was empty.
    #[error("{0} must not be empty")]
    MissingField(&'static str),
}

/// A single outbound payment.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub struct PaymentRequest {
    amount: f64,
    currency: String,
    customer_id: String,
    order_id: String,
    #[cfg_attr(feature = "serde", serde(default, skip_serializing_if = "Option::is_none"))]
    metadata: Option<BTreeMap<String, String>>,
}

impl PaymentRequest {
    /// Build a validated request. The currency code is normalized to upper case.
    ///
    /// # Examples
    /// ```
    /// use paygate::PaymentRequest;
    /// let req = PaymentRequest::new(100.0, "usd", "cust_1", "order_1").unwrap();
    /// assert_eq!(req.currency(), "USD");
    /// ```
    pub fn new(
        amount: f64,
        currency: impl Into<String>,
        customer_id: impl Into<String>,
        order_id: impl Into<String>,
    ) -> Result<Self, InvalidPayment> {
        if !amount.is_finite() || amount <= 0.0 {
            return Err(InvalidPayment::Amount(amount));
        }

        let currency = currency.into();
        if currency.len() != 3 || !currency.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(InvalidPayment::Currency(currency));
        }

        let customer_id = customer_id.into();
        if customer_id.trim().is_empty() {
            return Err(InvalidPayment::MissingField("customer_id"));
        }

        let order_id = order_id.into();
        if order_id.trim().is_empty() {
            return Err(InvalidPayment::MissingField("order_id"));
        }

        Ok(Self {
            amount,
            currency: currency.to_ascii_uppercase(),
            customer_id,
            order_id,
            metadata: None,
        })
    }

    /// Attach opaque metadata, consuming the request.
    pub fn with_metadata(mut self, metadata: BTreeMap<String, String>) -> Self {
        self.metadata = Some(metadata);
        self
    }

    pub fn amount(&self) -> f64 {
        self.amount
    }

    pub fn currency(&self) -> &str {
        &self.currency
    }

    pub fn customer_id(&self) -> &str {
        &self.customer_id
    }

    /// Order identifier; logically unique per request but never deduplicated by the gateway.
    pub fn order_id(&self) -> &str {
        &self.order_id
    }

    pub fn metadata(&self) -> Option<&BTreeMap<String, String>> {
        self.metadata.as_ref()
    }
}

/// Outcome reported by the remote payment service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum PaymentStatus {
    Success,
    Pending,
    Failed,
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PaymentStatus::Success => write!(f, "success"),
            PaymentStatus::Pending => write!(f, "pending"),
            PaymentStatus::Failed => write!(f, "failed"),
        }
    }
}

/// Response returned by the transport and passed through unchanged on success.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub struct PaymentResponse {
    pub transaction_id: String,
    pub status: PaymentStatus,
    #[cfg_attr(feature = "serde", serde(default, skip_serializing_if = "Option::is_none"))]
    pub message: Option<String>,
}

impl PaymentResponse {
    pub fn new(transaction_id: impl Into<String>, status: PaymentStatus) -> Self {
        Self { transaction_id: transaction_id.into(), status, message: None }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}
