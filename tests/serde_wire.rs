#![cfg(feature = "serde")]

use paygate::{
    CircuitState, GatewayStatus, PaymentRequest, PaymentResponse, PaymentStatus, ReplaySummary,
};
use serde_json::json;

#[test]
fn request_uses_camel_case_fields() {
    let request = PaymentRequest::new(100.0, "USD", "cust_123", "order_123").unwrap();
    let value = serde_json::to_value(&request).unwrap();
    assert_eq!(
        value,
        json!({ "amount": 100.0, "currency": "USD", "customerId": "cust_123", "orderId": "order_123" })
    );
}

#[test]
fn response_parses_remote_payload() {
    let payload = json!({ "transactionId": "txn_1", "status": "pending", "message": "queued at bank" });
    let response: PaymentResponse = serde_json::from_value(payload).unwrap();
    assert_eq!(
        response,
        PaymentResponse::new("txn_1", PaymentStatus::Pending).with_message("queued at bank")
    );
}

#[test]
fn status_reports_screaming_state() {
    let status = GatewayStatus { state: CircuitState::HalfOpen, queued_payments: 2, failure_count: 5 };
    assert_eq!(
        serde_json::to_value(status).unwrap(),
        json!({ "state": "HALF_OPEN", "queuedPayments": 2, "failureCount": 5 })
    );

    let summary = ReplaySummary { attempted: 3, succeeded: 1, requeued: 2 };
    assert_eq!(
        serde_json::to_value(summary).unwrap(),
        json!({ "attempted": 3, "succeeded": 1, "requeued": 2 })
    );
}
