mod common;

use common::test_helpers::{init_tracing, payment, FailingTransport, ScriptedTransport};
use paygate::{
    CircuitBreakerConfig, CircuitState, GatewayError, InstantSleeper, Jitter, PaymentGateway,
    ReplaySummary, RetryConfig, ServiceTransport, TrackingSleeper, TransportError,
};
use std::sync::Arc;
use std::time::Duration;

fn retry_config() -> RetryConfig {
    RetryConfig::new(3, Duration::from_millis(1000), Duration::from_millis(10_000), 2.0).unwrap()
}

fn gateway(transport: Arc<ScriptedTransport>) -> PaymentGateway<Arc<ScriptedTransport>> {
    PaymentGateway::builder(transport)
        .retry(retry_config())
        .sleeper(InstantSleeper)
        .build()
        .unwrap()
}

#[tokio::test]
async fn two_aborted_connections_then_success() {
    init_tracing();
    let transport = ScriptedTransport::with_failures([
        TransportError::timeout("ECONNABORTED"),
        TransportError::timeout("ECONNABORTED"),
    ]);
    let sleeper = TrackingSleeper::new();
    let gw = PaymentGateway::builder(transport.clone())
        .retry(retry_config())
        .jitter(Jitter::None)
        .sleeper(sleeper.clone())
        .build()
        .unwrap();

    let response = gw.process_payment(payment("order_123")).await.unwrap();

    assert_eq!(response.transaction_id, "txn_order_123");
    assert_eq!(transport.calls(), 3);
    assert_eq!(sleeper.calls(), vec![Duration::from_millis(1000), Duration::from_millis(2000)]);
    assert_eq!(gw.status().await.queued_payments, 0);
}

#[tokio::test]
async fn success_on_nth_attempt_makes_n_calls() {
    for n in 1..=4 {
        let transport = ScriptedTransport::new();
        transport.push_failures(TransportError::status(503, "Service Unavailable"), n - 1);
        let gw = gateway(transport.clone());

        assert!(gw.process_payment(payment("order")).await.is_ok(), "n = {n}");
        assert_eq!(transport.calls(), n);
        assert_eq!(gw.status().await.queued_payments, 0);
    }
}

#[tokio::test]
async fn all_retryable_failures_exhaust_budget_and_queue_once() {
    let transport = ScriptedTransport::new();
    transport.push_failures(TransportError::no_response("socket hang up"), 4);
    let gw = gateway(transport.clone());

    let err = gw.process_payment(payment("order_1")).await.unwrap_err();

    assert!(matches!(err, GatewayError::ExhaustedRetries { attempts: 4, .. }));
    assert_eq!(err.last_failure(), Some(&TransportError::no_response("socket hang up")));
    assert!(err.is_retryable_later());
    assert_eq!(transport.calls(), 4);
    assert_eq!(gw.status().await.queued_payments, 1);
}

#[tokio::test]
async fn bad_request_is_not_retried() {
    let transport = ScriptedTransport::with_failures([TransportError::status(400, "Bad Request")]);
    let sleeper = TrackingSleeper::new();
    let gw = PaymentGateway::builder(transport.clone()).sleeper(sleeper.clone()).build().unwrap();

    let err = gw.process_payment(payment("order_1")).await.unwrap_err();

    assert!(err.is_client_error());
    assert_eq!(transport.calls(), 1);
    assert_eq!(sleeper.count(), 0, "no backoff computed");
    assert_eq!(gw.status().await.queued_payments, 1);
}

#[tokio::test]
async fn five_gateway_timeouts_open_the_circuit() {
    let transport = FailingTransport::new(TransportError::status(504, "Gateway Timeout"));
    let gw = PaymentGateway::builder(transport.clone())
        .retry(retry_config())
        .circuit_breaker(CircuitBreakerConfig::new(5, Duration::from_secs(60)).unwrap())
        .sleeper(InstantSleeper)
        .build()
        .unwrap();

    for i in 0..5 {
        let err = gw.process_payment(payment(&format!("order_{i}"))).await.unwrap_err();
        assert!(matches!(err, GatewayError::ExhaustedRetries { attempts: 4, .. }));
    }

    let status = gw.status().await;
    assert_eq!(status.state, CircuitState::Open);
    assert_eq!(status.queued_payments, 5);
    assert_eq!(transport.calls(), 20);

    // immediately after: fast-fail, no transport call, still queued
    let err = gw.process_payment(payment("order_5")).await.unwrap_err();
    assert!(err.is_circuit_open());
    assert_eq!(transport.calls(), 20);
    assert_eq!(gw.status().await.queued_payments, 6);
}

#[tokio::test]
async fn every_request_has_exactly_one_outcome() {
    let transport = ScriptedTransport::new();
    transport.push_success();
    transport.push_failure(TransportError::status(404, "Not Found"));
    transport.push_failures(TransportError::timeout("ETIMEDOUT"), 4);
    transport.push_failure(TransportError::status(500, "Internal Server Error"));
    let gw = gateway(transport.clone());

    let mut ok = 0;
    let mut failed = 0;
    for i in 0..4 {
        match gw.process_payment(payment(&format!("order_{i}"))).await {
            Ok(_) => ok += 1,
            Err(_) => failed += 1,
        }
    }

    assert_eq!(ok + failed, 4);
    assert_eq!(ok, 2);
    assert_eq!(failed, 2);
    assert_eq!(gw.status().await.queued_payments, failed);
}

#[tokio::test]
async fn single_attempt_budget_keeps_failure_kind() {
    let transport = ScriptedTransport::with_failures([
        TransportError::timeout("ECONNABORTED"),
        TransportError::no_response("ECONNRESET"),
    ]);
    let gw = PaymentGateway::builder(transport.clone())
        .retry(RetryConfig::new(0, Duration::from_millis(1), Duration::from_millis(1), 2.0).unwrap())
        .build()
        .unwrap();

    let err = gw.process_payment(payment("a")).await.unwrap_err();
    assert_eq!(err, GatewayError::Timeout { message: "ECONNABORTED".into() });
    assert!(err.is_timeout());

    let err = gw.process_payment(payment("b")).await.unwrap_err();
    assert_eq!(err, GatewayError::Transport { message: "ECONNRESET".into() });
    assert_eq!(transport.calls(), 2);
}

#[tokio::test]
async fn replay_on_empty_queue_is_a_no_op() {
    let transport = ScriptedTransport::new();
    let gw = gateway(transport.clone());

    let summary = gw.retry_failed_payments().await;

    assert_eq!(summary, ReplaySummary::default());
    assert_eq!(transport.calls(), 0);
    assert_eq!(gw.status().await.queued_payments, 0);
}

#[tokio::test]
async fn replay_resubmits_in_queue_order() {
    let transport = ScriptedTransport::with_failures([
        TransportError::status(409, "Conflict"),
        TransportError::status(409, "Conflict"),
        TransportError::status(409, "Conflict"),
    ]);
    let gw = gateway(transport.clone());
    for id in ["first", "second", "third"] {
        let _ = gw.process_payment(payment(id)).await;
    }

    let summary = gw.retry_failed_payments().await;

    assert_eq!(summary, ReplaySummary { attempted: 3, succeeded: 3, requeued: 0 });
    assert_eq!(&transport.seen_orders()[3..], ["first", "second", "third"]);
    assert_eq!(gw.status().await.queued_payments, 0);
}

#[tokio::test]
async fn replay_keeps_requeueing_across_passes() {
    let transport = FailingTransport::new(TransportError::status(422, "Unprocessable"));
    let gw = PaymentGateway::builder(transport.clone())
        .circuit_breaker(CircuitBreakerConfig::disabled())
        .build()
        .unwrap();
    let _ = gw.process_payment(payment("stuck")).await;

    for pass in 1..=3 {
        let summary = gw.retry_failed_payments().await;
        assert_eq!(summary, ReplaySummary { attempted: 1, succeeded: 0, requeued: 1 }, "pass {pass}");
        assert_eq!(gw.status().await.queued_payments, 1);
    }
    assert_eq!(transport.calls(), 4);
}

#[tokio::test]
async fn replay_while_open_requeues_without_calling_out() {
    let transport = FailingTransport::new(TransportError::status(503, "Service Unavailable"));
    let gw = PaymentGateway::builder(transport.clone())
        .retry(RetryConfig::new(0, Duration::from_millis(1), Duration::from_millis(1), 2.0).unwrap())
        .circuit_breaker(CircuitBreakerConfig::new(2, Duration::from_secs(300)).unwrap())
        .build()
        .unwrap();
    let _ = gw.process_payment(payment("a")).await;
    let _ = gw.process_payment(payment("b")).await;
    assert_eq!(gw.status().await.state, CircuitState::Open);

    let summary = gw.retry_failed_payments().await;

    assert_eq!(summary, ReplaySummary { attempted: 2, succeeded: 0, requeued: 2 });
    assert_eq!(transport.calls(), 2);
    assert_eq!(gw.status().await.queued_payments, 2);
}

#[tokio::test]
async fn tower_service_transport_plugs_in() {
    let svc = tower::service_fn(|req: paygate::PaymentRequest| async move {
        if req.order_id() == "declined" {
            Err(TransportError::status(402, "Payment Required"))
        } else {
            Ok(paygate::PaymentResponse::new("txn_svc", paygate::PaymentStatus::Pending))
        }
    });
    let gw = PaymentGateway::builder(ServiceTransport::new(svc)).build().unwrap();

    let ok = gw.process_payment(payment("accepted")).await.unwrap();
    assert_eq!(ok.status, paygate::PaymentStatus::Pending);

    let err = gw.process_payment(payment("declined")).await.unwrap_err();
    assert_eq!(err, GatewayError::Client { status: 402, reason: "Payment Required".into() });
    assert_eq!(gw.status().await.queued_payments, 1);
}
