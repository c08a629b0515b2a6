mod common;

use common::test_helpers::{payment, ScriptedTransport};
use paygate::{
    CircuitBreakerConfig, CircuitState, GatewayError, InstantSleeper, ManualClock, PaymentGateway,
    RetryConfig, TransportError,
};
use std::sync::Arc;
use std::time::Duration;

const RESET: Duration = Duration::from_secs(60);

fn gateway(
    transport: Arc<ScriptedTransport>,
    clock: ManualClock,
) -> PaymentGateway<Arc<ScriptedTransport>> {
    PaymentGateway::builder(transport)
        .retry(RetryConfig::new(0, Duration::from_millis(100), Duration::from_millis(100), 2.0).unwrap())
        .circuit_breaker(CircuitBreakerConfig::new(3, RESET).unwrap())
        .clock(clock)
        .sleeper(InstantSleeper)
        .build()
        .unwrap()
}

async fn trip(gw: &PaymentGateway<Arc<ScriptedTransport>>, transport: &ScriptedTransport) {
    transport.push_failures(TransportError::status(502, "Bad Gateway"), 3);
    for i in 0..3 {
        let _ = gw.process_payment(payment(&format!("trip_{i}"))).await;
    }
    assert_eq!(gw.status().await.state, CircuitState::Open);
}

#[tokio::test]
async fn rejects_until_reset_timeout_elapses() {
    let clock = ManualClock::new();
    let transport = ScriptedTransport::new();
    let gw = gateway(transport.clone(), clock.clone());
    trip(&gw, &transport).await;
    let calls_when_opened = transport.calls();

    clock.advance(RESET - Duration::from_millis(1));
    let err = gw.process_payment(payment("early")).await.unwrap_err();

    assert_eq!(
        err,
        GatewayError::CircuitOpen { failure_count: 3, retry_after: Duration::from_millis(1) }
    );
    assert_eq!(transport.calls(), calls_when_opened);
    assert_eq!(gw.status().await.failure_count, 3);
}

#[tokio::test]
async fn successful_trial_closes_and_resets_count() {
    let clock = ManualClock::new();
    let transport = ScriptedTransport::new();
    let gw = gateway(transport.clone(), clock.clone());
    trip(&gw, &transport).await;

    clock.advance(RESET);
    let response = gw.process_payment(payment("trial")).await.unwrap();

    assert_eq!(response.transaction_id, "txn_trial");
    let status = gw.status().await;
    assert_eq!(status.state, CircuitState::Closed);
    assert_eq!(status.failure_count, 0);
}

#[tokio::test]
async fn failed_trial_reopens_and_restarts_timer() {
    let clock = ManualClock::new();
    let transport = ScriptedTransport::new();
    let gw = gateway(transport.clone(), clock.clone());
    trip(&gw, &transport).await;

    clock.advance(RESET);
    transport.push_failure(TransportError::timeout("ECONNABORTED"));
    let err = gw.process_payment(payment("trial")).await.unwrap_err();
    assert!(err.is_timeout());
    assert_eq!(gw.status().await.state, CircuitState::Open);

    // the timer restarted at the trial failure
    clock.advance(RESET / 2);
    assert!(gw.process_payment(payment("too_soon")).await.unwrap_err().is_circuit_open());

    clock.advance(RESET / 2);
    assert!(gw.process_payment(payment("second_trial")).await.is_ok());
    assert_eq!(gw.status().await.state, CircuitState::Closed);
}

#[tokio::test]
async fn success_in_closed_state_resets_consecutive_count() {
    let clock = ManualClock::new();
    let transport = ScriptedTransport::new();
    let gw = gateway(transport.clone(), clock);

    transport.push_failures(TransportError::status(500, "boom"), 2);
    let _ = gw.process_payment(payment("a")).await;
    let _ = gw.process_payment(payment("b")).await;
    assert_eq!(gw.status().await.failure_count, 2);

    gw.process_payment(payment("c")).await.unwrap();
    assert_eq!(gw.status().await.failure_count, 0);

    transport.push_failures(TransportError::status(500, "boom"), 2);
    let _ = gw.process_payment(payment("d")).await;
    let _ = gw.process_payment(payment("e")).await;
    assert_eq!(gw.status().await.state, CircuitState::Closed, "failures were not consecutive");
}

#[tokio::test]
async fn replay_after_recovery_drains_queue() {
    let clock = ManualClock::new();
    let transport = ScriptedTransport::new();
    let gw = gateway(transport.clone(), clock.clone());
    trip(&gw, &transport).await;
    let _ = gw.process_payment(payment("rejected")).await;
    assert_eq!(gw.status().await.queued_payments, 4);

    clock.advance(RESET);
    let summary = gw.retry_failed_payments().await;

    assert_eq!(summary.attempted, 4);
    assert_eq!(summary.succeeded, 4);
    assert_eq!(gw.status().await.queued_payments, 0);
    assert_eq!(gw.status().await.state, CircuitState::Closed);
}
