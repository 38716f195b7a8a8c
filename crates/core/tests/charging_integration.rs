//! Integration tests for the charge service
//!
//! Drives the full retry loop against a scripted transport that counts
//! calls, covering breaker gating, timeout exhaustion, rate-limit handling,
//! terminal client errors and caller cancellation. Time-dependent paths run
//! under tokio's paused clock so no test actually sleeps.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chargeguard_core::{
    ChargeService, HealthStatus, PaymentTransport, TransportError, TransportRequest,
    TransportResponse,
};
use chargeguard_domain::{
    ChargeRequest, ChargeResult, CircuitBreakerSettings, ClientConfig, FailureKind,
};
use rust_decimal::Decimal;
use tokio_util::sync::CancellationToken;

const OK_BODY: &str = r#"{"payment_id":"pay_123","status":"completed"}"#;

/// One scripted transport reply
enum Scripted {
    Status(u16, &'static str),
    Connection,
    TransportTimeout,
    /// Never resolves; forces the service-side timeout to fire
    Hang,
}

struct MockTransport {
    script: Mutex<VecDeque<Scripted>>,
    calls: AtomicU32,
}

impl MockTransport {
    fn new(script: Vec<Scripted>) -> Arc<Self> {
        Arc::new(Self { script: Mutex::new(script.into()), calls: AtomicU32::new(0) })
    }

    fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PaymentTransport for MockTransport {
    async fn send(&self, request: TransportRequest) -> Result<TransportResponse, TransportError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let next = self.script.lock().expect("script lock").pop_front().expect("script exhausted");
        match next {
            Scripted::Status(status, body) => {
                Ok(TransportResponse { status, body: body.to_string() })
            }
            Scripted::Connection => {
                Err(TransportError::Connection { message: "connection refused".to_string() })
            }
            Scripted::TransportTimeout => Err(TransportError::Timeout { elapsed: request.timeout }),
            Scripted::Hang => std::future::pending().await,
        }
    }
}

fn config(attempts: u32, threshold: u32) -> ClientConfig {
    ClientConfig {
        endpoint: "https://payments.test".to_string(),
        timeout_ms: 1_000,
        retry_attempts: attempts,
        retry_delay_ms: 10,
        backoff_multiplier: 2.0,
        jitter_ms: 0,
        circuit_breaker: CircuitBreakerSettings {
            failure_threshold: threshold,
            recovery_timeout_ms: 60_000,
        },
    }
}

fn request() -> ChargeRequest {
    ChargeRequest::new(Decimal::new(9999, 2), "USD", "card_visa_4242").expect("valid request")
}

#[tokio::test]
async fn first_attempt_success_records_one_call() {
    let transport = MockTransport::new(vec![Scripted::Status(200, OK_BODY)]);
    let service =
        ChargeService::new(transport.clone(), &config(3, 5)).expect("service should build");

    let result = service.charge(&request()).await.expect("charge should not fault");
    match result {
        ChargeResult::Success { payment_id, provider_response } => {
            assert_eq!(payment_id, "pay_123");
            assert_eq!(provider_response["status"], "completed");
        }
        other => panic!("expected success, got {other:?}"),
    }
    assert_eq!(transport.calls(), 1);
    assert_eq!(service.health_reporter().report().status, HealthStatus::Healthy);
}

#[tokio::test(start_paused = true)]
async fn three_timeouts_exhaust_attempts_and_count_failures() {
    let transport = MockTransport::new(vec![Scripted::Hang, Scripted::Hang, Scripted::Hang]);
    let service =
        ChargeService::new(transport.clone(), &config(3, 5)).expect("service should build");

    let result = service.charge(&request()).await.expect("charge should not fault");
    match result {
        ChargeResult::Timeout { elapsed } => assert!(elapsed >= Duration::from_secs(1)),
        other => panic!("expected timeout, got {other:?}"),
    }
    assert_eq!(transport.calls(), 3);

    let report = service.health_reporter().report();
    assert_eq!(report.breaker.consecutive_failures, 3);
    assert_eq!(report.status, HealthStatus::Healthy, "three failures stay under threshold 5");
}

#[tokio::test(start_paused = true)]
async fn four_timeouts_then_success_keeps_breaker_closed() {
    let transport = MockTransport::new(vec![
        Scripted::TransportTimeout,
        Scripted::TransportTimeout,
        Scripted::TransportTimeout,
        Scripted::TransportTimeout,
        Scripted::Status(200, OK_BODY),
    ]);
    let service =
        ChargeService::new(transport.clone(), &config(5, 5)).expect("service should build");

    let result = service.charge(&request()).await.expect("charge should not fault");
    assert!(result.is_success());
    assert_eq!(transport.calls(), 5);

    let report = service.health_reporter().report();
    assert_eq!(report.status, HealthStatus::Healthy);
    assert_eq!(report.breaker.consecutive_failures, 0, "success resets the counter");
}

#[tokio::test]
async fn open_breaker_short_circuits_without_network_calls() {
    let transport = MockTransport::new(vec![Scripted::Connection]);
    let service =
        ChargeService::new(transport.clone(), &config(1, 1)).expect("service should build");

    let first = service.charge(&request()).await.expect("charge should not fault");
    assert!(matches!(
        first,
        ChargeResult::Failure { kind: FailureKind::ConnectionError, .. }
    ));
    assert_eq!(transport.calls(), 1);
    assert_eq!(service.health_reporter().report().status, HealthStatus::Degraded);

    let second = service.charge(&request()).await.expect("charge should not fault");
    match second {
        ChargeResult::Failure { kind, message } => {
            assert_eq!(kind, FailureKind::CircuitOpen);
            assert_eq!(message, "service unavailable");
        }
        other => panic!("expected circuit-open failure, got {other:?}"),
    }
    assert_eq!(transport.calls(), 1, "rejected charge must not touch the transport");
}

#[tokio::test]
async fn client_error_is_terminal_on_first_attempt() {
    let transport =
        MockTransport::new(vec![Scripted::Status(400, r#"{"message":"invalid payment method"}"#)]);
    let service =
        ChargeService::new(transport.clone(), &config(3, 5)).expect("service should build");

    let result = service.charge(&request()).await.expect("charge should not fault");
    match result {
        ChargeResult::Failure { kind, message } => {
            assert_eq!(kind, FailureKind::ClientError);
            assert!(message.contains("invalid payment method"));
        }
        other => panic!("expected client error, got {other:?}"),
    }
    assert_eq!(transport.calls(), 1, "non-retryable rejection must not consume more attempts");
    assert_eq!(service.health_reporter().report().breaker.consecutive_failures, 1);
}

#[tokio::test(start_paused = true)]
async fn rate_limiting_retries_without_breaker_failures() {
    // Threshold 1: a single recorded failure would open the breaker for
    // good, so a healthy final state proves 429s were never counted.
    let transport = MockTransport::new(vec![
        Scripted::Status(429, r#"{"message":"too many requests"}"#),
        Scripted::Status(429, r#"{"message":"too many requests"}"#),
        Scripted::Status(200, OK_BODY),
    ]);
    let service =
        ChargeService::new(transport.clone(), &config(3, 1)).expect("service should build");

    let result = service.charge(&request()).await.expect("charge should not fault");
    assert!(result.is_success());
    assert_eq!(transport.calls(), 3);
    assert_eq!(service.health_reporter().report().status, HealthStatus::Healthy);
}

#[tokio::test(start_paused = true)]
async fn rate_limit_exhaustion_reports_max_retries() {
    let transport = MockTransport::new(vec![
        Scripted::Status(429, "{}"),
        Scripted::Status(429, "{}"),
    ]);
    let service =
        ChargeService::new(transport.clone(), &config(2, 5)).expect("service should build");

    let result = service.charge(&request()).await.expect("charge should not fault");
    match result {
        ChargeResult::Failure { kind, message } => {
            assert_eq!(kind, FailureKind::MaxRetriesExceeded);
            assert!(message.contains("rate limited"));
        }
        other => panic!("expected max-retries failure, got {other:?}"),
    }
    assert_eq!(transport.calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn server_errors_retry_until_exhausted() {
    let transport = MockTransport::new(vec![
        Scripted::Status(500, ""),
        Scripted::Status(502, ""),
        Scripted::Status(503, ""),
    ]);
    let service =
        ChargeService::new(transport.clone(), &config(3, 5)).expect("service should build");

    let result = service.charge(&request()).await.expect("charge should not fault");
    assert!(matches!(
        result,
        ChargeResult::Failure { kind: FailureKind::ServerError, .. }
    ));
    assert_eq!(transport.calls(), 3);
    assert_eq!(service.health_reporter().report().breaker.consecutive_failures, 3);
}

#[tokio::test(start_paused = true)]
async fn connection_errors_recover_before_attempts_run_out() {
    let transport = MockTransport::new(vec![
        Scripted::Connection,
        Scripted::Connection,
        Scripted::Status(200, OK_BODY),
    ]);
    let service =
        ChargeService::new(transport.clone(), &config(3, 5)).expect("service should build");

    let result = service.charge(&request()).await.expect("charge should not fault");
    assert!(result.is_success());
    assert_eq!(transport.calls(), 3);
}

#[tokio::test(start_paused = true)]
async fn malformed_success_body_is_retried() {
    let transport = MockTransport::new(vec![
        Scripted::Status(200, r#"{"status":"ok but no id"}"#),
        Scripted::Status(200, OK_BODY),
    ]);
    let service =
        ChargeService::new(transport.clone(), &config(3, 5)).expect("service should build");

    let result = service.charge(&request()).await.expect("charge should not fault");
    assert!(result.is_success());
    assert_eq!(transport.calls(), 2);
}

#[tokio::test(flavor = "multi_thread")]
async fn cancellation_interrupts_backoff_promptly() {
    let transport = MockTransport::new(vec![
        Scripted::Connection,
        Scripted::Connection,
        Scripted::Connection,
    ]);
    let mut long_backoff = config(3, 5);
    long_backoff.retry_delay_ms = 5_000;
    let service = Arc::new(
        ChargeService::new(transport.clone(), &long_backoff).expect("service should build"),
    );

    let token = CancellationToken::new();
    let worker_token = token.clone();
    let worker_service = Arc::clone(&service);
    let handle = tokio::spawn(async move {
        worker_service.charge_with_cancellation(&request(), &worker_token).await
    });

    tokio::time::sleep(Duration::from_millis(50)).await;
    let started = std::time::Instant::now();
    token.cancel();

    let result = handle.await.expect("task").expect("charge should not fault");
    assert!(
        started.elapsed() < Duration::from_secs(2),
        "cancellation must not wait out the remaining backoff"
    );
    assert!(matches!(
        result,
        ChargeResult::Failure { kind: FailureKind::Cancelled, .. }
    ));
    assert_eq!(transport.calls(), 1, "cancelled during the first backoff sleep");
}

#[tokio::test]
async fn invalid_configuration_falls_back_to_defaults() {
    let transport = MockTransport::new(vec![Scripted::Status(200, OK_BODY)]);
    let broken = ClientConfig {
        endpoint: "https://payments.test".to_string(),
        timeout_ms: 0,
        retry_attempts: 0,
        retry_delay_ms: 0,
        backoff_multiplier: f64::NAN,
        jitter_ms: 0,
        circuit_breaker: CircuitBreakerSettings { failure_threshold: 0, recovery_timeout_ms: 0 },
    };

    let service =
        ChargeService::new(transport.clone(), &broken).expect("construction must not fail");
    let result = service.charge(&request()).await.expect("charge should not fault");
    assert!(result.is_success());

    let report = service.health_reporter().report();
    assert_eq!(report.policy.retry_attempts, 3);
    assert_eq!(report.policy.timeout_ms, 30_000);
    assert_eq!(report.policy.circuit_breaker.failure_threshold, 5);
}

#[tokio::test]
async fn remote_health_defaults_to_unsupported() {
    let transport = MockTransport::new(Vec::new());
    let service = ChargeService::new(transport, &config(3, 5)).expect("service should build");

    let health = service.remote_health().await;
    assert!(!health.healthy);
    assert!(health.error.is_some());
}
