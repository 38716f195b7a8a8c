//! Retrying charge service
//!
//! Orchestrates one charge call: consults the circuit breaker, performs
//! bounded attempts against the transport port, classifies each outcome,
//! sleeps the backoff delay between retries and feeds every outcome back to
//! the breaker.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chargeguard_common::resilience::{
    CircuitBreaker, CircuitBreakerConfig, Clock, ExponentialBackoff, SystemClock,
};
use chargeguard_domain::{
    ChargeGuardError, ChargeRequest, ChargeResult, ClientConfig, FailureKind, Result,
};
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::health::HealthReporter;
use crate::gateway_ports::{
    PaymentTransport, TransportError, TransportHealth, TransportRequest, TransportResponse,
};

/// Classified result of a single attempt
#[derive(Debug)]
enum AttemptOutcome {
    Success { payment_id: String, provider_response: Value },
    RateLimited { message: String },
    TimedOut { elapsed: Duration },
    Retryable { kind: FailureKind, message: String },
    Fatal { kind: FailureKind, message: String },
    Cancelled,
}

/// Resilient charge client
///
/// One instance guards one downstream payment dependency and may be shared
/// across concurrent callers; the breaker is the only long-lived mutable
/// state and is internally synchronized. Configuration is immutable after
/// construction: reloading means building a new service.
pub struct ChargeService<C: Clock = SystemClock> {
    transport: Arc<dyn PaymentTransport>,
    breaker: Arc<CircuitBreaker<C>>,
    backoff: ExponentialBackoff,
    config: ClientConfig,
    charge_url: String,
    per_attempt_timeout: Duration,
}

impl ChargeService<SystemClock> {
    /// Create a service from an operator-facing configuration
    ///
    /// Invalid configuration values are replaced by the documented safe
    /// defaults rather than failing construction.
    pub fn new(transport: Arc<dyn PaymentTransport>, config: &ClientConfig) -> Result<Self> {
        Self::with_clock(transport, config, SystemClock)
    }
}

impl<C: Clock> ChargeService<C> {
    /// Create a service with a custom clock for the breaker (useful for
    /// testing recovery windows without sleeping)
    pub fn with_clock(
        transport: Arc<dyn PaymentTransport>,
        config: &ClientConfig,
        clock: C,
    ) -> Result<Self> {
        let (config, corrected) = config.clone().sanitize();
        if !corrected.is_empty() {
            warn!(fields = ?corrected, "invalid configuration values replaced with defaults");
        }

        let backoff = ExponentialBackoff::new(
            Duration::from_millis(config.retry_delay_ms),
            config.backoff_multiplier,
            Duration::from_millis(config.jitter_ms),
        )
        .map_err(|err| ChargeGuardError::Config(err.to_string()))?;

        let breaker_config = CircuitBreakerConfig::builder()
            .failure_threshold(config.circuit_breaker.failure_threshold)
            .recovery_timeout(Duration::from_millis(config.circuit_breaker.recovery_timeout_ms))
            .build()
            .map_err(|err| ChargeGuardError::Config(err.to_string()))?;
        let breaker = Arc::new(
            CircuitBreaker::with_clock(breaker_config, clock)
                .map_err(|err| ChargeGuardError::Config(err.to_string()))?,
        );

        let charge_url = format!("{}/v1/charges", config.endpoint.trim_end_matches('/'));
        let per_attempt_timeout = Duration::from_millis(config.timeout_ms);

        Ok(Self { transport, breaker, backoff, config, charge_url, per_attempt_timeout })
    }

    /// Submit a charge to the payment provider
    ///
    /// Ordinary remote failures never surface as `Err`; they come back as
    /// typed [`ChargeResult`] values the caller can branch on. The `Err`
    /// arm is reserved for programming-contract violations detected before
    /// any network attempt.
    ///
    /// Known limitation: a timeout after the provider has actually
    /// committed the charge is indistinguishable from one where it has
    /// not. Callers needing exactly-once semantics must supply idempotency
    /// keys upstream.
    pub async fn charge(&self, request: &ChargeRequest) -> Result<ChargeResult> {
        self.charge_with_cancellation(request, &CancellationToken::new()).await
    }

    /// Submit a charge that the caller can cancel mid-flight
    ///
    /// Cancellation interrupts both in-flight attempts and backoff sleeps;
    /// the call returns a `Cancelled` failure promptly instead of
    /// completing the remaining wait.
    pub async fn charge_with_cancellation(
        &self,
        request: &ChargeRequest,
        cancel: &CancellationToken,
    ) -> Result<ChargeResult> {
        let body = serde_json::to_string(request)
            .map_err(|err| ChargeGuardError::Internal(format!("unserializable request: {err}")))?;

        if !self.breaker.allow_request() {
            debug!(state = %self.breaker.state(), "charge rejected by circuit breaker");
            return Ok(ChargeResult::failure(FailureKind::CircuitOpen, "service unavailable"));
        }

        let max_attempts = self.config.retry_attempts;
        for attempt in 0..max_attempts {
            if cancel.is_cancelled() {
                return Ok(cancelled_result());
            }

            let has_attempts_left = attempt + 1 < max_attempts;
            match self.attempt(&body, attempt, cancel).await {
                AttemptOutcome::Success { payment_id, provider_response } => {
                    self.breaker.record_success();
                    debug!(attempt = attempt + 1, %payment_id, "charge succeeded");
                    return Ok(ChargeResult::Success { payment_id, provider_response });
                }
                AttemptOutcome::RateLimited { message } => {
                    // Expected transient condition: retried, but never
                    // counted against the breaker.
                    debug!(attempt = attempt + 1, "provider rate limited the charge");
                    if !has_attempts_left {
                        return Ok(ChargeResult::failure(
                            FailureKind::MaxRetriesExceeded,
                            format!("rate limited on final attempt: {message}"),
                        ));
                    }
                }
                AttemptOutcome::TimedOut { elapsed } => {
                    self.breaker.record_failure();
                    warn!(attempt = attempt + 1, ?elapsed, "charge attempt timed out");
                    if !has_attempts_left {
                        return Ok(ChargeResult::Timeout { elapsed });
                    }
                }
                AttemptOutcome::Retryable { kind, message } => {
                    self.breaker.record_failure();
                    warn!(attempt = attempt + 1, %kind, %message, "charge attempt failed");
                    if !has_attempts_left {
                        return Ok(ChargeResult::failure(kind, message));
                    }
                }
                AttemptOutcome::Fatal { kind, message } => {
                    // Non-retryable, but still counted by the breaker.
                    self.breaker.record_failure();
                    warn!(attempt = attempt + 1, %kind, %message, "charge rejected by provider");
                    return Ok(ChargeResult::failure(kind, message));
                }
                AttemptOutcome::Cancelled => {
                    return Ok(cancelled_result());
                }
            }

            if self.pause(attempt, cancel).await {
                return Ok(cancelled_result());
            }
        }

        Ok(ChargeResult::failure(FailureKind::MaxRetriesExceeded, "all attempts consumed"))
    }

    /// Probe the provider's health endpoint through the transport
    pub async fn remote_health(&self) -> TransportHealth {
        self.transport.health_check().await
    }

    /// Health reporter over this service's breaker and policy configuration
    pub fn health_reporter(&self) -> HealthReporter<C> {
        HealthReporter::new(Arc::clone(&self.breaker), self.config.clone())
    }

    /// Perform one bounded attempt; never touches the breaker
    async fn attempt(&self, body: &str, attempt: u32, cancel: &CancellationToken) -> AttemptOutcome {
        let request = TransportRequest {
            method: "POST".to_string(),
            url: self.charge_url.clone(),
            headers: vec![
                ("Content-Type".to_string(), "application/json".to_string()),
                (
                    "User-Agent".to_string(),
                    format!("chargeguard/{}", env!("CARGO_PKG_VERSION")),
                ),
            ],
            body: body.to_string(),
            timeout: self.per_attempt_timeout,
        };

        debug!(attempt = attempt + 1, url = %request.url, "sending charge attempt");
        let started = Instant::now();

        tokio::select! {
            _ = cancel.cancelled() => AttemptOutcome::Cancelled,
            bounded = tokio::time::timeout(self.per_attempt_timeout, self.transport.send(request)) => {
                match bounded {
                    // The timed-out future is dropped here, so a late reply
                    // can never reach the breaker after the timeout branch
                    // records the failure.
                    Err(_) => AttemptOutcome::TimedOut {
                        elapsed: started.elapsed().max(self.per_attempt_timeout),
                    },
                    Ok(Ok(response)) => classify_response(&response),
                    Ok(Err(TransportError::Timeout { elapsed })) => {
                        AttemptOutcome::TimedOut { elapsed }
                    }
                    Ok(Err(TransportError::Connection { message })) => AttemptOutcome::Retryable {
                        kind: FailureKind::ConnectionError,
                        message,
                    },
                }
            }
        }
    }

    /// Sleep the backoff delay; returns `true` if cancelled mid-sleep
    async fn pause(&self, attempt: u32, cancel: &CancellationToken) -> bool {
        let delay = self.backoff.delay(attempt);
        debug!(attempt = attempt + 1, ?delay, "backing off before retry");
        tokio::select! {
            _ = cancel.cancelled() => true,
            _ = tokio::time::sleep(delay) => false,
        }
    }
}

fn cancelled_result() -> ChargeResult {
    ChargeResult::failure(FailureKind::Cancelled, "charge cancelled by caller")
}

/// Map an HTTP-level response onto the attempt outcome taxonomy
fn classify_response(response: &TransportResponse) -> AttemptOutcome {
    let status = response.status;
    match status {
        200..=299 => {
            let value: Value = serde_json::from_str(&response.body).unwrap_or(Value::Null);
            let payment_id = value
                .get("payment_id")
                .or_else(|| value.get("transaction_id"))
                .and_then(Value::as_str)
                .map(str::to_string);
            match payment_id {
                Some(payment_id) => AttemptOutcome::Success { payment_id, provider_response: value },
                None => AttemptOutcome::Retryable {
                    kind: FailureKind::ServerError,
                    message: format!("malformed provider response (status {status}): missing payment id"),
                },
            }
        }
        429 => AttemptOutcome::RateLimited {
            message: body_message(&response.body)
                .unwrap_or_else(|| "rate limit exceeded".to_string()),
        },
        400..=499 => AttemptOutcome::Fatal {
            kind: FailureKind::ClientError,
            message: body_message(&response.body)
                .map_or_else(
                    || format!("provider rejected request (status {status})"),
                    |message| format!("provider rejected request (status {status}): {message}"),
                ),
        },
        500..=599 => AttemptOutcome::Retryable {
            kind: FailureKind::ServerError,
            message: format!("provider error (status {status})"),
        },
        _ => AttemptOutcome::Retryable {
            kind: FailureKind::ServerError,
            message: format!("unexpected response status {status}"),
        },
    }
}

/// Pull the `message` field out of a JSON error body, if there is one
fn body_message(body: &str) -> Option<String> {
    serde_json::from_str::<Value>(body)
        .ok()?
        .get("message")?
        .as_str()
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response(status: u16, body: &str) -> TransportResponse {
        TransportResponse { status, body: body.to_string() }
    }

    #[test]
    fn classifies_success_with_payment_id() {
        let outcome = classify_response(&response(200, r#"{"payment_id":"pay_1"}"#));
        match outcome {
            AttemptOutcome::Success { payment_id, .. } => assert_eq!(payment_id, "pay_1"),
            other => panic!("expected success, got {other:?}"),
        }
    }

    #[test]
    fn accepts_transaction_id_as_fallback() {
        let outcome = classify_response(&response(201, r#"{"transaction_id":"txn_9"}"#));
        assert!(matches!(outcome, AttemptOutcome::Success { payment_id, .. } if payment_id == "txn_9"));
    }

    #[test]
    fn success_without_payment_id_is_retryable_server_error() {
        let outcome = classify_response(&response(200, r#"{"status":"ok"}"#));
        assert!(matches!(
            outcome,
            AttemptOutcome::Retryable { kind: FailureKind::ServerError, .. }
        ));

        let outcome = classify_response(&response(200, "not json"));
        assert!(matches!(
            outcome,
            AttemptOutcome::Retryable { kind: FailureKind::ServerError, .. }
        ));
    }

    #[test]
    fn classifies_rate_limiting_separately_from_client_errors() {
        let outcome = classify_response(&response(429, r#"{"message":"slow down"}"#));
        assert!(matches!(outcome, AttemptOutcome::RateLimited { message } if message == "slow down"));

        let outcome = classify_response(&response(400, r#"{"message":"bad card"}"#));
        match outcome {
            AttemptOutcome::Fatal { kind, message } => {
                assert_eq!(kind, FailureKind::ClientError);
                assert!(message.contains("bad card"));
            }
            other => panic!("expected fatal, got {other:?}"),
        }
    }

    #[test]
    fn classifies_server_errors_as_retryable() {
        for status in [500, 502, 503, 504] {
            let outcome = classify_response(&response(status, ""));
            assert!(matches!(
                outcome,
                AttemptOutcome::Retryable { kind: FailureKind::ServerError, .. }
            ));
        }
    }

    #[test]
    fn unexpected_statuses_fall_back_to_server_error() {
        let outcome = classify_response(&response(302, ""));
        assert!(matches!(
            outcome,
            AttemptOutcome::Retryable { kind: FailureKind::ServerError, .. }
        ));
    }

    #[test]
    fn body_message_handles_malformed_bodies() {
        assert_eq!(body_message(r#"{"message":"nope"}"#), Some("nope".to_string()));
        assert_eq!(body_message(r#"{"error":"nope"}"#), None);
        assert_eq!(body_message("not json"), None);
    }
}
