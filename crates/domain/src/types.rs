//! Common data types used throughout the application

use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::{ChargeGuardError, Result};

/// A charge to submit to the payment provider
///
/// Immutable once constructed; [`ChargeRequest::new`] rejects malformed
/// input so downstream code never sees a request with a non-positive amount
/// or empty identifiers.
#[derive(Debug, Clone, Serialize)]
pub struct ChargeRequest {
    amount: Decimal,
    currency: String,
    payment_method: String,
    metadata: HashMap<String, Value>,
}

impl ChargeRequest {
    /// Create a validated charge request
    ///
    /// # Errors
    /// Returns `ChargeGuardError::InvalidRequest` if the amount is not
    /// strictly positive or the currency / payment method is empty.
    pub fn new(
        amount: Decimal,
        currency: impl Into<String>,
        payment_method: impl Into<String>,
    ) -> Result<Self> {
        let currency = currency.into();
        let payment_method = payment_method.into();

        if amount <= Decimal::ZERO {
            return Err(ChargeGuardError::InvalidRequest(format!(
                "amount must be positive, got {amount}"
            )));
        }
        if currency.trim().is_empty() {
            return Err(ChargeGuardError::InvalidRequest("currency is required".to_string()));
        }
        if payment_method.trim().is_empty() {
            return Err(ChargeGuardError::InvalidRequest(
                "payment method is required".to_string(),
            ));
        }

        Ok(Self { amount, currency, payment_method, metadata: HashMap::new() })
    }

    /// Attach an opaque metadata entry (builder style)
    #[must_use]
    pub fn with_metadata(mut self, key: impl Into<String>, value: Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    pub fn amount(&self) -> Decimal {
        self.amount
    }

    pub fn currency(&self) -> &str {
        &self.currency
    }

    pub fn payment_method(&self) -> &str {
        &self.payment_method
    }

    pub fn metadata(&self) -> &HashMap<String, Value> {
        &self.metadata
    }
}

/// Classified failure kinds surfaced to callers
///
/// `Timeout` is not listed here because a timed-out charge is its own
/// [`ChargeResult`] variant carrying the elapsed time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Connection-level failure reaching the provider
    ConnectionError,
    /// Non-retryable 4xx-equivalent response (other than rate limiting)
    ClientError,
    /// Retryable 5xx-equivalent response
    ServerError,
    /// 429-equivalent response
    RateLimited,
    /// The circuit breaker rejected the call before any network attempt
    CircuitOpen,
    /// Every attempt was consumed without a terminal outcome
    MaxRetriesExceeded,
    /// The caller cancelled the charge mid-flight
    Cancelled,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FailureKind::ConnectionError => "connection_error",
            FailureKind::ClientError => "client_error",
            FailureKind::ServerError => "server_error",
            FailureKind::RateLimited => "rate_limited",
            FailureKind::CircuitOpen => "circuit_open",
            FailureKind::MaxRetriesExceeded => "max_retries_exceeded",
            FailureKind::Cancelled => "cancelled",
        };
        write!(f, "{name}")
    }
}

/// Outcome of a charge operation
///
/// Exactly one variant describes each completed charge; callers branch on
/// it instead of catching errors. Serializable so an external adapter can
/// turn it into a wire reply.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ChargeResult {
    /// The provider accepted the charge
    Success {
        payment_id: String,
        provider_response: Value,
    },
    /// The charge failed with a classified reason
    Failure { kind: FailureKind, message: String },
    /// Every relevant attempt exceeded the per-attempt timeout
    Timeout { elapsed: Duration },
}

impl ChargeResult {
    /// Convenience constructor for failures
    pub fn failure(kind: FailureKind, message: impl Into<String>) -> Self {
        Self::Failure { kind, message: message.into() }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }
}
