//! Client configuration structures
//!
//! The shapes here mirror the operator-facing configuration surface. Every
//! field has a documented safe default, and [`ClientConfig::sanitize`]
//! pushes invalid values back to those defaults instead of failing startup;
//! the loader in `chargeguard-infra` logs whatever was corrected.

use serde::{Deserialize, Serialize};

/// Default provider endpoint when none is configured
pub const DEFAULT_ENDPOINT: &str = "https://api.payment-service.internal";
/// Default per-attempt timeout in milliseconds
pub const DEFAULT_TIMEOUT_MS: u64 = 30_000;
/// Default number of attempts per charge
pub const DEFAULT_RETRY_ATTEMPTS: u32 = 3;
/// Default base retry delay in milliseconds
pub const DEFAULT_RETRY_DELAY_MS: u64 = 1_000;
/// Default exponential backoff multiplier
pub const DEFAULT_BACKOFF_MULTIPLIER: f64 = 2.0;
/// Default maximum jitter in milliseconds
pub const DEFAULT_JITTER_MS: u64 = 0;
/// Default consecutive failures before the breaker opens
pub const DEFAULT_FAILURE_THRESHOLD: u32 = 5;
/// Default breaker recovery timeout in milliseconds
pub const DEFAULT_RECOVERY_TIMEOUT_MS: u64 = 60_000;

/// Circuit breaker section of the client configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CircuitBreakerSettings {
    pub failure_threshold: u32,
    pub recovery_timeout_ms: u64,
}

impl Default for CircuitBreakerSettings {
    fn default() -> Self {
        Self {
            failure_threshold: DEFAULT_FAILURE_THRESHOLD,
            recovery_timeout_ms: DEFAULT_RECOVERY_TIMEOUT_MS,
        }
    }
}

/// Configuration for the charge client
///
/// Immutable after construction: a configuration reload builds a fresh
/// client rather than mutating live policy values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub endpoint: String,
    pub timeout_ms: u64,
    pub retry_attempts: u32,
    pub retry_delay_ms: u64,
    pub backoff_multiplier: f64,
    pub jitter_ms: u64,
    pub circuit_breaker: CircuitBreakerSettings,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            timeout_ms: DEFAULT_TIMEOUT_MS,
            retry_attempts: DEFAULT_RETRY_ATTEMPTS,
            retry_delay_ms: DEFAULT_RETRY_DELAY_MS,
            backoff_multiplier: DEFAULT_BACKOFF_MULTIPLIER,
            jitter_ms: DEFAULT_JITTER_MS,
            circuit_breaker: CircuitBreakerSettings::default(),
        }
    }
}

impl ClientConfig {
    /// Replace invalid values with the documented defaults
    ///
    /// Returns the names of the corrected fields so the caller can log
    /// them; an empty list means the configuration was already valid.
    pub fn sanitize(mut self) -> (Self, Vec<&'static str>) {
        let mut corrected = Vec::new();

        if self.endpoint.trim().is_empty() {
            self.endpoint = DEFAULT_ENDPOINT.to_string();
            corrected.push("endpoint");
        }
        if self.timeout_ms == 0 {
            self.timeout_ms = DEFAULT_TIMEOUT_MS;
            corrected.push("timeout_ms");
        }
        if self.retry_attempts == 0 {
            self.retry_attempts = DEFAULT_RETRY_ATTEMPTS;
            corrected.push("retry_attempts");
        }
        if self.retry_delay_ms == 0 {
            self.retry_delay_ms = DEFAULT_RETRY_DELAY_MS;
            corrected.push("retry_delay_ms");
        }
        if !self.backoff_multiplier.is_finite() || self.backoff_multiplier < 1.0 {
            self.backoff_multiplier = DEFAULT_BACKOFF_MULTIPLIER;
            corrected.push("backoff_multiplier");
        }
        if self.circuit_breaker.failure_threshold == 0 {
            self.circuit_breaker.failure_threshold = DEFAULT_FAILURE_THRESHOLD;
            corrected.push("circuit_breaker.failure_threshold");
        }
        if self.circuit_breaker.recovery_timeout_ms == 0 {
            self.circuit_breaker.recovery_timeout_ms = DEFAULT_RECOVERY_TIMEOUT_MS;
            corrected.push("circuit_breaker.recovery_timeout_ms");
        }

        (self, corrected)
    }
}
