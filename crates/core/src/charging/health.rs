//! Health reporting over the breaker and policy configuration
//!
//! A pure read of current state: safe to call concurrently with charging
//! and never mutates the breaker.

use std::sync::Arc;

use chargeguard_common::resilience::{BreakerSnapshot, CircuitBreaker, CircuitState, Clock, SystemClock};
use chargeguard_domain::ClientConfig;
use serde::{Deserialize, Serialize};

/// Coarse service status derived from the breaker state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
}

impl std::fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HealthStatus::Healthy => write!(f, "healthy"),
            HealthStatus::Degraded => write!(f, "degraded"),
        }
    }
}

/// Snapshot of the charge client's health for observability
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthReport {
    pub breaker: BreakerSnapshot,
    pub policy: ClientConfig,
    pub status: HealthStatus,
}

/// Read-only health view over a shared circuit breaker
pub struct HealthReporter<C: Clock = SystemClock> {
    breaker: Arc<CircuitBreaker<C>>,
    policy: ClientConfig,
}

impl<C: Clock> HealthReporter<C> {
    pub fn new(breaker: Arc<CircuitBreaker<C>>, policy: ClientConfig) -> Self {
        Self { breaker, policy }
    }

    /// Build a health report from the current breaker state
    pub fn report(&self) -> HealthReport {
        let breaker = self.breaker.snapshot();
        let status = if breaker.state == CircuitState::Closed {
            HealthStatus::Healthy
        } else {
            HealthStatus::Degraded
        };
        HealthReport { breaker, policy: self.policy.clone(), status }
    }
}
