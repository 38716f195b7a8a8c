//! Charge orchestration - core business logic
//!
//! [`service::ChargeService`] wraps the remote charge operation with the
//! breaker gate, bounded per-attempt timeouts and backoff retries;
//! [`health::HealthReporter`] exposes the breaker and policy state for
//! observability.

pub mod health;
pub mod service;

pub use health::{HealthReport, HealthReporter, HealthStatus};
pub use service::ChargeService;
