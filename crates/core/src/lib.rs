//! # Chargeguard Core
//!
//! Pure business logic layer - no infrastructure dependencies.
//!
//! This crate contains:
//! - The retrying charge service (breaker gate, bounded attempts,
//!   classification, backoff)
//! - Health reporting over the breaker and policy configuration
//! - The outbound transport port (trait)
//!
//! ## Architecture Principles
//! - Only depends on `chargeguard-common` and `chargeguard-domain`
//! - No HTTP or platform code
//! - All external dependencies via traits
//! - Pure, testable business logic

pub mod charging;

// Infrastructure ports
pub mod gateway_ports;

// Re-export specific items to avoid ambiguity
pub use charging::health::{HealthReport, HealthReporter, HealthStatus};
pub use charging::ChargeService;
pub use gateway_ports::{
    PaymentTransport, TransportError, TransportHealth, TransportRequest, TransportResponse,
};
