//! Resilience patterns for fault-tolerant outbound calls
//!
//! This module provides **generic, reusable** resilience primitives:
//! - **Circuit Breaker**: detects repeated downstream failures and stops
//!   issuing calls while the dependency looks unhealthy
//! - **Exponential Backoff**: computes retry delays with optional jitter to
//!   avoid thundering herds
//! - **Clock abstraction**: lets time-based behavior (recovery windows) be
//!   tested deterministically with a mock clock
//!
//! The implementations are framework-agnostic and carry no domain types.
//! Randomness is injected through [`JitterSource`] so tests can pin jitter
//! to a fixed value, and wall-clock reads go through [`Clock`] so tests can
//! advance time without sleeping.

pub mod backoff;
pub mod circuit_breaker;
pub mod clock;

// Re-export backoff types
pub use backoff::{BackoffError, ExponentialBackoff, FixedJitter, JitterSource, NoJitter, ThreadRngJitter};
// Re-export circuit breaker types
pub use circuit_breaker::{
    BreakerSnapshot, CircuitBreaker, CircuitBreakerConfig, CircuitBreakerConfigBuilder,
    CircuitState, ConfigError,
};
// Re-export clock types
pub use clock::{Clock, MockClock, SystemClock};
