//! Generic resilience primitives shared across chargeguard crates.
//!
//! This crate contains the building blocks the charge client is assembled
//! from: a clock abstraction for deterministic time-based testing, an
//! exponential backoff policy with injectable jitter, and a circuit breaker
//! state machine. Nothing in here knows about payments or HTTP; the domain
//! and orchestration layers live in `chargeguard-domain` and
//! `chargeguard-core`.

#![forbid(unsafe_code)]
#![warn(rust_2018_idioms)]
#![warn(clippy::all, clippy::perf, clippy::complexity, clippy::suspicious)]

pub mod resilience;

// Re-export commonly used types and traits for convenience
pub use resilience::{
    BackoffError, BreakerSnapshot, CircuitBreaker, CircuitBreakerConfig,
    CircuitBreakerConfigBuilder, CircuitState, Clock, ConfigError, ExponentialBackoff,
    FixedJitter, JitterSource, MockClock, NoJitter, SystemClock, ThreadRngJitter,
};
