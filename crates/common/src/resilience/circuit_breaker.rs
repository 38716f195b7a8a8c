//! Circuit breaker state machine
//!
//! Tracks consecutive downstream failures and gates whether a call may be
//! attempted. States: CLOSED (calls permitted, failures counted), OPEN
//! (calls rejected until the recovery timeout elapses), HALF_OPEN (a single
//! trial call is admitted to probe recovery).
//!
//! All mutable state lives behind one coarse mutex so `allow_request`,
//! `record_success`, `record_failure` and `snapshot` are atomic with
//! respect to each other. Operations are O(1) and never block on I/O, so
//! lock hold time is negligible even under concurrent callers.

use std::fmt;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use super::clock::{Clock, SystemClock};

/// Simple configuration error for validation
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {message}")]
    Invalid { message: String },
}

/// Circuit breaker states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CircuitState {
    /// Circuit is closed, allowing requests
    Closed,
    /// Circuit is open, rejecting requests
    Open,
    /// Circuit is half-open, allowing a single trial request
    HalfOpen,
}

impl fmt::Display for CircuitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CircuitState::Closed => write!(f, "CLOSED"),
            CircuitState::Open => write!(f, "OPEN"),
            CircuitState::HalfOpen => write!(f, "HALF_OPEN"),
        }
    }
}

/// Configuration for circuit breaker behavior
#[derive(Debug, Clone)]
pub struct CircuitBreakerConfig {
    /// Number of consecutive failures before opening the circuit
    pub failure_threshold: u32,
    /// Time to wait after tripping before admitting a trial call
    pub recovery_timeout: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self { failure_threshold: 5, recovery_timeout: Duration::from_secs(60) }
    }
}

impl CircuitBreakerConfig {
    /// Create a configuration builder
    pub fn builder() -> CircuitBreakerConfigBuilder {
        CircuitBreakerConfigBuilder::new()
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.failure_threshold == 0 {
            return Err(ConfigError::Invalid {
                message: "failure_threshold must be greater than 0".to_string(),
            });
        }
        if self.recovery_timeout.is_zero() {
            return Err(ConfigError::Invalid {
                message: "recovery_timeout must be greater than zero".to_string(),
            });
        }
        Ok(())
    }
}

/// Builder for [`CircuitBreakerConfig`]
#[derive(Debug, Default)]
pub struct CircuitBreakerConfigBuilder {
    config: CircuitBreakerConfig,
}

impl CircuitBreakerConfigBuilder {
    pub fn new() -> Self {
        Self { config: CircuitBreakerConfig::default() }
    }

    pub fn failure_threshold(mut self, threshold: u32) -> Self {
        self.config.failure_threshold = threshold;
        self
    }

    pub fn recovery_timeout(mut self, timeout: Duration) -> Self {
        self.config.recovery_timeout = timeout;
        self
    }

    pub fn build(self) -> Result<CircuitBreakerConfig, ConfigError> {
        self.config.validate()?;
        Ok(self.config)
    }
}

/// Read-only view of breaker state for health reporting
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BreakerSnapshot {
    pub state: CircuitState,
    pub consecutive_failures: u32,
    /// Wall-clock time of the last state transition, in milliseconds since
    /// the UNIX epoch
    pub last_transition_ms: u64,
}

struct BreakerInner {
    state: CircuitState,
    consecutive_failures: u32,
    /// Monotonic trip time; `Some` whenever the breaker has opened and not
    /// yet closed
    tripped_at: Option<Instant>,
    /// Whether the single HALF_OPEN trial has been handed out
    trial_in_flight: bool,
    /// Monotonic time of the last state transition (drives HALF_OPEN
    /// re-arming)
    last_transition: Instant,
    last_transition_ms: u64,
}

/// Circuit breaker with pluggable clock
///
/// One breaker guards one downstream dependency and is shared by every
/// caller hitting it; wrap it in an `Arc` and hand out clones of the
/// handle.
pub struct CircuitBreaker<C: Clock = SystemClock> {
    config: CircuitBreakerConfig,
    clock: C,
    inner: Mutex<BreakerInner>,
}

impl<C: Clock> fmt::Debug for CircuitBreaker<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let snapshot = self.snapshot();
        f.debug_struct("CircuitBreaker")
            .field("config", &self.config)
            .field("state", &snapshot.state)
            .field("consecutive_failures", &snapshot.consecutive_failures)
            .finish()
    }
}

impl CircuitBreaker<SystemClock> {
    /// Create a new circuit breaker with the given configuration using the
    /// system clock
    pub fn new(config: CircuitBreakerConfig) -> Result<Self, ConfigError> {
        Self::with_clock(config, SystemClock)
    }

    /// Create a circuit breaker with default configuration
    pub fn with_defaults() -> Self {
        Self { config: CircuitBreakerConfig::default(), clock: SystemClock, inner: Mutex::new(BreakerInner::new(&SystemClock)) }
    }
}

impl<C: Clock> CircuitBreaker<C> {
    /// Create a new circuit breaker with a custom clock (useful for testing)
    pub fn with_clock(config: CircuitBreakerConfig, clock: C) -> Result<Self, ConfigError> {
        config.validate()?;
        let inner = BreakerInner::new(&clock);
        Ok(Self { config, clock, inner: Mutex::new(inner) })
    }

    /// Check whether a call may proceed, applying the OPEN -> HALF_OPEN
    /// transition as a side effect once the recovery window has elapsed.
    ///
    /// While OPEN and inside the recovery window this returns `false`
    /// without mutating any state, so rapid repeated polling is harmless.
    pub fn allow_request(&self) -> bool {
        let mut inner = self.inner.lock();
        let now = self.clock.now();

        match inner.state {
            CircuitState::Closed => true,
            CircuitState::Open => {
                let recovered = inner
                    .tripped_at
                    .is_some_and(|tripped| now.duration_since(tripped) >= self.config.recovery_timeout);
                if recovered {
                    inner.transition(CircuitState::HalfOpen, now, &self.clock);
                    inner.trial_in_flight = true;
                    info!("circuit breaker entering HALF_OPEN, admitting trial call");
                    true
                } else {
                    false
                }
            }
            CircuitState::HalfOpen => {
                if !inner.trial_in_flight {
                    inner.trial_in_flight = true;
                    return true;
                }
                // The trial's outcome was never reported (e.g. the caller
                // was cancelled mid-flight). Re-arm one trial per recovery
                // window so an abandoned probe cannot wedge the breaker.
                if now.duration_since(inner.last_transition) >= self.config.recovery_timeout {
                    inner.last_transition = now;
                    inner.last_transition_ms = self.clock.millis_since_epoch();
                    warn!("circuit breaker trial went unreported, re-admitting a trial call");
                    return true;
                }
                false
            }
        }
    }

    /// Record a successful call outcome
    pub fn record_success(&self) {
        let mut inner = self.inner.lock();
        let now = self.clock.now();

        match inner.state {
            CircuitState::Closed => {
                if inner.consecutive_failures > 0 {
                    debug!(
                        failures = inner.consecutive_failures,
                        "resetting failure count after success"
                    );
                }
                inner.consecutive_failures = 0;
            }
            CircuitState::HalfOpen => {
                inner.transition(CircuitState::Closed, now, &self.clock);
                inner.consecutive_failures = 0;
                inner.tripped_at = None;
                inner.trial_in_flight = false;
                info!("circuit breaker closed after successful trial call");
            }
            CircuitState::Open => {
                // No call should have been admitted; leave the window alone.
                warn!("success recorded while circuit is open");
            }
        }
    }

    /// Record a failed call outcome
    pub fn record_failure(&self) {
        let mut inner = self.inner.lock();
        let now = self.clock.now();
        inner.consecutive_failures = inner.consecutive_failures.saturating_add(1);

        match inner.state {
            CircuitState::Closed => {
                if inner.consecutive_failures >= self.config.failure_threshold {
                    inner.transition(CircuitState::Open, now, &self.clock);
                    inner.tripped_at = Some(now);
                    warn!(
                        failures = inner.consecutive_failures,
                        "circuit breaker opened after consecutive failures"
                    );
                }
            }
            CircuitState::HalfOpen => {
                // The recovery window restarts from this failure, not from
                // the original trip.
                inner.transition(CircuitState::Open, now, &self.clock);
                inner.tripped_at = Some(now);
                inner.trial_in_flight = false;
                warn!("circuit breaker re-opened after failed trial call");
            }
            CircuitState::Open => {
                // Failures reported by calls already in flight when the
                // breaker opened; count them without extending the window.
            }
        }
    }

    /// Read-only snapshot for health reporting; never mutates state
    pub fn snapshot(&self) -> BreakerSnapshot {
        let inner = self.inner.lock();
        BreakerSnapshot {
            state: inner.state,
            consecutive_failures: inner.consecutive_failures,
            last_transition_ms: inner.last_transition_ms,
        }
    }

    /// Current state (convenience accessor)
    pub fn state(&self) -> CircuitState {
        self.inner.lock().state
    }

    /// The configuration this breaker was built with
    pub fn config(&self) -> &CircuitBreakerConfig {
        &self.config
    }
}

impl BreakerInner {
    fn new<C: Clock>(clock: &C) -> Self {
        Self {
            state: CircuitState::Closed,
            consecutive_failures: 0,
            tripped_at: None,
            trial_in_flight: false,
            last_transition: clock.now(),
            last_transition_ms: clock.millis_since_epoch(),
        }
    }

    fn transition<C: Clock>(&mut self, state: CircuitState, now: Instant, clock: &C) {
        self.state = state;
        self.last_transition = now;
        self.last_transition_ms = clock.millis_since_epoch();
    }
}

impl Default for CircuitBreaker<SystemClock> {
    fn default() -> Self {
        Self::with_defaults()
    }
}
