//! Exponential backoff with injectable jitter
//!
//! Computes the delay before retry attempt `n` as
//! `base_delay * multiplier^n + uniform(0, jitter_max)`. The random
//! component exists solely for thundering-herd avoidance; it is sampled
//! from an injected [`JitterSource`] so the policy is deterministic under
//! test with a fixed source.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use thiserror::Error;

/// Source of the random jitter added to each computed delay.
///
/// `sample` must return a duration in `[0, max]`.
pub trait JitterSource: Send + Sync {
    fn sample(&self, max: Duration) -> Duration;
}

/// Production jitter source backed by the thread-local RNG
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadRngJitter;

impl JitterSource for ThreadRngJitter {
    fn sample(&self, max: Duration) -> Duration {
        if max.is_zero() {
            return Duration::ZERO;
        }
        let max_ms = max.as_millis().min(u128::from(u64::MAX)) as u64;
        Duration::from_millis(rand::thread_rng().gen_range(0..=max_ms))
    }
}

/// Deterministic jitter source returning a fixed value (clamped to `max`)
#[derive(Debug, Clone, Copy)]
pub struct FixedJitter(pub Duration);

impl JitterSource for FixedJitter {
    fn sample(&self, max: Duration) -> Duration {
        self.0.min(max)
    }
}

/// Jitter source that always returns zero
#[derive(Debug, Clone, Copy, Default)]
pub struct NoJitter;

impl JitterSource for NoJitter {
    fn sample(&self, _max: Duration) -> Duration {
        Duration::ZERO
    }
}

/// Errors from constructing an invalid backoff policy
#[derive(Debug, Error)]
pub enum BackoffError {
    #[error("Invalid backoff policy: {message}")]
    Invalid { message: String },
}

/// Exponential backoff policy
///
/// Pure and side-effect free: `delay` neither sleeps nor mutates state, and
/// the result can never be negative. Delays saturate at `Duration::MAX`
/// rather than overflowing for large attempt numbers.
#[derive(Clone)]
pub struct ExponentialBackoff {
    base_delay: Duration,
    multiplier: f64,
    jitter_max: Duration,
    jitter: Arc<dyn JitterSource>,
}

impl fmt::Debug for ExponentialBackoff {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExponentialBackoff")
            .field("base_delay", &self.base_delay)
            .field("multiplier", &self.multiplier)
            .field("jitter_max", &self.jitter_max)
            .finish()
    }
}

impl ExponentialBackoff {
    /// Create a policy using the thread-local RNG for jitter
    pub fn new(
        base_delay: Duration,
        multiplier: f64,
        jitter_max: Duration,
    ) -> Result<Self, BackoffError> {
        Self::with_jitter_source(base_delay, multiplier, jitter_max, Arc::new(ThreadRngJitter))
    }

    /// Create a policy with a custom jitter source (useful for testing)
    pub fn with_jitter_source(
        base_delay: Duration,
        multiplier: f64,
        jitter_max: Duration,
        jitter: Arc<dyn JitterSource>,
    ) -> Result<Self, BackoffError> {
        if base_delay.is_zero() {
            return Err(BackoffError::Invalid {
                message: "base_delay must be greater than zero".to_string(),
            });
        }
        if !multiplier.is_finite() || multiplier < 1.0 {
            return Err(BackoffError::Invalid {
                message: "multiplier must be a finite value >= 1.0".to_string(),
            });
        }
        Ok(Self { base_delay, multiplier, jitter_max, jitter })
    }

    /// Compute the delay before retry attempt `attempt` (0-based)
    pub fn delay(&self, attempt: u32) -> Duration {
        let exponent = attempt.min(i32::MAX as u32) as i32;
        let scaled = self.base_delay.as_millis() as f64 * self.multiplier.powi(exponent);
        let scaled_ms = if scaled.is_finite() { scaled.min(u64::MAX as f64) as u64 } else { u64::MAX };

        Duration::from_millis(scaled_ms).saturating_add(self.jitter.sample(self.jitter_max))
    }

    pub fn base_delay(&self) -> Duration {
        self.base_delay
    }

    pub fn multiplier(&self) -> f64 {
        self.multiplier
    }

    pub fn jitter_max(&self) -> Duration {
        self.jitter_max
    }
}
