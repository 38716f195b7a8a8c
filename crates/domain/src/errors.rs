//! Error types used throughout the application
//!
//! Ordinary remote failures are not errors here; they surface as
//! [`crate::types::ChargeResult`] values. This enum covers the faults that
//! do propagate: contract violations detected before any network attempt
//! and configuration problems.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Main error type for chargeguard
#[derive(Error, Debug, Serialize, Deserialize)]
#[serde(tag = "type", content = "message")]
pub enum ChargeGuardError {
    #[error("Invalid charge request: {0}")]
    InvalidRequest(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias for chargeguard operations
pub type Result<T> = std::result::Result<T, ChargeGuardError>;
