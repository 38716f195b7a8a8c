//! Payment gateway port interfaces
//!
//! The charge service depends on this narrow contract only; the concrete
//! HTTP implementation lives in `chargeguard-infra`.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// One outbound request as the transport sees it
#[derive(Debug, Clone)]
pub struct TransportRequest {
    pub method: String,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: String,
    /// Upper bound the transport should enforce on the whole exchange. The
    /// service additionally enforces it on its side, so a misbehaving
    /// transport cannot stall an attempt.
    pub timeout: Duration,
}

/// Response to a completed exchange, successful or not at the HTTP level
#[derive(Debug, Clone)]
pub struct TransportResponse {
    pub status: u16,
    pub body: String,
}

/// Failures below the HTTP layer
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("request timed out after {elapsed:?}")]
    Timeout { elapsed: Duration },

    #[error("connection failed: {message}")]
    Connection { message: String },
}

/// Result of probing the remote dependency's health endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransportHealth {
    pub healthy: bool,
    pub response_time_ms: Option<u64>,
    pub status_code: Option<u16>,
    pub error: Option<String>,
}

impl TransportHealth {
    /// Placeholder for transports without a health endpoint
    pub fn unsupported() -> Self {
        Self {
            healthy: false,
            response_time_ms: None,
            status_code: None,
            error: Some("health probe not supported by this transport".to_string()),
        }
    }
}

/// Trait for the one network operation the charge service performs
#[async_trait]
pub trait PaymentTransport: Send + Sync {
    /// Perform a single exchange with the payment provider
    async fn send(&self, request: TransportRequest) -> Result<TransportResponse, TransportError>;

    /// Probe the provider's health endpoint
    async fn health_check(&self) -> TransportHealth {
        TransportHealth::unsupported()
    }
}
