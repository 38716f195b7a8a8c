//! Reqwest-backed payment transport
//!
//! A thin adapter: one request in, one response or classified transport
//! error out. Retry and breaker logic stay in `chargeguard-core`; this
//! layer only maps the wire.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use chargeguard_core::{
    PaymentTransport, TransportError, TransportHealth, TransportRequest, TransportResponse,
};
use chargeguard_domain::{ChargeGuardError, ClientConfig};
use reqwest::Client as ReqwestClient;
use tracing::debug;

/// Bound on the health probe, independent of the charge timeout
const HEALTH_PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// HTTP transport for the payment provider
#[derive(Clone)]
pub struct HttpTransport {
    client: ReqwestClient,
    base_url: String,
}

impl HttpTransport {
    /// Start building a new transport for the given provider base URL
    pub fn builder(base_url: impl Into<String>) -> HttpTransportBuilder {
        HttpTransportBuilder {
            base_url: base_url.into(),
            connect_timeout: Duration::from_secs(10),
            user_agent: None,
        }
    }

    /// Convenience constructor wiring the transport from client configuration
    pub fn from_config(config: &ClientConfig) -> Result<Self, ChargeGuardError> {
        Self::builder(config.endpoint.clone()).build()
    }

    fn health_url(&self) -> String {
        format!("{}/health", self.base_url.trim_end_matches('/'))
    }
}

/// Builder for [`HttpTransport`]
#[derive(Debug)]
pub struct HttpTransportBuilder {
    base_url: String,
    connect_timeout: Duration,
    user_agent: Option<String>,
}

impl HttpTransportBuilder {
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn user_agent(mut self, agent: impl Into<String>) -> Self {
        self.user_agent = Some(agent.into());
        self
    }

    pub fn build(self) -> Result<HttpTransport, ChargeGuardError> {
        let mut builder =
            ReqwestClient::builder().connect_timeout(self.connect_timeout).no_proxy();

        if let Some(agent) = self.user_agent {
            builder = builder.user_agent(agent);
        }

        let client = builder
            .build()
            .map_err(|err| ChargeGuardError::Config(format!("failed to build HTTP client: {err}")))?;

        Ok(HttpTransport { client, base_url: self.base_url })
    }
}

#[async_trait]
impl PaymentTransport for HttpTransport {
    async fn send(&self, request: TransportRequest) -> Result<TransportResponse, TransportError> {
        let method =
            reqwest::Method::from_bytes(request.method.as_bytes()).map_err(|_| {
                TransportError::Connection {
                    message: format!("invalid HTTP method: {}", request.method),
                }
            })?;

        let mut builder = self
            .client
            .request(method, &request.url)
            .timeout(request.timeout)
            .body(request.body);
        for (name, value) in &request.headers {
            builder = builder.header(name, value);
        }

        debug!(url = %request.url, timeout = ?request.timeout, "sending HTTP request");
        let started = Instant::now();

        let response = builder.send().await.map_err(|err| map_error(err, started.elapsed()))?;
        let status = response.status().as_u16();
        let body = response.text().await.map_err(|err| map_error(err, started.elapsed()))?;

        debug!(status, elapsed = ?started.elapsed(), "received HTTP response");
        Ok(TransportResponse { status, body })
    }

    async fn health_check(&self) -> TransportHealth {
        let url = self.health_url();
        let started = Instant::now();

        match self.client.get(&url).timeout(HEALTH_PROBE_TIMEOUT).send().await {
            Ok(response) => TransportHealth {
                healthy: response.status().is_success(),
                response_time_ms: Some(started.elapsed().as_millis() as u64),
                status_code: Some(response.status().as_u16()),
                error: None,
            },
            Err(err) => {
                debug!(url = %url, error = %err, "health probe failed");
                TransportHealth {
                    healthy: false,
                    response_time_ms: None,
                    status_code: None,
                    error: Some(err.to_string()),
                }
            }
        }
    }
}

fn map_error(err: reqwest::Error, elapsed: Duration) -> TransportError {
    if err.is_timeout() {
        TransportError::Timeout { elapsed }
    } else if err.is_connect() {
        TransportError::Connection { message: format!("payment gateway unreachable: {err}") }
    } else {
        TransportError::Connection { message: err.to_string() }
    }
}
