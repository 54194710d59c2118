//! Transport collaborator seam
//!
//! The engine never builds TLS, pooling, or auth details; it hands a fully
//! adapted request to whatever implements [`Transport`] and gets back a
//! status plus JSON body. [`HttpTransport`] is the reqwest-backed reference
//! implementation with retryable-failure handling; embedders with their own
//! HTTP stack implement the trait instead.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use backoff::backoff::Backoff;
use backoff::ExponentialBackoff;
use serde_json::{Map, Value};
use thiserror::Error;
use url::Url;

use crate::error::{Error, Result};

/// A fully adapted request ready to go over the wire
#[derive(Debug, Clone)]
pub struct TransportRequest {
    pub method: String,
    pub endpoint: String,
    pub params: Map<String, Value>,
    pub headers: HashMap<String, String>,
}

impl TransportRequest {
    pub fn new(method: impl Into<String>, endpoint: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            endpoint: endpoint.into(),
            params: Map::new(),
            headers: HashMap::new(),
        }
    }

    pub fn get(endpoint: impl Into<String>) -> Self {
        Self::new("GET", endpoint)
    }

    pub fn with_params(mut self, params: Map<String, Value>) -> Self {
        self.params = params;
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }
}

/// Status and parsed JSON body of a completed call
#[derive(Debug, Clone)]
pub struct TransportResponse {
    pub status: u16,
    pub body: Value,
}

impl TransportResponse {
    pub fn new(status: u16, body: Value) -> Self {
        Self { status, body }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Transport collaborator failure
///
/// Surfaced to callers uninterpreted; the engine only inspects it to decide
/// retryability inside [`HttpTransport`].
#[derive(Error, Debug)]
pub enum TransportError {
    /// The request never produced a response
    #[error("request to {endpoint} failed: {message}")]
    Request {
        endpoint: String,
        message: String,
        #[source]
        source: Option<anyhow::Error>,
    },

    /// The server answered with a non-success status
    #[error("server returned status {status} for {endpoint}")]
    Status {
        endpoint: String,
        status: u16,
        body: Option<String>,
    },

    /// The response body was not usable JSON
    #[error("invalid response body from {endpoint}: {message}")]
    Body { endpoint: String, message: String },
}

impl TransportError {
    pub fn status(&self) -> Option<u16> {
        match self {
            TransportError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Connection failures, timeouts, 429 and 5xx are worth retrying
    pub fn is_retryable(&self) -> bool {
        match self {
            TransportError::Request { .. } => true,
            TransportError::Status { status, .. } => *status == 429 || *status >= 500,
            TransportError::Body { .. } => false,
        }
    }
}

/// The transport seam consumed by the detector and the gateway
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(
        &self,
        request: TransportRequest,
    ) -> std::result::Result<TransportResponse, TransportError>;
}

/// Retry policy for transient transport failures
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Maximum number of attempts, including the first
    pub max_attempts: u32,
    /// Base delay for exponential backoff (in seconds)
    pub base_delay_secs: u64,
    /// Maximum delay between retries (in seconds)
    pub max_delay_secs: u64,
    /// Multiplier for exponential backoff
    pub multiplier: f64,
    /// Whether to add jitter to prevent thundering herd
    pub jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_secs: 1,
            max_delay_secs: 30,
            multiplier: 2.0,
            jitter: true,
        }
    }
}

impl RetryPolicy {
    /// Policy that never retries
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            ..Default::default()
        }
    }

    fn create_backoff(&self) -> ExponentialBackoff {
        let mut backoff = ExponentialBackoff {
            initial_interval: Duration::from_secs(self.base_delay_secs),
            max_interval: Duration::from_secs(self.max_delay_secs),
            multiplier: self.multiplier,
            max_elapsed_time: None,
            ..Default::default()
        };
        if !self.jitter {
            backoff.randomization_factor = 0.0;
        }
        backoff
    }
}

/// Configuration for the reqwest-backed transport
#[derive(Debug, Clone)]
pub struct HttpTransportConfig {
    /// Request timeout in seconds
    pub timeout_secs: u64,
    pub retry: RetryPolicy,
}

impl Default for HttpTransportConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            retry: RetryPolicy::default(),
        }
    }
}

/// Reference [`Transport`] over reqwest
///
/// GET parameters become query pairs; other methods carry the parameter map
/// as a JSON body. Auth headers are the embedder's problem; pass them per
/// request or wrap the transport.
pub struct HttpTransport {
    base_url: Url,
    client: reqwest::Client,
    config: HttpTransportConfig,
}

impl HttpTransport {
    /// Create a transport for a server base URL
    pub fn new(base_url: &str) -> Result<Self> {
        Self::with_config(base_url, HttpTransportConfig::default())
    }

    pub fn with_config(base_url: &str, config: HttpTransportConfig) -> Result<Self> {
        let base_url = Url::parse(base_url).map_err(|e| Error::Configuration {
            message: format!("invalid base URL '{}': {}", base_url, e),
            source: Some(anyhow::Error::new(e)),
        })?;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| Error::Configuration {
                message: format!("failed to create HTTP client: {}", e),
                source: Some(anyhow::Error::new(e)),
            })?;
        Ok(Self {
            base_url,
            client,
            config,
        })
    }

    async fn send_once(
        &self,
        request: &TransportRequest,
    ) -> std::result::Result<TransportResponse, TransportError> {
        let url = self
            .base_url
            .join(&request.endpoint)
            .map_err(|e| TransportError::Request {
                endpoint: request.endpoint.clone(),
                message: format!("invalid endpoint path: {}", e),
                source: Some(anyhow::Error::new(e)),
            })?;

        let method = reqwest::Method::from_bytes(request.method.as_bytes()).map_err(|e| {
            TransportError::Request {
                endpoint: request.endpoint.clone(),
                message: format!("invalid method '{}': {}", request.method, e),
                source: Some(anyhow::Error::new(e)),
            }
        })?;

        let mut builder = self.client.request(method.clone(), url);
        if method == reqwest::Method::GET {
            let query: Vec<(String, String)> = request
                .params
                .iter()
                .map(|(key, value)| {
                    let rendered = match value {
                        Value::String(s) => s.clone(),
                        other => other.to_string(),
                    };
                    (key.clone(), rendered)
                })
                .collect();
            builder = builder.query(&query);
        } else {
            builder = builder.json(&request.params);
        }
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        let response = builder.send().await.map_err(|e| TransportError::Request {
            endpoint: request.endpoint.clone(),
            message: e.to_string(),
            source: Some(anyhow::Error::new(e)),
        })?;

        let status = response.status().as_u16();
        let text = response.text().await.map_err(|e| TransportError::Body {
            endpoint: request.endpoint.clone(),
            message: e.to_string(),
        })?;

        if !(200..300).contains(&status) {
            return Err(TransportError::Status {
                endpoint: request.endpoint.clone(),
                status,
                body: (!text.is_empty()).then_some(text),
            });
        }

        let body = if text.is_empty() {
            Value::Null
        } else {
            serde_json::from_str(&text).map_err(|e| TransportError::Body {
                endpoint: request.endpoint.clone(),
                message: e.to_string(),
            })?
        };

        Ok(TransportResponse::new(status, body))
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(
        &self,
        request: TransportRequest,
    ) -> std::result::Result<TransportResponse, TransportError> {
        let mut backoff = self.config.retry.create_backoff();
        let mut attempt = 1;
        loop {
            match self.send_once(&request).await {
                Ok(response) => return Ok(response),
                Err(error) => {
                    if attempt >= self.config.retry.max_attempts || !error.is_retryable() {
                        return Err(error);
                    }
                    let delay = backoff
                        .next_backoff()
                        .unwrap_or(Duration::from_secs(self.config.retry.max_delay_secs));
                    tracing::warn!(
                        endpoint = %request.endpoint,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %error,
                        "transport request failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }
}
