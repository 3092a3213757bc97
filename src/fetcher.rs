//! Timeout-bounded HTTP probing

use crate::config::DEFAULT_TIMEOUT;
use crate::errors::Result;
use async_trait::async_trait;
use reqwest::{Client, Method, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, warn};

/// Error reason recorded when a probe exceeds its timeout
pub const TIMEOUT_REASON: &str = "timeout";

/// Per-request options for a probe
#[derive(Debug, Clone)]
pub struct FetchOptions {
    pub timeout: Duration,
    pub method: Method,
    pub headers: Vec<(String, String)>,
    pub body: Option<String>,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            method: Method::GET,
            headers: Vec::new(),
            body: None,
        }
    }
}

impl FetchOptions {
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }

    /// Turn the request into a POST carrying `body`
    pub fn post(mut self, body: impl Into<String>) -> Self {
        self.method = Method::POST;
        self.body = Some(body.into());
        self
    }
}

/// Normalized outcome of one probe
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FetchResult {
    pub ok: bool,
    /// HTTP status, 0 when no response was received
    pub status: u16,
    pub data: Value,
}

impl FetchResult {
    /// Build a result from a received response, keeping non-JSON bodies as text
    pub fn from_response(status: StatusCode, body: String) -> Self {
        let data = match serde_json::from_str::<Value>(&body) {
            Ok(value) => value,
            Err(_) => Value::String(body),
        };

        Self {
            ok: status.is_success(),
            status: status.as_u16(),
            data,
        }
    }

    pub fn failure(reason: impl Into<String>) -> Self {
        Self {
            ok: false,
            status: 0,
            data: json!({ "error": reason.into() }),
        }
    }

    pub fn timeout() -> Self {
        Self::failure(TIMEOUT_REASON)
    }

    /// The failure reason, if this result never received a response
    pub fn error_reason(&self) -> Option<&str> {
        if self.status != 0 {
            return None;
        }
        self.data.get("error").and_then(Value::as_str)
    }

    pub fn is_timeout(&self) -> bool {
        self.error_reason() == Some(TIMEOUT_REASON)
    }
}

/// Capability to perform a single probe; never fails
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, url: &str, options: &FetchOptions) -> FetchResult;
}

/// reqwest-backed fetcher enforcing the per-request timeout
#[derive(Debug, Clone)]
pub struct BoundedFetcher {
    client: Client,
}

impl BoundedFetcher {
    pub fn new() -> Result<Self> {
        let client = Client::builder()
            .user_agent(format!("drweb/{}", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self { client })
    }

    /// Send the request and read the whole body as text
    async fn exchange(&self, url: &str, options: &FetchOptions) -> reqwest::Result<(StatusCode, String)> {
        let mut request = self.client.request(options.method.clone(), url);
        for (name, value) in &options.headers {
            request = request.header(name.as_str(), value.as_str());
        }
        if let Some(body) = &options.body {
            request = request.body(body.clone());
        }

        let response = request.send().await?;
        let status = response.status();
        let body = response.text().await?;
        Ok((status, body))
    }
}

#[async_trait]
impl Fetcher for BoundedFetcher {
    async fn fetch(&self, url: &str, options: &FetchOptions) -> FetchResult {
        debug!("Probing {} {} (timeout {}ms)", options.method, url, options.timeout.as_millis());

        // Dropping the timeout future cancels the request and releases the timer
        let result = match timeout(options.timeout, self.exchange(url, options)).await {
            Ok(Ok((status, body))) => FetchResult::from_response(status, body),
            Ok(Err(e)) if e.is_timeout() => FetchResult::timeout(),
            Ok(Err(e)) => FetchResult::failure(error_chain(&e)),
            Err(_) => FetchResult::timeout(),
        };

        if result.ok {
            debug!("Probe {} answered {}", url, result.status);
        } else if let Some(reason) = result.error_reason() {
            warn!("Probe {} failed: {}", url, reason);
        } else {
            warn!("Probe {} answered {}", url, result.status);
        }

        result
    }
}

/// Render an error together with its sources
fn error_chain(err: &dyn std::error::Error) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        let cause_text = cause.to_string();
        if !message.contains(&cause_text) {
            message.push_str(": ");
            message.push_str(&cause_text);
        }
        source = cause.source();
    }
    message
}
