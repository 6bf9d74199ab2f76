#![cfg_attr(test, allow(clippy::expect_used))]

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde_json::Value;
use testops_core::config::{ConfigError, CopilotConfig, normalize_base_url};
use testops_core::transport::{BackendTransport, TransportError, extract_detail};
use uuid::Uuid;

pub const DEFAULT_TIMEOUT_MS: u64 = testops_core::config::DEFAULT_REQUEST_TIMEOUT_MS;
pub const MIN_TIMEOUT_MS: u64 = testops_core::config::MIN_REQUEST_TIMEOUT_MS;
pub const REQUEST_ID_HEADER: &str = "x-request-id";

#[derive(Debug, Clone)]
pub struct CopilotHttpClientConfig {
    pub base_url: String,
    pub timeout_ms: u64,
}

impl CopilotHttpClientConfig {
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            timeout_ms: DEFAULT_TIMEOUT_MS,
        }
    }
}

impl From<&CopilotConfig> for CopilotHttpClientConfig {
    fn from(config: &CopilotConfig) -> Self {
        Self {
            base_url: config.api_base_url.clone(),
            timeout_ms: u64::try_from(config.request_timeout.as_millis())
                .unwrap_or(u64::MAX),
        }
    }
}

/// One attempt per call; failures surface to the caller unchanged.
#[derive(Debug, Clone)]
pub struct CopilotHttpClient {
    base_url: String,
    timeout: Duration,
    http: reqwest::Client,
}

impl CopilotHttpClient {
    pub fn new(config: CopilotHttpClientConfig) -> Result<Self, ConfigError> {
        let base_url = normalize_base_url(&config.base_url)?;
        Ok(Self {
            base_url,
            timeout: Duration::from_millis(config.timeout_ms.max(MIN_TIMEOUT_MS)),
            http: reqwest::Client::new(),
        })
    }

    #[must_use]
    pub fn endpoint(&self, path: &str) -> Option<String> {
        let trimmed = path.trim();
        if trimmed.is_empty() {
            return None;
        }
        if trimmed.starts_with('/') {
            Some(format!("{}{}", self.base_url, trimmed))
        } else {
            Some(format!("{}/{}", self.base_url, trimmed))
        }
    }

    fn url(&self, path: &str) -> Result<String, TransportError> {
        self.endpoint(path).ok_or_else(|| TransportError::Request {
            message: "request path must not be empty".to_string(),
        })
    }

    async fn send(
        &self,
        request: reqwest::RequestBuilder,
        path: &str,
    ) -> Result<Value, TransportError> {
        let request_id = format!("req_{}", Uuid::new_v4().simple());
        tracing::debug!(path, request_id = %request_id, "backend request");
        let response = request
            .header(REQUEST_ID_HEADER, request_id.as_str())
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|error| TransportError::Request {
                message: error.to_string(),
            })?;
        decode_json_response(response).await
    }
}

#[async_trait]
impl BackendTransport for CopilotHttpClient {
    async fn get_json(&self, path: &str) -> Result<Value, TransportError> {
        let url = self.url(path)?;
        self.send(self.http.get(url.as_str()), path).await
    }

    async fn post_json(&self, path: &str, body: Value) -> Result<Value, TransportError> {
        let url = self.url(path)?;
        self.send(self.http.post(url.as_str()).json(&body), path).await
    }
}

#[must_use]
pub fn format_http_error(status: StatusCode, body: &[u8]) -> TransportError {
    TransportError::Http {
        status: status.as_u16(),
        detail: extract_detail(body),
        body: String::from_utf8_lossy(body).trim().to_string(),
    }
}

async fn decode_json_response(response: reqwest::Response) -> Result<Value, TransportError> {
    let status = response.status();
    let bytes = response
        .bytes()
        .await
        .map_err(|error| TransportError::Request {
            message: error.to_string(),
        })?;

    if !status.is_success() {
        let error = format_http_error(status, &bytes);
        tracing::debug!(status = status.as_u16(), error = %error, "backend returned an error");
        return Err(error);
    }

    serde_json::from_slice::<Value>(&bytes).map_err(|error| TransportError::Decode {
        message: error.to_string(),
    })
}
