//! Backend contract: the injected transport and the typed API over it.

use std::sync::Arc;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::request::{CommitRequestBody, DefectsRequestBody, GenerateRequestBody};
use crate::scenario::BuiltinScenario;

pub const GENERATE_PATH: &str = "/generate";
pub const COMMIT_PATH: &str = "/commit";
pub const ANALYZE_DEFECTS_PATH: &str = "/analyze_defects";

/// Shown when a failure carries neither a backend detail nor a transport message.
pub const GENERIC_ERROR_MESSAGE: &str = "Unknown error";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    #[error("backend_http_{status}:{body}")]
    Http {
        status: u16,
        detail: Option<String>,
        body: String,
    },
    #[error("backend_request_failed:{message}")]
    Request { message: String },
    #[error("backend_json_decode_failed:{message}")]
    Decode { message: String },
}

impl TransportError {
    /// Backend `detail` first, then the transport message, then `fallback`.
    /// An HTTP failure without a detail reports its status code.
    #[must_use]
    pub fn user_message(&self, fallback: &str) -> String {
        match self {
            Self::Http { status, detail, .. } => detail
                .as_deref()
                .map(str::trim)
                .filter(|detail| !detail.is_empty())
                .map_or_else(
                    || format!("Request failed with status code {status}"),
                    str::to_string,
                ),
            Self::Request { message } | Self::Decode { message } => {
                let message = message.trim();
                if message.is_empty() {
                    fallback.to_string()
                } else {
                    message.to_string()
                }
            }
        }
    }
}

/// Error body shape shared by every endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct ErrorBody {
    pub detail: serde_json::Value,
}

/// Pulls a readable `detail` out of a failure body, if it has one.
#[must_use]
pub fn extract_detail(body: &[u8]) -> Option<String> {
    let parsed = serde_json::from_slice::<ErrorBody>(body).ok()?;
    let detail = match parsed.detail {
        serde_json::Value::String(text) => text,
        serde_json::Value::Null => return None,
        other => other.to_string(),
    };
    let trimmed = detail.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

#[async_trait]
pub trait BackendTransport: Send + Sync {
    async fn get_json(&self, path: &str) -> Result<serde_json::Value, TransportError>;

    async fn post_json(
        &self,
        path: &str,
        body: serde_json::Value,
    ) -> Result<serde_json::Value, TransportError>;
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PromptResponse {
    pub prompt: String,
    #[serde(default, rename = "type")]
    pub scenario: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationMetrics {
    #[serde(default)]
    pub duration_s: Option<f64>,
    #[serde(default)]
    pub memory_mb: Option<f64>,
    #[serde(default)]
    pub per_case_s: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationValidation {
    pub valid: bool,
    #[serde(default)]
    pub issues: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct GenerateResponse {
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub metrics: Option<GenerationMetrics>,
    #[serde(default)]
    pub validation: Option<GenerationValidation>,
    #[serde(default, rename = "type")]
    pub scenario: Option<String>,
    #[serde(default)]
    pub raw_length: Option<u64>,
    #[serde(default)]
    pub clean_length: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CommitResponse {
    #[serde(default)]
    pub commit_sha: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DefectsResponse {
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub count: Option<u64>,
    #[serde(default)]
    pub recommendations: Option<String>,
}

/// Typed calls over whichever [`BackendTransport`] the host injects.
#[derive(Clone)]
pub struct CopilotApi {
    transport: Arc<dyn BackendTransport>,
}

impl CopilotApi {
    pub fn new(transport: Arc<dyn BackendTransport>) -> Self {
        Self { transport }
    }

    #[must_use]
    pub fn prompt_path(scenario: BuiltinScenario) -> String {
        format!("/prompt/{}", scenario.as_str())
    }

    pub async fn fetch_prompt(
        &self,
        scenario: BuiltinScenario,
    ) -> Result<PromptResponse, TransportError> {
        let value = self
            .transport
            .get_json(Self::prompt_path(scenario).as_str())
            .await?;
        decode(value)
    }

    pub async fn generate(
        &self,
        body: &GenerateRequestBody,
    ) -> Result<GenerateResponse, TransportError> {
        self.post(GENERATE_PATH, body).await
    }

    pub async fn commit(&self, body: &CommitRequestBody) -> Result<CommitResponse, TransportError> {
        self.post(COMMIT_PATH, body).await
    }

    pub async fn analyze_defects(
        &self,
        body: &DefectsRequestBody,
    ) -> Result<DefectsResponse, TransportError> {
        self.post(ANALYZE_DEFECTS_PATH, body).await
    }

    async fn post<Req, Res>(&self, path: &str, body: &Req) -> Result<Res, TransportError>
    where
        Req: Serialize + ?Sized,
        Res: DeserializeOwned,
    {
        let payload = serde_json::to_value(body).map_err(|error| TransportError::Decode {
            message: format!("request encode failed: {error}"),
        })?;
        let value = self.transport.post_json(path, payload).await?;
        decode(value)
    }
}

fn decode<T>(value: serde_json::Value) -> Result<T, TransportError>
where
    T: DeserializeOwned,
{
    serde_json::from_value(value).map_err(|error| TransportError::Decode {
        message: error.to_string(),
    })
}
