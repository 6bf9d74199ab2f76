use std::env;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

pub const ENV_API_BASE_URL: &str = "TESTOPS_API_BASE_URL";
pub const ENV_STORE_DIR: &str = "TESTOPS_STORE_DIR";
pub const ENV_REQUEST_TIMEOUT_MS: &str = "TESTOPS_REQUEST_TIMEOUT_MS";

pub const DEFAULT_API_BASE_URL: &str = "http://127.0.0.1:8000";
pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 300_000;
pub const MIN_REQUEST_TIMEOUT_MS: u64 = 1_000;
const STORE_DIR_NAME: &str = "testops-copilot";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("base url must not be empty")]
    EmptyBaseUrl,
    #[error("base url must be http(s) with a host: {0}")]
    InvalidBaseUrl(String),
    #[error("invalid {ENV_REQUEST_TIMEOUT_MS}: {0}")]
    InvalidRequestTimeout(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CopilotConfig {
    pub api_base_url: String,
    pub store_dir: PathBuf,
    pub request_timeout: Duration,
}

impl CopilotConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let api_base_url = normalize_base_url(
            non_empty(&lookup, ENV_API_BASE_URL)
                .as_deref()
                .unwrap_or(DEFAULT_API_BASE_URL),
        )?;
        let store_dir = non_empty(&lookup, ENV_STORE_DIR)
            .map_or_else(default_store_dir, PathBuf::from);
        let timeout_ms = match non_empty(&lookup, ENV_REQUEST_TIMEOUT_MS) {
            Some(raw) => raw
                .parse::<u64>()
                .map_err(|error| ConfigError::InvalidRequestTimeout(format!("{raw}: {error}")))?
                .max(MIN_REQUEST_TIMEOUT_MS),
            None => DEFAULT_REQUEST_TIMEOUT_MS,
        };
        Ok(Self {
            api_base_url,
            store_dir,
            request_timeout: Duration::from_millis(timeout_ms),
        })
    }
}

pub fn normalize_base_url(raw: &str) -> Result<String, ConfigError> {
    let trimmed = raw.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        return Err(ConfigError::EmptyBaseUrl);
    }
    let Some((scheme, remainder)) = trimmed.split_once("://") else {
        return Err(ConfigError::InvalidBaseUrl(trimmed.to_string()));
    };
    if !matches!(scheme, "http" | "https")
        || remainder.trim().is_empty()
        || remainder.starts_with('/')
    {
        return Err(ConfigError::InvalidBaseUrl(trimmed.to_string()));
    }
    Ok(trimmed.to_string())
}

/// `<data_local_dir>/testops-copilot`, then `~/.testops-copilot`, then the
/// working directory.
#[must_use]
pub fn default_store_dir() -> PathBuf {
    dirs::data_local_dir()
        .map(|dir| dir.join(STORE_DIR_NAME))
        .or_else(|| dirs::home_dir().map(|home| home.join(format!(".{STORE_DIR_NAME}"))))
        .unwrap_or_else(|| PathBuf::from(format!(".{STORE_DIR_NAME}")))
}

fn non_empty(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<String> {
    lookup(key)
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}
