//! Provider trait definitions for LLM API clients

use async_trait::async_trait;
use reqwest::header::RETRY_AFTER;
use reqwest::{Client, Response, StatusCode};
use serde_json::{Map, Value};
use std::time::Duration;

use crate::config::ModelConfig;
use crate::runner::retry::{RetryPolicy, Retryable};

/// Default per-request timeout for model calls
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

/// Per-call options for [`ModelClient::invoke`]
#[derive(Debug, Clone, Default)]
pub struct InvokeOptions {
    /// Merged into the provider request body; keys here win over the
    /// adapter's computed defaults.
    pub payload_override: Map<String, Value>,
}

impl InvokeOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_override(mut self, key: impl Into<String>, value: Value) -> Self {
        self.payload_override.insert(key.into(), value);
        self
    }
}

/// Construction-time options shared by every adapter
#[derive(Debug, Clone)]
pub struct ClientOptions {
    pub timeout: Duration,
    pub retry: RetryPolicy,
    /// Replaces the registry temperature when set
    pub temperature: Option<f32>,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            retry: RetryPolicy::default(),
            temperature: None,
        }
    }
}

impl ClientOptions {
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_temperature(mut self, temperature: Option<f32>) -> Self {
        self.temperature = temperature;
        self
    }

    /// Temperature to send: the override, else the model's configured value
    pub fn effective_temperature(&self, config: &ModelConfig) -> Option<f32> {
        self.temperature.or(config.temperature)
    }

    pub fn http_client(&self) -> ProviderResult<Client> {
        Client::builder()
            .timeout(self.timeout)
            .build()
            .map_err(ProviderError::Http)
    }
}

/// Error types for provider operations
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    #[error("Authentication failed ({status}): {message}")]
    Auth { status: u16, message: String },

    #[error("Rate limited: retry after {retry_after_ms:?}ms")]
    RateLimited { retry_after_ms: Option<u64> },

    #[error("Timeout after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("{provider} response missing generated content")]
    Generation { provider: String },
}

pub type ProviderResult<T> = Result<T, ProviderError>;

impl Retryable for ProviderError {
    fn is_retryable(&self) -> bool {
        match self {
            ProviderError::Http(e) => {
                e.is_timeout() || e.is_connect() || e.is_request() || e.is_body() || e.is_decode()
            }
            ProviderError::Api { status, .. } => *status >= 500 || *status == 408,
            ProviderError::RateLimited { .. } => true,
            ProviderError::Timeout { .. } => true,
            ProviderError::Generation { .. } => true,
            ProviderError::Auth { .. }
            | ProviderError::Parse(_)
            | ProviderError::Config(_) => false,
        }
    }

    fn retry_after(&self) -> Option<Duration> {
        match self {
            ProviderError::RateLimited {
                retry_after_ms: Some(ms),
            } => Some(Duration::from_millis(*ms)),
            _ => None,
        }
    }
}

/// An asynchronous client for one configured model
#[async_trait]
pub trait ModelClient: Send + Sync {
    /// Adapter tag (e.g., "openai", "anthropic", "gemini", "ollama")
    fn provider(&self) -> &str;

    /// The model configuration this client was built from
    fn config(&self) -> &ModelConfig;

    /// Send `prompt` as a single user message and return the generated text
    async fn invoke(&self, prompt: &str, options: &InvokeOptions) -> ProviderResult<String>;
}

/// Shallow-merge `overrides` into a JSON object payload
pub(crate) fn apply_overrides(payload: &mut Map<String, Value>, overrides: &Map<String, Value>) {
    for (key, value) in overrides {
        payload.insert(key.clone(), value.clone());
    }
}

/// Merge `extra` into the object stored at `payload[key]`, creating it if needed
pub(crate) fn merge_nested(
    payload: &mut Map<String, Value>,
    key: &str,
    extra: &Map<String, Value>,
) {
    if extra.is_empty() {
        return;
    }
    let slot = payload
        .entry(key.to_string())
        .or_insert_with(|| Value::Object(Map::new()));
    if !slot.is_object() {
        *slot = Value::Object(Map::new());
    }
    if let Value::Object(target) = slot {
        apply_overrides(target, extra);
    }
}

/// Convert a serializable request body into a JSON object
pub(crate) fn to_object<T: serde::Serialize>(body: &T) -> ProviderResult<Map<String, Value>> {
    match serde_json::to_value(body) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(other) => Err(ProviderError::Parse(format!("request body is not an object: {}", other))),
        Err(e) => Err(ProviderError::Parse(e.to_string())),
    }
}

/// Client-side timeouts become [`ProviderError::Timeout`]; everything else stays `Http`
pub(crate) fn transport_error(err: reqwest::Error, timeout: Duration) -> ProviderError {
    if err.is_timeout() {
        ProviderError::Timeout {
            timeout_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
        }
    } else {
        ProviderError::Http(err)
    }
}

/// Map a non-success HTTP response onto a [`ProviderError`]
pub(crate) async fn error_from_response(response: Response) -> ProviderError {
    let status = response.status();

    if status == StatusCode::TOO_MANY_REQUESTS {
        let retry_after_ms = response
            .headers()
            .get(RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.trim().parse::<u64>().ok())
            .map(|secs| secs * 1000);
        return ProviderError::RateLimited { retry_after_ms };
    }

    let body = response.text().await.unwrap_or_default();
    let message =
        error_message(&body).unwrap_or_else(|| format!("HTTP {}: {}", status.as_u16(), body));

    // 401/403 are auth errors, never worth retrying
    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        return ProviderError::Auth {
            status: status.as_u16(),
            message,
        };
    }

    ProviderError::Api {
        status: status.as_u16(),
        message,
    }
}

/// Pull a human-readable message out of a vendor error body.
///
/// Covers `{"error": {"message": ...}}` (OpenAI, Anthropic, Gemini) and
/// `{"error": "..."}` (Ollama).
fn error_message(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;
    match value.get("error")? {
        Value::String(s) => Some(s.clone()),
        Value::Object(obj) => obj.get("message").and_then(Value::as_str).map(String::from),
        _ => None,
    }
}
