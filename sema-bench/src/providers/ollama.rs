//! Ollama native chat client for local and self-hosted models

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::{Arc, Once};
use std::time::Duration;

use super::traits::{
    apply_overrides, error_from_response, merge_nested, to_object, transport_error, ClientOptions,
    InvokeOptions, ModelClient, ProviderError, ProviderResult,
};
use crate::config::ModelConfig;
use crate::runner::retry::RetryPolicy;

const DEFAULT_HOST: &str = "http://localhost:11434";
const LOOPBACK_HOSTS: &[&str] = &["localhost", "127.0.0.1"];

/// Ollama API client
pub struct OllamaClient {
    config: Arc<ModelConfig>,
    host: String,
    temperature: Option<f32>,
    http_client: Client,
    timeout: Duration,
    retry: RetryPolicy,
}

impl OllamaClient {
    pub fn new(config: Arc<ModelConfig>, options: &ClientOptions) -> ProviderResult<Self> {
        exempt_loopback_from_proxy();

        Ok(Self {
            host: host_from_base_url(&config.base_url),
            temperature: options.effective_temperature(&config),
            http_client: options.http_client()?,
            timeout: options.timeout,
            retry: options.retry.clone(),
            config,
        })
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn build_payload(
        &self,
        prompt: &str,
        options: &InvokeOptions,
    ) -> ProviderResult<Map<String, Value>> {
        let body = OllamaRequest {
            model: &self.config.name,
            messages: vec![OllamaMessage {
                role: "user",
                content: prompt,
            }],
            stream: false,
            options: self.temperature.map(|temperature| OllamaOptions { temperature }),
        };
        let mut payload = to_object(&body)?;

        let mut top_level = options.payload_override.clone();
        if let Some(Value::Object(extra)) = top_level.remove("options") {
            merge_nested(&mut payload, "options", &extra);
        }
        apply_overrides(&mut payload, &top_level);
        Ok(payload)
    }

    async fn send(&self, payload: &Map<String, Value>) -> ProviderResult<String> {
        let response = self
            .http_client
            .post(format!("{}/api/chat", self.host))
            .json(payload)
            .send()
            .await
            .map_err(|e| transport_error(e, self.timeout))?;

        if !response.status().is_success() {
            return Err(error_from_response(response).await);
        }

        let api_response: OllamaResponse = response
            .json()
            .await
            .map_err(|e| transport_error(e, self.timeout))?;
        extract_text(api_response).ok_or_else(|| ProviderError::Generation {
            provider: "ollama".to_string(),
        })
    }
}

static LOOPBACK_NO_PROXY: Once = Once::new();

/// Add the loopback hosts to `NO_PROXY`, at most once per process.
///
/// Call this before spawning threads that may read the environment.
pub fn exempt_loopback_from_proxy() {
    LOOPBACK_NO_PROXY.call_once(|| {
        if let Some(merged) = merge_no_proxy(std::env::var("NO_PROXY").ok().as_deref()) {
            tracing::debug!("Setting NO_PROXY={}", merged);
            std::env::set_var("NO_PROXY", merged);
        }
    });
}

/// Strip a trailing `/` and `/v1` so an OpenAI-style base URL points at the native API
pub fn host_from_base_url(base_url: &str) -> String {
    let trimmed = base_url.trim().trim_end_matches('/');
    let trimmed = trimmed.strip_suffix("/v1").unwrap_or(trimmed).trim_end_matches('/');
    if trimmed.is_empty() {
        DEFAULT_HOST.to_string()
    } else {
        trimmed.to_string()
    }
}

/// New `NO_PROXY` value with loopback hosts appended, or `None` when one is
/// already listed.
pub fn merge_no_proxy(existing: Option<&str>) -> Option<String> {
    let existing = existing.unwrap_or("").trim();
    let already_listed = existing
        .split(',')
        .map(str::trim)
        .any(|entry| LOOPBACK_HOSTS.contains(&entry));
    if already_listed {
        return None;
    }

    let loopback = LOOPBACK_HOSTS.join(",");
    if existing.is_empty() {
        Some(loopback)
    } else {
        Some(format!("{},{}", existing.trim_end_matches(','), loopback))
    }
}

#[derive(Serialize)]
struct OllamaRequest<'a> {
    model: &'a str,
    messages: Vec<OllamaMessage<'a>>,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    options: Option<OllamaOptions>,
}

#[derive(Serialize)]
struct OllamaMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct OllamaOptions {
    temperature: f32,
}

#[derive(Deserialize)]
struct OllamaResponse {
    message: Option<ResponseMessage>,
    content: Option<String>,
}

#[derive(Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

/// `message.content`, then top-level `content`
fn extract_text(response: OllamaResponse) -> Option<String> {
    response
        .message
        .and_then(|m| m.content)
        .filter(|s| !s.is_empty())
        .or(response.content.filter(|s| !s.is_empty()))
}

#[async_trait]
impl ModelClient for OllamaClient {
    fn provider(&self) -> &str {
        "ollama"
    }

    fn config(&self) -> &ModelConfig {
        &self.config
    }

    async fn invoke(&self, prompt: &str, options: &InvokeOptions) -> ProviderResult<String> {
        let payload = self.build_payload(prompt, options)?;
        tracing::debug!("ollama request for {} at {}", self.config.name, self.host);
        self.retry
            .run(&format!("ollama:{}", self.config.name), || self.send(&payload))
            .await
    }
}
