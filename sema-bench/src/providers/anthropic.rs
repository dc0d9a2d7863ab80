//! Anthropic (Claude) Messages API client

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;
use std::time::Duration;

use super::traits::{
    apply_overrides, error_from_response, to_object, transport_error, ClientOptions, InvokeOptions,
    ModelClient,
    ProviderError, ProviderResult,
};
use crate::config::ModelConfig;
use crate::runner::retry::RetryPolicy;

const DEFAULT_BASE_URL: &str = "https://api.anthropic.com/v1";
const API_VERSION: &str = "2023-06-01";
const MAX_TOKENS: u32 = 4096;
const API_KEY_ENV: &[&str] = &["ANTHROPIC_API_KEY"];

/// Anthropic API client
pub struct AnthropicClient {
    config: Arc<ModelConfig>,
    api_key: String,
    base_url: String,
    temperature: Option<f32>,
    http_client: Client,
    timeout: Duration,
    retry: RetryPolicy,
}

impl AnthropicClient {
    pub fn new(config: Arc<ModelConfig>, options: &ClientOptions) -> ProviderResult<Self> {
        let api_key = config.api_key_or_env(API_KEY_ENV).ok_or_else(|| {
            ProviderError::Config(format!(
                "no api_key for model '{}' and ANTHROPIC_API_KEY not set",
                config.name
            ))
        })?;
        let base_url = if config.base_url.is_empty() {
            DEFAULT_BASE_URL.to_string()
        } else {
            config.base_url.trim_end_matches('/').to_string()
        };

        Ok(Self {
            api_key,
            base_url,
            temperature: options.effective_temperature(&config),
            http_client: options.http_client()?,
            timeout: options.timeout,
            retry: options.retry.clone(),
            config,
        })
    }

    pub fn build_payload(
        &self,
        prompt: &str,
        options: &InvokeOptions,
    ) -> ProviderResult<Map<String, Value>> {
        let body = AnthropicRequest {
            model: &self.config.name,
            messages: vec![AnthropicMessage {
                role: "user",
                content: prompt,
            }],
            max_tokens: MAX_TOKENS,
            temperature: self.temperature,
        };
        let mut payload = to_object(&body)?;
        apply_overrides(&mut payload, &options.payload_override);
        Ok(payload)
    }

    async fn send(&self, payload: &Map<String, Value>) -> ProviderResult<String> {
        let response = self
            .http_client
            .post(format!("{}/messages", self.base_url))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
            .header("content-type", "application/json")
            .json(payload)
            .send()
            .await
            .map_err(|e| transport_error(e, self.timeout))?;

        if !response.status().is_success() {
            return Err(error_from_response(response).await);
        }

        let api_response: AnthropicResponse = response
            .json()
            .await
            .map_err(|e| transport_error(e, self.timeout))?;
        extract_text(&api_response).ok_or_else(|| ProviderError::Generation {
            provider: "anthropic".to_string(),
        })
    }
}

#[derive(Serialize)]
struct AnthropicRequest<'a> {
    model: &'a str,
    messages: Vec<AnthropicMessage<'a>>,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Serialize)]
struct AnthropicMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct AnthropicResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
}

#[derive(Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    block_type: String,
    #[serde(default)]
    text: Option<String>,
}

/// Concatenate every `text` block; thinking and tool blocks are skipped
fn extract_text(response: &AnthropicResponse) -> Option<String> {
    let text: String = response
        .content
        .iter()
        .filter(|b| b.block_type == "text")
        .filter_map(|b| b.text.as_deref())
        .collect();
    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}

#[async_trait]
impl ModelClient for AnthropicClient {
    fn provider(&self) -> &str {
        "anthropic"
    }

    fn config(&self) -> &ModelConfig {
        &self.config
    }

    async fn invoke(&self, prompt: &str, options: &InvokeOptions) -> ProviderResult<String> {
        let payload = self.build_payload(prompt, options)?;
        tracing::debug!("anthropic request for {}", self.config.name);
        self.retry
            .run(&format!("anthropic:{}", self.config.name), || self.send(&payload))
            .await
    }
}
