//! OpenAI-compatible chat completions client
//!
//! Also the fallback adapter for unknown providers, so any server speaking
//! the `/chat/completions` wire format (Azure, vLLM, LiteLLM, ...) works.

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

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
const API_KEY_ENV: &[&str] = &["OPENAI_API_KEY"];

/// OpenAI API client
pub struct OpenAIClient {
    config: Arc<ModelConfig>,
    api_key: Option<String>,
    base_url: String,
    temperature: Option<f32>,
    http_client: Client,
    timeout: Duration,
    retry: RetryPolicy,
}

impl OpenAIClient {
    pub fn new(config: Arc<ModelConfig>, options: &ClientOptions) -> ProviderResult<Self> {
        let base_url = if config.base_url.is_empty() {
            DEFAULT_BASE_URL.to_string()
        } else {
            config.base_url.trim_end_matches('/').to_string()
        };

        Ok(Self {
            api_key: config.api_key_or_env(API_KEY_ENV),
            base_url,
            temperature: options.effective_temperature(&config),
            http_client: options.http_client()?,
            timeout: options.timeout,
            retry: options.retry.clone(),
            config,
        })
    }

    /// Request body with overrides applied
    pub fn build_payload(
        &self,
        prompt: &str,
        options: &InvokeOptions,
    ) -> ProviderResult<Map<String, Value>> {
        let body = OpenAIRequest {
            model: &self.config.name,
            messages: vec![OpenAIMessage {
                role: "user",
                content: prompt,
            }],
            temperature: self.temperature,
        };
        let mut payload = to_object(&body)?;
        apply_overrides(&mut payload, &options.payload_override);
        Ok(payload)
    }

    async fn send(&self, payload: &Map<String, Value>) -> ProviderResult<String> {
        let mut request = self
            .http_client
            .post(format!("{}/chat/completions", self.base_url))
            .header("Content-Type", "application/json")
            .json(payload);
        if let Some(key) = &self.api_key {
            request = request.header("Authorization", format!("Bearer {}", key));
        }

        let response = request
            .send()
            .await
            .map_err(|e| transport_error(e, self.timeout))?;
        if !response.status().is_success() {
            return Err(error_from_response(response).await);
        }

        let api_response: OpenAIResponse = response
            .json()
            .await
            .map_err(|e| transport_error(e, self.timeout))?;
        extract_text(api_response).ok_or_else(|| ProviderError::Generation {
            provider: "openai".to_string(),
        })
    }
}

#[derive(Serialize)]
struct OpenAIRequest<'a> {
    model: &'a str,
    messages: Vec<OpenAIMessage<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Serialize)]
struct OpenAIMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct OpenAIResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: Option<ChoiceMessage>,
    /// Legacy completions shape
    text: Option<String>,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

/// `choices[0].message.content`, then `choices[0].text`
fn extract_text(response: OpenAIResponse) -> Option<String> {
    let choice = response.choices.into_iter().next()?;
    choice
        .message
        .and_then(|m| m.content)
        .filter(|s| !s.is_empty())
        .or(choice.text.filter(|s| !s.is_empty()))
}

#[async_trait]
impl ModelClient for OpenAIClient {
    fn provider(&self) -> &str {
        "openai"
    }

    fn config(&self) -> &ModelConfig {
        &self.config
    }

    async fn invoke(&self, prompt: &str, options: &InvokeOptions) -> ProviderResult<String> {
        let payload = self.build_payload(prompt, options)?;
        tracing::debug!("openai request for {}", self.config.name);
        self.retry
            .run(&format!("openai:{}", self.config.name), || self.send(&payload))
            .await
    }
}
