//! Google Gemini generateContent client

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;
use std::time::Duration;

use super::traits::{
    apply_overrides, error_from_response, merge_nested, to_object, transport_error, ClientOptions,
    InvokeOptions, ModelClient, ProviderError, ProviderResult,
};
use crate::config::ModelConfig;
use crate::runner::retry::RetryPolicy;

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
const API_KEY_ENV: &[&str] = &["GEMINI_API_KEY", "GOOGLE_API_KEY"];

/// Override keys merged into `generationConfig` instead of sent top-level
const GENERATION_CONFIG_KEYS: &[&str] = &["config", "generationConfig"];

/// Gemini API client
pub struct GeminiClient {
    config: Arc<ModelConfig>,
    api_key: String,
    base_url: String,
    temperature: Option<f32>,
    http_client: Client,
    timeout: Duration,
    retry: RetryPolicy,
}

impl GeminiClient {
    pub fn new(config: Arc<ModelConfig>, options: &ClientOptions) -> ProviderResult<Self> {
        let api_key = config.api_key_or_env(API_KEY_ENV).ok_or_else(|| {
            ProviderError::Config(format!(
                "no api_key for model '{}' and neither GEMINI_API_KEY nor GOOGLE_API_KEY is set",
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
        let body = GeminiRequest {
            contents: vec![GeminiContent {
                role: "user",
                parts: vec![GeminiPart { text: prompt }],
            }],
            generation_config: self.temperature.map(|temperature| GenerationConfig { temperature }),
        };
        let mut payload = to_object(&body)?;

        let mut top_level = options.payload_override.clone();
        for key in GENERATION_CONFIG_KEYS {
            if let Some(Value::Object(extra)) = top_level.remove(*key) {
                merge_nested(&mut payload, "generationConfig", &extra);
            }
        }
        apply_overrides(&mut payload, &top_level);
        Ok(payload)
    }

    async fn send(&self, payload: &Map<String, Value>) -> ProviderResult<String> {
        let response = self
            .http_client
            .post(format!("{}/models/{}:generateContent", self.base_url, self.config.name))
            .header("x-goog-api-key", &self.api_key)
            .header("Content-Type", "application/json")
            .json(payload)
            .send()
            .await
            .map_err(|e| transport_error(e, self.timeout))?;

        if !response.status().is_success() {
            return Err(error_from_response(response).await);
        }

        let api_response: GeminiResponse = response
            .json()
            .await
            .map_err(|e| transport_error(e, self.timeout))?;
        extract_text(&api_response).ok_or_else(|| ProviderError::Generation {
            provider: "gemini".to_string(),
        })
    }
}

#[derive(Serialize)]
struct GeminiRequest<'a> {
    contents: Vec<GeminiContent<'a>>,
    #[serde(rename = "generationConfig", skip_serializing_if = "Option::is_none")]
    generation_config: Option<GenerationConfig>,
}

#[derive(Serialize)]
struct GeminiContent<'a> {
    role: &'a str,
    parts: Vec<GeminiPart<'a>>,
}

#[derive(Serialize)]
struct GeminiPart<'a> {
    text: &'a str,
}

#[derive(Serialize)]
struct GenerationConfig {
    temperature: f32,
}

#[derive(Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Deserialize)]
struct CandidatePart {
    text: Option<String>,
}

/// Joined text parts of the first candidate that has any
fn extract_text(response: &GeminiResponse) -> Option<String> {
    response
        .candidates
        .iter()
        .filter_map(|c| c.content.as_ref())
        .map(|content| {
            content
                .parts
                .iter()
                .filter_map(|p| p.text.as_deref())
                .collect::<String>()
        })
        .find(|text| !text.is_empty())
}

#[async_trait]
impl ModelClient for GeminiClient {
    fn provider(&self) -> &str {
        "gemini"
    }

    fn config(&self) -> &ModelConfig {
        &self.config
    }

    async fn invoke(&self, prompt: &str, options: &InvokeOptions) -> ProviderResult<String> {
        let payload = self.build_payload(prompt, options)?;
        tracing::debug!("gemini request for {}", self.config.name);
        self.retry
            .run(&format!("gemini:{}", self.config.name), || self.send(&payload))
            .await
    }
}
