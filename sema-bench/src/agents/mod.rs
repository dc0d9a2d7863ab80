//! Agent abstraction: validated configuration, step state and a lazily
//! created model client.

pub mod direct;

pub use direct::DirectAnswerAgent;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};

use crate::providers::{ClientOptions, FactoryError, ModelClient, ModelFactory, ProviderError};

const DEFAULT_MODEL: &str = "gpt-4o-mini";
const DEFAULT_MAX_STEPS: u32 = 5;
const MAX_TEMPERATURE: f32 = 2.0;

/// Error type for agents
#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    #[error("Invalid agent config: {0}")]
    InvalidConfig(String),

    #[error(transparent)]
    Factory(#[from] FactoryError),

    #[error(transparent)]
    Provider(#[from] ProviderError),
}

fn default_model() -> String {
    DEFAULT_MODEL.to_string()
}

fn default_max_steps() -> u32 {
    DEFAULT_MAX_STEPS
}

/// Wire form of [`AgentConfig`]; unknown keys are rejected
#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct AgentConfigFields {
    #[serde(default = "default_model")]
    model: String,
    #[serde(default = "default_max_steps")]
    max_steps: u32,
    #[serde(default)]
    verbose: bool,
    #[serde(default)]
    temperature: Option<f32>,
}

/// Agent settings, validated on construction, deserialization and every update
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "AgentConfigFields")]
pub struct AgentConfig {
    model: String,
    max_steps: u32,
    verbose: bool,
    temperature: Option<f32>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            model: default_model(),
            max_steps: DEFAULT_MAX_STEPS,
            verbose: false,
            temperature: None,
        }
    }
}

impl TryFrom<AgentConfigFields> for AgentConfig {
    type Error = AgentError;

    fn try_from(fields: AgentConfigFields) -> Result<Self, Self::Error> {
        let config = Self {
            model: fields.model,
            max_steps: fields.max_steps,
            verbose: fields.verbose,
            temperature: fields.temperature,
        };
        config.validate()?;
        Ok(config)
    }
}

impl AgentConfig {
    /// Default settings for `model`
    pub fn new(model: impl Into<String>) -> Result<Self, AgentError> {
        let config = Self {
            model: model.into(),
            ..Self::default()
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), AgentError> {
        if self.model.trim().is_empty() {
            return Err(AgentError::InvalidConfig("model must not be empty".into()));
        }
        if self.max_steps < 1 {
            return Err(AgentError::InvalidConfig(format!(
                "max_steps must be >= 1, got {}",
                self.max_steps
            )));
        }
        if let Some(t) = self.temperature {
            if !(0.0..=MAX_TEMPERATURE).contains(&t) {
                return Err(AgentError::InvalidConfig(format!(
                    "temperature must be within [0.0, {}], got {}",
                    MAX_TEMPERATURE, t
                )));
            }
        }
        Ok(())
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn max_steps(&self) -> u32 {
        self.max_steps
    }

    pub fn verbose(&self) -> bool {
        self.verbose
    }

    pub fn temperature(&self) -> Option<f32> {
        self.temperature
    }

    pub fn set_model(&mut self, model: impl Into<String>) -> Result<(), AgentError> {
        self.update(|c| c.model = model.into())
    }

    pub fn set_max_steps(&mut self, max_steps: u32) -> Result<(), AgentError> {
        self.update(|c| c.max_steps = max_steps)
    }

    pub fn set_verbose(&mut self, verbose: bool) -> Result<(), AgentError> {
        self.update(|c| c.verbose = verbose)
    }

    pub fn set_temperature(&mut self, temperature: Option<f32>) -> Result<(), AgentError> {
        self.update(|c| c.temperature = temperature)
    }

    /// Apply `change` to a copy and keep it only if it validates
    fn update(&mut self, change: impl FnOnce(&mut Self)) -> Result<(), AgentError> {
        let mut candidate = self.clone();
        change(&mut candidate);
        candidate.validate()?;
        *self = candidate;
        Ok(())
    }
}

/// Working state for one question
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AgentState {
    #[serde(default)]
    pub question: String,
    #[serde(default)]
    pub context: String,
    #[serde(default)]
    pub steps: Vec<Map<String, Value>>,
    #[serde(default)]
    pub answer: String,
    #[serde(default)]
    pub finished: bool,
    /// Agent-specific fields
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl AgentState {
    pub fn new(question: impl Into<String>, context: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            context: context.into(),
            ..Self::default()
        }
    }
}

/// Shared agent plumbing: config plus a model client built on first use
pub struct AgentCore {
    config: AgentConfig,
    factory: Arc<ModelFactory>,
    config_path: Option<PathBuf>,
    options: ClientOptions,
    client: Mutex<Option<Arc<dyn ModelClient>>>,
}

impl AgentCore {
    pub fn new(config: AgentConfig, factory: Arc<ModelFactory>) -> Self {
        Self {
            config,
            factory,
            config_path: None,
            options: ClientOptions::default(),
            client: Mutex::new(None),
        }
    }

    /// Resolve the model from this registry file instead of the default
    pub fn with_config_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config_path = Some(path.into());
        self
    }

    pub fn with_client_options(mut self, options: ClientOptions) -> Self {
        self.options = options;
        self
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    /// The cached client, creating it through the factory if needed
    pub fn client(&self) -> Result<Arc<dyn ModelClient>, AgentError> {
        let mut slot = self.client.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(client) = slot.as_ref() {
            return Ok(client.clone());
        }

        let options = self
            .options
            .clone()
            .with_temperature(self.config.temperature.or(self.options.temperature));
        let client = self
            .factory
            .create(&self.config.model, self.config_path.as_deref(), &options)?;
        tracing::debug!(
            "Created {} client for agent model {}",
            client.provider(),
            self.config.model
        );
        *slot = Some(client.clone());
        Ok(client)
    }

    pub fn has_client(&self) -> bool {
        self.client.lock().unwrap_or_else(PoisonError::into_inner).is_some()
    }

    /// Drop the cached client; the next use builds a fresh one
    pub fn reset(&self) {
        *self.client.lock().unwrap_or_else(PoisonError::into_inner) = None;
    }
}

/// A question-answering agent
#[async_trait]
pub trait Agent: Send + Sync {
    fn config(&self) -> &AgentConfig;

    /// Answer `question` given benchmark `context`
    async fn run(&self, question: &str, context: &Value) -> Result<String, AgentError>;

    /// Advance the reasoning by one step
    async fn step(&self, state: AgentState) -> Result<AgentState, AgentError>;

    /// Prepare for a new question
    fn reset(&self);
}
