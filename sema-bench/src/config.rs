//! Model registry loading and caching
//!
//! Model definitions live in a TOML or JSON registry file keyed by model name.
//! A [`ConfigStore`] parses each registry file once and hands out shared
//! [`ModelConfig`] instances, so repeated lookups are cheap and return the
//! same `Arc`.

use indexmap::IndexMap;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError};

/// Environment variable overriding the default registry location
pub const CONFIG_PATH_ENV: &str = "SEMA_MODEL_CONFIG";

const DEFAULT_CONFIG_PATHS: [&str; 2] = ["config/models.toml", "config/models.json"];

/// Registry file contents: model key -> entry, in file order
pub type ModelRegistry = IndexMap<String, ModelEntry>;

/// A model definition as written in the registry file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelEntry {
    /// Provider tag (`openai`, `anthropic`, `gemini`, `ollama`, ...).
    /// Older registries call this field `type`.
    #[serde(default, alias = "type")]
    pub provider: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub base_url: String,
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_temperature")]
    pub temperature: Option<f32>,
}

fn default_temperature() -> Option<f32> {
    Some(1.0)
}

/// Resolved, immutable configuration for one model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelConfig {
    pub name: String,
    pub provider: String,
    pub description: String,
    pub base_url: String,
    pub api_key: String,
    pub temperature: Option<f32>,
}

impl ModelConfig {
    pub fn from_entry(name: impl Into<String>, entry: &ModelEntry) -> Self {
        Self {
            name: name.into(),
            provider: entry.provider.clone(),
            description: entry.description.clone(),
            base_url: entry.base_url.clone(),
            api_key: entry.api_key.clone(),
            temperature: entry.temperature,
        }
    }

    /// Build a config directly, bypassing any registry file
    pub fn new(name: impl Into<String>, provider: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            provider: provider.into(),
            description: String::new(),
            base_url: String::new(),
            api_key: String::new(),
            temperature: None,
        }
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = key.into();
        self
    }

    pub fn with_temperature(mut self, temperature: Option<f32>) -> Self {
        self.temperature = temperature;
        self
    }

    /// The configured API key, or the first non-empty environment variable
    /// from `env_vars` when the registry leaves it blank.
    pub fn api_key_or_env(&self, env_vars: &[&str]) -> Option<String> {
        if !self.api_key.is_empty() {
            return Some(self.api_key.clone());
        }
        env_vars
            .iter()
            .filter_map(|var| std::env::var(var).ok())
            .find(|value| !value.is_empty())
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Config file not found: {}", path.display())]
    FileNotFound { path: PathBuf },

    #[error("IO error reading {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Parse error in {}: {message}", path.display())]
    Parse { path: PathBuf, message: String },

    #[error("Unsupported config format: {}", path.display())]
    UnsupportedFormat { path: PathBuf },

    #[error("Model \"{model}\" not found in {}", path.display())]
    ModelNotFound { model: String, path: PathBuf },
}

/// Process-scoped cache of parsed registry files and resolved model configs
#[derive(Debug, Default)]
pub struct ConfigStore {
    files: Mutex<HashMap<PathBuf, Arc<ModelRegistry>>>,
    instances: Mutex<HashMap<(PathBuf, String), Arc<ModelConfig>>>,
}

impl ConfigStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// The store shared by the whole process, created on first access
    pub fn shared() -> Arc<ConfigStore> {
        static SHARED: OnceLock<Arc<ConfigStore>> = OnceLock::new();
        SHARED.get_or_init(|| Arc::new(ConfigStore::new())).clone()
    }

    /// Registry location used when no override is given.
    ///
    /// `SEMA_MODEL_CONFIG` wins, then the first existing default path.
    pub fn default_path() -> PathBuf {
        if let Ok(path) = std::env::var(CONFIG_PATH_ENV) {
            if !path.is_empty() {
                return PathBuf::from(path);
            }
        }
        DEFAULT_CONFIG_PATHS
            .iter()
            .map(PathBuf::from)
            .find(|p| p.is_file())
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATHS[0]))
    }

    /// Load the configuration for `model`, from `path` or the default registry
    pub fn load(&self, model: &str, path: Option<&Path>) -> Result<Arc<ModelConfig>, ConfigError> {
        let config_path = resolve_path(path)?;
        let key = (config_path.clone(), model.to_string());

        let cached = lock(&self.instances).get(&key).cloned();
        if let Some(config) = cached {
            return Ok(config);
        }

        let registry = self.registry_at(&config_path)?;
        let entry = registry.get(model).ok_or_else(|| ConfigError::ModelNotFound {
            model: model.to_string(),
            path: config_path.clone(),
        })?;

        let instance = Arc::new(ModelConfig::from_entry(model, entry));
        tracing::debug!(
            "Resolved model {} (provider {}) from {:?}",
            model,
            instance.provider,
            config_path
        );

        // Another caller may have raced us here; the first insert wins.
        Ok(lock(&self.instances).entry(key).or_insert(instance).clone())
    }

    /// The parsed registry at `path` (or the default location)
    pub fn registry(&self, path: Option<&Path>) -> Result<Arc<ModelRegistry>, ConfigError> {
        let config_path = resolve_path(path)?;
        self.registry_at(&config_path)
    }

    /// Model keys in registry order
    pub fn list_models(&self, path: Option<&Path>) -> Result<Vec<String>, ConfigError> {
        Ok(self.registry(path)?.keys().cloned().collect())
    }

    /// Drop everything cached for `path` so the next load re-reads the file
    pub fn invalidate(&self, path: &Path) {
        let resolved = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());
        lock(&self.files).remove(&resolved);
        lock(&self.instances).retain(|(p, _), _| p != &resolved);
    }

    pub fn clear(&self) {
        lock(&self.files).clear();
        lock(&self.instances).clear();
    }

    fn registry_at(&self, config_path: &Path) -> Result<Arc<ModelRegistry>, ConfigError> {
        let cached = lock(&self.files).get(config_path).cloned();
        if let Some(registry) = cached {
            return Ok(registry);
        }

        let content = fs::read_to_string(config_path).map_err(|source| ConfigError::Io {
            path: config_path.to_path_buf(),
            source,
        })?;
        let registry: ModelRegistry = parse_document(config_path, &content)?;
        tracing::info!("Loaded {} model definitions from {:?}", registry.len(), config_path);

        let registry = Arc::new(registry);
        Ok(lock(&self.files)
            .entry(config_path.to_path_buf())
            .or_insert(registry)
            .clone())
    }
}

fn resolve_path(path: Option<&Path>) -> Result<PathBuf, ConfigError> {
    let path = path.map(Path::to_path_buf).unwrap_or_else(ConfigStore::default_path);
    match path.canonicalize() {
        Ok(resolved) if resolved.is_file() => Ok(resolved),
        _ => Err(ConfigError::FileNotFound { path }),
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Parse a TOML or JSON document, picking the format from the file extension
pub fn parse_document<T: DeserializeOwned>(path: &Path, content: &str) -> Result<T, ConfigError> {
    let parse_err = |message: String| ConfigError::Parse {
        path: path.to_path_buf(),
        message,
    };
    match path.extension().and_then(|e| e.to_str()) {
        Some("toml") => toml::from_str(content).map_err(|e| parse_err(e.to_string())),
        Some("json") => serde_json::from_str(content).map_err(|e| parse_err(e.to_string())),
        _ => Err(ConfigError::UnsupportedFormat {
            path: path.to_path_buf(),
        }),
    }
}

/// Registry written by `sema-bench init-config`
pub fn sample_registry() -> ModelRegistry {
    let mut registry = ModelRegistry::new();
    registry.insert("gpt-4o-mini".to_string(), ModelEntry {
        provider: "openai".to_string(),
        description: "OpenAI GPT-4o mini".to_string(),
        base_url: "https://api.openai.com/v1".to_string(),
        api_key: String::new(),
        temperature: Some(0.0),
    });
    registry.insert("claude-sonnet-4-5".to_string(), ModelEntry {
        provider: "anthropic".to_string(),
        description: "Anthropic Claude Sonnet 4.5".to_string(),
        base_url: String::new(),
        api_key: String::new(),
        temperature: Some(0.0),
    });
    registry.insert("gemini-2.5-flash".to_string(), ModelEntry {
        provider: "gemini".to_string(),
        description: "Google Gemini 2.5 Flash".to_string(),
        base_url: String::new(),
        api_key: String::new(),
        temperature: Some(0.0),
    });
    registry.insert("llama3.1:8b".to_string(), ModelEntry {
        provider: "ollama".to_string(),
        description: "Llama 3.1 8B served by a local Ollama".to_string(),
        base_url: "http://localhost:11434/v1".to_string(),
        api_key: String::new(),
        temperature: Some(0.0),
    });
    registry
}

/// Save a registry as TOML
pub fn save_toml(path: impl AsRef<Path>, registry: &ModelRegistry) -> Result<(), ConfigError> {
    let path = path.as_ref();
    let content = toml::to_string_pretty(registry).map_err(|e| ConfigError::Parse {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|source| ConfigError::Io {
            path: parent.to_path_buf(),
            source,
        })?;
    }
    fs::write(path, content).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })
}
