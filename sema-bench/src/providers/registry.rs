//! Provider registry and model factory

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, PoisonError, RwLock};

use super::traits::{ClientOptions, ModelClient, ProviderError, ProviderResult};
use super::{AnthropicClient, GeminiClient, OllamaClient, OpenAIClient};
use crate::config::{ConfigError, ConfigStore, ModelConfig};

/// Builds a client for a resolved model configuration
pub type ClientConstructor = Arc<
    dyn Fn(Arc<ModelConfig>, &ClientOptions) -> ProviderResult<Arc<dyn ModelClient>> + Send + Sync,
>;

/// Provider used when a model names an unregistered provider
pub const FALLBACK_PROVIDER: &str = "openai";

/// Wrap a concrete client constructor for [`ModelFactory::register_provider`]
pub fn constructor<C, F>(build: F) -> ClientConstructor
where
    C: ModelClient + 'static,
    F: Fn(Arc<ModelConfig>, &ClientOptions) -> ProviderResult<C> + Send + Sync + 'static,
{
    Arc::new(move |config: Arc<ModelConfig>, options: &ClientOptions| {
        let client: Arc<dyn ModelClient> = Arc::new(build(config, options)?);
        Ok(client)
    })
}

/// Errors from [`ModelFactory::create`]
#[derive(Debug, thiserror::Error)]
pub enum FactoryError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Provider(#[from] ProviderError),
}

/// Resolves model names to ready-to-use clients
pub struct ModelFactory {
    store: Arc<ConfigStore>,
    providers: RwLock<HashMap<String, ClientConstructor>>,
}

impl ModelFactory {
    /// Factory backed by `store`, with the built-in providers registered
    pub fn new(store: Arc<ConfigStore>) -> Self {
        let factory = Self {
            store,
            providers: RwLock::new(HashMap::new()),
        };

        let openai = constructor(OpenAIClient::new);
        let anthropic = constructor(AnthropicClient::new);
        let gemini = constructor(GeminiClient::new);
        let ollama = constructor(OllamaClient::new);

        for name in ["openai", "azure", "azure_openai"] {
            factory.register_provider(name, openai.clone());
        }
        for name in ["claude", "anthropic"] {
            factory.register_provider(name, anthropic.clone());
        }
        for name in ["gemini", "google"] {
            factory.register_provider(name, gemini.clone());
        }
        factory.register_provider("ollama", ollama);

        factory
    }

    /// Factory over the process-wide [`ConfigStore`]
    pub fn shared() -> Self {
        Self::new(ConfigStore::shared())
    }

    pub fn store(&self) -> &Arc<ConfigStore> {
        &self.store
    }

    /// Add or replace a provider; names are case-insensitive
    pub fn register_provider(&self, name: &str, constructor: ClientConstructor) {
        let name = name.to_lowercase();
        tracing::debug!("Registering provider '{}'", name);
        self.providers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(name, constructor);
    }

    /// Registered provider names, sorted
    pub fn providers(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .providers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        names.sort();
        names
    }

    /// Look up `model` in the registry file and build its client
    pub fn create(
        &self,
        model: &str,
        config_path: Option<&Path>,
        options: &ClientOptions,
    ) -> Result<Arc<dyn ModelClient>, FactoryError> {
        let config = self.store.load(model, config_path)?;
        Ok(self.create_from_config(config, options)?)
    }

    /// Build a client for an already-resolved configuration
    pub fn create_from_config(
        &self,
        config: Arc<ModelConfig>,
        options: &ClientOptions,
    ) -> ProviderResult<Arc<dyn ModelClient>> {
        let provider = config.provider.to_lowercase();
        let constructor = {
            let providers = self.providers.read().unwrap_or_else(PoisonError::into_inner);
            match providers.get(&provider) {
                Some(constructor) => constructor.clone(),
                None => {
                    tracing::info!(
                        "Unknown provider '{}' for model '{}', using {} adapter",
                        config.provider,
                        config.name,
                        FALLBACK_PROVIDER
                    );
                    providers.get(FALLBACK_PROVIDER).cloned().ok_or_else(|| {
                        ProviderError::Config(format!("no provider registered for '{}'", provider))
                    })?
                }
            }
        };

        tracing::debug!("Creating {} client for {}", provider, config.name);
        constructor(config, options)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::InvokeOptions;
    use async_trait::async_trait;
    use std::io::Write;

    struct EchoClient {
        config: Arc<ModelConfig>,
    }

    #[async_trait]
    impl ModelClient for EchoClient {
        fn provider(&self) -> &str {
            "echo"
        }

        fn config(&self) -> &ModelConfig {
            &self.config
        }

        async fn invoke(&self, prompt: &str, _options: &InvokeOptions) -> ProviderResult<String> {
            Ok(prompt.to_string())
        }
    }

    fn registry_file(body: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        file.write_all(body.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_builtin_providers() {
        let factory = ModelFactory::new(Arc::new(ConfigStore::new()));
        let names = factory.providers();
        for expected in [
            "anthropic",
            "azure",
            "azure_openai",
            "claude",
            "gemini",
            "google",
            "ollama",
            "openai",
        ] {
            assert!(names.contains(&expected.to_string()), "missing {}", expected);
        }
    }

    #[tokio::test]
    async fn test_registered_provider_is_used() {
        let file = registry_file("[my-model]\nprovider = \"Echo\"\n");
        let factory = ModelFactory::new(Arc::new(ConfigStore::new()));
        factory.register_provider("ECHO", constructor(|config, _| Ok(EchoClient { config })));

        let client = factory
            .create("my-model", Some(file.path()), &ClientOptions::default())
            .unwrap();
        assert_eq!(client.provider(), "echo");
        assert_eq!(client.invoke("ping", &InvokeOptions::new()).await.unwrap(), "ping");
    }

    #[test]
    fn test_unknown_provider_falls_back_to_openai() {
        let file = registry_file(
            "[local-vllm]\nprovider = \"vllm\"\nbase_url = \"http://localhost:8000/v1\"\napi_key = \"x\"\n",
        );
        let factory = ModelFactory::new(Arc::new(ConfigStore::new()));
        let client = factory
            .create("local-vllm", Some(file.path()), &ClientOptions::default())
            .unwrap();
        assert_eq!(client.provider(), "openai");
        assert_eq!(client.config().name, "local-vllm");
    }

    #[test]
    fn test_missing_model_is_config_error() {
        let file = registry_file("[a]\nprovider = \"openai\"\n");
        let factory = ModelFactory::new(Arc::new(ConfigStore::new()));
        let err = factory
            .create("b", Some(file.path()), &ClientOptions::default())
            .err()
            .unwrap();
        assert!(matches!(err, FactoryError::Config(ConfigError::ModelNotFound { .. })));
    }

    #[test]
    fn test_temperature_override_reaches_client() {
        let factory = ModelFactory::new(Arc::new(ConfigStore::new()));
        factory.register_provider(
            "scripted",
            constructor(|config: Arc<ModelConfig>, options: &ClientOptions| {
                let temperature = options.effective_temperature(&config);
                let config = Arc::new((*config).clone().with_temperature(temperature));
                Ok(EchoClient { config })
            }),
        );
        let config = Arc::new(ModelConfig::new("m", "scripted").with_temperature(Some(1.0)));
        let client = factory
            .create_from_config(config, &ClientOptions::default().with_temperature(Some(0.0)))
            .unwrap();
        assert_eq!(client.config().temperature, Some(0.0));
    }
}
