//! LLM Provider implementations

pub mod anthropic;
pub mod gemini;
pub mod ollama;
pub mod openai;
pub mod registry;
pub mod traits;

pub use anthropic::AnthropicClient;
pub use gemini::GeminiClient;
pub use ollama::OllamaClient;
pub use openai::OpenAIClient;
pub use registry::{constructor, ClientConstructor, FactoryError, ModelFactory};
pub use traits::{ClientOptions, InvokeOptions, ModelClient, ProviderError, ProviderResult};
