//! Evaluation harness for question-answering LLM agents
//!
//! This crate scores language-model agents against question-answering
//! benchmarks with normalized exact match and token F1.
//!
//! # Features
//!
//! - Model factory resolving named models from a TOML/JSON registry
//! - Provider adapters for OpenAI-compatible servers, Anthropic, Gemini and Ollama
//! - HotpotQA with resumable dataset download and train/validate/test partitions
//! - Step-based agent abstraction with a ready-made direct-answer agent
//! - Console and JSON reporting
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use sema_bench::{
//!     agents::{Agent, AgentConfig, DirectAnswerAgent},
//!     benchmarks::{Benchmark, DatasetScope, HotpotQa},
//!     providers::ModelFactory,
//!     reporting::print_console_report,
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let benchmark = HotpotQa::open(None, DatasetScope::Validate).await?;
//!
//!     let factory = Arc::new(ModelFactory::shared());
//!     let agent = DirectAnswerAgent::new(AgentConfig::new("gpt-4o-mini")?, factory);
//!
//!     let report = benchmark
//!         .run(
//!             |question, context| {
//!                 let agent = &agent;
//!                 async move { agent.run(&question, &context).await }
//!             },
//!             "validate",
//!             Some(20),
//!             true,
//!         )
//!         .await?;
//!
//!     print_console_report(&report);
//!     Ok(())
//! }
//! ```

pub mod agents;
pub mod analysis;
pub mod benchmarks;
pub mod config;
pub mod logging;
pub mod providers;
pub mod reporting;
pub mod runner;

pub use config::{ConfigError, ConfigStore, ModelConfig};

/// Prelude module for common imports
pub mod prelude {
    pub use crate::agents::{
        Agent, AgentConfig, AgentCore, AgentError, AgentState, DirectAnswerAgent,
    };
    pub use crate::analysis::{
        evaluate, exact_match, f1, normalize, EvaluationResult, EvaluationScores, RunMetrics,
        RunReport, Verdict,
    };
    pub use crate::benchmarks::{
        Benchmark, BenchmarkError, BenchmarkManifest, DatasetEntry, DatasetScope, HotpotQa,
        Partition, QaRecord,
    };
    pub use crate::config::{ConfigError, ConfigStore, ModelConfig};
    pub use crate::logging::{LogOptions, SuppressGuard};
    pub use crate::providers::{
        ClientOptions, FactoryError, InvokeOptions, ModelClient, ModelFactory, ProviderError,
        ProviderResult,
    };
    pub use crate::reporting::{print_console_report, JsonSummary};
    pub use crate::runner::RetryPolicy;
}
