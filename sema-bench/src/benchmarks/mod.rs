//! Benchmark definitions, dataset partitions and the evaluation run contract

pub mod download;
pub mod hotpotqa;
pub mod loader;
pub mod manifest;
pub mod partition;

pub use download::{DownloadError, DownloadOutcome, Downloader};
pub use hotpotqa::{render_context, HotpotQa};
pub use loader::{load_document, load_records, LoadError};
pub use manifest::{BenchmarkManifest, DatasetEntries, DatasetEntry};
pub use partition::{DatasetScope, Partition};

use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt::Display;
use std::future::Future;

use crate::analysis::{scoring, EvaluationScores, RunMetrics, RunReport};
use crate::runner::run_samples;

/// One question-answering sample
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QaRecord {
    #[serde(rename = "_id", alias = "id", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Value>,
    pub question: String,
    #[serde(default = "empty_context")]
    pub context: Value,
    pub answer: Value,
}

fn empty_context() -> Value {
    Value::Array(Vec::new())
}

/// Error type for benchmark operations
#[derive(Debug, thiserror::Error)]
pub enum BenchmarkError {
    #[error("Benchmark {0} not found in manifest")]
    UnknownBenchmark(String),

    #[error("Unknown partition: {0}")]
    UnknownPartition(String),

    #[error("Partition \"{0}\" not loaded; call load_data() first")]
    PartitionNotLoaded(Partition),

    #[error("Partition \"{0}\" has no dataset in the manifest")]
    PartitionUnavailable(Partition),

    #[error(transparent)]
    Load(#[from] LoadError),

    #[error(transparent)]
    Download(#[from] DownloadError),
}

/// Load state of a single partition
#[derive(Debug, Clone, Default, PartialEq)]
pub enum PartitionState {
    #[default]
    Unloaded,
    /// `None` when the manifest lists no dataset for the partition
    Loaded(Option<Vec<QaRecord>>),
}

/// Train/validate/test data held by a benchmark
#[derive(Debug, Clone, Default)]
pub struct Partitions {
    train: PartitionState,
    validate: PartitionState,
    test: PartitionState,
}

impl Partitions {
    pub fn state(&self, partition: Partition) -> &PartitionState {
        match partition {
            Partition::Train => &self.train,
            Partition::Validate => &self.validate,
            Partition::Test => &self.test,
        }
    }

    pub fn is_loaded(&self, partition: Partition) -> bool {
        matches!(self.state(partition), PartitionState::Loaded(_))
    }

    pub fn set(&mut self, partition: Partition, records: Option<Vec<QaRecord>>) {
        let slot = match partition {
            Partition::Train => &mut self.train,
            Partition::Validate => &mut self.validate,
            Partition::Test => &mut self.test,
        };
        *slot = PartitionState::Loaded(records);
    }

    /// Records of a loaded partition; errors when unloaded or absent
    pub fn records(&self, partition: Partition) -> Result<&[QaRecord], BenchmarkError> {
        match self.state(partition) {
            PartitionState::Unloaded => Err(BenchmarkError::PartitionNotLoaded(partition)),
            PartitionState::Loaded(None) => Err(BenchmarkError::PartitionUnavailable(partition)),
            PartitionState::Loaded(Some(records)) => Ok(records),
        }
    }
}

/// A question-answering benchmark
#[async_trait]
pub trait Benchmark: Send + Sync {
    /// Benchmark name, also its manifest key
    fn name(&self) -> &str;

    /// Load every partition in the instance's scope. Already-loaded
    /// partitions are kept unless `force_reload` is set.
    async fn load_data(&mut self, force_reload: bool) -> Result<(), BenchmarkError>;

    /// Fetch (if needed) and parse one dataset file; `None` for a missing entry
    async fn load_dataset(
        &self,
        entry: Option<&DatasetEntry>,
        force_reload: bool,
    ) -> Result<Option<Vec<QaRecord>>, BenchmarkError>;

    fn partitions(&self) -> &Partitions;

    fn partition(&self, partition: Partition) -> Result<&[QaRecord], BenchmarkError> {
        self.partitions().records(partition)
    }

    /// Score one prediction against its ground truth
    fn evaluate(&self, prediction: &Value, ground_truth: &Value) -> EvaluationScores {
        scoring::evaluate(prediction, ground_truth)
    }

    /// Run `callback(question, context)` over a partition and aggregate the scores
    async fn run<F, Fut, E>(
        &self,
        callback: F,
        partition: &str,
        sample_limit: Option<usize>,
        verbose: bool,
    ) -> Result<RunReport, BenchmarkError>
    where
        F: FnMut(String, Value) -> Fut + Send,
        Fut: Future<Output = Result<String, E>> + Send,
        E: Display + Send,
    {
        let selected: Partition = partition
            .parse()
            .map_err(|_| BenchmarkError::UnknownPartition(partition.to_string()))?;
        let mut records = self.partition(selected)?;
        if let Some(limit) = sample_limit {
            records = &records[..limit.min(records.len())];
        }

        tracing::info!("Running {} on {} ({} samples)", self.name(), selected, records.len());
        let started_at = Utc::now();
        let results = run_samples(records, callback, |p, t| self.evaluate(p, t), verbose).await;
        let metrics = RunMetrics::from_results(&results);
        tracing::info!(
            "{} {}: EM {:.3}, F1 {:.3}, {}/{} passed",
            self.name(),
            selected,
            metrics.exact_match,
            metrics.f1,
            metrics.num_passed,
            metrics.num_samples
        );

        Ok(RunReport {
            benchmark: self.name().to_string(),
            partition: selected.as_str().to_string(),
            model: None,
            started_at,
            finished_at: Utc::now(),
            metrics,
            results,
        })
    }
}
