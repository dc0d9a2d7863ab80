//! HotpotQA multi-hop question answering benchmark

use async_trait::async_trait;
use serde_json::Value;
use std::path::{Path, PathBuf};

use super::download::Downloader;
use super::loader::{load_records, LoadError};
use super::manifest::{BenchmarkManifest, DatasetEntry};
use super::partition::DatasetScope;
use super::{Benchmark, BenchmarkError, Partitions, QaRecord};

const NAME: &str = "hotpotqa";
const DEFAULT_DATA_DIR: &str = ".sema/benchmarks";

/// HotpotQA with train, distractor-dev and fullwiki-dev splits
pub struct HotpotQa {
    data_folder: PathBuf,
    scope: DatasetScope,
    manifest: BenchmarkManifest,
    downloader: Downloader,
    partitions: Partitions,
}

impl HotpotQa {
    /// Create an unloaded benchmark. `data_folder` defaults to
    /// `~/.sema/benchmarks` and is created if missing.
    pub fn new(data_folder: Option<PathBuf>, scope: DatasetScope) -> Result<Self, BenchmarkError> {
        let data_folder = match data_folder {
            Some(folder) => expand_home(&folder),
            None => dirs::home_dir().unwrap_or_default().join(DEFAULT_DATA_DIR),
        };
        std::fs::create_dir_all(&data_folder).map_err(|source| LoadError::Io {
            path: data_folder.clone(),
            source,
        })?;

        Ok(Self {
            data_folder,
            scope,
            manifest: BenchmarkManifest::embedded()?,
            downloader: Downloader::new()?,
            partitions: Partitions::default(),
        })
    }

    /// Create and load in one step
    pub async fn open(
        data_folder: Option<PathBuf>,
        scope: DatasetScope,
    ) -> Result<Self, BenchmarkError> {
        let mut benchmark = Self::new(data_folder, scope)?;
        benchmark.load_data(false).await?;
        Ok(benchmark)
    }

    pub fn with_manifest(mut self, manifest: BenchmarkManifest) -> Self {
        self.manifest = manifest;
        self
    }

    pub fn with_downloader(mut self, downloader: Downloader) -> Self {
        self.downloader = downloader;
        self
    }

    pub fn data_folder(&self) -> &Path {
        &self.data_folder
    }

    pub fn scope(&self) -> DatasetScope {
        self.scope
    }
}

fn expand_home(path: &Path) -> PathBuf {
    match (path.strip_prefix("~"), dirs::home_dir()) {
        (Ok(rest), Some(home)) => home.join(rest),
        _ => path.to_path_buf(),
    }
}

#[async_trait]
impl Benchmark for HotpotQa {
    fn name(&self) -> &str {
        NAME
    }

    async fn load_data(&mut self, force_reload: bool) -> Result<(), BenchmarkError> {
        let entries = self
            .manifest
            .get(NAME)
            .cloned()
            .ok_or_else(|| BenchmarkError::UnknownBenchmark(NAME.to_string()))?;

        for partition in self.scope.partitions() {
            if self.partitions.is_loaded(partition) && !force_reload {
                tracing::debug!("{} {} already loaded", NAME, partition);
                continue;
            }
            let records = self.load_dataset(entries.get(partition), force_reload).await?;
            match &records {
                Some(r) => tracing::info!("Loaded {} {} records", r.len(), partition),
                None => tracing::warn!("No {} dataset listed for {}", partition, NAME),
            }
            self.partitions.set(partition, records);
        }
        Ok(())
    }

    async fn load_dataset(
        &self,
        entry: Option<&DatasetEntry>,
        force_reload: bool,
    ) -> Result<Option<Vec<QaRecord>>, BenchmarkError> {
        let Some(entry) = entry else {
            return Ok(None);
        };

        // Forced loads let the remote size decide between skip, resume and refetch
        let file_path = self.data_folder.join(&entry.name);
        if force_reload || !file_path.exists() {
            self.downloader.download(&entry.url, &file_path).await?;
        }

        Ok(Some(load_records(&file_path)?))
    }

    fn partitions(&self) -> &Partitions {
        &self.partitions
    }
}

/// Render HotpotQA `[[title, [sentence, ...]], ...]` context as prompt text.
/// Plain strings pass through; other shapes fall back to compact JSON.
pub fn render_context(context: &Value) -> String {
    match context {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Array(paragraphs) => paragraphs
            .iter()
            .map(render_paragraph)
            .collect::<Vec<_>>()
            .join("\n"),
        other => other.to_string(),
    }
}

fn render_paragraph(paragraph: &Value) -> String {
    match paragraph.as_array().map(Vec::as_slice) {
        Some([Value::String(title), Value::Array(sentences)]) => {
            let body: String = sentences.iter().filter_map(Value::as_str).collect();
            format!("{}: {}", title, body.trim())
        }
        _ => render_context(paragraph),
    }
}
