//! Benchmark manifest: where each benchmark's dataset files come from

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::path::Path;

use super::loader::{load_document, LoadError};
use super::partition::Partition;

const EMBEDDED_MANIFEST: &str = include_str!("../../config/benchmarks.json");

/// A downloadable dataset file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasetEntry {
    /// File name under the benchmark data folder
    pub name: String,
    pub url: String,
}

/// Dataset files for each partition; any may be absent
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasetEntries {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub train: Option<DatasetEntry>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validate: Option<DatasetEntry>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub test: Option<DatasetEntry>,
}

impl DatasetEntries {
    pub fn get(&self, partition: Partition) -> Option<&DatasetEntry> {
        match partition {
            Partition::Train => self.train.as_ref(),
            Partition::Validate => self.validate.as_ref(),
            Partition::Test => self.test.as_ref(),
        }
    }
}

/// Benchmark name -> dataset files
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BenchmarkManifest {
    benchmarks: IndexMap<String, DatasetEntries>,
}

impl BenchmarkManifest {
    /// The manifest shipped with the crate
    pub fn embedded() -> Result<Self, LoadError> {
        serde_json::from_str(EMBEDDED_MANIFEST).map_err(|e| LoadError::Parse {
            path: "config/benchmarks.json".into(),
            message: e.to_string(),
        })
    }

    /// Load a manifest from a `.json` or `.toml` file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, LoadError> {
        let path = path.as_ref();
        match path.extension().and_then(|e| e.to_str()) {
            Some("json") => load_document(path),
            Some("toml") => {
                let content = std::fs::read_to_string(path).map_err(|source| LoadError::Io {
                    path: path.to_path_buf(),
                    source,
                })?;
                toml::from_str(&content).map_err(|e| LoadError::Parse {
                    path: path.to_path_buf(),
                    message: e.to_string(),
                })
            }
            _ => Err(LoadError::UnsupportedFormat(path.to_path_buf())),
        }
    }

    pub fn get(&self, benchmark: &str) -> Option<&DatasetEntries> {
        self.benchmarks.get(benchmark)
    }

    pub fn insert(&mut self, benchmark: impl Into<String>, entries: DatasetEntries) {
        self.benchmarks.insert(benchmark.into(), entries);
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.benchmarks.keys().map(String::as_str)
    }
}
