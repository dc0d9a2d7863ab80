//! Dataset loading from JSON and JSON-lines files

use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};

/// Error type for dataset loading
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("File not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("IO error reading {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Parse error in {}: {message}", path.display())]
    Parse { path: PathBuf, message: String },

    #[error("Unsupported file format: {} (expected .json or .jsonl)", .0.display())]
    UnsupportedFormat(PathBuf),
}

/// Load a list of records from a `.json` array or a `.jsonl` file
pub fn load_records<T: DeserializeOwned>(path: impl AsRef<Path>) -> Result<Vec<T>, LoadError> {
    let path = path.as_ref();
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_lowercase);

    match extension.as_deref() {
        Some("json") => load_document(path),
        Some("jsonl") => {
            let content = read(path)?;
            parse_json_lines(path, &content)
        }
        _ => Err(LoadError::UnsupportedFormat(path.to_path_buf())),
    }
}

/// Load a single JSON document
pub fn load_document<T: DeserializeOwned>(path: impl AsRef<Path>) -> Result<T, LoadError> {
    let path = path.as_ref();
    let content = read(path)?;
    serde_json::from_str(&content).map_err(|e| LoadError::Parse {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}

fn read(path: &Path) -> Result<String, LoadError> {
    if !path.exists() {
        return Err(LoadError::NotFound(path.to_path_buf()));
    }
    std::fs::read_to_string(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn parse_json_lines<T: DeserializeOwned>(path: &Path, content: &str) -> Result<Vec<T>, LoadError> {
    content
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(idx, line)| {
            serde_json::from_str(line).map_err(|e| LoadError::Parse {
                path: path.to_path_buf(),
                message: format!("line {}: {}", idx + 1, e),
            })
        })
        .collect()
}
