//! Resumable dataset downloads over HTTP

use reqwest::header::{CONTENT_LENGTH, RANGE};
use reqwest::{Client, StatusCode};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;

use crate::runner::retry::{RetryPolicy, Retryable};

/// Connect and read timeout for dataset downloads
pub const DEFAULT_DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(10);

/// Error type for downloads
#[derive(Debug, thiserror::Error)]
pub enum DownloadError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Unexpected status {status} fetching {url}")]
    Status { status: u16, url: String },

    #[error("IO error writing {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl Retryable for DownloadError {
    fn is_retryable(&self) -> bool {
        match self {
            DownloadError::Http(_) => true,
            DownloadError::Status { status, .. } => {
                *status >= 500 || *status == 408 || *status == 429
            }
            DownloadError::Io { .. } => false,
        }
    }
}

/// What a download call ended up doing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DownloadOutcome {
    /// Local file already matched the remote size
    AlreadyComplete,
    /// Fetched from scratch
    Downloaded { bytes: u64 },
    /// Appended to a partial file
    Resumed { from: u64, bytes: u64 },
}

/// HTTP downloader that resumes partial files with ranged requests
#[derive(Debug, Clone)]
pub struct Downloader {
    client: Client,
    retry: RetryPolicy,
}

impl Downloader {
    pub fn new() -> Result<Self, DownloadError> {
        Self::with_timeout(DEFAULT_DOWNLOAD_TIMEOUT)
    }

    pub fn with_timeout(timeout: Duration) -> Result<Self, DownloadError> {
        let client = Client::builder()
            .connect_timeout(timeout)
            .read_timeout(timeout)
            .build()?;
        Ok(Self {
            client,
            retry: RetryPolicy::default(),
        })
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Download `url` to `destination`, resuming a partial file when present
    pub async fn download(
        &self,
        url: &str,
        destination: &Path,
    ) -> Result<DownloadOutcome, DownloadError> {
        if let Some(parent) = destination.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|source| DownloadError::Io {
                    path: parent.to_path_buf(),
                    source,
                })?;
        }

        let label = format!("download {}", url);
        let outcome = self.retry.run(&label, || self.attempt(url, destination)).await?;
        tracing::info!("Downloaded {} to {:?} ({:?})", url, destination, outcome);
        Ok(outcome)
    }

    async fn attempt(
        &self,
        url: &str,
        destination: &Path,
    ) -> Result<DownloadOutcome, DownloadError> {
        let existing = tokio::fs::metadata(destination).await.ok().map(|m| m.len());
        let resume_pos = existing.unwrap_or(0);

        tracing::info!("Downloading {} to {:?}", url, destination);
        let total = self.remote_size(url).await?;

        if let (Some(local), Some(total)) = (existing, total) {
            if local >= total {
                tracing::debug!("{:?} already complete ({} bytes)", destination, local);
                return Ok(DownloadOutcome::AlreadyComplete);
            }
        }

        let mut request = self.client.get(url);
        if resume_pos > 0 {
            tracing::info!("Resuming download from byte position {}", resume_pos);
            request = request.header(RANGE, format!("bytes={}-", resume_pos));
        }
        let mut response = request.send().await?;
        let status = response.status();

        if status == StatusCode::RANGE_NOT_SATISFIABLE && resume_pos > 0 {
            return Ok(DownloadOutcome::AlreadyComplete);
        }
        if !status.is_success() {
            return Err(DownloadError::Status {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        let append = status == StatusCode::PARTIAL_CONTENT && resume_pos > 0;
        let io_err = |source| DownloadError::Io {
            path: destination.to_path_buf(),
            source,
        };
        let mut file = OpenOptions::new()
            .create(true)
            .write(true)
            .append(append)
            .truncate(!append)
            .open(destination)
            .await
            .map_err(io_err)?;

        let mut written = 0u64;
        while let Some(chunk) = response.chunk().await? {
            file.write_all(&chunk).await.map_err(io_err)?;
            written += chunk.len() as u64;
        }
        file.flush().await.map_err(io_err)?;

        if append {
            Ok(DownloadOutcome::Resumed {
                from: resume_pos,
                bytes: written,
            })
        } else {
            Ok(DownloadOutcome::Downloaded { bytes: written })
        }
    }

    /// Remote size from a HEAD request's `Content-Length`, if advertised
    async fn remote_size(&self, url: &str) -> Result<Option<u64>, DownloadError> {
        let response = self.client.head(url).send().await?;
        if !response.status().is_success() {
            tracing::debug!("HEAD {} returned {}", url, response.status());
            return Ok(None);
        }
        Ok(response
            .headers()
            .get(CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.parse::<u64>().ok())
            .filter(|len| *len > 0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_retry_classification() {
        let status = |status| DownloadError::Status {
            status,
            url: "http://example.invalid".into(),
        };
        assert!(status(503).is_retryable());
        assert!(status(429).is_retryable());
        assert!(!status(404).is_retryable());
    }
}
