//! Process-wide tracing setup with an optional log file and scoped suppression

use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::{Mutex, OnceLock};

use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, reload, EnvFilter, Registry};

const DEFAULT_FILTER: &str = "sema_bench=info,warn";
const VERBOSE_FILTER: &str = "sema_bench=debug,info";

static LEVEL: OnceLock<reload::Handle<LevelFilter, Registry>> = OnceLock::new();

/// Error type for logging setup
#[derive(Debug, thiserror::Error)]
pub enum LogError {
    #[error("Cannot open log file {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to install tracing subscriber: {0}")]
    Init(String),
}

/// Logging options
#[derive(Debug, Clone)]
pub struct LogOptions {
    pub verbose: bool,
    /// Plain-text copy of every event, appended
    pub log_file: Option<PathBuf>,
    pub ansi: bool,
}

impl Default for LogOptions {
    fn default() -> Self {
        Self {
            verbose: false,
            log_file: None,
            ansi: true,
        }
    }
}

impl LogOptions {
    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn with_log_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.log_file = Some(path.into());
        self
    }

    /// `~/.sema/logs/sema.log`
    pub fn default_log_file() -> Option<PathBuf> {
        dirs::home_dir().map(|home| home.join(".sema").join("logs").join("sema.log"))
    }

    /// Fall back to [`LogOptions::default_log_file`] when no file was chosen
    pub fn or_default_log_file(mut self) -> Self {
        if self.log_file.is_none() {
            self.log_file = Self::default_log_file();
        }
        self
    }
}

/// Install the global subscriber. Later calls are no-ops.
///
/// `RUST_LOG` overrides the default directives.
pub fn init(options: &LogOptions) -> Result<(), LogError> {
    if LEVEL.get().is_some() {
        return Ok(());
    }

    let directives = if options.verbose { VERBOSE_FILTER } else { DEFAULT_FILTER };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(directives));

    let file_layer = match &options.log_file {
        Some(path) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent).map_err(|source| LogError::Io {
                    path: parent.to_path_buf(),
                    source,
                })?;
            }
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .map_err(|source| LogError::Io {
                    path: path.clone(),
                    source,
                })?;
            Some(fmt::layer().with_ansi(false).with_writer(Mutex::new(file)))
        }
        None => None,
    };

    let (level_layer, handle) = reload::Layer::new(LevelFilter::TRACE);

    tracing_subscriber::registry()
        .with(level_layer)
        .with(env_filter)
        .with(fmt::layer().with_ansi(options.ansi))
        .with(file_layer)
        .try_init()
        .map_err(|e| LogError::Init(e.to_string()))?;

    let _ = LEVEL.set(handle);
    Ok(())
}

/// Current suppression ceiling, if logging was initialized here
pub fn current_level() -> Option<LevelFilter> {
    LEVEL.get().and_then(|handle| handle.clone_current())
}

/// Restores the previous level when dropped
#[must_use = "suppression ends when the guard is dropped"]
pub struct SuppressGuard {
    previous: Option<LevelFilter>,
}

impl Drop for SuppressGuard {
    fn drop(&mut self) {
        if let (Some(previous), Some(handle)) = (self.previous, LEVEL.get()) {
            let _ = handle.reload(previous);
        }
    }
}

/// Drop events below `level` until the returned guard goes out of scope
pub fn suppress(level: LevelFilter) -> SuppressGuard {
    let previous = current_level();
    if let (Some(current), Some(handle)) = (previous, LEVEL.get()) {
        let _ = handle.reload(current.min(level));
    }
    SuppressGuard { previous }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_suppress_restores_level() {
        init(&LogOptions::default().with_verbose(true)).unwrap();
        // second call is a no-op
        init(&LogOptions::default()).unwrap();

        let before = current_level();
        assert_eq!(before, Some(LevelFilter::TRACE));
        {
            let _quiet = suppress(LevelFilter::ERROR);
            assert_eq!(current_level(), Some(LevelFilter::ERROR));
            {
                // a looser nested request cannot loosen the outer one
                let _inner = suppress(LevelFilter::INFO);
                assert_eq!(current_level(), Some(LevelFilter::ERROR));
            }
            assert_eq!(current_level(), Some(LevelFilter::ERROR));
        }
        assert_eq!(current_level(), before);
    }

    #[test]
    fn test_default_log_file_location() {
        if let Some(path) = LogOptions::default_log_file() {
            assert!(path.ends_with(".sema/logs/sema.log"));
        }
    }

    #[test]
    fn test_explicit_log_file_wins_over_default() {
        let explicit = LogOptions::default()
            .with_log_file("/tmp/run.log")
            .or_default_log_file();
        assert_eq!(explicit.log_file, Some(PathBuf::from("/tmp/run.log")));

        let fallback = LogOptions::default().or_default_log_file();
        assert_eq!(fallback.log_file, LogOptions::default_log_file());
    }
}
