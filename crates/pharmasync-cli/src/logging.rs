//! File logging for unattended runs.

use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use clap::ValueEnum;
use pharmasync_core::config::data_dir;
use pharmasync_core::CoreError;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::EnvFilter;

const DEFAULT_LOG_FILE: &str = "pharmasync.log";

/// Level names accepted by `--verbose` and `logging.level`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
#[value(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LogLevel {
    Debug,
    Info,
    Warning,
    #[default]
    Error,
    Critical,
}

impl LogLevel {
    /// Case-insensitive lookup used for the config file value.
    pub fn parse(s: &str) -> Option<Self> {
        <Self as ValueEnum>::from_str(s, true).ok()
    }

    pub fn filter(self) -> LevelFilter {
        match self {
            LogLevel::Debug => LevelFilter::DEBUG,
            LogLevel::Info => LevelFilter::INFO,
            LogLevel::Warning => LevelFilter::WARN,
            LogLevel::Error | LogLevel::Critical => LevelFilter::ERROR,
        }
    }
}

pub fn default_log_file() -> Result<PathBuf, CoreError> {
    Ok(data_dir()?.join(DEFAULT_LOG_FILE))
}

/// Install the global subscriber writing to `path` in append mode.
///
/// `RUST_LOG` directives are added on top of `level`.
pub fn init(path: &Path, level: LogLevel) -> Result<(), CoreError> {
    let file = OpenOptions::new().create(true).append(true).open(path)?;
    let filter = EnvFilter::builder()
        .with_default_directive(level.filter().into())
        .from_env_lossy();

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .with_target(true)
        .try_init()
        .map_err(|e| CoreError::Custom(format!("logging setup failed: {e}")))
}
