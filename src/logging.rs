//! Tracing subscriber setup for the `oak` binary.

use once_cell::sync::OnceCell;
use std::fmt;
use std::io::{self, IsTerminal};
use std::str::FromStr;
use tracing::subscriber::SetGlobalDefaultError;
use tracing::Subscriber;
use tracing_subscriber::EnvFilter;

static LOGGING_GUARD: OnceCell<()> = OnceCell::new();

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum LogFormat {
    #[default]
    Compact,
    Json,
}

impl fmt::Display for LogFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogFormat::Compact => f.write_str("compact"),
            LogFormat::Json => f.write_str("json"),
        }
    }
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "compact" => Ok(LogFormat::Compact),
            "json" => Ok(LogFormat::Json),
            other => Err(format!("unknown log format: {other}")),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum LoggingError {
    #[error("invalid log filter: {0}")]
    Filter(String),

    #[error("failed to install log subscriber: {0}")]
    Subscriber(SetGlobalDefaultError),
}

/// Install the global subscriber, writing to stderr.
///
/// `RUST_LOG` takes precedence over `level` when set. Only the first call
/// installs anything; later calls return `Ok(())`.
pub fn init(level: &str, format: LogFormat) -> Result<(), LoggingError> {
    LOGGING_GUARD
        .get_or_try_init(|| install_subscriber(level, format))
        .map(|_| ())
}

fn filter_for(level: &str) -> Result<EnvFilter, LoggingError> {
    match EnvFilter::try_from_default_env() {
        Ok(filter) => Ok(filter),
        Err(_) => EnvFilter::try_new(level).map_err(|e| LoggingError::Filter(e.to_string())),
    }
}

fn install_subscriber(level: &str, format: LogFormat) -> Result<(), LoggingError> {
    let filter = filter_for(level)?;

    let builder = |filter: EnvFilter| {
        tracing_subscriber::fmt::Subscriber::builder()
            .with_env_filter(filter)
            .with_target(false)
            .with_writer(io::stderr)
            .with_ansi(io::stderr().is_terminal())
    };

    let subscriber: Box<dyn Subscriber + Send + Sync> = match format {
        LogFormat::Json => Box::new(builder(filter).json().flatten_event(true).finish()),
        LogFormat::Compact => Box::new(builder(filter).compact().without_time().finish()),
    };

    tracing::subscriber::set_global_default(subscriber).map_err(LoggingError::Subscriber)
}
