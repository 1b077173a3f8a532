//! Tracing subscriber setup for the binary.

use thiserror::Error;
use tracing_subscriber::{EnvFilter, fmt};

#[derive(Error, Debug)]
pub enum LoggingError {
    #[error("failed to create log filter: {0}")]
    Filter(String),
    #[error("tracing init error: {0}")]
    Init(String),
}

/// Build the log filter: `RUST_LOG` when set, else `level`, else `info`.
pub fn build_filter(level: &str) -> Result<EnvFilter, LoggingError> {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return Ok(filter);
    }
    EnvFilter::try_new(level.to_ascii_lowercase())
        .or_else(|_| EnvFilter::try_new("info"))
        .map_err(|err| LoggingError::Filter(err.to_string()))
}

/// Install the global fmt subscriber. Logs go to stderr so stdout stays
/// clean for command output.
pub fn init_tracing(level: &str) -> Result<(), LoggingError> {
    let filter = build_filter(level)?;
    fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init()
        .map_err(|err| LoggingError::Init(err.to_string()))
}
