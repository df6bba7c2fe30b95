//! ## scenaria-telemetry::logging
//! **Structured logging with `tracing-subscriber`**
//!
//! Installs the process-wide subscriber. `RUST_LOG` wins over the configured
//! level so a single run can be inspected without editing configuration.

use thiserror::Error;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("invalid log filter `{filter}`: {source}")]
    Filter {
        filter: String,
        #[source]
        source: tracing_subscriber::filter::ParseError,
    },

    #[error("a global subscriber is already installed")]
    AlreadyInitialized,
}

#[derive(Clone)]
pub struct EventLogger;

impl EventLogger {
    /// Installs a `fmt` subscriber writing to stderr at `level`, as JSON lines
    /// when `json` is set.
    pub fn init(level: &str, json: bool) -> Result<(), LoggingError> {
        let filter = Self::filter(level)?;
        let builder = fmt()
            .with_env_filter(filter)
            .with_target(false)
            .with_writer(std::io::stderr);
        let installed = if json {
            builder.json().try_init()
        } else {
            builder.try_init()
        };
        installed.map_err(|_| LoggingError::AlreadyInitialized)
    }

    fn filter(level: &str) -> Result<EnvFilter, LoggingError> {
        match EnvFilter::try_from_default_env() {
            Ok(filter) => Ok(filter),
            Err(_) => EnvFilter::try_new(level).map_err(|source| LoggingError::Filter {
                filter: level.to_string(),
                source,
            }),
        }
    }

    /// Logs the outcome of a completed run.
    pub fn log_run(title: &str, steps: usize, digest: &str) {
        tracing::info!(scenario = title, steps, digest, "Scenario run completed");
    }
}
