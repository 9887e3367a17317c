//! Tracing subscriber setup for the command-line binary and instance hosts.

use std::fs::File;
use std::sync::Mutex;
use thiserror::Error;
use tracing_subscriber::EnvFilter;

/// Destination for formatted log events.
#[derive(Debug)]
pub enum LogTarget {
    /// Interactive use: coloured output on stderr.
    Stderr,
    /// Detached instance hosts: plain text appended to a log file.
    File(File),
}

/// Errors raised while installing the global subscriber.
#[derive(Debug, Error)]
pub enum LoggingError {
    /// The filter directive could not be parsed.
    #[error("invalid log filter '{directive}': {message}")]
    Filter {
        /// Rejected directive.
        directive: String,
        /// Parser message.
        message: String,
    },

    /// A global subscriber is already installed.
    #[error("failed to install log subscriber: {0}")]
    Install(String),
}

/// Builds the event filter: `RUST_LOG` wins over the configured directive.
///
/// # Errors
///
/// Returns [`LoggingError::Filter`] when `directive` is not a valid filter.
pub fn build_filter(directive: &str) -> Result<EnvFilter, LoggingError> {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return Ok(filter);
    }
    EnvFilter::try_new(directive).map_err(|error| LoggingError::Filter {
        directive: directive.to_owned(),
        message: error.to_string(),
    })
}

/// Installs the global `tracing` subscriber.
///
/// # Errors
///
/// Returns [`LoggingError`] for an invalid directive or when a subscriber
/// has already been installed.
pub fn init(directive: &str, target: LogTarget) -> Result<(), LoggingError> {
    let filter = build_filter(directive)?;
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false);

    let installed = match target {
        LogTarget::Stderr => builder.with_writer(std::io::stderr).try_init(),
        LogTarget::File(file) => builder
            .with_ansi(false)
            .with_writer(Mutex::new(file))
            .try_init(),
    };
    installed.map_err(|error| LoggingError::Install(error.to_string()))
}
