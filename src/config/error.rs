//! Configuration errors.

use camino::Utf8PathBuf;
use thiserror::Error;

/// Errors raised while loading or validating [`super::Settings`].
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A configuration file exists but could not be read.
    #[error("failed to read configuration file '{path}': {source}")]
    Read {
        /// Path of the unreadable file.
        path: Utf8PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// The configuration file is not valid TOML for the settings schema.
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),

    /// An environment override could not be parsed.
    #[error("environment variable {variable} has invalid value '{value}'")]
    InvalidOverride {
        /// Variable name.
        variable: String,
        /// Rejected value.
        value: String,
    },

    /// A setting is outside its accepted range.
    #[error("invalid setting {field}: {reason}")]
    Invalid {
        /// Dotted setting path.
        field: &'static str,
        /// Human-readable constraint.
        reason: String,
    },

    /// No state directory was configured and none could be derived.
    #[error("cannot determine a state directory; set TOOLBRIDGE_STATE_DIR")]
    NoStateDirectory,
}
