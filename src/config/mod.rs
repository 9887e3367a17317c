//! Runtime configuration.
//!
//! Settings come from an optional TOML file found on the search path, then
//! environment overrides, then validation. Every field has a default so an
//! absent file is not an error.

mod error;
mod file;
mod settings;

pub use error::ConfigError;
pub use file::{CONFIG_ENV_VAR, from_path, from_str, load, search_paths};
pub use settings::{
    AssistantSettings, BridgeSettings, LoggingSettings, PortSettings, ProcessSettings, Settings,
};
