//! Adapter construction errors.

use crate::tool_definition::domain::AdapterKind;
use thiserror::Error;

/// Errors raised while constructing an adapter.
#[derive(Debug, Error)]
pub enum AdapterError {
    /// No constructor is registered for the kind.
    #[error("no adapter registered for kind '{0}'")]
    UnsupportedKind(AdapterKind),

    /// A built-in classification pattern failed to compile.
    #[error("invalid adapter pattern: {0}")]
    Pattern(#[from] regex::Error),
}
