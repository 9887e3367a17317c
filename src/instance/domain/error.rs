//! Instance domain validation errors.

use thiserror::Error;

/// Errors raised while validating instance values.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InstanceDomainError {
    /// The instance key is empty after trimming.
    #[error("instance key must not be empty")]
    EmptyKey,

    /// The instance key contains characters outside `[a-z0-9_-]`.
    #[error("invalid instance key '{0}': use lowercase letters, digits, '-' or '_', starting with a letter or digit")]
    InvalidKey(String),

    /// The instance key is longer than 64 characters.
    #[error("instance key '{0}' exceeds 64 characters")]
    KeyTooLong(String),
}
