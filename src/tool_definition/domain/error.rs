//! Error types for tool definition validation and parsing.

use thiserror::Error;

/// Errors returned while constructing tool definition values.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ToolDefinitionDomainError {
    /// The tool name is empty after trimming.
    #[error("tool name must not be empty")]
    EmptyName,

    /// The tool name contains characters outside `[a-z0-9_-]` or does not
    /// start with an alphanumeric character.
    #[error(
        "tool name '{0}' is invalid (lowercase alphanumeric, '-' and '_' only, starting alphanumeric)"
    )]
    InvalidName(String),

    /// The tool name exceeds the length limit.
    #[error("tool name exceeds 64 character limit: {0}")]
    NameTooLong(String),

    /// A capability flag is empty or malformed.
    #[error("capability '{0}' is invalid (lowercase alphanumeric and '_' only)")]
    InvalidCapability(String),

    /// The port is neither `auto` nor a non-zero port number.
    #[error("port '{0}' must be 'auto' or a number between 1 and 65535")]
    InvalidPort(String),

    /// The adapter kind is not recognised.
    #[error("unknown adapter kind '{0}'")]
    UnknownAdapterKind(String),

    /// The message format is not recognised.
    #[error("unknown message format '{0}' (expected json or text)")]
    UnknownMessageFormat(String),

    /// The health check value is not recognised.
    #[error("invalid health check '{0}' (expected none, process or command:<shell command>)")]
    InvalidHealthCheck(String),

    /// The executable path is empty.
    #[error("executable path must not be empty")]
    EmptyExecutable,

    /// An environment assignment is not of the form `KEY=VALUE`.
    #[error("environment assignment '{0}' must have the form KEY=VALUE")]
    InvalidEnvironment(String),
}
