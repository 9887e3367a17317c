//! Adapter kinds, message formats and health check policies.

use super::ToolDefinitionDomainError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Adapter strategy used to talk to a tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdapterKind {
    /// Line-delimited JSON envelopes in and out.
    GenericJson,
    /// Plain text lines in and out.
    GenericText,
    /// Coding assistant speaking the stream-json protocol.
    InteractiveAssistant,
}

impl AdapterKind {
    /// Returns the canonical storage representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::GenericJson => "generic_json",
            Self::GenericText => "generic_text",
            Self::InteractiveAssistant => "interactive_assistant",
        }
    }

    /// Message format the kind uses when a definition does not override it.
    #[must_use]
    pub const fn default_format(self) -> MessageFormat {
        match self {
            Self::GenericText => MessageFormat::Text,
            Self::GenericJson | Self::InteractiveAssistant => MessageFormat::Json,
        }
    }
}

impl fmt::Display for AdapterKind {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

impl FromStr for AdapterKind {
    type Err = ToolDefinitionDomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "generic" | "generic_text" | "text" => Ok(Self::GenericText),
            "generic_json" | "json" => Ok(Self::GenericJson),
            "interactive_assistant" | "assistant" | "claude_code" | "claude" => {
                Ok(Self::InteractiveAssistant)
            }
            _ => Err(ToolDefinitionDomainError::UnknownAdapterKind(value.to_owned())),
        }
    }
}

/// Encoding of lines exchanged with a tool over stdio.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageFormat {
    /// One JSON document per line.
    Json,
    /// Free text, one message per line.
    Text,
}

impl MessageFormat {
    /// Returns the canonical representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Text => "text",
        }
    }
}

impl fmt::Display for MessageFormat {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

impl FromStr for MessageFormat {
    type Err = ToolDefinitionDomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "text" => Ok(Self::Text),
            _ => Err(ToolDefinitionDomainError::UnknownMessageFormat(value.to_owned())),
        }
    }
}

/// Post-launch readiness policy.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "command", rename_all = "snake_case")]
pub enum HealthCheck {
    /// Consider the tool ready as soon as it is spawned.
    None,
    /// The process must survive the startup wait.
    #[default]
    Process,
    /// The process must survive the startup wait and the shell command must
    /// exit successfully.
    Command(String),
}

impl fmt::Display for HealthCheck {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => formatter.write_str("none"),
            Self::Process => formatter.write_str("process"),
            Self::Command(command) => write!(formatter, "command:{command}"),
        }
    }
}

impl FromStr for HealthCheck {
    type Err = ToolDefinitionDomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let trimmed = value.trim();
        if let Some(command) = trimmed.strip_prefix("command:") {
            let command = command.trim();
            if command.is_empty() {
                return Err(ToolDefinitionDomainError::InvalidHealthCheck(value.to_owned()));
            }
            return Ok(Self::Command(command.to_owned()));
        }
        match trimmed.to_ascii_lowercase().as_str() {
            "none" => Ok(Self::None),
            "process" | "default" => Ok(Self::Process),
            _ => Err(ToolDefinitionDomainError::InvalidHealthCheck(value.to_owned())),
        }
    }
}
