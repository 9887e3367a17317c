//! Validated names for tool definitions and capability flags.

use super::ToolDefinitionDomainError;
use crate::identifier::{IdentifierViolation, normalize_identifier};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Validated tool definition name.
///
/// Names are trimmed and lowercased, limited to `[a-z0-9_-]`, must start
/// with an alphanumeric character and are at most 64 characters long. They
/// are used verbatim as file names.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ToolName(String);

impl ToolName {
    /// Creates a validated tool name.
    ///
    /// # Errors
    ///
    /// Returns [`ToolDefinitionDomainError`] when validation fails.
    pub fn new(value: impl AsRef<str>) -> Result<Self, ToolDefinitionDomainError> {
        normalize_identifier(value.as_ref())
            .map(Self)
            .map_err(|(violation, normalized)| match violation {
                IdentifierViolation::Empty => ToolDefinitionDomainError::EmptyName,
                IdentifierViolation::TooLong => ToolDefinitionDomainError::NameTooLong(normalized),
                IdentifierViolation::InvalidCharacters => {
                    ToolDefinitionDomainError::InvalidName(normalized)
                }
            })
    }

    /// Returns the name as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Human-readable default label: separators become spaces and each word
    /// is capitalised.
    #[must_use]
    pub fn default_display_name(&self) -> String {
        self.0
            .split(['-', '_'])
            .filter(|word| !word.is_empty())
            .map(capitalise)
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl TryFrom<String> for ToolName {
    type Error = ToolDefinitionDomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<ToolName> for String {
    fn from(value: ToolName) -> Self {
        value.0
    }
}

impl AsRef<str> for ToolName {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl fmt::Display for ToolName {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// A capability flag advertised by a tool, such as `code_generation`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Capability(String);

impl Capability {
    /// Creates a capability flag.
    ///
    /// Input is trimmed and lowercased; spaces and hyphens become
    /// underscores.
    ///
    /// # Errors
    ///
    /// Returns [`ToolDefinitionDomainError::InvalidCapability`] when the
    /// result is empty or contains other characters.
    pub fn new(value: impl AsRef<str>) -> Result<Self, ToolDefinitionDomainError> {
        let normalized: String = value
            .as_ref()
            .trim()
            .to_ascii_lowercase()
            .chars()
            .map(|character| if matches!(character, ' ' | '-') { '_' } else { character })
            .collect();
        let is_valid = !normalized.is_empty()
            && normalized
                .chars()
                .all(|character| character.is_ascii_lowercase() || character.is_ascii_digit() || character == '_');
        if !is_valid {
            return Err(ToolDefinitionDomainError::InvalidCapability(normalized));
        }
        Ok(Self(normalized))
    }

    /// Returns the flag as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the flag as title-cased words, e.g. `Code Generation`.
    #[must_use]
    pub fn label(&self) -> String {
        self.0
            .split('_')
            .filter(|word| !word.is_empty())
            .map(capitalise)
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl TryFrom<String> for Capability {
    type Error = ToolDefinitionDomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Capability> for String {
    fn from(value: Capability) -> Self {
        value.0
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

fn capitalise(word: &str) -> String {
    let mut characters = word.chars();
    characters.next().map_or_else(String::new, |first| {
        first.to_uppercase().chain(characters).collect()
    })
}
