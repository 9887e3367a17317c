//! Instance keys.

use super::InstanceDomainError;
use crate::identifier::{IdentifierViolation, normalize_identifier};
use crate::tool_definition::domain::ToolName;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Unique handle of a running instance: the tool name or an alias.
///
/// Keys follow the same rules as tool names because they name descriptor
/// files.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct InstanceKey(String);

impl InstanceKey {
    /// Creates a validated instance key.
    ///
    /// # Errors
    ///
    /// Returns [`InstanceDomainError`] when validation fails.
    pub fn new(value: impl AsRef<str>) -> Result<Self, InstanceDomainError> {
        normalize_identifier(value.as_ref())
            .map(Self)
            .map_err(|(violation, normalized)| match violation {
                IdentifierViolation::Empty => InstanceDomainError::EmptyKey,
                IdentifierViolation::TooLong => InstanceDomainError::KeyTooLong(normalized),
                IdentifierViolation::InvalidCharacters => InstanceDomainError::InvalidKey(normalized),
            })
    }

    /// Returns the key as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&ToolName> for InstanceKey {
    fn from(name: &ToolName) -> Self {
        Self(name.as_str().to_owned())
    }
}

impl TryFrom<String> for InstanceKey {
    type Error = InstanceDomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<InstanceKey> for String {
    fn from(key: InstanceKey) -> Self {
        key.0
    }
}

impl AsRef<str> for InstanceKey {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl fmt::Display for InstanceKey {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::InstanceKey;
    use crate::instance::domain::InstanceDomainError;
    use crate::tool_definition::domain::ToolName;
    use rstest::rstest;

    #[rstest]
    fn alias_is_normalized() {
        let key = InstanceKey::new(" Reviewer-1 ").expect("valid key");
        assert_eq!(key.as_str(), "reviewer-1");
    }

    #[rstest]
    #[case("", InstanceDomainError::EmptyKey)]
    #[case("../etc", InstanceDomainError::InvalidKey("../etc".to_owned()))]
    fn rejects_invalid_keys(#[case] raw: &str, #[case] expected: InstanceDomainError) {
        assert_eq!(InstanceKey::new(raw), Err(expected));
    }

    #[rstest]
    fn tool_name_is_a_valid_key() {
        let name = ToolName::new("claude-code").expect("valid name");
        assert_eq!(InstanceKey::from(&name).as_str(), "claude-code");
    }
}
