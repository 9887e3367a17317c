//! Port assignment policy.

use super::ToolDefinitionDomainError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::num::NonZeroU16;
use std::str::FromStr;

/// Port a tool's bridge listens on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawPortSpec", into = "RawPortSpec")]
pub enum PortSpec {
    /// Always this port.
    Fixed(NonZeroU16),
    /// Allocated from the free range at launch.
    Auto,
}

impl PortSpec {
    /// Returns the fixed port, if any.
    #[must_use]
    pub const fn fixed(self) -> Option<u16> {
        match self {
            Self::Fixed(port) => Some(port.get()),
            Self::Auto => None,
        }
    }
}

impl fmt::Display for PortSpec {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fixed(port) => write!(formatter, "{port}"),
            Self::Auto => formatter.write_str("auto"),
        }
    }
}

impl FromStr for PortSpec {
    type Err = ToolDefinitionDomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let trimmed = value.trim();
        if trimmed.eq_ignore_ascii_case("auto") {
            return Ok(Self::Auto);
        }
        trimmed
            .parse::<NonZeroU16>()
            .map(Self::Fixed)
            .map_err(|_| ToolDefinitionDomainError::InvalidPort(value.to_owned()))
    }
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum RawPortSpec {
    Number(u16),
    Text(String),
}

impl TryFrom<RawPortSpec> for PortSpec {
    type Error = ToolDefinitionDomainError;

    fn try_from(value: RawPortSpec) -> Result<Self, Self::Error> {
        match value {
            RawPortSpec::Number(port) => NonZeroU16::new(port)
                .map(Self::Fixed)
                .ok_or_else(|| ToolDefinitionDomainError::InvalidPort(port.to_string())),
            RawPortSpec::Text(text) => text.parse(),
        }
    }
}

impl From<PortSpec> for RawPortSpec {
    fn from(value: PortSpec) -> Self {
        match value {
            PortSpec::Fixed(port) => Self::Number(port.get()),
            PortSpec::Auto => Self::Text("auto".to_owned()),
        }
    }
}
