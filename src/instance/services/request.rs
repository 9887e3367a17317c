//! Launch requests and operation outcomes.

use crate::instance::domain::{InstanceKey, RunningInstance};
use crate::tool_definition::domain::ToolName;

/// Parameters of one launch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchRequest {
    tool: ToolName,
    session: Option<String>,
    alias: Option<InstanceKey>,
}

impl LaunchRequest {
    /// Requests an instance of `tool` keyed by the tool name.
    #[must_use]
    pub const fn new(tool: ToolName) -> Self {
        Self {
            tool,
            session: None,
            alias: None,
        }
    }

    /// Passes a session identifier to the tool.
    #[must_use]
    pub fn with_session(mut self, session: impl Into<String>) -> Self {
        self.session = Some(session.into());
        self
    }

    /// Keys the instance by `alias` so several instances of one tool can
    /// run side by side.
    #[must_use]
    pub fn with_alias(mut self, alias: InstanceKey) -> Self {
        self.alias = Some(alias);
        self
    }

    /// Returns the requested tool.
    #[must_use]
    pub const fn tool(&self) -> &ToolName {
        &self.tool
    }

    /// Returns the session identifier, if any.
    #[must_use]
    pub fn session(&self) -> Option<&str> {
        self.session.as_deref()
    }

    /// Returns the key the instance will run under.
    #[must_use]
    pub fn instance_key(&self) -> InstanceKey {
        self.alias
            .clone()
            .unwrap_or_else(|| InstanceKey::from(&self.tool))
    }
}

/// Result of [`super::InstanceOrchestrator::launch`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LaunchOutcome {
    /// A new instance was started.
    Launched(RunningInstance),
    /// The key was already running; nothing was started.
    AlreadyRunning(RunningInstance),
}

impl LaunchOutcome {
    /// Returns the instance descriptor.
    #[must_use]
    pub const fn instance(&self) -> &RunningInstance {
        match self {
            Self::Launched(instance) | Self::AlreadyRunning(instance) => instance,
        }
    }

    /// Returns `true` when a process was started.
    #[must_use]
    pub const fn is_launched(&self) -> bool {
        matches!(self, Self::Launched(_))
    }
}

/// Result of [`super::InstanceOrchestrator::terminate`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TerminateOutcome {
    /// The instance was stopped; carries its final descriptor.
    Terminated(RunningInstance),
    /// No live instance had the key.
    NotRunning,
}

#[cfg(test)]
mod tests {
    use super::LaunchRequest;
    use crate::instance::domain::InstanceKey;
    use crate::tool_definition::domain::ToolName;
    use rstest::rstest;

    #[rstest]
    fn key_defaults_to_tool_name() {
        let request = LaunchRequest::new(ToolName::new("cat").expect("valid name"));
        assert_eq!(request.instance_key().as_str(), "cat");
    }

    #[rstest]
    fn alias_overrides_key() {
        let request = LaunchRequest::new(ToolName::new("cat").expect("valid name"))
            .with_alias(InstanceKey::new("b").expect("valid key"))
            .with_session("s-9");
        assert_eq!(request.instance_key().as_str(), "b");
        assert_eq!(request.session(), Some("s-9"));
    }
}
