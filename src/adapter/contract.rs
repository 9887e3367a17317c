//! The adapter contract shared by every tool kind.

use crate::envelope::MessageEnvelope;
use crate::tool_definition::domain::{AdapterKind, Capability, HealthCheck, ToolDefinition};
use camino::Utf8PathBuf;

/// What an adapter did with a line the tool wrote to stderr.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorDisposition {
    /// Nothing beyond logging.
    Logged,
    /// The adapter recognised the error and adjusted its own state.
    Handled,
    /// The adapter requires a session reset before continuing.
    ResetSession,
}

/// How an adapter asks its tool to exit before signals are sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShutdownAction {
    /// Close the tool's stdin so it sees end of input.
    CloseStdin,
    /// Write this line to stdin, then close it.
    SendLine(String),
    /// Go straight to signals.
    Signal,
}

/// Strategy for launching one kind of tool and translating its messages.
///
/// Implementations are shared between the bridge dispatcher and the
/// process reader loops, so mutable session state lives behind interior
/// locks.
pub trait ToolAdapter: Send + Sync {
    /// Returns the adapter kind.
    fn kind(&self) -> AdapterKind;

    /// Returns the definition the adapter was built from.
    fn definition(&self) -> &ToolDefinition;

    /// Resolves the executable to launch, or `None` when it cannot be found.
    fn resolve_executable(&self) -> Option<Utf8PathBuf>;

    /// Builds the launch arguments for an optional session.
    fn build_launch_args(&self, session: Option<&str>) -> Vec<String>;

    /// Translates an envelope into one stdin payload (without the newline).
    fn to_wire(&self, envelope: &MessageEnvelope) -> String;

    /// Translates one stdout line into an envelope.
    ///
    /// Returns `None` only for blank lines.
    fn from_wire(&self, line: &str) -> Option<MessageEnvelope>;

    /// Observes an envelope produced from the tool's output.
    fn on_output(&self, _envelope: &MessageEnvelope) {}

    /// Classifies one stderr line.
    fn on_error(&self, _line: &str) -> ErrorDisposition {
        ErrorDisposition::Logged
    }

    /// Returns `true` when the adapter wants its session reset.
    fn should_reset_session(&self) -> bool {
        false
    }

    /// Clears session state.
    fn reset_session(&self) {}

    /// Returns the capability flags advertised for the tool.
    fn capabilities(&self) -> Vec<Capability> {
        self.definition().capabilities().iter().cloned().collect()
    }

    /// Returns the readiness policy applied after spawn.
    fn health_check_command(&self) -> HealthCheck {
        self.definition().health_check().clone()
    }

    /// Returns the graceful shutdown action tried before signals.
    fn shutdown_action(&self) -> ShutdownAction {
        ShutdownAction::CloseStdin
    }
}
