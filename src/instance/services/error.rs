//! Orchestrator errors.

use crate::instance::domain::{InstanceDomainError, InstanceKey};
use crate::instance::ports::InstanceRepositoryError;
use crate::process::ProcessError;
use crate::tool_definition::domain::ToolName;
use crate::tool_definition::services::ToolDefinitionStoreError;
use thiserror::Error;

/// Result type for orchestrator operations.
pub type OrchestratorResult<T> = Result<T, OrchestratorError>;

/// Errors raised by [`super::InstanceOrchestrator`].
#[derive(Debug, Error)]
pub enum OrchestratorError {
    /// Instance key validation failed.
    #[error(transparent)]
    Domain(#[from] InstanceDomainError),

    /// No definition has the requested name.
    #[error("tool '{0}' is not defined")]
    UnknownTool(ToolName),

    /// Another launch currently holds the instance key.
    #[error("a launch of '{0}' is already in progress")]
    LaunchInProgress(InstanceKey),

    /// A launch step failed; everything it started was rolled back.
    #[error("failed to launch '{key}': {reason}")]
    LaunchFailed {
        /// Instance being launched.
        key: InstanceKey,
        /// Failure description.
        reason: String,
    },

    /// Definition catalog failure.
    #[error(transparent)]
    Definition(#[from] ToolDefinitionStoreError),

    /// Descriptor persistence failure.
    #[error(transparent)]
    Repository(#[from] InstanceRepositoryError),

    /// Process control failure during termination.
    #[error(transparent)]
    Process(#[from] ProcessError),
}

impl OrchestratorError {
    pub(super) fn launch_failed(key: &InstanceKey, reason: impl std::fmt::Display) -> Self {
        Self::LaunchFailed {
            key: key.clone(),
            reason: reason.to_string(),
        }
    }
}
