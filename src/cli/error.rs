//! Command-line errors.

use crate::bridge::BridgeError;
use crate::config::ConfigError;
use crate::instance::domain::InstanceDomainError;
use crate::instance::ports::InstanceRepositoryError;
use crate::instance::services::OrchestratorError;
use crate::logging::LoggingError;
use crate::tool_definition::domain::ToolDefinitionDomainError;
use crate::tool_definition::ports::DefinitionRepositoryError;
use crate::tool_definition::services::ToolDefinitionStoreError;
use thiserror::Error;

/// Failure of one command; rendered as a single line before exiting 1.
#[derive(Debug, Error)]
pub enum CliError {
    /// Configuration could not be loaded.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Logging could not be initialised.
    #[error(transparent)]
    Logging(#[from] LoggingError),

    /// The async runtime could not be started.
    #[error("failed to start runtime: {0}")]
    Runtime(#[source] std::io::Error),

    /// Writing command output failed.
    #[error("failed to write output: {0}")]
    Output(#[from] std::io::Error),

    /// Invalid definition input.
    #[error(transparent)]
    DefinitionInput(#[from] ToolDefinitionDomainError),

    /// Definition storage could not be opened.
    #[error(transparent)]
    DefinitionRepository(#[from] DefinitionRepositoryError),

    /// Catalog operation failed.
    #[error(transparent)]
    Definition(#[from] ToolDefinitionStoreError),

    /// Invalid instance key.
    #[error(transparent)]
    InstanceKey(#[from] InstanceDomainError),

    /// Descriptor storage could not be opened.
    #[error(transparent)]
    InstanceRepository(#[from] InstanceRepositoryError),

    /// Instance operation failed.
    #[error(transparent)]
    Instance(#[from] OrchestratorError),

    /// Socket exchange failed.
    #[error(transparent)]
    Bridge(#[from] BridgeError),

    /// The named tool does not exist.
    #[error("tool '{0}' is not defined")]
    NotDefined(String),

    /// The named instance is not running.
    #[error("instance '{0}' is not running")]
    NotRunning(String),

    /// The instance host reported a failed launch.
    #[error("{0}")]
    Launch(String),

    /// A detached host failed to start or report.
    #[error("instance host failed: {0}")]
    Host(String),
}
