//! Repository port for user-defined tool definitions.

use crate::tool_definition::domain::{ToolDefinition, ToolName};
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

/// Result type for definition repository operations.
pub type DefinitionRepositoryResult<T> = Result<T, DefinitionRepositoryError>;

/// Persistence contract for user-defined tool definitions.
///
/// Built-in definitions never pass through a repository.
#[async_trait]
pub trait DefinitionRepository: Send + Sync {
    /// Stores a definition, replacing any previous entry with the same name.
    async fn save(&self, definition: &ToolDefinition) -> DefinitionRepositoryResult<()>;

    /// Finds a definition by name.
    async fn find(&self, name: &ToolName) -> DefinitionRepositoryResult<Option<ToolDefinition>>;

    /// Removes a definition. Returns whether an entry existed.
    async fn remove(&self, name: &ToolName) -> DefinitionRepositoryResult<bool>;

    /// Returns every stored definition, ordered by name.
    async fn list_all(&self) -> DefinitionRepositoryResult<Vec<ToolDefinition>>;
}

/// Errors returned by definition repository implementations.
#[derive(Debug, Clone, Error)]
pub enum DefinitionRepositoryError {
    /// Persisted data could not be reconstructed into domain types.
    #[error("invalid persisted tool definition: {0}")]
    InvalidPersistedData(Arc<dyn std::error::Error + Send + Sync>),

    /// Persistence-layer failure.
    #[error("persistence error: {0}")]
    Persistence(Arc<dyn std::error::Error + Send + Sync>),
}

impl DefinitionRepositoryError {
    /// Wraps persisted-data decoding or validation failures.
    pub fn invalid_persisted_data(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::InvalidPersistedData(Arc::new(err))
    }

    /// Wraps a persistence-layer failure.
    pub fn persistence(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Persistence(Arc::new(err))
    }
}
