//! In-memory repository for user-defined tool definitions.

use crate::tool_definition::{
    domain::{ToolDefinition, ToolName},
    ports::{DefinitionRepository, DefinitionRepositoryError, DefinitionRepositoryResult},
};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

/// Thread-safe in-memory definition repository.
#[derive(Debug, Clone, Default)]
pub struct InMemoryDefinitionRepository {
    definitions: Arc<RwLock<BTreeMap<ToolName, ToolDefinition>>>,
}

impl InMemoryDefinitionRepository {
    /// Creates an empty repository.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

fn lock_error(err: impl std::fmt::Display) -> DefinitionRepositoryError {
    DefinitionRepositoryError::persistence(std::io::Error::other(err.to_string()))
}

#[async_trait]
impl DefinitionRepository for InMemoryDefinitionRepository {
    async fn save(&self, definition: &ToolDefinition) -> DefinitionRepositoryResult<()> {
        let mut definitions = self.definitions.write().map_err(lock_error)?;
        definitions.insert(definition.name().clone(), definition.clone());
        Ok(())
    }

    async fn find(&self, name: &ToolName) -> DefinitionRepositoryResult<Option<ToolDefinition>> {
        let definitions = self.definitions.read().map_err(lock_error)?;
        Ok(definitions.get(name).cloned())
    }

    async fn remove(&self, name: &ToolName) -> DefinitionRepositoryResult<bool> {
        let mut definitions = self.definitions.write().map_err(lock_error)?;
        Ok(definitions.remove(name).is_some())
    }

    async fn list_all(&self) -> DefinitionRepositoryResult<Vec<ToolDefinition>> {
        let definitions = self.definitions.read().map_err(lock_error)?;
        Ok(definitions.values().cloned().collect())
    }
}
