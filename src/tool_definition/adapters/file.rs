//! File-backed repository: one JSON document per user definition.

use crate::persistence::{JsonDirectory, PersistenceError};
use crate::tool_definition::{
    domain::{ToolDefinition, ToolName},
    ports::{DefinitionRepository, DefinitionRepositoryError, DefinitionRepositoryResult},
};
use async_trait::async_trait;
use camino::Utf8Path;

/// Stores user definitions as `<dir>/<name>.json`.
#[derive(Debug, Clone)]
pub struct FileDefinitionRepository {
    directory: JsonDirectory,
}

impl FileDefinitionRepository {
    /// Opens (creating if needed) the definitions directory.
    ///
    /// # Errors
    ///
    /// Returns [`DefinitionRepositoryError::Persistence`] when the directory
    /// cannot be created or opened.
    pub fn open(path: &Utf8Path) -> DefinitionRepositoryResult<Self> {
        let directory = JsonDirectory::open(path).map_err(DefinitionRepositoryError::persistence)?;
        Ok(Self { directory })
    }
}

fn map_error(err: PersistenceError) -> DefinitionRepositoryError {
    match err {
        PersistenceError::Json { .. } => DefinitionRepositoryError::invalid_persisted_data(err),
        PersistenceError::Io { .. } | PersistenceError::Task(_) => {
            DefinitionRepositoryError::persistence(err)
        }
    }
}

#[async_trait]
impl DefinitionRepository for FileDefinitionRepository {
    async fn save(&self, definition: &ToolDefinition) -> DefinitionRepositoryResult<()> {
        let record = definition.clone();
        self.directory
            .run(move |directory| directory.write(record.name().as_str(), &record))
            .await
            .map_err(map_error)
    }

    async fn find(&self, name: &ToolName) -> DefinitionRepositoryResult<Option<ToolDefinition>> {
        let key = name.clone();
        self.directory
            .run(move |directory| directory.read(key.as_str()))
            .await
            .map_err(map_error)
    }

    async fn remove(&self, name: &ToolName) -> DefinitionRepositoryResult<bool> {
        let key = name.clone();
        self.directory
            .run(move |directory| directory.remove(key.as_str()))
            .await
            .map_err(map_error)
    }

    async fn list_all(&self) -> DefinitionRepositoryResult<Vec<ToolDefinition>> {
        self.directory
            .run(|directory| {
                let mut definitions = Vec::new();
                for name in directory.names()? {
                    match directory.read::<ToolDefinition>(&name) {
                        Ok(Some(definition)) => definitions.push(definition),
                        Ok(None) => {}
                        Err(err) => {
                            tracing::warn!(record = %name, error = %err, "skipping unreadable tool definition");
                        }
                    }
                }
                Ok(definitions)
            })
            .await
            .map_err(map_error)
    }
}
