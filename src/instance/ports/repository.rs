//! Repository port for running-instance descriptors.

use crate::instance::domain::{InstanceKey, RunningInstance};
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

/// Result type for instance repository operations.
pub type InstanceRepositoryResult<T> = Result<T, InstanceRepositoryError>;

/// Persistence contract for instance descriptors.
///
/// Implementations shared between processes must make `save` atomic so
/// that concurrent readers never observe a partially written descriptor.
#[async_trait]
pub trait InstanceRepository: Send + Sync {
    /// Stores a descriptor, replacing any previous one with the same key.
    async fn save(&self, instance: &RunningInstance) -> InstanceRepositoryResult<()>;

    /// Stores a descriptor only when none exists under its key.
    ///
    /// Returns `false` when the key is already held. Implementations shared
    /// between processes must decide this atomically.
    async fn claim(&self, instance: &RunningInstance) -> InstanceRepositoryResult<bool>;

    /// Finds a descriptor by key.
    async fn find(&self, key: &InstanceKey) -> InstanceRepositoryResult<Option<RunningInstance>>;

    /// Removes a descriptor. Returns whether one existed.
    async fn remove(&self, key: &InstanceKey) -> InstanceRepositoryResult<bool>;

    /// Returns every stored descriptor, ordered by key.
    async fn list_all(&self) -> InstanceRepositoryResult<Vec<RunningInstance>>;
}

/// Errors returned by instance repository implementations.
#[derive(Debug, Clone, Error)]
pub enum InstanceRepositoryError {
    /// Persisted data could not be reconstructed into domain types.
    #[error("invalid persisted instance descriptor: {0}")]
    InvalidPersistedData(Arc<dyn std::error::Error + Send + Sync>),

    /// Persistence-layer failure.
    #[error("persistence error: {0}")]
    Persistence(Arc<dyn std::error::Error + Send + Sync>),
}

impl InstanceRepositoryError {
    /// Wraps persisted-data decoding or validation failures.
    pub fn invalid_persisted_data(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::InvalidPersistedData(Arc::new(err))
    }

    /// Wraps a persistence-layer failure.
    pub fn persistence(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Persistence(Arc::new(err))
    }
}
