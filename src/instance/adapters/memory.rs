//! In-memory repository for instance descriptors.

use crate::instance::{
    domain::{InstanceKey, RunningInstance},
    ports::{InstanceRepository, InstanceRepositoryError, InstanceRepositoryResult},
};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

/// Thread-safe in-memory instance repository.
#[derive(Debug, Clone, Default)]
pub struct InMemoryInstanceRepository {
    instances: Arc<RwLock<BTreeMap<InstanceKey, RunningInstance>>>,
}

impl InMemoryInstanceRepository {
    /// Creates an empty repository.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

fn lock_error(err: impl std::fmt::Display) -> InstanceRepositoryError {
    InstanceRepositoryError::persistence(std::io::Error::other(err.to_string()))
}

#[async_trait]
impl InstanceRepository for InMemoryInstanceRepository {
    async fn save(&self, instance: &RunningInstance) -> InstanceRepositoryResult<()> {
        let mut instances = self.instances.write().map_err(lock_error)?;
        instances.insert(instance.instance_key().clone(), instance.clone());
        Ok(())
    }

    async fn claim(&self, instance: &RunningInstance) -> InstanceRepositoryResult<bool> {
        let mut instances = self.instances.write().map_err(lock_error)?;
        if instances.contains_key(instance.instance_key()) {
            return Ok(false);
        }
        instances.insert(instance.instance_key().clone(), instance.clone());
        Ok(true)
    }

    async fn find(&self, key: &InstanceKey) -> InstanceRepositoryResult<Option<RunningInstance>> {
        let instances = self.instances.read().map_err(lock_error)?;
        Ok(instances.get(key).cloned())
    }

    async fn remove(&self, key: &InstanceKey) -> InstanceRepositoryResult<bool> {
        let mut instances = self.instances.write().map_err(lock_error)?;
        Ok(instances.remove(key).is_some())
    }

    async fn list_all(&self) -> InstanceRepositoryResult<Vec<RunningInstance>> {
        let instances = self.instances.read().map_err(lock_error)?;
        Ok(instances.values().cloned().collect())
    }
}
