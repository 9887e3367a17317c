//! File-backed repository: one JSON descriptor per instance key.

use crate::instance::{
    domain::{InstanceKey, RunningInstance},
    ports::{InstanceRepository, InstanceRepositoryError, InstanceRepositoryResult},
};
use crate::persistence::{JsonDirectory, PersistenceError};
use async_trait::async_trait;
use camino::Utf8Path;

/// Stores descriptors as `<dir>/<key>.json`.
///
/// Several processes may share the directory; every write replaces the
/// whole descriptor atomically.
#[derive(Debug, Clone)]
pub struct FileInstanceRepository {
    directory: JsonDirectory,
}

impl FileInstanceRepository {
    /// Opens (creating if needed) the descriptor directory.
    ///
    /// # Errors
    ///
    /// Returns [`InstanceRepositoryError::Persistence`] when the directory
    /// cannot be created or opened.
    pub fn open(path: &Utf8Path) -> InstanceRepositoryResult<Self> {
        let directory = JsonDirectory::open(path).map_err(InstanceRepositoryError::persistence)?;
        Ok(Self { directory })
    }

    /// Returns the descriptor directory.
    #[must_use]
    pub fn path(&self) -> &Utf8Path {
        self.directory.path()
    }
}

fn map_error(err: PersistenceError) -> InstanceRepositoryError {
    match err {
        PersistenceError::Json { .. } => InstanceRepositoryError::invalid_persisted_data(err),
        PersistenceError::Io { .. } | PersistenceError::Task(_) => {
            InstanceRepositoryError::persistence(err)
        }
    }
}

#[async_trait]
impl InstanceRepository for FileInstanceRepository {
    async fn save(&self, instance: &RunningInstance) -> InstanceRepositoryResult<()> {
        let record = instance.clone();
        self.directory
            .run(move |directory| directory.write(record.instance_key().as_str(), &record))
            .await
            .map_err(map_error)
    }

    async fn claim(&self, instance: &RunningInstance) -> InstanceRepositoryResult<bool> {
        let record = instance.clone();
        self.directory
            .run(move |directory| directory.write_new(record.instance_key().as_str(), &record))
            .await
            .map_err(map_error)
    }

    async fn find(&self, key: &InstanceKey) -> InstanceRepositoryResult<Option<RunningInstance>> {
        let name = key.clone();
        self.directory
            .run(move |directory| directory.read(name.as_str()))
            .await
            .map_err(map_error)
    }

    async fn remove(&self, key: &InstanceKey) -> InstanceRepositoryResult<bool> {
        let name = key.clone();
        self.directory
            .run(move |directory| directory.remove(name.as_str()))
            .await
            .map_err(map_error)
    }

    async fn list_all(&self) -> InstanceRepositoryResult<Vec<RunningInstance>> {
        self.directory
            .run(|directory| {
                let mut instances = Vec::new();
                for name in directory.names()? {
                    match directory.read::<RunningInstance>(&name) {
                        Ok(Some(instance)) => instances.push(instance),
                        Ok(None) => {}
                        Err(err) => {
                            tracing::warn!(record = %name, error = %err, "skipping unreadable instance descriptor");
                        }
                    }
                }
                Ok(instances)
            })
            .await
            .map_err(map_error)
    }
}

#[cfg(test)]
mod tests {
    use super::FileInstanceRepository;
    use crate::instance::domain::{InstanceKey, InstanceMetrics, RunningInstance};
    use crate::instance::ports::InstanceRepository;
    use crate::tool_definition::domain::ToolName;
    use camino::Utf8PathBuf;
    use chrono::Utc;
    use rstest::{fixture, rstest};
    use tempfile::TempDir;

    struct Store {
        _temp: TempDir,
        root: Utf8PathBuf,
    }

    #[fixture]
    fn store() -> Store {
        let temp = TempDir::new().expect("temp dir");
        let root = Utf8PathBuf::from_path_buf(temp.path().join("instances")).expect("utf8 path");
        Store { _temp: temp, root }
    }

    fn descriptor(key: &str, port: u16) -> RunningInstance {
        RunningInstance::new(
            InstanceKey::new(key).expect("valid key"),
            ToolName::new("cat").expect("valid name"),
            4242,
            port,
            Some("s-1".to_owned()),
            Utc::now(),
        )
    }

    #[rstest]
    #[tokio::test]
    async fn descriptors_are_visible_to_a_second_repository(store: Store) {
        let writer = FileInstanceRepository::open(&store.root).expect("opens");
        writer.save(&descriptor("b", 9001)).await.expect("saves");
        writer.save(&descriptor("a", 9000)).await.expect("saves");

        let reader = FileInstanceRepository::open(&store.root).expect("reopens");
        let keys: Vec<String> = reader
            .list_all()
            .await
            .expect("lists")
            .iter()
            .map(|instance| instance.instance_key().to_string())
            .collect();

        assert_eq!(keys, ["a", "b"]);
        assert!(store.root.join("a.json").exists());
    }

    #[rstest]
    #[tokio::test]
    async fn save_replaces_metrics(store: Store) {
        let repository = FileInstanceRepository::open(&store.root).expect("opens");
        let key = InstanceKey::new("a").expect("valid key");
        repository.save(&descriptor("a", 9000)).await.expect("saves");

        let metrics = InstanceMetrics {
            messages_sent: 2,
            messages_received: 3,
            errors: 0,
            latency_ms: 12,
        };
        repository
            .save(&descriptor("a", 9000).with_metrics(metrics))
            .await
            .expect("saves");

        let found = repository.find(&key).await.expect("finds").expect("exists");
        assert_eq!(found.metrics(), &metrics);
        assert_eq!(found.session_id(), Some("s-1"));
    }

    #[rstest]
    #[tokio::test]
    async fn remove_deletes_descriptor_file(store: Store) {
        let repository = FileInstanceRepository::open(&store.root).expect("opens");
        let key = InstanceKey::new("a").expect("valid key");
        repository.save(&descriptor("a", 9000)).await.expect("saves");

        assert!(repository.remove(&key).await.expect("removes"));
        assert!(!store.root.join("a.json").exists());
        assert!(repository.find(&key).await.expect("finds").is_none());
    }

    #[rstest]
    #[tokio::test]
    async fn claim_is_refused_while_a_descriptor_exists(store: Store) {
        let first = FileInstanceRepository::open(&store.root).expect("opens");
        let second = FileInstanceRepository::open(&store.root).expect("opens");
        let key = InstanceKey::new("a").expect("valid key");

        assert!(first.claim(&descriptor("a", 9000)).await.expect("claims"));
        assert!(!second.claim(&descriptor("a", 9001)).await.expect("claims"));
        let held = second.find(&key).await.expect("finds").expect("exists");
        assert_eq!(held.port(), 9000);

        first.remove(&key).await.expect("removes");
        assert!(second.claim(&descriptor("a", 9001)).await.expect("claims"));
    }
}
