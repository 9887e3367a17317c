//! Liveness view over persisted descriptors.

use crate::instance::ports::InstanceRepository;
use crate::process::pid_is_alive;
use crate::tool_definition::domain::ToolName;
use crate::tool_definition::ports::{InstanceClaims, InstanceClaimsError, InstanceClaimsResult};
use async_trait::async_trait;
use std::collections::BTreeSet;
use std::sync::Arc;

/// Answers the definition store's claim queries from the instance
/// repository, counting only descriptors whose pid is alive.
pub struct DescriptorClaims<R: InstanceRepository> {
    instances: Arc<R>,
}

impl<R: InstanceRepository> DescriptorClaims<R> {
    /// Creates a claims view over `instances`.
    #[must_use]
    pub const fn new(instances: Arc<R>) -> Self {
        Self { instances }
    }
}

#[async_trait]
impl<R: InstanceRepository> InstanceClaims for DescriptorClaims<R> {
    async fn claimed_ports(&self) -> InstanceClaimsResult<BTreeSet<u16>> {
        let instances = self.instances.list_all().await.map_err(InstanceClaimsError::new)?;
        Ok(instances
            .iter()
            .filter(|instance| instance.is_running() && pid_is_alive(instance.pid()))
            .map(|instance| instance.port())
            .collect())
    }

    async fn instances_of(&self, tool: &ToolName) -> InstanceClaimsResult<Vec<String>> {
        let instances = self.instances.list_all().await.map_err(InstanceClaimsError::new)?;
        Ok(instances
            .iter()
            .filter(|instance| instance.tool_name() == tool)
            .filter(|instance| instance.is_running() && pid_is_alive(instance.pid()))
            .map(|instance| instance.instance_key().to_string())
            .collect())
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::DescriptorClaims;
    use crate::instance::adapters::InMemoryInstanceRepository;
    use crate::instance::domain::{InstanceKey, RunningInstance};
    use crate::instance::ports::InstanceRepository;
    use crate::tool_definition::domain::ToolName;
    use crate::tool_definition::ports::InstanceClaims;
    use chrono::Utc;
    use rstest::rstest;
    use std::sync::Arc;

    fn descriptor(key: &str, pid: u32, port: u16) -> RunningInstance {
        RunningInstance::new(
            InstanceKey::new(key).expect("valid key"),
            ToolName::new("cat").expect("valid name"),
            pid,
            port,
            None,
            Utc::now(),
        )
    }

    #[rstest]
    #[tokio::test]
    async fn dead_descriptors_claim_nothing() {
        let repository = Arc::new(InMemoryInstanceRepository::new());
        repository
            .save(&descriptor("live", std::process::id(), 9100))
            .await
            .expect("saves");
        // Pids above the kernel's pid_max never exist.
        repository
            .save(&descriptor("dead", 99_999_999, 9101))
            .await
            .expect("saves");
        let claims = DescriptorClaims::new(Arc::clone(&repository));
        let tool = ToolName::new("cat").expect("valid name");

        let ports = claims.claimed_ports().await.expect("queries");
        let keys = claims.instances_of(&tool).await.expect("queries");

        assert_eq!(ports.into_iter().collect::<Vec<_>>(), [9100]);
        assert_eq!(keys, ["live"]);
    }
}
