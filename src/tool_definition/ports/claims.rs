//! Liveness queries the catalog needs from the instance layer.

use crate::tool_definition::domain::ToolName;
use async_trait::async_trait;
use std::collections::BTreeSet;
use std::sync::Arc;
use thiserror::Error;

/// Result type for instance claim queries.
pub type InstanceClaimsResult<T> = Result<T, InstanceClaimsError>;

/// Read-only view of which ports and tools live instances hold.
#[async_trait]
pub trait InstanceClaims: Send + Sync {
    /// Ports bound by instances whose process is alive.
    async fn claimed_ports(&self) -> InstanceClaimsResult<BTreeSet<u16>>;

    /// Instance keys of live instances launched from `tool`.
    async fn instances_of(&self, tool: &ToolName) -> InstanceClaimsResult<Vec<String>>;
}

/// Errors returned while querying instance claims.
#[derive(Debug, Clone, Error)]
#[error("instance claim query failed: {0}")]
pub struct InstanceClaimsError(pub Arc<dyn std::error::Error + Send + Sync>);

impl InstanceClaimsError {
    /// Wraps an underlying failure.
    pub fn new(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self(Arc::new(err))
    }
}
