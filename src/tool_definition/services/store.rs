//! Catalog service combining built-in and user-defined tool definitions.

use crate::process::executable::locate_executable;
use crate::tool_definition::{
    domain::{
        DefinedBy, ToolDefinition, ToolDefinitionDomainError, ToolName, builtin_definitions,
        is_builtin_name,
    },
    ports::{DefinitionRepository, DefinitionRepositoryError, InstanceClaims, InstanceClaimsError},
};
use mockable::Clock;
use std::collections::BTreeSet;
use std::net::{IpAddr, SocketAddr, TcpListener};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex;

/// Service-level errors for catalog operations.
#[derive(Debug, Error)]
pub enum ToolDefinitionStoreError {
    /// Domain validation failed.
    #[error(transparent)]
    Domain(#[from] ToolDefinitionDomainError),
    /// Repository operation failed.
    #[error(transparent)]
    Repository(#[from] DefinitionRepositoryError),
    /// Instance liveness query failed.
    #[error(transparent)]
    Claims(#[from] InstanceClaimsError),
    /// A built-in or user definition already uses the name.
    #[error("tool '{0}' is already defined")]
    AlreadyExists(ToolName),
    /// The executable could not be resolved to an executable file.
    #[error("executable '{executable}' for tool '{name}' was not found or is not executable")]
    ExecutableNotFound {
        /// Tool being registered.
        name: ToolName,
        /// Configured executable.
        executable: String,
    },
    /// No definition has the name.
    #[error("tool '{0}' is not defined")]
    NotFound(ToolName),
    /// Built-in definitions cannot be removed.
    #[error("tool '{0}' is built in and cannot be undefined")]
    BuiltinImmutable(ToolName),
    /// Live instances still reference the definition.
    #[error("tool '{name}' has running instances: {}", .instances.join(", "))]
    InUse {
        /// Tool being removed.
        name: ToolName,
        /// Keys of the live instances.
        instances: Vec<String>,
    },
    /// Every port in the scan window is claimed or unbindable.
    #[error("no free port in {start}..{end}")]
    PortsExhausted {
        /// First port scanned.
        start: u16,
        /// One past the last port scanned.
        end: u32,
    },
}

/// Result type for catalog operations.
pub type ToolDefinitionStoreResult<T> = Result<T, ToolDefinitionStoreError>;

/// Where and how far `allocate_port` scans.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PortPolicy {
    /// Address used for trial binds.
    pub bind_address: IpAddr,
    /// Number of ports scanned from the start port.
    pub scan_limit: u16,
}

/// Catalog of tool definitions.
///
/// Built-ins are compiled in and shadow any user entry with the same name.
/// Mutations are serialised under an internal lock.
pub struct ToolDefinitionStore<R, C>
where
    R: DefinitionRepository,
    C: Clock + Send + Sync,
{
    repository: Arc<R>,
    claims: Arc<dyn InstanceClaims>,
    clock: Arc<C>,
    ports: PortPolicy,
    mutation: Mutex<()>,
}

impl<R, C> ToolDefinitionStore<R, C>
where
    R: DefinitionRepository,
    C: Clock + Send + Sync,
{
    /// Creates a catalog over `repository`.
    #[must_use]
    pub fn new(
        repository: Arc<R>,
        claims: Arc<dyn InstanceClaims>,
        clock: Arc<C>,
        ports: PortPolicy,
    ) -> Self {
        Self {
            repository,
            claims,
            clock,
            ports,
            mutation: Mutex::new(()),
        }
    }

    /// Registers a user definition.
    ///
    /// # Errors
    ///
    /// Returns [`ToolDefinitionStoreError::AlreadyExists`] for a taken name,
    /// [`ToolDefinitionStoreError::ExecutableNotFound`] when the executable
    /// cannot be resolved, or repository errors.
    pub async fn register(
        &self,
        definition: ToolDefinition,
    ) -> ToolDefinitionStoreResult<ToolDefinition> {
        let _guard = self.mutation.lock().await;
        let name = definition.name().clone();

        if is_builtin_name(&name) || self.repository.find(&name).await?.is_some() {
            return Err(ToolDefinitionStoreError::AlreadyExists(name));
        }
        if locate_executable(definition.executable_path(), &[]).is_none() {
            return Err(ToolDefinitionStoreError::ExecutableNotFound {
                executable: definition.executable_path().to_owned(),
                name,
            });
        }

        let created_at = definition.created_at().unwrap_or_else(|| self.clock.utc());
        let stored = definition
            .with_defined_by(DefinedBy::User)
            .with_created_at(created_at);
        self.repository.save(&stored).await?;
        tracing::info!(tool = %stored.name(), kind = %stored.adapter_kind(), "tool defined");
        Ok(stored)
    }

    /// Looks up a definition by name, built-ins first.
    ///
    /// # Errors
    ///
    /// Returns repository errors.
    pub async fn get(&self, name: &ToolName) -> ToolDefinitionStoreResult<Option<ToolDefinition>> {
        if let Some(builtin) = builtin_definitions()
            .into_iter()
            .find(|definition| definition.name() == name)
        {
            return Ok(Some(builtin));
        }
        Ok(self
            .repository
            .find(name)
            .await?
            .map(|found| found.with_defined_by(DefinedBy::User)))
    }

    /// Returns built-ins followed by user definitions ordered by name.
    ///
    /// # Errors
    ///
    /// Returns repository errors.
    pub async fn list(&self) -> ToolDefinitionStoreResult<Vec<ToolDefinition>> {
        let mut definitions = builtin_definitions();
        for user in self.list_user().await? {
            definitions.push(user);
        }
        Ok(definitions)
    }

    /// Returns user definitions only, ordered by name.
    ///
    /// # Errors
    ///
    /// Returns repository errors.
    pub async fn list_user(&self) -> ToolDefinitionStoreResult<Vec<ToolDefinition>> {
        let mut definitions = Vec::new();
        for stored in self.repository.list_all().await? {
            if is_builtin_name(stored.name()) {
                tracing::warn!(tool = %stored.name(), "ignoring user definition that collides with a built-in");
                continue;
            }
            definitions.push(stored.with_defined_by(DefinedBy::User));
        }
        definitions.sort_by(|left, right| left.name().cmp(right.name()));
        Ok(definitions)
    }

    /// Removes a user definition.
    ///
    /// # Errors
    ///
    /// Returns [`ToolDefinitionStoreError::BuiltinImmutable`],
    /// [`ToolDefinitionStoreError::NotFound`] or
    /// [`ToolDefinitionStoreError::InUse`] when removal is not allowed.
    pub async fn unregister(&self, name: &ToolName) -> ToolDefinitionStoreResult<ToolDefinition> {
        let _guard = self.mutation.lock().await;

        if is_builtin_name(name) {
            return Err(ToolDefinitionStoreError::BuiltinImmutable(name.clone()));
        }
        let existing = self
            .repository
            .find(name)
            .await?
            .ok_or_else(|| ToolDefinitionStoreError::NotFound(name.clone()))?;

        let instances = self.claims.instances_of(name).await?;
        if !instances.is_empty() {
            return Err(ToolDefinitionStoreError::InUse {
                name: name.clone(),
                instances,
            });
        }

        self.repository.remove(name).await?;
        tracing::info!(tool = %name, "tool undefined");
        Ok(existing)
    }

    /// Finds a free port at or above `start`.
    ///
    /// Ports reserved by fixed-port definitions or bound by live instances
    /// are skipped; the first remaining port that accepts a trial bind is
    /// returned. The result is only a hint: the caller must still bind it.
    ///
    /// # Errors
    ///
    /// Returns [`ToolDefinitionStoreError::PortsExhausted`] when the scan
    /// window has no usable port.
    pub async fn allocate_port(&self, start: u16) -> ToolDefinitionStoreResult<u16> {
        let mut claimed: BTreeSet<u16> = self
            .list()
            .await?
            .iter()
            .filter_map(|definition| definition.port().fixed())
            .collect();
        claimed.extend(self.claims.claimed_ports().await?);

        let end = u32::from(start) + u32::from(self.ports.scan_limit);
        let candidates = (u32::from(start)..end).filter_map(|port| u16::try_from(port).ok());
        for port in candidates {
            if port == 0 || claimed.contains(&port) {
                continue;
            }
            if try_bind(self.ports.bind_address, port) {
                tracing::debug!(port, "allocated port");
                return Ok(port);
            }
        }
        Err(ToolDefinitionStoreError::PortsExhausted { start, end })
    }
}

fn try_bind(address: IpAddr, port: u16) -> bool {
    TcpListener::bind(SocketAddr::new(address, port)).is_ok()
}
