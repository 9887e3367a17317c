//! Wiring of file-backed services from settings.

use super::CliError;
use crate::adapter::{AdapterContext, AdapterFactory};
use crate::config::Settings;
use crate::envelope::SharedClock;
use crate::instance::adapters::{DescriptorClaims, FileInstanceRepository};
use crate::instance::services::{InstanceOrchestrator, OrchestratorConfig};
use crate::process::{ProcessSupervisor, SupervisorSettings};
use crate::tool_definition::adapters::FileDefinitionRepository;
use crate::tool_definition::ports::InstanceClaims;
use crate::tool_definition::services::{PortPolicy, ToolDefinitionStore};
use camino::{Utf8Path, Utf8PathBuf};
use mockable::DefaultClock;
use std::sync::Arc;

pub(super) type Store = ToolDefinitionStore<FileDefinitionRepository, DefaultClock>;
pub(super) type Orchestrator =
    InstanceOrchestrator<FileDefinitionRepository, FileInstanceRepository, DefaultClock>;

/// Services for one command invocation.
pub(super) struct App {
    settings: Settings,
    state_dir: Utf8PathBuf,
    orchestrator: Orchestrator,
}

impl App {
    /// Opens the state directory and wires every service.
    ///
    /// `host_pid` is recorded in descriptors of instances this process
    /// launches, so other invocations can stop the host.
    pub(super) fn open(settings: Settings, host_pid: Option<u32>) -> Result<Self, CliError> {
        let state_dir = settings.resolved_state_dir()?;
        let definitions = Arc::new(FileDefinitionRepository::open(&state_dir.join("definitions"))?);
        let instances = Arc::new(FileInstanceRepository::open(&state_dir.join("instances"))?);
        let clock = Arc::new(DefaultClock);

        let claims: Arc<dyn InstanceClaims> =
            Arc::new(DescriptorClaims::new(Arc::clone(&instances)));
        let store = Arc::new(ToolDefinitionStore::new(
            definitions,
            claims,
            Arc::clone(&clock),
            PortPolicy {
                bind_address: settings.ports.bind_address,
                scan_limit: settings.ports.scan_limit,
            },
        ));

        let adapter_clock: SharedClock = clock.clone();
        let adapters = Arc::new(AdapterFactory::new(AdapterContext {
            clock: adapter_clock,
            assistant: settings.assistant.clone(),
        }));
        let supervisor = ProcessSupervisor::new(SupervisorSettings::from(&settings.process));
        let base_config = OrchestratorConfig::from_settings(&settings);
        let config = match host_pid {
            Some(pid) => base_config.with_host_pid(pid),
            None => base_config,
        };

        let orchestrator =
            InstanceOrchestrator::new(store, instances, adapters, supervisor, clock, config);
        tracing::debug!(state_dir = %state_dir, "services ready");
        Ok(Self {
            settings,
            state_dir,
            orchestrator,
        })
    }

    pub(super) const fn settings(&self) -> &Settings {
        &self.settings
    }

    pub(super) fn store(&self) -> &Store {
        self.orchestrator.definitions()
    }

    pub(super) const fn orchestrator(&self) -> &Orchestrator {
        &self.orchestrator
    }

    /// Log file of a detached host.
    pub(super) fn log_path(&self, instance_key: &str) -> Utf8PathBuf {
        log_path(&self.state_dir, instance_key)
    }
}

pub(super) fn log_path(state_dir: &Utf8Path, instance_key: &str) -> Utf8PathBuf {
    state_dir.join("logs").join(format!("{instance_key}.log"))
}
