//! Shared wiring for instance lifecycle tests.

use camino::{Utf8Path, Utf8PathBuf};
use eyre::eyre;
use mockable::DefaultClock;
use rstest::fixture;
use std::net::{IpAddr, Ipv4Addr, TcpListener};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use toolbridge::adapter::{AdapterContext, AdapterFactory};
use toolbridge::bridge::BridgeConfig;
use toolbridge::config::AssistantSettings;
use toolbridge::envelope::SharedClock;
use toolbridge::instance::adapters::{DescriptorClaims, FileInstanceRepository};
use toolbridge::instance::domain::RunningInstance;
use toolbridge::instance::services::{InstanceOrchestrator, OrchestratorConfig};
use toolbridge::process::{ProcessSupervisor, SupervisorSettings};
use toolbridge::tool_definition::adapters::FileDefinitionRepository;
use toolbridge::tool_definition::domain::{AdapterKind, ToolDefinition, ToolName};
use toolbridge::tool_definition::ports::InstanceClaims;
use toolbridge::tool_definition::services::{PortPolicy, ToolDefinitionStore};

/// Orchestrator over file-backed repositories.
pub type TestOrchestrator =
    InstanceOrchestrator<FileDefinitionRepository, FileInstanceRepository, DefaultClock>;

/// Loopback address every test bridge binds to.
pub const LOOPBACK: IpAddr = IpAddr::V4(Ipv4Addr::LOCALHOST);

/// Temporary state directory removed when dropped.
pub struct StateDir {
    _dir: TempDir,
    path: Utf8PathBuf,
}

impl StateDir {
    /// Returns the directory path.
    pub fn path(&self) -> &Utf8Path {
        &self.path
    }
}

/// Provides an empty state directory.
#[fixture]
pub fn state_dir() -> StateDir {
    let dir = TempDir::new().expect("temporary directory");
    let path = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).expect("utf-8 temp path");
    StateDir { _dir: dir, path }
}

/// Returns a port that was free a moment ago, used as the scan base.
pub fn free_port_base() -> eyre::Result<u16> {
    let listener = TcpListener::bind((LOOPBACK, 0))?;
    Ok(listener.local_addr()?.port())
}

/// Short timings so lifecycle tests stay fast.
pub fn test_config(port_base: u16) -> OrchestratorConfig {
    OrchestratorConfig {
        port_base,
        bind_attempts: 5,
        termination_grace: Duration::from_secs(2),
        adapter_shutdown_grace: Duration::from_millis(300),
        kill_timeout: Duration::from_secs(2),
        bridge: BridgeConfig {
            bind_address: LOOPBACK,
            poll_interval: Duration::from_millis(50),
            queue_capacity: 64,
            linger: Duration::from_secs(3),
        },
        host_pid: None,
    }
}

/// Opens an orchestrator over the repositories under `state_dir`.
///
/// Two orchestrators opened on one directory see each other's descriptors,
/// as separate command invocations do.
pub fn open_orchestrator(state_dir: &Utf8Path, port_base: u16) -> eyre::Result<TestOrchestrator> {
    let definitions = Arc::new(FileDefinitionRepository::open(&state_dir.join("definitions"))?);
    let instances = Arc::new(FileInstanceRepository::open(&state_dir.join("instances"))?);
    let clock = Arc::new(DefaultClock);

    let claims: Arc<dyn InstanceClaims> = Arc::new(DescriptorClaims::new(Arc::clone(&instances)));
    let store = Arc::new(ToolDefinitionStore::new(
        definitions,
        claims,
        Arc::clone(&clock),
        PortPolicy {
            bind_address: LOOPBACK,
            scan_limit: 200,
        },
    ));
    let adapter_clock: SharedClock = clock.clone();
    let adapters = Arc::new(AdapterFactory::new(AdapterContext {
        clock: adapter_clock,
        assistant: AssistantSettings::default(),
    }));
    let supervisor = ProcessSupervisor::new(SupervisorSettings {
        startup_wait: Duration::from_millis(200),
        health_check_timeout: Duration::from_secs(2),
        adapter_shutdown_grace: Duration::from_millis(300),
        kill_timeout: Duration::from_secs(2),
        queue_capacity: 16,
    });

    Ok(InstanceOrchestrator::new(
        store,
        instances,
        adapters,
        supervisor,
        clock,
        test_config(port_base),
    ))
}

/// Registers a text tool running `executable` with `args`.
pub async fn define_text_tool(
    orchestrator: &TestOrchestrator,
    name: &str,
    executable: &str,
    args: &[&str],
) -> eyre::Result<ToolDefinition> {
    let definition = ToolDefinition::new(ToolName::new(name)?, AdapterKind::GenericText, executable)?
        .with_launch_args(args.iter().copied());
    Ok(orchestrator.definitions().register(definition).await?)
}

/// Registers `/bin/cat` as a text tool.
pub async fn define_cat(orchestrator: &TestOrchestrator, name: &str) -> eyre::Result<ToolDefinition> {
    define_text_tool(orchestrator, name, "/bin/cat", &[]).await
}

/// Polls `status` until the instance is reported stopped or gone.
pub async fn wait_until_stopped(
    orchestrator: &TestOrchestrator,
    key: &toolbridge::instance::domain::InstanceKey,
    limit: Duration,
) -> eyre::Result<Option<RunningInstance>> {
    let deadline = tokio::time::Instant::now() + limit;
    loop {
        let status = orchestrator.status(key).await?;
        if status.as_ref().is_none_or(|instance| !instance.is_running()) {
            return Ok(status);
        }
        if tokio::time::Instant::now() >= deadline {
            return Err(eyre!("instance '{key}' still running after {limit:?}"));
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
}
