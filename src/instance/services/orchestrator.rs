//! Launch, terminate and query named tool instances.

use super::live::{LiveInstance, StdinForwarder, pump_output};
use super::{LaunchOutcome, LaunchRequest, OrchestratorError, OrchestratorResult, TerminateOutcome};
use crate::adapter::{AdapterFactory, ToolAdapter};
use crate::bridge::{BridgeConfig, SocketBridge};
use crate::config::Settings;
use crate::envelope::SharedClock;
use crate::instance::domain::{InstanceKey, MetricsRecorder, RunningInstance};
use crate::instance::ports::InstanceRepository;
use crate::process::{
    InstanceIdentity, ProcessError, ProcessExit, ProcessHandle, ProcessSupervisor, SpawnSpec,
    pid_is_alive, prepare_environment, stop_pid,
};
use crate::tool_definition::domain::ToolDefinition;
use crate::tool_definition::ports::DefinitionRepository;
use crate::tool_definition::services::ToolDefinitionStore;
use camino::Utf8PathBuf;
use mockable::Clock;
use std::collections::{BTreeSet, HashMap};
use std::net::{IpAddr, SocketAddr, TcpListener};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, mpsc};

/// Longest wait for an output pump to drain after its process stopped.
const PUMP_JOIN_TIMEOUT: Duration = Duration::from_secs(2);

/// Launch and termination policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrchestratorConfig {
    /// First port scanned for `auto` definitions.
    pub port_base: u16,
    /// Bind attempts for `auto` ports before the launch fails.
    pub bind_attempts: u8,
    /// Time between SIGTERM and SIGKILL.
    pub termination_grace: Duration,
    /// Time allowed for an adapter's shutdown action.
    pub adapter_shutdown_grace: Duration,
    /// Time allowed for a process to disappear after SIGKILL.
    pub kill_timeout: Duration,
    /// Settings for each instance's bridge.
    pub bridge: BridgeConfig,
    /// Pid recorded as the host of launched instances. Set by detached
    /// hosts so other invocations can stop them.
    pub host_pid: Option<u32>,
}

impl OrchestratorConfig {
    /// Extracts orchestrator settings from the application settings.
    #[must_use]
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            port_base: settings.ports.base,
            bind_attempts: settings.ports.bind_attempts.max(1),
            termination_grace: settings.process.termination_grace(),
            adapter_shutdown_grace: settings.process.adapter_shutdown_grace(),
            kill_timeout: settings.process.kill_timeout(),
            bridge: BridgeConfig::from_settings(settings),
            host_pid: None,
        }
    }

    /// Records `pid` as the host of every launched instance.
    #[must_use]
    pub const fn with_host_pid(mut self, pid: u32) -> Self {
        self.host_pid = Some(pid);
        self
    }
}

/// Binds definitions, adapters, processes and bridges into named running
/// instances.
///
/// Instances launched by this orchestrator are held in an owned map;
/// descriptors persisted through the repository let other orchestrators,
/// possibly in other processes, query and terminate them. Launches and
/// terminations are serialised.
pub struct InstanceOrchestrator<D, R, C>
where
    D: DefinitionRepository,
    R: InstanceRepository,
    C: Clock + Send + Sync + 'static,
{
    definitions: Arc<ToolDefinitionStore<D, C>>,
    instances: Arc<R>,
    adapters: Arc<AdapterFactory>,
    supervisor: ProcessSupervisor,
    clock: Arc<C>,
    config: OrchestratorConfig,
    live: Mutex<HashMap<InstanceKey, LiveInstance>>,
    lifecycle: Mutex<()>,
}

impl<D, R, C> InstanceOrchestrator<D, R, C>
where
    D: DefinitionRepository,
    R: InstanceRepository,
    C: Clock + Send + Sync + 'static,
{
    /// Creates an orchestrator from its collaborators.
    #[must_use]
    pub fn new(
        definitions: Arc<ToolDefinitionStore<D, C>>,
        instances: Arc<R>,
        adapters: Arc<AdapterFactory>,
        supervisor: ProcessSupervisor,
        clock: Arc<C>,
        config: OrchestratorConfig,
    ) -> Self {
        Self {
            definitions,
            instances,
            adapters,
            supervisor,
            clock,
            config,
            live: Mutex::new(HashMap::new()),
            lifecycle: Mutex::new(()),
        }
    }

    /// Returns the definition catalog.
    #[must_use]
    pub const fn definitions(&self) -> &Arc<ToolDefinitionStore<D, C>> {
        &self.definitions
    }

    /// Launches an instance, or reports the one already running under the
    /// same key.
    ///
    /// The key is claimed with a `starting` descriptor before anything is
    /// started, so concurrent launches from other processes cannot both
    /// proceed. Any failure after the claim stops everything started so far
    /// and releases the key; no descriptor survives a failed launch.
    ///
    /// # Errors
    ///
    /// Returns [`OrchestratorError::UnknownTool`],
    /// [`OrchestratorError::LaunchInProgress`],
    /// [`OrchestratorError::LaunchFailed`] or persistence errors.
    pub async fn launch(&self, request: LaunchRequest) -> OrchestratorResult<LaunchOutcome> {
        let _guard = self.lifecycle.lock().await;
        let key = request.instance_key();

        if let Some(existing) = self.status(&key).await? {
            if existing.is_running() {
                tracing::info!(instance = %key, pid = existing.pid(), "instance already running");
                return Ok(LaunchOutcome::AlreadyRunning(existing));
            }
            if existing.is_starting() {
                return Err(OrchestratorError::LaunchInProgress(key));
            }
        }

        let definition = self
            .definitions
            .get(request.tool())
            .await?
            .ok_or_else(|| OrchestratorError::UnknownTool(request.tool().clone()))?;
        let adapter = self
            .adapters
            .create(&definition)
            .map_err(|err| OrchestratorError::launch_failed(&key, err))?;
        let executable = adapter.resolve_executable().ok_or_else(|| {
            OrchestratorError::launch_failed(
                &key,
                format!(
                    "executable '{}' was not found or is not executable",
                    definition.executable_path()
                ),
            )
        })?;

        if let Some(existing) = self.claim(&key, &definition, &request).await? {
            return Ok(LaunchOutcome::AlreadyRunning(existing));
        }

        let bridge = Arc::new(SocketBridge::new(
            key.as_str(),
            self.config.bridge,
            self.shared_clock(),
        ));
        let port = match self.bind_bridge(&bridge, &definition, &key).await {
            Ok(port) => port,
            Err(err) => {
                self.release_claim(&key).await;
                return Err(err);
            }
        };

        let live = match self
            .start_process(&key, &request, adapter, executable, Arc::clone(&bridge), port)
            .await
        {
            Ok(live) => live,
            Err(err) => {
                bridge.stop().await;
                self.release_claim(&key).await;
                tracing::warn!(instance = %key, error = %err, "launch rolled back");
                return Err(err);
            }
        };

        let descriptor = live.snapshot();
        tracing::info!(
            instance = %key,
            tool = %descriptor.tool_name(),
            pid = descriptor.pid(),
            port = descriptor.port(),
            "instance launched"
        );
        self.live.lock().await.insert(key, live);
        Ok(LaunchOutcome::Launched(descriptor))
    }

    /// Stops an instance and removes its descriptor.
    ///
    /// Instances hosted by another process are stopped by signal; the call
    /// then waits (bounded) for their port to become bindable.
    ///
    /// # Errors
    ///
    /// Returns [`OrchestratorError::LaunchInProgress`] while another launch
    /// holds the key, or process control and persistence errors.
    pub async fn terminate(&self, key: &InstanceKey) -> OrchestratorResult<TerminateOutcome> {
        let _guard = self.lifecycle.lock().await;

        let owned = self.live.lock().await.remove(key);
        if let Some(live) = owned {
            let descriptor = live.snapshot();
            let was_alive = descriptor.is_running();
            let exit = self.shutdown(live).await?;
            self.instances.remove(key).await?;
            if !was_alive {
                tracing::info!(instance = %key, %exit, "instance had already exited");
                return Ok(TerminateOutcome::NotRunning);
            }
            tracing::info!(instance = %key, %exit, "instance terminated");
            return Ok(TerminateOutcome::Terminated(descriptor.stopped()));
        }

        let Some(record) = self.instances.find(key).await? else {
            return Ok(TerminateOutcome::NotRunning);
        };
        if !pid_is_alive(record.pid()) {
            self.instances.remove(key).await?;
            tracing::info!(instance = %key, pid = record.pid(), "purged stale descriptor");
            return Ok(TerminateOutcome::NotRunning);
        }
        if record.is_starting() {
            return Err(OrchestratorError::LaunchInProgress(key.clone()));
        }

        self.stop_remote(&record).await?;
        self.instances.remove(key).await?;
        tracing::info!(instance = %key, pid = record.pid(), "hosted instance terminated");
        Ok(TerminateOutcome::Terminated(record.stopped()))
    }

    /// Returns the descriptor for `key`.
    ///
    /// A descriptor whose process has exited is returned once, marked
    /// stopped, and purged. A launch claim is reported while its launcher
    /// lives.
    ///
    /// # Errors
    ///
    /// Returns persistence errors.
    pub async fn status(&self, key: &InstanceKey) -> OrchestratorResult<Option<RunningInstance>> {
        let snapshot = self.live.lock().await.get(key).map(LiveInstance::snapshot);
        if let Some(descriptor) = snapshot {
            if !descriptor.is_running() {
                self.purge(key).await?;
                tracing::info!(instance = %key, pid = descriptor.pid(), "instance process has exited");
            }
            return Ok(Some(descriptor));
        }

        let Some(record) = self.instances.find(key).await? else {
            return Ok(None);
        };
        if (record.is_running() || record.is_starting()) && pid_is_alive(record.pid()) {
            return Ok(Some(record));
        }
        self.purge(key).await?;
        tracing::info!(instance = %key, pid = record.pid(), "instance process has exited; descriptor purged");
        Ok(Some(record.stopped()))
    }

    /// Returns every running instance ordered by key, purging stale
    /// descriptors on the way.
    ///
    /// # Errors
    ///
    /// Returns persistence errors.
    pub async fn list_running(&self) -> OrchestratorResult<Vec<RunningInstance>> {
        let mut keys: BTreeSet<InstanceKey> = self.live.lock().await.keys().cloned().collect();
        keys.extend(
            self.instances
                .list_all()
                .await?
                .into_iter()
                .map(|record| record.instance_key().clone()),
        );

        let mut running = Vec::new();
        for key in keys {
            if let Some(descriptor) = self.status(&key).await?
                && descriptor.is_running()
            {
                running.push(descriptor);
            }
        }
        Ok(running)
    }

    /// Waits for the process of an instance launched by this orchestrator
    /// to exit. Returns `None` for keys this orchestrator does not hold.
    pub async fn wait_for_exit(&self, key: &InstanceKey) -> Option<ProcessExit> {
        let process = self
            .live
            .lock()
            .await
            .get(key)
            .map(|live| Arc::clone(&live.process))?;
        Some(process.exited().await)
    }

    /// Tears down the in-process binding for `key` without touching its
    /// descriptor, which is purged lazily once the pid is dead.
    ///
    /// Returns whether a binding existed.
    pub async fn release(&self, key: &InstanceKey) -> bool {
        let owned = self.live.lock().await.remove(key);
        let Some(live) = owned else {
            return false;
        };
        if let Err(err) = self.shutdown(live).await {
            tracing::warn!(instance = %key, error = %err, "failed to stop released instance");
        }
        true
    }

    /// Persists current metrics for every live instance held here.
    ///
    /// Returns the number of descriptors written.
    ///
    /// # Errors
    ///
    /// Returns persistence errors.
    pub async fn flush_metrics(&self) -> OrchestratorResult<usize> {
        let snapshots: Vec<RunningInstance> = self
            .live
            .lock()
            .await
            .values()
            .map(LiveInstance::snapshot)
            .filter(RunningInstance::is_running)
            .collect();
        for snapshot in &snapshots {
            self.instances.save(snapshot).await?;
        }
        Ok(snapshots.len())
    }

    /// Terminates every instance held by this orchestrator.
    ///
    /// Returns the number of instances stopped.
    ///
    /// # Errors
    ///
    /// Returns the first termination failure.
    pub async fn shutdown_all(&self) -> OrchestratorResult<usize> {
        let keys: Vec<InstanceKey> = self.live.lock().await.keys().cloned().collect();
        let mut stopped = 0_usize;
        for key in keys {
            if matches!(self.terminate(&key).await?, TerminateOutcome::Terminated(_)) {
                stopped = stopped.saturating_add(1);
            }
        }
        Ok(stopped)
    }

    /// Reserves `key` for this launch.
    ///
    /// Returns `None` once the key is held here, or the instance another
    /// launch has already started under it.
    async fn claim(
        &self,
        key: &InstanceKey,
        definition: &ToolDefinition,
        request: &LaunchRequest,
    ) -> OrchestratorResult<Option<RunningInstance>> {
        let placeholder = RunningInstance::starting(
            key.clone(),
            definition.name().clone(),
            std::process::id(),
            request.session().map(str::to_owned),
            self.clock.utc(),
        );
        if self.instances.claim(&placeholder).await? {
            return Ok(None);
        }
        tracing::info!(instance = %key, "another launch holds the instance key");
        match self.instances.find(key).await? {
            Some(holder) if holder.is_running() => Ok(Some(holder)),
            _ => Err(OrchestratorError::LaunchInProgress(key.clone())),
        }
    }

    async fn release_claim(&self, key: &InstanceKey) {
        if let Err(err) = self.instances.remove(key).await {
            tracing::warn!(instance = %key, error = %err, "failed to release launch claim");
        }
    }

    async fn bind_bridge(
        &self,
        bridge: &SocketBridge,
        definition: &ToolDefinition,
        key: &InstanceKey,
    ) -> OrchestratorResult<u16> {
        if let Some(fixed) = definition.port().fixed() {
            return bridge
                .start(fixed)
                .await
                .map_err(|err| OrchestratorError::launch_failed(key, err));
        }

        let mut start = self.config.port_base;
        let mut last_failure = None;
        for _ in 0..self.config.bind_attempts.max(1) {
            let candidate = self.definitions.allocate_port(start).await?;
            match bridge.start(candidate).await {
                Ok(bound) => return Ok(bound),
                Err(err) => {
                    tracing::debug!(instance = %key, port = candidate, error = %err, "port taken; trying next");
                    last_failure = Some(err);
                    start = candidate.saturating_add(1);
                }
            }
        }
        let reason = last_failure.map_or_else(
            || "no port could be bound".to_owned(),
            |err| err.to_string(),
        );
        Err(OrchestratorError::launch_failed(key, reason))
    }

    async fn start_process(
        &self,
        key: &InstanceKey,
        request: &LaunchRequest,
        adapter: Arc<dyn ToolAdapter>,
        executable: Utf8PathBuf,
        bridge: Arc<SocketBridge>,
        port: u16,
    ) -> OrchestratorResult<LiveInstance> {
        let definition = adapter.definition();
        let identity = InstanceIdentity {
            tool_name: definition.name().as_str(),
            instance_key: key.as_str(),
            port,
            session_id: request.session(),
        };
        let spec = SpawnSpec {
            executable,
            args: adapter.build_launch_args(request.session()),
            environment: prepare_environment(
                std::env::vars_os(),
                &identity,
                definition.environment(),
            ),
        };

        let (events_tx, events_rx) = mpsc::channel(self.supervisor.settings().queue_capacity);
        let process = Arc::new(
            self.supervisor
                .spawn(&spec, &adapter, &events_tx)
                .map_err(|err| OrchestratorError::launch_failed(key, err))?,
        );
        drop(events_tx);

        if let Err(err) = self
            .supervisor
            .await_ready(&process, &adapter.health_check_command(), &spec.environment)
            .await
        {
            self.stop_process(&process, adapter.as_ref()).await;
            return Err(OrchestratorError::launch_failed(key, err));
        }

        let metrics = Arc::new(MetricsRecorder::default());
        bridge.set_handler(Arc::new(StdinForwarder::new(
            Arc::clone(&adapter),
            Arc::clone(&process),
            Arc::clone(&metrics),
        )));
        let pump = tokio::spawn(pump_output(
            events_rx,
            Arc::clone(&bridge),
            Arc::clone(&adapter),
            Arc::clone(&metrics),
            self.shared_clock(),
        ));

        let base = RunningInstance::new(
            key.clone(),
            definition.name().clone(),
            process.pid(),
            port,
            request.session().map(str::to_owned),
            self.clock.utc(),
        );
        let descriptor = match self.config.host_pid {
            Some(host) => base.with_host_pid(host),
            None => base,
        };
        let live = LiveInstance {
            descriptor,
            adapter,
            process,
            bridge,
            metrics,
            pump,
        };

        if let Err(err) = self.instances.save(&live.descriptor).await {
            if let Err(stop_err) = self.shutdown(live).await {
                tracing::warn!(instance = %key, error = %stop_err, "failed to stop instance during rollback");
            }
            return Err(err.into());
        }
        Ok(live)
    }

    async fn stop_process(&self, process: &ProcessHandle, adapter: &dyn ToolAdapter) {
        if let Err(err) = self
            .supervisor
            .terminate(process, &adapter.shutdown_action(), self.config.termination_grace)
            .await
        {
            tracing::warn!(pid = process.pid(), error = %err, "failed to stop tool process");
        }
    }

    async fn shutdown(&self, live: LiveInstance) -> Result<ProcessExit, ProcessError> {
        let LiveInstance {
            adapter,
            process,
            bridge,
            mut pump,
            ..
        } = live;

        let exit = self
            .supervisor
            .terminate(&process, &adapter.shutdown_action(), self.config.termination_grace)
            .await;
        bridge.stop().await;
        match tokio::time::timeout(PUMP_JOIN_TIMEOUT, &mut pump).await {
            Ok(Ok(())) => {}
            Ok(Err(err)) => tracing::warn!(error = %err, "output pump failed"),
            Err(_) => {
                tracing::debug!(instance = %bridge.instance_key(), "aborting output pump");
                pump.abort();
            }
        }
        exit
    }

    async fn purge(&self, key: &InstanceKey) -> OrchestratorResult<()> {
        self.release(key).await;
        self.instances.remove(key).await?;
        Ok(())
    }

    async fn stop_remote(&self, record: &RunningInstance) -> OrchestratorResult<()> {
        let poll = self.config.bridge.poll_interval;
        if let Some(host) = record.host_pid()
            && host != std::process::id()
        {
            let host_grace = self
                .config
                .termination_grace
                .saturating_add(self.config.adapter_shutdown_grace)
                .saturating_add(self.config.kill_timeout);
            stop_pid(host, host_grace, self.config.kill_timeout, poll).await?;
        }
        stop_pid(
            record.pid(),
            self.config.termination_grace,
            self.config.kill_timeout,
            poll,
        )
        .await?;

        if !wait_for_port_release(
            self.config.bridge.bind_address,
            record.port(),
            self.config.termination_grace,
            poll,
        )
        .await
        {
            tracing::warn!(port = record.port(), "port still bound after termination");
        }
        Ok(())
    }

    fn shared_clock(&self) -> SharedClock {
        self.clock.clone()
    }
}

async fn wait_for_port_release(address: IpAddr, port: u16, limit: Duration, poll: Duration) -> bool {
    let deadline = tokio::time::Instant::now() + limit;
    loop {
        if TcpListener::bind(SocketAddr::new(address, port)).is_ok() {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(poll).await;
    }
}
