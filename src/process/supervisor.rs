//! Spawning, readiness checks and termination of tool processes.

use super::handle::ProcessHandle;
use super::signal::{StopSignal, send_signal};
use super::{ProcessError, ProcessEvent, ProcessExit, ProcessResult};
use crate::adapter::{ShutdownAction, ToolAdapter};
use crate::config::ProcessSettings;
use crate::tool_definition::domain::HealthCheck;
use camino::Utf8PathBuf;
use std::collections::BTreeMap;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, Command};
use tokio::sync::{mpsc, watch};

/// Longest time `terminate` waits for each stdio task to finish.
const TASK_JOIN_TIMEOUT: Duration = Duration::from_secs(2);

/// Timing and capacity settings for supervision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SupervisorSettings {
    /// Time a fresh process must survive before it counts as started.
    pub startup_wait: Duration,
    /// Timeout for health-check commands.
    pub health_check_timeout: Duration,
    /// Time allowed for the adapter's shutdown action.
    pub adapter_shutdown_grace: Duration,
    /// Time allowed for the process to disappear after SIGKILL.
    pub kill_timeout: Duration,
    /// Capacity of the stdin queue.
    pub queue_capacity: usize,
}

impl From<&ProcessSettings> for SupervisorSettings {
    fn from(settings: &ProcessSettings) -> Self {
        Self {
            startup_wait: settings.startup_wait(),
            health_check_timeout: settings.health_check_timeout(),
            adapter_shutdown_grace: settings.adapter_shutdown_grace(),
            kill_timeout: settings.kill_timeout(),
            queue_capacity: settings.queue_capacity.max(1),
        }
    }
}

/// What to run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpawnSpec {
    /// Resolved executable.
    pub executable: Utf8PathBuf,
    /// Arguments in order.
    pub args: Vec<String>,
    /// Complete environment; the parent environment is not inherited
    /// beyond what this map contains.
    pub environment: BTreeMap<String, String>,
}

/// Spawns and stops tool processes.
#[derive(Debug, Clone)]
pub struct ProcessSupervisor {
    settings: SupervisorSettings,
}

impl ProcessSupervisor {
    /// Creates a supervisor.
    #[must_use]
    pub const fn new(settings: SupervisorSettings) -> Self {
        Self { settings }
    }

    /// Returns the supervisor's settings.
    #[must_use]
    pub const fn settings(&self) -> &SupervisorSettings {
        &self.settings
    }

    /// Spawns `spec` with piped stdio and starts its I/O tasks.
    ///
    /// Stdout lines pass through `adapter.from_wire` and `adapter.on_output`
    /// before being queued on `events`; stderr lines are logged, classified
    /// by `adapter.on_error` and queued as diagnostics. Must be called from
    /// within a Tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns [`ProcessError::Spawn`] when the executable cannot be started.
    pub fn spawn(
        &self,
        spec: &SpawnSpec,
        adapter: &Arc<dyn ToolAdapter>,
        events: &mpsc::Sender<ProcessEvent>,
    ) -> ProcessResult<ProcessHandle> {
        let program = spec.executable.to_string();
        let mut command = Command::new(spec.executable.as_std_path());
        command
            .args(&spec.args)
            .env_clear()
            .envs(&spec.environment)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(false);
        #[cfg(unix)]
        command.process_group(0);

        let mut child = command.spawn().map_err(|source| ProcessError::Spawn {
            program: program.clone(),
            source,
        })?;
        let Some(pid) = child.id() else {
            return Err(ProcessError::MissingPid);
        };
        let (stdin, stdout, stderr) = match (child.stdin.take(), child.stdout.take(), child.stderr.take()) {
            (Some(stdin), Some(stdout), Some(stderr)) => (stdin, stdout, stderr),
            _ => {
                if let Err(err) = child.start_kill() {
                    tracing::warn!(pid, error = %err, "failed to kill child with missing pipes");
                }
                return Err(ProcessError::MissingPipe("stdio"));
            }
        };

        let tool = adapter.definition().name().to_string();
        let (stdin_tx, stdin_rx) = mpsc::channel(self.settings.queue_capacity);
        let (exit_tx, exit_rx) = watch::channel(None);

        let tasks = vec![
            tokio::spawn(write_stdin(stdin, stdin_rx, pid)),
            tokio::spawn(read_stdout(stdout, Arc::clone(adapter), events.clone())),
            tokio::spawn(read_stderr(stderr, Arc::clone(adapter), events.clone(), tool.clone())),
            tokio::spawn(watch_exit(child, exit_tx, tool.clone(), pid)),
        ];
        tracing::info!(tool = %tool, pid, program = %program, args = ?spec.args, "spawned tool process");

        Ok(ProcessHandle::new(pid, program, stdin_tx, exit_rx, tasks))
    }

    /// Verifies that a freshly spawned process is ready.
    ///
    /// `none` returns immediately. Otherwise the process must survive the
    /// startup wait, and a `command` check must additionally exit 0 within
    /// the health-check timeout.
    ///
    /// # Errors
    ///
    /// Returns [`ProcessError::ExitedDuringStartup`] or one of the health
    /// check errors.
    pub async fn await_ready(
        &self,
        handle: &ProcessHandle,
        health_check: &HealthCheck,
        environment: &BTreeMap<String, String>,
    ) -> ProcessResult<()> {
        if *health_check == HealthCheck::None {
            return Ok(());
        }
        if let Some(exit) = handle.wait_for_exit(self.settings.startup_wait).await {
            return Err(ProcessError::ExitedDuringStartup {
                program: handle.program().to_owned(),
                exit,
            });
        }
        if let HealthCheck::Command(shell_command) = health_check {
            self.run_health_command(shell_command, environment).await?;
            if let Some(exit) = handle.exit_status() {
                return Err(ProcessError::ExitedDuringStartup {
                    program: handle.program().to_owned(),
                    exit,
                });
            }
        }
        Ok(())
    }

    /// Stops the process: the adapter's shutdown action, then SIGTERM with
    /// `grace`, then SIGKILL. Safe to call repeatedly.
    ///
    /// # Errors
    ///
    /// Returns signal delivery errors or [`ProcessError::Unkillable`].
    pub async fn terminate(
        &self,
        handle: &ProcessHandle,
        shutdown: &ShutdownAction,
        grace: Duration,
    ) -> ProcessResult<ProcessExit> {
        let exit = match handle.exit_status() {
            Some(exit) => exit,
            None => self.escalate(handle, shutdown, grace).await?,
        };
        handle.close_stdin();
        handle.join_tasks(TASK_JOIN_TIMEOUT).await;
        tracing::info!(pid = handle.pid(), %exit, "tool process stopped");
        Ok(exit)
    }

    /// Returns `true` while the process is running.
    #[must_use]
    pub fn is_alive(handle: &ProcessHandle) -> bool {
        handle.is_alive()
    }

    async fn escalate(
        &self,
        handle: &ProcessHandle,
        shutdown: &ShutdownAction,
        grace: Duration,
    ) -> ProcessResult<ProcessExit> {
        let graceful = match shutdown {
            ShutdownAction::CloseStdin => {
                handle.close_stdin();
                true
            }
            ShutdownAction::SendLine(line) => {
                let queued = tokio::time::timeout(
                    self.settings.adapter_shutdown_grace,
                    handle.write_line(line.clone()),
                )
                .await;
                if !matches!(queued, Ok(Ok(()))) {
                    tracing::debug!(pid = handle.pid(), "shutdown line not delivered");
                }
                handle.close_stdin();
                true
            }
            ShutdownAction::Signal => false,
        };
        if graceful
            && let Some(exit) = handle.wait_for_exit(self.settings.adapter_shutdown_grace).await
        {
            return Ok(exit);
        }

        send_signal(handle.pid(), StopSignal::Terminate)?;
        if let Some(exit) = handle.wait_for_exit(grace).await {
            return Ok(exit);
        }

        tracing::warn!(pid = handle.pid(), "tool ignored SIGTERM; sending SIGKILL");
        send_signal(handle.pid(), StopSignal::Kill)?;
        handle
            .wait_for_exit(self.settings.kill_timeout)
            .await
            .ok_or(ProcessError::Unkillable(handle.pid()))
    }

    async fn run_health_command(
        &self,
        shell_command: &str,
        environment: &BTreeMap<String, String>,
    ) -> ProcessResult<()> {
        let mut command = Command::new("sh");
        command
            .arg("-c")
            .arg(shell_command)
            .env_clear()
            .envs(environment)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true);

        let limit = self.settings.health_check_timeout;
        match tokio::time::timeout(limit, command.status()).await {
            Err(_) => Err(ProcessError::HealthCheckTimedOut {
                command: shell_command.to_owned(),
                timeout_ms: u64::try_from(limit.as_millis()).unwrap_or(u64::MAX),
            }),
            Ok(Err(source)) => Err(ProcessError::HealthCheckSpawn {
                command: shell_command.to_owned(),
                source,
            }),
            Ok(Ok(status)) if status.success() => Ok(()),
            Ok(Ok(status)) => Err(ProcessError::HealthCheckFailed {
                command: shell_command.to_owned(),
                exit: ProcessExit::from(status),
            }),
        }
    }
}

async fn write_stdin(mut stdin: ChildStdin, mut lines: mpsc::Receiver<String>, pid: u32) {
    while let Some(line) = lines.recv().await {
        let mut frame = line.into_bytes();
        frame.push(b'\n');
        let written = match stdin.write_all(&frame).await {
            Ok(()) => stdin.flush().await,
            Err(err) => Err(err),
        };
        if let Err(err) = written {
            tracing::debug!(pid, error = %err, "stdin closed by tool");
            break;
        }
    }
}

async fn next_line<R>(reader: &mut BufReader<R>, buffer: &mut Vec<u8>) -> Option<String>
where
    R: AsyncRead + Unpin,
{
    buffer.clear();
    match reader.read_until(b'\n', buffer).await {
        Ok(0) => None,
        Ok(_) => Some(String::from_utf8_lossy(buffer).into_owned()),
        Err(err) => {
            tracing::debug!(error = %err, "tool stream read failed");
            None
        }
    }
}

async fn read_stdout<R>(stdout: R, adapter: Arc<dyn ToolAdapter>, events: mpsc::Sender<ProcessEvent>)
where
    R: AsyncRead + Unpin,
{
    let mut reader = BufReader::new(stdout);
    let mut buffer = Vec::new();
    while let Some(line) = next_line(&mut reader, &mut buffer).await {
        let Some(envelope) = adapter.from_wire(&line) else {
            continue;
        };
        adapter.on_output(&envelope);
        if events.send(ProcessEvent::Output(envelope)).await.is_err() {
            tracing::trace!("process output dropped; no consumer");
        }
    }
}

async fn read_stderr<R>(
    stderr: R,
    adapter: Arc<dyn ToolAdapter>,
    events: mpsc::Sender<ProcessEvent>,
    tool: String,
) where
    R: AsyncRead + Unpin,
{
    let mut reader = BufReader::new(stderr);
    let mut buffer = Vec::new();
    while let Some(raw) = next_line(&mut reader, &mut buffer).await {
        let line = raw.trim_end_matches(['\r', '\n']).to_owned();
        if line.trim().is_empty() {
            continue;
        }
        let disposition = adapter.on_error(&line);
        tracing::warn!(tool = %tool, ?disposition, stderr = %line, "tool diagnostic");
        if events
            .send(ProcessEvent::Diagnostic { line, disposition })
            .await
            .is_err()
        {
            tracing::trace!("process diagnostic dropped; no consumer");
        }
    }
}

async fn watch_exit(
    mut child: Child,
    exit_tx: watch::Sender<Option<ProcessExit>>,
    tool: String,
    pid: u32,
) {
    let exit = match child.wait().await {
        Ok(status) => ProcessExit::from(status),
        Err(err) => {
            tracing::warn!(tool = %tool, pid, error = %err, "failed to reap tool process");
            ProcessExit::unknown()
        }
    };
    tracing::info!(tool = %tool, pid, %exit, "tool process exited");
    exit_tx.send_replace(Some(exit));
}
