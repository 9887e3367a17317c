//! Instance hosting: the detached `tools host` process and foreground
//! launches.
//!
//! A launched instance lives as long as the process that spawned its child.
//! `tools launch` therefore re-executes this binary as a detached host,
//! waits for one JSON readiness line on the host's stdout and returns. The
//! host keeps the bridge and the child alive until it receives SIGTERM or
//! the child exits.

use super::app::{App, log_path};
use super::args::{HostArgs, LaunchArgs};
use super::CliError;
use crate::config::Settings;
use crate::instance::domain::{InstanceKey, RunningInstance};
use crate::instance::services::{LaunchOutcome, LaunchRequest};
use crate::logging::{self, LogTarget};
use crate::process::stop_pid;
use crate::tool_definition::domain::ToolName;
use camino::Utf8Path;
use serde::{Deserialize, Serialize};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tokio::time::MissedTickBehavior;

/// Extra time a detached host gets beyond the startup and health waits.
const READINESS_MARGIN: Duration = Duration::from_secs(10);

/// How often a host persists metric snapshots.
const METRICS_FLUSH_INTERVAL: Duration = Duration::from_secs(2);

/// Single line a host writes to stdout once the launch settled.
#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
enum HostReport {
    Ready { instance: RunningInstance },
    AlreadyRunning { instance: RunningInstance },
    Failed { reason: String },
}

fn launch_request(
    name: &str,
    session: Option<&str>,
    alias: Option<&str>,
) -> Result<LaunchRequest, CliError> {
    let mut request = LaunchRequest::new(ToolName::new(name)?);
    if let Some(session) = session {
        request = request.with_session(session);
    }
    if let Some(alias) = alias {
        request = request.with_alias(InstanceKey::new(alias)?);
    }
    Ok(request)
}

/// Entry point of the hidden `tools host` command.
pub(super) async fn run_host(settings: Settings, args: &HostArgs) -> Result<(), CliError> {
    let request = launch_request(&args.name, args.session.as_deref(), args.alias.as_deref())?;
    let key = request.instance_key();
    let state_dir = settings.resolved_state_dir()?;
    let log_file = open_log(&log_path(&state_dir, key.as_str()))?;
    logging::init(&settings.logging.level, LogTarget::File(log_file))?;

    let app = App::open(settings, Some(std::process::id()))?;
    let outcome = app.orchestrator().launch(request).await;
    let report = match &outcome {
        Ok(LaunchOutcome::Launched(instance)) => HostReport::Ready {
            instance: instance.clone(),
        },
        Ok(LaunchOutcome::AlreadyRunning(instance)) => HostReport::AlreadyRunning {
            instance: instance.clone(),
        },
        Err(err) => HostReport::Failed {
            reason: err.to_string(),
        },
    };
    write_report(&report)?;

    if let LaunchOutcome::Launched(_) = outcome? {
        tracing::info!(instance = %key, pid = std::process::id(), "hosting instance");
        serve(&app, &key).await?;
    }
    Ok(())
}

fn open_log(path: &Utf8Path) -> Result<fs::File, CliError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let file = OpenOptions::new().create(true).append(true).open(path)?;
    Ok(file)
}

fn write_report(report: &HostReport) -> Result<(), CliError> {
    let line = serde_json::to_string(report)
        .map_err(|err| CliError::Host(format!("failed to encode readiness report: {err}")))?;
    let stdout = std::io::stdout();
    let mut handle = stdout.lock();
    writeln!(handle, "{line}")?;
    handle.flush()?;
    Ok(())
}

/// Keeps an instance alive until a stop signal arrives or its process
/// exits, flushing metrics periodically.
async fn serve(app: &App, key: &InstanceKey) -> Result<(), CliError> {
    let mut flush = tokio::time::interval(METRICS_FLUSH_INTERVAL);
    flush.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let exited = app.orchestrator().wait_for_exit(key);
    tokio::pin!(exited);
    let stop = shutdown_signal();
    tokio::pin!(stop);

    loop {
        tokio::select! {
            signal = &mut stop => {
                if let Err(err) = signal {
                    tracing::error!(error = %err, "signal handling failed; stopping instance");
                }
                tracing::info!(instance = %key, "stop requested");
                app.orchestrator().terminate(key).await?;
                return Ok(());
            }
            exit = &mut exited => {
                match exit {
                    Some(status) => tracing::info!(instance = %key, %status, "tool exited"),
                    None => tracing::warn!(instance = %key, "instance is not hosted here"),
                }
                app.orchestrator().release(key).await;
                return Ok(());
            }
            _ = flush.tick() => {
                if let Err(err) = app.orchestrator().flush_metrics().await {
                    tracing::warn!(error = %err, "failed to persist metrics");
                }
            }
        }
    }
}

#[cfg(unix)]
async fn shutdown_signal() -> std::io::Result<()> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut terminate = signal(SignalKind::terminate())?;
    tokio::select! {
        result = tokio::signal::ctrl_c() => result,
        _ = terminate.recv() => Ok(()),
    }
}

#[cfg(not(unix))]
async fn shutdown_signal() -> std::io::Result<()> {
    tokio::signal::ctrl_c().await
}

/// `tools launch --foreground`: hosts the instance in this process.
pub(super) async fn launch_foreground<W: Write>(
    app: &App,
    args: &LaunchArgs,
    out: &mut W,
) -> Result<(), CliError> {
    let request = launch_request(&args.name, args.session.as_deref(), args.alias.as_deref())?;
    let key = request.instance_key();
    match app.orchestrator().launch(request).await? {
        LaunchOutcome::AlreadyRunning(instance) => {
            report_already_running(out, &instance)?;
            return Ok(());
        }
        LaunchOutcome::Launched(instance) => {
            writeln!(
                out,
                "Launched '{}' on port {} (pid {}); press Ctrl-C to stop",
                instance.instance_key(),
                instance.port(),
                instance.pid()
            )?;
            out.flush()?;
        }
    }
    serve(app, &key).await?;
    writeln!(out, "Instance '{key}' stopped")?;
    Ok(())
}

/// `tools launch`: starts a detached host and waits for its report.
pub(super) async fn launch_detached<W: Write>(
    app: &App,
    config: Option<&Utf8Path>,
    args: &LaunchArgs,
    out: &mut W,
) -> Result<(), CliError> {
    let request = launch_request(&args.name, args.session.as_deref(), args.alias.as_deref())?;
    let key = request.instance_key();
    if let Some(existing) = app.orchestrator().status(&key).await?
        && existing.is_running()
    {
        report_already_running(out, &existing)?;
        return Ok(());
    }
    if app.store().get(request.tool()).await?.is_none() {
        return Err(CliError::NotDefined(request.tool().to_string()));
    }

    match spawn_host(app, config, args, &key).await? {
        HostReport::Ready { instance } => {
            writeln!(
                out,
                "Launched '{}' on port {} (pid {})",
                instance.instance_key(),
                instance.port(),
                instance.pid()
            )?;
            writeln!(out, "Log: {}", app.log_path(key.as_str()))?;
            Ok(())
        }
        HostReport::AlreadyRunning { instance } => report_already_running(out, &instance),
        HostReport::Failed { reason } => Err(CliError::Launch(reason)),
    }
}

fn report_already_running<W: Write>(out: &mut W, instance: &RunningInstance) -> Result<(), CliError> {
    writeln!(
        out,
        "Instance '{}' is already running (pid {}, port {})",
        instance.instance_key(),
        instance.pid(),
        instance.port()
    )?;
    Ok(())
}

async fn spawn_host(
    app: &App,
    config: Option<&Utf8Path>,
    args: &LaunchArgs,
    key: &InstanceKey,
) -> Result<HostReport, CliError> {
    let executable = std::env::current_exe()
        .map_err(|err| CliError::Host(format!("cannot locate own executable: {err}")))?;
    let mut command = Command::new(executable);
    if let Some(path) = config {
        command.arg("--config").arg(path.as_str());
    }
    command.args(["tools", "host", args.name.as_str()]);
    if let Some(session) = &args.session {
        command.arg("--session").arg(session);
    }
    if let Some(alias) = &args.alias {
        command.arg("--instance").arg(alias);
    }
    command
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::null());
    #[cfg(unix)]
    command.process_group(0);

    let mut child = command
        .spawn()
        .map_err(|err| CliError::Host(format!("failed to start host: {err}")))?;
    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| CliError::Host("host stdout unavailable".to_owned()))?;
    let mut lines = BufReader::new(stdout).lines();

    let process = &app.settings().process;
    let limit = process
        .startup_wait()
        .saturating_add(process.health_check_timeout())
        .saturating_add(READINESS_MARGIN);
    let log = app.log_path(key.as_str());

    let line = match tokio::time::timeout(limit, lines.next_line()).await {
        Ok(Ok(Some(line))) => line,
        Ok(Ok(None)) => {
            return Err(CliError::Host(format!(
                "host exited before reporting readiness; see {log}"
            )));
        }
        Ok(Err(err)) => {
            return Err(CliError::Host(format!("failed to read host report: {err}")));
        }
        Err(_) => {
            if let Some(pid) = child.id() {
                stop_pid(
                    pid,
                    process.termination_grace(),
                    process.kill_timeout(),
                    app.settings().bridge.poll_interval(),
                )
                .await
                .map_err(|err| CliError::Host(err.to_string()))?;
            }
            return Err(CliError::Host(format!(
                "host did not report readiness within {} ms; see {log}",
                limit.as_millis()
            )));
        }
    };
    serde_json::from_str(&line)
        .map_err(|err| CliError::Host(format!("unreadable host report: {err}")))
}
