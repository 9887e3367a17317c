//! Signal delivery and pid liveness for processes this process may not own.

use super::{ProcessError, ProcessResult};
use std::time::Duration;

/// Signals used to stop a process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopSignal {
    /// SIGTERM.
    Terminate,
    /// SIGKILL.
    Kill,
}

/// Returns `true` when `pid` names an existing process.
///
/// A process owned by another user still counts as alive. An exited process
/// nobody has reaped yet does not.
#[cfg(unix)]
#[must_use]
pub fn pid_is_alive(pid: u32) -> bool {
    use nix::errno::Errno;
    use nix::sys::signal::kill;
    use nix::unistd::Pid;

    let Some(raw) = i32::try_from(pid).ok().filter(|raw| *raw > 0) else {
        return false;
    };
    match kill(Pid::from_raw(raw), None) {
        Ok(()) => !is_zombie(pid),
        Err(Errno::EPERM) => true,
        Err(_) => false,
    }
}

/// Reads the process state letter from `/proc/<pid>/stat`.
#[cfg(target_os = "linux")]
fn is_zombie(pid: u32) -> bool {
    std::fs::read_to_string(format!("/proc/{pid}/stat"))
        .ok()
        .and_then(|stat| {
            stat.rsplit_once(')')
                .map(|(_, fields)| fields.trim_start().starts_with('Z'))
        })
        .unwrap_or(false)
}

#[cfg(all(unix, not(target_os = "linux")))]
const fn is_zombie(_pid: u32) -> bool {
    false
}

/// Returns `true` when `pid` names an existing process.
#[cfg(not(unix))]
#[must_use]
pub fn pid_is_alive(_pid: u32) -> bool {
    false
}

/// Sends `signal` to `pid`. Returns `false` when no such process exists.
///
/// # Errors
///
/// Returns [`ProcessError::InvalidPid`] for pids that cannot be signalled
/// individually, or [`ProcessError::Signal`] when delivery fails.
#[cfg(unix)]
pub fn send_signal(pid: u32, signal: StopSignal) -> ProcessResult<bool> {
    use nix::errno::Errno;
    use nix::sys::signal::{Signal, kill};
    use nix::unistd::Pid;

    let raw = i32::try_from(pid)
        .ok()
        .filter(|raw| *raw > 0)
        .ok_or(ProcessError::InvalidPid(pid))?;
    let native = match signal {
        StopSignal::Terminate => Signal::SIGTERM,
        StopSignal::Kill => Signal::SIGKILL,
    };
    match kill(Pid::from_raw(raw), native) {
        Ok(()) => Ok(true),
        Err(Errno::ESRCH) => Ok(false),
        Err(errno) => Err(ProcessError::Signal {
            pid,
            message: errno.desc().to_owned(),
        }),
    }
}

/// Sends `signal` to `pid`. Returns `false` when no such process exists.
///
/// # Errors
///
/// Always returns [`ProcessError::Signal`] on platforms without signals.
#[cfg(not(unix))]
pub fn send_signal(pid: u32, _signal: StopSignal) -> ProcessResult<bool> {
    Err(ProcessError::Signal {
        pid,
        message: "signals are not supported on this platform".to_owned(),
    })
}

/// Stops a process this process did not spawn: SIGTERM, up to `grace` for
/// it to disappear, then SIGKILL and up to `kill_timeout`.
///
/// Returns `false` when the process was already gone.
///
/// # Errors
///
/// Returns signal delivery errors, or [`ProcessError::Unkillable`] when the
/// process outlives SIGKILL.
pub async fn stop_pid(
    pid: u32,
    grace: Duration,
    kill_timeout: Duration,
    poll: Duration,
) -> ProcessResult<bool> {
    if !pid_is_alive(pid) || !send_signal(pid, StopSignal::Terminate)? {
        return Ok(false);
    }
    if wait_until_dead(pid, grace, poll).await {
        return Ok(true);
    }
    tracing::warn!(pid, "process ignored SIGTERM; sending SIGKILL");
    send_signal(pid, StopSignal::Kill)?;
    if wait_until_dead(pid, kill_timeout, poll).await {
        Ok(true)
    } else {
        Err(ProcessError::Unkillable(pid))
    }
}

async fn wait_until_dead(pid: u32, limit: Duration, poll: Duration) -> bool {
    let deadline = tokio::time::Instant::now() + limit;
    loop {
        if !pid_is_alive(pid) {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(poll).await;
    }
}
