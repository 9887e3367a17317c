//! Process supervision errors.

use super::ProcessExit;
use thiserror::Error;

/// Result type for process supervision.
pub type ProcessResult<T> = Result<T, ProcessError>;

/// Errors raised while spawning, checking or stopping a child process.
#[derive(Debug, Error)]
pub enum ProcessError {
    /// The executable could not be started.
    #[error("failed to spawn '{program}': {source}")]
    Spawn {
        /// Executable path.
        program: String,
        /// Underlying error.
        source: std::io::Error,
    },

    /// A stdio pipe was not available after spawn.
    #[error("child {0} pipe was not captured")]
    MissingPipe(&'static str),

    /// The child exited before its process id could be read.
    #[error("child exited before reporting a process id")]
    MissingPid,

    /// The process exited during the startup wait.
    #[error("'{program}' exited during startup ({exit})")]
    ExitedDuringStartup {
        /// Executable path.
        program: String,
        /// Exit details.
        exit: ProcessExit,
    },

    /// The health-check command could not be run.
    #[error("health check '{command}' could not run: {source}")]
    HealthCheckSpawn {
        /// Shell command.
        command: String,
        /// Underlying error.
        source: std::io::Error,
    },

    /// The health-check command exited unsuccessfully.
    #[error("health check '{command}' failed ({exit})")]
    HealthCheckFailed {
        /// Shell command.
        command: String,
        /// Exit details.
        exit: ProcessExit,
    },

    /// The health-check command did not finish in time.
    #[error("health check '{command}' timed out after {timeout_ms} ms")]
    HealthCheckTimedOut {
        /// Shell command.
        command: String,
        /// Timeout in milliseconds.
        timeout_ms: u64,
    },

    /// The child's stdin is closed.
    #[error("stdin of process {0} is closed")]
    StdinClosed(u32),

    /// The pid cannot be represented as a signal target.
    #[error("invalid process id {0}")]
    InvalidPid(u32),

    /// Delivering a signal failed.
    #[error("failed to signal process {pid}: {message}")]
    Signal {
        /// Target pid.
        pid: u32,
        /// OS error description.
        message: String,
    },

    /// The process survived SIGKILL for the whole kill timeout.
    #[error("process {0} did not exit after SIGKILL")]
    Unkillable(u32),
}
