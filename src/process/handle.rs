//! Handle to a supervised child process.

use crate::adapter::ErrorDisposition;
use crate::envelope::MessageEnvelope;
use std::fmt;
use std::process::ExitStatus;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

/// How a child process ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcessExit {
    /// Exit code, when the process exited normally.
    pub code: Option<i32>,
    /// Terminating signal, when the process was killed.
    pub signal: Option<i32>,
}

impl ProcessExit {
    /// Exit whose cause could not be determined.
    #[must_use]
    pub const fn unknown() -> Self {
        Self {
            code: None,
            signal: None,
        }
    }

    /// Returns `true` for a zero exit code.
    #[must_use]
    pub const fn success(&self) -> bool {
        matches!(self.code, Some(0))
    }
}

impl From<ExitStatus> for ProcessExit {
    fn from(status: ExitStatus) -> Self {
        #[cfg(unix)]
        let signal = std::os::unix::process::ExitStatusExt::signal(&status);
        #[cfg(not(unix))]
        let signal = None;
        Self {
            code: status.code(),
            signal,
        }
    }
}

impl fmt::Display for ProcessExit {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.code, self.signal) {
            (Some(code), _) => write!(formatter, "exit code {code}"),
            (None, Some(signal)) => write!(formatter, "killed by signal {signal}"),
            (None, None) => formatter.write_str("unknown exit status"),
        }
    }
}

/// Something a child produced on stdout or stderr.
#[derive(Debug, Clone, PartialEq)]
pub enum ProcessEvent {
    /// A stdout line translated by the adapter.
    Output(MessageEnvelope),
    /// A stderr line and the adapter's classification of it.
    Diagnostic {
        /// The raw line.
        line: String,
        /// What the adapter made of it.
        disposition: ErrorDisposition,
    },
}

/// Live handle to a spawned child.
///
/// Dropping the handle does not stop the child; use
/// [`super::ProcessSupervisor::terminate`].
#[derive(Debug)]
pub struct ProcessHandle {
    pid: u32,
    program: String,
    stdin: Mutex<Option<mpsc::Sender<String>>>,
    exit: watch::Receiver<Option<ProcessExit>>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl ProcessHandle {
    pub(super) fn new(
        pid: u32,
        program: String,
        stdin: mpsc::Sender<String>,
        exit: watch::Receiver<Option<ProcessExit>>,
        tasks: Vec<JoinHandle<()>>,
    ) -> Self {
        Self {
            pid,
            program,
            stdin: Mutex::new(Some(stdin)),
            exit,
            tasks: Mutex::new(tasks),
        }
    }

    /// Returns the child's process id.
    #[must_use]
    pub const fn pid(&self) -> u32 {
        self.pid
    }

    /// Returns the executable path the child was started from.
    #[must_use]
    pub fn program(&self) -> &str {
        &self.program
    }

    /// Returns the exit details once the child has been reaped.
    #[must_use]
    pub fn exit_status(&self) -> Option<ProcessExit> {
        *self.exit.borrow()
    }

    /// Returns `true` until the child has exited.
    #[must_use]
    pub fn is_alive(&self) -> bool {
        self.exit_status().is_none()
    }

    /// Queues one line for the child's stdin; a newline is appended.
    ///
    /// # Errors
    ///
    /// Returns [`super::ProcessError::StdinClosed`] when stdin was closed or
    /// the writer stopped.
    pub async fn write_line(&self, line: String) -> super::ProcessResult<()> {
        let sender = lock(&self.stdin)
            .clone()
            .ok_or(super::ProcessError::StdinClosed(self.pid))?;
        sender
            .send(line)
            .await
            .map_err(|_| super::ProcessError::StdinClosed(self.pid))
    }

    /// Closes stdin once every queued line has been written.
    pub fn close_stdin(&self) {
        lock(&self.stdin).take();
    }

    /// Waits up to `limit` for the child to exit.
    pub async fn wait_for_exit(&self, limit: Duration) -> Option<ProcessExit> {
        tokio::time::timeout(limit, self.exited()).await.ok()
    }

    /// Waits for the child to exit.
    pub async fn exited(&self) -> ProcessExit {
        let mut receiver = self.exit.clone();
        match receiver.wait_for(Option::is_some).await {
            Ok(exit) => (*exit).unwrap_or_else(ProcessExit::unknown),
            Err(_) => ProcessExit::unknown(),
        }
    }

    /// Joins the reader, writer and watcher tasks, aborting any that are
    /// still running after `limit`.
    pub(super) async fn join_tasks(&self, limit: Duration) {
        let tasks: Vec<JoinHandle<()>> = lock(&self.tasks).drain(..).collect();
        for mut task in tasks {
            if tokio::time::timeout(limit, &mut task).await.is_err() {
                tracing::debug!(pid = self.pid, "aborting lingering stdio task");
                task.abort();
            }
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
