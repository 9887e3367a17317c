//! Child process supervision.
//!
//! [`ProcessSupervisor`] spawns a tool with piped stdio and immediately
//! starts four tasks per child: a stdin writer fed by a bounded queue, a
//! stdout reader that turns lines into envelopes through the tool's adapter,
//! a stderr reader that logs and classifies diagnostics, and an exit watcher
//! that reaps the child. Termination escalates from the adapter's own
//! shutdown action to SIGTERM and finally SIGKILL, with bounded waits.

mod environment;
mod error;
pub mod executable;
mod handle;
mod signal;
mod supervisor;

pub use environment::{
    INSTANCE_KEY_VAR, InstanceIdentity, PORT_VAR, SESSION_VAR, TOOL_NAME_VAR, prepare_environment,
};
pub use error::{ProcessError, ProcessResult};
pub use handle::{ProcessEvent, ProcessExit, ProcessHandle};
pub use signal::{StopSignal, pid_is_alive, send_signal, stop_pid};
pub use supervisor::{ProcessSupervisor, SpawnSpec, SupervisorSettings};
