//! Service layer binding definitions, adapters, processes and bridges.

mod error;
mod live;
mod orchestrator;
mod request;

pub use error::{OrchestratorError, OrchestratorResult};
pub use orchestrator::{InstanceOrchestrator, OrchestratorConfig};
pub use request::{LaunchOutcome, LaunchRequest, TerminateOutcome};
