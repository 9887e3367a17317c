//! Domain model for running instances.

mod error;
mod instance;
mod key;
mod metrics;

pub use error::InstanceDomainError;
pub use instance::{InstanceStatus, RunningInstance};
pub use key::InstanceKey;
pub use metrics::{InstanceMetrics, MetricsRecorder};
