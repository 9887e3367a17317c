//! Descriptor of a running instance.

use super::{InstanceKey, InstanceMetrics};
use crate::tool_definition::domain::ToolName;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Whether an instance's process is believed to be alive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstanceStatus {
    /// A launch holds the key; `pid` is the launching process.
    Starting,
    /// The process was alive when last checked.
    Running,
    /// The process has exited.
    Stopped,
}

impl InstanceStatus {
    /// Returns the canonical representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Starting => "starting",
            Self::Running => "running",
            Self::Stopped => "stopped",
        }
    }
}

impl fmt::Display for InstanceStatus {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// Persisted record of a launched instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunningInstance {
    instance_key: InstanceKey,
    tool_name: ToolName,
    pid: u32,
    port: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    session_id: Option<String>,
    start_time: DateTime<Utc>,
    status: InstanceStatus,
    #[serde(default)]
    metrics: InstanceMetrics,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    host_pid: Option<u32>,
}

impl RunningInstance {
    /// Creates a running descriptor with zeroed metrics.
    #[must_use]
    pub const fn new(
        instance_key: InstanceKey,
        tool_name: ToolName,
        pid: u32,
        port: u16,
        session_id: Option<String>,
        start_time: DateTime<Utc>,
    ) -> Self {
        Self {
            instance_key,
            tool_name,
            pid,
            port,
            session_id,
            start_time,
            status: InstanceStatus::Running,
            metrics: InstanceMetrics {
                messages_sent: 0,
                messages_received: 0,
                errors: 0,
                latency_ms: 0,
            },
            host_pid: None,
        }
    }

    /// Creates the placeholder that reserves `instance_key` while
    /// `launcher_pid` starts the instance. It carries no port.
    #[must_use]
    pub const fn starting(
        instance_key: InstanceKey,
        tool_name: ToolName,
        launcher_pid: u32,
        session_id: Option<String>,
        start_time: DateTime<Utc>,
    ) -> Self {
        let mut placeholder =
            Self::new(instance_key, tool_name, launcher_pid, 0, session_id, start_time);
        placeholder.status = InstanceStatus::Starting;
        placeholder
    }

    /// Records the pid of the process hosting the bridge, when it is not
    /// the process that launched the instance.
    #[must_use]
    pub const fn with_host_pid(mut self, host_pid: u32) -> Self {
        self.host_pid = Some(host_pid);
        self
    }

    /// Replaces the metrics snapshot.
    #[must_use]
    pub const fn with_metrics(mut self, metrics: InstanceMetrics) -> Self {
        self.metrics = metrics;
        self
    }

    /// Returns the descriptor marked as stopped.
    #[must_use]
    pub const fn stopped(mut self) -> Self {
        self.status = InstanceStatus::Stopped;
        self
    }

    /// Returns the instance key.
    #[must_use]
    pub const fn instance_key(&self) -> &InstanceKey {
        &self.instance_key
    }

    /// Returns the tool the instance was launched from.
    #[must_use]
    pub const fn tool_name(&self) -> &ToolName {
        &self.tool_name
    }

    /// Returns the tool process id.
    #[must_use]
    pub const fn pid(&self) -> u32 {
        self.pid
    }

    /// Returns the bridge port.
    #[must_use]
    pub const fn port(&self) -> u16 {
        self.port
    }

    /// Returns the session identifier, if any.
    #[must_use]
    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    /// Returns the launch time.
    #[must_use]
    pub const fn start_time(&self) -> DateTime<Utc> {
        self.start_time
    }

    /// Returns the recorded status.
    #[must_use]
    pub const fn status(&self) -> InstanceStatus {
        self.status
    }

    /// Returns the last metrics snapshot.
    #[must_use]
    pub const fn metrics(&self) -> &InstanceMetrics {
        &self.metrics
    }

    /// Returns the hosting process id, if recorded.
    #[must_use]
    pub const fn host_pid(&self) -> Option<u32> {
        self.host_pid
    }

    /// Returns `true` for a running descriptor.
    #[must_use]
    pub const fn is_running(&self) -> bool {
        matches!(self.status, InstanceStatus::Running)
    }

    /// Returns `true` for a launch placeholder.
    #[must_use]
    pub const fn is_starting(&self) -> bool {
        matches!(self.status, InstanceStatus::Starting)
    }
}
