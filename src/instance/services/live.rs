//! In-process wiring of one running instance.

use crate::adapter::{ErrorDisposition, ToolAdapter};
use crate::bridge::{InboundError, InboundHandler, SocketBridge};
use crate::envelope::{MessageEnvelope, SharedClock, message_type};
use crate::instance::domain::{MetricsRecorder, RunningInstance};
use crate::process::{ProcessEvent, ProcessHandle};
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Metadata key marking bridge-generated notices.
const EVENT_KEY: &str = "event";

/// Everything an orchestrator owns for one instance it launched.
pub(super) struct LiveInstance {
    pub(super) descriptor: RunningInstance,
    pub(super) adapter: Arc<dyn ToolAdapter>,
    pub(super) process: Arc<ProcessHandle>,
    pub(super) bridge: Arc<SocketBridge>,
    pub(super) metrics: Arc<MetricsRecorder>,
    pub(super) pump: JoinHandle<()>,
}

impl LiveInstance {
    /// Descriptor with current metrics and liveness.
    pub(super) fn snapshot(&self) -> RunningInstance {
        let descriptor = self
            .descriptor
            .clone()
            .with_metrics(self.metrics.snapshot());
        if self.process.is_alive() {
            descriptor
        } else {
            descriptor.stopped()
        }
    }
}

/// Writes client envelopes to the tool's stdin.
pub(super) struct StdinForwarder {
    adapter: Arc<dyn ToolAdapter>,
    process: Arc<ProcessHandle>,
    metrics: Arc<MetricsRecorder>,
}

impl StdinForwarder {
    pub(super) const fn new(
        adapter: Arc<dyn ToolAdapter>,
        process: Arc<ProcessHandle>,
        metrics: Arc<MetricsRecorder>,
    ) -> Self {
        Self {
            adapter,
            process,
            metrics,
        }
    }
}

#[async_trait]
impl InboundHandler for StdinForwarder {
    async fn handle(&self, envelope: MessageEnvelope) -> Result<(), InboundError> {
        let payload = self.adapter.to_wire(&envelope);
        if let Err(err) = self.process.write_line(payload).await {
            self.metrics.record_error();
            return Err(InboundError::new(err));
        }
        self.metrics.record_sent(Instant::now());
        Ok(())
    }

    fn decode_fallback(&self, line: &str) -> Option<MessageEnvelope> {
        self.adapter.from_wire(line)
    }
}

/// Forwards process events to the bridge until the process's readers stop.
pub(super) async fn pump_output(
    mut events: mpsc::Receiver<ProcessEvent>,
    bridge: Arc<SocketBridge>,
    adapter: Arc<dyn ToolAdapter>,
    metrics: Arc<MetricsRecorder>,
    clock: SharedClock,
) {
    while let Some(event) = events.recv().await {
        let reset_requested = match event {
            ProcessEvent::Output(mut envelope) => {
                metrics.record_received(Instant::now());
                envelope.tag_source(bridge.instance_key());
                deliver(&bridge, &metrics, envelope).await;
                false
            }
            ProcessEvent::Diagnostic { disposition, .. } => {
                metrics.record_error();
                disposition == ErrorDisposition::ResetSession
            }
        };

        if reset_requested || adapter.should_reset_session() {
            adapter.reset_session();
            tracing::info!(instance = %bridge.instance_key(), "tool session reset");
            let mut notice = MessageEnvelope::new(message_type::SYSTEM, "session reset", clock.utc())
                .with_metadata(EVENT_KEY, Value::String("session_reset".to_owned()));
            notice.tag_source(bridge.instance_key());
            deliver(&bridge, &metrics, notice).await;
        }
    }
    tracing::debug!(instance = %bridge.instance_key(), "output pump finished");
}

async fn deliver(bridge: &SocketBridge, metrics: &MetricsRecorder, envelope: MessageEnvelope) {
    if let Err(err) = bridge.send_message(envelope).await {
        metrics.record_error();
        tracing::debug!(instance = %bridge.instance_key(), error = %err, "dropping tool output");
    }
}
