//! Generic adapter for tools speaking plain JSON or plain text lines.

use super::ToolAdapter;
use crate::envelope::{FORMAT_KEY, MessageEnvelope, SharedClock, message_type};
use crate::process::executable::locate_executable;
use crate::tool_definition::domain::{AdapterKind, MessageFormat, ToolDefinition};
use camino::Utf8PathBuf;
use serde_json::Value;

/// Adapter for `generic_json` and `generic_text` tools.
///
/// Input is written as a compact JSON envelope or as the bare content,
/// according to the definition's input format. Output lines are parsed as
/// envelopes when the output format is JSON; anything else is wrapped as a
/// text response.
pub struct GenericAdapter {
    definition: ToolDefinition,
    clock: SharedClock,
}

impl GenericAdapter {
    /// Creates an adapter for `definition`.
    #[must_use]
    pub const fn new(definition: ToolDefinition, clock: SharedClock) -> Self {
        Self { definition, clock }
    }
}

impl ToolAdapter for GenericAdapter {
    fn kind(&self) -> AdapterKind {
        self.definition.adapter_kind()
    }

    fn definition(&self) -> &ToolDefinition {
        &self.definition
    }

    fn resolve_executable(&self) -> Option<Utf8PathBuf> {
        locate_executable(self.definition.executable_path(), &[])
    }

    fn build_launch_args(&self, _session: Option<&str>) -> Vec<String> {
        self.definition.launch_args().to_vec()
    }

    fn to_wire(&self, envelope: &MessageEnvelope) -> String {
        match self.definition.input_format() {
            MessageFormat::Json => envelope
                .to_json_line()
                .unwrap_or_else(|_| envelope.content().to_owned()),
            MessageFormat::Text => envelope.content().to_owned(),
        }
    }

    fn from_wire(&self, line: &str) -> Option<MessageEnvelope> {
        decode_output_line(line, self.definition.output_format(), self.clock.utc())
    }
}

/// Shared stdout decoding: structured parse for JSON output, text wrap
/// otherwise or on failure. Blank lines yield `None`.
pub(crate) fn decode_output_line(
    line: &str,
    format: MessageFormat,
    now: chrono::DateTime<chrono::Utc>,
) -> Option<MessageEnvelope> {
    let payload = line.trim_end_matches(['\r', '\n']);
    if payload.trim().is_empty() {
        return None;
    }
    if format == MessageFormat::Text {
        return Some(MessageEnvelope::text(payload, now));
    }

    match serde_json::from_str::<Value>(payload.trim()) {
        Ok(value) => Some(MessageEnvelope::from_value(value, now).unwrap_or_else(|_| {
            MessageEnvelope::new(message_type::RESPONSE, payload.trim(), now)
                .with_metadata(FORMAT_KEY, Value::String("json".to_owned()))
        })),
        Err(_) => Some(MessageEnvelope::text(payload, now)),
    }
}
