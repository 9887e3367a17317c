//! Adapter for coding assistants speaking the stream-json protocol.
//!
//! Requests are written as self-contained user turns. Output events of type
//! `assistant`, `result` and `system` become envelopes; anything else is
//! carried verbatim. The adapter keeps a bounded local record of recent
//! turns and the number of completed exchanges so it can ask for a session
//! reset before the assistant's own context fills up. Stderr is classified
//! into rate-limit and context-length errors.

use super::generic::decode_output_line;
use super::{AdapterError, ErrorDisposition, ToolAdapter};
use crate::config::AssistantSettings;
use crate::envelope::{MessageEnvelope, SharedClock, message_type};
use crate::process::executable::{expand_home, locate_executable};
use crate::tool_definition::domain::{AdapterKind, MessageFormat, ToolDefinition};
use camino::Utf8PathBuf;
use chrono::{DateTime, Utc};
use regex::Regex;
use serde_json::{Map, Value, json};
use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};

const RATE_LIMIT_PATTERN: &str = r"(?i)rate[ _-]?limit|\b429\b|too many requests|overloaded";
const CONTEXT_LENGTH_PATTERN: &str =
    r"(?i)context[ _-](length|window)|prompt is too long|maximum context|token limit";
const INSTALL_LOCATIONS: [&str; 2] = ["~/.claude/local", "~/.npm-global/bin"];
const SESSION_FLAG: &str = "--session-id";

/// Speaker of a recorded turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Speaker {
    User,
    Assistant,
}

#[derive(Debug, Default)]
struct SessionState {
    turns: VecDeque<(Speaker, String)>,
    exchanges: u32,
    consecutive_rate_limits: u32,
    forced_reset: bool,
}

/// Adapter for `interactive_assistant` tools.
pub struct InteractiveAssistantAdapter {
    definition: ToolDefinition,
    clock: SharedClock,
    settings: AssistantSettings,
    rate_limit: Regex,
    context_length: Regex,
    state: Mutex<SessionState>,
}

impl InteractiveAssistantAdapter {
    /// Creates an adapter for `definition`.
    ///
    /// # Errors
    ///
    /// Returns [`AdapterError::Pattern`] if a classification pattern fails
    /// to compile.
    pub fn new(
        definition: ToolDefinition,
        clock: SharedClock,
        settings: AssistantSettings,
    ) -> Result<Self, AdapterError> {
        Ok(Self {
            definition,
            clock,
            settings,
            rate_limit: Regex::new(RATE_LIMIT_PATTERN)?,
            context_length: Regex::new(CONTEXT_LENGTH_PATTERN)?,
            state: Mutex::new(SessionState::default()),
        })
    }

    /// Number of turns currently held in the local context window.
    #[must_use]
    pub fn context_turns(&self) -> usize {
        self.session().turns.len()
    }

    /// Number of exchanges completed since the last reset.
    #[must_use]
    pub fn exchanges(&self) -> u32 {
        self.session().exchanges
    }

    fn session(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn record_turn(&self, speaker: Speaker, content: &str) {
        let window = self.settings.context_window.max(1);
        let mut session = self.session();
        session.turns.push_back((speaker, content.to_owned()));
        while session.turns.len() > window {
            session.turns.pop_front();
        }
    }

    fn decode_event(&self, event: Map<String, Value>, raw: &str, now: DateTime<Utc>) -> MessageEnvelope {
        let event_type = event
            .get("type")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_owned();
        let session_id = event.get("session_id").cloned();

        let envelope = match event_type.as_str() {
            "assistant" => {
                let text = assistant_text(&event);
                let mut envelope = MessageEnvelope::new(message_type::RESPONSE, text, now);
                if let Some(model) = event.get("message").and_then(|message| message.get("model")) {
                    envelope = envelope.with_metadata("model", model.clone());
                }
                envelope
            }
            "result" => {
                let content = event
                    .get("result")
                    .and_then(Value::as_str)
                    .unwrap_or_default();
                let mut envelope = MessageEnvelope::new(message_type::RESULT, content, now);
                for key in ["subtype", "is_error", "duration_ms", "num_turns", "total_cost_usd"] {
                    if let Some(value) = event.get(key) {
                        envelope = envelope.with_metadata(key, value.clone());
                    }
                }
                envelope
            }
            "system" => {
                let subtype = event
                    .get("subtype")
                    .and_then(Value::as_str)
                    .unwrap_or("system");
                MessageEnvelope::new(message_type::SYSTEM, subtype, now)
            }
            _ => match MessageEnvelope::from_value(Value::Object(event), now) {
                Ok(envelope) => envelope,
                Err(_) => {
                    let kind = if event_type.is_empty() {
                        message_type::MESSAGE.to_owned()
                    } else {
                        event_type.clone()
                    };
                    MessageEnvelope::new(kind, raw.trim(), now)
                }
            },
        };

        let tagged = envelope.with_metadata("event", Value::String(event_type));
        match session_id {
            Some(id) => tagged.with_metadata("session_id", id),
            None => tagged,
        }
    }
}

fn assistant_text(event: &Map<String, Value>) -> String {
    let content = event.get("message").and_then(|message| message.get("content"));
    match content {
        Some(Value::String(text)) => text.clone(),
        Some(Value::Array(blocks)) => blocks
            .iter()
            .filter(|block| block.get("type").and_then(Value::as_str) == Some("text"))
            .filter_map(|block| block.get("text").and_then(Value::as_str))
            .collect::<Vec<_>>()
            .join(""),
        _ => String::new(),
    }
}

impl ToolAdapter for InteractiveAssistantAdapter {
    fn kind(&self) -> AdapterKind {
        AdapterKind::InteractiveAssistant
    }

    fn definition(&self) -> &ToolDefinition {
        &self.definition
    }

    fn resolve_executable(&self) -> Option<Utf8PathBuf> {
        let extra: Vec<Utf8PathBuf> = INSTALL_LOCATIONS
            .iter()
            .filter_map(|location| expand_home(location))
            .collect();
        locate_executable(self.definition.executable_path(), &extra)
    }

    fn build_launch_args(&self, session: Option<&str>) -> Vec<String> {
        let mut args = self.definition.launch_args().to_vec();
        if let Some(id) = session.filter(|id| !id.trim().is_empty())
            && !args.iter().any(|arg| arg == SESSION_FLAG)
        {
            args.push(SESSION_FLAG.to_owned());
            args.push(id.to_owned());
        }
        args
    }

    fn to_wire(&self, envelope: &MessageEnvelope) -> String {
        self.record_turn(Speaker::User, envelope.content());
        if self.definition.input_format() == MessageFormat::Text {
            return envelope.content().to_owned();
        }
        let mut turn = json!({
            "type": "user",
            "message": { "role": "user", "content": envelope.content() },
        });
        if let (Some(session), Some(object)) = (envelope.session(), turn.as_object_mut()) {
            object.insert("session_id".to_owned(), Value::String(session.to_owned()));
        }
        turn.to_string()
    }

    fn from_wire(&self, line: &str) -> Option<MessageEnvelope> {
        let now = self.clock.utc();
        match serde_json::from_str::<Value>(line.trim()) {
            Ok(Value::Object(event)) => Some(self.decode_event(event, line, now)),
            _ => decode_output_line(line, MessageFormat::Text, now),
        }
    }

    fn on_output(&self, envelope: &MessageEnvelope) {
        match envelope.message_type() {
            message_type::RESPONSE if !envelope.content().is_empty() => {
                self.record_turn(Speaker::Assistant, envelope.content());
            }
            message_type::RESULT => {
                let mut session = self.session();
                session.exchanges = session.exchanges.saturating_add(1);
                session.consecutive_rate_limits = 0;
            }
            _ => {}
        }
    }

    fn on_error(&self, line: &str) -> ErrorDisposition {
        if self.context_length.is_match(line) {
            let mut session = self.session();
            let keep = session.turns.len().checked_div(2).unwrap_or_default();
            while session.turns.len() > keep {
                session.turns.pop_front();
            }
            tracing::warn!(tool = %self.definition.name(), kept = keep, "context length exceeded; trimmed local context");
            return ErrorDisposition::Handled;
        }
        if self.rate_limit.is_match(line) {
            let mut session = self.session();
            session.consecutive_rate_limits = session.consecutive_rate_limits.saturating_add(1);
            if session.consecutive_rate_limits >= self.settings.rate_limit_escalation {
                session.forced_reset = true;
                tracing::warn!(
                    tool = %self.definition.name(),
                    occurrences = session.consecutive_rate_limits,
                    "repeated rate limiting; forcing session reset"
                );
                return ErrorDisposition::ResetSession;
            }
            return ErrorDisposition::Handled;
        }
        ErrorDisposition::Logged
    }

    fn should_reset_session(&self) -> bool {
        let session = self.session();
        session.forced_reset || session.exchanges >= self.settings.exchange_ceiling
    }

    fn reset_session(&self) {
        *self.session() = SessionState::default();
    }
}
