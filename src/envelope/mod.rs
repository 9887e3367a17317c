//! Canonical message envelope exchanged over the socket bridge.
//!
//! Every frame on the wire is one JSON-encoded [`MessageEnvelope`] followed
//! by a newline. Decoding is deliberately tolerant: unknown top-level fields
//! are kept in `metadata`, structured `content` is carried as compact JSON
//! text, and a missing timestamp is filled with the receipt time.

mod error;

pub use error::EnvelopeError;

use chrono::{DateTime, Utc};
use mockable::Clock;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;

/// Shared clock handle used wherever envelopes are stamped.
pub type SharedClock = Arc<dyn Clock + Send + Sync>;

/// Well-known envelope `type` values.
pub mod message_type {
    /// A request originating from the connected client.
    pub const USER: &str = "user";
    /// Output produced by a tool in reply to a request.
    pub const RESPONSE: &str = "response";
    /// Final result of an exchange (assistant protocols).
    pub const RESULT: &str = "result";
    /// Informational notice generated by the bridge or the tool.
    pub const SYSTEM: &str = "system";
    /// Fallback type for decoded frames that carry none.
    pub const MESSAGE: &str = "message";
}

/// Metadata key recording which instance produced or received an envelope.
pub const SOURCE_INSTANCE_KEY: &str = "source_instance";

/// Metadata key recording the wire format of a text-wrapped line.
pub const FORMAT_KEY: &str = "format";

/// A single message crossing the socket boundary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageEnvelope {
    #[serde(rename = "type")]
    message_type: String,
    content: String,
    #[serde(default)]
    metadata: Map<String, Value>,
    timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    session: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    context: Option<Value>,
}

impl MessageEnvelope {
    /// Creates an envelope with empty metadata and no session.
    #[must_use]
    pub fn new(
        message_type: impl Into<String>,
        content: impl Into<String>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            message_type: message_type.into(),
            content: content.into(),
            metadata: Map::new(),
            timestamp,
            session: None,
            context: None,
        }
    }

    /// Wraps a raw output line that could not be parsed structurally.
    #[must_use]
    pub fn text(content: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self::new(message_type::RESPONSE, content, timestamp)
            .with_metadata(FORMAT_KEY, Value::String("text".to_owned()))
    }

    /// Attaches a session identifier.
    #[must_use]
    pub fn with_session(mut self, session: impl Into<String>) -> Self {
        self.session = Some(session.into());
        self
    }

    /// Inserts a metadata entry, replacing any previous value.
    #[must_use]
    pub fn with_metadata(mut self, key: impl Into<String>, value: Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    /// Records the instance the envelope passed through.
    pub fn tag_source(&mut self, instance_key: &str) {
        self.metadata.insert(
            SOURCE_INSTANCE_KEY.to_owned(),
            Value::String(instance_key.to_owned()),
        );
    }

    /// Returns the envelope type.
    #[must_use]
    pub fn message_type(&self) -> &str {
        &self.message_type
    }

    /// Returns the textual content.
    #[must_use]
    pub fn content(&self) -> &str {
        &self.content
    }

    /// Returns the metadata object.
    #[must_use]
    pub const fn metadata(&self) -> &Map<String, Value> {
        &self.metadata
    }

    /// Returns the envelope timestamp.
    #[must_use]
    pub const fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    /// Returns the session identifier, if any.
    #[must_use]
    pub fn session(&self) -> Option<&str> {
        self.session.as_deref()
    }

    /// Returns the attached context, if any.
    #[must_use]
    pub const fn context(&self) -> Option<&Value> {
        self.context.as_ref()
    }

    /// Decodes one wire frame.
    ///
    /// # Errors
    ///
    /// Returns [`EnvelopeError`] when the line is not JSON or is not an
    /// object carrying a `content` field.
    pub fn decode(line: &str, received_at: DateTime<Utc>) -> Result<Self, EnvelopeError> {
        let value: Value = serde_json::from_str(line.trim())?;
        Self::from_value(value, received_at)
    }

    /// Builds an envelope from an already parsed JSON value.
    ///
    /// # Errors
    ///
    /// Returns [`EnvelopeError::NotAnObject`] or
    /// [`EnvelopeError::MissingContent`] for values that do not have the
    /// envelope shape.
    pub fn from_value(value: Value, received_at: DateTime<Utc>) -> Result<Self, EnvelopeError> {
        let Value::Object(mut fields) = value else {
            return Err(EnvelopeError::NotAnObject);
        };

        let content = match fields.remove("content") {
            Some(Value::String(text)) => text,
            Some(Value::Null) | None => return Err(EnvelopeError::MissingContent),
            Some(other) => other.to_string(),
        };
        let message_type = match fields.remove("type") {
            Some(Value::String(kind)) if !kind.trim().is_empty() => kind,
            _ => message_type::MESSAGE.to_owned(),
        };
        let mut metadata = match fields.remove("metadata") {
            Some(Value::Object(map)) => map,
            Some(Value::Null) | None => Map::new(),
            Some(other) => Map::from_iter([("value".to_owned(), other)]),
        };
        let timestamp = fields
            .remove("timestamp")
            .and_then(|raw| serde_json::from_value::<DateTime<Utc>>(raw).ok())
            .unwrap_or(received_at);
        let session = match fields.remove("session") {
            Some(Value::String(session)) => Some(session),
            Some(Value::Null) | None => None,
            Some(other) => Some(other.to_string()),
        };
        let context = fields.remove("context").filter(|raw| !raw.is_null());

        // Envelope fields are removed above; whatever remains is extra.
        for (key, extra) in fields {
            metadata.entry(key).or_insert(extra);
        }

        Ok(Self {
            message_type,
            content,
            metadata,
            timestamp,
            session,
            context,
        })
    }

    /// Encodes the envelope as a single line of compact JSON, without the
    /// trailing newline.
    ///
    /// # Errors
    ///
    /// Returns [`EnvelopeError::Json`] if serialization fails.
    pub fn to_json_line(&self) -> Result<String, EnvelopeError> {
        Ok(serde_json::to_string(self)?)
    }
}
