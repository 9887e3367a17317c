//! Envelope decoding errors.

use thiserror::Error;

/// Errors raised while decoding or encoding a [`super::MessageEnvelope`].
#[derive(Debug, Error)]
pub enum EnvelopeError {
    /// The frame is not valid JSON, or serialization failed.
    #[error("invalid envelope JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// The frame is JSON but not an object.
    #[error("envelope frame must be a JSON object")]
    NotAnObject,

    /// The frame is an object without usable `content`.
    #[error("envelope frame has no content field")]
    MissingContent,
}
