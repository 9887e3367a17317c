//! Consumer of envelopes received from the socket client.

use crate::envelope::MessageEnvelope;
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

/// Error reported by an [`InboundHandler`].
#[derive(Debug, Clone, Error)]
#[error("inbound handler failed: {0}")]
pub struct InboundError(pub Arc<dyn std::error::Error + Send + Sync>);

impl InboundError {
    /// Wraps an underlying failure.
    pub fn new(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self(Arc::new(err))
    }
}

/// Receives decoded client envelopes, one at a time and in arrival order.
#[async_trait]
pub trait InboundHandler: Send + Sync {
    /// Handles one envelope.
    async fn handle(&self, envelope: MessageEnvelope) -> Result<(), InboundError>;

    /// Decodes a frame that is not a JSON envelope, if the handler
    /// understands it.
    fn decode_fallback(&self, _line: &str) -> Option<MessageEnvelope> {
        None
    }
}
