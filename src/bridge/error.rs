//! Socket bridge errors.

use crate::envelope::EnvelopeError;
use std::net::SocketAddr;
use thiserror::Error;

/// Result type for bridge operations.
pub type BridgeResult<T> = Result<T, BridgeError>;

/// Errors raised by [`super::SocketBridge`] and [`super::BridgeClient`].
#[derive(Debug, Error)]
pub enum BridgeError {
    /// `start` was called on a running bridge.
    #[error("bridge is already running")]
    AlreadyRunning,

    /// The listening socket could not be bound.
    #[error("failed to bind port {port}: {source}")]
    Bind {
        /// Requested port.
        port: u16,
        /// Underlying error.
        source: std::io::Error,
    },

    /// The bridge is stopped.
    #[error("bridge is not running")]
    NotRunning,

    /// The outbound queue stayed full for the whole enqueue timeout.
    #[error("outbound queue is full")]
    QueueFull,

    /// A client could not connect.
    #[error("failed to connect to {address}: {source}")]
    Connect {
        /// Target address.
        address: SocketAddr,
        /// Underlying error.
        source: std::io::Error,
    },

    /// The peer closed the connection.
    #[error("connection closed by peer")]
    Disconnected,

    /// Socket I/O failed.
    #[error("socket I/O failed: {0}")]
    Io(#[from] std::io::Error),

    /// A received frame was not a valid envelope.
    #[error(transparent)]
    Decode(#[from] EnvelopeError),
}
