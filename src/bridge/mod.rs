//! TCP bridge between one socket client and one tool instance.
//!
//! A [`SocketBridge`] listens on a single port and serves one client at a
//! time. Frames are newline-delimited JSON [`MessageEnvelope`]s in both
//! directions. Inbound frames are decoded, tagged with the instance key and
//! queued for an [`InboundHandler`]; outbound envelopes are queued by
//! [`SocketBridge::send_message`] and written by a dedicated send loop.
//! Every loop re-checks the bridge's running flag at least once per poll
//! interval, so [`SocketBridge::stop`] completes promptly.
//!
//! [`MessageEnvelope`]: crate::envelope::MessageEnvelope

mod client;
mod error;
mod handler;
mod socket;
mod state;

pub use client::BridgeClient;
pub use error::{BridgeError, BridgeResult};
pub use handler::{InboundError, InboundHandler};
pub use socket::{BridgeConfig, MAX_FRAME_BYTES, SocketBridge};
pub use state::BridgeState;
