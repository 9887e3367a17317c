//! Bridge lifecycle states.

use std::fmt;

/// Lifecycle state of a [`super::SocketBridge`].
///
/// Transitions: `Stopped → Listening` on start, `Listening ⇄ Connected` as
/// clients come and go, and any state `→ Stopped` on stop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BridgeState {
    /// Not bound.
    Stopped,
    /// Bound and waiting for a client.
    Listening,
    /// Serving a client.
    Connected,
}

impl BridgeState {
    /// Returns the canonical representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Stopped => "stopped",
            Self::Listening => "listening",
            Self::Connected => "connected",
        }
    }
}

impl fmt::Display for BridgeState {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}
