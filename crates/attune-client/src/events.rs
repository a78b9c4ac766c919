use attune_core::wire::InboundMessage;

use crate::errors::TransportError;

pub const CONNECTED: &str = "connected";
pub const DISCONNECTED: &str = "disconnected";
pub const ERROR: &str = "error";
pub const MAX_RECONNECT_ATTEMPTS_REACHED: &str = "max_reconnect_attempts_reached";

/// Everything a session publishes on its dispatcher.
///
/// Lifecycle changes use fixed names; inbound frames are published under
/// their own wire `type`.
#[derive(Clone, Debug, PartialEq)]
pub enum SessionEvent {
    Connected,
    Disconnected,
    Error(TransportError),
    /// Automatic recovery gave up. Fires once per exhaustion.
    ReconnectExhausted { attempts: u32 },
    Message(InboundMessage),
}

impl SessionEvent {
    /// Name this event is published under.
    pub fn name(&self) -> &str {
        match self {
            Self::Connected => CONNECTED,
            Self::Disconnected => DISCONNECTED,
            Self::Error(_) => ERROR,
            Self::ReconnectExhausted { .. } => MAX_RECONNECT_ATTEMPTS_REACHED,
            Self::Message(msg) => msg.kind(),
        }
    }

    pub fn as_message(&self) -> Option<&InboundMessage> {
        match self {
            Self::Message(msg) => Some(msg),
            _ => None,
        }
    }
}
