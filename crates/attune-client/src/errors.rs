use crate::session::ConnectionState;

/// Socket-level failure. Never fatal on its own: the session reacts by
/// handing the close to the reconnection policy.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    #[error("connect failed: {0}")]
    Connect(String),
    #[error("websocket error: {0}")]
    WebSocket(String),
    #[error("transport is not open")]
    NotOpen,
    #[error("connection closed")]
    Closed,
}

impl From<tokio_tungstenite::tungstenite::Error> for TransportError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        Self::WebSocket(err.to_string())
    }
}

/// Errors returned by [`crate::SessionClient`] operations.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// The session is not connected; the frame was not transmitted.
    #[error("`{message_type}` not sent: session is {state}")]
    NotConnected {
        state: ConnectionState,
        message_type: &'static str,
    },
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error("failed to encode outbound frame: {0}")]
    Encode(#[from] serde_json::Error),
    /// The session task has stopped.
    #[error("session client has shut down")]
    Shutdown,
}

impl ClientError {
    /// Short classification string for logging.
    pub fn error_kind(&self) -> &'static str {
        match self {
            Self::NotConnected { .. } => "not_connected",
            Self::Transport(_) => "transport",
            Self::Encode(_) => "encode",
            Self::Shutdown => "shutdown",
        }
    }

    /// Whether the frame can be expected to go through once the session
    /// reconnects.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::NotConnected { .. } | Self::Transport(_))
    }
}

/// Failure fetching a bootstrap document over HTTP.
#[derive(Debug, thiserror::Error)]
pub enum BootstrapError {
    #[error("request to {path} failed: {source}")]
    Http {
        path: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("{path} returned {status}: {body}")]
    Status {
        path: String,
        status: u16,
        body: String,
    },
    #[error("{path} returned an unexpected body: {source}")]
    Decode {
        path: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),
}
