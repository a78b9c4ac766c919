pub mod bootstrap;
pub mod dispatcher;
pub mod errors;
pub mod events;
pub mod reconnect;
pub mod session;
pub mod transport;

pub use bootstrap::{BootstrapClient, BootstrapDocuments, HealthStatus};
pub use dispatcher::{EventDispatcher, Listener, PublishReport};
pub use errors::{BootstrapError, ClientError, TransportError};
pub use events::SessionEvent;
pub use reconnect::{ReconnectDecision, ReconnectPhase, ReconnectPolicy};
pub use session::{ConnectionState, SessionClient, SessionConfig, SessionStatus};
pub use transport::{Connector, FrameSink, FrameStream, TransportConnection, WsConnector};
