//! Session client: one logical real-time session against the backend.
//!
//! [`SessionClient`] is a handle to an actor task. The actor owns the
//! connection state, the reconnection policy, the single live
//! [`TransportConnection`] and the pending reconnect deadline, and handles
//! commands, transport signals and timer expiry one at a time. Events are
//! published on the injected [`EventDispatcher`] from the actor task, in the
//! order frames arrive.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use attune_core::wire::{InboundMessage, OutboundMessage};
use attune_settings::AttuneSettings;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::dispatcher::EventDispatcher;
use crate::errors::ClientError;
use crate::events::SessionEvent;
use crate::reconnect::{ReconnectDecision, ReconnectPolicy};
use crate::transport::{Connector, SignalEnvelope, TransportConnection, TransportSignal};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    Reconnecting,
    /// Automatic recovery gave up; only `connect`/`reconnect` leave this.
    Failed,
}

impl ConnectionState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Reconnecting => "reconnecting",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Observable status of a session.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SessionStatus {
    pub state: ConnectionState,
    pub reconnect_attempts: u32,
}

#[derive(Clone, Debug)]
pub struct SessionConfig {
    pub url: String,
    pub reconnect_base_delay: Duration,
    pub max_reconnect_attempts: u32,
    /// Pause between the forced close and the re-open of a manual reconnect.
    pub manual_reconnect_delay: Duration,
}

impl SessionConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            reconnect_base_delay: Duration::from_secs(1),
            max_reconnect_attempts: ReconnectPolicy::DEFAULT_MAX_ATTEMPTS,
            manual_reconnect_delay: Duration::from_secs(1),
        }
    }

    pub fn from_settings(settings: &AttuneSettings) -> attune_settings::Result<Self> {
        Ok(Self {
            url: settings.server.ws_url()?,
            reconnect_base_delay: settings.reconnect.base_delay(),
            max_reconnect_attempts: settings.reconnect.max_attempts,
            manual_reconnect_delay: settings.reconnect.manual_delay(),
        })
    }
}

enum Command {
    Connect(oneshot::Sender<()>),
    Disconnect(oneshot::Sender<()>),
    Reconnect(oneshot::Sender<()>),
    Send {
        frame: OutboundMessage,
        reply: oneshot::Sender<Result<(), ClientError>>,
    },
}

/// Handle to a running session. Dropping it stops the session.
pub struct SessionClient {
    commands: mpsc::UnboundedSender<Command>,
    status: watch::Receiver<SessionStatus>,
    dispatcher: Arc<EventDispatcher>,
    shutdown: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl SessionClient {
    /// Start the session actor. Nothing is dialed until [`Self::connect`].
    /// Must be called from within a Tokio runtime.
    pub fn spawn(
        config: SessionConfig,
        connector: Arc<dyn Connector>,
        dispatcher: Arc<EventDispatcher>,
    ) -> Self {
        let (commands, commands_rx) = mpsc::unbounded_channel();
        let (status_tx, status) = watch::channel(SessionStatus::default());
        let (signals_tx, signals_rx) = mpsc::unbounded_channel();
        let shutdown = CancellationToken::new();

        let actor = SessionActor {
            policy: ReconnectPolicy::new(config.reconnect_base_delay, config.max_reconnect_attempts),
            config,
            connector,
            dispatcher: Arc::clone(&dispatcher),
            state: ConnectionState::Disconnected,
            transport: None,
            generation: 0,
            reconnect_at: None,
            signals_tx,
            status_tx,
        };
        let task = tokio::spawn(actor.run(commands_rx, signals_rx, shutdown.clone()));

        Self {
            commands,
            status,
            dispatcher,
            shutdown,
            task: Some(task),
        }
    }

    /// Open the session. No-op while connecting, connected or already
    /// reconnecting; from `Failed` it restarts recovery immediately.
    pub async fn connect(&self) -> Result<(), ClientError> {
        self.request(Command::Connect).await
    }

    /// Close the session and cancel any pending reconnect. The only way to
    /// stop automatic recovery.
    pub async fn disconnect(&self) -> Result<(), ClientError> {
        self.request(Command::Disconnect).await
    }

    /// Manual override: force-close, reset the attempt counter and re-open
    /// after the configured manual delay. Works from any state.
    pub async fn reconnect(&self) -> Result<(), ClientError> {
        self.request(Command::Reconnect).await
    }

    /// Send a `chat` frame. Fails with [`ClientError::NotConnected`] and
    /// transmits nothing unless the session is connected.
    pub async fn send_chat_message(
        &self,
        message: impl Into<String>,
        context: impl Into<String>,
    ) -> Result<(), ClientError> {
        self.send(OutboundMessage::chat(message, context)).await
    }

    /// Send a `ui_update` frame. Same delivery rules as chat messages.
    pub async fn request_ui_update(&self, context: impl Into<String>) -> Result<(), ClientError> {
        self.send(OutboundMessage::ui_update(context)).await
    }

    pub async fn send(&self, frame: OutboundMessage) -> Result<(), ClientError> {
        let (reply, rx) = oneshot::channel();
        self.commands
            .send(Command::Send { frame, reply })
            .map_err(|_| ClientError::Shutdown)?;
        rx.await.map_err(|_| ClientError::Shutdown)?
    }

    pub fn state(&self) -> ConnectionState {
        self.status.borrow().state
    }

    pub fn status(&self) -> SessionStatus {
        *self.status.borrow()
    }

    /// Receiver that observes every status change.
    pub fn watch_status(&self) -> watch::Receiver<SessionStatus> {
        self.status.clone()
    }

    pub fn dispatcher(&self) -> &Arc<EventDispatcher> {
        &self.dispatcher
    }

    /// Stop the actor and close the transport without emitting events.
    pub async fn shutdown(mut self) {
        self.shutdown.cancel();
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                error!(error = %e, "session task ended abnormally");
            }
        }
    }

    async fn request(&self, make: fn(oneshot::Sender<()>) -> Command) -> Result<(), ClientError> {
        let (ack, rx) = oneshot::channel();
        self.commands.send(make(ack)).map_err(|_| ClientError::Shutdown)?;
        rx.await.map_err(|_| ClientError::Shutdown)
    }
}

impl Drop for SessionClient {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

struct SessionActor {
    config: SessionConfig,
    connector: Arc<dyn Connector>,
    dispatcher: Arc<EventDispatcher>,
    state: ConnectionState,
    policy: ReconnectPolicy,
    transport: Option<TransportConnection>,
    /// Bumped for every dial; signals from older connections are dropped.
    generation: u64,
    reconnect_at: Option<Instant>,
    signals_tx: mpsc::UnboundedSender<SignalEnvelope>,
    status_tx: watch::Sender<SessionStatus>,
}

impl SessionActor {
    async fn run(
        mut self,
        mut commands: mpsc::UnboundedReceiver<Command>,
        mut signals: mpsc::UnboundedReceiver<SignalEnvelope>,
        shutdown: CancellationToken,
    ) {
        loop {
            let deadline = self.reconnect_at;
            tokio::select! {
                biased;
                () = shutdown.cancelled() => break,
                command = commands.recv() => match command {
                    Some(command) => self.handle_command(command),
                    None => break,
                },
                Some(envelope) = signals.recv() => self.handle_signal(envelope),
                () = tokio::time::sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                    self.reconnect_at = None;
                    self.dial();
                }
            }
            self.publish_status();
        }

        self.close_transport();
        debug!(url = %self.config.url, "session actor stopped");
    }

    fn handle_command(&mut self, command: Command) {
        match command {
            Command::Connect(ack) => {
                self.connect();
                self.ack(ack);
            }
            Command::Disconnect(ack) => {
                self.disconnect();
                self.ack(ack);
            }
            Command::Reconnect(ack) => {
                self.manual_reconnect();
                self.ack(ack);
            }
            Command::Send { frame, reply } => {
                let _ = reply.send(self.send(&frame));
            }
        }
    }

    /// Status is published before the caller resumes.
    fn ack(&self, ack: oneshot::Sender<()>) {
        self.publish_status();
        let _ = ack.send(());
    }

    fn connect(&mut self) {
        match self.state {
            ConnectionState::Connecting
            | ConnectionState::Connected
            | ConnectionState::Reconnecting => {
                debug!(state = %self.state, "connect ignored");
            }
            ConnectionState::Disconnected => {
                self.state = ConnectionState::Connecting;
                self.dial();
            }
            ConnectionState::Failed => {
                info!("restarting recovery after exhaustion");
                self.policy.begin_manual();
                self.state = ConnectionState::Reconnecting;
                self.dial();
            }
        }
    }

    fn disconnect(&mut self) {
        self.reconnect_at = None;
        self.close_transport();
        self.policy.reset();
        if self.state == ConnectionState::Connected {
            self.emit(SessionEvent::Disconnected);
        }
        if self.state != ConnectionState::Disconnected {
            info!(url = %self.config.url, "disconnected");
        }
        self.state = ConnectionState::Disconnected;
    }

    fn manual_reconnect(&mut self) {
        self.close_transport();
        if self.state == ConnectionState::Connected {
            self.emit(SessionEvent::Disconnected);
        }
        self.policy.begin_manual();
        self.state = ConnectionState::Reconnecting;
        let delay = self.config.manual_reconnect_delay;
        self.reconnect_at = Some(Instant::now() + delay);
        info!(delay_ms = delay.as_millis() as u64, "manual reconnect scheduled");
    }

    fn send(&mut self, frame: &OutboundMessage) -> Result<(), ClientError> {
        let message_type = frame.message_type();
        let transport = match (&self.transport, self.state) {
            (Some(transport), ConnectionState::Connected) => transport,
            _ => {
                warn!(message_type, state = %self.state, "not connected, message not sent");
                return Err(ClientError::NotConnected {
                    state: self.state,
                    message_type,
                });
            }
        };
        let text = frame.to_json()?;
        transport.send(text)?;
        debug!(message_type, "frame sent");
        Ok(())
    }

    fn dial(&mut self) {
        self.close_transport();
        self.generation += 1;
        debug!(
            url = %self.config.url,
            generation = self.generation,
            attempt = self.policy.attempts(),
            "dialing"
        );
        self.transport = Some(TransportConnection::open(
            Arc::clone(&self.connector),
            self.config.url.clone(),
            self.generation,
            self.signals_tx.clone(),
        ));
    }

    fn close_transport(&mut self) {
        if let Some(transport) = self.transport.take() {
            transport.close();
        }
    }

    fn handle_signal(&mut self, envelope: SignalEnvelope) {
        let live = self
            .transport
            .as_ref()
            .is_some_and(|t| t.generation() == envelope.generation);
        if !live {
            debug!(generation = envelope.generation, "dropping signal from closed connection");
            return;
        }

        match envelope.signal {
            TransportSignal::Opened => {
                self.policy.on_connected();
                self.state = ConnectionState::Connected;
                info!(url = %self.config.url, "connected");
                self.emit(SessionEvent::Connected);
            }
            TransportSignal::Message(raw) => match InboundMessage::parse(&raw) {
                Ok(message) => self.emit(SessionEvent::Message(message)),
                Err(e) => {
                    warn!(error = %e, kind = e.error_kind(), "dropping malformed frame");
                }
            },
            TransportSignal::Error(e) => {
                warn!(error = %e, "transport error");
                self.emit(SessionEvent::Error(e));
            }
            TransportSignal::Closed => self.on_unexpected_close(),
        }
    }

    fn on_unexpected_close(&mut self) {
        self.transport = None;
        if self.state == ConnectionState::Connected {
            self.emit(SessionEvent::Disconnected);
        }

        match self.policy.on_unexpected_close() {
            ReconnectDecision::Retry { attempt, delay } => {
                self.state = ConnectionState::Reconnecting;
                self.reconnect_at = Some(Instant::now() + delay);
                info!(
                    attempt,
                    max_attempts = self.policy.max_attempts(),
                    delay_ms = delay.as_millis() as u64,
                    "reconnect scheduled"
                );
            }
            ReconnectDecision::Exhausted { attempts } => {
                self.state = ConnectionState::Failed;
                error!(attempts, "maximum reconnection attempts reached");
                self.emit(SessionEvent::ReconnectExhausted { attempts });
            }
            ReconnectDecision::Halted => {
                self.state = ConnectionState::Failed;
            }
        }
    }

    fn emit(&self, event: SessionEvent) {
        let _ = self.dispatcher.publish(event.name(), &event);
    }

    fn publish_status(&self) {
        let next = SessionStatus {
            state: self.state,
            reconnect_attempts: self.policy.attempts(),
        };
        let _ = self.status_tx.send_if_modified(|current| {
            if *current == next {
                false
            } else {
                *current = next;
                true
            }
        });
    }
}
