//! One socket-like connection and the seam used to dial it.
//!
//! A [`TransportConnection`] runs its socket on a spawned task and reports
//! lifecycle through [`TransportSignal`]s tagged with the connection's
//! generation. Closing a connection silences it: no signal is emitted after
//! [`TransportConnection::close`] returns.

use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::{future, Sink, SinkExt, Stream, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use crate::errors::TransportError;

pub type FrameSink = Pin<Box<dyn Sink<String, Error = TransportError> + Send>>;
pub type FrameStream = Pin<Box<dyn Stream<Item = Result<String, TransportError>> + Send>>;

const CLOSE_GRACE: Duration = Duration::from_secs(1);

/// Dials the backend and yields a text-frame sink/stream pair.
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    async fn connect(&self, url: &str) -> Result<(FrameSink, FrameStream), TransportError>;
}

/// WebSocket connector over `tokio-tungstenite`.
#[derive(Clone, Copy, Debug, Default)]
pub struct WsConnector;

#[async_trait]
impl Connector for WsConnector {
    async fn connect(&self, url: &str) -> Result<(FrameSink, FrameStream), TransportError> {
        let (ws, _response) = connect_async(url)
            .await
            .map_err(|e| TransportError::Connect(e.to_string()))?;
        let (ws_tx, ws_rx) = ws.split();

        let sink = ws_tx
            .sink_map_err(TransportError::from)
            .with(|text: String| future::ready(Ok::<_, TransportError>(Message::text(text))));

        let stream = ws_rx.filter_map(|frame| {
            future::ready(match frame {
                Ok(Message::Text(text)) => Some(Ok(text.as_str().to_owned())),
                // Binary frames go through the same JSON decode; junk fails there.
                Ok(Message::Binary(bytes)) => Some(Ok(String::from_utf8_lossy(&bytes).into_owned())),
                Ok(Message::Close(_) | Message::Ping(_) | Message::Pong(_) | Message::Frame(_)) => None,
                Err(e) => Some(Err(TransportError::from(e))),
            })
        });

        Ok((Box::pin(sink), Box::pin(stream)))
    }
}

/// Lifecycle and data reported by a connection to its owner.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TransportSignal {
    Opened,
    Message(String),
    Error(TransportError),
    Closed,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SignalEnvelope {
    pub generation: u64,
    pub signal: TransportSignal,
}

#[derive(Clone)]
struct SignalTx {
    generation: u64,
    tx: mpsc::UnboundedSender<SignalEnvelope>,
    silenced: Arc<AtomicBool>,
}

impl SignalTx {
    fn emit(&self, signal: TransportSignal) {
        if self.silenced.load(Ordering::Acquire) {
            return;
        }
        let _ = self.tx.send(SignalEnvelope {
            generation: self.generation,
            signal,
        });
    }
}

/// Handle to one live connection attempt.
pub struct TransportConnection {
    generation: u64,
    outbound: mpsc::UnboundedSender<String>,
    open: Arc<AtomicBool>,
    silenced: Arc<AtomicBool>,
    cancel: CancellationToken,
}

impl TransportConnection {
    /// Start dialing `url`. Signals arrive on `signals` tagged with
    /// `generation`. Must be called from within a Tokio runtime.
    pub fn open(
        connector: Arc<dyn Connector>,
        url: String,
        generation: u64,
        signals: mpsc::UnboundedSender<SignalEnvelope>,
    ) -> Self {
        let (outbound, outbound_rx) = mpsc::unbounded_channel();
        let open = Arc::new(AtomicBool::new(false));
        let silenced = Arc::new(AtomicBool::new(false));
        let cancel = CancellationToken::new();

        let tx = SignalTx {
            generation,
            tx: signals,
            silenced: Arc::clone(&silenced),
        };
        let _handle = tokio::spawn(run_connection(
            connector,
            url,
            tx,
            outbound_rx,
            Arc::clone(&open),
            cancel.clone(),
        ));

        Self {
            generation,
            outbound,
            open,
            silenced,
            cancel,
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::Acquire)
    }

    /// Queue a text frame. Refused (and logged) unless the socket is open.
    pub fn send(&self, text: String) -> Result<(), TransportError> {
        if !self.is_open() {
            warn!(generation = self.generation, "transport not open, frame not sent");
            return Err(TransportError::NotOpen);
        }
        self.outbound.send(text).map_err(|_| TransportError::Closed)
    }

    /// Close the connection. Nothing is reported from it afterwards.
    pub fn close(self) {
        drop(self);
    }
}

impl Drop for TransportConnection {
    fn drop(&mut self) {
        self.silenced.store(true, Ordering::Release);
        self.open.store(false, Ordering::Release);
        self.cancel.cancel();
    }
}

async fn run_connection(
    connector: Arc<dyn Connector>,
    url: String,
    signals: SignalTx,
    mut outbound: mpsc::UnboundedReceiver<String>,
    open: Arc<AtomicBool>,
    cancel: CancellationToken,
) {
    let dialed = tokio::select! {
        () = cancel.cancelled() => {
            trace!(generation = signals.generation, "dial cancelled");
            return;
        }
        result = connector.connect(&url) => result,
    };

    let (mut sink, mut stream) = match dialed {
        Ok(pair) => pair,
        Err(e) => {
            debug!(generation = signals.generation, error = %e, "dial failed");
            signals.emit(TransportSignal::Error(e));
            signals.emit(TransportSignal::Closed);
            return;
        }
    };

    open.store(true, Ordering::Release);
    signals.emit(TransportSignal::Opened);

    loop {
        tokio::select! {
            () = cancel.cancelled() => break,
            frame = outbound.recv() => match frame {
                Some(text) => {
                    if let Err(e) = sink.send(text).await {
                        signals.emit(TransportSignal::Error(e));
                        break;
                    }
                }
                None => break,
            },
            incoming = stream.next() => match incoming {
                Some(Ok(text)) => signals.emit(TransportSignal::Message(text)),
                Some(Err(e)) => {
                    signals.emit(TransportSignal::Error(e));
                    break;
                }
                None => break,
            },
        }
    }

    open.store(false, Ordering::Release);
    let _ = tokio::time::timeout(CLOSE_GRACE, sink.close()).await;
    signals.emit(TransportSignal::Closed);
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::channel::mpsc as fmpsc;
    use parking_lot::Mutex;

    /// Connector that hands the server end of an in-memory pipe to the test.
    struct PipeConnector {
        peer: Mutex<Option<PipePeer>>,
        fail: bool,
    }

    struct PipePeer {
        to_client: fmpsc::UnboundedSender<Result<String, TransportError>>,
        from_client: fmpsc::UnboundedReceiver<String>,
    }

    impl PipeConnector {
        fn new(fail: bool) -> Arc<Self> {
            Arc::new(Self {
                peer: Mutex::new(None),
                fail,
            })
        }
    }

    #[async_trait]
    impl Connector for PipeConnector {
        async fn connect(&self, _url: &str) -> Result<(FrameSink, FrameStream), TransportError> {
            if self.fail {
                return Err(TransportError::Connect("refused".into()));
            }
            let (to_client, client_rx) = fmpsc::unbounded();
            let (client_tx, from_client) = fmpsc::unbounded::<String>();
            *self.peer.lock() = Some(PipePeer {
                to_client,
                from_client,
            });
            let sink = client_tx.sink_map_err(|_| TransportError::Closed);
            Ok((Box::pin(sink), Box::pin(client_rx)))
        }
    }

    async fn next_signal(rx: &mut mpsc::UnboundedReceiver<SignalEnvelope>) -> TransportSignal {
        tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("signal in time")
            .expect("channel open")
            .signal
    }

    #[tokio::test]
    async fn opens_receives_and_sends() {
        let connector = PipeConnector::new(false);
        let (tx, mut rx) = mpsc::unbounded_channel();
        let conn = TransportConnection::open(connector.clone(), "mem://".into(), 7, tx);

        assert_eq!(next_signal(&mut rx).await, TransportSignal::Opened);
        assert!(conn.is_open());

        let mut peer = connector.peer.lock().take().unwrap();
        peer.to_client.unbounded_send(Ok("{\"type\":\"x\"}".into())).unwrap();
        assert_eq!(
            next_signal(&mut rx).await,
            TransportSignal::Message("{\"type\":\"x\"}".into())
        );

        conn.send("hello".into()).unwrap();
        assert_eq!(peer.from_client.next().await.as_deref(), Some("hello"));
    }

    #[tokio::test]
    async fn failed_dial_reports_error_then_closed() {
        let connector = PipeConnector::new(true);
        let (tx, mut rx) = mpsc::unbounded_channel();
        let conn = TransportConnection::open(connector, "mem://".into(), 1, tx);

        assert!(matches!(next_signal(&mut rx).await, TransportSignal::Error(_)));
        assert_eq!(next_signal(&mut rx).await, TransportSignal::Closed);
        assert_eq!(conn.send("x".into()), Err(TransportError::NotOpen));
    }

    #[tokio::test]
    async fn remote_close_reports_closed() {
        let connector = PipeConnector::new(false);
        let (tx, mut rx) = mpsc::unbounded_channel();
        let _conn = TransportConnection::open(connector.clone(), "mem://".into(), 1, tx);
        assert_eq!(next_signal(&mut rx).await, TransportSignal::Opened);

        drop(connector.peer.lock().take());
        assert_eq!(next_signal(&mut rx).await, TransportSignal::Closed);
    }

    #[tokio::test]
    async fn close_silences_connection() {
        let connector = PipeConnector::new(false);
        let (tx, mut rx) = mpsc::unbounded_channel();
        let conn = TransportConnection::open(connector.clone(), "mem://".into(), 3, tx);
        assert_eq!(next_signal(&mut rx).await, TransportSignal::Opened);

        let peer = connector.peer.lock().take().unwrap();
        conn.close();
        let _ = peer.to_client.unbounded_send(Ok("late".into()));
        drop(peer);

        let quiet = tokio::time::timeout(Duration::from_millis(100), rx.recv()).await;
        assert!(quiet.is_err() || quiet.unwrap().is_none());
    }

    #[tokio::test]
    async fn envelopes_carry_generation() {
        let connector = PipeConnector::new(false);
        let (tx, mut rx) = mpsc::unbounded_channel();
        let conn = TransportConnection::open(connector, "mem://".into(), 42, tx);
        let env = rx.recv().await.unwrap();
        assert_eq!(env.generation, 42);
        assert_eq!(conn.generation(), 42);
    }
}
