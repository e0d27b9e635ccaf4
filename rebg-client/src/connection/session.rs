//! Transport session for the trace backend
//!
//! Owns at most one WebSocket connection at a time. Socket I/O runs on a
//! spawned task that reports back through a channel of `TransportEvent`s;
//! the owner feeds those events to `TransportSession::accept`, which filters
//! out anything from a connection that has since been replaced or closed.

use std::sync::Arc;

use futures::{SinkExt, StreamExt};
use rebg_protocol::{CommandPayload, Frame};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;

use super::event::{CloseReason, SessionEvent, TransportEvent, TransportEventKind};
use crate::sync::StateCell;

/// Connection state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

/// Single-connection transport to the trace backend
pub struct TransportSession {
    /// WebSocket endpoint (ws:// or wss://)
    endpoint: String,
    /// Current state
    state: ConnectionState,
    /// Connectivity flag published to consumers
    connectivity: Arc<StateCell<bool>>,
    /// Sink for events from the I/O task
    events: mpsc::UnboundedSender<TransportEvent>,
    /// Channel for outgoing payloads, present while a connection exists
    outgoing: Option<mpsc::UnboundedSender<CommandPayload>>,
    /// Handle to the I/O task
    task_handle: Option<JoinHandle<()>>,
    /// Bumped on every `open()`; events from older connections are ignored
    generation: u64,
    /// Payloads handed back by the last connection that ended on its own
    unsent: Vec<CommandPayload>,
}

impl TransportSession {
    /// Create a session (not yet connected) and the receiver for its events
    pub(crate) fn new(
        endpoint: impl Into<String>,
        connectivity: Arc<StateCell<bool>>,
    ) -> (Self, mpsc::UnboundedReceiver<TransportEvent>) {
        let (events, events_rx) = mpsc::unbounded_channel();
        let session = Self {
            endpoint: endpoint.into(),
            state: ConnectionState::Disconnected,
            connectivity,
            events,
            outgoing: None,
            task_handle: None,
            generation: 0,
            unsent: Vec::new(),
        };
        (session, events_rx)
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn is_connected(&self) -> bool {
        self.state == ConnectionState::Connected
    }

    /// Start connecting. No-op while a connection is open or opening.
    pub fn open(&mut self) {
        if self.state != ConnectionState::Disconnected {
            return;
        }

        self.generation += 1;
        self.state = ConnectionState::Connecting;

        let (outgoing_tx, outgoing_rx) = mpsc::unbounded_channel();
        self.outgoing = Some(outgoing_tx);

        tracing::debug!(
            endpoint = %self.endpoint,
            generation = self.generation,
            "Opening transport"
        );

        let handle = tokio::spawn(Self::connection_task(
            self.endpoint.clone(),
            self.generation,
            outgoing_rx,
            self.events.clone(),
        ));
        self.task_handle = Some(handle);
    }

    /// Transmit if connected; otherwise hand the payload back for queuing
    pub fn send(&mut self, payload: CommandPayload) -> Result<(), CommandPayload> {
        if self.state != ConnectionState::Connected {
            return Err(payload);
        }

        match &self.outgoing {
            Some(tx) => tx.send(payload).map_err(|e| e.0),
            None => Err(payload),
        }
    }

    /// Tear down the connection. Returns false if there was nothing to close.
    pub fn close(&mut self) -> bool {
        if self.state == ConnectionState::Disconnected {
            return false;
        }

        if let Some(handle) = self.task_handle.take() {
            if self.state == ConnectionState::Connecting {
                handle.abort();
            }
            // Otherwise the task sends a close frame once `outgoing` drops
        }
        self.outgoing = None;
        self.state = ConnectionState::Disconnected;
        self.connectivity.set_if_changed(false);

        tracing::debug!(generation = self.generation, "Transport closed locally");
        true
    }

    /// Filter and apply an event from the I/O task
    pub(crate) fn accept(&mut self, event: TransportEvent) -> Option<SessionEvent> {
        if event.generation != self.generation || self.state == ConnectionState::Disconnected {
            tracing::trace!(
                generation = event.generation,
                current = self.generation,
                "Dropping stale transport event"
            );
            return None;
        }

        match event.kind {
            TransportEventKind::Opened => {
                self.state = ConnectionState::Connected;
                self.connectivity.set_if_changed(true);
                tracing::info!(endpoint = %self.endpoint, "Transport connected");
                Some(SessionEvent::Open)
            }
            TransportEventKind::Frame(frame) => Some(SessionEvent::Frame(frame)),
            TransportEventKind::Malformed(e) => Some(SessionEvent::Malformed(e)),
            TransportEventKind::Closed { reason, unsent } => {
                self.unsent.extend(unsent);
                self.task_handle = None;
                self.outgoing = None;
                self.state = ConnectionState::Disconnected;
                self.connectivity.set_if_changed(false);
                Some(SessionEvent::Closed(reason))
            }
        }
    }

    /// Payloads the last connection accepted but never wrote, oldest first
    pub(crate) fn take_unsent(&mut self) -> Vec<CommandPayload> {
        std::mem::take(&mut self.unsent)
    }

    /// Background task that handles the actual socket I/O
    async fn connection_task(
        endpoint: String,
        generation: u64,
        mut outgoing: mpsc::UnboundedReceiver<CommandPayload>,
        events: mpsc::UnboundedSender<TransportEvent>,
    ) {
        let emit = |kind| {
            // Receiver gone means the synchronizer has shut down
            let _ = events.send(TransportEvent { generation, kind });
        };

        let ws = match connect_async(endpoint.as_str()).await {
            Ok((ws, _response)) => ws,
            Err(e) => {
                emit(TransportEventKind::Closed {
                    reason: CloseReason::ConnectFailed(e.to_string()),
                    unsent: Vec::new(),
                });
                return;
            }
        };
        emit(TransportEventKind::Opened);

        let (mut sink, mut stream) = ws.split();
        let mut unsent = Vec::new();

        let reason = loop {
            tokio::select! {
                // Handle outgoing payloads
                msg = outgoing.recv() => match msg {
                    Some(payload) => {
                        if let Err(e) = sink.send(Message::text(payload.as_str().to_owned())).await {
                            tracing::error!("Failed to send payload: {}", e);
                            unsent.push(payload);
                            break CloseReason::Io(e.to_string());
                        }
                    }
                    None => {
                        let _ = sink.send(Message::Close(None)).await;
                        break CloseReason::Local;
                    }
                },

                // Handle incoming messages
                incoming = stream.next() => match incoming {
                    Some(Ok(Message::Text(text))) => {
                        emit(match Frame::parse(text.as_str()) {
                            Ok(frame) => TransportEventKind::Frame(frame),
                            Err(e) => TransportEventKind::Malformed(e),
                        });
                    }
                    Some(Ok(Message::Binary(data))) => {
                        emit(match Frame::from_slice(&data) {
                            Ok(frame) => TransportEventKind::Frame(frame),
                            Err(e) => TransportEventKind::Malformed(e),
                        });
                    }
                    Some(Ok(Message::Close(frame))) => {
                        break CloseReason::Remote(frame.map(|f| f.reason.as_str().to_owned()));
                    }
                    // Pings are answered by tungstenite
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        tracing::error!("Failed to receive message: {}", e);
                        break CloseReason::Io(e.to_string());
                    }
                    None => break CloseReason::Remote(None),
                },
            }
        };

        unsent.extend(drain_unsent(&mut outgoing));
        if !unsent.is_empty() {
            tracing::debug!(generation, unsent = unsent.len(), "Handing back unsent payloads");
        }

        tracing::debug!(generation, %reason, "Transport task exiting");
        emit(TransportEventKind::Closed { reason, unsent });
    }
}

/// Stop accepting payloads and collect whatever is still buffered
///
/// Once closed, `TransportSession::send` fails and hands payloads back to
/// the caller instead, so nothing is lost between here and the owner
/// seeing the close.
fn drain_unsent(outgoing: &mut mpsc::UnboundedReceiver<CommandPayload>) -> Vec<CommandPayload> {
    outgoing.close();
    let mut unsent = Vec::new();
    while let Ok(payload) = outgoing.try_recv() {
        unsent.push(payload);
    }
    unsent
}

impl Drop for TransportSession {
    fn drop(&mut self) {
        if let Some(handle) = self.task_handle.take() {
            if self.state == ConnectionState::Connecting {
                handle.abort();
            }
        }
    }
}
