//! State synchronizer task
//!
//! A single task owns the transport session and the outbound queue, and
//! routes every frame into the cells. Consumer requests arrive as `Control`
//! messages and transport activity as `TransportEvent`s, so all
//! synchronizer logic runs sequentially on one task. The only cell write
//! made elsewhere is the reset when the last lease is released.

use std::sync::Arc;

use rebg_protocol::CommandPayload;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::time::Instant;

use super::cell::{Cells, StateCell};
use super::diagnostic::Diagnostic;
use super::lease::Leases;
use super::queue::OutboundQueue;
use crate::connection::{
    Backoff, ConnectionState, RetryPolicy, SessionEvent, TransportEvent, TransportSession,
};

/// Lifecycle of a synchronization context
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncPhase {
    /// No connection wanted, or the reconnect policy gave up
    Idle,
    /// Waiting for a handshake or for a scheduled reconnect
    Activating,
    /// Handshake done, outbound queue being flushed
    Draining,
    /// Connected with an empty backlog
    Live,
}

/// Requests from context handles to the synchronizer task
#[derive(Debug)]
pub(crate) enum Control {
    /// Lease count went from 0 to 1, starting the given epoch
    Activate(u64),
    /// Another lease was taken while some were already held
    Interest,
    /// Lease count went from 1 to 0
    Deactivate,
    Send(CommandPayload),
    Reconnect,
    Shutdown(oneshot::Sender<()>),
}

pub(crate) struct Synchronizer {
    cells: Arc<Cells>,
    session: TransportSession,
    queue: OutboundQueue,
    backoff: Backoff,
    phase: Arc<StateCell<SyncPhase>>,
    diagnostics: broadcast::Sender<Diagnostic>,
    leases: Arc<Leases>,
    retry_at: Option<Instant>,
    /// At least one lease is held
    active: bool,
    /// Lease epoch of the current activation
    epoch: u64,
}

impl Synchronizer {
    pub(crate) fn new(
        cells: Arc<Cells>,
        session: TransportSession,
        policy: RetryPolicy,
        phase: Arc<StateCell<SyncPhase>>,
        diagnostics: broadcast::Sender<Diagnostic>,
        leases: Arc<Leases>,
    ) -> Self {
        Self {
            cells,
            session,
            queue: OutboundQueue::new(),
            backoff: Backoff::new(policy),
            phase,
            diagnostics,
            leases,
            retry_at: None,
            active: false,
            epoch: 0,
        }
    }

    /// Process control messages and transport events until shutdown
    pub(crate) async fn run(
        mut self,
        mut control: mpsc::UnboundedReceiver<Control>,
        mut events: mpsc::UnboundedReceiver<TransportEvent>,
    ) {
        loop {
            let retry_at = self.retry_at;

            tokio::select! {
                ctrl = control.recv() => match ctrl {
                    Some(ctrl) => {
                        if !self.handle_control(ctrl) {
                            break;
                        }
                    }
                    None => {
                        // Every context handle and subscription is gone
                        self.stop();
                        break;
                    }
                },

                Some(event) = events.recv() => {
                    if let Some(event) = self.session.accept(event) {
                        self.handle_session_event(event);
                    }
                }

                _ = sleep_until(retry_at) => self.retry_due(),
            }
        }

        tracing::debug!("Synchronizer stopped");
    }

    /// Returns false once the task should exit
    fn handle_control(&mut self, ctrl: Control) -> bool {
        match ctrl {
            Control::Activate(epoch) => {
                self.active = true;
                self.epoch = epoch;
                self.backoff.reset();
                self.open();
            }
            Control::Interest => {
                // A fatal close leaves leases held but nothing connecting
                if self.active
                    && self.retry_at.is_none()
                    && self.session.state() == ConnectionState::Disconnected
                {
                    tracing::debug!("New subscriber on a closed transport, reopening");
                    self.open();
                }
            }
            Control::Deactivate => self.deactivate(),
            Control::Send(payload) => self.enqueue_send(payload),
            Control::Reconnect => {
                if self.active {
                    self.backoff.reset();
                    self.open();
                }
            }
            Control::Shutdown(ack) => {
                self.stop();
                let _ = ack.send(());
                return false;
            }
        }
        true
    }

    fn handle_session_event(&mut self, event: SessionEvent) {
        match event {
            SessionEvent::Open => {
                self.backoff.reset();
                self.set_phase(SyncPhase::Draining);

                let session = &mut self.session;
                let delivered = self.queue.drain_into(|p| session.send(p));
                if delivered > 0 {
                    tracing::debug!(delivered, "Flushed outbound queue");
                }

                self.set_phase(SyncPhase::Live);
            }
            SessionEvent::Frame(frame) => {
                if frame.is_empty() {
                    let keys: Vec<_> = frame.unrecognized_keys().collect();
                    tracing::debug!(?keys, "Frame carries no recognized field");
                    return;
                }

                let cells = &self.cells;
                let Some(outcome) = self.leases.while_held(self.epoch, || cells.apply(frame))
                else {
                    tracing::trace!(epoch = self.epoch, "Dropping frame from a released lease");
                    return;
                };
                tracing::trace!(updated = ?outcome.updated, "Applied frame");

                for error in outcome.rejected {
                    self.emit(Diagnostic::FieldRejected {
                        error: error.to_string(),
                    });
                }
            }
            SessionEvent::Malformed(error) => {
                self.emit(Diagnostic::MalformedFrame {
                    error: error.to_string(),
                });
            }
            SessionEvent::Closed(reason) => {
                let unsent = self.session.take_unsent();
                if !unsent.is_empty() {
                    tracing::debug!(requeued = unsent.len(), "Requeued unsent payloads");
                    self.queue.requeue_front(unsent);
                }
                self.emit(Diagnostic::from_close(&reason));
                self.schedule_retry();
            }
        }
    }

    /// Forward to the session, or queue behind anything already waiting
    fn enqueue_send(&mut self, payload: CommandPayload) {
        if !self.queue.is_empty() {
            self.queue.push(payload);
            return;
        }

        if let Err(payload) = self.session.send(payload) {
            self.queue.push(payload);
            tracing::debug!(queued = self.queue.len(), "Not connected, payload queued");
        }
    }

    fn open(&mut self) {
        self.retry_at = None;
        self.session.open();
        if !self.session.is_connected() {
            self.set_phase(SyncPhase::Activating);
        }
    }

    fn schedule_retry(&mut self) {
        if !self.active {
            self.set_phase(SyncPhase::Idle);
            return;
        }

        match self.backoff.next_delay() {
            Some(delay) => {
                self.retry_at = Some(Instant::now() + delay);
                self.set_phase(SyncPhase::Activating);
                self.emit(Diagnostic::RetryScheduled {
                    attempt: self.backoff.attempt(),
                    delay,
                });
            }
            None => {
                self.retry_at = None;
                self.set_phase(SyncPhase::Idle);
                if *self.backoff.policy() != RetryPolicy::None {
                    self.emit(Diagnostic::RetriesExhausted {
                        attempts: self.backoff.attempt(),
                    });
                }
                tracing::warn!("Transport down, no further automatic attempts");
            }
        }
    }

    fn retry_due(&mut self) {
        self.retry_at = None;
        if self.active {
            self.open();
        }
    }

    /// Last lease released: drop the connection. The releasing lease has
    /// already reset the cells.
    fn deactivate(&mut self) {
        self.active = false;
        self.retry_at = None;
        self.backoff.reset();
        self.session.close();
        self.set_phase(SyncPhase::Idle);
        tracing::info!(queued = self.queue.len(), "No subscribers left, transport released");
    }

    fn stop(&mut self) {
        self.active = false;
        self.retry_at = None;
        self.session.close();
        self.set_phase(SyncPhase::Idle);
        self.cells.release_observers();
        self.phase.release_observers();
    }

    fn set_phase(&self, phase: SyncPhase) {
        if self.phase.set_if_changed(phase) {
            tracing::debug!(?phase, "Synchronizer phase changed");
        }
    }

    fn emit(&self, diagnostic: Diagnostic) {
        match &diagnostic {
            Diagnostic::RetryScheduled { .. } => tracing::info!("{}", diagnostic),
            _ => tracing::warn!("{}", diagnostic),
        }
        // No listeners is fine
        let _ = self.diagnostics.send(diagnostic);
    }
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
