//! Synchronization context
//!
//! The consumer-facing handle. Subscribing to any cell takes a lease; the
//! first lease activates the transport and releasing the last one resets
//! the cells and tears the transport down.

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures::Stream;
use parking_lot::Mutex;
use rebg_protocol::{CommandPayload, Field};
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;

use super::cell::{Cells, FieldValue, StateCell};
use super::diagnostic::Diagnostic;
use super::driver::{Control, SyncPhase, Synchronizer};
use super::lease::{Acquired, Leases};
use crate::config::ClientConfig;
use crate::connection::TransportSession;

struct Shared {
    endpoint: String,
    cells: Arc<Cells>,
    phase: Arc<StateCell<SyncPhase>>,
    control: mpsc::UnboundedSender<Control>,
    diagnostics: broadcast::Sender<Diagnostic>,
    /// Live subscriptions across every cell and the connectivity flag
    leases: Arc<Leases>,
    driver: Mutex<Option<JoinHandle<()>>>,
}

impl Shared {
    fn control(&self, ctrl: Control) {
        if self.control.send(ctrl).is_err() {
            tracing::debug!("Synchronizer already stopped");
        }
    }
}

/// Process-wide handle to the live state published by the trace backend
///
/// Cloning is cheap and every clone shares the same connection and cells.
/// Must be created inside a tokio runtime.
#[derive(Clone)]
pub struct SynchronizationContext {
    shared: Arc<Shared>,
}

impl SynchronizationContext {
    /// Create a context for `config.endpoint`. No connection is made until
    /// the first subscription.
    pub fn new(config: &ClientConfig) -> Self {
        let cells = Arc::new(Cells::new());
        let phase = Arc::new(StateCell::new("phase", SyncPhase::Idle));
        let (diagnostics, _) = broadcast::channel(config.diagnostics_capacity.max(1));
        let (control, control_rx) = mpsc::unbounded_channel();
        let leases = Arc::new(Leases::new());

        let (session, events) =
            TransportSession::new(config.endpoint.clone(), cells.connectivity().clone());
        let synchronizer = Synchronizer::new(
            cells.clone(),
            session,
            config.retry.clone(),
            phase.clone(),
            diagnostics.clone(),
            leases.clone(),
        );
        let driver = tokio::spawn(synchronizer.run(control_rx, events));

        tracing::debug!(endpoint = %config.endpoint, "Synchronization context created");

        Self {
            shared: Arc::new(Shared {
                endpoint: config.endpoint.clone(),
                cells,
                phase,
                control,
                diagnostics,
                leases,
                driver: Mutex::new(Some(driver)),
            }),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.shared.endpoint
    }

    /// Subscribe to one field cell
    pub fn publish(&self, field: Field) -> Subscription<FieldValue> {
        self.subscribe(self.shared.cells.field(field).clone())
    }

    pub fn steps(&self) -> Subscription<FieldValue> {
        self.publish(Field::Steps)
    }

    pub fn registers(&self) -> Subscription<FieldValue> {
        self.publish(Field::Registers)
    }

    pub fn mem_ops(&self) -> Subscription<FieldValue> {
        self.publish(Field::MemOps)
    }

    pub fn memory(&self) -> Subscription<FieldValue> {
        self.publish(Field::Memory)
    }

    pub fn strace(&self) -> Subscription<FieldValue> {
        self.publish(Field::Strace)
    }

    /// Subscribe to the connectivity flag. Counts as interest like any cell.
    pub fn connectivity(&self) -> Subscription<bool> {
        self.subscribe(self.shared.cells.connectivity().clone())
    }

    /// Keep the transport active without observing anything
    pub fn lease(&self) -> Lease {
        Lease::acquire(self.shared.clone())
    }

    fn subscribe<T: Clone>(&self, cell: Arc<StateCell<T>>) -> Subscription<T> {
        let lease = Lease::acquire(self.shared.clone());
        let rx = cell.observe();
        Subscription {
            cell,
            rx,
            _lease: lease,
        }
    }

    /// Send a command now if connected, otherwise queue it until the next
    /// handshake. Queued payloads go out in enqueue order, once each.
    pub fn enqueue_send(&self, payload: impl Into<CommandPayload>) {
        self.shared.control(Control::Send(payload.into()));
    }

    /// Current value of a field, without activating anything
    pub fn peek(&self, field: Field) -> FieldValue {
        self.shared.cells.field(field).get()
    }

    pub fn is_connected(&self) -> bool {
        self.shared.cells.connectivity().get()
    }

    pub fn phase(&self) -> SyncPhase {
        self.shared.phase.get()
    }

    /// Every phase transition, starting with the current phase. Does not
    /// count as interest.
    pub fn phase_changes(&self) -> mpsc::UnboundedReceiver<SyncPhase> {
        self.shared.phase.observe()
    }

    /// Number of live subscriptions and leases
    pub fn subscriber_count(&self) -> usize {
        self.shared.leases.count()
    }

    /// Listen for recovered failures and reconnect notices
    pub fn diagnostics(&self) -> broadcast::Receiver<Diagnostic> {
        self.shared.diagnostics.subscribe()
    }

    /// Re-open after the reconnect policy gave up. Ignored while a
    /// connection exists or nobody is subscribed.
    pub fn reconnect(&self) {
        self.shared.control(Control::Reconnect);
    }

    /// Close the connection and stop the synchronizer task
    ///
    /// Subscriptions stay readable but receive no further updates.
    pub async fn shutdown(&self) {
        let (ack, done) = oneshot::channel();
        self.shared.control(Control::Shutdown(ack));
        let _ = done.await;

        let driver = self.shared.driver.lock().take();
        if let Some(driver) = driver {
            if let Err(e) = driver.await {
                tracing::warn!("Synchronizer task failed: {}", e);
            }
        }
    }
}

/// Interest in the context's cells
///
/// Every subscription holds one. Taken on its own it keeps the transport
/// up without buffering any updates.
pub struct Lease {
    shared: Arc<Shared>,
}

impl Lease {
    fn acquire(shared: Arc<Shared>) -> Self {
        // Sent under the lock so Activate/Deactivate arrive in count order
        shared.leases.acquire(|acquired| match acquired {
            Acquired::First(epoch) => shared.control(Control::Activate(epoch)),
            Acquired::Additional => shared.control(Control::Interest),
        });
        Self { shared }
    }
}

impl Drop for Lease {
    fn drop(&mut self) {
        let shared = &self.shared;
        shared.leases.release(|| {
            // Reset before anyone can subscribe again
            shared.cells.clear();
            shared.control(Control::Deactivate);
        });
    }
}

/// Live view of one cell
///
/// Yields the value current at subscription time, then every update in
/// order. Updates buffer until received, so a subscription that is never
/// polled grows without bound; use `SynchronizationContext::lease` to only
/// keep the transport up. Dropping it releases its lease.
pub struct Subscription<T> {
    cell: Arc<StateCell<T>>,
    rx: mpsc::UnboundedReceiver<T>,
    _lease: Lease,
}

impl<T: Clone> Subscription<T> {
    pub fn name(&self) -> &'static str {
        self.cell.name()
    }

    /// Latest value held by the cell, regardless of what has been received
    pub fn current(&self) -> T {
        self.cell.get()
    }

    /// Wait for the next value. `None` once the context has shut down
    /// and the cell can no longer change.
    pub async fn recv(&mut self) -> Option<T> {
        self.rx.recv().await
    }

    /// Next value if one is already waiting
    pub fn try_recv(&mut self) -> Option<T> {
        self.rx.try_recv().ok()
    }
}

impl<T> Stream for Subscription<T> {
    type Item = T;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<T>> {
        self.rx.poll_recv(cx)
    }
}
