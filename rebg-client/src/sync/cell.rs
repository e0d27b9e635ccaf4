//! Observable state cells
//!
//! A cell holds the latest value for one category and a list of observers.
//! Every observer receives the value current at the time it registered,
//! followed by every later update in order.

use std::sync::Arc;

use parking_lot::Mutex;
use rebg_protocol::{Field, FieldError, Frame};
use serde_json::Value;
use tokio::sync::mpsc;

/// Value of a field cell: `None` until the first frame carrying the field
pub type FieldValue = Option<Arc<Value>>;

struct CellInner<T> {
    value: T,
    observers: Vec<mpsc::UnboundedSender<T>>,
}

/// Named holder of the latest value, with push notification
pub struct StateCell<T> {
    name: &'static str,
    inner: Mutex<CellInner<T>>,
}

impl<T: Clone> StateCell<T> {
    pub fn new(name: &'static str, initial: T) -> Self {
        Self {
            name,
            inner: Mutex::new(CellInner {
                value: initial,
                observers: Vec::new(),
            }),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Current value, without registering interest
    pub fn get(&self) -> T {
        self.inner.lock().value.clone()
    }

    /// Replace the value and notify every live observer
    pub(crate) fn set(&self, value: T) {
        let mut inner = self.inner.lock();
        inner.value = value.clone();
        inner.observers.retain(|tx| tx.send(value.clone()).is_ok());
    }

    /// Register an observer; the receiver yields the current value first
    pub(crate) fn observe(&self) -> mpsc::UnboundedReceiver<T> {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut inner = self.inner.lock();
        // Cannot fail, the receiver is still in hand
        let _ = tx.send(inner.value.clone());
        inner.observers.push(tx);
        rx
    }

    /// Observers whose receiver is still alive
    pub fn observer_count(&self) -> usize {
        let mut inner = self.inner.lock();
        inner.observers.retain(|tx| !tx.is_closed());
        inner.observers.len()
    }

    /// Drop every observer so their receivers end after draining
    pub(crate) fn release_observers(&self) {
        self.inner.lock().observers.clear();
    }
}

impl<T: Clone + PartialEq> StateCell<T> {
    /// Like `set`, but observers are only notified on an actual change
    pub(crate) fn set_if_changed(&self, value: T) -> bool {
        if self.inner.lock().value == value {
            return false;
        }
        self.set(value);
        true
    }
}

/// Result of routing one frame into the cells
#[derive(Debug, Default)]
pub struct FrameOutcome {
    /// Cells that received a new value
    pub updated: Vec<Field>,
    /// Fields skipped because their value had the wrong shape
    pub rejected: Vec<FieldError>,
}

/// The five field cells plus the connectivity flag
pub struct Cells {
    steps: Arc<StateCell<FieldValue>>,
    registers: Arc<StateCell<FieldValue>>,
    mem_ops: Arc<StateCell<FieldValue>>,
    memory: Arc<StateCell<FieldValue>>,
    strace: Arc<StateCell<FieldValue>>,
    connectivity: Arc<StateCell<bool>>,
}

impl Cells {
    pub fn new() -> Self {
        Self {
            steps: Arc::new(StateCell::new("steps", None)),
            registers: Arc::new(StateCell::new("registers", None)),
            mem_ops: Arc::new(StateCell::new("mem_ops", None)),
            memory: Arc::new(StateCell::new("memory", None)),
            strace: Arc::new(StateCell::new("strace", None)),
            connectivity: Arc::new(StateCell::new("connectivity", false)),
        }
    }

    pub fn field(&self, field: Field) -> &Arc<StateCell<FieldValue>> {
        match field {
            Field::Steps => &self.steps,
            Field::Registers => &self.registers,
            Field::MemOps => &self.mem_ops,
            Field::Memory => &self.memory,
            Field::Strace => &self.strace,
        }
    }

    pub fn connectivity(&self) -> &Arc<StateCell<bool>> {
        &self.connectivity
    }

    /// Route every recognized field of `frame` into its cell
    ///
    /// Fields are independent: a rejected field never blocks its siblings,
    /// and cells whose field is absent keep their value.
    pub fn apply(&self, frame: Frame) -> FrameOutcome {
        let mut outcome = FrameOutcome::default();

        for (field, value) in frame.into_fields() {
            match field.check(&value) {
                Ok(()) => {
                    self.field(field).set(Some(Arc::new(value)));
                    outcome.updated.push(field);
                }
                Err(e) => outcome.rejected.push(e),
            }
        }

        outcome
    }

    /// Return every field cell to unset. Connectivity is left alone.
    pub fn clear(&self) {
        for field in Field::ALL {
            let cell = self.field(field);
            if cell.get().is_some() {
                cell.set(None);
            }
        }
    }
}

impl Cells {
    /// End every observer stream, connectivity included
    pub(crate) fn release_observers(&self) {
        for field in Field::ALL {
            self.field(field).release_observers();
        }
        self.connectivity.release_observers();
    }
}

impl Default for Cells {
    fn default() -> Self {
        Self::new()
    }
}
