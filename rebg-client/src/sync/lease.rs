//! Lease accounting
//!
//! Counts live interest in a context. Each 0 -> 1 transition starts a new
//! epoch; frames are only applied while the synchronizer's epoch is the
//! current one and at least one lease is held, so nothing from a released
//! connection can reach a cell after the last lease is gone.

use parking_lot::Mutex;

#[derive(Debug, Default)]
struct LeaseCount {
    count: usize,
    epoch: u64,
}

/// What `Leases::acquire` did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Acquired {
    /// First lease; a new epoch started
    First(u64),
    /// Someone already held a lease
    Additional,
}

#[derive(Debug, Default)]
pub(crate) struct Leases {
    inner: Mutex<LeaseCount>,
}

impl Leases {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn count(&self) -> usize {
        self.inner.lock().count
    }

    /// Take a lease and run `then` under the lock
    pub(crate) fn acquire(&self, then: impl FnOnce(Acquired)) {
        let mut inner = self.inner.lock();
        inner.count += 1;
        if inner.count == 1 {
            inner.epoch += 1;
            then(Acquired::First(inner.epoch));
        } else {
            then(Acquired::Additional);
        }
    }

    /// Drop a lease; `on_last` runs under the lock when none remain
    pub(crate) fn release(&self, on_last: impl FnOnce()) {
        let mut inner = self.inner.lock();
        if inner.count == 0 {
            return;
        }
        inner.count -= 1;
        if inner.count == 0 {
            on_last();
        }
    }

    /// Run `f` only while `epoch` is current and held
    ///
    /// Holding the lock across `f` keeps a concurrent last release from
    /// interleaving with it.
    pub(crate) fn while_held<R>(&self, epoch: u64, f: impl FnOnce() -> R) -> Option<R> {
        let inner = self.inner.lock();
        (inner.count > 0 && inner.epoch == epoch).then(f)
    }
}
