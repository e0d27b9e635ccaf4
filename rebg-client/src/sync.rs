//! State synchronization
//!
//! Demultiplexes inbound frames into independently observable cells and
//! queues outbound commands until the transport is ready.

mod cell;
mod context;
mod diagnostic;
mod driver;
mod lease;
mod queue;


pub use cell::{Cells, FieldValue, FrameOutcome, StateCell};
pub use context::{Lease, Subscription, SynchronizationContext};
pub use diagnostic::Diagnostic;
pub use driver::SyncPhase;
pub use queue::OutboundQueue;
