//! rebg-client: live-state synchronization for the rebg trace viewer
//!
//! Keeps one WebSocket connection to the trace backend, demultiplexes each
//! inbound frame into independently observable cells and queues outbound
//! commands until the connection is ready. The connection is only opened
//! while at least one subscription is alive.

pub mod config;
pub mod connection;
pub mod sync;

pub use config::{ClientConfig, ConfigLoader};
pub use connection::{CloseReason, ConnectionState, RetryPolicy};
pub use sync::{Diagnostic, FieldValue, Lease, Subscription, SyncPhase, SynchronizationContext};
