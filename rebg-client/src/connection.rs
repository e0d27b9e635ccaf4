//! Transport session management
//!
//! Provides the WebSocket connection to the trace backend, its event
//! contract, and the reconnect policy.

mod event;
mod retry;
mod session;

pub use event::{CloseReason, SessionEvent};
pub(crate) use event::TransportEvent;
pub use retry::{Backoff, RetryPolicy};
pub use session::{ConnectionState, TransportSession};
