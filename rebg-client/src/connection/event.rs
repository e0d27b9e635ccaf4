//! Events emitted by the transport I/O task

use std::fmt;

use rebg_protocol::{CommandPayload, Frame, FrameError};

/// Why a connection ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CloseReason {
    /// Handshake never completed
    ConnectFailed(String),
    /// Peer sent a close frame or ended the stream
    Remote(Option<String>),
    /// Socket read or write failed
    Io(String),
    /// Closed by `TransportSession::close`
    Local,
}

impl fmt::Display for CloseReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CloseReason::ConnectFailed(e) => write!(f, "connect failed: {}", e),
            CloseReason::Remote(Some(reason)) => write!(f, "closed by peer: {}", reason),
            CloseReason::Remote(None) => f.write_str("closed by peer"),
            CloseReason::Io(e) => write!(f, "socket error: {}", e),
            CloseReason::Local => f.write_str("closed locally"),
        }
    }
}

/// Raw event from the I/O task, tagged with the connection generation
#[derive(Debug)]
pub(crate) struct TransportEvent {
    pub generation: u64,
    pub kind: TransportEventKind,
}

#[derive(Debug)]
pub(crate) enum TransportEventKind {
    Opened,
    Frame(Frame),
    Malformed(FrameError),
    /// Connection ended; `unsent` holds payloads accepted but never written
    Closed {
        reason: CloseReason,
        unsent: Vec<CommandPayload>,
    },
}

/// Event surfaced to the synchronizer once the session has accepted it
#[derive(Debug)]
pub enum SessionEvent {
    /// Handshake completed
    Open,
    /// A well-formed frame arrived
    Frame(Frame),
    /// A message could not be parsed and was dropped
    Malformed(FrameError),
    /// The connection ended without a local `close()`
    Closed(CloseReason),
}
