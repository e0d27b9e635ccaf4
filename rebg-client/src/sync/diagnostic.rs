//! Diagnostic events
//!
//! Local failures never reach subscribers as errors. They are logged and
//! broadcast here for consumers that want to surface them.

use std::fmt;
use std::time::Duration;

use crate::connection::CloseReason;

/// A recovered failure or connection lifecycle notice
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Diagnostic {
    /// An inbound message was not a JSON object and was dropped
    MalformedFrame { error: String },
    /// One field of a frame had the wrong shape and was skipped
    FieldRejected { error: String },
    /// Handshake failed
    ConnectFailed { reason: String },
    /// An established connection ended unexpectedly
    ConnectionLost { reason: String },
    /// A reconnect is scheduled
    RetryScheduled { attempt: u32, delay: Duration },
    /// Reconnect policy gave up; no further automatic attempts
    RetriesExhausted { attempts: u32 },
}

impl Diagnostic {
    pub(crate) fn from_close(reason: &CloseReason) -> Self {
        match reason {
            CloseReason::ConnectFailed(e) => Diagnostic::ConnectFailed { reason: e.clone() },
            other => Diagnostic::ConnectionLost {
                reason: other.to_string(),
            },
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Diagnostic::MalformedFrame { error } => write!(f, "dropped malformed frame: {}", error),
            Diagnostic::FieldRejected { error } => write!(f, "skipped field: {}", error),
            Diagnostic::ConnectFailed { reason } => write!(f, "connect failed: {}", reason),
            Diagnostic::ConnectionLost { reason } => write!(f, "connection lost: {}", reason),
            Diagnostic::RetryScheduled { attempt, delay } => {
                write!(f, "reconnect attempt {} in {:?}", attempt, delay)
            }
            Diagnostic::RetriesExhausted { attempts } => {
                write!(f, "giving up after {} reconnect attempts", attempts)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_close() {
        assert_eq!(
            Diagnostic::from_close(&CloseReason::ConnectFailed("refused".into())),
            Diagnostic::ConnectFailed {
                reason: "refused".into()
            }
        );
        assert_eq!(
            Diagnostic::from_close(&CloseReason::Remote(None)),
            Diagnostic::ConnectionLost {
                reason: "closed by peer".into()
            }
        );
    }

    #[test]
    fn test_display() {
        let d = Diagnostic::RetryScheduled {
            attempt: 2,
            delay: Duration::from_millis(200),
        };
        assert_eq!(d.to_string(), "reconnect attempt 2 in 200ms");
        assert_eq!(
            Diagnostic::RetriesExhausted { attempts: 5 }.to_string(),
            "giving up after 5 reconnect attempts"
        );
    }
}
