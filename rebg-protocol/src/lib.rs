//! rebg-protocol: Wire definitions for the rebg trace backend
//!
//! This crate defines the inbound frame format (a JSON object carrying any
//! subset of the recognized snapshot fields), the outbound command payloads,
//! and typed views over the payloads the backend currently emits.

pub mod command;
pub mod field;
pub mod frame;
pub mod types;

// Re-export main types at crate root
pub use command::{Command, CommandPayload};
pub use field::{Field, FieldError};
pub use frame::{Frame, FrameError};
pub use types::{DecodeError, MemOp, MemOpsSnapshot, RegisterSnapshot, RegisterValue, StepEntry};

/// Endpoint the trace backend listens on by default
pub const DEFAULT_ENDPOINT: &str = "ws://localhost:9001";
