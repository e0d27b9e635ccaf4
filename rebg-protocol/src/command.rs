//! Outbound command payloads
//!
//! The synchronizer treats outbound payloads as opaque text. `Command`
//! covers the requests the backend currently understands.

use serde::{Deserialize, Serialize};

/// Requests understood by the trace backend
///
/// Serialized externally tagged in snake_case, e.g. `{"registers": 42}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Command {
    /// Ask for the register and memory-op snapshot at a step index
    Registers(u64),
}

/// Opaque outbound payload, sent as one text message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandPayload(String);

impl CommandPayload {
    /// Wrap raw text without inspecting it
    pub fn from_text(text: impl Into<String>) -> Self {
        Self(text.into())
    }

    /// Text that goes on the wire
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consume the payload, returning the wire text
    pub fn into_text(self) -> String {
        self.0
    }
}

impl From<Command> for CommandPayload {
    fn from(command: Command) -> Self {
        Self::from(serde_json::to_value(command).unwrap_or_default())
    }
}

impl From<serde_json::Value> for CommandPayload {
    fn from(value: serde_json::Value) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for CommandPayload {
    fn from(text: String) -> Self {
        Self(text)
    }
}

impl From<&str> for CommandPayload {
    fn from(text: &str) -> Self {
        Self(text.to_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_registers_command_wire_format() {
        let payload = CommandPayload::from(Command::Registers(42));
        assert_eq!(payload.as_str(), r#"{"registers":42}"#);
    }

    #[test]
    fn test_command_deserialize() {
        let cmd: Command = serde_json::from_str(r#"{"registers": 7}"#).unwrap();
        assert_eq!(cmd, Command::Registers(7));
    }

    #[test]
    fn test_payload_from_value() {
        let payload = CommandPayload::from(json!({"step": 1}));
        assert_eq!(payload.as_str(), r#"{"step":1}"#);
    }

    #[test]
    fn test_payload_text_passes_through() {
        let payload = CommandPayload::from("not json at all");
        assert_eq!(payload.clone().into_text(), "not json at all");
        assert_eq!(payload, CommandPayload::from_text("not json at all"));
    }
}
