//! Inbound frame parsing
//!
//! A frame is one text message from the backend: a JSON object mapping
//! field names to opaque payloads. Any subset of the recognized fields may
//! be present, and unknown keys are carried along but never routed.

use serde_json::{Map, Value};

use crate::field::{json_kind, Field};

/// Errors raised while parsing a raw message into a frame
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    #[error("frame is not valid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error("frame must be a JSON object, found {0}")]
    NotAnObject(&'static str),
}

/// One parsed inbound message
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Frame {
    entries: Map<String, Value>,
}

impl Frame {
    /// Parse a text message
    pub fn parse(raw: &str) -> Result<Self, FrameError> {
        Self::from_value(serde_json::from_str(raw)?)
    }

    /// Parse a binary message holding UTF-8 JSON
    pub fn from_slice(raw: &[u8]) -> Result<Self, FrameError> {
        Self::from_value(serde_json::from_slice(raw)?)
    }

    /// Wrap an already-decoded JSON value
    pub fn from_value(value: Value) -> Result<Self, FrameError> {
        match value {
            Value::Object(entries) => Ok(Self { entries }),
            other => Err(FrameError::NotAnObject(json_kind(&other))),
        }
    }

    /// Value carried for a recognized field, if present
    pub fn get(&self, field: Field) -> Option<&Value> {
        self.entries.get(field.wire_key())
    }

    /// Keys this client does not route
    pub fn unrecognized_keys(&self) -> impl Iterator<Item = &str> + '_ {
        self.entries
            .keys()
            .map(String::as_str)
            .filter(|k| Field::from_wire_key(k).is_none())
    }

    /// True when the frame carries no recognized field
    pub fn is_empty(&self) -> bool {
        !self.entries.keys().any(|k| Field::from_wire_key(k).is_some())
    }

    /// Consume the frame, keeping only recognized fields
    pub fn into_fields(self) -> Vec<(Field, Value)> {
        self.entries
            .into_iter()
            .filter_map(|(k, v)| Field::from_wire_key(&k).map(|f| (f, v)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_single_field() {
        let frame = Frame::parse(r#"{"registers": {"rax": 1}}"#).unwrap();
        assert_eq!(frame.get(Field::Registers), Some(&json!({"rax": 1})));
        assert_eq!(frame.get(Field::Steps), None);
        assert!(!frame.is_empty());
    }

    #[test]
    fn test_parse_multiple_fields() {
        let raw = r#"{"registers": {"idx": 3, "registers": []}, "mem_ops": {"r": [], "w": []}}"#;
        let frame = Frame::parse(raw).unwrap();

        let mut fields: Vec<_> = frame.into_fields().into_iter().map(|(f, _)| f).collect();
        fields.sort();
        assert_eq!(fields, vec![Field::Registers, Field::MemOps]);
    }

    #[test]
    fn test_empty_object_is_valid_frame() {
        let frame = Frame::parse("{}").unwrap();
        assert!(frame.is_empty());
        assert!(frame.into_fields().is_empty());
    }

    #[test]
    fn test_unknown_keys_are_kept_but_not_routed() {
        let frame = Frame::parse(r#"{"steps": [], "backtrace": [1, 2]}"#).unwrap();
        assert_eq!(frame.unrecognized_keys().collect::<Vec<_>>(), vec!["backtrace"]);

        let fields = frame.into_fields();
        assert_eq!(fields, vec![(Field::Steps, json!([]))]);
    }

    #[test]
    fn test_only_unknown_keys_is_empty() {
        let frame = Frame::parse(r#"{"future_field": true}"#).unwrap();
        assert!(frame.is_empty());
    }

    #[test]
    fn test_invalid_json() {
        let err = Frame::parse(r#"{"steps": ["#).unwrap_err();
        assert!(matches!(err, FrameError::InvalidJson(_)));
        assert!(err.to_string().starts_with("frame is not valid JSON"));
    }

    #[test]
    fn test_not_an_object() {
        let err = Frame::parse("[1, 2, 3]").unwrap_err();
        assert!(matches!(err, FrameError::NotAnObject("an array")));

        let err = Frame::parse("null").unwrap_err();
        assert_eq!(err.to_string(), "frame must be a JSON object, found null");
    }

    #[test]
    fn test_from_slice() {
        let frame = Frame::from_slice(br#"{"strace": [{"nr": 60}]}"#).unwrap();
        assert_eq!(frame.get(Field::Strace), Some(&json!([{"nr": 60}])));

        assert!(Frame::from_slice(&[0xff, 0xfe]).is_err());
    }
}
