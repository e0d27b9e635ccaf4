//! Recognized snapshot fields
//!
//! Each inbound frame is a JSON object whose top-level keys name the
//! snapshot category they carry. Only the keys listed here are routed to
//! state cells; everything else is ignored.

use std::fmt;

use serde_json::Value;

/// A recognized top-level frame key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Field {
    /// Ordered sequence of execution-step descriptors
    Steps,
    /// Register name to value mapping
    Registers,
    /// Memory-access descriptors
    MemOps,
    /// Raw memory snapshot
    Memory,
    /// System-call records
    Strace,
}

/// A field value that does not have the expected shape
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("field '{field}' expected {expected}, found {found}")]
pub struct FieldError {
    pub field: Field,
    pub expected: &'static str,
    pub found: &'static str,
}

impl Field {
    /// All recognized fields, in wire-key order
    pub const ALL: [Field; 5] = [
        Field::Steps,
        Field::Registers,
        Field::MemOps,
        Field::Memory,
        Field::Strace,
    ];

    /// The JSON key this field travels under
    pub fn wire_key(self) -> &'static str {
        match self {
            Field::Steps => "steps",
            Field::Registers => "registers",
            Field::MemOps => "mem_ops",
            Field::Memory => "memory",
            Field::Strace => "strace",
        }
    }

    /// Look up a field by its JSON key
    pub fn from_wire_key(key: &str) -> Option<Self> {
        match key {
            "steps" => Some(Field::Steps),
            "registers" => Some(Field::Registers),
            "mem_ops" => Some(Field::MemOps),
            "memory" => Some(Field::Memory),
            "strace" => Some(Field::Strace),
            _ => None,
        }
    }

    /// Coarse shape check for a value carried under this field
    ///
    /// `null` is never accepted, so a frame cannot reset a cell.
    pub fn check(self, value: &Value) -> Result<(), FieldError> {
        let accepted = match self {
            Field::Steps | Field::Strace => value.is_array(),
            Field::Registers => value.is_object(),
            Field::MemOps => value.is_array() || value.is_object(),
            Field::Memory => !value.is_null(),
        };

        if accepted {
            Ok(())
        } else {
            Err(FieldError {
                field: self,
                expected: self.expected_shape(),
                found: json_kind(value),
            })
        }
    }

    fn expected_shape(self) -> &'static str {
        match self {
            Field::Steps | Field::Strace => "an array",
            Field::Registers => "an object",
            Field::MemOps => "an array or object",
            Field::Memory => "a non-null value",
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.wire_key())
    }
}

/// Human-readable JSON type name
pub(crate) fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_wire_key_round_trip() {
        for field in Field::ALL {
            assert_eq!(Field::from_wire_key(field.wire_key()), Some(field));
        }
    }

    #[test]
    fn test_unknown_key() {
        assert_eq!(Field::from_wire_key("backtrace"), None);
        assert_eq!(Field::from_wire_key("memOps"), None);
        assert_eq!(Field::from_wire_key(""), None);
    }

    #[test]
    fn test_display_uses_wire_key() {
        assert_eq!(Field::MemOps.to_string(), "mem_ops");
        assert_eq!(Field::Strace.to_string(), "strace");
    }

    #[test]
    fn test_check_accepts_expected_shapes() {
        assert!(Field::Steps.check(&json!([])).is_ok());
        assert!(Field::Strace.check(&json!([{"nr": 1}])).is_ok());
        assert!(Field::Registers.check(&json!({"rax": 1})).is_ok());
        assert!(Field::MemOps.check(&json!([{"addr": 16, "read": true}])).is_ok());
        assert!(Field::MemOps.check(&json!({"r": [], "w": []})).is_ok());
        assert!(Field::Memory.check(&json!("00ff")).is_ok());
        assert!(Field::Memory.check(&json!({"base": 0, "bytes": []})).is_ok());
    }

    #[test]
    fn test_check_rejects_null_everywhere() {
        for field in Field::ALL {
            let err = field.check(&Value::Null).unwrap_err();
            assert_eq!(err.field, field);
            assert_eq!(err.found, "null");
        }
    }

    #[test]
    fn test_check_rejects_wrong_shape() {
        let err = Field::Registers.check(&json!([1, 2])).unwrap_err();
        assert_eq!(err.expected, "an object");
        assert_eq!(err.found, "an array");
        assert_eq!(
            err.to_string(),
            "field 'registers' expected an object, found an array"
        );

        assert!(Field::Steps.check(&json!("nope")).is_err());
        assert!(Field::MemOps.check(&json!(3)).is_err());
    }
}
