//! Typed views over the payloads the backend emits
//!
//! State cells hold opaque JSON. These helpers let a consumer decode the
//! current backend format when it wants structure; the synchronizer never
//! depends on them.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::field::Field;

/// A cell payload that does not match the typed view
#[derive(Debug, thiserror::Error)]
#[error("cannot decode '{field}' payload: {source}")]
pub struct DecodeError {
    pub field: Field,
    #[source]
    pub source: serde_json::Error,
}

fn decode<T: for<'de> Deserialize<'de>>(field: Field, value: &Value) -> Result<T, DecodeError> {
    T::deserialize(value).map_err(|source| DecodeError { field, source })
}

/// One entry of the `steps` timeline
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepEntry {
    /// Position in the trace
    #[serde(rename = "i")]
    pub index: u64,
    /// Program counter
    #[serde(rename = "a")]
    pub address: u64,
    /// Disassembly of the instruction
    #[serde(rename = "c")]
    pub disassembly: String,
    /// Backtrace depth
    #[serde(rename = "d")]
    pub depth: u64,
    /// Symbolized location, empty when unknown
    #[serde(rename = "s", default)]
    pub symbol: String,
}

impl StepEntry {
    /// Decode a whole `steps` payload
    pub fn decode_list(value: &Value) -> Result<Vec<StepEntry>, DecodeError> {
        decode(Field::Steps, value)
    }
}

/// `(name, value, modifiers)` triple; modifiers holds `r` and/or `w`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterValue(pub String, pub u64, pub String);

impl RegisterValue {
    pub fn name(&self) -> &str {
        &self.0
    }

    pub fn value(&self) -> u64 {
        self.1
    }

    /// Register was read by the instruction that produced this step
    pub fn is_read(&self) -> bool {
        self.2.contains('r')
    }

    /// Register was written by the instruction that produced this step
    pub fn is_written(&self) -> bool {
        self.2.contains('w')
    }
}

/// The `registers` payload answering a `Command::Registers` request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterSnapshot {
    /// Step index the snapshot belongs to
    pub idx: u64,
    pub registers: Vec<RegisterValue>,
}

impl RegisterSnapshot {
    pub fn decode(value: &Value) -> Result<Self, DecodeError> {
        decode(Field::Registers, value)
    }

    /// Look up a register by name
    pub fn get(&self, name: &str) -> Option<&RegisterValue> {
        self.registers.iter().find(|r| r.name() == name)
    }
}

/// One memory access; the value is absent when it did not fit in 64 bits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "(u64, Option<u64>)", into = "(u64, Option<u64>)")]
pub struct MemOp {
    pub address: u64,
    pub value: Option<u64>,
}

impl From<(u64, Option<u64>)> for MemOp {
    fn from((address, value): (u64, Option<u64>)) -> Self {
        Self { address, value }
    }
}

impl From<MemOp> for (u64, Option<u64>) {
    fn from(op: MemOp) -> Self {
        (op.address, op.value)
    }
}

/// The `mem_ops` payload, split into reads and writes
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemOpsSnapshot {
    #[serde(rename = "r", default)]
    pub reads: Vec<MemOp>,
    #[serde(rename = "w", default)]
    pub writes: Vec<MemOp>,
}

impl MemOpsSnapshot {
    pub fn decode(value: &Value) -> Result<Self, DecodeError> {
        decode(Field::MemOps, value)
    }
}
