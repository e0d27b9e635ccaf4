//! Output lines for rebg-watch

use rebg_client::FieldValue;
use rebg_protocol::{DecodeError, Field, MemOp, MemOpsSnapshot, RegisterSnapshot, StepEntry};
use serde_json::{json, Map, Value};

/// One output line for a field update; unset values print as `null`
///
/// With `decode`, payloads the typed views understand are printed in their
/// decoded form. Payloads they reject are logged and printed raw.
pub fn field_line(field: Field, value: &FieldValue, decode: bool) -> Value {
    let value = match value.as_deref() {
        None => Value::Null,
        Some(raw) if decode => decoded(field, raw).unwrap_or_else(|e| {
            tracing::warn!("{}", e);
            raw.clone()
        }),
        Some(raw) => raw.clone(),
    };

    json!({ "field": field.wire_key(), "value": value })
}

fn decoded(field: Field, raw: &Value) -> Result<Value, DecodeError> {
    Ok(match field {
        Field::Steps => Value::Array(
            StepEntry::decode_list(raw)?
                .iter()
                .map(|step| {
                    json!({
                        "index": step.index,
                        "address": hex(step.address),
                        "disassembly": step.disassembly,
                        "depth": step.depth,
                        "symbol": step.symbol,
                    })
                })
                .collect(),
        ),
        Field::Registers => {
            let snapshot = RegisterSnapshot::decode(raw)?;
            let registers: Map<String, Value> = snapshot
                .registers
                .iter()
                .map(|reg| {
                    let view = json!({
                        "value": hex(reg.value()),
                        "read": reg.is_read(),
                        "written": reg.is_written(),
                    });
                    (reg.name().to_owned(), view)
                })
                .collect();
            json!({ "idx": snapshot.idx, "registers": registers })
        }
        Field::MemOps => {
            let ops = MemOpsSnapshot::decode(raw)?;
            json!({ "reads": mem_ops(&ops.reads), "writes": mem_ops(&ops.writes) })
        }
        Field::Memory | Field::Strace => raw.clone(),
    })
}

fn mem_ops(ops: &[MemOp]) -> Value {
    ops.iter()
        .map(|op| json!({ "address": hex(op.address), "value": op.value.map(hex) }))
        .collect()
}

fn hex(n: u64) -> String {
    format!("{:#x}", n)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn set(value: Value) -> FieldValue {
        Some(Arc::new(value))
    }

    #[test]
    fn test_raw_line() {
        assert_eq!(
            field_line(Field::Registers, &set(json!({"rax": 1})), false).to_string(),
            r#"{"field":"registers","value":{"rax":1}}"#
        );
        assert_eq!(
            field_line(Field::MemOps, &None, true).to_string(),
            r#"{"field":"mem_ops","value":null}"#
        );
    }

    #[test]
    fn test_decoded_registers() {
        let raw = json!({"idx": 3, "registers": [["rax", 255, "w"], ["rbx", 0, "r"]]});
        let line = field_line(Field::Registers, &set(raw), true);

        assert_eq!(line["value"]["idx"], json!(3));
        assert_eq!(
            line["value"]["registers"]["rax"],
            json!({"value": "0xff", "read": false, "written": true})
        );
        assert_eq!(line["value"]["registers"]["rbx"]["read"], json!(true));
    }

    #[test]
    fn test_decoded_steps_and_mem_ops() {
        let steps = json!([{"i": 0, "a": 4096, "c": "nop", "d": 1}]);
        let line = field_line(Field::Steps, &set(steps), true);
        assert_eq!(
            line["value"],
            json!([{"index": 0, "address": "0x1000", "disassembly": "nop", "depth": 1, "symbol": ""}])
        );

        let ops = json!({"r": [[16, 7]], "w": [[32, null]]});
        let line = field_line(Field::MemOps, &set(ops), true);
        assert_eq!(
            line["value"],
            json!({
                "reads": [{"address": "0x10", "value": "0x7"}],
                "writes": [{"address": "0x20", "value": null}],
            })
        );
    }

    #[test]
    fn test_undecodable_payload_prints_raw() {
        let raw = json!({"rax": 1});
        let line = field_line(Field::Registers, &set(raw.clone()), true);
        assert_eq!(line["value"], raw);

        let strace = json!(["write(1)"]);
        assert_eq!(field_line(Field::Strace, &set(strace.clone()), true)["value"], strace);
    }
}
