//! Conversion between [`InterventionRecord`] and warehouse result rows.

use serde_json::Value;

use super::Row;
use crate::error::StorageError;
use crate::patch::JSON_COLUMNS;
use crate::record::InterventionRecord;
use crate::timestamp::{format_timestamp, parse_timestamp};

const TIMESTAMP_COLUMNS: &[&str] = &[
    "created_at",
    "updated_at",
    "due_at",
    "snoozed_until",
    "assigned_at",
    "plan_created_at",
    "approval_requested_at",
    "approved_at",
    "execution_started_at",
    "execution_completed_at",
    "resolved_at",
];

const INTEGER_COLUMNS: &[&str] = &["version", "document_id"];

/// Encode a record as an insert row. JSON columns carry their JSON text.
pub fn encode_record(record: &InterventionRecord) -> Result<Row, StorageError> {
    let value = serde_json::to_value(record)?;
    let Value::Object(mut row) = value else {
        return Err(StorageError::Serialization(
            "intervention record is not a JSON object".to_string(),
        ));
    };
    for col in JSON_COLUMNS {
        if let Some(v) = row.get_mut(*col) {
            if !v.is_null() {
                *v = Value::String(serde_json::to_string(v)?);
            }
        }
    }
    Ok(row)
}

/// Decode a result row back into a record.
///
/// Tolerates the shapes warehouses return: JSON columns as text or as
/// native objects, integers as strings, and timestamps in any RFC 3339 or
/// naive UTC form (normalized to the fixed-width layout).
pub fn decode_row(mut row: Row) -> Result<InterventionRecord, StorageError> {
    for col in JSON_COLUMNS {
        if let Some(v) = row.get_mut(*col) {
            if let Value::String(text) = v {
                *v = if text.is_empty() {
                    Value::Null
                } else {
                    serde_json::from_str(text)?
                };
            }
        }
    }
    for col in INTEGER_COLUMNS {
        if let Some(v) = row.get_mut(*col) {
            if let Some(n) = v.as_str().and_then(|s| s.parse::<i64>().ok()) {
                *v = Value::from(n);
            }
        }
    }
    if let Some(v) = row.get_mut("plan_confidence") {
        if let Some(f) = v.as_str().and_then(|s| s.parse::<f64>().ok()) {
            *v = Value::from(f);
        }
    }
    for col in TIMESTAMP_COLUMNS {
        if let Some(v) = row.get_mut(*col) {
            if let Some(at) = v.as_str().and_then(parse_timestamp) {
                *v = Value::String(format_timestamp(at));
            }
        }
    }
    // Array-typed JSON columns must not be null for the typed record.
    for col in ["related_documents", "agent_capabilities", "status_history", "execution_log"] {
        if matches!(row.get(col), Some(Value::Null)) {
            row.remove(col);
        }
    }
    let task_id = row
        .get("task_id")
        .and_then(Value::as_str)
        .unwrap_or("<unknown>")
        .to_string();
    serde_json::from_value(Value::Object(row)).map_err(|e| {
        StorageError::Serialization(format!("row for intervention {task_id} is malformed: {e}"))
    })
}

/// Read an optional number that may arrive as a string.
pub(super) fn number(row: &Row, column: &str) -> Option<f64> {
    match row.get(column)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::status::Status;
    use serde_json::json;

    #[test]
    fn json_columns_are_encoded_as_text() {
        let record = InterventionRecord::new(
            "t-1",
            "k",
            "sale.order",
            1,
            "x",
            "t",
            Status::Open,
            "2025-01-01T00:00:00.000000Z",
        );
        let row = encode_record(&record).unwrap();
        let history = row["status_history"].as_str().unwrap();
        assert!(history.starts_with('['));
        assert!(history.contains("\"by\":\"system\""));
        assert_eq!(row["metadata"], Value::Null);
        assert_eq!(row["status"], json!("open"));
    }

    #[test]
    fn decodes_warehouse_shaped_row() {
        let row = json!({
            "task_id": "t-1",
            "dedup_key": "sale.order:1:x",
            "version": "4",
            "request_id": "r",
            "job_name": "job",
            "created_at": "2025-03-01 08:00:00 UTC",
            "environment": "dev",
            "source_system": "sentinel-ops",
            "document_type": "sale.order",
            "document_id": "1",
            "issue_type": "x",
            "title": "t",
            "priority": "high",
            "status": "assigned",
            "status_history": "[{\"status\":\"open\",\"at\":\"2025-03-01T08:00:00.000000Z\",\"by\":\"system\"}]",
            "metadata": {"a": 1},
            "agent_capabilities": null,
            "plan_confidence": "0.75"
        });
        let Value::Object(row) = row else { unreachable!() };
        let record = decode_row(row).unwrap();
        assert_eq!(record.version, 4);
        assert_eq!(record.document_id, 1);
        assert_eq!(record.created_at, "2025-03-01T08:00:00.000000Z");
        assert_eq!(record.status, Status::Assigned);
        assert_eq!(record.status_history.len(), 1);
        assert_eq!(record.metadata, Some(json!({"a": 1})));
        assert!(record.agent_capabilities.is_empty());
        assert_eq!(record.plan_confidence, Some(0.75));
    }

    #[test]
    fn malformed_row_names_the_task() {
        let Value::Object(row) = json!({"task_id": "t-9", "status": "open"}) else {
            unreachable!()
        };
        let err = decode_row(row).unwrap_err();
        assert!(err.to_string().contains("t-9"));
    }
}
