//! SQL statement builders for the warehouse backend.
//!
//! Every value travels as a named `@param`; nothing user-supplied is ever
//! spliced into the statement text. JSON-typed columns are wrapped in
//! `PARSE_JSON(...)` on write.

use serde_json::Value;

use super::row::encode_record;
use super::Params;
use crate::error::StorageError;
use crate::filter::{ListOrder, RecordFilter};
use crate::patch::{FieldValue, Patch, JSON_COLUMNS};
use crate::record::InterventionRecord;
use crate::status::Status;

/// A statement plus its bound parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub sql: String,
    pub params: Params,
}

impl Statement {
    fn new(sql: String) -> Self {
        Statement {
            sql,
            params: Params::new(),
        }
    }

    fn bind(&mut self, name: &str, value: impl Into<Value>) {
        self.params.insert(name.to_string(), value.into());
    }
}

const PRIORITY_RANK: &str = "CASE priority \
     WHEN 'critical' THEN 1 \
     WHEN 'high' THEN 2 \
     WHEN 'medium' THEN 3 \
     WHEN 'low' THEN 4 \
     ELSE 5 END";

fn closed_list() -> String {
    Status::CLOSED_SET
        .iter()
        .map(|s| format!("'{}'", s.as_str()))
        .collect::<Vec<_>>()
        .join(", ")
}

fn status_array(statuses: &[Status]) -> Value {
    Value::Array(
        statuses
            .iter()
            .map(|s| Value::String(s.as_str().to_string()))
            .collect(),
    )
}

// ── Reads ────────────────────────────────────────────────────────────────────

pub fn get(table: &str, task_id: &str) -> Statement {
    let mut stmt = Statement::new(format!(
        "SELECT * FROM `{table}` WHERE task_id = @task_id LIMIT 1"
    ));
    stmt.bind("task_id", task_id);
    stmt
}

pub fn find_open(table: &str, dedup_key: &str) -> Statement {
    let mut stmt = Statement::new(format!(
        "SELECT * FROM `{table}` \
         WHERE dedup_key = @dedup_key AND status NOT IN ({}) \
         ORDER BY created_at DESC LIMIT 1",
        closed_list()
    ));
    stmt.bind("dedup_key", dedup_key);
    stmt
}

/// `WHERE` clause for a filter, binding its parameters into `stmt`.
fn where_clause(filter: &RecordFilter, stmt: &mut Statement) -> String {
    let mut conds: Vec<String> = Vec::new();
    if !filter.statuses.is_empty() {
        conds.push("status IN UNNEST(@statuses)".to_string());
        stmt.bind("statuses", status_array(&filter.statuses));
    }
    if !filter.exclude_statuses.is_empty() {
        conds.push("status NOT IN UNNEST(@exclude_statuses)".to_string());
        stmt.bind("exclude_statuses", status_array(&filter.exclude_statuses));
    }
    if let Some(key) = &filter.dedup_key {
        conds.push("dedup_key = @dedup_key".to_string());
        stmt.bind("dedup_key", key.as_str());
    }
    if let Some(id) = &filter.assignee_id {
        conds.push("assignee_id = @assignee_id".to_string());
        stmt.bind("assignee_id", id.as_str());
    }
    if let Some(t) = filter.assignee_type {
        conds.push("assignee_type = @assignee_type".to_string());
        stmt.bind("assignee_type", t.as_str());
    }
    if filter.unassigned {
        conds.push("(assignee_id IS NULL OR assignee_id = '')".to_string());
    }
    if let Some(dept) = &filter.department {
        conds.push("department = @department".to_string());
        stmt.bind("department", dept.as_str());
    }
    if let Some(p) = filter.priority {
        conds.push("priority = @priority".to_string());
        stmt.bind("priority", p.as_str());
    }
    if !filter.issue_types.is_empty() {
        conds.push("issue_type IN UNNEST(@issue_types)".to_string());
        stmt.bind(
            "issue_types",
            Value::Array(
                filter
                    .issue_types
                    .iter()
                    .map(|t| Value::String(t.clone()))
                    .collect(),
            ),
        );
    }
    if let Some(dt) = &filter.document_type {
        conds.push("document_type = @document_type".to_string());
        stmt.bind("document_type", dt.as_str());
    }
    if let Some(a) = filter.approval_status {
        conds.push("approval_status = @approval_status".to_string());
        stmt.bind("approval_status", a.as_str());
    }
    if let Some(from) = &filter.created_from {
        conds.push("created_at >= TIMESTAMP(@created_from)".to_string());
        stmt.bind("created_from", from.as_str());
    }
    if let Some(before) = &filter.created_before {
        conds.push("created_at < TIMESTAMP(@created_before)".to_string());
        stmt.bind("created_before", before.as_str());
    }
    if let Some(from) = &filter.assigned_from {
        conds.push("assigned_at >= TIMESTAMP(@assigned_from)".to_string());
        stmt.bind("assigned_from", from.as_str());
    }
    if conds.is_empty() {
        String::new()
    } else {
        format!(" WHERE {}", conds.join(" AND "))
    }
}

fn order_clause(order: ListOrder) -> String {
    match order {
        ListOrder::PriorityFifo => format!(" ORDER BY {PRIORITY_RANK}, created_at ASC"),
        ListOrder::CreatedDesc => " ORDER BY created_at DESC".to_string(),
        ListOrder::CreatedAsc => " ORDER BY created_at ASC".to_string(),
        ListOrder::ConfidenceAsc => {
            " ORDER BY plan_confidence ASC NULLS LAST, approval_requested_at ASC".to_string()
        }
    }
}

pub fn list(table: &str, filter: &RecordFilter, order: ListOrder, limit: usize) -> Statement {
    let mut stmt = Statement::new(String::new());
    let mut sql = format!("SELECT * FROM `{table}`");
    sql.push_str(&where_clause(filter, &mut stmt));
    sql.push_str(&order_clause(order));
    if limit > 0 {
        sql.push_str(" LIMIT @limit");
        stmt.bind("limit", limit as u64);
    }
    stmt.sql = sql;
    stmt
}

pub fn count_grouped(table: &str, filter: &RecordFilter) -> Statement {
    let mut stmt = Statement::new(String::new());
    let mut sql = format!("SELECT status, priority, issue_type, COUNT(*) AS count FROM `{table}`");
    sql.push_str(&where_clause(filter, &mut stmt));
    sql.push_str(" GROUP BY status, priority, issue_type ORDER BY status, priority, issue_type");
    stmt.sql = sql;
    stmt
}

pub fn agent_rollup(table: &str, agent_id: &str, since: &str) -> Statement {
    let mut stmt = Statement::new(format!(
        "SELECT \
           COUNT(*) AS total_tasks, \
           COUNTIF(status = 'resolved' AND resolution_type = 'fixed') AS successful, \
           COUNTIF(status = 'failed') AS failed, \
           AVG(plan_confidence) AS avg_confidence, \
           AVG(TIMESTAMP_DIFF(resolved_at, assigned_at, MINUTE)) AS avg_resolution_minutes \
         FROM `{table}` \
         WHERE assignee_id = @agent_id AND assigned_at >= TIMESTAMP(@since)"
    ));
    stmt.bind("agent_id", agent_id);
    stmt.bind("since", since);
    stmt
}

// ── Writes ───────────────────────────────────────────────────────────────────

fn placeholder(column: &str) -> String {
    if JSON_COLUMNS.contains(&column) {
        format!("PARSE_JSON(@p_{column})")
    } else {
        format!("@p_{column}")
    }
}

/// `UPDATE ... SET ..., version = version + 1 WHERE task_id AND version`.
///
/// Zero affected rows means the expected version was stale.
pub fn update(
    table: &str,
    task_id: &str,
    expected_version: i64,
    patch: &Patch,
) -> Result<Statement, StorageError> {
    if patch.is_empty() {
        return Err(StorageError::Backend(format!(
            "empty patch for intervention {task_id}"
        )));
    }
    let mut stmt = Statement::new(String::new());
    let mut sets = Vec::with_capacity(patch.len() + 1);
    for (field, value) in patch.entries() {
        let col = field.name();
        match value {
            FieldValue::Null => sets.push(format!("{col} = NULL")),
            FieldValue::Json(v) => {
                sets.push(format!("{col} = PARSE_JSON(@p_{col})"));
                stmt.bind(&format!("p_{col}"), serde_json::to_string(v)?);
            }
            other => {
                sets.push(format!("{col} = @p_{col}"));
                stmt.bind(&format!("p_{col}"), other.to_json());
            }
        }
    }
    sets.push("version = version + 1".to_string());
    stmt.sql = format!(
        "UPDATE `{table}` SET {} WHERE task_id = @task_id AND version = @expected_version",
        sets.join(", ")
    );
    stmt.bind("task_id", task_id);
    stmt.bind("expected_version", expected_version);
    Ok(stmt)
}

/// `MERGE` that inserts the record only when no open row shares its dedup key.
pub fn insert_unless_open(
    table: &str,
    record: &InterventionRecord,
) -> Result<Statement, StorageError> {
    let row = encode_record(record)?;
    let mut stmt = Statement::new(String::new());
    let columns: Vec<&str> = row.keys().map(String::as_str).collect();
    let values: Vec<String> = columns.iter().map(|c| placeholder(c)).collect();
    for (col, value) in &row {
        stmt.bind(&format!("p_{col}"), value.clone());
    }
    stmt.bind("dedup_key", record.dedup_key.as_str());
    stmt.sql = format!(
        "MERGE `{table}` AS target \
         USING (SELECT @dedup_key AS dedup_key) AS source \
         ON target.dedup_key = source.dedup_key AND target.status NOT IN ({}) \
         WHEN NOT MATCHED THEN INSERT ({}) VALUES ({})",
        closed_list(),
        columns.join(", "),
        values.join(", ")
    );
    Ok(stmt)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::patch::Field;
    use crate::status::Priority;

    #[test]
    fn update_guards_on_version_and_parses_json() {
        let patch = Patch::new()
            .set(Field::Status, Status::Assigned)
            .set(Field::AssignedBy, None::<String>)
            .set_json(Field::StatusHistory, &serde_json::json!([{"status": "open"}]))
            .unwrap();
        let stmt = update("ds.interventions", "t-1", 3, &patch).unwrap();
        assert!(stmt.sql.starts_with("UPDATE `ds.interventions` SET "));
        assert!(stmt.sql.contains("status = @p_status"));
        assert!(stmt.sql.contains("assigned_by = NULL"));
        assert!(stmt.sql.contains("status_history = PARSE_JSON(@p_status_history)"));
        assert!(stmt.sql.contains("version = version + 1"));
        assert!(stmt
            .sql
            .ends_with("WHERE task_id = @task_id AND version = @expected_version"));
        assert_eq!(stmt.params["expected_version"], serde_json::json!(3));
        assert_eq!(stmt.params["p_status"], serde_json::json!("assigned"));
        assert_eq!(
            stmt.params["p_status_history"],
            serde_json::json!(r#"[{"status":"open"}]"#)
        );
    }

    #[test]
    fn empty_update_is_rejected() {
        assert!(update("t", "t-1", 0, &Patch::new()).is_err());
    }

    #[test]
    fn list_orders_by_priority_rank_then_fifo() {
        let filter = RecordFilter {
            statuses: vec![Status::Open],
            priority: Some(Priority::High),
            ..Default::default()
        };
        let stmt = list("t", &filter, ListOrder::PriorityFifo, 25);
        assert!(stmt
            .sql
            .contains("WHERE status IN UNNEST(@statuses) AND priority = @priority"));
        assert!(stmt.sql.contains("WHEN 'critical' THEN 1"));
        assert!(stmt.sql.contains("created_at ASC LIMIT @limit"));
        assert_eq!(stmt.params["limit"], serde_json::json!(25));
    }

    #[test]
    fn unlimited_list_has_no_limit() {
        let stmt = list("t", &RecordFilter::default(), ListOrder::CreatedDesc, 0);
        assert_eq!(stmt.sql, "SELECT * FROM `t` ORDER BY created_at DESC");
        assert!(stmt.params.is_empty());
    }

    #[test]
    fn merge_excludes_closed_rows_from_match() {
        let record = InterventionRecord::new(
            "t-1",
            "sale.order:1:x",
            "sale.order",
            1,
            "x",
            "t",
            Status::Open,
            "2025-01-01T00:00:00.000000Z",
        );
        let stmt = insert_unless_open("t", &record).unwrap();
        assert!(stmt.sql.contains("target.status NOT IN ('closed', 'resolved')"));
        assert!(stmt.sql.contains("PARSE_JSON(@p_status_history)"));
        assert!(stmt.sql.contains("@p_task_id"));
        assert_eq!(stmt.params["dedup_key"], serde_json::json!("sale.order:1:x"));
    }
}
