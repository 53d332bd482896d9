use std::future::Future;

use super::{at, make_record, TestResult};
use crate::history::ExecutionLogEntry;
use crate::status::{AssigneeType, Priority, Status};
use crate::{InterventionBackend, StorageError};

pub(super) async fn run_insert_tests<S, F, Fut>(factory: &F) -> Vec<TestResult>
where
    S: InterventionBackend,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    vec![
        TestResult::from_result(
            "insert",
            "insert_then_get_round_trips",
            insert_then_get_round_trips(factory).await,
        ),
        TestResult::from_result(
            "insert",
            "inserted_row_starts_at_version_zero",
            inserted_row_starts_at_version_zero(factory).await,
        ),
        TestResult::from_result(
            "insert",
            "json_columns_round_trip",
            json_columns_round_trip(factory).await,
        ),
        TestResult::from_result(
            "insert",
            "get_missing_returns_not_found",
            get_missing_returns_not_found(factory).await,
        ),
    ]
}

async fn insert_then_get_round_trips<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: InterventionBackend,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let backend = factory().await;
    let mut record = make_record("t-1", "sale.order:42:qty_mismatch", Status::Open, &at(0));
    record.priority = Priority::High;
    record.department = Some("logistics".to_string());
    record.document_name = Some("SO042".to_string());
    record.due_at = Some(at(90));

    backend
        .insert(record.clone())
        .await
        .map_err(|e| format!("insert: {e}"))?;
    let loaded = backend.get("t-1").await.map_err(|e| format!("get: {e}"))?;
    if loaded != record {
        return Err(format!("round trip mismatch: {loaded:?} != {record:?}"));
    }
    Ok(())
}

async fn inserted_row_starts_at_version_zero<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: InterventionBackend,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let backend = factory().await;
    backend
        .insert(make_record("t-1", "k", Status::Open, &at(0)))
        .await
        .map_err(|e| format!("insert: {e}"))?;
    let loaded = backend.get("t-1").await.map_err(|e| format!("get: {e}"))?;
    if loaded.version != 0 {
        return Err(format!("expected version 0, got {}", loaded.version));
    }
    Ok(())
}

async fn json_columns_round_trip<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: InterventionBackend,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let backend = factory().await;
    let mut record = make_record("t-1", "k", Status::Executing, &at(0));
    record.status_history.push(Status::Assigned, at(1), "agent-1");
    record.status_history.push(Status::Executing, at(2), "agent-1");
    record.assignee_id = Some("agent-1".to_string());
    record.assignee_type = Some(AssigneeType::AiAgent);
    record.agent_capabilities = vec!["qty_mismatch".to_string(), "price_drift".to_string()];
    record.metadata = Some(serde_json::json!({"source": "conformance", "nested": {"n": 1}}));
    record.planned_action = Some(serde_json::json!({"action": "adjust_qty", "to": 3}));
    record.related_documents = vec![serde_json::json!({"type": "stock.picking", "id": 7})];
    record.execution_log.push(ExecutionLogEntry {
        action: "execution_started".to_string(),
        at: at(2),
        by: Some("agent-1".to_string()),
        result: None,
    });

    backend
        .insert(record.clone())
        .await
        .map_err(|e| format!("insert: {e}"))?;
    let loaded = backend.get("t-1").await.map_err(|e| format!("get: {e}"))?;
    if loaded.status_history != record.status_history {
        return Err(format!(
            "status_history mismatch: {:?}",
            loaded.status_history
        ));
    }
    if loaded.metadata != record.metadata || loaded.planned_action != record.planned_action {
        return Err("JSON payload columns did not round trip".to_string());
    }
    if loaded.execution_log != record.execution_log {
        return Err(format!("execution_log mismatch: {:?}", loaded.execution_log));
    }
    if loaded.agent_capabilities != record.agent_capabilities {
        return Err("agent_capabilities did not round trip".to_string());
    }
    Ok(())
}

async fn get_missing_returns_not_found<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: InterventionBackend,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let backend = factory().await;
    match backend.get("missing").await {
        Err(StorageError::NotFound { task_id }) if task_id == "missing" => Ok(()),
        Err(e) => Err(format!("expected NotFound, got: {e}")),
        Ok(r) => Err(format!("expected NotFound, got row {}", r.task_id)),
    }
}
