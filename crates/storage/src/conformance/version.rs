use std::future::Future;

use super::{at, make_record, TestResult};
use crate::patch::{Field, Patch};
use crate::status::{Priority, Status};
use crate::{InterventionBackend, StorageError};

pub(super) async fn run_version_tests<S, F, Fut>(factory: &F) -> Vec<TestResult>
where
    S: InterventionBackend,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let mut results = Vec::new();

    // Correct version succeeds
    results.push(TestResult::from_result(
        "version",
        "update_returns_incremented_version",
        update_returns_incremented_version(factory).await,
    ));
    results.push(TestResult::from_result(
        "version",
        "version_increments_sequentially",
        version_increments_sequentially(factory).await,
    ));
    results.push(TestResult::from_result(
        "version",
        "update_applies_listed_columns_only",
        update_applies_listed_columns_only(factory).await,
    ));
    results.push(TestResult::from_result(
        "version",
        "update_can_clear_columns",
        update_can_clear_columns(factory).await,
    ));

    // Wrong version fails
    results.push(TestResult::from_result(
        "version",
        "update_with_stale_version_returns_conflict",
        update_with_stale_version_returns_conflict(factory).await,
    ));
    results.push(TestResult::from_result(
        "version",
        "conflict_leaves_row_unchanged",
        conflict_leaves_row_unchanged(factory).await,
    ));
    results.push(TestResult::from_result(
        "version",
        "update_missing_row_returns_not_found",
        update_missing_row_returns_not_found(factory).await,
    ));

    results
}

async fn seeded<S, F, Fut>(factory: &F) -> Result<S, String>
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
    Ok(backend)
}

fn priority_patch(p: Priority) -> Patch {
    Patch::new()
        .set(Field::Priority, p)
        .set(Field::UpdatedAt, at(5))
}

async fn update_returns_incremented_version<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: InterventionBackend,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let backend = seeded(factory).await?;
    let v = backend
        .update("t-1", 0, &priority_patch(Priority::High))
        .await
        .map_err(|e| format!("update: {e}"))?;
    if v != 1 {
        return Err(format!("expected new version 1, got {v}"));
    }
    let loaded = backend.get("t-1").await.map_err(|e| format!("get: {e}"))?;
    if loaded.version != 1 {
        return Err(format!("stored version {}, expected 1", loaded.version));
    }
    Ok(())
}

async fn version_increments_sequentially<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: InterventionBackend,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let backend = seeded(factory).await?;
    let mut version = 0;
    for p in [Priority::Low, Priority::High, Priority::Critical] {
        let next = backend
            .update("t-1", version, &priority_patch(p))
            .await
            .map_err(|e| format!("update at {version}: {e}"))?;
        if next != version + 1 {
            return Err(format!("expected {}, got {next}", version + 1));
        }
        version = next;
    }
    Ok(())
}

async fn update_applies_listed_columns_only<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: InterventionBackend,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let backend = seeded(factory).await?;
    let before = backend.get("t-1").await.map_err(|e| format!("get: {e}"))?;
    let history = before.status_history.appended(Status::Assigned, at(5), "alice");
    let patch = Patch::new()
        .set(Field::Status, Status::Assigned)
        .set(Field::AssigneeId, "alice")
        .set(Field::UpdatedAt, at(5))
        .set_json(Field::StatusHistory, &history)
        .map_err(|e| format!("patch: {e}"))?;
    backend
        .update("t-1", 0, &patch)
        .await
        .map_err(|e| format!("update: {e}"))?;
    let after = backend.get("t-1").await.map_err(|e| format!("get: {e}"))?;
    if after.status != Status::Assigned || after.assignee_id.as_deref() != Some("alice") {
        return Err("patched columns not applied".to_string());
    }
    if after.status_history != history {
        return Err(format!("status_history not applied: {:?}", after.status_history));
    }
    if after.title != before.title || after.created_at != before.created_at {
        return Err("unlisted columns changed".to_string());
    }
    Ok(())
}

async fn update_can_clear_columns<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: InterventionBackend,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let backend = seeded(factory).await?;
    let set = Patch::new().set(Field::SnoozedUntil, at(60));
    backend
        .update("t-1", 0, &set)
        .await
        .map_err(|e| format!("set: {e}"))?;
    let clear = Patch::new().clear(Field::SnoozedUntil);
    backend
        .update("t-1", 1, &clear)
        .await
        .map_err(|e| format!("clear: {e}"))?;
    let after = backend.get("t-1").await.map_err(|e| format!("get: {e}"))?;
    if after.snoozed_until.is_some() {
        return Err(format!("snoozed_until still {:?}", after.snoozed_until));
    }
    Ok(())
}

async fn update_with_stale_version_returns_conflict<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: InterventionBackend,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let backend = seeded(factory).await?;
    backend
        .update("t-1", 0, &priority_patch(Priority::High))
        .await
        .map_err(|e| format!("first update: {e}"))?;
    match backend.update("t-1", 0, &priority_patch(Priority::Low)).await {
        Err(StorageError::Conflict {
            task_id,
            expected_version,
        }) => {
            if task_id != "t-1" || expected_version != 0 {
                return Err(format!(
                    "conflict fields wrong: task_id={task_id}, expected_version={expected_version}"
                ));
            }
            Ok(())
        }
        Err(e) => Err(format!("expected Conflict, got: {e}")),
        Ok(v) => Err(format!("expected Conflict, got version {v}")),
    }
}

async fn conflict_leaves_row_unchanged<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: InterventionBackend,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let backend = seeded(factory).await?;
    backend
        .update("t-1", 0, &priority_patch(Priority::High))
        .await
        .map_err(|e| format!("first update: {e}"))?;
    let _ = backend
        .update("t-1", 7, &priority_patch(Priority::Low))
        .await;
    let loaded = backend.get("t-1").await.map_err(|e| format!("get: {e}"))?;
    if loaded.priority != Priority::High || loaded.version != 1 {
        return Err(format!(
            "row changed by a conflicting update: priority={}, version={}",
            loaded.priority, loaded.version
        ));
    }
    Ok(())
}

async fn update_missing_row_returns_not_found<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: InterventionBackend,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let backend = factory().await;
    match backend
        .update("missing", 0, &priority_patch(Priority::High))
        .await
    {
        Err(StorageError::NotFound { .. }) => Ok(()),
        Err(e) => Err(format!("expected NotFound, got: {e}")),
        Ok(v) => Err(format!("expected NotFound, got version {v}")),
    }
}
