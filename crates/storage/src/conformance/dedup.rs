use std::future::Future;

use super::{at, make_record, TestResult};
use crate::record::InsertOutcome;
use crate::status::Status;
use crate::InterventionBackend;

const KEY: &str = "sale.order:42:qty_mismatch";

pub(super) async fn run_dedup_tests<S, F, Fut>(factory: &F) -> Vec<TestResult>
where
    S: InterventionBackend,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    vec![
        TestResult::from_result(
            "dedup",
            "find_open_ignores_closed_and_resolved",
            find_open_ignores_closed_and_resolved(factory).await,
        ),
        TestResult::from_result(
            "dedup",
            "find_open_returns_newest_open",
            find_open_returns_newest_open(factory).await,
        ),
        TestResult::from_result(
            "dedup",
            "find_open_treats_failed_as_open",
            find_open_treats_failed_as_open(factory).await,
        ),
        TestResult::from_result(
            "dedup",
            "insert_unless_open_inserts_when_none_open",
            insert_unless_open_inserts_when_none_open(factory).await,
        ),
        TestResult::from_result(
            "dedup",
            "insert_unless_open_returns_existing",
            insert_unless_open_returns_existing(factory).await,
        ),
    ]
}

async fn find_open_ignores_closed_and_resolved<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: InterventionBackend,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let backend = factory().await;
    for (id, status, minute) in [("t-1", Status::Closed, 0), ("t-2", Status::Resolved, 1)] {
        backend
            .insert(make_record(id, KEY, status, &at(minute)))
            .await
            .map_err(|e| format!("insert {id}: {e}"))?;
    }
    match backend.find_open(KEY).await {
        Ok(None) => Ok(()),
        Ok(Some(r)) => Err(format!("expected no open row, got {} ({})", r.task_id, r.status)),
        Err(e) => Err(format!("find_open: {e}")),
    }
}

async fn find_open_returns_newest_open<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: InterventionBackend,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let backend = factory().await;
    for (id, status, minute) in [
        ("older", Status::Open, 0),
        ("newer", Status::Assigned, 10),
        ("newest-closed", Status::Closed, 20),
    ] {
        backend
            .insert(make_record(id, KEY, status, &at(minute)))
            .await
            .map_err(|e| format!("insert {id}: {e}"))?;
    }
    let found = backend
        .find_open(KEY)
        .await
        .map_err(|e| format!("find_open: {e}"))?
        .ok_or("expected an open row")?;
    if found.task_id != "newer" {
        return Err(format!("expected 'newer', got '{}'", found.task_id));
    }
    Ok(())
}

async fn find_open_treats_failed_as_open<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: InterventionBackend,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let backend = factory().await;
    backend
        .insert(make_record("t-1", KEY, Status::Failed, &at(0)))
        .await
        .map_err(|e| format!("insert: {e}"))?;
    match backend.find_open(KEY).await {
        Ok(Some(r)) if r.task_id == "t-1" => Ok(()),
        Ok(other) => Err(format!("expected the failed row, got {other:?}")),
        Err(e) => Err(format!("find_open: {e}")),
    }
}

async fn insert_unless_open_inserts_when_none_open<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: InterventionBackend,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let backend = factory().await;
    backend
        .insert(make_record("old", KEY, Status::Resolved, &at(0)))
        .await
        .map_err(|e| format!("insert: {e}"))?;
    let outcome = backend
        .insert_unless_open(make_record("new", KEY, Status::Open, &at(5)))
        .await
        .map_err(|e| format!("insert_unless_open: {e}"))?;
    if outcome != InsertOutcome::Inserted {
        return Err(format!("expected Inserted, got {outcome:?}"));
    }
    backend
        .get("new")
        .await
        .map_err(|e| format!("inserted row not readable: {e}"))?;
    Ok(())
}

async fn insert_unless_open_returns_existing<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: InterventionBackend,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let backend = factory().await;
    backend
        .insert(make_record("first", KEY, Status::Open, &at(0)))
        .await
        .map_err(|e| format!("insert: {e}"))?;
    let outcome = backend
        .insert_unless_open(make_record("second", KEY, Status::Open, &at(5)))
        .await
        .map_err(|e| format!("insert_unless_open: {e}"))?;
    match outcome {
        InsertOutcome::Existing(r) if r.task_id == "first" => {}
        other => return Err(format!("expected Existing(first), got {other:?}")),
    }
    if backend.get("second").await.is_ok() {
        return Err("duplicate row was written".to_string());
    }
    Ok(())
}
