use std::future::Future;
use std::sync::Arc;

use super::{at, make_record, TestResult};
use crate::patch::{Field, Patch};
use crate::record::InsertOutcome;
use crate::status::Status;
use crate::{InterventionBackend, StorageError};

/// Number of concurrent tasks to spawn in each test.
const N: usize = 10;

pub(super) async fn run_concurrent_tests<S, F, Fut>(factory: &F) -> Vec<TestResult>
where
    S: InterventionBackend,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let mut results = Vec::new();

    results.push(TestResult::from_result(
        "concurrent",
        "concurrent_claims_exactly_one_wins",
        concurrent_claims_exactly_one_wins(factory).await,
    ));
    results.push(TestResult::from_result(
        "concurrent",
        "concurrent_dedup_inserts_exactly_one_wins",
        concurrent_dedup_inserts_exactly_one_wins(factory).await,
    ));
    results.push(TestResult::from_result(
        "concurrent",
        "concurrent_updates_different_rows_all_succeed",
        concurrent_updates_different_rows_all_succeed(factory).await,
    ));

    results
}

fn claim_patch(worker: &str) -> Patch {
    Patch::new()
        .set(Field::Status, Status::Assigned)
        .set(Field::AssigneeId, worker)
        .set(Field::AssignedAt, at(1))
        .set(Field::UpdatedAt, at(1))
}

// ── Concurrent claim: exactly one wins ──────────────────────────────────────

/// N workers race to claim the same open row from version 0. Exactly one
/// update succeeds; the rest get Conflict, and the stored assignee is the
/// winner.
async fn concurrent_claims_exactly_one_wins<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: InterventionBackend,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let backend = Arc::new(factory().await);
    backend
        .insert(make_record("t-1", "k", Status::Open, &at(0)))
        .await
        .map_err(|e| format!("insert: {e}"))?;

    let mut handles = Vec::new();
    for i in 0..N {
        let b = backend.clone();
        handles.push(tokio::spawn(async move {
            let worker = format!("worker-{i}");
            match b.update("t-1", 0, &claim_patch(&worker)).await {
                Ok(_) => Ok(Some(worker)),
                Err(StorageError::Conflict { .. }) => Ok(None),
                Err(e) => Err(e),
            }
        }));
    }

    let mut winners = Vec::new();
    for handle in handles {
        let won = handle
            .await
            .map_err(|e| format!("task panic: {e}"))?
            .map_err(|e: StorageError| format!("storage error: {e}"))?;
        if let Some(worker) = won {
            winners.push(worker);
        }
    }

    if winners.len() != 1 {
        return Err(format!("expected exactly 1 winner, got {}", winners.len()));
    }
    let record = backend.get("t-1").await.map_err(|e| format!("get: {e}"))?;
    if record.assignee_id.as_deref() != Some(winners[0].as_str()) {
        return Err(format!(
            "stored assignee {:?} is not the winner {}",
            record.assignee_id, winners[0]
        ));
    }
    if record.version != 1 {
        return Err(format!("expected version 1, got {}", record.version));
    }
    Ok(())
}

// ── Concurrent dedup insert: exactly one wins ───────────────────────────────

/// N tasks race `insert_unless_open` for the same dedup key. Exactly one row
/// is inserted; every other task sees it as the existing row.
async fn concurrent_dedup_inserts_exactly_one_wins<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: InterventionBackend,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let backend = Arc::new(factory().await);

    let mut handles = Vec::new();
    for i in 0..N {
        let b = backend.clone();
        handles.push(tokio::spawn(async move {
            let record = make_record(&format!("t-{i}"), "shared-key", Status::Open, &at(0));
            b.insert_unless_open(record).await
        }));
    }

    let mut inserted = 0usize;
    let mut existing_ids = Vec::new();
    for handle in handles {
        match handle
            .await
            .map_err(|e| format!("task panic: {e}"))?
            .map_err(|e| format!("storage error: {e}"))?
        {
            InsertOutcome::Inserted => inserted += 1,
            InsertOutcome::Existing(r) => existing_ids.push(r.task_id),
        }
    }

    if inserted != 1 {
        return Err(format!("expected exactly 1 insert, got {inserted}"));
    }
    let open = backend
        .find_open("shared-key")
        .await
        .map_err(|e| format!("find_open: {e}"))?
        .ok_or("no open row after race")?;
    if existing_ids.iter().any(|id| *id != open.task_id) {
        return Err(format!(
            "losers saw {existing_ids:?}, but the open row is {}",
            open.task_id
        ));
    }
    Ok(())
}

// ── Concurrent updates to different rows: all succeed ───────────────────────

/// N tasks each claim a different row. All should succeed; there is no
/// contention, so any conflict is a false positive.
async fn concurrent_updates_different_rows_all_succeed<S, F, Fut>(
    factory: &F,
) -> Result<(), String>
where
    S: InterventionBackend,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let backend = Arc::new(factory().await);
    for i in 0..N {
        backend
            .insert(make_record(&format!("t-{i}"), &format!("k-{i}"), Status::Open, &at(0)))
            .await
            .map_err(|e| format!("insert t-{i}: {e}"))?;
    }

    let mut handles = Vec::new();
    for i in 0..N {
        let b = backend.clone();
        handles.push(tokio::spawn(async move {
            b.update(&format!("t-{i}"), 0, &claim_patch(&format!("worker-{i}")))
                .await
        }));
    }

    for (i, handle) in handles.into_iter().enumerate() {
        handle
            .await
            .map_err(|e| format!("task {i} panic: {e}"))?
            .map_err(|e| format!("task {i} failed: {e}"))?;
    }

    for i in 0..N {
        let record = backend
            .get(&format!("t-{i}"))
            .await
            .map_err(|e| format!("get t-{i}: {e}"))?;
        if record.status != Status::Assigned || record.version != 1 {
            return Err(format!(
                "t-{i}: expected assigned at version 1, got {} at {}",
                record.status, record.version
            ));
        }
    }
    Ok(())
}
