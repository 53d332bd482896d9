use async_trait::async_trait;

use crate::error::StorageError;
use crate::filter::{ListOrder, RecordFilter};
use crate::patch::Patch;
use crate::record::{AgentRollup, GroupCount, InsertOutcome, InterventionRecord};

/// The storage trait for intervention backends.
///
/// An `InterventionBackend` persists [`InterventionRecord`] rows in a single
/// logical table. Rows are inserted whole and afterwards only changed through
/// versioned [`Patch`]es; nothing is ever deleted.
///
/// ## OCC Conflict Detection
///
/// `update` performs an optimistic concurrency check:
/// `UPDATE ... WHERE task_id = ? AND version = expected_version`. If zero
/// rows are affected, the method returns `Err(StorageError::Conflict)` and
/// nothing is written. A successful update bumps `version` by exactly one
/// and returns the new value.
///
/// ## Deduplicated inserts
///
/// `insert_unless_open` inserts only if no row with the same `dedup_key`
/// and an open status (anything but `closed`/`resolved`) exists, as a single
/// atomic step. Plain `insert` never checks: append-only detection rows
/// intentionally share dedup keys across runs.
///
/// ## Thread Safety
///
/// Implementations must be `Send + Sync + 'static` so one backend can be
/// shared across tasks behind an `Arc`.
#[async_trait]
pub trait InterventionBackend: Send + Sync + 'static {
    // ── Writes ────────────────────────────────────────────────────────────────

    /// Insert a new row unconditionally.
    async fn insert(&self, record: InterventionRecord) -> Result<(), StorageError>;

    /// Insert unless an open row with the same `dedup_key` exists.
    ///
    /// Returns the existing row (newest first) when one is found.
    async fn insert_unless_open(
        &self,
        record: InterventionRecord,
    ) -> Result<InsertOutcome, StorageError>;

    /// Apply a patch conditional on `expected_version` (OCC).
    ///
    /// Returns the new version number on success.
    async fn update(
        &self,
        task_id: &str,
        expected_version: i64,
        patch: &Patch,
    ) -> Result<i64, StorageError>;

    // ── Reads ─────────────────────────────────────────────────────────────────

    /// Read one row by `task_id`.
    ///
    /// Returns `Err(StorageError::NotFound)` if it does not exist.
    async fn get(&self, task_id: &str) -> Result<InterventionRecord, StorageError>;

    /// Newest open row for a dedup key, if any.
    async fn find_open(&self, dedup_key: &str)
        -> Result<Option<InterventionRecord>, StorageError>;

    /// List rows matching `filter`, sorted by `order`.
    ///
    /// `limit` of 0 means no limit.
    async fn list(
        &self,
        filter: &RecordFilter,
        order: ListOrder,
        limit: usize,
    ) -> Result<Vec<InterventionRecord>, StorageError>;

    // ── Aggregates ────────────────────────────────────────────────────────────

    /// Row counts grouped by `(status, priority, issue_type)`.
    async fn count_grouped(&self, filter: &RecordFilter)
        -> Result<Vec<GroupCount>, StorageError>;

    /// Rollup over rows assigned to `agent_id` with `assigned_at >= since`.
    async fn agent_rollup(&self, agent_id: &str, since: &str)
        -> Result<AgentRollup, StorageError>;
}
