//! In-process backend.
//!
//! Holds every row in a `Vec` behind one mutex, so each trait method is
//! atomic with respect to the others. Optionally mirrors the table to a JSON
//! snapshot file after every write, which is what the CLI runs on. A write
//! whose snapshot fails is undone in memory before the error is returned.
//!
//! Snapshot writes are blocking file I/O done under the lock. That suits a
//! single-shot CLI and tests; a long-lived service sharing one backend
//! across many tasks should use the warehouse backend instead.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use tracing::debug;

use crate::error::StorageError;
use crate::filter::{ListOrder, RecordFilter};
use crate::patch::Patch;
use crate::record::{AgentRollup, GroupCount, InsertOutcome, InterventionRecord};
use crate::status::{Priority, Status, RESOLUTION_FIXED};
use crate::timestamp::parse_timestamp;
use crate::traits::InterventionBackend;

#[derive(Debug, Clone, Default)]
pub struct MemoryBackend {
    rows: Arc<Mutex<Vec<InterventionRecord>>>,
    snapshot_path: Option<PathBuf>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the backend with existing rows.
    pub fn with_records(records: Vec<InterventionRecord>) -> Self {
        MemoryBackend {
            rows: Arc::new(Mutex::new(records)),
            snapshot_path: None,
        }
    }

    /// Open a snapshot-file backed table. A missing file is an empty table.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let path = path.as_ref().to_path_buf();
        let rows = if path.exists() {
            let text = std::fs::read_to_string(&path).map_err(|e| {
                StorageError::Backend(format!("failed to read '{}': {e}", path.display()))
            })?;
            if text.trim().is_empty() {
                Vec::new()
            } else {
                serde_json::from_str(&text)?
            }
        } else {
            Vec::new()
        };
        Ok(MemoryBackend {
            rows: Arc::new(Mutex::new(rows)),
            snapshot_path: Some(path),
        })
    }

    /// Copy of every row, in insertion order.
    pub fn records(&self) -> Result<Vec<InterventionRecord>, StorageError> {
        Ok(self.lock()?.clone())
    }

    fn lock(&self) -> Result<MutexGuard<'_, Vec<InterventionRecord>>, StorageError> {
        self.rows
            .lock()
            .map_err(|_| StorageError::Backend("memory backend lock poisoned".to_string()))
    }

    /// Write the snapshot file while the caller still holds the lock.
    ///
    /// Blocks the calling thread for the duration of the write.
    fn persist(&self, rows: &[InterventionRecord]) -> Result<(), StorageError> {
        let Some(path) = &self.snapshot_path else {
            return Ok(());
        };
        debug!(path = %path.display(), rows = rows.len(), "writing snapshot");
        let text = serde_json::to_string_pretty(rows)?;
        let tmp = path.with_extension("tmp");
        std::fs::write(&tmp, text).map_err(|e| {
            StorageError::Backend(format!("failed to write '{}': {e}", tmp.display()))
        })?;
        std::fs::rename(&tmp, path).map_err(|e| {
            StorageError::Backend(format!("failed to replace '{}': {e}", path.display()))
        })
    }
}

fn newest_open<'a>(
    rows: &'a [InterventionRecord],
    dedup_key: &str,
) -> Option<&'a InterventionRecord> {
    // Later inserts win ties on created_at.
    rows.iter()
        .filter(|r| r.dedup_key == dedup_key && r.status.is_open())
        .fold(None, |best: Option<&InterventionRecord>, r| match best {
            Some(b) if b.created_at > r.created_at => Some(b),
            _ => Some(r),
        })
}

/// Group counts over `(status, priority, issue_type)`, in key order.
pub(crate) fn tally(rows: &[InterventionRecord], filter: &RecordFilter) -> Vec<GroupCount> {
    let mut groups: BTreeMap<(Status, Priority, String), u64> = BTreeMap::new();
    for r in rows.iter().filter(|r| filter.matches(r)) {
        *groups
            .entry((r.status, r.priority, r.issue_type.clone()))
            .or_default() += 1;
    }
    groups
        .into_iter()
        .map(|((status, priority, issue_type), count)| GroupCount {
            status,
            priority,
            issue_type,
            count,
        })
        .collect()
}

pub(crate) fn rollup(rows: &[InterventionRecord], agent_id: &str, since: &str) -> AgentRollup {
    let filter = RecordFilter {
        assignee_id: Some(agent_id.to_string()),
        assigned_from: Some(since.to_string()),
        ..Default::default()
    };
    let mut out = AgentRollup::default();
    let mut confidences = Vec::new();
    let mut minutes = Vec::new();
    for r in rows.iter().filter(|r| filter.matches(r)) {
        out.total_tasks += 1;
        if r.status == Status::Resolved && r.resolution_type.as_deref() == Some(RESOLUTION_FIXED) {
            out.successful += 1;
        }
        if r.status == Status::Failed {
            out.failed += 1;
        }
        if let Some(c) = r.plan_confidence {
            confidences.push(c);
        }
        let assigned = r.assigned_at.as_deref().and_then(parse_timestamp);
        let resolved = r.resolved_at.as_deref().and_then(parse_timestamp);
        if let (Some(a), Some(b)) = (assigned, resolved) {
            minutes.push((b - a).whole_minutes() as f64);
        }
    }
    out.avg_confidence = mean(&confidences);
    out.avg_resolution_minutes = mean(&minutes);
    out
}

fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

#[async_trait]
impl InterventionBackend for MemoryBackend {
    async fn insert(&self, record: InterventionRecord) -> Result<(), StorageError> {
        let mut rows = self.lock()?;
        if rows.iter().any(|r| r.task_id == record.task_id) {
            return Err(StorageError::InsertRejected {
                task_id: record.task_id,
                reasons: vec!["duplicate task_id".to_string()],
            });
        }
        rows.push(record);
        if let Err(e) = self.persist(&rows) {
            rows.pop();
            return Err(e);
        }
        Ok(())
    }

    async fn insert_unless_open(
        &self,
        record: InterventionRecord,
    ) -> Result<InsertOutcome, StorageError> {
        let mut rows = self.lock()?;
        if let Some(existing) = newest_open(&rows, &record.dedup_key) {
            return Ok(InsertOutcome::Existing(Box::new(existing.clone())));
        }
        if rows.iter().any(|r| r.task_id == record.task_id) {
            return Err(StorageError::InsertRejected {
                task_id: record.task_id,
                reasons: vec!["duplicate task_id".to_string()],
            });
        }
        rows.push(record);
        if let Err(e) = self.persist(&rows) {
            rows.pop();
            return Err(e);
        }
        Ok(InsertOutcome::Inserted)
    }

    async fn update(
        &self,
        task_id: &str,
        expected_version: i64,
        patch: &Patch,
    ) -> Result<i64, StorageError> {
        let mut rows = self.lock()?;
        let index = rows
            .iter()
            .position(|r| r.task_id == task_id)
            .ok_or_else(|| StorageError::NotFound {
                task_id: task_id.to_string(),
            })?;
        if rows[index].version != expected_version {
            return Err(StorageError::Conflict {
                task_id: task_id.to_string(),
                expected_version,
            });
        }
        let mut next = patch.apply_to(&rows[index])?;
        next.version = expected_version + 1;
        let previous = std::mem::replace(&mut rows[index], next);
        if let Err(e) = self.persist(&rows) {
            rows[index] = previous;
            return Err(e);
        }
        Ok(expected_version + 1)
    }

    async fn get(&self, task_id: &str) -> Result<InterventionRecord, StorageError> {
        self.lock()?
            .iter()
            .find(|r| r.task_id == task_id)
            .cloned()
            .ok_or_else(|| StorageError::NotFound {
                task_id: task_id.to_string(),
            })
    }

    async fn find_open(
        &self,
        dedup_key: &str,
    ) -> Result<Option<InterventionRecord>, StorageError> {
        Ok(newest_open(&self.lock()?, dedup_key).cloned())
    }

    async fn list(
        &self,
        filter: &RecordFilter,
        order: ListOrder,
        limit: usize,
    ) -> Result<Vec<InterventionRecord>, StorageError> {
        let mut out: Vec<InterventionRecord> = self
            .lock()?
            .iter()
            .filter(|r| filter.matches(r))
            .cloned()
            .collect();
        order.sort(&mut out);
        if limit > 0 {
            out.truncate(limit);
        }
        Ok(out)
    }

    async fn count_grouped(
        &self,
        filter: &RecordFilter,
    ) -> Result<Vec<GroupCount>, StorageError> {
        Ok(tally(&self.lock()?, filter))
    }

    async fn agent_rollup(
        &self,
        agent_id: &str,
        since: &str,
    ) -> Result<AgentRollup, StorageError> {
        Ok(rollup(&self.lock()?, agent_id, since))
    }
}
