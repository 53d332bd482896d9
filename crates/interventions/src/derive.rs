//! Status derivation from daily detection partitions.
//!
//! Detection jobs append one row per issue per run, so whether an issue is
//! still open can be read off the partitions: an issue seen today is open, an
//! issue seen yesterday but not today went away without the job fixing it,
//! and an issue whose latest row is a resolution was fixed by automation.

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;
use time::{Date, Duration};
use tracing::debug;

use sentinel_storage::timestamp::{format_date, partition_of, partition_start};
use sentinel_storage::{InterventionBackend, InterventionRecord, ListOrder, RecordFilter, Status};

use crate::store::InterventionStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DerivedStatus {
    Open,
    ResolvedByAutomation,
    ResolvedByHuman,
}

impl DerivedStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DerivedStatus::Open => "open",
            DerivedStatus::ResolvedByAutomation => "resolved_by_automation",
            DerivedStatus::ResolvedByHuman => "resolved_by_human",
        }
    }
}

impl fmt::Display for DerivedStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Derived state of one issue.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DerivedIssue {
    pub dedup_key: String,
    pub document_type: String,
    pub document_id: i64,
    pub issue_type: String,
    pub status: DerivedStatus,
    /// Who resolved it, for [`DerivedStatus::ResolvedByAutomation`].
    pub resolved_by: Option<String>,
    /// `created_at` of the latest row considered.
    pub last_seen_at: String,
}

/// Which rows [`InterventionStore::derive_statuses`] reads.
#[derive(Debug, Clone, PartialEq)]
pub struct DerivationScope {
    pub document_type: Option<String>,
    pub issue_type: Option<String>,
    pub department: Option<String>,
    /// Days before the current partition searched for the previous one.
    pub lookback_days: u32,
}

impl Default for DerivationScope {
    fn default() -> Self {
        DerivationScope {
            document_type: None,
            issue_type: None,
            department: None,
            lookback_days: 7,
        }
    }
}

/// Derive per-issue status from rows spanning several partitions.
///
/// Only the current partition and the newest earlier partition present in
/// `rows` are considered; rows dated after `current` or with an unreadable
/// `created_at` are ignored. The result is sorted by dedup key.
pub fn derive_statuses(rows: &[InterventionRecord], current: Date) -> Vec<DerivedIssue> {
    let dated: Vec<(Date, &InterventionRecord)> = rows
        .iter()
        .filter_map(|r| partition_of(&r.created_at).map(|p| (p, r)))
        .filter(|(p, _)| *p <= current)
        .collect();
    let previous = dated.iter().map(|(p, _)| *p).filter(|p| *p < current).max();

    struct Seen<'a> {
        latest: &'a InterventionRecord,
        in_current: bool,
    }

    let mut by_key: BTreeMap<&str, Seen<'_>> = BTreeMap::new();
    for (partition, row) in dated {
        if partition != current && Some(partition) != previous {
            continue;
        }
        let in_current = partition == current;
        by_key
            .entry(row.dedup_key.as_str())
            .and_modify(|seen| {
                if row.created_at >= seen.latest.created_at {
                    seen.latest = row;
                }
                seen.in_current |= in_current;
            })
            .or_insert(Seen {
                latest: row,
                in_current,
            });
    }

    by_key
        .into_iter()
        .map(|(key, seen)| {
            let latest = seen.latest;
            let (status, resolved_by) = if latest.status == Status::Resolved {
                (DerivedStatus::ResolvedByAutomation, latest.resolved_by.clone())
            } else if seen.in_current {
                (DerivedStatus::Open, None)
            } else {
                (DerivedStatus::ResolvedByHuman, None)
            };
            DerivedIssue {
                dedup_key: key.to_string(),
                document_type: latest.document_type.clone(),
                document_id: latest.document_id,
                issue_type: latest.issue_type.clone(),
                status,
                resolved_by,
                last_seen_at: latest.created_at.clone(),
            }
        })
        .collect()
}

impl<B: InterventionBackend> InterventionStore<B> {
    /// Read `scope` over the look-back window ending with `current` and
    /// derive per-issue status. Empty on backend failure.
    pub async fn derive_statuses(&self, scope: &DerivationScope, current: Date) -> Vec<DerivedIssue> {
        let from = current - Duration::days(i64::from(scope.lookback_days));
        let filter = RecordFilter {
            document_type: scope.document_type.clone(),
            issue_types: scope.issue_type.iter().cloned().collect(),
            department: scope.department.clone(),
            created_from: Some(partition_start(from)),
            created_before: current.next_day().map(partition_start),
            ..Default::default()
        };
        let rows = self.list(&filter, ListOrder::CreatedAsc, 0).await;
        debug!(
            current = %format_date(current),
            from = %format_date(from),
            rows = rows.len(),
            "deriving statuses"
        );
        derive_statuses(&rows, current)
    }
}
