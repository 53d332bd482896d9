//! Append-only logs embedded in each intervention row.
//!
//! Both logs serialize as plain JSON arrays. Neither type exposes a way to
//! remove, replace or reorder entries: the only mutation is `push`.

use serde::{Deserialize, Serialize};

use crate::status::Status;

/// One workflow transition: who moved the intervention into which status, when.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusHistoryEntry {
    pub status: Status,
    /// Fixed-width UTC timestamp (see [`crate::timestamp`]).
    pub at: String,
    pub by: String,
}

/// Ordered, append-only status history.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StatusHistory(Vec<StatusHistoryEntry>);

impl StatusHistory {
    /// A fresh history holding only the creation entry.
    pub fn seeded(status: Status, at: impl Into<String>, by: impl Into<String>) -> Self {
        let mut history = Self::default();
        history.push(status, at, by);
        history
    }

    pub fn push(&mut self, status: Status, at: impl Into<String>, by: impl Into<String>) {
        self.0.push(StatusHistoryEntry {
            status,
            at: at.into(),
            by: by.into(),
        });
    }

    /// Copy of this history with one more entry; the receiver is untouched.
    pub fn appended(&self, status: Status, at: impl Into<String>, by: impl Into<String>) -> Self {
        let mut next = self.clone();
        next.push(status, at, by);
        next
    }

    pub fn entries(&self) -> &[StatusHistoryEntry] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn latest(&self) -> Option<&StatusHistoryEntry> {
        self.0.last()
    }

    /// True if `self` starts with every entry of `earlier`, in order.
    ///
    /// Used to check that a stored history only ever grew.
    pub fn extends(&self, earlier: &StatusHistory) -> bool {
        self.0.len() >= earlier.0.len() && self.0[..earlier.0.len()] == earlier.0[..]
    }
}

/// One step recorded while executing a plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionLogEntry {
    pub action: String,
    pub at: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
}

/// Ordered, append-only execution log.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExecutionLog(Vec<ExecutionLogEntry>);

impl ExecutionLog {
    pub fn push(&mut self, entry: ExecutionLogEntry) {
        self.0.push(entry);
    }

    pub fn appended(&self, entry: ExecutionLogEntry) -> Self {
        let mut next = self.clone();
        next.push(entry);
        next
    }

    pub fn entries(&self) -> &[ExecutionLogEntry] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seeded_history_has_one_entry() {
        let h = StatusHistory::seeded(Status::Open, "2025-01-01T00:00:00.000000Z", "system");
        assert_eq!(h.len(), 1);
        assert_eq!(h.latest().unwrap().status, Status::Open);
        assert_eq!(h.latest().unwrap().by, "system");
    }

    #[test]
    fn appended_leaves_original_untouched() {
        let h = StatusHistory::seeded(Status::Open, "t0", "system");
        let next = h.appended(Status::Assigned, "t1", "alice");
        assert_eq!(h.len(), 1);
        assert_eq!(next.len(), 2);
        assert!(next.extends(&h));
        assert!(!h.extends(&next));
    }

    #[test]
    fn extends_detects_rewritten_prefix() {
        let a = StatusHistory::seeded(Status::Open, "t0", "system");
        let b = StatusHistory::seeded(Status::Open, "t0", "someone-else")
            .appended(Status::Assigned, "t1", "bob");
        assert!(!b.extends(&a));
    }

    #[test]
    fn serializes_as_plain_array() {
        let h = StatusHistory::seeded(Status::Open, "t0", "system");
        let json = serde_json::to_value(&h).unwrap();
        assert_eq!(
            json,
            serde_json::json!([{"status": "open", "at": "t0", "by": "system"}])
        );
        let back: StatusHistory = serde_json::from_value(json).unwrap();
        assert_eq!(back, h);
    }

    #[test]
    fn execution_log_omits_empty_fields() {
        let mut log = ExecutionLog::default();
        log.push(ExecutionLogEntry {
            action: "execution_started".into(),
            at: "t0".into(),
            by: Some("agent-1".into()),
            result: None,
        });
        let json = serde_json::to_value(&log).unwrap();
        assert_eq!(
            json,
            serde_json::json!([{"action": "execution_started", "at": "t0", "by": "agent-1"}])
        );
    }
}
