use crate::record::InterventionRecord;
use crate::status::{ApprovalStatus, AssigneeType, Priority, Status};

/// Row filter understood by every backend.
///
/// All set conditions are ANDed. Empty vectors and `None` mean "no
/// condition". Timestamp bounds compare the fixed-width strings, so they
/// must be produced by [`crate::timestamp::format_timestamp`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordFilter {
    /// Status must be one of these.
    pub statuses: Vec<Status>,
    /// Status must be none of these.
    pub exclude_statuses: Vec<Status>,
    pub dedup_key: Option<String>,
    pub assignee_id: Option<String>,
    pub assignee_type: Option<AssigneeType>,
    /// Only rows with no assignee.
    pub unassigned: bool,
    pub department: Option<String>,
    pub priority: Option<Priority>,
    /// Issue type must be one of these.
    pub issue_types: Vec<String>,
    pub document_type: Option<String>,
    pub approval_status: Option<ApprovalStatus>,
    /// `created_at >= created_from`
    pub created_from: Option<String>,
    /// `created_at < created_before`
    pub created_before: Option<String>,
    /// `assigned_at >= assigned_from`
    pub assigned_from: Option<String>,
}

impl RecordFilter {
    /// Evaluate the filter against a record in memory.
    ///
    /// This is the reference semantics; SQL backends must agree with it.
    pub fn matches(&self, r: &InterventionRecord) -> bool {
        if !self.statuses.is_empty() && !self.statuses.contains(&r.status) {
            return false;
        }
        if self.exclude_statuses.contains(&r.status) {
            return false;
        }
        if let Some(key) = &self.dedup_key {
            if &r.dedup_key != key {
                return false;
            }
        }
        if let Some(id) = &self.assignee_id {
            if r.assignee_id.as_ref() != Some(id) {
                return false;
            }
        }
        if let Some(t) = self.assignee_type {
            if r.assignee_type != Some(t) {
                return false;
            }
        }
        if self.unassigned && !r.is_unassigned() {
            return false;
        }
        if let Some(dept) = &self.department {
            if r.department.as_ref() != Some(dept) {
                return false;
            }
        }
        if let Some(p) = self.priority {
            if r.priority != p {
                return false;
            }
        }
        if !self.issue_types.is_empty() && !self.issue_types.contains(&r.issue_type) {
            return false;
        }
        if let Some(dt) = &self.document_type {
            if &r.document_type != dt {
                return false;
            }
        }
        if let Some(a) = self.approval_status {
            if r.approval_status != Some(a) {
                return false;
            }
        }
        if let Some(from) = &self.created_from {
            if r.created_at.as_str() < from.as_str() {
                return false;
            }
        }
        if let Some(before) = &self.created_before {
            if r.created_at.as_str() >= before.as_str() {
                return false;
            }
        }
        if let Some(from) = &self.assigned_from {
            match &r.assigned_at {
                Some(at) if at.as_str() >= from.as_str() => {}
                _ => return false,
            }
        }
        true
    }
}

/// Result ordering for [`crate::InterventionBackend::list`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ListOrder {
    /// Priority rank (critical first), then `created_at` ascending.
    #[default]
    PriorityFifo,
    /// Newest first.
    CreatedDesc,
    /// Oldest first.
    CreatedAsc,
    /// Lowest `plan_confidence` first, then `approval_requested_at` ascending.
    ConfidenceAsc,
}

impl ListOrder {
    /// Sort records in place. Stable, so rows with equal keys keep insertion
    /// order.
    pub fn sort(&self, records: &mut [InterventionRecord]) {
        match self {
            ListOrder::PriorityFifo => records.sort_by(|a, b| {
                a.priority
                    .rank()
                    .cmp(&b.priority.rank())
                    .then_with(|| a.created_at.cmp(&b.created_at))
            }),
            ListOrder::CreatedDesc => records.sort_by(|a, b| b.created_at.cmp(&a.created_at)),
            ListOrder::CreatedAsc => records.sort_by(|a, b| a.created_at.cmp(&b.created_at)),
            ListOrder::ConfidenceAsc => records.sort_by(|a, b| {
                let ca = a.plan_confidence.unwrap_or(f64::MAX);
                let cb = b.plan_confidence.unwrap_or(f64::MAX);
                ca.total_cmp(&cb)
                    .then_with(|| a.approval_requested_at.cmp(&b.approval_requested_at))
            }),
        }
    }
}
