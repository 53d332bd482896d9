//! The intervention record store.
//!
//! [`InterventionStore`] is the only component that reads or writes
//! intervention rows. It never returns an error: every backend failure is
//! logged here and turned into `None`, `false` or an empty list, so a broken
//! warehouse can never fail the detection job that called it.

mod queue;

pub use queue::DEFAULT_QUEUE_LIMIT;

use std::fmt;
use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use sentinel_storage::{
    AssigneeType, Field, InsertOutcome, InterventionBackend, InterventionRecord, ListOrder, Patch,
    Priority, RecordFilter, StorageError, Status,
};

use crate::clock::{Clock, SystemClock};
use crate::config::ApprovalPolicy;
use crate::context::RequestContext;
use crate::dedup::dedup_key;
use crate::error::StoreError;
use crate::notify::{NoopNotifier, Notification, Notifier};

/// Value written to `source_system` on every row this engine creates.
pub const SOURCE_SYSTEM: &str = "sentinel-ops";

/// Fields for a new intervention row.
///
/// Only the subject and title are required; everything else defaults to
/// empty with status `open` and priority `medium`.
#[derive(Debug, Clone, PartialEq)]
pub struct NewIntervention {
    pub document_type: String,
    pub document_id: i64,
    pub issue_type: String,
    pub title: String,
    pub status: Status,
    pub priority: Priority,
    pub description: Option<String>,
    pub department: Option<String>,
    pub document_name: Option<String>,
    pub document_url: Option<String>,
    pub related_documents: Vec<Value>,
    pub risk_level: Option<String>,
    pub process_category: Option<String>,
    pub due_at: Option<String>,
    pub detection_data: Option<Value>,
    pub financial_data: Option<Value>,
    pub metadata: Option<Value>,
    pub resolution_type: Option<String>,
    pub resolution_notes: Option<String>,
    pub resolution_data: Option<Value>,
    pub resolved_by: Option<String>,
}

impl NewIntervention {
    pub fn new(
        document_type: impl Into<String>,
        document_id: i64,
        issue_type: impl Into<String>,
        title: impl Into<String>,
    ) -> Self {
        NewIntervention {
            document_type: document_type.into(),
            document_id,
            issue_type: issue_type.into(),
            title: title.into(),
            status: Status::Open,
            priority: Priority::default(),
            description: None,
            department: None,
            document_name: None,
            document_url: None,
            related_documents: Vec::new(),
            risk_level: None,
            process_category: None,
            due_at: None,
            detection_data: None,
            financial_data: None,
            metadata: None,
            resolution_type: None,
            resolution_notes: None,
            resolution_data: None,
            resolved_by: None,
        }
    }

    pub fn with_status(mut self, status: Status) -> Self {
        self.status = status;
        self
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_department(mut self, department: impl Into<String>) -> Self {
        self.department = Some(department.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_detection_data(mut self, data: Value) -> Self {
        self.detection_data = Some(data);
        self
    }

    pub fn with_metadata(mut self, metadata: Value) -> Self {
        self.metadata = Some(metadata);
        self
    }

    pub fn dedup_key(&self) -> String {
        dedup_key(&self.document_type, self.document_id, &self.issue_type)
    }
}

/// Filter for [`InterventionStore::query`]. Unset fields match everything.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InterventionQuery {
    pub status: Option<Status>,
    pub assignee_id: Option<String>,
    pub assignee_type: Option<AssigneeType>,
    pub department: Option<String>,
    pub priority: Option<Priority>,
    pub issue_type: Option<String>,
}

impl InterventionQuery {
    fn to_filter(&self) -> RecordFilter {
        RecordFilter {
            statuses: self.status.into_iter().collect(),
            assignee_id: self.assignee_id.clone(),
            assignee_type: self.assignee_type,
            department: self.department.clone(),
            priority: self.priority,
            issue_types: self.issue_type.iter().cloned().collect(),
            ..Default::default()
        }
    }
}

/// Intervention store over any [`InterventionBackend`].
pub struct InterventionStore<B> {
    backend: Arc<B>,
    clock: Arc<dyn Clock>,
    policy: ApprovalPolicy,
    notifier: Arc<dyn Notifier>,
}

impl<B> Clone for InterventionStore<B> {
    fn clone(&self) -> Self {
        InterventionStore {
            backend: Arc::clone(&self.backend),
            clock: Arc::clone(&self.clock),
            policy: self.policy.clone(),
            notifier: Arc::clone(&self.notifier),
        }
    }
}

impl<B> fmt::Debug for InterventionStore<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InterventionStore")
            .field("clock", &self.clock)
            .field("policy", &self.policy)
            .field("notifier", &self.notifier)
            .finish_non_exhaustive()
    }
}

impl<B: InterventionBackend> InterventionStore<B> {
    /// A store on the system clock with the default approval policy and no
    /// notifications.
    pub fn new(backend: B) -> Self {
        InterventionStore {
            backend: Arc::new(backend),
            clock: Arc::new(SystemClock),
            policy: ApprovalPolicy::default(),
            notifier: Arc::new(NoopNotifier),
        }
    }

    pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    pub fn with_approval_policy(mut self, policy: ApprovalPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn approval_policy(&self) -> &ApprovalPolicy {
        &self.policy
    }

    pub(crate) fn now(&self) -> String {
        self.clock.now_string()
    }

    pub(crate) fn clock(&self) -> &dyn Clock {
        self.clock.as_ref()
    }

    pub(crate) fn notify(&self, notification: Notification) {
        self.notifier.notify(notification);
    }

    // ── Creation ────────────────────────────────────────────────────────────

    fn build_record(&self, ctx: &RequestContext, new: NewIntervention) -> InterventionRecord {
        let now = self.now();
        let dedup = new.dedup_key();
        let mut record = InterventionRecord::new(
            Uuid::new_v4().to_string(),
            dedup,
            new.document_type,
            new.document_id,
            new.issue_type,
            new.title,
            new.status,
            now.clone(),
        );
        record.request_id = ctx.request_id.clone();
        record.job_name = ctx.job_name.clone();
        record.environment = ctx.environment.clone();
        record.source_system = SOURCE_SYSTEM.to_string();
        record.priority = new.priority;
        record.description = new.description;
        record.department = new.department;
        record.document_name = new.document_name;
        record.document_url = new.document_url;
        record.related_documents = new.related_documents;
        record.risk_level = new.risk_level;
        record.process_category = new.process_category;
        record.due_at = new.due_at;
        record.detection_data = new.detection_data;
        record.financial_data = new.financial_data;
        record.metadata = new.metadata;
        record.resolution_type = new.resolution_type;
        record.resolution_notes = new.resolution_notes;
        record.resolution_data = new.resolution_data;
        record.resolved_by = new.resolved_by;
        if record.status == Status::Resolved {
            record.resolved_at = Some(now);
        }
        record
    }

    /// Insert one row unconditionally. Returns its task id.
    pub async fn create(&self, ctx: &RequestContext, new: NewIntervention) -> Option<String> {
        let record = self.build_record(ctx, new);
        let task_id = record.task_id.clone();
        let dedup = record.dedup_key.clone();
        let status = record.status;
        match self.backend.insert(record).await {
            Ok(()) => {
                info!(task_id = %task_id, dedup_key = %dedup, status = %status, job = %ctx.job_name, "intervention created");
                Some(task_id)
            }
            Err(e) => {
                error!(dedup_key = %dedup, job = %ctx.job_name, error = %e, "failed to create intervention");
                None
            }
        }
    }

    /// Insert a row unless one is already open for the same dedup key.
    ///
    /// Returns the task id of the new or existing row and whether a row was
    /// written. The check and the insert are one backend operation, so
    /// concurrent callers with the same key create exactly one row.
    pub async fn create_if_not_exists(
        &self,
        ctx: &RequestContext,
        new: NewIntervention,
    ) -> (Option<String>, bool) {
        let record = self.build_record(ctx, new);
        let task_id = record.task_id.clone();
        let dedup = record.dedup_key.clone();
        match self.backend.insert_unless_open(record).await {
            Ok(InsertOutcome::Inserted) => {
                info!(task_id = %task_id, dedup_key = %dedup, job = %ctx.job_name, "intervention created");
                (Some(task_id), true)
            }
            Ok(InsertOutcome::Existing(existing)) => {
                debug!(task_id = %existing.task_id, dedup_key = %dedup, "open intervention already exists");
                (Some(existing.task_id), false)
            }
            Err(e) => {
                error!(dedup_key = %dedup, job = %ctx.job_name, error = %e, "failed to create intervention");
                (None, false)
            }
        }
    }

    /// Append an `open` row recording that a job found an issue.
    pub async fn log_detection(&self, ctx: &RequestContext, new: NewIntervention) -> Option<String> {
        self.create(ctx, new.with_status(Status::Open)).await
    }

    /// Append a `resolved` row recording that a job fixed an issue.
    pub async fn log_resolution(
        &self,
        ctx: &RequestContext,
        mut new: NewIntervention,
        resolution_type: &str,
        resolved_by: &str,
    ) -> Option<String> {
        new.status = Status::Resolved;
        new.resolution_type = Some(resolution_type.to_string());
        new.resolved_by = Some(resolved_by.to_string());
        self.create(ctx, new).await
    }

    // ── Reads ───────────────────────────────────────────────────────────────

    pub async fn get(&self, task_id: &str) -> Option<InterventionRecord> {
        match self.backend.get(task_id).await {
            Ok(record) => Some(record),
            Err(e) => {
                if !matches!(e, StorageError::NotFound { .. }) {
                    error!(task_id, error = %e, "failed to read intervention");
                }
                None
            }
        }
    }

    /// Newest row for the subject whose status is neither closed nor resolved.
    pub async fn find_open(
        &self,
        document_type: &str,
        document_id: i64,
        issue_type: &str,
    ) -> Option<InterventionRecord> {
        let key = dedup_key(document_type, document_id, issue_type);
        match self.backend.find_open(&key).await {
            Ok(found) => found,
            Err(e) => {
                error!(dedup_key = %key, error = %e, "failed to look up open intervention");
                None
            }
        }
    }

    /// Rows matching `query`, critical first and oldest first within a
    /// priority. `limit` 0 means no limit.
    pub async fn query(&self, query: &InterventionQuery, limit: usize) -> Vec<InterventionRecord> {
        self.list(&query.to_filter(), ListOrder::PriorityFifo, limit)
            .await
    }

    pub(crate) async fn list(
        &self,
        filter: &RecordFilter,
        order: ListOrder,
        limit: usize,
    ) -> Vec<InterventionRecord> {
        match self.backend.list(filter, order, limit).await {
            Ok(rows) => rows,
            Err(e) => {
                error!(error = %e, "failed to query interventions");
                Vec::new()
            }
        }
    }

    // ── Updates ─────────────────────────────────────────────────────────────

    /// Read the row, build a patch from it and write the patch conditional on
    /// the version that was read. Returns the row as it was before the patch.
    pub(crate) async fn try_mutate<F>(
        &self,
        task_id: &str,
        build: F,
    ) -> Result<InterventionRecord, StoreError>
    where
        F: FnOnce(&InterventionRecord, &str) -> Result<Patch, StoreError>,
    {
        let current = self.backend.get(task_id).await?;
        let now = self.now();
        let patch = build(&current, &now)?.set(Field::UpdatedAt, now.as_str());
        self.backend.update(task_id, current.version, &patch).await?;
        Ok(current)
    }

    /// [`Self::try_mutate`] with the outcome logged and reduced to a flag.
    pub(crate) async fn mutate<F>(&self, task_id: &str, operation: &'static str, build: F) -> bool
    where
        F: FnOnce(&InterventionRecord, &str) -> Result<Patch, StoreError>,
    {
        let result = self.try_mutate(task_id, build).await;
        self.report(task_id, operation, result).is_some()
    }

    pub(crate) fn report<T>(
        &self,
        task_id: &str,
        operation: &'static str,
        result: Result<T, StoreError>,
    ) -> Option<T> {
        match result {
            Ok(value) => {
                info!(task_id, operation, "intervention updated");
                Some(value)
            }
            Err(e) if e.is_conflict() => {
                warn!(
                    task_id,
                    operation,
                    conflict = true,
                    "intervention changed concurrently, update skipped"
                );
                None
            }
            Err(
                e @ (StoreError::IllegalTransition { .. }
                | StoreError::AlreadyAssigned { .. }
                | StoreError::InvalidPlan { .. }),
            ) => {
                warn!(task_id, operation, error = %e, "update rejected");
                None
            }
            Err(e) => {
                error!(task_id, operation, error = %e, "failed to update intervention");
                None
            }
        }
    }
}
