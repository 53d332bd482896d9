use serde::{Deserialize, Serialize};

use crate::history::{ExecutionLog, StatusHistory};
use crate::status::{
    ApprovalStatus, AssigneeType, ExecutionStatus, PlanStatus, Priority, Status,
};

/// One intervention row as stored in the backend.
///
/// The same shape holds both workflow interventions (mutated in place through
/// versioned patches) and append-only detection/resolution events (never
/// mutated after insert). All timestamps are fixed-width UTC strings, see
/// [`crate::timestamp`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InterventionRecord {
    // Identity
    pub task_id: String,
    pub dedup_key: String,
    /// Optimistic-concurrency counter. 0 on insert, +1 per applied patch.
    #[serde(default)]
    pub version: i64,

    // Provenance
    pub request_id: String,
    pub job_name: String,
    pub created_at: String,
    #[serde(default)]
    pub updated_at: Option<String>,
    pub environment: String,
    pub source_system: String,

    // Subject
    pub document_type: String,
    pub document_id: i64,
    #[serde(default)]
    pub document_name: Option<String>,
    #[serde(default)]
    pub document_url: Option<String>,
    #[serde(default)]
    pub related_documents: Vec<serde_json::Value>,

    // Classification
    pub issue_type: String,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default)]
    pub risk_level: Option<String>,
    #[serde(default)]
    pub department: Option<String>,
    #[serde(default)]
    pub process_category: Option<String>,
    #[serde(default)]
    pub due_at: Option<String>,

    // Opaque payloads, interpreted only by detection jobs
    #[serde(default)]
    pub detection_data: Option<serde_json::Value>,
    #[serde(default)]
    pub financial_data: Option<serde_json::Value>,
    #[serde(default)]
    pub metadata: Option<serde_json::Value>,

    // Workflow
    pub status: Status,
    #[serde(default)]
    pub status_history: StatusHistory,
    #[serde(default)]
    pub snoozed_until: Option<String>,
    #[serde(default)]
    pub assignee_id: Option<String>,
    #[serde(default)]
    pub assignee_type: Option<AssigneeType>,
    #[serde(default)]
    pub assigned_at: Option<String>,
    #[serde(default)]
    pub assigned_by: Option<String>,

    // Planning
    #[serde(default)]
    pub agent_model: Option<String>,
    #[serde(default)]
    pub agent_version: Option<String>,
    #[serde(default)]
    pub agent_capabilities: Vec<String>,
    #[serde(default)]
    pub plan_status: Option<PlanStatus>,
    #[serde(default)]
    pub planned_action: Option<serde_json::Value>,
    #[serde(default)]
    pub plan_reasoning: Option<String>,
    #[serde(default)]
    pub plan_confidence: Option<f64>,
    #[serde(default)]
    pub plan_created_at: Option<String>,
    #[serde(default)]
    pub plan_alternatives: Option<serde_json::Value>,
    #[serde(default)]
    pub requires_approval: Option<bool>,
    #[serde(default)]
    pub approval_status: Option<ApprovalStatus>,
    #[serde(default)]
    pub approval_requested_at: Option<String>,
    #[serde(default)]
    pub approved_by: Option<String>,
    #[serde(default)]
    pub approved_at: Option<String>,
    #[serde(default)]
    pub rejection_reason: Option<String>,

    // Execution
    #[serde(default)]
    pub execution_status: Option<ExecutionStatus>,
    #[serde(default)]
    pub execution_started_at: Option<String>,
    #[serde(default)]
    pub execution_completed_at: Option<String>,
    #[serde(default)]
    pub execution_result: Option<serde_json::Value>,
    #[serde(default)]
    pub execution_log: ExecutionLog,

    // Resolution
    #[serde(default)]
    pub resolution_type: Option<String>,
    #[serde(default)]
    pub resolution_notes: Option<String>,
    #[serde(default)]
    pub resolution_data: Option<serde_json::Value>,
    #[serde(default)]
    pub resolved_by: Option<String>,
    #[serde(default)]
    pub resolved_at: Option<String>,
}

impl InterventionRecord {
    /// A minimal record with every optional field empty.
    ///
    /// Callers fill in the rest; the store uses this as the base for inserts.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        task_id: impl Into<String>,
        dedup_key: impl Into<String>,
        document_type: impl Into<String>,
        document_id: i64,
        issue_type: impl Into<String>,
        title: impl Into<String>,
        status: Status,
        created_at: impl Into<String>,
    ) -> Self {
        let created_at = created_at.into();
        InterventionRecord {
            task_id: task_id.into(),
            dedup_key: dedup_key.into(),
            version: 0,
            request_id: String::new(),
            job_name: String::new(),
            status_history: StatusHistory::seeded(status, created_at.clone(), "system"),
            created_at,
            updated_at: None,
            environment: String::new(),
            source_system: String::new(),
            document_type: document_type.into(),
            document_id,
            document_name: None,
            document_url: None,
            related_documents: Vec::new(),
            issue_type: issue_type.into(),
            title: title.into(),
            description: None,
            priority: Priority::default(),
            risk_level: None,
            department: None,
            process_category: None,
            due_at: None,
            detection_data: None,
            financial_data: None,
            metadata: None,
            status,
            snoozed_until: None,
            assignee_id: None,
            assignee_type: None,
            assigned_at: None,
            assigned_by: None,
            agent_model: None,
            agent_version: None,
            agent_capabilities: Vec::new(),
            plan_status: None,
            planned_action: None,
            plan_reasoning: None,
            plan_confidence: None,
            plan_created_at: None,
            plan_alternatives: None,
            requires_approval: None,
            approval_status: None,
            approval_requested_at: None,
            approved_by: None,
            approved_at: None,
            rejection_reason: None,
            execution_status: None,
            execution_started_at: None,
            execution_completed_at: None,
            execution_result: None,
            execution_log: ExecutionLog::default(),
            resolution_type: None,
            resolution_notes: None,
            resolution_data: None,
            resolved_by: None,
            resolved_at: None,
        }
    }

    /// True when no worker holds this intervention.
    pub fn is_unassigned(&self) -> bool {
        self.assignee_id.as_deref().map_or(true, str::is_empty)
    }
}

/// Outcome of an atomic insert-unless-open.
#[derive(Debug, Clone, PartialEq)]
pub enum InsertOutcome {
    /// The row was inserted.
    Inserted,
    /// An open row with the same dedup key already existed; nothing was written.
    Existing(Box<InterventionRecord>),
}

/// One group of a `(status, priority, issue_type)` count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupCount {
    pub status: Status,
    pub priority: Priority,
    pub issue_type: String,
    pub count: u64,
}

/// Raw per-agent rollup computed by the backend.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AgentRollup {
    pub total_tasks: u64,
    /// Resolved with resolution type `fixed`.
    pub successful: u64,
    pub failed: u64,
    pub avg_confidence: Option<f64>,
    pub avg_resolution_minutes: Option<f64>,
}
