//! Workflow operations on a single intervention.
//!
//! Every operation here reads the row, derives a patch from what it read and
//! writes the patch conditional on the version it read. Each status change
//! appends exactly one `status_history` entry. Operations return `true` when
//! the patch was written and `false` when the row is missing, the move is not
//! allowed from the current status, or another writer got there first.

use serde_json::Value;
use time::OffsetDateTime;

use sentinel_storage::timestamp::format_timestamp;
use sentinel_storage::{
    ApprovalStatus, AssigneeType, ExecutionLogEntry, ExecutionStatus, Field, InterventionBackend,
    InterventionRecord, Patch, PlanStatus, Status, RESOLUTION_FIXED,
};

use crate::error::StoreError;
use crate::notify::{Notification, Severity};
use crate::store::InterventionStore;

/// A plan an agent proposes for an intervention.
#[derive(Debug, Clone, PartialEq)]
pub struct PlanSubmission {
    pub agent_id: String,
    pub planned_action: Value,
    pub reasoning: String,
    /// In `[0, 1]`.
    pub confidence: f64,
    /// Overrides the approval policy when set.
    pub requires_approval: Option<bool>,
    pub alternatives: Option<Value>,
    pub agent_model: Option<String>,
    pub agent_version: Option<String>,
    pub agent_capabilities: Vec<String>,
}

impl PlanSubmission {
    pub fn new(
        agent_id: impl Into<String>,
        planned_action: Value,
        reasoning: impl Into<String>,
        confidence: f64,
    ) -> Self {
        PlanSubmission {
            agent_id: agent_id.into(),
            planned_action,
            reasoning: reasoning.into(),
            confidence,
            requires_approval: None,
            alternatives: None,
            agent_model: None,
            agent_version: None,
            agent_capabilities: Vec::new(),
        }
    }

    pub fn with_requires_approval(mut self, requires_approval: bool) -> Self {
        self.requires_approval = Some(requires_approval);
        self
    }

    pub fn with_alternatives(mut self, alternatives: Value) -> Self {
        self.alternatives = Some(alternatives);
        self
    }

    pub fn with_agent(
        mut self,
        model: impl Into<String>,
        version: impl Into<String>,
        capabilities: Vec<String>,
    ) -> Self {
        self.agent_model = Some(model.into());
        self.agent_version = Some(version.into());
        self.agent_capabilities = capabilities;
        self
    }
}

/// Patch moving `current` to `next`: status, one history entry, and the
/// bookkeeping that keeps `resolved_at` and `snoozed_until` in step with the
/// status.
fn transition(
    current: &InterventionRecord,
    next: Status,
    now: &str,
    by: &str,
) -> Result<Patch, StoreError> {
    let history = current.status_history.appended(next, now, by);
    let mut patch = Patch::new()
        .set(Field::Status, next)
        .set_json(Field::StatusHistory, &history)?;
    if next == Status::Resolved {
        patch = patch.set(Field::ResolvedAt, now);
    } else if current.resolved_at.is_some() {
        patch = patch.clear(Field::ResolvedAt);
    }
    if current.status == Status::Snoozed && next != Status::Snoozed {
        patch = patch.clear(Field::SnoozedUntil);
    }
    Ok(patch)
}

fn with_note(current: &InterventionRecord, line: String) -> String {
    match current.description.as_deref() {
        Some(description) if !description.is_empty() => format!("{description}\n{line}"),
        _ => line,
    }
}

fn log_entry(action: &str, at: &str, by: Option<&str>, result: Option<Value>) -> ExecutionLogEntry {
    ExecutionLogEntry {
        action: action.to_string(),
        at: at.to_string(),
        by: by.map(str::to_string),
        result,
    }
}

impl<B: InterventionBackend> InterventionStore<B> {
    // ── Assignment ──────────────────────────────────────────────────────────

    pub async fn assign(
        &self,
        task_id: &str,
        assignee_id: &str,
        assignee_type: AssigneeType,
        assigned_by: &str,
    ) -> bool {
        self.mutate(task_id, "assign", |current, now| {
            Ok(transition(current, Status::Assigned, now, assigned_by)?
                .set(Field::AssigneeId, assignee_id)
                .set(Field::AssigneeType, assignee_type)
                .set(Field::AssignedAt, now)
                .set(Field::AssignedBy, assigned_by))
        })
        .await
    }

    /// Assign an unassigned intervention to the caller.
    ///
    /// Of several concurrent claims on the same row, at most one succeeds:
    /// the emptiness check and the write are tied to the same version.
    pub async fn claim(&self, task_id: &str, assignee_id: &str, assignee_type: AssigneeType) -> bool {
        self.mutate(task_id, "claim", |current, now| {
            if !current.is_unassigned() {
                return Err(StoreError::AlreadyAssigned {
                    task_id: current.task_id.clone(),
                    assignee_id: current.assignee_id.clone().unwrap_or_default(),
                });
            }
            Ok(transition(current, Status::Assigned, now, assignee_id)?
                .set(Field::AssigneeId, assignee_id)
                .set(Field::AssigneeType, assignee_type)
                .set(Field::AssignedAt, now)
                .set(Field::AssignedBy, assignee_id))
        })
        .await
    }

    // ── Status moves ────────────────────────────────────────────────────────

    /// Defer an intervention until `until`. Terminal interventions cannot be
    /// snoozed.
    pub async fn snooze(
        &self,
        task_id: &str,
        until: OffsetDateTime,
        snoozed_by: &str,
        reason: Option<&str>,
    ) -> bool {
        self.mutate(task_id, "snooze", |current, now| {
            if current.status.is_terminal() {
                return Err(StoreError::IllegalTransition {
                    task_id: current.task_id.clone(),
                    operation: "snooze",
                    status: current.status,
                });
            }
            let mut patch = transition(current, Status::Snoozed, now, snoozed_by)?
                .set(Field::SnoozedUntil, format_timestamp(until));
            if let Some(reason) = reason {
                patch = patch.set(
                    Field::Description,
                    with_note(current, format!("[Snoozed by {snoozed_by}] {reason}")),
                );
            }
            Ok(patch)
        })
        .await
    }

    pub async fn resolve(
        &self,
        task_id: &str,
        resolution_type: &str,
        resolved_by: &str,
        notes: Option<&str>,
        data: Option<Value>,
    ) -> bool {
        self.mutate(task_id, "resolve", |current, now| {
            Ok(transition(current, Status::Resolved, now, resolved_by)?
                .set(Field::ResolutionType, resolution_type)
                .set(Field::ResolvedBy, resolved_by)
                .set(Field::ResolutionNotes, notes)
                .set(Field::ResolutionData, data))
        })
        .await
    }

    /// Move to another status, optionally appending a note to the description.
    ///
    /// `awaiting_approval` and `executing` carry approval state and are only
    /// reachable through [`submit_plan`](Self::submit_plan) and
    /// [`approve_plan`](Self::approve_plan).
    pub async fn update_status(
        &self,
        task_id: &str,
        status: Status,
        updated_by: &str,
        notes: Option<&str>,
    ) -> bool {
        self.mutate(task_id, "update_status", |current, now| {
            if matches!(status, Status::AwaitingApproval | Status::Executing) {
                return Err(StoreError::IllegalTransition {
                    task_id: current.task_id.clone(),
                    operation: "update_status",
                    status: current.status,
                });
            }
            let mut patch = transition(current, status, now, updated_by)?;
            if status == Status::Resolved {
                patch = patch.set(Field::ResolvedBy, updated_by);
            }
            if let Some(notes) = notes {
                patch = patch.set(
                    Field::Description,
                    with_note(current, format!("[{updated_by}] {notes}")),
                );
            }
            Ok(patch)
        })
        .await
    }

    // ── Planning ────────────────────────────────────────────────────────────

    /// Record an agent's plan.
    ///
    /// A plan below the approval threshold for the issue type (or one that
    /// explicitly asks for approval) is held in `awaiting_approval` and
    /// announced to the notifier; any other plan is approved on the spot and
    /// the intervention moves straight to `executing`.
    pub async fn submit_plan(&self, task_id: &str, plan: PlanSubmission) -> bool {
        let mut held = false;
        let mut threshold = 0.0;
        let result = self
            .try_mutate(task_id, |current, now| {
                if !(0.0..=1.0).contains(&plan.confidence) {
                    return Err(StoreError::InvalidPlan {
                        task_id: current.task_id.clone(),
                        reason: format!("confidence {} is outside [0, 1]", plan.confidence),
                    });
                }
                threshold = self.approval_policy().threshold(&current.issue_type);
                held = plan.requires_approval.unwrap_or_else(|| {
                    self.approval_policy()
                        .requires_approval(&current.issue_type, plan.confidence)
                });
                let (next, approval) = if held {
                    (Status::AwaitingApproval, ApprovalStatus::Pending)
                } else {
                    (Status::Executing, ApprovalStatus::Approved)
                };
                let mut patch = transition(current, next, now, &plan.agent_id)?
                    .set(Field::AgentModel, plan.agent_model.as_deref())
                    .set(Field::AgentVersion, plan.agent_version.as_deref())
                    .set_json(Field::AgentCapabilities, &plan.agent_capabilities)?
                    .set(Field::PlanStatus, PlanStatus::Planned)
                    .set(Field::PlannedAction, plan.planned_action.clone())
                    .set(Field::PlanReasoning, plan.reasoning.as_str())
                    .set(Field::PlanConfidence, plan.confidence)
                    .set(Field::PlanCreatedAt, now)
                    .set(Field::PlanAlternatives, plan.alternatives.clone())
                    .set(Field::RequiresApproval, held)
                    .set(Field::ApprovalStatus, approval)
                    .clear(Field::ApprovedBy)
                    .clear(Field::ApprovedAt)
                    .clear(Field::RejectionReason);
                patch = if held {
                    patch.set(Field::ApprovalRequestedAt, now)
                } else {
                    patch.clear(Field::ApprovalRequestedAt)
                };
                Ok(patch)
            })
            .await;
        let Some(before) = self.report(task_id, "submit_plan", result) else {
            return false;
        };
        if held {
            self.notify(
                Notification::new(format!("Plan awaiting approval: {}", before.title), Severity::Warning)
                    .field("Task", task_id)
                    .field("Issue", before.issue_type.as_str())
                    .field("Agent", plan.agent_id.as_str())
                    .field("Confidence", format!("{:.2}", plan.confidence))
                    .footer(format!("Approval threshold: {threshold:.2}")),
            );
        }
        true
    }

    /// Sign off a held plan. Only valid from `awaiting_approval`.
    pub async fn approve_plan(&self, task_id: &str, approved_by: &str, notes: Option<&str>) -> bool {
        self.mutate(task_id, "approve_plan", |current, now| {
            if current.status != Status::AwaitingApproval {
                return Err(StoreError::IllegalTransition {
                    task_id: current.task_id.clone(),
                    operation: "approve_plan",
                    status: current.status,
                });
            }
            let mut patch = transition(current, Status::Executing, now, approved_by)?
                .set(Field::ApprovalStatus, ApprovalStatus::Approved)
                .set(Field::ApprovedBy, approved_by)
                .set(Field::ApprovedAt, now)
                .set(Field::PlanStatus, PlanStatus::Approved);
            if let Some(notes) = notes {
                patch = patch.set(
                    Field::Description,
                    with_note(current, format!("[{approved_by}] {notes}")),
                );
            }
            Ok(patch)
        })
        .await
    }

    /// Send the plan back to the agent for re-planning.
    pub async fn reject_plan(&self, task_id: &str, rejected_by: &str, reason: &str) -> bool {
        self.mutate(task_id, "reject_plan", |current, now| {
            Ok(transition(current, Status::Planning, now, rejected_by)?
                .set(Field::ApprovalStatus, ApprovalStatus::Rejected)
                .set(Field::ApprovedBy, rejected_by)
                .set(Field::ApprovedAt, now)
                .set(Field::RejectionReason, reason)
                .set(Field::PlanStatus, PlanStatus::Rejected))
        })
        .await
    }

    // ── Execution ───────────────────────────────────────────────────────────

    /// Mark execution as running. Does not change the workflow status.
    pub async fn start_execution(&self, task_id: &str, agent_id: &str) -> bool {
        self.mutate(task_id, "start_execution", |current, now| {
            let log = current
                .execution_log
                .appended(log_entry("execution_started", now, Some(agent_id), None));
            Patch::new()
                .set(Field::ExecutionStatus, ExecutionStatus::Running)
                .set(Field::ExecutionStartedAt, now)
                .set_json(Field::ExecutionLog, &log)
                .map_err(StoreError::from)
        })
        .await
    }

    pub async fn log_execution_step(
        &self,
        task_id: &str,
        action: &str,
        result: Option<Value>,
    ) -> bool {
        self.mutate(task_id, "log_execution_step", |current, now| {
            let log = current
                .execution_log
                .appended(log_entry(action, now, None, result));
            Patch::new()
                .set_json(Field::ExecutionLog, &log)
                .map_err(StoreError::from)
        })
        .await
    }

    /// Finish execution. Success resolves the intervention (as `fixed` unless
    /// a resolution type was already recorded); failure moves it to `failed`
    /// and leaves it unresolved.
    pub async fn complete_execution(
        &self,
        task_id: &str,
        agent_id: &str,
        success: bool,
        result: Option<Value>,
    ) -> bool {
        self.mutate(task_id, "complete_execution", |current, now| {
            let (next, execution, action) = if success {
                (Status::Resolved, ExecutionStatus::Completed, "execution_completed")
            } else {
                (Status::Failed, ExecutionStatus::Failed, "execution_failed")
            };
            let log = current
                .execution_log
                .appended(log_entry(action, now, Some(agent_id), None));
            let mut patch = transition(current, next, now, agent_id)?
                .set(Field::ExecutionStatus, execution)
                .set(Field::ExecutionCompletedAt, now)
                .set(Field::ExecutionResult, result)
                .set_json(Field::ExecutionLog, &log)?;
            if success {
                patch = patch.set(Field::ResolvedBy, agent_id);
                if current.resolution_type.is_none() {
                    patch = patch.set(Field::ResolutionType, RESOLUTION_FIXED);
                }
            }
            Ok(patch)
        })
        .await
    }
}
