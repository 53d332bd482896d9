//! Partial updates against an intervention row.
//!
//! A [`Patch`] is an ordered list of `(Field, FieldValue)` assignments. The
//! memory backend applies it to the typed record; the warehouse backend
//! turns it into the `SET` list of an `UPDATE` statement. Fields flagged by
//! [`Field::is_json`] are JSON-typed columns.

use serde::Serialize;

use crate::error::StorageError;
use crate::record::InterventionRecord;
use crate::status::{
    ApprovalStatus, AssigneeType, ExecutionStatus, PlanStatus, Priority, Status,
};

/// Mutable columns of the interventions table.
///
/// Identity and provenance columns (`task_id`, `dedup_key`, `created_at`,
/// `document_*`, `issue_type`, ...) are deliberately absent: they never
/// change after insert. `version` is maintained by the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    UpdatedAt,
    Title,
    Description,
    Priority,
    Department,
    Metadata,
    Status,
    StatusHistory,
    SnoozedUntil,
    AssigneeId,
    AssigneeType,
    AssignedAt,
    AssignedBy,
    AgentModel,
    AgentVersion,
    AgentCapabilities,
    PlanStatus,
    PlannedAction,
    PlanReasoning,
    PlanConfidence,
    PlanCreatedAt,
    PlanAlternatives,
    RequiresApproval,
    ApprovalStatus,
    ApprovalRequestedAt,
    ApprovedBy,
    ApprovedAt,
    RejectionReason,
    ExecutionStatus,
    ExecutionStartedAt,
    ExecutionCompletedAt,
    ExecutionResult,
    ExecutionLog,
    ResolutionType,
    ResolutionNotes,
    ResolutionData,
    ResolvedBy,
    ResolvedAt,
}

impl Field {
    /// Column name in the table and key in the serialized record.
    pub fn name(&self) -> &'static str {
        match self {
            Field::UpdatedAt => "updated_at",
            Field::Title => "title",
            Field::Description => "description",
            Field::Priority => "priority",
            Field::Department => "department",
            Field::Metadata => "metadata",
            Field::Status => "status",
            Field::StatusHistory => "status_history",
            Field::SnoozedUntil => "snoozed_until",
            Field::AssigneeId => "assignee_id",
            Field::AssigneeType => "assignee_type",
            Field::AssignedAt => "assigned_at",
            Field::AssignedBy => "assigned_by",
            Field::AgentModel => "agent_model",
            Field::AgentVersion => "agent_version",
            Field::AgentCapabilities => "agent_capabilities",
            Field::PlanStatus => "plan_status",
            Field::PlannedAction => "planned_action",
            Field::PlanReasoning => "plan_reasoning",
            Field::PlanConfidence => "plan_confidence",
            Field::PlanCreatedAt => "plan_created_at",
            Field::PlanAlternatives => "plan_alternatives",
            Field::RequiresApproval => "requires_approval",
            Field::ApprovalStatus => "approval_status",
            Field::ApprovalRequestedAt => "approval_requested_at",
            Field::ApprovedBy => "approved_by",
            Field::ApprovedAt => "approved_at",
            Field::RejectionReason => "rejection_reason",
            Field::ExecutionStatus => "execution_status",
            Field::ExecutionStartedAt => "execution_started_at",
            Field::ExecutionCompletedAt => "execution_completed_at",
            Field::ExecutionResult => "execution_result",
            Field::ExecutionLog => "execution_log",
            Field::ResolutionType => "resolution_type",
            Field::ResolutionNotes => "resolution_notes",
            Field::ResolutionData => "resolution_data",
            Field::ResolvedBy => "resolved_by",
            Field::ResolvedAt => "resolved_at",
        }
    }

    /// JSON-typed column: written with `PARSE_JSON` and as a JSON string in
    /// streaming inserts.
    pub fn is_json(&self) -> bool {
        matches!(
            self,
            Field::Metadata
                | Field::StatusHistory
                | Field::AgentCapabilities
                | Field::PlannedAction
                | Field::PlanAlternatives
                | Field::ExecutionResult
                | Field::ExecutionLog
                | Field::ResolutionData
        )
    }
}

/// Column names of every JSON-typed column, including insert-only ones.
pub const JSON_COLUMNS: &[&str] = &[
    "related_documents",
    "detection_data",
    "financial_data",
    "metadata",
    "status_history",
    "agent_capabilities",
    "planned_action",
    "plan_alternatives",
    "execution_result",
    "execution_log",
    "resolution_data",
];

/// A value assigned to one column.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Null,
    Text(String),
    Integer(i64),
    Float(f64),
    Bool(bool),
    Json(serde_json::Value),
}

impl FieldValue {
    /// Serialize any value into a JSON column value.
    pub fn json<T: Serialize + ?Sized>(value: &T) -> Result<Self, StorageError> {
        Ok(FieldValue::Json(serde_json::to_value(value)?))
    }

    /// The value as it appears in the serialized record.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            FieldValue::Null => serde_json::Value::Null,
            FieldValue::Text(s) => serde_json::Value::String(s.clone()),
            FieldValue::Integer(i) => serde_json::Value::from(*i),
            FieldValue::Float(f) => serde_json::Value::from(*f),
            FieldValue::Bool(b) => serde_json::Value::Bool(*b),
            FieldValue::Json(v) => v.clone(),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, FieldValue::Null)
    }
}

impl From<&str> for FieldValue {
    fn from(s: &str) -> Self {
        FieldValue::Text(s.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(s: String) -> Self {
        FieldValue::Text(s)
    }
}

impl From<&String> for FieldValue {
    fn from(s: &String) -> Self {
        FieldValue::Text(s.clone())
    }
}

impl From<i64> for FieldValue {
    fn from(i: i64) -> Self {
        FieldValue::Integer(i)
    }
}

impl From<f64> for FieldValue {
    fn from(f: f64) -> Self {
        FieldValue::Float(f)
    }
}

impl From<bool> for FieldValue {
    fn from(b: bool) -> Self {
        FieldValue::Bool(b)
    }
}

impl From<serde_json::Value> for FieldValue {
    fn from(v: serde_json::Value) -> Self {
        match v {
            serde_json::Value::Null => FieldValue::Null,
            other => FieldValue::Json(other),
        }
    }
}

impl<T: Into<FieldValue>> From<Option<T>> for FieldValue {
    fn from(v: Option<T>) -> Self {
        v.map_or(FieldValue::Null, Into::into)
    }
}

macro_rules! text_value_from_enum {
    ($($ty:ty),+) => {
        $(impl From<$ty> for FieldValue {
            fn from(v: $ty) -> Self {
                FieldValue::Text(v.as_str().to_string())
            }
        })+
    };
}

text_value_from_enum!(
    Status,
    Priority,
    AssigneeType,
    PlanStatus,
    ApprovalStatus,
    ExecutionStatus
);

/// An ordered set of column assignments.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Patch {
    entries: Vec<(Field, FieldValue)>,
}

impl Patch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Assign a column. A later assignment to the same field replaces the
    /// earlier one in place.
    pub fn set(mut self, field: Field, value: impl Into<FieldValue>) -> Self {
        let value = value.into();
        match self.entries.iter_mut().find(|(f, _)| *f == field) {
            Some(slot) => slot.1 = value,
            None => self.entries.push((field, value)),
        }
        self
    }

    /// Assign a JSON column from any serializable value.
    pub fn set_json<T: Serialize + ?Sized>(
        self,
        field: Field,
        value: &T,
    ) -> Result<Self, StorageError> {
        Ok(self.set(field, FieldValue::json(value)?))
    }

    pub fn clear(self, field: Field) -> Self {
        self.set(field, FieldValue::Null)
    }

    pub fn entries(&self) -> &[(Field, FieldValue)] {
        &self.entries
    }

    pub fn get(&self, field: Field) -> Option<&FieldValue> {
        self.entries
            .iter()
            .find(|(f, _)| *f == field)
            .map(|(_, v)| v)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Apply the assignments to a record, returning the patched copy.
    ///
    /// The record goes through its serialized form so that every assignment
    /// is type-checked by the same `Deserialize` impl that reads rows back.
    /// `version` is left untouched; backends bump it.
    pub fn apply_to(&self, record: &InterventionRecord) -> Result<InterventionRecord, StorageError> {
        let mut value = serde_json::to_value(record)?;
        let obj = value.as_object_mut().ok_or_else(|| {
            StorageError::Serialization("intervention record is not a JSON object".to_string())
        })?;
        for (field, v) in &self.entries {
            obj.insert(field.name().to_string(), v.to_json());
        }
        serde_json::from_value(value).map_err(|e| {
            StorageError::Serialization(format!(
                "patch for {} does not fit the record: {e}",
                record.task_id
            ))
        })
    }
}
