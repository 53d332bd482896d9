use sentinel_storage::{Status, StorageError};

/// Why a store operation failed.
///
/// Never crosses the public store API: each operation logs it and degrades
/// to `false`, `None` or an empty list.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("cannot {operation} intervention {task_id} in status {status}")]
    IllegalTransition {
        task_id: String,
        operation: &'static str,
        status: Status,
    },

    #[error("intervention {task_id} is already assigned to {assignee_id}")]
    AlreadyAssigned { task_id: String, assignee_id: String },

    #[error("invalid plan for intervention {task_id}: {reason}")]
    InvalidPlan { task_id: String, reason: String },
}

impl StoreError {
    pub fn is_conflict(&self) -> bool {
        matches!(self, StoreError::Storage(e) if e.is_conflict())
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::Storage(StorageError::NotFound { .. }))
    }
}
