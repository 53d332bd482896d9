/// All errors that can be returned by an `InterventionBackend` implementation.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// Optimistic concurrency control conflict: another writer updated the
    /// intervention since it was read. The expected version was not found.
    #[error("concurrent conflict on intervention {task_id}: expected version {expected_version}")]
    Conflict {
        task_id: String,
        expected_version: i64,
    },

    /// No row with the given `task_id`.
    #[error("intervention not found: {task_id}")]
    NotFound { task_id: String },

    /// The backend accepted the request but rejected the row(s), e.g. a
    /// streaming insert that returned per-row errors.
    #[error("insert rejected for intervention {task_id}: {}", reasons.join("; "))]
    InsertRejected {
        task_id: String,
        reasons: Vec<String>,
    },

    /// A row could not be encoded to, or decoded from, the persisted shape.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// A backend-specific storage error (network, malformed query, schema
    /// mismatch, I/O).
    #[error("storage backend error: {0}")]
    Backend(String),
}

impl StorageError {
    /// True for the optimistic-concurrency conflict variant.
    pub fn is_conflict(&self) -> bool {
        matches!(self, StorageError::Conflict { .. })
    }
}

impl From<serde_json::Error> for StorageError {
    fn from(e: serde_json::Error) -> Self {
        StorageError::Serialization(e.to_string())
    }
}
