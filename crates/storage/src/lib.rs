//! Persistence layer for ERP interventions.
//!
//! Defines the [`InterventionRecord`] row shape, the [`InterventionBackend`]
//! trait every store runs on, and two implementations: an in-process
//! [`MemoryBackend`] and a SQL [`WarehouseBackend`].

pub mod conformance;
mod error;
mod filter;
mod history;
mod memory;
mod patch;
mod record;
mod status;
pub mod timestamp;
mod traits;
pub mod warehouse;

pub use error::StorageError;
pub use filter::{ListOrder, RecordFilter};
pub use history::{ExecutionLog, ExecutionLogEntry, StatusHistory, StatusHistoryEntry};
pub use memory::MemoryBackend;
pub use patch::{Field, FieldValue, Patch, JSON_COLUMNS};
pub use record::{AgentRollup, GroupCount, InsertOutcome, InterventionRecord};
pub use status::{
    ApprovalStatus, AssigneeType, ExecutionStatus, PlanStatus, Priority, Status, UnknownVariant,
    RESOLUTION_FIXED,
};
pub use traits::InterventionBackend;
pub use warehouse::{HttpWarehouseClient, WarehouseBackend, WarehouseClient};
