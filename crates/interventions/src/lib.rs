//! Intervention lifecycle and audit engine.
//!
//! Detection jobs report issues through an [`InterventionTracker`]; operators
//! and AI agents move interventions through the workflow with the lifecycle
//! operations on [`InterventionStore`]; reporting reads the same table through
//! [`InterventionStore::get_stats`] and [`derive_statuses`].

pub mod aggregate;
pub mod clock;
pub mod config;
pub mod context;
pub mod dedup;
pub mod derive;
mod error;
mod lifecycle;
pub mod notify;
pub mod store;
pub mod tracker;

pub use aggregate::{AgentPerformance, InterventionStats};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{ApprovalPolicy, ConfigError, EngineConfig, TrackerConfig};
pub use context::{RequestContext, TriggerSource};
pub use dedup::{dedup_key, DedupKey};
pub use derive::{derive_statuses, DerivationScope, DerivedIssue, DerivedStatus};
pub use error::StoreError;
pub use lifecycle::PlanSubmission;
pub use notify::{NoopNotifier, Notification, Notifier, Severity, WebhookNotifier};
pub use store::{InterventionQuery, InterventionStore, NewIntervention};
pub use tracker::{Detection, InterventionTracker, Resolution, TrackerSummary};

pub use sentinel_storage as storage;
