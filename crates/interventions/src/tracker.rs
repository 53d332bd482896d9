//! Per-job tracker facade.
//!
//! A detection job builds one [`InterventionTracker`] from its
//! [`TrackerConfig`] and reports every issue it finds or fixes through it.
//! When the config is disabled the tracker is the [`InterventionTracker::Disabled`]
//! variant and never touches the store.

use std::sync::{Mutex, MutexGuard};

use serde::Serialize;
use serde_json::{Map, Value};
use tracing::debug;

use sentinel_storage::{InterventionBackend, Priority};

use crate::config::{EngineConfig, TrackerConfig};
use crate::context::RequestContext;
use crate::notify::{Notification, Notifier, Severity};
use crate::store::{InterventionStore, NewIntervention};

/// Optional detail for [`InterventionTracker::detect`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Detection {
    /// Overrides the configured priority.
    pub priority: Option<Priority>,
    /// Overrides the configured department.
    pub department: Option<String>,
    pub description: Option<String>,
    pub document_name: Option<String>,
    pub document_url: Option<String>,
    pub detection_data: Option<Value>,
    pub financial_data: Option<Value>,
    /// Merged over the configured defaults.
    pub metadata: Option<Map<String, Value>>,
}

/// Optional detail for [`InterventionTracker::resolve`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Resolution {
    /// Overrides the tracker's job name as `resolved_by`.
    pub resolved_by: Option<String>,
    pub notes: Option<String>,
    pub data: Option<Value>,
    pub description: Option<String>,
}

/// What a tracker recorded during one run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TrackerSummary {
    pub detected: u64,
    pub resolved: u64,
    pub created: u64,
    pub deduplicated: u64,
    pub failed: u64,
}

impl TrackerSummary {
    pub fn is_empty(&self) -> bool {
        *self == TrackerSummary::default()
    }
}

/// Tracker state for an enabled job.
#[derive(Debug)]
pub struct ActiveTracker<B> {
    store: InterventionStore<B>,
    ctx: RequestContext,
    config: TrackerConfig,
    job_name: Option<String>,
    summary: Mutex<TrackerSummary>,
}

#[derive(Debug)]
pub enum InterventionTracker<B> {
    Active(ActiveTracker<B>),
    Disabled,
}

impl<B: InterventionBackend> InterventionTracker<B> {
    /// `job_name` is recorded as `resolved_by`; when unset the context's job
    /// name is used.
    pub fn new(
        store: InterventionStore<B>,
        ctx: RequestContext,
        config: TrackerConfig,
        job_name: Option<String>,
    ) -> Self {
        if !config.enabled {
            debug!(job = %ctx.job_name, issue_type = %config.issue_type, "tracker disabled");
            return InterventionTracker::Disabled;
        }
        InterventionTracker::Active(ActiveTracker {
            store,
            ctx,
            config,
            job_name,
            summary: Mutex::new(TrackerSummary::default()),
        })
    }

    /// Tracker for the context's job as configured in `[trackers.<job>]`.
    /// A job without a section gets a disabled tracker.
    pub fn for_job(store: InterventionStore<B>, ctx: RequestContext, config: &EngineConfig) -> Self {
        match config.tracker(&ctx.job_name) {
            Some(tracker) => {
                let job_name = Some(ctx.job_name.clone());
                Self::new(store, ctx, tracker.clone(), job_name)
            }
            None => InterventionTracker::Disabled,
        }
    }

    pub fn is_enabled(&self) -> bool {
        matches!(self, InterventionTracker::Active(_))
    }

    /// Record that the job found an issue on `document_id`.
    pub async fn detect(&self, document_id: i64, title: &str, detection: Detection) -> Option<String> {
        let InterventionTracker::Active(t) = self else {
            return None;
        };
        let mut new = NewIntervention::new(
            t.config.document_type.as_str(),
            document_id,
            t.config.issue_type.as_str(),
            title,
        )
        .with_priority(detection.priority.unwrap_or(t.config.priority));
        new.department = detection.department.or_else(|| t.config.department.clone());
        new.description = detection.description;
        new.document_name = detection.document_name;
        new.document_url = detection.document_url;
        new.detection_data = detection.detection_data;
        new.financial_data = detection.financial_data;
        new.metadata = t.metadata(detection.metadata);

        let id = t.store.log_detection(&t.ctx, new).await;
        t.record(|s| {
            if id.is_some() {
                s.detected += 1;
            } else {
                s.failed += 1;
            }
        });
        id
    }

    /// Record that the job fixed the issue on `document_id`.
    pub async fn resolve(
        &self,
        document_id: i64,
        title: &str,
        resolution_type: &str,
        resolution: Resolution,
    ) -> Option<String> {
        let InterventionTracker::Active(t) = self else {
            return None;
        };
        let resolved_by = resolution
            .resolved_by
            .or_else(|| t.job_name.clone())
            .unwrap_or_else(|| t.ctx.job_name.clone());
        let mut new = NewIntervention::new(
            t.config.document_type.as_str(),
            document_id,
            t.config.issue_type.as_str(),
            title,
        )
        .with_priority(t.config.priority);
        new.department = t.config.department.clone();
        new.description = resolution.description;
        new.resolution_notes = resolution.notes;
        new.resolution_data = resolution.data;
        new.metadata = t.metadata(None);

        let id = t
            .store
            .log_resolution(&t.ctx, new, resolution_type, &resolved_by)
            .await;
        t.record(|s| {
            if id.is_some() {
                s.resolved += 1;
            } else {
                s.failed += 1;
            }
        });
        id
    }

    /// Plain [`InterventionStore::create`] in the tracker's context.
    pub async fn create(&self, new: NewIntervention) -> Option<String> {
        let InterventionTracker::Active(t) = self else {
            return None;
        };
        let id = t.store.create(&t.ctx, new).await;
        t.record(|s| {
            if id.is_some() {
                s.created += 1;
            } else {
                s.failed += 1;
            }
        });
        id
    }

    /// [`InterventionStore::create_if_not_exists`] in the tracker's context.
    pub async fn create_if_not_exists(&self, new: NewIntervention) -> (Option<String>, bool) {
        let InterventionTracker::Active(t) = self else {
            return (None, false);
        };
        let (id, created) = t.store.create_if_not_exists(&t.ctx, new).await;
        t.record(|s| match (&id, created) {
            (Some(_), true) => s.created += 1,
            (Some(_), false) => s.deduplicated += 1,
            (None, _) => s.failed += 1,
        });
        (id, created)
    }

    /// Counts recorded so far. All zero for a disabled tracker.
    pub fn summary(&self) -> TrackerSummary {
        match self {
            InterventionTracker::Active(t) => *t.summary(),
            InterventionTracker::Disabled => TrackerSummary::default(),
        }
    }

    /// Send the run summary to `notifier`. Nothing is sent for a disabled
    /// tracker or a run that recorded nothing. Returns whether a
    /// notification was sent.
    pub fn notify_summary(&self, notifier: &dyn Notifier) -> bool {
        let InterventionTracker::Active(t) = self else {
            return false;
        };
        let summary = *t.summary();
        if summary.is_empty() {
            return false;
        }
        let severity = if summary.failed > 0 {
            Severity::Warning
        } else {
            Severity::Info
        };
        notifier.notify(
            Notification::new(format!("Interventions: {}", t.ctx.job_name), severity)
                .field("Issue Type", t.config.issue_type.as_str())
                .field("Detected", summary.detected.to_string())
                .field("Resolved", summary.resolved.to_string())
                .field("Created", summary.created.to_string())
                .field("Deduplicated", summary.deduplicated.to_string())
                .field("Failed", summary.failed.to_string())
                .footer(format!("Request ID: {}", t.ctx.request_id)),
        );
        true
    }
}

impl<B> ActiveTracker<B> {
    fn summary(&self) -> MutexGuard<'_, TrackerSummary> {
        self.summary.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn record(&self, update: impl FnOnce(&mut TrackerSummary)) {
        update(&mut *self.summary());
    }

    /// Configured defaults with the caller's keys layered on top.
    fn metadata(&self, extra: Option<Map<String, Value>>) -> Option<Value> {
        let mut merged: Map<String, Value> = self
            .config
            .defaults
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        merged.extend(extra.unwrap_or_default());
        (!merged.is_empty()).then_some(Value::Object(merged))
    }
}

#[cfg(test)]
mod tests {
    use sentinel_storage::{MemoryBackend, Status};
    use serde_json::json;

    use super::*;

    fn tracker(config: TrackerConfig) -> InterventionTracker<MemoryBackend> {
        InterventionTracker::new(
            InterventionStore::new(MemoryBackend::new()),
            RequestContext::for_scheduler("adjust_closed_order_quantities"),
            config,
            None,
        )
    }

    fn store_of(t: &InterventionTracker<MemoryBackend>) -> &InterventionStore<MemoryBackend> {
        match t {
            InterventionTracker::Active(a) => &a.store,
            InterventionTracker::Disabled => panic!("tracker is disabled"),
        }
    }

    #[tokio::test]
    async fn detect_uses_config_and_overrides() {
        let mut config = TrackerConfig::new("qty_mismatch", "sale.order")
            .enable()
            .with_priority(Priority::High)
            .with_department("operations");
        config.defaults.insert("source".into(), json!("nightly"));
        config.defaults.insert("threshold".into(), json!(3));
        let t = tracker(config);

        let id = t
            .detect(
                42,
                "Qty mismatch",
                Detection {
                    priority: Some(Priority::Critical),
                    metadata: Some(json!({"threshold": 5}).as_object().cloned().unwrap()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        let r = store_of(&t).get(&id).await.unwrap();
        assert_eq!(r.status, Status::Open);
        assert_eq!(r.dedup_key, "sale.order:42:qty_mismatch");
        assert_eq!(r.priority, Priority::Critical);
        assert_eq!(r.department.as_deref(), Some("operations"));
        assert_eq!(r.metadata, Some(json!({"source": "nightly", "threshold": 5})));
        assert_eq!(t.summary().detected, 1);
    }

    #[tokio::test]
    async fn resolve_defaults_resolved_by_to_context_job() {
        let t = tracker(TrackerConfig::new("qty_mismatch", "sale.order").enable());
        let id = t
            .resolve(42, "Qty fixed", "auto_adjusted", Resolution::default())
            .await
            .unwrap();
        let r = store_of(&t).get(&id).await.unwrap();
        assert_eq!(r.status, Status::Resolved);
        assert_eq!(r.resolved_by.as_deref(), Some("adjust_closed_order_quantities"));
        assert_eq!(r.resolution_type.as_deref(), Some("auto_adjusted"));
        assert!(r.resolved_at.is_some());
    }

    #[tokio::test]
    async fn explicit_job_name_wins_over_context() {
        let t = InterventionTracker::new(
            InterventionStore::new(MemoryBackend::new()),
            RequestContext::for_http("api"),
            TrackerConfig::new("qty_mismatch", "sale.order").enable(),
            Some("qty_fixer".into()),
        );
        let id = t.resolve(1, "t", "fixed", Resolution::default()).await.unwrap();
        let r = store_of(&t).get(&id).await.unwrap();
        assert_eq!(r.resolved_by.as_deref(), Some("qty_fixer"));
    }

    #[tokio::test]
    async fn disabled_tracker_returns_none() {
        let t = tracker(TrackerConfig::new("qty_mismatch", "sale.order"));
        assert!(!t.is_enabled());
        assert_eq!(t.detect(1, "t", Detection::default()).await, None);
        assert_eq!(t.resolve(1, "t", "fixed", Resolution::default()).await, None);
        assert_eq!(
            t.create_if_not_exists(NewIntervention::new("sale.order", 1, "x", "t")).await,
            (None, false)
        );
        assert!(t.summary().is_empty());
    }

    #[tokio::test]
    async fn create_if_not_exists_counts_dedup() {
        let t = tracker(TrackerConfig::new("qty_mismatch", "sale.order").enable());
        let new = NewIntervention::new("sale.order", 9, "qty_mismatch", "t");
        let (first, created) = t.create_if_not_exists(new.clone()).await;
        assert!(created);
        let (second, created) = t.create_if_not_exists(new).await;
        assert!(!created);
        assert_eq!(first, second);
        let s = t.summary();
        assert_eq!((s.created, s.deduplicated), (1, 1));
    }

    #[test]
    fn job_without_section_is_disabled() {
        let t = InterventionTracker::for_job(
            InterventionStore::new(MemoryBackend::new()),
            RequestContext::for_scheduler("unknown_job"),
            &EngineConfig::default(),
        );
        assert!(!t.is_enabled());
    }
}
