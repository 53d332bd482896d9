mod common;

use std::sync::Arc;

use common::{ctx, CountingBackend, RecordingNotifier};
use sentinel_interventions::storage::{Priority, Status};
use sentinel_interventions::{
    derive_statuses, Detection, DerivationScope, DerivedStatus, EngineConfig, InterventionStore,
    InterventionTracker, ManualClock, NewIntervention, Resolution, TrackerConfig,
};
use time::macros::{date, datetime};

#[tokio::test]
async fn disabled_tracker_never_touches_the_store() {
    let backend = CountingBackend::default();
    let store = InterventionStore::new(backend.clone());
    let tracker = InterventionTracker::new(
        store,
        ctx(),
        TrackerConfig::new("qty_mismatch", "sale.order"),
        None,
    );
    assert_eq!(tracker.detect(1, "t", Detection::default()).await, None);
    assert_eq!(tracker.resolve(1, "t", "fixed", Resolution::default()).await, None);
    assert_eq!(tracker.create(NewIntervention::new("sale.order", 1, "x", "t")).await, None);
    assert_eq!(
        tracker
            .create_if_not_exists(NewIntervention::new("sale.order", 1, "x", "t"))
            .await,
        (None, false)
    );
    let notifier = RecordingNotifier::default();
    assert!(!tracker.notify_summary(&notifier));
    assert_eq!(backend.calls(), 0);
    assert!(notifier.titles().is_empty());
}

#[tokio::test]
async fn tracker_from_engine_config() {
    let config: EngineConfig = toml::from_str(
        r#"
        [trackers.adjust_closed_order_quantities]
        issue_type = "qty_mismatch"
        document_type = "sale.order"
        enabled = true
        priority = "high"
        department = "operations"
        "#,
    )
    .unwrap();
    let backend = CountingBackend::default();
    let tracker = InterventionTracker::for_job(InterventionStore::new(backend.clone()), ctx(), &config);
    assert!(tracker.is_enabled());

    let id = tracker.detect(7, "Qty mismatch", Detection::default()).await.unwrap();
    let r = backend.inner.records().unwrap().into_iter().find(|r| r.task_id == id).unwrap();
    assert_eq!(r.priority, Priority::High);
    assert_eq!(r.department.as_deref(), Some("operations"));
    assert_eq!(r.status, Status::Open);
    assert!(backend.calls() > 0);
}

#[tokio::test]
async fn run_summary_is_sent_once_something_happened() {
    let store = InterventionStore::new(CountingBackend::default());
    let tracker = InterventionTracker::new(
        store,
        ctx(),
        TrackerConfig::new("qty_mismatch", "sale.order").enable(),
        None,
    );
    let notifier = Arc::new(RecordingNotifier::default());
    assert!(!tracker.notify_summary(notifier.as_ref()));

    tracker.detect(1, "t", Detection::default()).await.unwrap();
    tracker.detect(2, "t", Detection::default()).await.unwrap();
    tracker.resolve(3, "t", "auto_fixed", Resolution::default()).await.unwrap();
    let summary = tracker.summary();
    assert_eq!((summary.detected, summary.resolved, summary.failed), (2, 1, 0));

    assert!(tracker.notify_summary(notifier.as_ref()));
    let sent = notifier.sent.lock().unwrap();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].title, "Interventions: adjust_closed_order_quantities");
    assert!(sent[0].fields.contains(&("Detected".to_string(), "2".to_string())));
}

#[tokio::test]
async fn daily_detections_derive_into_statuses() {
    let clock = ManualClock::new(datetime!(2025-05-01 06:00:00 UTC));
    let store = InterventionStore::new(CountingBackend::default()).with_clock(clock.clone());
    let tracker = InterventionTracker::new(
        store.clone(),
        ctx(),
        TrackerConfig::new("qty_mismatch", "sale.order").enable(),
        None,
    );

    // Day one: three issues.
    for doc in [1, 2, 3] {
        tracker.detect(doc, "t", Detection::default()).await.unwrap();
    }
    // Day two: the job fixes 3, still sees 1, and 2 has gone away.
    clock.set(datetime!(2025-05-02 06:00:00 UTC));
    tracker.detect(1, "t", Detection::default()).await.unwrap();
    tracker.resolve(3, "t", "auto_fixed", Resolution::default()).await.unwrap();

    let derived = store
        .derive_statuses(&DerivationScope::default(), date!(2025 - 05 - 02))
        .await;
    let got: Vec<_> = derived.iter().map(|d| (d.document_id, d.status)).collect();
    assert_eq!(
        got,
        [
            (1, DerivedStatus::Open),
            (2, DerivedStatus::ResolvedByHuman),
            (3, DerivedStatus::ResolvedByAutomation),
        ]
    );
    assert_eq!(
        derived[2].resolved_by.as_deref(),
        Some("adjust_closed_order_quantities")
    );

    // The pure pass over the same rows agrees.
    let rows = store.backend().inner.records().unwrap();
    assert_eq!(derive_statuses(&rows, date!(2025 - 05 - 02)), derived);
}
