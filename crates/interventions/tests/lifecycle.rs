mod common;

use std::sync::Arc;

use common::{ctx, qty_mismatch, store, BrokenBackend, RecordingNotifier};
use sentinel_interventions::storage::{ApprovalStatus, AssigneeType, PlanStatus, Status};
use sentinel_interventions::{
    dedup_key, ApprovalPolicy, InterventionStore, PlanSubmission, StoreError,
};
use serde_json::json;

// ── End to end ──────────────────────────────────────────────────────────────

#[tokio::test]
async fn reject_then_resubmit_then_complete() {
    let store = store();
    let id = store.create(&ctx(), qty_mismatch(42)).await.unwrap();

    let unsure = PlanSubmission::new("agent-1", json!({"set_qty": 4}), "guess", 0.4);
    assert!(store.submit_plan(&id, unsure).await);
    let r = store.get(&id).await.unwrap();
    assert_eq!(r.status, Status::AwaitingApproval);
    assert_eq!(r.requires_approval, Some(true));

    assert!(store.reject_plan(&id, "supervisor", "wrong line").await);
    let r = store.get(&id).await.unwrap();
    assert_eq!(r.status, Status::Planning);
    assert_eq!(r.approval_status, Some(ApprovalStatus::Rejected));
    assert_eq!(r.plan_status, Some(PlanStatus::Rejected));
    assert_eq!(r.rejection_reason.as_deref(), Some("wrong line"));

    let sure = PlanSubmission::new("agent-1", json!({"set_qty": 5}), "matches invoice", 0.95);
    assert!(store.submit_plan(&id, sure).await);
    let r = store.get(&id).await.unwrap();
    assert_eq!(r.status, Status::Executing);
    assert_eq!(r.approval_status, Some(ApprovalStatus::Approved));
    assert_eq!(r.rejection_reason, None);

    assert!(store.complete_execution(&id, "agent-1", true, Some(json!({"ok": true}))).await);
    let r = store.get(&id).await.unwrap();
    assert_eq!(r.status, Status::Resolved);
    assert!(r.resolved_at.is_some());
    let statuses: Vec<Status> = r.status_history.entries().iter().map(|e| e.status).collect();
    assert_eq!(
        statuses,
        [
            Status::Open,
            Status::AwaitingApproval,
            Status::Planning,
            Status::Executing,
            Status::Resolved,
        ]
    );
}

// ── History ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn every_transition_appends_one_entry() {
    let store = store();
    let id = store.create(&ctx(), qty_mismatch(1)).await.unwrap();
    let mut previous = store.get(&id).await.unwrap().status_history;

    let steps: Vec<Status> = vec![
        Status::InProgress,
        Status::Blocked,
        Status::Escalated,
        Status::InProgress,
        Status::Resolved,
        Status::Closed,
    ];
    for (n, status) in steps.iter().enumerate() {
        assert!(store.update_status(&id, *status, "bob", None).await);
        let history = store.get(&id).await.unwrap().status_history;
        assert_eq!(history.len(), n + 2);
        assert!(history.extends(&previous), "history was rewritten at step {n}");
        assert_eq!(history.latest().unwrap().status, *status);
        previous = history;
    }
}

#[tokio::test]
async fn rejected_operation_leaves_history_untouched() {
    let store = store();
    let id = store.create(&ctx(), qty_mismatch(1)).await.unwrap();
    assert!(!store.approve_plan(&id, "boss", None).await);
    let r = store.get(&id).await.unwrap();
    assert_eq!(r.status_history.len(), 1);
    assert_eq!(r.version, 0);
}

// ── Approval policy ─────────────────────────────────────────────────────────

#[tokio::test]
async fn auto_approval_boundary() {
    let store = store();
    let high = store.create(&ctx(), qty_mismatch(1)).await.unwrap();
    let low = store.create(&ctx(), qty_mismatch(2)).await.unwrap();
    let edge = store.create(&ctx(), qty_mismatch(3)).await.unwrap();

    assert!(store.submit_plan(&high, PlanSubmission::new("a", json!({}), "r", 0.95)).await);
    assert!(store.submit_plan(&low, PlanSubmission::new("a", json!({}), "r", 0.5)).await);
    assert!(store.submit_plan(&edge, PlanSubmission::new("a", json!({}), "r", 0.9)).await);

    let r = store.get(&high).await.unwrap();
    assert_eq!(r.status, Status::Executing);
    assert_eq!(r.approval_status, Some(ApprovalStatus::Approved));
    assert_eq!(r.requires_approval, Some(false));

    let r = store.get(&low).await.unwrap();
    assert_eq!(r.status, Status::AwaitingApproval);
    assert_eq!(r.approval_status, Some(ApprovalStatus::Pending));
    assert_eq!(r.requires_approval, Some(true));

    // The threshold itself is not below the threshold.
    assert_eq!(store.get(&edge).await.unwrap().status, Status::Executing);
}

#[tokio::test]
async fn per_issue_type_threshold() {
    let mut policy = ApprovalPolicy::default();
    policy.overrides.insert("qty_mismatch".into(), 0.6);
    let store = store().with_approval_policy(policy);
    let id = store.create(&ctx(), qty_mismatch(1)).await.unwrap();
    assert!(store.submit_plan(&id, PlanSubmission::new("a", json!({}), "r", 0.7)).await);
    assert_eq!(store.get(&id).await.unwrap().status, Status::Executing);
}

#[tokio::test]
async fn held_plan_is_announced() {
    let notifier = Arc::new(RecordingNotifier::default());
    let store = store().with_notifier(notifier.clone());
    let held = store.create(&ctx(), qty_mismatch(1)).await.unwrap();
    let auto = store.create(&ctx(), qty_mismatch(2)).await.unwrap();
    assert!(store.submit_plan(&held, PlanSubmission::new("a", json!({}), "r", 0.3)).await);
    assert!(store.submit_plan(&auto, PlanSubmission::new("a", json!({}), "r", 0.99)).await);
    assert_eq!(notifier.titles(), ["Plan awaiting approval: Quantity mismatch"]);
}

#[tokio::test]
async fn pending_approvals_least_confident_first() {
    let store = store();
    let mut ids = Vec::new();
    for (doc, confidence) in [(1, 0.8), (2, 0.2), (3, 0.5)] {
        let id = store.create(&ctx(), qty_mismatch(doc)).await.unwrap();
        assert!(
            store
                .submit_plan(&id, PlanSubmission::new("a", json!({}), "r", confidence))
                .await
        );
        ids.push(id);
    }
    let pending: Vec<String> = store
        .get_pending_approvals(None)
        .await
        .into_iter()
        .map(|r| r.task_id)
        .collect();
    assert_eq!(pending, [ids[1].clone(), ids[2].clone(), ids[0].clone()]);
}

// ── Dedup ───────────────────────────────────────────────────────────────────

#[tokio::test]
async fn dedup_lookup_is_idempotent() {
    let store = store();
    assert_eq!(
        dedup_key("sale.order", 42, "qty_mismatch"),
        dedup_key("sale.order", 42, "qty_mismatch")
    );
    let (first, created) = store.create_if_not_exists(&ctx(), qty_mismatch(42)).await;
    assert!(created);
    for _ in 0..3 {
        let (again, created) = store.create_if_not_exists(&ctx(), qty_mismatch(42)).await;
        assert!(!created);
        assert_eq!(again, first);
    }
    let open = store.find_open("sale.order", 42, "qty_mismatch").await.unwrap();
    assert_eq!(Some(open.task_id.clone()), first);
    let again = store.find_open("sale.order", 42, "qty_mismatch").await.unwrap();
    assert_eq!(open, again);
}

#[tokio::test]
async fn resolved_issue_can_reopen_as_new_row() {
    let store = store();
    let (first, _) = store.create_if_not_exists(&ctx(), qty_mismatch(7)).await;
    let first = first.unwrap();
    assert!(store.resolve(&first, "fixed", "bob", None, None).await);
    let (second, created) = store.create_if_not_exists(&ctx(), qty_mismatch(7)).await;
    assert!(created);
    assert_ne!(second.as_deref(), Some(first.as_str()));
}

// ── Failure handling ────────────────────────────────────────────────────────

#[tokio::test]
async fn backend_failures_degrade_to_empty_results() {
    let store = InterventionStore::new(BrokenBackend);
    assert_eq!(store.create(&ctx(), qty_mismatch(1)).await, None);
    assert_eq!(store.create_if_not_exists(&ctx(), qty_mismatch(1)).await, (None, false));
    assert!(store.get("t-1").await.is_none());
    assert!(store.find_open("sale.order", 1, "qty_mismatch").await.is_none());
    assert!(!store.claim("t-1", "alice", AssigneeType::Human).await);
    assert!(store.get_available(None, 10).await.is_empty());
    assert_eq!(store.get_stats(None, 7).await.total, 0);
    assert_eq!(store.get_agent_performance("a", 7).await.total_tasks, 0);
}

#[test]
fn store_error_classifies_conflicts() {
    let err = StoreError::from(sentinel_interventions::storage::StorageError::Conflict {
        task_id: "t-1".into(),
        expected_version: 3,
    });
    assert!(err.is_conflict());
    assert!(!err.is_not_found());
}
