use std::future::Future;

use super::{at, make_prioritized, make_record, TestResult};
use crate::filter::{ListOrder, RecordFilter};
use crate::status::{ApprovalStatus, Priority, Status};
use crate::InterventionBackend;

pub(super) async fn run_query_tests<S, F, Fut>(factory: &F) -> Vec<TestResult>
where
    S: InterventionBackend,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    vec![
        TestResult::from_result(
            "query",
            "list_orders_by_priority_then_age",
            list_orders_by_priority_then_age(factory).await,
        ),
        TestResult::from_result(
            "query",
            "list_respects_limit",
            list_respects_limit(factory).await,
        ),
        TestResult::from_result(
            "query",
            "list_filters_unassigned_and_status",
            list_filters_unassigned_and_status(factory).await,
        ),
        TestResult::from_result(
            "query",
            "list_created_window_is_half_open",
            list_created_window_is_half_open(factory).await,
        ),
        TestResult::from_result(
            "query",
            "confidence_order_puts_least_confident_first",
            confidence_order_puts_least_confident_first(factory).await,
        ),
        TestResult::from_result(
            "query",
            "count_grouped_counts_each_group",
            count_grouped_counts_each_group(factory).await,
        ),
        TestResult::from_result(
            "query",
            "agent_rollup_counts_fixed_as_success",
            agent_rollup_counts_fixed_as_success(factory).await,
        ),
    ]
}

fn ids(records: &[crate::InterventionRecord]) -> Vec<&str> {
    records.iter().map(|r| r.task_id.as_str()).collect()
}

async fn list_orders_by_priority_then_age<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: InterventionBackend,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let backend = factory().await;
    for r in [
        make_prioritized("low", Priority::Low, &at(0)),
        make_prioritized("high-late", Priority::High, &at(3)),
        make_prioritized("critical", Priority::Critical, &at(4)),
        make_prioritized("high-early", Priority::High, &at(1)),
        make_prioritized("medium", Priority::Medium, &at(2)),
    ] {
        backend.insert(r).await.map_err(|e| format!("insert: {e}"))?;
    }
    let rows = backend
        .list(&RecordFilter::default(), ListOrder::PriorityFifo, 0)
        .await
        .map_err(|e| format!("list: {e}"))?;
    let got = ids(&rows);
    let want = ["critical", "high-early", "high-late", "medium", "low"];
    if got != want {
        return Err(format!("expected {want:?}, got {got:?}"));
    }
    Ok(())
}

async fn list_respects_limit<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: InterventionBackend,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let backend = factory().await;
    for i in 0..5 {
        backend
            .insert(make_prioritized(&format!("t-{i}"), Priority::Medium, &at(i)))
            .await
            .map_err(|e| format!("insert: {e}"))?;
    }
    let rows = backend
        .list(&RecordFilter::default(), ListOrder::CreatedDesc, 2)
        .await
        .map_err(|e| format!("list: {e}"))?;
    if ids(&rows) != ["t-4", "t-3"] {
        return Err(format!("expected newest two, got {:?}", ids(&rows)));
    }
    Ok(())
}

async fn list_filters_unassigned_and_status<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: InterventionBackend,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let backend = factory().await;
    let free = make_record("free", "k1", Status::Open, &at(0));
    let mut empty_assignee = make_record("empty", "k2", Status::Open, &at(1));
    empty_assignee.assignee_id = Some(String::new());
    let mut taken = make_record("taken", "k3", Status::Open, &at(2));
    taken.assignee_id = Some("bob".to_string());
    let closed = make_record("closed", "k4", Status::Closed, &at(3));
    for r in [free, empty_assignee, taken, closed] {
        backend.insert(r).await.map_err(|e| format!("insert: {e}"))?;
    }
    let filter = RecordFilter {
        statuses: vec![Status::Open],
        unassigned: true,
        ..Default::default()
    };
    let rows = backend
        .list(&filter, ListOrder::CreatedAsc, 0)
        .await
        .map_err(|e| format!("list: {e}"))?;
    if ids(&rows) != ["free", "empty"] {
        return Err(format!("expected [free, empty], got {:?}", ids(&rows)));
    }
    Ok(())
}

async fn list_created_window_is_half_open<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: InterventionBackend,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let backend = factory().await;
    for (id, minute) in [("before", 9), ("start", 10), ("inside", 15), ("end", 20)] {
        backend
            .insert(make_record(id, id, Status::Open, &at(minute)))
            .await
            .map_err(|e| format!("insert: {e}"))?;
    }
    let filter = RecordFilter {
        created_from: Some(at(10)),
        created_before: Some(at(20)),
        ..Default::default()
    };
    let rows = backend
        .list(&filter, ListOrder::CreatedAsc, 0)
        .await
        .map_err(|e| format!("list: {e}"))?;
    if ids(&rows) != ["start", "inside"] {
        return Err(format!("expected [start, inside], got {:?}", ids(&rows)));
    }
    Ok(())
}

async fn confidence_order_puts_least_confident_first<S, F, Fut>(
    factory: &F,
) -> Result<(), String>
where
    S: InterventionBackend,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let backend = factory().await;
    for (id, confidence, requested) in [("sure", 0.85, 1), ("unsure", 0.4, 3), ("meh", 0.6, 2)] {
        let mut r = make_record(id, id, Status::AwaitingApproval, &at(0));
        r.plan_confidence = Some(confidence);
        r.approval_status = Some(ApprovalStatus::Pending);
        r.approval_requested_at = Some(at(requested));
        backend.insert(r).await.map_err(|e| format!("insert: {e}"))?;
    }
    let filter = RecordFilter {
        statuses: vec![Status::AwaitingApproval],
        approval_status: Some(ApprovalStatus::Pending),
        ..Default::default()
    };
    let rows = backend
        .list(&filter, ListOrder::ConfidenceAsc, 0)
        .await
        .map_err(|e| format!("list: {e}"))?;
    if ids(&rows) != ["unsure", "meh", "sure"] {
        return Err(format!("expected [unsure, meh, sure], got {:?}", ids(&rows)));
    }
    Ok(())
}

async fn count_grouped_counts_each_group<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: InterventionBackend,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let backend = factory().await;
    let mut rows = vec![
        make_prioritized("a", Priority::High, &at(0)),
        make_prioritized("b", Priority::High, &at(1)),
        make_prioritized("c", Priority::Low, &at(2)),
    ];
    let mut resolved = make_prioritized("d", Priority::High, &at(3));
    resolved.status = Status::Resolved;
    rows.push(resolved);
    for r in rows {
        backend.insert(r).await.map_err(|e| format!("insert: {e}"))?;
    }
    let groups = backend
        .count_grouped(&RecordFilter::default())
        .await
        .map_err(|e| format!("count_grouped: {e}"))?;
    let total: u64 = groups.iter().map(|g| g.count).sum();
    if total != 4 || groups.len() != 3 {
        return Err(format!("expected 3 groups totalling 4, got {groups:?}"));
    }
    let open_high = groups
        .iter()
        .find(|g| g.status == Status::Open && g.priority == Priority::High)
        .ok_or("missing (open, high) group")?;
    if open_high.count != 2 {
        return Err(format!("expected 2 open/high, got {}", open_high.count));
    }
    Ok(())
}

async fn agent_rollup_counts_fixed_as_success<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: InterventionBackend,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let backend = factory().await;
    let mut fixed = make_record("fixed", "k1", Status::Resolved, &at(0));
    fixed.assignee_id = Some("agent-1".to_string());
    fixed.assigned_at = Some(at(10));
    fixed.resolved_at = Some(at(40));
    fixed.resolution_type = Some("fixed".to_string());
    fixed.plan_confidence = Some(0.9);

    let mut failed = make_record("failed", "k2", Status::Failed, &at(0));
    failed.assignee_id = Some("agent-1".to_string());
    failed.assigned_at = Some(at(10));
    failed.plan_confidence = Some(0.5);

    let mut too_old = make_record("old", "k3", Status::Resolved, &at(0));
    too_old.assignee_id = Some("agent-1".to_string());
    too_old.assigned_at = Some(at(1));
    too_old.resolution_type = Some("fixed".to_string());

    let mut other_agent = make_record("other", "k4", Status::Resolved, &at(0));
    other_agent.assignee_id = Some("agent-2".to_string());
    other_agent.assigned_at = Some(at(10));

    for r in [fixed, failed, too_old, other_agent] {
        backend.insert(r).await.map_err(|e| format!("insert: {e}"))?;
    }
    let rollup = backend
        .agent_rollup("agent-1", &at(5))
        .await
        .map_err(|e| format!("agent_rollup: {e}"))?;
    if (rollup.total_tasks, rollup.successful, rollup.failed) != (2, 1, 1) {
        return Err(format!("unexpected counts: {rollup:?}"));
    }
    match rollup.avg_confidence {
        Some(c) if (c - 0.7).abs() < 1e-9 => {}
        other => return Err(format!("expected avg confidence 0.7, got {other:?}")),
    }
    if rollup.avg_resolution_minutes != Some(30.0) {
        return Err(format!(
            "expected 30 minutes to resolve, got {:?}",
            rollup.avg_resolution_minutes
        ));
    }
    Ok(())
}
