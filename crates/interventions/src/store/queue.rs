//! Work queues: what a human, an agent or an approver should pick up next.

use sentinel_storage::{
    ApprovalStatus, InterventionBackend, InterventionRecord, ListOrder, RecordFilter, Status,
};

use super::InterventionStore;

/// Default size of [`InterventionStore::get_available`].
pub const DEFAULT_QUEUE_LIMIT: usize = 10;

impl<B: InterventionBackend> InterventionStore<B> {
    /// Unassigned work, critical first and oldest first within a priority.
    ///
    /// Includes snoozed rows whose `snoozed_until` has passed.
    pub async fn get_available(
        &self,
        department: Option<&str>,
        limit: usize,
    ) -> Vec<InterventionRecord> {
        let filter = RecordFilter {
            statuses: vec![Status::Open, Status::Snoozed],
            unassigned: true,
            department: department.map(str::to_string),
            ..Default::default()
        };
        let now = self.now();
        let mut rows: Vec<InterventionRecord> = self
            .list(&filter, ListOrder::PriorityFifo, 0)
            .await
            .into_iter()
            .filter(|r| r.status == Status::Open || snooze_expired(r, &now))
            .collect();
        if limit > 0 {
            rows.truncate(limit);
        }
        rows
    }

    /// Rows held by `assignee_id`. `statuses` defaults to the active set
    /// (assigned, in progress, planning, awaiting approval, executing).
    pub async fn get_assigned_to(
        &self,
        assignee_id: &str,
        statuses: Option<&[Status]>,
    ) -> Vec<InterventionRecord> {
        let filter = RecordFilter {
            statuses: statuses.unwrap_or(Status::ACTIVE_SET).to_vec(),
            assignee_id: Some(assignee_id.to_string()),
            ..Default::default()
        };
        self.list(&filter, ListOrder::PriorityFifo, 0).await
    }

    /// Open, unassigned rows whose issue type the agent can handle.
    pub async fn get_for_agent(
        &self,
        capabilities: &[String],
        max_items: usize,
    ) -> Vec<InterventionRecord> {
        if capabilities.is_empty() {
            return Vec::new();
        }
        let filter = RecordFilter {
            statuses: vec![Status::Open],
            unassigned: true,
            issue_types: capabilities.to_vec(),
            ..Default::default()
        };
        self.list(&filter, ListOrder::PriorityFifo, max_items).await
    }

    /// Plans waiting for sign-off, least confident first.
    pub async fn get_pending_approvals(&self, department: Option<&str>) -> Vec<InterventionRecord> {
        let filter = RecordFilter {
            statuses: vec![Status::AwaitingApproval],
            approval_status: Some(ApprovalStatus::Pending),
            department: department.map(str::to_string),
            ..Default::default()
        };
        self.list(&filter, ListOrder::ConfidenceAsc, 0).await
    }
}

fn snooze_expired(record: &InterventionRecord, now: &str) -> bool {
    record.status == Status::Snoozed
        && record
            .snoozed_until
            .as_deref()
            .map_or(true, |until| until <= now)
}

#[cfg(test)]
mod tests {
    use sentinel_storage::{MemoryBackend, Priority};
    use time::macros::datetime;
    use time::Duration;

    use super::*;
    use crate::clock::ManualClock;
    use crate::context::RequestContext;
    use crate::store::NewIntervention;

    #[tokio::test]
    async fn available_skips_assigned_and_live_snoozes() {
        let clock = ManualClock::new(datetime!(2025-05-01 08:00:00 UTC));
        let store = InterventionStore::new(MemoryBackend::new()).with_clock(clock.clone());
        let ctx = RequestContext::for_cli("test");
        let mut ids = Vec::new();
        for doc in 1..=4 {
            ids.push(
                store
                    .create(&ctx, NewIntervention::new("sale.order", doc, "x", "t"))
                    .await
                    .unwrap(),
            );
            clock.advance(Duration::minutes(1));
        }
        assert!(store.claim(&ids[0], "alice", sentinel_storage::AssigneeType::Human).await);
        assert!(
            store
                .snooze(&ids[1], datetime!(2025-05-01 09:00:00 UTC), "bob", None)
                .await
        );
        assert!(
            store
                .snooze(&ids[2], datetime!(2025-05-01 08:30:00 UTC), "bob", None)
                .await
        );

        let now_available: Vec<_> = store
            .get_available(None, DEFAULT_QUEUE_LIMIT)
            .await
            .into_iter()
            .map(|r| r.task_id)
            .collect();
        assert_eq!(now_available, [ids[3].clone()]);

        clock.set(datetime!(2025-05-01 08:45:00 UTC));
        let later: Vec<_> = store
            .get_available(None, DEFAULT_QUEUE_LIMIT)
            .await
            .into_iter()
            .map(|r| r.task_id)
            .collect();
        assert_eq!(later, [ids[2].clone(), ids[3].clone()]);
    }

    #[tokio::test]
    async fn agent_queue_matches_capabilities() {
        let store = InterventionStore::new(MemoryBackend::new());
        let ctx = RequestContext::for_cli("test");
        store
            .create(&ctx, NewIntervention::new("sale.order", 1, "qty_mismatch", "t"))
            .await
            .unwrap();
        store
            .create(
                &ctx,
                NewIntervention::new("account.move", 2, "unbalanced", "t")
                    .with_priority(Priority::Critical),
            )
            .await
            .unwrap();

        assert!(store.get_for_agent(&[], 10).await.is_empty());
        let rows = store.get_for_agent(&["qty_mismatch".to_string()], 10).await;
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].issue_type, "qty_mismatch");
        let rows = store
            .get_for_agent(&["qty_mismatch".to_string(), "unbalanced".to_string()], 1)
            .await;
        assert_eq!(rows[0].issue_type, "unbalanced");
    }

    #[tokio::test]
    async fn assigned_to_defaults_to_active_statuses() {
        let store = InterventionStore::new(MemoryBackend::new());
        let ctx = RequestContext::for_cli("test");
        let a = store
            .create(&ctx, NewIntervention::new("sale.order", 1, "x", "t"))
            .await
            .unwrap();
        let b = store
            .create(&ctx, NewIntervention::new("sale.order", 2, "x", "t"))
            .await
            .unwrap();
        assert!(store.claim(&a, "alice", sentinel_storage::AssigneeType::Human).await);
        assert!(store.claim(&b, "alice", sentinel_storage::AssigneeType::Human).await);
        assert!(store.resolve(&b, "fixed", "alice", None, None).await);

        let active = store.get_assigned_to("alice", None).await;
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].task_id, a);
        let resolved = store
            .get_assigned_to("alice", Some(&[Status::Resolved]))
            .await;
        assert_eq!(resolved.len(), 1);
        assert_eq!(resolved[0].task_id, b);
    }
}
