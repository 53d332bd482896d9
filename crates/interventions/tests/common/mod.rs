#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use sentinel_interventions::storage::{
    AgentRollup, GroupCount, InsertOutcome, InterventionBackend, InterventionRecord, ListOrder,
    MemoryBackend, Patch, RecordFilter, StorageError,
};
use sentinel_interventions::{
    InterventionStore, ManualClock, NewIntervention, Notification, Notifier, RequestContext,
};
use time::macros::datetime;

pub fn clock() -> ManualClock {
    ManualClock::new(datetime!(2025-05-01 08:00:00 UTC))
}

pub fn store() -> InterventionStore<MemoryBackend> {
    InterventionStore::new(MemoryBackend::new()).with_clock(clock())
}

pub fn ctx() -> RequestContext {
    RequestContext::for_scheduler("adjust_closed_order_quantities")
}

pub fn qty_mismatch(document_id: i64) -> NewIntervention {
    NewIntervention::new("sale.order", document_id, "qty_mismatch", "Quantity mismatch")
}

/// Memory backend that counts every call made to it.
#[derive(Debug, Clone, Default)]
pub struct CountingBackend {
    pub inner: MemoryBackend,
    pub calls: Arc<AtomicUsize>,
}

impl CountingBackend {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn tick(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl InterventionBackend for CountingBackend {
    async fn insert(&self, record: InterventionRecord) -> Result<(), StorageError> {
        self.tick();
        self.inner.insert(record).await
    }

    async fn insert_unless_open(
        &self,
        record: InterventionRecord,
    ) -> Result<InsertOutcome, StorageError> {
        self.tick();
        self.inner.insert_unless_open(record).await
    }

    async fn update(
        &self,
        task_id: &str,
        expected_version: i64,
        patch: &Patch,
    ) -> Result<i64, StorageError> {
        self.tick();
        self.inner.update(task_id, expected_version, patch).await
    }

    async fn get(&self, task_id: &str) -> Result<InterventionRecord, StorageError> {
        self.tick();
        self.inner.get(task_id).await
    }

    async fn find_open(
        &self,
        dedup_key: &str,
    ) -> Result<Option<InterventionRecord>, StorageError> {
        self.tick();
        self.inner.find_open(dedup_key).await
    }

    async fn list(
        &self,
        filter: &RecordFilter,
        order: ListOrder,
        limit: usize,
    ) -> Result<Vec<InterventionRecord>, StorageError> {
        self.tick();
        self.inner.list(filter, order, limit).await
    }

    async fn count_grouped(
        &self,
        filter: &RecordFilter,
    ) -> Result<Vec<GroupCount>, StorageError> {
        self.tick();
        self.inner.count_grouped(filter).await
    }

    async fn agent_rollup(
        &self,
        agent_id: &str,
        since: &str,
    ) -> Result<AgentRollup, StorageError> {
        self.tick();
        self.inner.agent_rollup(agent_id, since).await
    }
}

/// Backend whose every call fails.
#[derive(Debug, Clone, Copy, Default)]
pub struct BrokenBackend;

fn down<T>() -> Result<T, StorageError> {
    Err(StorageError::Backend("warehouse unavailable".to_string()))
}

#[async_trait]
impl InterventionBackend for BrokenBackend {
    async fn insert(&self, _: InterventionRecord) -> Result<(), StorageError> {
        down()
    }

    async fn insert_unless_open(&self, _: InterventionRecord) -> Result<InsertOutcome, StorageError> {
        down()
    }

    async fn update(&self, _: &str, _: i64, _: &Patch) -> Result<i64, StorageError> {
        down()
    }

    async fn get(&self, _: &str) -> Result<InterventionRecord, StorageError> {
        down()
    }

    async fn find_open(&self, _: &str) -> Result<Option<InterventionRecord>, StorageError> {
        down()
    }

    async fn list(
        &self,
        _: &RecordFilter,
        _: ListOrder,
        _: usize,
    ) -> Result<Vec<InterventionRecord>, StorageError> {
        down()
    }

    async fn count_grouped(&self, _: &RecordFilter) -> Result<Vec<GroupCount>, StorageError> {
        down()
    }

    async fn agent_rollup(&self, _: &str, _: &str) -> Result<AgentRollup, StorageError> {
        down()
    }
}

/// Notifier that keeps every notification it receives.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    pub sent: Mutex<Vec<Notification>>,
}

impl RecordingNotifier {
    pub fn titles(&self) -> Vec<String> {
        self.sent.lock().unwrap().iter().map(|n| n.title.clone()).collect()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, notification: Notification) {
        self.sent.lock().unwrap().push(notification);
    }
}
