//! SQL warehouse backend.
//!
//! [`WarehouseBackend`] turns every [`InterventionBackend`] call into one
//! parameterized statement and hands it to a [`WarehouseClient`]. The client
//! is the only part that talks to the network; [`HttpWarehouseClient`] posts
//! statements to a SQL-over-HTTP gateway.

mod http;
mod row;
pub mod sql;

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, warn};

pub use http::HttpWarehouseClient;
pub use row::{decode_row, encode_record};

use crate::error::StorageError;
use crate::filter::{ListOrder, RecordFilter};
use crate::patch::Patch;
use crate::record::{AgentRollup, GroupCount, InsertOutcome, InterventionRecord};
use crate::traits::InterventionBackend;

/// One result row, keyed by column name.
pub type Row = serde_json::Map<String, Value>;

/// Named statement parameters (`@name` in the SQL text).
pub type Params = BTreeMap<String, Value>;

/// Minimal interface to a SQL warehouse.
#[async_trait]
pub trait WarehouseClient: Send + Sync + 'static {
    /// Run a `SELECT` and return its rows.
    async fn query(&self, sql: &str, params: &Params) -> Result<Vec<Row>, StorageError>;

    /// Run a DML statement and return the number of affected rows.
    async fn execute(&self, sql: &str, params: &Params) -> Result<u64, StorageError>;

    /// Streaming insert. Returns per-row error messages; empty means success.
    async fn insert_rows(&self, table: &str, rows: Vec<Row>) -> Result<Vec<String>, StorageError>;
}

/// [`InterventionBackend`] over a [`WarehouseClient`].
#[derive(Debug, Clone)]
pub struct WarehouseBackend<C> {
    client: C,
    table: String,
}

impl<C: WarehouseClient> WarehouseBackend<C> {
    /// `table` is the fully qualified table name, e.g. `ops.interventions`.
    pub fn new(client: C, table: impl Into<String>) -> Self {
        WarehouseBackend {
            client,
            table: table.into(),
        }
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    async fn query_one(
        &self,
        stmt: sql::Statement,
    ) -> Result<Option<InterventionRecord>, StorageError> {
        let rows = self.client.query(&stmt.sql, &stmt.params).await?;
        rows.into_iter().next().map(decode_row).transpose()
    }
}

#[async_trait]
impl<C: WarehouseClient> InterventionBackend for WarehouseBackend<C> {
    async fn insert(&self, record: InterventionRecord) -> Result<(), StorageError> {
        let task_id = record.task_id.clone();
        let row = encode_record(&record)?;
        let errors = self.client.insert_rows(&self.table, vec![row]).await?;
        if errors.is_empty() {
            Ok(())
        } else {
            warn!(task_id = %task_id, errors = ?errors, "streaming insert rejected");
            Err(StorageError::InsertRejected {
                task_id,
                reasons: errors,
            })
        }
    }

    async fn insert_unless_open(
        &self,
        record: InterventionRecord,
    ) -> Result<InsertOutcome, StorageError> {
        let stmt = sql::insert_unless_open(&self.table, &record)?;
        debug!(table = %self.table, dedup_key = %record.dedup_key, "merge insert");
        let affected = self.client.execute(&stmt.sql, &stmt.params).await?;
        if affected > 0 {
            return Ok(InsertOutcome::Inserted);
        }
        match self.find_open(&record.dedup_key).await? {
            Some(existing) => Ok(InsertOutcome::Existing(Box::new(existing))),
            None => Err(StorageError::Backend(format!(
                "merge for {} inserted nothing and no open row exists",
                record.dedup_key
            ))),
        }
    }

    async fn update(
        &self,
        task_id: &str,
        expected_version: i64,
        patch: &Patch,
    ) -> Result<i64, StorageError> {
        let stmt = sql::update(&self.table, task_id, expected_version, patch)?;
        debug!(table = %self.table, task_id, expected_version, columns = patch.len(), "versioned update");
        let affected = self.client.execute(&stmt.sql, &stmt.params).await?;
        if affected > 0 {
            return Ok(expected_version + 1);
        }
        // Tell a stale version apart from a missing row.
        self.get(task_id).await?;
        Err(StorageError::Conflict {
            task_id: task_id.to_string(),
            expected_version,
        })
    }

    async fn get(&self, task_id: &str) -> Result<InterventionRecord, StorageError> {
        self.query_one(sql::get(&self.table, task_id))
            .await?
            .ok_or_else(|| StorageError::NotFound {
                task_id: task_id.to_string(),
            })
    }

    async fn find_open(
        &self,
        dedup_key: &str,
    ) -> Result<Option<InterventionRecord>, StorageError> {
        self.query_one(sql::find_open(&self.table, dedup_key)).await
    }

    async fn list(
        &self,
        filter: &RecordFilter,
        order: ListOrder,
        limit: usize,
    ) -> Result<Vec<InterventionRecord>, StorageError> {
        let stmt = sql::list(&self.table, filter, order, limit);
        self.client
            .query(&stmt.sql, &stmt.params)
            .await?
            .into_iter()
            .map(decode_row)
            .collect()
    }

    async fn count_grouped(
        &self,
        filter: &RecordFilter,
    ) -> Result<Vec<GroupCount>, StorageError> {
        let stmt = sql::count_grouped(&self.table, filter);
        self.client
            .query(&stmt.sql, &stmt.params)
            .await?
            .into_iter()
            .map(|mut row| {
                let count = row::number(&row, "count").unwrap_or(0.0) as u64;
                row.insert("count".to_string(), Value::from(count));
                serde_json::from_value(Value::Object(row)).map_err(StorageError::from)
            })
            .collect()
    }

    async fn agent_rollup(
        &self,
        agent_id: &str,
        since: &str,
    ) -> Result<AgentRollup, StorageError> {
        let stmt = sql::agent_rollup(&self.table, agent_id, since);
        let rows = self.client.query(&stmt.sql, &stmt.params).await?;
        let Some(row) = rows.first() else {
            return Ok(AgentRollup::default());
        };
        Ok(AgentRollup {
            total_tasks: row::number(row, "total_tasks").unwrap_or(0.0) as u64,
            successful: row::number(row, "successful").unwrap_or(0.0) as u64,
            failed: row::number(row, "failed").unwrap_or(0.0) as u64,
            avg_confidence: row::number(row, "avg_confidence"),
            avg_resolution_minutes: row::number(row, "avg_resolution_minutes"),
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use serde_json::json;

    use super::*;
    use crate::patch::Field;
    use crate::status::Status;

    /// Records every statement and replays canned responses.
    #[derive(Clone, Default)]
    struct ScriptedClient {
        inner: Arc<Mutex<Script>>,
    }

    #[derive(Default)]
    struct Script {
        seen: Vec<String>,
        query_results: Vec<Vec<Row>>,
        affected: Vec<u64>,
        insert_errors: Vec<String>,
    }

    #[async_trait]
    impl WarehouseClient for ScriptedClient {
        async fn query(&self, sql: &str, _params: &Params) -> Result<Vec<Row>, StorageError> {
            let mut s = self.inner.lock().unwrap();
            s.seen.push(sql.to_string());
            Ok(if s.query_results.is_empty() {
                Vec::new()
            } else {
                s.query_results.remove(0)
            })
        }

        async fn execute(&self, sql: &str, _params: &Params) -> Result<u64, StorageError> {
            let mut s = self.inner.lock().unwrap();
            s.seen.push(sql.to_string());
            Ok(if s.affected.is_empty() {
                0
            } else {
                s.affected.remove(0)
            })
        }

        async fn insert_rows(
            &self,
            table: &str,
            rows: Vec<Row>,
        ) -> Result<Vec<String>, StorageError> {
            let mut s = self.inner.lock().unwrap();
            s.seen.push(format!("INSERT {table} x{}", rows.len()));
            Ok(s.insert_errors.clone())
        }
    }

    fn record() -> InterventionRecord {
        InterventionRecord::new(
            "t-1",
            "sale.order:1:x",
            "sale.order",
            1,
            "x",
            "t",
            Status::Open,
            "2025-01-01T00:00:00.000000Z",
        )
    }

    fn as_row(record: &InterventionRecord) -> Row {
        encode_record(record).unwrap()
    }

    #[tokio::test]
    async fn insert_surfaces_row_errors() {
        let client = ScriptedClient::default();
        client.inner.lock().unwrap().insert_errors = vec!["no such field: foo".into()];
        let backend = WarehouseBackend::new(client, "ops.interventions");
        let err = backend.insert(record()).await.unwrap_err();
        assert!(matches!(err, StorageError::InsertRejected { ref reasons, .. } if reasons.len() == 1));
    }

    #[tokio::test]
    async fn stale_update_is_a_conflict() {
        let client = ScriptedClient::default();
        {
            let mut s = client.inner.lock().unwrap();
            s.affected = vec![0];
            s.query_results = vec![vec![as_row(&record())]];
        }
        let backend = WarehouseBackend::new(client.clone(), "ops.interventions");
        let patch = Patch::new().set(Field::Status, Status::Assigned);
        let err = backend.update("t-1", 0, &patch).await.unwrap_err();
        assert!(err.is_conflict());
        assert!(client.inner.lock().unwrap().seen[0].starts_with("UPDATE"));
    }

    #[tokio::test]
    async fn update_of_missing_row_is_not_found() {
        let backend = WarehouseBackend::new(ScriptedClient::default(), "t");
        let patch = Patch::new().set(Field::Status, Status::Assigned);
        let err = backend.update("nope", 0, &patch).await.unwrap_err();
        assert!(matches!(err, StorageError::NotFound { .. }));
    }

    #[tokio::test]
    async fn skipped_merge_returns_existing_row() {
        let client = ScriptedClient::default();
        let mut existing = record();
        existing.task_id = "t-0".into();
        {
            let mut s = client.inner.lock().unwrap();
            s.affected = vec![0];
            s.query_results = vec![vec![as_row(&existing)]];
        }
        let backend = WarehouseBackend::new(client, "t");
        match backend.insert_unless_open(record()).await.unwrap() {
            InsertOutcome::Existing(r) => assert_eq!(r.task_id, "t-0"),
            other => panic!("expected existing, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn rollup_reads_string_numbers() {
        let client = ScriptedClient::default();
        let Value::Object(row) = json!({
            "total_tasks": "4",
            "successful": 2,
            "failed": "1",
            "avg_confidence": 0.8,
            "avg_resolution_minutes": null
        }) else {
            unreachable!()
        };
        client.inner.lock().unwrap().query_results = vec![vec![row]];
        let backend = WarehouseBackend::new(client, "t");
        let r = backend.agent_rollup("agent-1", "2025-01-01T00:00:00.000000Z").await.unwrap();
        assert_eq!((r.total_tasks, r.successful, r.failed), (4, 2, 1));
        assert_eq!(r.avg_confidence, Some(0.8));
        assert_eq!(r.avg_resolution_minutes, None);
    }
}
