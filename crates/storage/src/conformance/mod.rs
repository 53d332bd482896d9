//! Conformance test suite for `InterventionBackend` implementations.
//!
//! This module provides a backend-agnostic test suite that any
//! `InterventionBackend` implementation can run to verify correctness. The
//! suite covers:
//!
//! - **Insert / get**: round-trip of every column, missing rows, duplicates
//! - **Version / OCC**: version bumps and stale-version conflicts
//! - **Dedup**: `find_open` and atomic `insert_unless_open`
//! - **Query**: filters, orderings, limits, grouped counts, agent rollups
//! - **Concurrency**: racing claims and racing dedup inserts
//!
//! # Usage
//!
//! Backend crates call [`run_conformance_suite`] with a factory function that
//! creates a fresh, empty backend for each test:
//!
//! ```ignore
//! use sentinel_storage::conformance::run_conformance_suite;
//! use sentinel_storage::MemoryBackend;
//!
//! #[tokio::test]
//! async fn memory_conformance() {
//!     let report = run_conformance_suite(|| async { MemoryBackend::new() }).await;
//!     assert!(report.failed == 0, "{report}");
//! }
//! ```

mod concurrent;
mod dedup;
mod insert;
mod query;
mod version;

use std::fmt;
use std::future::Future;

use crate::record::InterventionRecord;
use crate::status::{Priority, Status};
use crate::InterventionBackend;

/// Result of a single conformance test.
#[derive(Debug, Clone)]
pub struct TestResult {
    /// Test category (e.g. "insert", "version", "dedup").
    pub category: String,
    /// Test name (e.g. "update_with_stale_version_returns_conflict").
    pub name: String,
    /// Whether the test passed.
    pub passed: bool,
    /// Error message if the test failed.
    pub message: Option<String>,
}

impl TestResult {
    fn pass(category: &str, name: &str) -> Self {
        Self {
            category: category.to_string(),
            name: name.to_string(),
            passed: true,
            message: None,
        }
    }

    fn fail(category: &str, name: &str, msg: String) -> Self {
        Self {
            category: category.to_string(),
            name: name.to_string(),
            passed: false,
            message: Some(msg),
        }
    }

    fn from_result(category: &str, name: &str, result: Result<(), String>) -> Self {
        match result {
            Ok(()) => Self::pass(category, name),
            Err(msg) => Self::fail(category, name, msg),
        }
    }
}

/// Aggregated report from a full conformance suite run.
#[derive(Debug, Clone)]
pub struct ConformanceReport {
    pub results: Vec<TestResult>,
    pub passed: usize,
    pub failed: usize,
    pub total: usize,
}

impl fmt::Display for ConformanceReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Conformance: {}/{} passed ({} failed)",
            self.passed, self.total, self.failed
        )?;
        for r in &self.results {
            if !r.passed {
                writeln!(
                    f,
                    "  FAIL [{}/{}]: {}",
                    r.category,
                    r.name,
                    r.message.as_deref().unwrap_or("(no message)")
                )?;
            }
        }
        Ok(())
    }
}

/// Run the full conformance suite against a storage backend.
///
/// The `factory` function is called once per test to create a fresh, empty
/// backend instance, ensuring test isolation.
pub async fn run_conformance_suite<S, F, Fut>(factory: F) -> ConformanceReport
where
    S: InterventionBackend,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let mut results = Vec::new();

    results.extend(insert::run_insert_tests(&factory).await);
    results.extend(version::run_version_tests(&factory).await);
    results.extend(dedup::run_dedup_tests(&factory).await);
    results.extend(query::run_query_tests(&factory).await);
    results.extend(concurrent::run_concurrent_tests(&factory).await);

    let passed = results.iter().filter(|r| r.passed).count();
    let total = results.len();

    ConformanceReport {
        results,
        passed,
        failed: total - passed,
        total,
    }
}

// ── Helpers: record constructors with sensible defaults ──────────────────────

/// Timestamp `minutes` after 2025-01-01T00:00Z, in the persisted layout.
fn at(minutes: u32) -> String {
    format!(
        "2025-01-01T{:02}:{:02}:00.000000Z",
        (minutes / 60) % 24,
        minutes % 60
    )
}

fn make_record(task_id: &str, dedup_key: &str, status: Status, created_at: &str) -> InterventionRecord {
    let mut r = InterventionRecord::new(
        task_id,
        dedup_key,
        "sale.order",
        42,
        "qty_mismatch",
        format!("Quantity mismatch on {task_id}"),
        status,
        created_at,
    );
    r.request_id = "req-conformance".to_string();
    r.job_name = "conformance".to_string();
    r.environment = "test".to_string();
    r.source_system = "sentinel-ops".to_string();
    r
}

fn make_prioritized(task_id: &str, priority: Priority, created_at: &str) -> InterventionRecord {
    let mut r = make_record(task_id, &format!("sale.order:{task_id}:qty_mismatch"), Status::Open, created_at);
    r.priority = priority;
    r
}
