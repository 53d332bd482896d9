//! Reporting over the intervention table.

use std::collections::BTreeMap;

use serde::Serialize;
use time::Duration;
use tracing::error;

use sentinel_storage::timestamp::format_timestamp;
use sentinel_storage::{InterventionBackend, RecordFilter};

use crate::store::InterventionStore;

/// Counts of interventions created in a trailing window.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct InterventionStats {
    pub period_days: u32,
    pub total: u64,
    pub by_status: BTreeMap<String, u64>,
    pub by_priority: BTreeMap<String, u64>,
    pub by_type: BTreeMap<String, u64>,
}

/// How an agent did on the interventions assigned to it in a trailing
/// window. Success means resolved as `fixed`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AgentPerformance {
    pub agent_id: String,
    pub period_days: u32,
    pub total_tasks: u64,
    pub successful: u64,
    pub failed: u64,
    /// `successful / total_tasks`, 0 when there were no tasks.
    pub success_rate: f64,
    pub avg_confidence: Option<f64>,
    pub avg_resolution_minutes: Option<f64>,
}

impl<B: InterventionBackend> InterventionStore<B> {
    fn window_start(&self, days: u32) -> String {
        format_timestamp(self.clock().now() - Duration::days(i64::from(days)))
    }

    /// Interventions created in the last `days` days, optionally for one
    /// department. All zero on backend failure.
    pub async fn get_stats(&self, department: Option<&str>, days: u32) -> InterventionStats {
        let filter = RecordFilter {
            department: department.map(str::to_string),
            created_from: Some(self.window_start(days)),
            ..Default::default()
        };
        let mut stats = InterventionStats {
            period_days: days,
            ..Default::default()
        };
        let groups = match self.backend().count_grouped(&filter).await {
            Ok(groups) => groups,
            Err(e) => {
                error!(error = %e, "failed to compute intervention stats");
                return stats;
            }
        };
        for g in groups {
            stats.total += g.count;
            *stats.by_status.entry(g.status.to_string()).or_default() += g.count;
            *stats.by_priority.entry(g.priority.to_string()).or_default() += g.count;
            *stats.by_type.entry(g.issue_type).or_default() += g.count;
        }
        stats
    }

    /// Performance of `agent_id` over interventions assigned in the last
    /// `days` days. All zero on backend failure.
    pub async fn get_agent_performance(&self, agent_id: &str, days: u32) -> AgentPerformance {
        let mut perf = AgentPerformance {
            agent_id: agent_id.to_string(),
            period_days: days,
            ..Default::default()
        };
        let rollup = match self
            .backend()
            .agent_rollup(agent_id, &self.window_start(days))
            .await
        {
            Ok(rollup) => rollup,
            Err(e) => {
                error!(agent_id, error = %e, "failed to compute agent performance");
                return perf;
            }
        };
        perf.total_tasks = rollup.total_tasks;
        perf.successful = rollup.successful;
        perf.failed = rollup.failed;
        perf.success_rate = if rollup.total_tasks > 0 {
            rollup.successful as f64 / rollup.total_tasks as f64
        } else {
            0.0
        };
        perf.avg_confidence = rollup.avg_confidence;
        perf.avg_resolution_minutes = rollup.avg_resolution_minutes;
        perf
    }
}
