//! Plain-text rendering for `--output text`.

use std::fmt::Write;

use sentinel_interventions::storage::InterventionRecord;
use sentinel_interventions::{AgentPerformance, DerivedIssue, InterventionStats};

/// One-line summary used by `list`.
pub(crate) fn record_line(r: &InterventionRecord) -> String {
    let assignee = r.assignee_id.as_deref().unwrap_or("-");
    format!(
        "{}  {:<8}  {:<17}  {:<12}  {}:{}  {}",
        r.task_id,
        r.priority.as_str(),
        r.status.as_str(),
        assignee,
        r.document_type,
        r.document_id,
        r.title
    )
}

/// Full view used by `show`, history and execution log included.
pub(crate) fn record_detail(r: &InterventionRecord) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{}  {}", r.task_id, r.title);
    field(&mut out, "status", Some(r.status.as_str()));
    field(&mut out, "priority", Some(r.priority.as_str()));
    let _ = writeln!(out, "  {:<16}{}:{}", "document", r.document_type, r.document_id);
    field(&mut out, "issue_type", Some(&r.issue_type));
    field(&mut out, "department", r.department.as_deref());
    field(&mut out, "description", r.description.as_deref());
    field(&mut out, "created_at", Some(&r.created_at));
    if !r.job_name.is_empty() {
        field(&mut out, "job", Some(&r.job_name));
    }
    field(&mut out, "assignee", r.assignee_id.as_deref());
    field(&mut out, "snoozed_until", r.snoozed_until.as_deref());
    if let Some(plan) = r.plan_status {
        field(&mut out, "plan", Some(plan.as_str()));
        if let Some(confidence) = r.plan_confidence {
            let _ = writeln!(out, "  {:<16}{:.2}", "confidence", confidence);
        }
        field(&mut out, "reasoning", r.plan_reasoning.as_deref());
    }
    if let Some(approval) = r.approval_status {
        field(&mut out, "approval", Some(approval.as_str()));
        field(&mut out, "approved_by", r.approved_by.as_deref());
        field(&mut out, "rejection", r.rejection_reason.as_deref());
    }
    field(&mut out, "resolution", r.resolution_type.as_deref());
    field(&mut out, "resolved_by", r.resolved_by.as_deref());
    field(&mut out, "resolved_at", r.resolved_at.as_deref());

    let _ = writeln!(out, "\nhistory:");
    for entry in r.status_history.entries() {
        let _ = writeln!(out, "  {}  {:<17}  {}", entry.at, entry.status.as_str(), entry.by);
    }
    if !r.execution_log.is_empty() {
        let _ = writeln!(out, "\nexecution log:");
        for entry in r.execution_log.entries() {
            let _ = write!(out, "  {}  {}", entry.at, entry.action);
            if let Some(by) = &entry.by {
                let _ = write!(out, " ({})", by);
            }
            if let Some(result) = &entry.result {
                let _ = write!(out, "  {}", result);
            }
            out.push('\n');
        }
    }
    out
}

fn field(out: &mut String, name: &str, value: Option<&str>) {
    if let Some(value) = value {
        let _ = writeln!(out, "  {:<16}{}", name, value);
    }
}

pub(crate) fn stats(stats: &InterventionStats) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{} interventions in the last {} days",
        stats.total, stats.period_days
    );
    for (title, counts) in [
        ("by status", &stats.by_status),
        ("by priority", &stats.by_priority),
        ("by type", &stats.by_type),
    ] {
        if counts.is_empty() {
            continue;
        }
        let _ = writeln!(out, "\n{}:", title);
        for (key, count) in counts {
            let _ = writeln!(out, "  {:<24}{}", key, count);
        }
    }
    out
}

pub(crate) fn performance(perf: &AgentPerformance) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{} (last {} days)", perf.agent_id, perf.period_days);
    let _ = writeln!(out, "  {:<16}{}", "tasks", perf.total_tasks);
    let _ = writeln!(out, "  {:<16}{}", "successful", perf.successful);
    let _ = writeln!(out, "  {:<16}{}", "failed", perf.failed);
    let _ = writeln!(out, "  {:<16}{:.1}%", "success rate", perf.success_rate * 100.0);
    if let Some(confidence) = perf.avg_confidence {
        let _ = writeln!(out, "  {:<16}{:.2}", "avg confidence", confidence);
    }
    if let Some(minutes) = perf.avg_resolution_minutes {
        let _ = writeln!(out, "  {:<16}{:.1} min", "avg resolution", minutes);
    }
    out
}

pub(crate) fn derived_line(issue: &DerivedIssue) -> String {
    match &issue.resolved_by {
        Some(by) => format!("{}  {}  by {}", issue.dedup_key, issue.status, by),
        None => format!("{}  {}", issue.dedup_key, issue.status),
    }
}

#[cfg(test)]
mod tests {
    use sentinel_interventions::storage::{Priority, Status};

    use super::*;

    fn record() -> InterventionRecord {
        let mut r = InterventionRecord::new(
            "t-1",
            "sale.order:7:qty_mismatch",
            "sale.order",
            7,
            "qty_mismatch",
            "Quantity mismatch on SO7",
            Status::Open,
            "2025-05-01T08:00:00.000000Z",
        );
        r.priority = Priority::High;
        r
    }

    #[test]
    fn line_shows_dash_for_unassigned() {
        let line = record_line(&record());
        assert!(line.starts_with("t-1  high"));
        assert!(line.contains("  -  "));
        assert!(line.ends_with("sale.order:7  Quantity mismatch on SO7"));
    }

    #[test]
    fn detail_lists_history_and_skips_empty_fields() {
        let text = record_detail(&record());
        assert!(text.contains("history:"));
        assert!(text.contains("2025-05-01T08:00:00.000000Z  open"));
        assert!(!text.contains("assignee"));
        assert!(!text.contains("execution log:"));
    }

    #[test]
    fn stats_omit_empty_groups() {
        let text = stats(&InterventionStats {
            period_days: 7,
            ..Default::default()
        });
        assert_eq!(text, "0 interventions in the last 7 days\n");
    }
}
