use serde::Serialize;
use sentinel_interventions::storage::timestamp::parse_timestamp;
use sentinel_interventions::storage::{AssigneeType, InterventionBackend};
use sentinel_interventions::InterventionStore;

use super::print_json;
use crate::{report_error, Env, OutputFormat};

// ── Outcome ──────────────────────────────────────────────────────────────────

#[derive(Serialize)]
struct Outcome<'a> {
    task_id: &'a str,
    action: &'static str,
    status: Option<String>,
}

/// Report the outcome of a lifecycle operation. On success the fresh status
/// is read back so the caller sees where the intervention ended up.
async fn finish<B: InterventionBackend>(
    store: &InterventionStore<B>,
    task_id: &str,
    action: &'static str,
    ok: bool,
    env: &Env,
) -> bool {
    if !ok {
        let msg = match store.get(task_id).await {
            None => format!("intervention '{}' not found", task_id),
            Some(record) => format!(
                "cannot {} intervention '{}' (status {})",
                action, task_id, record.status
            ),
        };
        report_error(&msg, env.output, env.quiet);
        return false;
    }
    let status = store.get(task_id).await.map(|r| r.status.to_string());
    match env.output {
        OutputFormat::Json => print_json(
            &Outcome {
                task_id,
                action,
                status,
            },
            env,
        ),
        OutputFormat::Text => {
            if !env.quiet {
                match status {
                    Some(status) => println!("{}: {} -> {}", action, task_id, status),
                    None => println!("{}: {}", action, task_id),
                }
            }
            true
        }
    }
}

fn assignee_type(agent: bool) -> AssigneeType {
    if agent {
        AssigneeType::AiAgent
    } else {
        AssigneeType::Human
    }
}

// ── Commands ─────────────────────────────────────────────────────────────────

pub(crate) async fn cmd_assign<B: InterventionBackend>(
    store: &InterventionStore<B>,
    task_id: &str,
    assignee: &str,
    agent: bool,
    env: &Env,
) -> bool {
    let ok = store
        .assign(task_id, assignee, assignee_type(agent), &env.user)
        .await;
    finish(store, task_id, "assign", ok, env).await
}

pub(crate) async fn cmd_claim<B: InterventionBackend>(
    store: &InterventionStore<B>,
    task_id: &str,
    agent: bool,
    env: &Env,
) -> bool {
    let ok = store.claim(task_id, &env.user, assignee_type(agent)).await;
    finish(store, task_id, "claim", ok, env).await
}

pub(crate) async fn cmd_snooze<B: InterventionBackend>(
    store: &InterventionStore<B>,
    task_id: &str,
    until: &str,
    reason: Option<&str>,
    env: &Env,
) -> bool {
    let Some(until) = parse_timestamp(until) else {
        report_error(
            &format!("invalid --until '{}': expected an ISO-8601 timestamp", until),
            env.output,
            env.quiet,
        );
        return false;
    };
    let ok = store.snooze(task_id, until, &env.user, reason).await;
    finish(store, task_id, "snooze", ok, env).await
}

pub(crate) async fn cmd_resolve<B: InterventionBackend>(
    store: &InterventionStore<B>,
    task_id: &str,
    resolution_type: &str,
    notes: Option<&str>,
    env: &Env,
) -> bool {
    let ok = store
        .resolve(task_id, resolution_type, &env.user, notes, None)
        .await;
    finish(store, task_id, "resolve", ok, env).await
}

pub(crate) async fn cmd_approve<B: InterventionBackend>(
    store: &InterventionStore<B>,
    task_id: &str,
    notes: Option<&str>,
    env: &Env,
) -> bool {
    let ok = store.approve_plan(task_id, &env.user, notes).await;
    finish(store, task_id, "approve", ok, env).await
}

pub(crate) async fn cmd_reject<B: InterventionBackend>(
    store: &InterventionStore<B>,
    task_id: &str,
    reason: &str,
    env: &Env,
) -> bool {
    let ok = store.reject_plan(task_id, &env.user, reason).await;
    finish(store, task_id, "reject", ok, env).await
}
