//! Subcommand implementations.
//!
//! Each command prints its result in the requested format and returns
//! whether it succeeded; `main` turns `false` into exit code 1.

mod reports;
mod tasks;
mod workflow;

use sentinel_interventions::storage::InterventionBackend;
use sentinel_interventions::{
    DerivationScope, InterventionQuery, InterventionStore, NewIntervention,
};

use crate::{report_error, Commands, Env};

pub(crate) async fn run<B: InterventionBackend>(
    store: &InterventionStore<B>,
    command: Commands,
    env: &Env,
) -> bool {
    match command {
        Commands::List {
            status,
            assignee,
            department,
            priority,
            issue_type,
            limit,
        } => {
            let query = InterventionQuery {
                status,
                assignee_id: assignee,
                department,
                priority,
                issue_type,
                ..Default::default()
            };
            tasks::cmd_list(store, &query, limit, env).await
        }
        Commands::Show { task_id } => tasks::cmd_show(store, &task_id, env).await,
        Commands::Create {
            document_type,
            document_id,
            issue_type,
            title,
            priority,
            department,
            description,
            dedup,
        } => {
            let mut new = NewIntervention::new(document_type, document_id, issue_type, title)
                .with_priority(priority);
            new.department = department;
            new.description = description;
            tasks::cmd_create(store, new, dedup, env).await
        }
        Commands::Assign {
            task_id,
            assignee,
            agent,
        } => workflow::cmd_assign(store, &task_id, &assignee, agent, env).await,
        Commands::Claim { task_id, agent } => {
            workflow::cmd_claim(store, &task_id, agent, env).await
        }
        Commands::Snooze {
            task_id,
            until,
            reason,
        } => workflow::cmd_snooze(store, &task_id, &until, reason.as_deref(), env).await,
        Commands::Resolve {
            task_id,
            resolution_type,
            notes,
        } => {
            workflow::cmd_resolve(store, &task_id, &resolution_type, notes.as_deref(), env).await
        }
        Commands::Approve { task_id, notes } => {
            workflow::cmd_approve(store, &task_id, notes.as_deref(), env).await
        }
        Commands::Reject { task_id, reason } => {
            workflow::cmd_reject(store, &task_id, &reason, env).await
        }
        Commands::Stats { department, days } => {
            reports::cmd_stats(store, department.as_deref(), days, env).await
        }
        Commands::Agent { agent_id, days } => {
            reports::cmd_agent(store, &agent_id, days, env).await
        }
        Commands::Derive {
            date,
            document_type,
            issue_type,
            department,
            lookback_days,
        } => {
            let scope = DerivationScope {
                document_type,
                issue_type,
                department,
                lookback_days: lookback_days.unwrap_or(env.config.derivation.lookback_days),
            };
            reports::cmd_derive(store, date.as_deref(), &scope, env).await
        }
    }
}

/// Print `value` as pretty JSON.
fn print_json<T: serde::Serialize>(value: &T, env: &Env) -> bool {
    match serde_json::to_string_pretty(value) {
        Ok(text) => {
            println!("{}", text);
            true
        }
        Err(e) => {
            report_error(&format!("serialization error: {}", e), env.output, env.quiet);
            false
        }
    }
}
