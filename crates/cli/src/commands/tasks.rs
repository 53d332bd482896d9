use serde::Serialize;
use sentinel_interventions::storage::InterventionBackend;
use sentinel_interventions::{InterventionQuery, InterventionStore, NewIntervention};

use super::print_json;
use crate::{render, report_error, Env, OutputFormat};

pub(crate) async fn cmd_list<B: InterventionBackend>(
    store: &InterventionStore<B>,
    query: &InterventionQuery,
    limit: usize,
    env: &Env,
) -> bool {
    let rows = store.query(query, limit).await;
    match env.output {
        OutputFormat::Json => print_json(&rows, env),
        OutputFormat::Text => {
            if rows.is_empty() {
                if !env.quiet {
                    println!("no interventions");
                }
                return true;
            }
            for row in &rows {
                println!("{}", render::record_line(row));
            }
            true
        }
    }
}

pub(crate) async fn cmd_show<B: InterventionBackend>(
    store: &InterventionStore<B>,
    task_id: &str,
    env: &Env,
) -> bool {
    let Some(record) = store.get(task_id).await else {
        report_error(&format!("intervention '{}' not found", task_id), env.output, env.quiet);
        return false;
    };
    match env.output {
        OutputFormat::Json => print_json(&record, env),
        OutputFormat::Text => {
            print!("{}", render::record_detail(&record));
            true
        }
    }
}

#[derive(Serialize)]
struct Created {
    task_id: String,
    created: bool,
}

pub(crate) async fn cmd_create<B: InterventionBackend>(
    store: &InterventionStore<B>,
    new: NewIntervention,
    dedup: bool,
    env: &Env,
) -> bool {
    let (task_id, created) = if dedup {
        store.create_if_not_exists(&env.ctx, new).await
    } else {
        (store.create(&env.ctx, new).await, true)
    };
    let Some(task_id) = task_id else {
        report_error("failed to create intervention", env.output, env.quiet);
        return false;
    };
    match env.output {
        OutputFormat::Json => print_json(&Created { task_id, created }, env),
        OutputFormat::Text => {
            if created {
                println!("{}", task_id);
            } else {
                println!("{} (already open)", task_id);
            }
            true
        }
    }
}
