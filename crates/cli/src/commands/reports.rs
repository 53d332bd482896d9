use sentinel_interventions::storage::timestamp::parse_date;
use sentinel_interventions::storage::InterventionBackend;
use sentinel_interventions::{DerivationScope, InterventionStore};
use time::OffsetDateTime;

use super::print_json;
use crate::{render, report_error, Env, OutputFormat};

pub(crate) async fn cmd_stats<B: InterventionBackend>(
    store: &InterventionStore<B>,
    department: Option<&str>,
    days: u32,
    env: &Env,
) -> bool {
    let stats = store.get_stats(department, days).await;
    match env.output {
        OutputFormat::Json => print_json(&stats, env),
        OutputFormat::Text => {
            print!("{}", render::stats(&stats));
            true
        }
    }
}

pub(crate) async fn cmd_agent<B: InterventionBackend>(
    store: &InterventionStore<B>,
    agent_id: &str,
    days: u32,
    env: &Env,
) -> bool {
    let perf = store.get_agent_performance(agent_id, days).await;
    match env.output {
        OutputFormat::Json => print_json(&perf, env),
        OutputFormat::Text => {
            print!("{}", render::performance(&perf));
            true
        }
    }
}

pub(crate) async fn cmd_derive<B: InterventionBackend>(
    store: &InterventionStore<B>,
    date: Option<&str>,
    scope: &DerivationScope,
    env: &Env,
) -> bool {
    let current = match date {
        None => OffsetDateTime::now_utc().date(),
        Some(text) => match parse_date(text) {
            Some(date) => date,
            None => {
                report_error(
                    &format!("invalid --date '{}': expected YYYY-MM-DD", text),
                    env.output,
                    env.quiet,
                );
                return false;
            }
        },
    };
    let issues = store.derive_statuses(scope, current).await;
    match env.output {
        OutputFormat::Json => print_json(&issues, env),
        OutputFormat::Text => {
            if issues.is_empty() {
                if !env.quiet {
                    println!("no issues in scope");
                }
                return true;
            }
            for issue in &issues {
                println!("{}", render::derived_line(issue));
            }
            true
        }
    }
}
