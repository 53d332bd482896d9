mod commands;
mod render;

use std::path::{Path, PathBuf};
use std::process;
use std::sync::Arc;

use clap::{Parser, Subcommand, ValueEnum};
use sentinel_interventions::storage::{
    HttpWarehouseClient, InterventionBackend, MemoryBackend, Priority, Status, WarehouseBackend,
};
use sentinel_interventions::{EngineConfig, InterventionStore, RequestContext, WebhookNotifier};
use tracing::debug;

/// Output format for CLI responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub(crate) enum OutputFormat {
    Text,
    Json,
}

/// Sentinel intervention lifecycle and audit tool.
#[derive(Parser)]
#[command(name = "sentinel", version, about = "Sentinel intervention lifecycle and audit tool")]
struct Cli {
    /// Output format (text or json)
    #[arg(long, global = true, default_value = "text", value_enum)]
    output: OutputFormat,

    /// Suppress non-essential output
    #[arg(long, global = true)]
    quiet: bool,

    /// Path to a sentinel.toml configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Snapshot file holding the interventions (overrides store_path and any warehouse)
    #[arg(long, global = true)]
    store: Option<PathBuf>,

    /// Who is acting; recorded in status history
    #[arg(long, global = true, default_value = "cli")]
    user: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
pub(crate) enum Commands {
    /// List interventions, critical first
    List {
        #[arg(long)]
        status: Option<Status>,
        #[arg(long)]
        assignee: Option<String>,
        #[arg(long)]
        department: Option<String>,
        #[arg(long)]
        priority: Option<Priority>,
        #[arg(long)]
        issue_type: Option<String>,
        /// Maximum rows to show (0 for all)
        #[arg(long, default_value = "50")]
        limit: usize,
    },

    /// Show one intervention with its history
    Show { task_id: String },

    /// Record a new intervention
    Create {
        #[arg(long)]
        document_type: String,
        #[arg(long)]
        document_id: i64,
        #[arg(long)]
        issue_type: String,
        #[arg(long)]
        title: String,
        #[arg(long, default_value = "medium")]
        priority: Priority,
        #[arg(long)]
        department: Option<String>,
        #[arg(long)]
        description: Option<String>,
        /// Skip creation when an open intervention exists for the same issue
        #[arg(long)]
        dedup: bool,
    },

    /// Assign an intervention to someone
    Assign {
        task_id: String,
        assignee: String,
        /// The assignee is an AI agent
        #[arg(long)]
        agent: bool,
    },

    /// Assign an unassigned intervention to --user
    Claim {
        task_id: String,
        /// --user is an AI agent
        #[arg(long)]
        agent: bool,
    },

    /// Defer an intervention
    Snooze {
        task_id: String,
        /// When it comes back, as an ISO-8601 timestamp (UTC if no offset)
        #[arg(long)]
        until: String,
        #[arg(long)]
        reason: Option<String>,
    },

    /// Mark an intervention resolved
    Resolve {
        task_id: String,
        #[arg(long = "type", default_value = "fixed")]
        resolution_type: String,
        #[arg(long)]
        notes: Option<String>,
    },

    /// Approve a plan awaiting approval
    Approve {
        task_id: String,
        #[arg(long)]
        notes: Option<String>,
    },

    /// Send a plan back for re-planning
    Reject {
        task_id: String,
        #[arg(long)]
        reason: String,
    },

    /// Counts by status, priority and issue type
    Stats {
        #[arg(long)]
        department: Option<String>,
        #[arg(long, default_value = "7")]
        days: u32,
    },

    /// Success rate and timings of one agent
    Agent {
        agent_id: String,
        #[arg(long, default_value = "30")]
        days: u32,
    },

    /// Derive issue status from daily detection partitions
    Derive {
        /// Current partition, YYYY-MM-DD (default: today, UTC)
        #[arg(long)]
        date: Option<String>,
        #[arg(long)]
        document_type: Option<String>,
        #[arg(long)]
        issue_type: Option<String>,
        #[arg(long)]
        department: Option<String>,
        /// Days before the current partition to search (default from config)
        #[arg(long)]
        lookback_days: Option<u32>,
    },
}

/// Settings every command needs besides its own arguments.
pub(crate) struct Env {
    pub output: OutputFormat,
    pub quiet: bool,
    pub user: String,
    pub ctx: RequestContext,
    pub config: EngineConfig,
}

fn main() {
    let cli = Cli::parse();
    init_tracing();

    let config = match load_config(cli.config.as_deref()) {
        Ok(config) => config,
        Err(msg) => {
            report_error(&msg, cli.output, cli.quiet);
            process::exit(1);
        }
    };
    let env = Env {
        output: cli.output,
        quiet: cli.quiet,
        ctx: RequestContext::for_cli("sentinel-cli")
            .with_environment(config.environment.clone())
            .with_user(cli.user.clone()),
        user: cli.user,
        config,
    };

    let rt = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            report_error(&format!("failed to start runtime: {e}"), env.output, env.quiet);
            process::exit(1);
        }
    };

    let store_path = cli.store.clone().or_else(|| env.config.store_path.clone());
    let ok = match (store_path, env.config.warehouse.endpoint.clone()) {
        (None, Some(endpoint)) => {
            let client = HttpWarehouseClient::new(endpoint, env.config.warehouse.auth_token.clone());
            let backend = WarehouseBackend::new(client, env.config.warehouse.table_id());
            debug!(table = %backend.table(), "using warehouse store");
            rt.block_on(commands::run(&build_store(backend, &env.config), cli.command, &env))
        }
        (path, _) => {
            let path = path.unwrap_or_else(|| PathBuf::from(DEFAULT_STORE_PATH));
            let backend = match MemoryBackend::open(&path) {
                Ok(backend) => backend,
                Err(e) => {
                    report_error(&format!("failed to open store: {e}"), env.output, env.quiet);
                    process::exit(1);
                }
            };
            debug!(path = %path.display(), "using snapshot store");
            rt.block_on(commands::run(&build_store(backend, &env.config), cli.command, &env))
        }
    };
    if !ok {
        process::exit(1);
    }
}

/// Snapshot file used when neither `--store`, `store_path` nor a warehouse
/// is configured.
const DEFAULT_STORE_PATH: &str = "sentinel-interventions.json";

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_env("SENTINEL_LOG")
        .or_else(|_| tracing_subscriber::EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(path: Option<&Path>) -> Result<EngineConfig, String> {
    let loaded = match path {
        Some(path) => EngineConfig::load(path),
        None => EngineConfig::from_env(),
    };
    loaded.map_err(|e| e.to_string())
}

fn build_store<B: InterventionBackend>(backend: B, config: &EngineConfig) -> InterventionStore<B> {
    InterventionStore::new(backend)
        .with_approval_policy(config.approval.clone())
        .with_notifier(Arc::from(WebhookNotifier::from_config(&config.notify)))
}

pub(crate) fn report_error(msg: &str, output: OutputFormat, quiet: bool) {
    if quiet {
        return;
    }
    match output {
        OutputFormat::Text => eprintln!("error: {}", msg),
        OutputFormat::Json => {
            eprintln!("{}", serde_json::json!({ "error": msg }));
        }
    }
}
