//! Engine configuration.
//!
//! Loaded from a TOML file, then overlaid with environment variables.
//!
//! # Example
//!
//! ```toml
//! environment = "prod"
//! store_path = "/var/lib/sentinel/interventions.json"
//!
//! [warehouse]
//! endpoint = "https://warehouse-gateway.internal"
//! project = "acme-ops"
//! dataset = "sentinel"
//! table = "intervention_tasks"
//!
//! [approval]
//! default_threshold = 0.9
//!
//! [approval.overrides]
//! qty_mismatch = 0.8
//!
//! [derivation]
//! lookback_days = 7
//!
//! [notify]
//! webhook_url = "https://hooks.slack.com/services/..."
//! channel = "#sentinel-alerts"
//! enabled = true
//!
//! [trackers.adjust_closed_order_quantities]
//! issue_type = "qty_mismatch"
//! document_type = "sale.order"
//! enabled = true
//! priority = "high"
//! department = "operations"
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use sentinel_storage::Priority;

/// Errors raised while loading or validating configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("could not read '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("could not parse '{path}': {message}")]
    Parse { path: PathBuf, message: String },

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

// ── Types ─────────────────────────────────────────────────────────────────────

/// Top-level configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Deployment environment stamped on every row.
    #[serde(default = "default_environment")]
    pub environment: String,
    /// Snapshot file for the in-process store.
    #[serde(default)]
    pub store_path: Option<PathBuf>,
    #[serde(default)]
    pub warehouse: WarehouseConfig,
    #[serde(default)]
    pub approval: ApprovalPolicy,
    #[serde(default)]
    pub derivation: DerivationConfig,
    #[serde(default)]
    pub notify: NotifyConfig,
    /// Per-job tracker configuration, keyed by job name.
    #[serde(default)]
    pub trackers: BTreeMap<String, TrackerConfig>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            environment: default_environment(),
            store_path: None,
            warehouse: WarehouseConfig::default(),
            approval: ApprovalPolicy::default(),
            derivation: DerivationConfig::default(),
            notify: NotifyConfig::default(),
            trackers: BTreeMap::new(),
        }
    }
}

/// `[warehouse]` section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WarehouseConfig {
    /// Base URL of the SQL-over-HTTP gateway. Unset means no warehouse.
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default)]
    pub auth_token: Option<String>,
    #[serde(default)]
    pub project: Option<String>,
    #[serde(default = "default_dataset")]
    pub dataset: String,
    #[serde(default = "default_table")]
    pub table: String,
}

impl Default for WarehouseConfig {
    fn default() -> Self {
        WarehouseConfig {
            endpoint: None,
            auth_token: None,
            project: None,
            dataset: default_dataset(),
            table: default_table(),
        }
    }
}

impl WarehouseConfig {
    /// Fully qualified table id, `project.dataset.table` or `dataset.table`.
    pub fn table_id(&self) -> String {
        match &self.project {
            Some(project) if !project.is_empty() => {
                format!("{project}.{}.{}", self.dataset, self.table)
            }
            _ => format!("{}.{}", self.dataset, self.table),
        }
    }
}

/// `[approval]` section: when a submitted plan needs human sign-off.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApprovalPolicy {
    /// Plans with confidence strictly below this need approval.
    #[serde(default = "default_threshold")]
    pub default_threshold: f64,
    /// Per-issue-type thresholds.
    #[serde(default)]
    pub overrides: BTreeMap<String, f64>,
}

impl Default for ApprovalPolicy {
    fn default() -> Self {
        ApprovalPolicy {
            default_threshold: default_threshold(),
            overrides: BTreeMap::new(),
        }
    }
}

impl ApprovalPolicy {
    pub fn threshold(&self, issue_type: &str) -> f64 {
        self.overrides
            .get(issue_type)
            .copied()
            .unwrap_or(self.default_threshold)
    }

    pub fn requires_approval(&self, issue_type: &str, confidence: f64) -> bool {
        confidence < self.threshold(issue_type)
    }
}

/// `[derivation]` section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DerivationConfig {
    /// How many days before the current partition to scan for the previous
    /// one.
    #[serde(default = "default_lookback_days")]
    pub lookback_days: u32,
}

impl Default for DerivationConfig {
    fn default() -> Self {
        DerivationConfig {
            lookback_days: default_lookback_days(),
        }
    }
}

/// `[notify]` section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotifyConfig {
    #[serde(default)]
    pub webhook_url: Option<String>,
    #[serde(default = "default_channel")]
    pub channel: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl Default for NotifyConfig {
    fn default() -> Self {
        NotifyConfig {
            webhook_url: None,
            channel: default_channel(),
            enabled: true,
        }
    }
}

/// Static configuration binding one detection job to an issue type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackerConfig {
    pub issue_type: String,
    pub document_type: String,
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default)]
    pub department: Option<String>,
    /// Extra keys merged into the metadata of every detection.
    #[serde(default)]
    pub defaults: BTreeMap<String, serde_json::Value>,
}

impl TrackerConfig {
    /// A disabled config for the given issue and document type.
    pub fn new(issue_type: impl Into<String>, document_type: impl Into<String>) -> Self {
        TrackerConfig {
            issue_type: issue_type.into(),
            document_type: document_type.into(),
            enabled: false,
            priority: Priority::Medium,
            department: None,
            defaults: BTreeMap::new(),
        }
    }

    pub fn enable(mut self) -> Self {
        self.enabled = true;
        self
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_department(mut self, department: impl Into<String>) -> Self {
        self.department = Some(department.into());
        self
    }
}

fn default_environment() -> String {
    "dev".to_string()
}

fn default_dataset() -> String {
    "sentinel".to_string()
}

fn default_table() -> String {
    "intervention_tasks".to_string()
}

fn default_threshold() -> f64 {
    0.9
}

fn default_lookback_days() -> u32 {
    7
}

fn default_channel() -> String {
    "#sentinel-alerts".to_string()
}

fn default_true() -> bool {
    true
}

// ── Loading ───────────────────────────────────────────────────────────────────

impl EngineConfig {
    /// Read, parse, overlay the process environment, and validate.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config: EngineConfig =
            toml::from_str(&content).map_err(|e| ConfigError::Parse {
                path: path.to_path_buf(),
                message: e.to_string(),
            })?;
        config.apply_env(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Defaults overlaid with the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = EngineConfig::default();
        config.apply_env(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Overlay `SENTINEL_*` variables looked up through `lookup`.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(env) = lookup("SENTINEL_ENVIRONMENT") {
            self.environment = env;
        }
        if let Some(url) = lookup("SENTINEL_WEBHOOK_URL") {
            self.notify.webhook_url = Some(url);
        }
        if let Some(path) = lookup("SENTINEL_STORE_PATH") {
            self.store_path = Some(PathBuf::from(path));
        }
        if let Some(endpoint) = lookup("SENTINEL_WAREHOUSE_ENDPOINT") {
            self.warehouse.endpoint = Some(endpoint);
        }
        if let Some(token) = lookup("SENTINEL_WAREHOUSE_TOKEN") {
            self.warehouse.auth_token = Some(token);
        }
    }

    /// Reject values the engine cannot run with. Reports every problem.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut errors = Vec::new();
        let in_unit = |v: f64| (0.0..=1.0).contains(&v);
        if !in_unit(self.approval.default_threshold) {
            errors.push(format!(
                "approval.default_threshold must be within [0, 1], got {}",
                self.approval.default_threshold
            ));
        }
        for (issue_type, threshold) in &self.approval.overrides {
            if !in_unit(*threshold) {
                errors.push(format!(
                    "approval.overrides.{issue_type} must be within [0, 1], got {threshold}"
                ));
            }
        }
        if self.derivation.lookback_days == 0 {
            errors.push("derivation.lookback_days must be at least 1".to_string());
        }
        for (job, tracker) in &self.trackers {
            if tracker.issue_type.trim().is_empty() || tracker.document_type.trim().is_empty() {
                errors.push(format!(
                    "trackers.{job} needs a non-empty issue_type and document_type"
                ));
            }
        }
        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Invalid(errors.join("; ")))
        }
    }

    /// Tracker configuration for a job, if one is declared.
    pub fn tracker(&self, job_name: &str) -> Option<&TrackerConfig> {
        self.trackers.get(job_name)
    }
}
