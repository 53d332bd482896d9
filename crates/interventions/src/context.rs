//! Per-request audit context.

use std::fmt;

use serde::{Deserialize, Serialize};
use sentinel_storage::timestamp::format_timestamp;
use time::OffsetDateTime;
use uuid::Uuid;

/// What started the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerSource {
    Http,
    Scheduler,
    Cli,
    Mcp,
    #[default]
    Unknown,
}

impl TriggerSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            TriggerSource::Http => "http",
            TriggerSource::Scheduler => "scheduler",
            TriggerSource::Cli => "cli",
            TriggerSource::Mcp => "mcp",
            TriggerSource::Unknown => "unknown",
        }
    }
}

impl fmt::Display for TriggerSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identity and flags of one job run or API call.
///
/// Supplied by the job harness and threaded through every store call for the
/// audit columns. The engine reads it but never mutates it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestContext {
    pub request_id: String,
    pub job_name: String,
    pub triggered_by: TriggerSource,
    pub triggered_at: String,
    pub dry_run: bool,
    pub debug: bool,
    pub user_id: Option<String>,
    pub correlation_id: Option<String>,
    pub environment: String,
}

impl RequestContext {
    pub fn new(job_name: impl Into<String>, triggered_by: TriggerSource) -> Self {
        RequestContext {
            request_id: Uuid::new_v4().to_string(),
            job_name: job_name.into(),
            triggered_by,
            triggered_at: format_timestamp(OffsetDateTime::now_utc()),
            dry_run: false,
            debug: false,
            user_id: None,
            correlation_id: None,
            environment: "dev".to_string(),
        }
    }

    pub fn for_http(job_name: impl Into<String>) -> Self {
        Self::new(job_name, TriggerSource::Http)
    }

    pub fn for_scheduler(job_name: impl Into<String>) -> Self {
        Self::new(job_name, TriggerSource::Scheduler)
    }

    pub fn for_cli(job_name: impl Into<String>) -> Self {
        Self::new(job_name, TriggerSource::Cli)
    }

    pub fn for_mcp(job_name: impl Into<String>) -> Self {
        Self::new(job_name, TriggerSource::Mcp)
    }

    pub fn with_environment(mut self, environment: impl Into<String>) -> Self {
        self.environment = environment.into();
        self
    }

    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn with_user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    pub fn with_correlation_id(mut self, correlation_id: impl Into<String>) -> Self {
        self.correlation_id = Some(correlation_id.into());
        self
    }

    /// Flat JSON form for audit log lines.
    pub fn to_audit_json(&self) -> serde_json::Value {
        serde_json::json!({
            "request_id": self.request_id,
            "job_name": self.job_name,
            "triggered_by": self.triggered_by.as_str(),
            "triggered_at": self.triggered_at,
            "dry_run": self.dry_run,
            "debug": self.debug,
            "user_id": self.user_id,
            "correlation_id": self.correlation_id,
            "environment": self.environment,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constructors_set_trigger_and_fresh_request_id() {
        let a = RequestContext::for_scheduler("clean_old_orders");
        let b = RequestContext::for_scheduler("clean_old_orders");
        assert_eq!(a.triggered_by, TriggerSource::Scheduler);
        assert_eq!(a.job_name, "clean_old_orders");
        assert_ne!(a.request_id, b.request_id);
        assert!(!a.dry_run);
    }

    #[test]
    fn audit_json_uses_lowercase_trigger() {
        let ctx = RequestContext::for_mcp("agent")
            .with_environment("prod")
            .with_user("u-1");
        let audit = ctx.to_audit_json();
        assert_eq!(audit["triggered_by"], "mcp");
        assert_eq!(audit["environment"], "prod");
        assert_eq!(audit["user_id"], "u-1");
        assert_eq!(audit["correlation_id"], serde_json::Value::Null);
    }
}
