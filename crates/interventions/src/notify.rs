//! Outbound notifications.
//!
//! Notifications are fire-and-forget: a failed post is logged and dropped,
//! and never affects the store operation that triggered it.

use std::fmt;

use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::config::NotifyConfig;

/// Attachment colour of a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Info,
    Success,
    Warning,
    Error,
}

impl Severity {
    pub fn color(&self) -> &'static str {
        match self {
            Severity::Info => "#17a2b8",
            Severity::Success => "#28a745",
            Severity::Warning => "#ffc107",
            Severity::Error => "#dc3545",
        }
    }
}

/// A titled message with labelled fields and an optional footer.
#[derive(Debug, Clone, PartialEq)]
pub struct Notification {
    pub title: String,
    pub severity: Severity,
    pub fields: Vec<(String, String)>,
    pub footer: Option<String>,
}

impl Notification {
    pub fn new(title: impl Into<String>, severity: Severity) -> Self {
        Notification {
            title: title.into(),
            severity,
            fields: Vec::new(),
            footer: None,
        }
    }

    pub fn field(mut self, title: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.push((title.into(), value.into()));
        self
    }

    pub fn footer(mut self, footer: impl Into<String>) -> Self {
        self.footer = Some(footer.into());
        self
    }

    /// Slack block-kit payload: one attachment holding a header, a section
    /// of `*title*\nvalue` fields and an optional context footer.
    pub fn to_slack_payload(&self, channel: &str) -> Value {
        let fields: Vec<Value> = self
            .fields
            .iter()
            .map(|(title, value)| json!({"type": "mrkdwn", "text": format!("*{title}*\n{value}")}))
            .collect();
        let mut blocks = vec![
            json!({
                "type": "header",
                "text": {"type": "plain_text", "text": self.title, "emoji": true}
            }),
            json!({"type": "section", "fields": fields}),
        ];
        if let Some(footer) = &self.footer {
            blocks.push(json!({
                "type": "context",
                "elements": [{"type": "mrkdwn", "text": footer}]
            }));
        }
        json!({
            "channel": channel,
            "attachments": [{"color": self.severity.color(), "blocks": blocks}]
        })
    }
}

/// Sink for notifications. Implementations must not block the caller.
pub trait Notifier: Send + Sync + fmt::Debug {
    fn notify(&self, notification: Notification);
}

/// Drops every notification.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopNotifier;

impl Notifier for NoopNotifier {
    fn notify(&self, notification: Notification) {
        debug!(title = %notification.title, "notifications disabled, skipping");
    }
}

/// Posts notifications to a Slack-compatible incoming webhook.
#[derive(Debug, Clone)]
pub struct WebhookNotifier {
    webhook_url: String,
    channel: String,
}

impl WebhookNotifier {
    pub fn new(webhook_url: impl Into<String>, channel: impl Into<String>) -> Self {
        WebhookNotifier {
            webhook_url: webhook_url.into(),
            channel: channel.into(),
        }
    }

    /// The notifier described by a `[notify]` section: a webhook when one is
    /// configured and enabled, otherwise [`NoopNotifier`].
    pub fn from_config(config: &NotifyConfig) -> Box<dyn Notifier> {
        match &config.webhook_url {
            Some(url) if config.enabled && !url.is_empty() => {
                Box::new(WebhookNotifier::new(url.clone(), config.channel.clone()))
            }
            _ => Box::new(NoopNotifier),
        }
    }

    pub fn channel(&self) -> &str {
        &self.channel
    }
}

impl Notifier for WebhookNotifier {
    fn notify(&self, notification: Notification) {
        let url = self.webhook_url.clone();
        let payload = notification.to_slack_payload(&self.channel);
        let title = notification.title;
        let send = move || {
            if let Err(e) = post_webhook(&url, &payload) {
                warn!(title = %title, error = %e, "failed to send notification");
            }
        };
        match tokio::runtime::Handle::try_current() {
            // ureq is synchronous, so wrap in spawn_blocking
            Ok(handle) => {
                handle.spawn_blocking(send);
            }
            Err(_) => {
                std::thread::spawn(send);
            }
        }
    }
}

fn post_webhook(url: &str, payload: &Value) -> Result<(), String> {
    let agent = ureq::Agent::new_with_defaults();
    agent
        .post(url)
        .header("content-type", "application/json")
        .send_json(payload)
        .map_err(|e| format!("webhook post to {url} failed: {e}"))?;
    Ok(())
}
