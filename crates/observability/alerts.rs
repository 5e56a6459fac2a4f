//! Forwards high-severity tracing events to a Discord-compatible webhook.
//! Events are queued on a bounded channel; when it is full they are dropped
//! rather than blocking the request that logged them.

use anyhow::{Result, anyhow};
use chrono::{DateTime, SecondsFormat, Utc};
use reqwest::Client;
use serde_json::json;
use std::collections::BTreeMap;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber, warn};
use tracing_subscriber::Layer;
use tracing_subscriber::layer::Context;
use url::Url;

use super::config::ServiceContext;

const QUEUE_CAPACITY: usize = 256;
const CONTENT_LIMIT: usize = 2000;

#[derive(Debug, Clone)]
pub(crate) struct AlertEvent {
    pub(crate) level: Level,
    pub(crate) timestamp: DateTime<Utc>,
    pub(crate) target: String,
    pub(crate) location: Option<String>,
    pub(crate) message: Option<String>,
    pub(crate) fields: BTreeMap<String, String>,
}

#[derive(Clone)]
pub(crate) struct AlertSink {
    tx: mpsc::Sender<AlertEvent>,
}

impl AlertSink {
    /// Spawns the delivery task. Must be called inside a tokio runtime.
    pub(crate) fn spawn(webhook_url: Url, service_context: ServiceContext) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(3))
            .build()
            .map_err(|_| anyhow!("failed to build alert http client"))?;
        let (tx, mut rx) = mpsc::channel::<AlertEvent>(QUEUE_CAPACITY);

        tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                let content = format_alert(&service_context, &event);
                if let Err(err) = post_alert(&client, &webhook_url, content).await {
                    warn!(error = %err, "alerts: webhook delivery failed");
                }
            }
        });

        Ok(Self { tx })
    }

    fn try_send(&self, event: AlertEvent) {
        match self.tx.try_send(event) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!("alerts: queue full; dropping event");
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                warn!("alerts: queue closed; dropping event");
            }
        }
    }
}

async fn post_alert(client: &Client, webhook_url: &Url, content: String) -> Result<()> {
    let response = client
        .post(webhook_url.clone())
        .json(&json!({ "content": content }))
        .send()
        .await
        // reqwest errors include the URL, which carries the webhook token.
        .map_err(|err| {
            if err.is_timeout() {
                anyhow!("alert webhook request timed out")
            } else {
                anyhow!("alert webhook request failed")
            }
        })?;

    if !response.status().is_success() {
        return Err(anyhow!(
            "alert webhook returned non-success status: {}",
            response.status()
        ));
    }

    Ok(())
}

pub(crate) struct AlertLayer {
    sink: AlertSink,
    min_level: Level,
}

impl AlertLayer {
    pub(crate) fn new(sink: AlertSink, min_level: Level) -> Self {
        Self { sink, min_level }
    }
}

impl<S: Subscriber> Layer<S> for AlertLayer {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let metadata = event.metadata();
        // Lower verbosity value = more severe.
        if *metadata.level() > self.min_level {
            return;
        }

        let mut visitor = RedactingVisitor::default();
        event.record(&mut visitor);
        let message = visitor.fields.remove("message");

        self.sink.try_send(AlertEvent {
            level: *metadata.level(),
            timestamp: Utc::now(),
            target: metadata.target().to_string(),
            location: metadata
                .file()
                .zip(metadata.line())
                .map(|(file, line)| format!("{file}:{line}")),
            message,
            fields: visitor.fields,
        });
    }
}

#[derive(Default)]
struct RedactingVisitor {
    fields: BTreeMap<String, String>,
}

impl RedactingVisitor {
    fn insert(&mut self, field: &Field, value: String) {
        let value = if is_sensitive_key(field.name()) {
            "[REDACTED]".to_string()
        } else {
            value
        };
        self.fields.insert(field.name().to_string(), value);
    }
}

impl Visit for RedactingVisitor {
    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        self.insert(field, unquote(&format!("{value:?}")));
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        self.insert(field, value.to_string());
    }
}

fn unquote(input: &str) -> String {
    let trimmed = input.trim();
    trimmed
        .strip_prefix('"')
        .and_then(|rest| rest.strip_suffix('"'))
        .unwrap_or(trimmed)
        .to_string()
}

fn is_sensitive_key(field_name: &str) -> bool {
    let field = field_name.to_ascii_lowercase();
    ["webhook", "secret", "password", "token", "authorization", "signature"]
        .iter()
        .any(|needle| field.contains(needle))
}

pub(crate) fn format_alert(context: &ServiceContext, event: &AlertEvent) -> String {
    let mut lines = vec![
        format!(
            "**{}** `{}` `{}` `{}`",
            context.service_name,
            context.environment,
            context.component,
            event.level.as_str()
        ),
        format!(
            "`{}` `{}`{}",
            event.timestamp.to_rfc3339_opts(SecondsFormat::Secs, true),
            event.target,
            event
                .location
                .as_ref()
                .map(|location| format!(" `{location}`"))
                .unwrap_or_default()
        ),
    ];

    if let Some(message) = event.message.as_deref().filter(|m| !m.trim().is_empty()) {
        lines.push(format!("> {}", message.trim()));
    }

    for (key, value) in &event.fields {
        lines.push(format!("- `{key}` = `{value}`"));
    }

    truncate(lines.join("\n"))
}

fn truncate(content: String) -> String {
    const SUFFIX: &str = "\n(truncated)";

    if content.chars().count() <= CONTENT_LIMIT {
        return content;
    }

    let allowed = CONTENT_LIMIT - SUFFIX.chars().count();
    let mut truncated: String = content.chars().take(allowed).collect();
    truncated.push_str(SUFFIX);
    truncated
}
