use anyhow::{Context, Result};
use reqwest::Client;
use serde_json::{json, Value};
use std::time::Duration;

use super::{Notifier, RenderedMessage};
use crate::analyze::{AlertLevel, Channel};
use crate::error::InitError;

pub const ENV_SLACK_WEBHOOK_URL: &str = "SLACK_WEBHOOK_URL";

const FOOTER: &str = "rival-watch";

pub struct SlackNotifier {
    webhook_url: String,
    client: Client,
}

impl SlackNotifier {
    /// `Ok(None)` when the webhook is not configured at all.
    pub fn try_from_env() -> Result<Option<Self>, InitError> {
        match std::env::var(ENV_SLACK_WEBHOOK_URL) {
            Ok(url) => Self::try_new(&url).map(Some),
            Err(_) => Ok(None),
        }
    }

    pub fn try_from_setting(url: Option<&str>) -> Result<Option<Self>, InitError> {
        url.map(Self::try_new).transpose()
    }

    pub fn try_new(url: &str) -> Result<Self, InitError> {
        let url = url.trim();
        if url.is_empty() {
            return Err(InitError::Empty {
                name: ENV_SLACK_WEBHOOK_URL,
            });
        }
        let parsed = reqwest::Url::parse(url).map_err(|e| InitError::InvalidUrl {
            name: ENV_SLACK_WEBHOOK_URL,
            reason: e.to_string(),
        })?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(InitError::InvalidUrl {
                name: ENV_SLACK_WEBHOOK_URL,
                reason: format!("unsupported scheme {}", parsed.scheme()),
            });
        }
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(4))
            .timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self {
            webhook_url: url.to_string(),
            client,
        })
    }
}

fn color_for(level: Option<AlertLevel>) -> &'static str {
    match level {
        Some(AlertLevel::High) => "#FF0000",
        Some(AlertLevel::Medium) => "#FFA500",
        Some(AlertLevel::Low) => "#808080",
        None => "#36A64F",
    }
}

/// Incoming-webhook body: one attachment card per message.
pub fn payload(msg: &RenderedMessage) -> Value {
    let fields: Vec<Value> = msg
        .fields
        .iter()
        .map(|(k, v)| json!({ "title": k, "value": v, "short": true }))
        .collect();

    let mut attachment = json!({
        "color": color_for(msg.level),
        "title": msg.title,
        "text": msg.body,
        "fields": fields,
        "footer": FOOTER,
        "ts": msg.ts.timestamp(),
    });
    if let Some(link) = &msg.link {
        attachment["title_link"] = json!(link);
    }

    json!({
        "text": format!("Competitive intelligence: {}", msg.title),
        "attachments": [attachment],
    })
}

#[async_trait::async_trait]
impl Notifier for SlackNotifier {
    fn channel(&self) -> Channel {
        Channel::Chat
    }

    async fn send(&self, msg: &RenderedMessage) -> Result<()> {
        self.client
            .post(&self.webhook_url)
            .json(&payload(msg))
            .send()
            .await
            .context("slack post")?
            .error_for_status()
            .context("slack non-2xx")?;
        Ok(())
    }
}
