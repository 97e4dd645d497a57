// src/notify/mod.rs
//! Notification collaborators and message rendering.
//!
//! The router decides *where* an alert goes; this module only turns alerts
//! into channel-neutral [`RenderedMessage`]s and ships them.

pub mod cadence;
pub mod email;
pub mod slack;

use anyhow::Result;
use chrono::{DateTime, Utc};

use crate::alert::Alert;
use crate::analyze::{AlertLevel, Channel};

pub use email::EmailNotifier;
pub use slack::SlackNotifier;

/// How many keywords make it into the chat card.
const CHAT_KEYWORDS: usize = 5;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedMessage {
    /// Email subject / chat card title.
    pub title: String,
    /// Plain-text body.
    pub body: String,
    /// `None` for summaries that are not tied to one level.
    pub level: Option<AlertLevel>,
    pub link: Option<String>,
    /// Short key/value pairs shown beside the body in chat.
    pub fields: Vec<(String, String)>,
    pub ts: DateTime<Utc>,
}

#[async_trait::async_trait]
pub trait Notifier: Send + Sync {
    fn channel(&self) -> Channel;
    async fn send(&self, msg: &RenderedMessage) -> Result<()>;
}

pub fn render_alert(alert: &Alert) -> RenderedMessage {
    let level = alert.level.as_str().to_uppercase();
    let keywords = if alert.keywords.is_empty() {
        "-".to_string()
    } else {
        alert.keywords.join(", ")
    };
    let chat_keywords = alert
        .keywords
        .iter()
        .take(CHAT_KEYWORDS)
        .cloned()
        .collect::<Vec<_>>()
        .join(", ");

    let body = format!(
        "Company: {company}\nPriority: {level}\nSource: {source}\nTimestamp: {ts}\n\n{text}\n\nKeywords: {keywords}\nSource URL: {url}\n",
        company = alert.company,
        source = alert.source_type.label(),
        ts = alert.generated_at.format("%Y-%m-%d %H:%M:%S UTC"),
        text = alert.text,
        url = alert.url.as_deref().unwrap_or("N/A"),
    );

    RenderedMessage {
        title: format!("{} - {} Priority Alert", alert.company, level),
        body,
        level: Some(alert.level),
        link: alert.url.clone(),
        fields: vec![
            ("Source".into(), alert.source_type.label().into()),
            ("Keywords".into(), chat_keywords),
            (
                "Timestamp".into(),
                alert.generated_at.format("%Y-%m-%d %H:%M:%S").to_string(),
            ),
        ],
        ts: alert.generated_at,
    }
}

/// One message for a batch of deferred alerts (expected priority-sorted).
pub fn render_digest(label: &str, alerts: &[Alert], now: DateTime<Utc>) -> RenderedMessage {
    let top = alerts.iter().map(|a| a.level).max();
    let mut body = String::new();
    for a in alerts {
        body.push_str(&format!(
            "- [{}] {} ({}): {}\n",
            a.level.as_str().to_uppercase(),
            a.company,
            a.source_type.label(),
            a.text
        ));
        if let Some(url) = &a.url {
            body.push_str(&format!("  {url}\n"));
        }
    }
    RenderedMessage {
        title: format!("{label} digest: {} alerts", alerts.len()),
        body,
        level: top,
        link: None,
        fields: vec![("Alerts".into(), alerts.len().to_string())],
        ts: now,
    }
}

/// Synthetic medium alert used by the `test` CLI mode.
pub fn test_alert(now: DateTime<Utc>) -> Alert {
    Alert {
        level: AlertLevel::Medium,
        company: "Test Company".into(),
        source_type: crate::ingest::types::SourceType::Blog,
        text: "This is a test alert to verify the notification channels.".into(),
        url: None,
        keywords: vec!["test".into(), "alert".into()],
        generated_at: now,
        fingerprint: String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::types::SourceType;
    use chrono::TimeZone;

    fn alert(level: AlertLevel, company: &str) -> Alert {
        Alert {
            level,
            company: company.into(),
            source_type: SourceType::Tweet,
            text: "WinZO announces Series C funding".into(),
            url: Some("https://x.com/winzo/status/1".into()),
            keywords: vec!["series".into(), "funding".into()],
            generated_at: Utc.with_ymd_and_hms(2025, 8, 4, 9, 0, 0).unwrap(),
            fingerprint: String::new(),
        }
    }

    #[test]
    fn alert_message_has_level_company_keywords() {
        let m = render_alert(&alert(AlertLevel::High, "WinZO Games"));
        assert_eq!(m.title, "WinZO Games - HIGH Priority Alert");
        assert_eq!(m.level, Some(AlertLevel::High));
        assert!(m.body.contains("Keywords: series, funding"));
        assert!(m.body.contains("Source: Tweet"));
        assert_eq!(m.link.as_deref(), Some("https://x.com/winzo/status/1"));
        assert_eq!(m.fields[1], ("Keywords".to_string(), "series, funding".to_string()));
    }

    #[test]
    fn digest_lists_every_alert() {
        let now = Utc::now();
        let m = render_digest(
            "Daily",
            &[alert(AlertLevel::High, "MPL"), alert(AlertLevel::Medium, "Zupee")],
            now,
        );
        assert_eq!(m.title, "Daily digest: 2 alerts");
        assert_eq!(m.level, Some(AlertLevel::High));
        assert!(m.body.contains("[HIGH] MPL"));
        assert!(m.body.contains("[MEDIUM] Zupee"));
    }
}
