use anyhow::{Context, Result};
use lettre::message::{header, Mailbox, Message};
use lettre::transport::smtp::{authentication::Credentials, AsyncSmtpTransport};
use lettre::{AsyncTransport, Tokio1Executor};

use super::{Notifier, RenderedMessage};
use crate::analyze::Channel;
use crate::error::InitError;

const SUBJECT_PREFIX: &str = "[RIVAL WATCH]";

/// SMTP settings as read from the environment. All five or none.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SmtpSettings {
    pub host: Option<String>,
    pub user: Option<String>,
    pub pass: Option<String>,
    pub from: Option<String>,
    /// Comma-separated recipients.
    pub to: Option<String>,
}

impl SmtpSettings {
    pub fn from_env() -> Self {
        let var = |k: &str| std::env::var(k).ok().filter(|v| !v.trim().is_empty());
        Self {
            host: var("SMTP_HOST"),
            user: var("SMTP_USER"),
            pass: var("SMTP_PASS"),
            from: var("ALERT_EMAIL_FROM"),
            to: var("ALERT_EMAIL_TO"),
        }
    }

    fn fields(&self) -> [(&'static str, Option<&str>); 5] {
        [
            ("SMTP_HOST", self.host.as_deref()),
            ("SMTP_USER", self.user.as_deref()),
            ("SMTP_PASS", self.pass.as_deref()),
            ("ALERT_EMAIL_FROM", self.from.as_deref()),
            ("ALERT_EMAIL_TO", self.to.as_deref()),
        ]
    }

    pub fn is_empty(&self) -> bool {
        self.fields().iter().all(|(_, v)| v.is_none())
    }
}

pub struct EmailNotifier {
    mailer: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
    to: Vec<Mailbox>,
}

fn parse_mailbox(name: &'static str, raw: &str) -> Result<Mailbox, InitError> {
    raw.trim().parse().map_err(|e: lettre::address::AddressError| InitError::Mailbox {
        name,
        reason: e.to_string(),
    })
}

impl EmailNotifier {
    pub fn try_from_env() -> Result<Option<Self>, InitError> {
        Self::try_from_settings(&SmtpSettings::from_env())
    }

    /// `Ok(None)` when nothing is configured; `Err` on a partial or invalid setup.
    pub fn try_from_settings(s: &SmtpSettings) -> Result<Option<Self>, InitError> {
        if s.is_empty() {
            return Ok(None);
        }
        let fields = s.fields();
        if let Some((missing, _)) = fields.iter().find(|(_, v)| v.is_none()) {
            return Err(InitError::PartialSmtp(*missing));
        }
        let get = |i: usize| fields[i].1.unwrap_or_default();

        let from = parse_mailbox("ALERT_EMAIL_FROM", get(3))?;
        let to = get(4)
            .split(',')
            .filter(|p| !p.trim().is_empty())
            .map(|p| parse_mailbox("ALERT_EMAIL_TO", p))
            .collect::<Result<Vec<_>, _>>()?;
        if to.is_empty() {
            return Err(InitError::Empty {
                name: "ALERT_EMAIL_TO",
            });
        }

        let creds = Credentials::new(get(1).to_string(), get(2).to_string());
        let mailer = AsyncSmtpTransport::<Tokio1Executor>::relay(get(0))
            .map_err(|e| InitError::Smtp(e.to_string()))?
            .credentials(creds)
            .build();

        Ok(Some(Self { mailer, from, to }))
    }
}

#[async_trait::async_trait]
impl Notifier for EmailNotifier {
    fn channel(&self) -> Channel {
        Channel::Email
    }

    async fn send(&self, msg: &RenderedMessage) -> Result<()> {
        let mut builder = Message::builder()
            .from(self.from.clone())
            .subject(format!("{SUBJECT_PREFIX} {}", msg.title))
            .header(header::ContentType::TEXT_PLAIN);
        for rcpt in &self.to {
            builder = builder.to(rcpt.clone());
        }
        let email = builder.body(msg.body.clone()).context("build email")?;

        self.mailer.send(email).await.context("send email")?;
        Ok(())
    }
}
