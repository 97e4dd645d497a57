// src/config/mod.rs
//! Process configuration, read once at startup and passed down explicitly.

use std::net::SocketAddr;
use std::path::PathBuf;

use chrono::Duration;

use crate::brief::writer::{LlmSettings, DEFAULT_OPENAI_MODEL};
use crate::dedup::DEFAULT_RETENTION_DAYS;
use crate::error::ConfigError;
use crate::notify::email::SmtpSettings;

pub const DEFAULT_DEDUP_STORE_PATH: &str = "state/dedup.json";
pub const DEFAULT_DATA_DIR: &str = "data";
pub const DEFAULT_BRIEFS_DIR: &str = "briefs";
pub const DEFAULT_HTTP_BIND: &str = "127.0.0.1:8080";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub slack_webhook_url: Option<String>,
    pub smtp: SmtpSettings,
    pub llm: Option<LlmSettings>,
    pub dedup_store_path: PathBuf,
    pub dedup_retention_days: i64,
    pub data_dir: PathBuf,
    pub briefs_dir: PathBuf,
    pub http_bind: SocketAddr,
}

fn var(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let dedup_retention_days = match var("DEDUP_RETENTION_DAYS") {
            None => DEFAULT_RETENTION_DAYS,
            Some(v) => match v.trim().parse::<i64>() {
                Ok(d) if d > 0 => d,
                _ => {
                    return Err(ConfigError::Invalid(format!(
                        "DEDUP_RETENTION_DAYS must be a positive integer, got {v:?}"
                    )))
                }
            },
        };

        let bind = var("HTTP_BIND").unwrap_or_else(|| DEFAULT_HTTP_BIND.to_string());
        let http_bind = bind
            .parse::<SocketAddr>()
            .map_err(|e| ConfigError::Invalid(format!("HTTP_BIND {bind:?}: {e}")))?;

        let llm = var("OPENAI_API_KEY").map(|api_key| LlmSettings {
            api_key,
            model: var("OPENAI_MODEL").unwrap_or_else(|| DEFAULT_OPENAI_MODEL.to_string()),
        });

        Ok(Self {
            slack_webhook_url: var("SLACK_WEBHOOK_URL"),
            smtp: SmtpSettings::from_env(),
            llm,
            dedup_store_path: var("DEDUP_STORE_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_DEDUP_STORE_PATH)),
            dedup_retention_days,
            data_dir: var("DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_DIR)),
            briefs_dir: var("BRIEFS_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_BRIEFS_DIR)),
            http_bind,
        })
    }

    pub fn retention(&self) -> Duration {
        Duration::days(self.dedup_retention_days)
    }

    /// One line per optional capability, for `config-check` and startup logs.
    pub fn capabilities(&self) -> Vec<(&'static str, bool)> {
        vec![
            ("chat", self.slack_webhook_url.is_some()),
            ("email", !self.smtp.is_empty()),
            ("llm_brief", self.llm.is_some()),
        ]
    }
}
