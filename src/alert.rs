// src/alert.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::analyze::{AlertLevel, Classification};
use crate::ingest::types::{NormalizedItem, SourceType};

/// Max characters of item text carried on an alert.
pub const DISPLAY_CHARS: usize = 200;

/// A leveled notification candidate. Never built for `low` items.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Alert {
    pub level: AlertLevel,
    pub company: String,
    pub source_type: SourceType,
    pub text: String,
    pub url: Option<String>,
    pub keywords: Vec<String>,
    pub generated_at: DateTime<Utc>,
    pub fingerprint: String,
}

impl Alert {
    /// `None` when the classification is below the alert threshold.
    pub fn from_item(
        item: &NormalizedItem,
        classification: &Classification,
        generated_at: DateTime<Utc>,
    ) -> Option<Alert> {
        if !classification.is_alert() {
            return None;
        }
        Some(Alert {
            level: classification.level,
            company: item.company.clone(),
            source_type: item.source_type,
            text: truncate_display(&item.text, DISPLAY_CHARS),
            url: item.url.clone(),
            keywords: classification.keywords.clone(),
            generated_at,
            fingerprint: item.fingerprint.clone(),
        })
    }
}

/// Cut to `max` characters (not bytes) and mark the cut with `...`.
pub fn truncate_display(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        None => text.to_string(),
        Some((idx, _)) => format!("{}...", &text[..idx]),
    }
}
