// src/ingest/mod.rs
pub mod config;
pub mod providers;
pub mod types;

use crate::ingest::types::{NormalizedItem, RawItem, SourceProvider, UNKNOWN_COMPANY};
use chrono::{DateTime, Utc};
use metrics::counter;
use once_cell::sync::Lazy;
use regex::Regex;
use sha2::{Digest, Sha256};

/// Fingerprint width in bytes (160 bits).
const FINGERPRINT_BYTES: usize = 20;

static RE_TAGS: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?is)</?[^>]+>").expect("tag regex"));
static RE_WS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("whitespace regex"));
// Word characters, whitespace and `. , ! ? : ; - ( )` survive; everything else is dropped.
static RE_DISALLOWED: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^\w\s.,!?:;\-()]").expect("allow-list regex"));

/// Clean fetched text: decode HTML entities, strip tags, drop characters
/// outside the allow-list, then collapse whitespace and trim.
pub fn clean_text(s: &str) -> String {
    if s.trim().is_empty() {
        return String::new();
    }

    // 1) HTML entity decode (&nbsp; and friends end up as whitespace)
    let decoded = html_escape::decode_html_entities(s);

    // 2) Strip HTML tags
    let untagged = RE_TAGS.replace_all(&decoded, " ");

    // 3) Strip characters outside the allow-list
    let allowed = RE_DISALLOWED.replace_all(&untagged, "");

    // 4) Collapse whitespace
    RE_WS.replace_all(allowed.trim(), " ").into_owned()
}

/// 160-bit hex digest of already-cleaned text. Empty text has an empty fingerprint.
pub fn fingerprint(cleaned: &str) -> String {
    if cleaned.is_empty() {
        return String::new();
    }
    let digest = Sha256::digest(cleaned.as_bytes());
    let mut out = String::with_capacity(FINGERPRINT_BYTES * 2);
    for b in digest.iter().take(FINGERPRINT_BYTES) {
        use std::fmt::Write as _;
        let _ = write!(&mut out, "{:02x}", b);
    }
    out
}

/// Reduce a raw item to the uniform shape. Never fails: a missing company
/// becomes "Unknown" and a missing timestamp becomes `fetched_at`.
pub fn normalize(item: &RawItem, fetched_at: DateTime<Utc>) -> NormalizedItem {
    let company = item.company().trim();
    let company = if company.is_empty() {
        UNKNOWN_COMPANY.to_string()
    } else {
        company.to_string()
    };

    let text = clean_text(&item.combined_text());
    let fingerprint = fingerprint(&text);

    NormalizedItem {
        company,
        source_type: item.source_type(),
        text,
        url: item
            .url()
            .map(str::trim)
            .filter(|u| !u.is_empty())
            .map(str::to_string),
        timestamp: item.timestamp().unwrap_or(fetched_at),
        fingerprint,
    }
}

/// Run every provider once and concatenate their items in provider order.
/// A failing provider is logged and skipped.
pub async fn collect_batch(providers: &[Box<dyn SourceProvider>]) -> Vec<RawItem> {
    let mut raw = Vec::new();
    for p in providers {
        match p.fetch_latest().await {
            Ok(mut v) => {
                tracing::debug!(provider = p.name(), items = v.len(), "provider fetched");
                raw.append(&mut v);
            }
            Err(e) => {
                tracing::warn!(error = ?e, provider = p.name(), "provider error");
                counter!("provider_errors_total").increment(1);
            }
        }
    }
    raw
}
