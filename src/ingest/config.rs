// src/ingest/config.rs
//! Competitor table: which companies to watch and where their content lives.

use crate::error::ConfigError;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

pub const ENV_COMPETITORS_PATH: &str = "COMPETITORS_PATH";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Competitor {
    pub name: String,
    #[serde(default)]
    pub website: Option<String>,
    #[serde(default)]
    pub blog_feed_url: Option<String>,
    #[serde(default)]
    pub jobs_json_url: Option<String>,
    #[serde(default)]
    pub twitter_handle: Option<String>,
    #[serde(default)]
    pub linkedin_company: Option<String>,
    #[serde(default)]
    pub keywords: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct CompetitorFile {
    competitors: Vec<Competitor>,
}

/// Load competitors from an explicit path. Supports TOML or JSON formats.
pub fn load_competitors_from(path: &Path) -> Result<Vec<Competitor>, ConfigError> {
    let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.display().to_string(),
        source,
    })?;
    let ext = path
        .extension()
        .and_then(|s| s.to_str())
        .unwrap_or_default()
        .to_ascii_lowercase();
    let parsed: CompetitorFile = match ext.as_str() {
        "toml" => toml::from_str(&content)?,
        "json" => serde_json::from_str(&content)?,
        other => return Err(ConfigError::UnsupportedFormat(other.to_string())),
    };
    Ok(clean_list(parsed.competitors))
}

/// Load competitors using env var + fallbacks:
/// 1) $COMPETITORS_PATH
/// 2) config/competitors.toml
/// 3) config/competitors.json
/// 4) built-in seed
pub fn load_competitors_default() -> Result<Vec<Competitor>, ConfigError> {
    if let Ok(p) = std::env::var(ENV_COMPETITORS_PATH) {
        let pb = PathBuf::from(p);
        if pb.exists() {
            return load_competitors_from(&pb);
        }
        return Err(ConfigError::MissingPath(ENV_COMPETITORS_PATH));
    }
    for candidate in ["config/competitors.toml", "config/competitors.json"] {
        let p = PathBuf::from(candidate);
        if p.exists() {
            return load_competitors_from(&p);
        }
    }
    Ok(default_seed())
}

/// Drop entries without a name and keep the first entry per name (case-insensitive).
fn clean_list(items: Vec<Competitor>) -> Vec<Competitor> {
    let mut out: Vec<Competitor> = Vec::with_capacity(items.len());
    for mut it in items {
        it.name = it.name.trim().to_string();
        if it.name.is_empty() {
            continue;
        }
        if out.iter().any(|c| c.name.eq_ignore_ascii_case(&it.name)) {
            continue;
        }
        out.push(it);
    }
    out
}

/// Built-in watch list used when no config file is present.
pub fn default_seed() -> Vec<Competitor> {
    let seed = [
        (
            "Mobile Premier League",
            "https://mpl.live",
            "PlayMPL",
            "mobile-premier-league",
            &["fantasy sports", "cash games", "tournaments", "esports"][..],
        ),
        (
            "WinZO Games",
            "https://winzogames.com",
            "WinZOgames",
            "winzo-games",
            &["vernacular games", "micro-transactions", "developer fund"][..],
        ),
        (
            "Zupee",
            "https://zupee.com",
            "Zupee_official",
            "zupee",
            &["ludo", "skill-based", "responsible gaming"][..],
        ),
        (
            "Gameskraft",
            "https://gameskraft.com",
            "GameskraftTech",
            "gameskraft",
            &["rummy", "GST", "profitability", "standalone apps"][..],
        ),
        (
            "Dream Sports",
            "https://dreamsports.group",
            "DreamSportsHQ",
            "dream-sports",
            &["fantasy sports", "Dream11", "casual gaming", "carrom"][..],
        ),
    ];

    seed.iter()
        .map(|(name, site, handle, linkedin, kw)| Competitor {
            name: name.to_string(),
            website: Some(site.to_string()),
            blog_feed_url: Some(format!("{site}/blog/feed")),
            jobs_json_url: None,
            twitter_handle: Some(handle.to_string()),
            linkedin_company: Some(linkedin.to_string()),
            keywords: kw.iter().map(|k| k.to_string()).collect(),
        })
        .collect()
}
