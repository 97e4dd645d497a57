//! Alert rule table: per level, the match patterns, delivery channels and
//! escalation cadence.
//!
//! Loaded once at startup (TOML or JSON) and compiled into [`CompiledRules`].
//! Shape (TOML):
//!
//! ```toml
//! [high]
//! patterns = ["(funding|series|seed)"]
//! channels = ["chat", "email"]
//! cadence = "immediate"
//! ```
//!
//! The legacy JSON shape (`high_priority` / `keywords` / `escalation`,
//! channel `slack`) is accepted as well.
//!
//! Patterns are regexes, always matched case-insensitively against the whole
//! text. A pattern that does not compile is fatal: the run must not
//! classify with a partial table.

use crate::error::ConfigError;
use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

pub const ENV_ALERT_RULES_PATH: &str = "ALERT_RULES_PATH";

/// Classification outcome. Total order: `High > Medium > Low`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertLevel {
    Low,
    Medium,
    High,
}

impl AlertLevel {
    /// Levels in the order rule sets are checked.
    pub const PRIORITY_ORDER: [AlertLevel; 3] =
        [AlertLevel::High, AlertLevel::Medium, AlertLevel::Low];

    pub fn rank(self) -> u8 {
        match self {
            AlertLevel::High => 3,
            AlertLevel::Medium => 2,
            AlertLevel::Low => 1,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            AlertLevel::High => "high",
            AlertLevel::Medium => "medium",
            AlertLevel::Low => "low",
        }
    }
}

impl Ord for AlertLevel {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.rank().cmp(&other.rank())
    }
}

impl PartialOrd for AlertLevel {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for AlertLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    #[serde(alias = "slack")]
    Chat,
    Email,
    /// Aggregated into the weekly brief only; never an immediate send.
    #[serde(alias = "none")]
    WeeklyBrief,
}

impl Channel {
    pub fn as_str(self) -> &'static str {
        match self {
            Channel::Chat => "chat",
            Channel::Email => "email",
            Channel::WeeklyBrief => "weekly_brief",
        }
    }

    /// Whether routing an alert to this channel means an actual send.
    pub fn is_deliverable(self) -> bool {
        !matches!(self, Channel::WeeklyBrief)
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Cadence {
    Immediate,
    #[serde(alias = "daily_batch")]
    Daily,
    #[serde(alias = "weekly_batch")]
    Weekly,
}

impl Cadence {
    /// How long a deferred batch may wait before it is due.
    pub fn period(self) -> chrono::Duration {
        match self {
            Cadence::Immediate => chrono::Duration::zero(),
            Cadence::Daily => chrono::Duration::days(1),
            Cadence::Weekly => chrono::Duration::days(7),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Cadence::Immediate => "immediate",
            Cadence::Daily => "daily",
            Cadence::Weekly => "weekly",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LevelRule {
    #[serde(alias = "keywords", default)]
    pub patterns: Vec<String>,
    #[serde(default)]
    pub channels: Vec<Channel>,
    #[serde(alias = "escalation")]
    pub cadence: Cadence,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlertRules {
    #[serde(alias = "high_priority")]
    pub high: LevelRule,
    #[serde(alias = "medium_priority")]
    pub medium: LevelRule,
    #[serde(alias = "low_priority")]
    pub low: LevelRule,
}

impl Default for AlertRules {
    fn default() -> Self {
        let strings = |v: &[&str]| v.iter().map(|s| s.to_string()).collect::<Vec<_>>();
        Self {
            high: LevelRule {
                patterns: strings(&[
                    r"(funding|series|seed|pre-seed|acqui-hire|acquired)",
                    r"(launch|token|NFT|web3|blockchain)",
                    r"(C-level|VP|Vice President|Chief|Head of)",
                ]),
                channels: vec![Channel::Chat, Channel::Email],
                cadence: Cadence::Immediate,
            },
            medium: LevelRule {
                patterns: strings(&[
                    r"(hiring|job|career|recruitment)",
                    r"(partnership|collaboration|tie-up)",
                    r"(expansion|market|geography)",
                ]),
                channels: vec![Channel::Chat],
                cadence: Cadence::Immediate,
            },
            low: LevelRule {
                patterns: strings(&[
                    r"(update|improvement|enhancement)",
                    r"(blog|article|press release)",
                ]),
                channels: vec![Channel::WeeklyBrief],
                cadence: Cadence::Weekly,
            },
        }
    }
}

impl AlertRules {
    pub fn for_level(&self, level: AlertLevel) -> &LevelRule {
        match level {
            AlertLevel::High => &self.high,
            AlertLevel::Medium => &self.medium,
            AlertLevel::Low => &self.low,
        }
    }

    /// Compile every pattern. Any invalid or empty pattern fails the whole table.
    pub fn compile(&self) -> Result<CompiledRules, ConfigError> {
        let mut levels = Vec::with_capacity(3);
        for level in AlertLevel::PRIORITY_ORDER {
            let rule = self.for_level(level);
            let mut patterns = Vec::with_capacity(rule.patterns.len());
            for p in &rule.patterns {
                if p.trim().is_empty() {
                    return Err(ConfigError::Invalid(format!(
                        "empty pattern in level {level}"
                    )));
                }
                let re = RegexBuilder::new(p)
                    .case_insensitive(true)
                    .build()
                    .map_err(|source| ConfigError::InvalidPattern {
                        level: level.as_str(),
                        pattern: p.clone(),
                        source,
                    })?;
                patterns.push(re);
            }
            levels.push(CompiledLevel { level, patterns });
        }
        Ok(CompiledRules {
            levels,
            source: self.clone(),
        })
    }
}

#[derive(Debug, Clone)]
pub(crate) struct CompiledLevel {
    pub(crate) level: AlertLevel,
    pub(crate) patterns: Vec<Regex>,
}

/// Compiled rule table, levels kept in check order (high → medium → low).
#[derive(Debug, Clone)]
pub struct CompiledRules {
    pub(crate) levels: Vec<CompiledLevel>,
    source: AlertRules,
}

impl CompiledRules {
    pub fn rules(&self) -> &AlertRules {
        &self.source
    }

    pub fn channels_for(&self, level: AlertLevel) -> &[Channel] {
        &self.source.for_level(level).channels
    }

    pub fn cadence_for(&self, level: AlertLevel) -> Cadence {
        self.source.for_level(level).cadence
    }

    pub fn pattern_count(&self, level: AlertLevel) -> usize {
        self.levels
            .iter()
            .find(|l| l.level == level)
            .map(|l| l.patterns.len())
            .unwrap_or(0)
    }
}

/// Load rules from an explicit path. Supports TOML or JSON formats.
pub fn load_rules_from(path: &Path) -> Result<AlertRules, ConfigError> {
    let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.display().to_string(),
        source,
    })?;
    let ext = path
        .extension()
        .and_then(|s| s.to_str())
        .unwrap_or_default()
        .to_ascii_lowercase();
    match ext.as_str() {
        "toml" => Ok(toml::from_str(&content)?),
        "json" => Ok(serde_json::from_str(&content)?),
        other => Err(ConfigError::UnsupportedFormat(other.to_string())),
    }
}

/// Load rules using env var + fallbacks:
/// 1) $ALERT_RULES_PATH
/// 2) config/alert_rules.toml
/// 3) config/alert_rules.json
/// 4) built-in defaults
pub fn load_rules_default() -> Result<AlertRules, ConfigError> {
    if let Ok(p) = std::env::var(ENV_ALERT_RULES_PATH) {
        let pb = PathBuf::from(p);
        if pb.exists() {
            return load_rules_from(&pb);
        }
        return Err(ConfigError::MissingPath(ENV_ALERT_RULES_PATH));
    }
    for candidate in ["config/alert_rules.toml", "config/alert_rules.json"] {
        let p = PathBuf::from(candidate);
        if p.exists() {
            return load_rules_from(&p);
        }
    }
    Ok(AlertRules::default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;

    #[test]
    fn level_order_is_total() {
        assert!(AlertLevel::High > AlertLevel::Medium);
        assert!(AlertLevel::Medium > AlertLevel::Low);
        let mut v = vec![AlertLevel::Low, AlertLevel::High, AlertLevel::Medium];
        v.sort();
        assert_eq!(v, vec![AlertLevel::Low, AlertLevel::Medium, AlertLevel::High]);
    }

    #[test]
    fn defaults_compile() {
        let compiled = AlertRules::default().compile().unwrap();
        assert_eq!(compiled.pattern_count(AlertLevel::High), 3);
        assert_eq!(
            compiled.channels_for(AlertLevel::High),
            &[Channel::Chat, Channel::Email]
        );
        assert_eq!(compiled.cadence_for(AlertLevel::Low), Cadence::Weekly);
    }

    #[test]
    fn legacy_json_shape_is_accepted() {
        let json = r#"{
            "high_priority": {"keywords": ["(?i)(funding)"], "channels": ["slack", "email"], "escalation": "immediate"},
            "medium_priority": {"keywords": ["(?i)(hiring)"], "channels": ["slack"], "escalation": "daily"},
            "low_priority": {"keywords": ["(?i)(update)"], "channels": ["weekly_brief"], "escalation": "weekly"}
        }"#;
        let rules: AlertRules = serde_json::from_str(json).unwrap();
        assert_eq!(rules.high.channels, vec![Channel::Chat, Channel::Email]);
        assert_eq!(rules.medium.cadence, Cadence::Daily);
        assert!(rules.compile().is_ok());
    }

    #[test]
    fn invalid_pattern_is_fatal() {
        let mut rules = AlertRules::default();
        rules.medium.patterns.push("(unclosed".into());
        match rules.compile() {
            Err(ConfigError::InvalidPattern { level, pattern, .. }) => {
                assert_eq!(level, "medium");
                assert_eq!(pattern, "(unclosed");
            }
            other => panic!("expected InvalidPattern, got {other:?}"),
        }
    }

    #[test]
    fn empty_pattern_is_rejected() {
        let mut rules = AlertRules::default();
        rules.low.patterns = vec!["  ".into()];
        assert!(matches!(rules.compile(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn missing_level_fails_to_parse() {
        let toml = r#"
[high]
patterns = ["funding"]
channels = ["chat"]
cadence = "immediate"
"#;
        assert!(toml::from_str::<AlertRules>(toml).is_err());
    }

    #[serial_test::serial]
    #[test]
    fn default_uses_env_then_fallbacks() {
        let old = env::current_dir().unwrap();
        let tmp = tempfile::tempdir().unwrap();
        env::set_current_dir(tmp.path()).unwrap();
        env::remove_var(ENV_ALERT_RULES_PATH);

        assert_eq!(load_rules_default().unwrap(), AlertRules::default());

        let cfg_dir = tmp.path().join("config");
        fs::create_dir_all(&cfg_dir).unwrap();
        fs::write(
            cfg_dir.join("alert_rules.toml"),
            r#"
[high]
patterns = ["ipo"]
channels = ["chat", "email"]
cadence = "immediate"

[medium]
patterns = ["hiring"]
channels = ["chat"]
cadence = "daily"

[low]
patterns = []
cadence = "weekly"
"#,
        )
        .unwrap();
        let from_toml = load_rules_default().unwrap();
        assert_eq!(from_toml.high.patterns, vec!["ipo".to_string()]);
        assert!(from_toml.low.channels.is_empty());

        let p_env = tmp.path().join("override.json");
        fs::write(
            &p_env,
            serde_json::to_string(&AlertRules::default()).unwrap(),
        )
        .unwrap();
        env::set_var(ENV_ALERT_RULES_PATH, p_env.display().to_string());
        assert_eq!(load_rules_default().unwrap(), AlertRules::default());
        env::remove_var(ENV_ALERT_RULES_PATH);

        env::set_current_dir(&old).unwrap();
    }
}
