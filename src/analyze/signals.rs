//! Lightweight text signals archived next to each item: sentiment heuristic,
//! hashtags, mentions and job-posting attributes.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::ingest::types::RawItem;

static RE_HASHTAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"#\w+").expect("hashtag regex"));
static RE_MENTION: Lazy<Regex> = Lazy::new(|| Regex::new(r"@\w+").expect("mention regex"));

const POSITIVE_WORDS: [&str; 6] = ["launch", "success", "growth", "partnership", "innovation", "win"];
const NEGATIVE_WORDS: [&str; 6] = ["down", "loss", "failure", "problem", "issue", "challenge"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sentiment {
    Positive,
    Negative,
    #[default]
    Neutral,
}

impl Sentiment {
    pub fn as_str(self) -> &'static str {
        match self {
            Sentiment::Positive => "positive",
            Sentiment::Negative => "negative",
            Sentiment::Neutral => "neutral",
        }
    }
}

/// Substring count of positive vs negative marker words.
pub fn sentiment(text: &str) -> Sentiment {
    let lower = text.to_lowercase();
    let pos = POSITIVE_WORDS.iter().filter(|w| lower.contains(*w)).count();
    let neg = NEGATIVE_WORDS.iter().filter(|w| lower.contains(*w)).count();
    match pos.cmp(&neg) {
        std::cmp::Ordering::Greater => Sentiment::Positive,
        std::cmp::Ordering::Less => Sentiment::Negative,
        std::cmp::Ordering::Equal => Sentiment::Neutral,
    }
}

pub fn hashtags(text: &str) -> Vec<String> {
    RE_HASHTAG.find_iter(text).map(|m| m.as_str().to_string()).collect()
}

pub fn mentions(text: &str) -> Vec<String> {
    RE_MENTION.find_iter(text).map(|m| m.as_str().to_string()).collect()
}

// Checked in order; first department with a matching marker wins.
const DEPARTMENTS: [(&str, &[&str]); 8] = [
    ("engineering", &["engineer", "developer", "programmer", "tech"]),
    ("marketing", &["marketing", "growth", "brand", "pr"]),
    ("sales", &["sales", "business development", "bd"]),
    ("product", &["product", "pm", "product manager"]),
    ("design", &["design", "ux", "ui", "creative"]),
    ("operations", &["operations", "ops", "strategy"]),
    ("finance", &["finance", "accounting", "cfo"]),
    ("hr", &["hr", "recruitment", "talent", "people"]),
];

pub fn department(role: &str) -> &'static str {
    let lower = role.to_lowercase();
    DEPARTMENTS
        .iter()
        .find(|(_, markers)| markers.iter().any(|m| lower.contains(m)))
        .map(|(dept, _)| *dept)
        .unwrap_or("other")
}

pub fn seniority(role: &str) -> &'static str {
    let lower = role.to_lowercase();
    let any = |words: &[&str]| words.iter().any(|w| lower.contains(w));
    if any(&["intern", "internship"]) {
        "intern"
    } else if any(&["junior", "entry", "associate"]) {
        "junior"
    } else if any(&["senior", "lead", "principal"]) {
        "senior"
    } else if any(&["manager", "director", "head"]) {
        "manager"
    } else if any(&["vp", "vice president", "chief", "c-level"]) {
        "executive"
    } else {
        "mid"
    }
}

pub fn is_remote(location: &str) -> bool {
    let lower = location.to_lowercase();
    ["remote", "work from home", "wfh"]
        .iter()
        .any(|w| lower.contains(w))
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct JobSignals {
    pub department: String,
    pub seniority: String,
    pub remote: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Signals {
    pub sentiment: Sentiment,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub hashtags: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub mentions: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job: Option<JobSignals>,
}

impl Signals {
    /// Signals are read from the raw fields: cleaning drops `#` and `@`.
    pub fn from_raw(item: &RawItem) -> Self {
        let text = item.combined_text();
        let mut out = Signals {
            sentiment: sentiment(&text),
            ..Default::default()
        };
        match item {
            RawItem::Tweet { text, .. } | RawItem::LinkedinPost { text, .. } => {
                out.hashtags = hashtags(text);
                out.mentions = mentions(text);
            }
            RawItem::JobPosting { role, location, .. } => {
                out.job = Some(JobSignals {
                    department: department(role).to_string(),
                    seniority: seniority(role).to_string(),
                    remote: location.as_deref().map(is_remote).unwrap_or(false),
                });
            }
            RawItem::Blog { .. } => {}
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sentiment_counts_marker_words() {
        assert_eq!(sentiment("Record growth after the launch"), Sentiment::Positive);
        assert_eq!(sentiment("Servers down, payment issue"), Sentiment::Negative);
        assert_eq!(sentiment("Growth slowed, one problem"), Sentiment::Neutral);
        assert_eq!(sentiment(""), Sentiment::Neutral);
    }

    #[test]
    fn tweet_tags_and_mentions() {
        let item = RawItem::Tweet {
            company: "Zupee".into(),
            tweet_id: None,
            text: "Big weekend for #Ludo fans with @ZupeeOfficial #Tournament".into(),
            url: None,
            created_at: None,
        };
        let s = Signals::from_raw(&item);
        assert_eq!(s.hashtags, vec!["#Ludo", "#Tournament"]);
        assert_eq!(s.mentions, vec!["@ZupeeOfficial"]);
        assert!(s.job.is_none());
    }

    #[test]
    fn job_attributes() {
        assert_eq!(department("Senior Backend Engineer"), "engineering");
        assert_eq!(department("Brand Manager"), "marketing");
        assert_eq!(department("Chief of Staff"), "other");
        assert_eq!(seniority("Marketing Intern"), "intern");
        assert_eq!(seniority("Head of Growth"), "manager");
        assert_eq!(seniority("VP Engineering"), "executive");
        assert_eq!(seniority("Data Analyst"), "mid");
        assert!(is_remote("Remote, India"));
        assert!(!is_remote("Bengaluru"));
    }
}
