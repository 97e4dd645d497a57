// src/ingest/types.rs
use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Company name used when a fetched record arrives without one.
pub const UNKNOWN_COMPANY: &str = "Unknown";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceType {
    Blog,
    Tweet,
    LinkedinPost,
    JobPosting,
}

impl SourceType {
    pub fn as_str(self) -> &'static str {
        match self {
            SourceType::Blog => "blog",
            SourceType::Tweet => "tweet",
            SourceType::LinkedinPost => "linkedin_post",
            SourceType::JobPosting => "job_posting",
        }
    }

    /// Human label for rendered messages ("Blog", "Job posting", ...).
    pub fn label(self) -> &'static str {
        match self {
            SourceType::Blog => "Blog",
            SourceType::Tweet => "Tweet",
            SourceType::LinkedinPost => "LinkedIn post",
            SourceType::JobPosting => "Job posting",
        }
    }
}

impl fmt::Display for SourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One fetched unit of content, tagged by where it came from.
/// Each variant carries only the fields its source actually provides.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "source_type", rename_all = "snake_case")]
pub enum RawItem {
    Blog {
        #[serde(default)]
        company: String,
        #[serde(default)]
        title: String,
        #[serde(default)]
        content: String,
        #[serde(default)]
        url: Option<String>,
        #[serde(default)]
        published_at: Option<DateTime<Utc>>,
    },
    Tweet {
        #[serde(default)]
        company: String,
        #[serde(default)]
        tweet_id: Option<String>,
        #[serde(default)]
        text: String,
        #[serde(default)]
        url: Option<String>,
        #[serde(default)]
        created_at: Option<DateTime<Utc>>,
    },
    LinkedinPost {
        #[serde(default)]
        company: String,
        #[serde(default)]
        post_id: Option<String>,
        #[serde(default)]
        text: String,
        #[serde(default)]
        url: Option<String>,
        #[serde(default)]
        created_at: Option<DateTime<Utc>>,
    },
    JobPosting {
        #[serde(default)]
        company: String,
        #[serde(default)]
        role: String,
        #[serde(default)]
        location: Option<String>,
        #[serde(default)]
        url: Option<String>,
        #[serde(default)]
        posted_at: Option<DateTime<Utc>>,
    },
}

impl RawItem {
    pub fn source_type(&self) -> SourceType {
        match self {
            RawItem::Blog { .. } => SourceType::Blog,
            RawItem::Tweet { .. } => SourceType::Tweet,
            RawItem::LinkedinPost { .. } => SourceType::LinkedinPost,
            RawItem::JobPosting { .. } => SourceType::JobPosting,
        }
    }

    pub fn company(&self) -> &str {
        match self {
            RawItem::Blog { company, .. }
            | RawItem::Tweet { company, .. }
            | RawItem::LinkedinPost { company, .. }
            | RawItem::JobPosting { company, .. } => company,
        }
    }

    pub fn url(&self) -> Option<&str> {
        match self {
            RawItem::Blog { url, .. }
            | RawItem::Tweet { url, .. }
            | RawItem::LinkedinPost { url, .. }
            | RawItem::JobPosting { url, .. } => url.as_deref(),
        }
    }

    pub fn timestamp(&self) -> Option<DateTime<Utc>> {
        match self {
            RawItem::Blog { published_at, .. } => *published_at,
            RawItem::Tweet { created_at, .. } | RawItem::LinkedinPost { created_at, .. } => {
                *created_at
            }
            RawItem::JobPosting { posted_at, .. } => *posted_at,
        }
    }

    /// All textual fields relevant to the source type, joined into one string.
    pub fn combined_text(&self) -> String {
        match self {
            RawItem::Blog { title, content, .. } => format!("{title} {content}"),
            RawItem::Tweet { text, .. } | RawItem::LinkedinPost { text, .. } => text.clone(),
            RawItem::JobPosting { role, .. } => role.clone(),
        }
    }
}

/// Uniform, immutable view of a fetched item plus its dedup fingerprint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizedItem {
    pub company: String,
    pub source_type: SourceType,
    pub text: String,
    pub url: Option<String>,
    pub timestamp: DateTime<Utc>,
    /// 40 hex chars (160 bits), or empty when `text` is empty.
    pub fingerprint: String,
}

#[async_trait::async_trait]
pub trait SourceProvider: Send + Sync {
    async fn fetch_latest(&self) -> Result<Vec<RawItem>>;
    fn name(&self) -> &str;
}
