use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::ingest::types::{RawItem, SourceProvider};

/// Job boards answer either with a bare array or with `{ "jobs": [...] }`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Listing {
    Wrapped { jobs: Vec<Job> },
    Bare(Vec<Job>),
}

#[derive(Debug, Deserialize)]
struct Job {
    #[serde(alias = "role", alias = "name", default)]
    title: String,
    #[serde(default)]
    location: Option<LocationField>,
    #[serde(alias = "absolute_url", alias = "hostedUrl", default)]
    url: Option<String>,
    #[serde(alias = "updated_at", alias = "created_at", default)]
    posted_at: Option<String>,
}

/// Some boards nest the location (`{"name": "Bengaluru"}`).
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum LocationField {
    Plain(String),
    Named { name: String },
}

impl LocationField {
    fn into_string(self) -> String {
        match self {
            LocationField::Plain(s) | LocationField::Named { name: s } => s,
        }
    }
}

pub struct JobsJsonProvider {
    company: String,
    mode: Mode,
}

enum Mode {
    Fixture(String),
    Http { url: String, client: reqwest::Client },
}

impl JobsJsonProvider {
    pub fn from_fixture(company: &str, json: &str) -> Self {
        Self {
            company: company.to_string(),
            mode: Mode::Fixture(json.to_string()),
        }
    }

    pub fn from_url(company: &str, url: &str, client: reqwest::Client) -> Self {
        Self {
            company: company.to_string(),
            mode: Mode::Http {
                url: url.to_string(),
                client,
            },
        }
    }

    fn parse(&self, body: &str) -> Result<Vec<RawItem>> {
        let listing: Listing = serde_json::from_str(body).context("parsing jobs json")?;
        let jobs = match listing {
            Listing::Wrapped { jobs } | Listing::Bare(jobs) => jobs,
        };
        Ok(jobs
            .into_iter()
            .filter(|j| !j.title.trim().is_empty())
            .map(|j| RawItem::JobPosting {
                company: self.company.clone(),
                role: j.title,
                location: j.location.map(LocationField::into_string),
                url: j.url,
                posted_at: j
                    .posted_at
                    .as_deref()
                    .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
                    .map(|d| d.with_timezone(&Utc)),
            })
            .collect())
    }
}

#[async_trait]
impl SourceProvider for JobsJsonProvider {
    async fn fetch_latest(&self) -> Result<Vec<RawItem>> {
        match &self.mode {
            Mode::Fixture(s) => self.parse(s),
            Mode::Http { url, client } => {
                let body = client
                    .get(url)
                    .send()
                    .await
                    .with_context(|| format!("jobs get {url}"))?
                    .error_for_status()
                    .with_context(|| format!("jobs non-2xx {url}"))?
                    .text()
                    .await
                    .context("jobs .text()")?;
                self.parse(&body)
            }
        }
    }

    fn name(&self) -> &str {
        "jobs_json"
    }
}
