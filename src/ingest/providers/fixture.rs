use anyhow::{Context, Result};
use async_trait::async_trait;
use std::path::PathBuf;

use crate::ingest::types::{RawItem, SourceProvider};

/// Reads a JSON array of tagged raw items from disk on every fetch.
/// Used for offline runs and for social feeds that arrive as exports.
pub struct FixtureProvider {
    path: PathBuf,
}

impl FixtureProvider {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl SourceProvider for FixtureProvider {
    async fn fetch_latest(&self) -> Result<Vec<RawItem>> {
        let s = tokio::fs::read_to_string(&self.path)
            .await
            .with_context(|| format!("reading fixture {}", self.path.display()))?;
        let items: Vec<RawItem> = serde_json::from_str(&s)
            .with_context(|| format!("parsing fixture {}", self.path.display()))?;
        Ok(items)
    }

    fn name(&self) -> &str {
        "fixture"
    }
}
