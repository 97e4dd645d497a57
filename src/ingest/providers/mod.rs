// src/ingest/providers/mod.rs
pub mod blog_rss;
pub mod fixture;
pub mod jobs_json;

use crate::ingest::config::Competitor;
use crate::ingest::types::SourceProvider;

/// Build network providers for every competitor endpoint that is configured.
/// Social feeds need vendor API tokens and are fed through fixtures instead.
pub fn providers_for(competitors: &[Competitor]) -> Vec<Box<dyn SourceProvider>> {
    let client = reqwest::Client::new();
    let mut out: Vec<Box<dyn SourceProvider>> = Vec::new();
    for c in competitors {
        if let Some(url) = &c.blog_feed_url {
            out.push(Box::new(blog_rss::BlogRssProvider::from_url(
                &c.name,
                url,
                client.clone(),
            )));
        }
        if let Some(url) = &c.jobs_json_url {
            out.push(Box::new(jobs_json::JobsJsonProvider::from_url(
                &c.name,
                url,
                client.clone(),
            )));
        }
    }
    out
}
