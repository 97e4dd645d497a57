// tests/pipeline_batch.rs
//
// Batch processing end to end (no I/O): normalize, dedup, classify, sort.

use std::sync::Arc;

use chrono::{DateTime, Duration, TimeZone, Utc};

use rival_watch::dedup::MemoryStore;
use rival_watch::{AlertClassifier, AlertLevel, AlertRules, Deduplicator, Pipeline, RawItem, SourceType};

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 8, 4, 9, 0, 0).unwrap()
}

fn pipeline() -> Pipeline {
    let rules = AlertRules::default().compile().expect("default rules compile");
    Pipeline::new(
        AlertClassifier::new(Arc::new(rules)),
        Deduplicator::new(Arc::new(MemoryStore::new()), Duration::days(7)),
    )
}

fn tweet(company: &str, text: &str) -> RawItem {
    RawItem::Tweet {
        company: company.into(),
        tweet_id: None,
        text: text.into(),
        url: Some(format!("https://x.com/{company}/status/1")),
        created_at: None,
    }
}

fn blog(company: &str, title: &str) -> RawItem {
    RawItem::Blog {
        company: company.into(),
        title: title.into(),
        content: String::new(),
        url: None,
        published_at: None,
    }
}

fn job(company: &str, role: &str) -> RawItem {
    RawItem::JobPosting {
        company: company.into(),
        role: role.into(),
        location: Some("Bangalore".into()),
        url: None,
        posted_at: None,
    }
}

#[test]
fn mixed_batch_is_counted_and_priority_sorted() {
    let p = pipeline();
    let batch = vec![
        job("MPL", "Hiring: Senior Engineer"),
        blog("Zupee", "Minor UI polish update"),
        tweet("WinZO", "WinZO raises Series B funding of $50M"),
        tweet("WinZO", "WinZO   raises Series B funding of $50M"),
    ];

    let out = p.process_batch(batch, t0());
    assert_eq!(out.total, 4);
    assert_eq!(out.duplicates, 1, "whitespace-only difference is a duplicate");
    assert_eq!(out.low_count, 1);
    assert_eq!(out.processed.len(), 3);

    let levels: Vec<_> = out.alerts.iter().map(|a| a.level).collect();
    assert_eq!(levels, vec![AlertLevel::High, AlertLevel::Medium]);
    assert_eq!(out.alerts[0].company, "WinZO");
    assert_eq!(out.alerts[0].keywords, vec!["series", "funding"]);
    assert_eq!(out.alerts[0].source_type, SourceType::Tweet);
    assert_eq!(out.alerts[1].keywords, vec!["hiring"]);
    assert_eq!(out.count_level(AlertLevel::High), 1);
}

#[test]
fn same_text_on_another_source_type_is_not_a_duplicate() {
    let p = pipeline();
    let out = p.process_batch(
        vec![tweet("MPL", "MPL partnership announced"), blog("MPL", "MPL partnership announced")],
        t0(),
    );
    assert_eq!(out.duplicates, 0);
    assert_eq!(out.alerts.len(), 2);
}

#[test]
fn second_run_skips_seen_items_until_retention_expires() {
    let p = pipeline();
    let batch = || vec![tweet("WinZO", "WinZO acquired a studio")];

    assert_eq!(p.process_batch(batch(), t0()).alerts.len(), 1);

    let again = p.process_batch(batch(), t0() + Duration::hours(2));
    assert_eq!(again.duplicates, 1);
    assert!(again.alerts.is_empty());

    let later = p.process_batch(batch(), t0() + Duration::days(7));
    assert_eq!(later.duplicates, 0);
    assert_eq!(later.alerts.len(), 1);
}

#[test]
fn empty_texts_are_never_duplicates() {
    let p = pipeline();
    let out = p.process_batch(vec![tweet("MPL", "  "), tweet("MPL", "")], t0());
    assert_eq!(out.duplicates, 0);
    assert_eq!(out.low_count, 2);
    assert!(out.alerts.is_empty());
    assert!(out.processed.iter().all(|p| p.item.fingerprint.is_empty()));
}

#[test]
fn missing_company_and_timestamp_get_defaults() {
    let p = pipeline();
    let out = p.process_batch(vec![tweet("", "New VP of Growth joins")], t0());
    let a = &out.alerts[0];
    assert_eq!(a.company, "Unknown");
    assert_eq!(a.level, AlertLevel::High);
    assert_eq!(out.processed[0].item.timestamp, t0());
}

#[test]
fn long_text_is_truncated_on_the_alert_only() {
    let p = pipeline();
    let long = format!("Series A funding {}", "x".repeat(400));
    let out = p.process_batch(vec![tweet("A23", &long)], t0());
    assert_eq!(out.alerts[0].text.chars().count(), 203);
    assert!(out.alerts[0].text.ends_with("..."));
    assert!(out.processed[0].item.text.len() > 400);
}

#[test]
fn empty_batch_is_a_noop() {
    let out = pipeline().process_batch(Vec::new(), t0());
    assert!(out.is_empty());
    assert!(out.alerts.is_empty());
}
