// tests/runner_e2e.rs
//
// Whole run modes against a JSON fixture, an in-memory dedup store, a
// temp archive directory and recording notifiers. No network.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, TimeZone, Utc};

use rival_watch::archive::{AlertSink, JsonlArchive};
use rival_watch::brief::writer::{DisabledWriter, DynBriefWriter, MockWriter};
use rival_watch::config::AppConfig;
use rival_watch::dedup::MemoryStore;
use rival_watch::ingest::providers::fixture::FixtureProvider;
use rival_watch::ingest::types::SourceProvider;
use rival_watch::notify::email::SmtpSettings;
use rival_watch::notify::{Notifier, RenderedMessage};
use rival_watch::scheduler::weekly_tick;
use rival_watch::{AlertClassifier, AlertRouter, AlertRules, App, Channel, Deduplicator, Pipeline};

const FIXTURE: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/tests/fixtures/sample_items.json");

struct Recorder {
    channel: Channel,
    titles: Mutex<Vec<String>>,
}

#[async_trait]
impl Notifier for Recorder {
    fn channel(&self) -> Channel {
        self.channel
    }

    async fn send(&self, msg: &RenderedMessage) -> anyhow::Result<()> {
        self.titles.lock().unwrap().push(msg.title.clone());
        Ok(())
    }
}

fn recorder(channel: Channel) -> Arc<Recorder> {
    Arc::new(Recorder {
        channel,
        titles: Mutex::new(Vec::new()),
    })
}

fn config(root: &Path) -> AppConfig {
    AppConfig {
        slack_webhook_url: None,
        smtp: SmtpSettings::default(),
        llm: None,
        dedup_store_path: root.join("dedup.json"),
        dedup_retention_days: 7,
        data_dir: root.join("data"),
        briefs_dir: root.join("briefs"),
        http_bind: "127.0.0.1:0".parse().unwrap(),
    }
}

struct Harness {
    app: App,
    chat: Arc<Recorder>,
    email: Arc<Recorder>,
    archive: Arc<JsonlArchive>,
    briefs: PathBuf,
    _dir: tempfile::TempDir,
}

fn harness(fixture: &str, writer: DynBriefWriter) -> Harness {
    let dir = tempfile::tempdir().expect("tempdir");
    let cfg = config(dir.path());
    let rules = Arc::new(AlertRules::default().compile().expect("rules compile"));

    let pipeline = Pipeline::new(
        AlertClassifier::new(rules.clone()),
        Deduplicator::new(Arc::new(MemoryStore::new()), cfg.retention()),
    );
    let chat = recorder(Channel::Chat);
    let email = recorder(Channel::Email);
    let router = AlertRouter::new(rules)
        .with_notifier(chat.clone())
        .with_notifier(email.clone());
    let archive = Arc::new(JsonlArchive::open(&cfg.data_dir).expect("archive"));
    let providers: Vec<Box<dyn SourceProvider>> = vec![Box::new(FixtureProvider::new(fixture))];
    let briefs = cfg.briefs_dir.clone();

    let app = App::new(cfg, pipeline, router, archive.clone(), writer, providers);
    Harness {
        app,
        chat,
        email,
        archive,
        briefs,
        _dir: dir,
    }
}

fn monday() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 8, 4, 9, 0, 0).unwrap()
}

fn sunday() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 8, 3, 20, 0, 0).unwrap()
}

#[tokio::test]
async fn alerts_run_routes_archives_and_dedups() {
    let h = harness(FIXTURE, Arc::new(DisabledWriter));

    let r = h.app.run_alerts(monday()).await.expect("alerts run");
    assert_eq!(r.fetched, 5);
    assert_eq!(r.duplicates, 1);
    assert_eq!(r.alerts, 3, "WinZO funding, A23 chief, MPL hiring");
    assert_eq!(r.low, 1);
    assert_eq!(r.archived_items, 4);
    assert_eq!(r.archived_alerts, 3);
    assert!(r.brief.is_none());

    // high alerts first: two highs on both channels, then medium on chat
    let chat = h.chat.titles.lock().unwrap().clone();
    assert_eq!(
        chat,
        vec![
            "WinZO - HIGH Priority Alert",
            "A23 - HIGH Priority Alert",
            "MPL - MEDIUM Priority Alert",
        ]
    );
    assert_eq!(h.email.titles.lock().unwrap().len(), 2);

    let again = h.app.run_alerts(monday()).await.expect("second run");
    assert_eq!(again.duplicates, 5);
    assert_eq!(again.alerts, 0);
    assert_eq!(again.archived_items, 0);
    assert_eq!(h.archive.load_alerts().unwrap().len(), 3);
}

#[tokio::test]
async fn missing_fixture_is_an_empty_run() {
    let h = harness("/nonexistent/items.json", Arc::new(DisabledWriter));
    let r = h.app.run_alerts(monday()).await.expect("run survives provider error");
    assert_eq!(r.fetched, 0);
    assert_eq!(r.alerts, 0);
    assert!(h.chat.titles.lock().unwrap().is_empty());
}

#[tokio::test]
async fn full_run_on_sunday_writes_the_brief_once() {
    let h = harness(FIXTURE, Arc::new(MockWriter::default()));

    let r = h.app.run_full(sunday()).await.expect("full run");
    let path = r.brief.expect("brief on sunday");
    assert_eq!(path, h.briefs.join("brief_2025-W31.json"));

    let saved: serde_json::Value =
        serde_json::from_slice(&std::fs::read(&path).unwrap()).expect("brief json");
    assert_eq!(saved["week"], "2025-W31");
    assert_eq!(saved["narrative_source"], "mock");
    assert_eq!(saved["overview"]["companies_active"], 4);
    assert_eq!(saved["company_summaries"]["A23"]["key_insights"][0], "Mock insight (mock)");
    assert!(h.briefs.join("brief_2025-W31.md").exists());

    let chat = h.chat.titles.lock().unwrap().clone();
    assert_eq!(chat.len(), 4, "three alerts plus the brief");

    let later = h.app.run_full(sunday()).await.expect("second full run");
    assert!(later.brief.is_none());
}

#[tokio::test]
async fn full_run_on_weekday_skips_the_brief() {
    let h = harness(FIXTURE, Arc::new(DisabledWriter));
    let r = h.app.run_full(monday()).await.expect("full run");
    assert!(r.brief.is_none());
    assert!(!h.briefs.exists());
}

#[tokio::test]
async fn weekly_run_falls_back_without_writer() {
    let h = harness(FIXTURE, Arc::new(DisabledWriter));
    h.app.run_alerts(monday()).await.expect("seed archive");

    let b = h.app.run_weekly(monday()).await.expect("weekly");
    assert_eq!(b.week, "2025-W32");
    assert_eq!(b.narrative_source, "fallback");
    assert_eq!(b.overview.total_activity, 4);
    assert!(!b.themes.is_empty());
    assert_eq!(b.highlights[0].level, rival_watch::AlertLevel::High);
    assert!(h.briefs.join("brief_2025-W32.json").exists());
    assert_eq!(h.archive.load_since(monday() - chrono::Duration::days(7)).unwrap().len(), 4);
}

#[tokio::test]
async fn test_alert_reaches_every_channel() {
    let h = harness(FIXTURE, Arc::new(DisabledWriter));
    let report = h.app.send_test_alert(monday()).await;
    assert_eq!(report.delivered_channels().len(), 2);
    assert_eq!(
        h.email.titles.lock().unwrap().as_slice(),
        ["Test Company - MEDIUM Priority Alert".to_string()]
    );
}

#[tokio::test]
async fn sunday_night_west_of_utc_keeps_the_local_week() {
    let h = harness(FIXTURE, Arc::new(DisabledWriter));
    h.app.run_alerts(sunday()).await.expect("seed archive");

    // 23:56 Sunday at UTC-05:00 is 04:56 Monday UTC, the next ISO week
    let central = FixedOffset::west_opt(5 * 3600).unwrap();
    let local = central.with_ymd_and_hms(2025, 8, 3, 23, 56, 0).unwrap();
    let mut last = None;

    let b = weekly_tick(&h.app, local, &mut last).await.expect("brief is due");
    assert_eq!(b.week, "2025-W31");
    assert_eq!(last.as_deref(), Some("2025-W31"));
    assert!(h.briefs.join("brief_2025-W31.json").exists());
    assert!(h.briefs.join("brief_2025-W31.md").exists());
    assert!(!h.briefs.join("brief_2025-W32.json").exists());

    assert_eq!(
        b.company_summaries["MPL"].who_they_hired[0],
        "Posted 1 new job positions"
    );
    assert!(b.company_summaries["Zupee"].what_they_shipped[0].starts_with("Minor UI polish update"));

    assert!(weekly_tick(&h.app, local, &mut last).await.is_none());
}

#[tokio::test]
async fn fetch_mode_saves_raw_items_only() {
    let h = harness(FIXTURE, Arc::new(DisabledWriter));

    let (count, path) = h.app.run_fetch(monday()).await.expect("fetch");
    assert_eq!(count, 5);
    assert_eq!(
        path,
        h.app.config().data_dir.join("raw_fetch_20250804_090000.json")
    );
    let saved: Vec<serde_json::Value> =
        serde_json::from_slice(&std::fs::read(&path).unwrap()).expect("raw json");
    assert_eq!(saved.len(), 5);
    assert_eq!(saved[1]["company"], "MPL");

    assert!(h.archive.load_alerts().unwrap().is_empty());
    assert!(h.chat.titles.lock().unwrap().is_empty());

    // nothing was marked seen, so the alerts run still sees every item
    let r = h.app.run_alerts(monday()).await.expect("alerts run");
    assert_eq!(r.duplicates, 1);
}
