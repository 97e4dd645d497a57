// src/runner.rs
//! Run modes: `full`, `alerts`, `weekly`, `fetch` and the channel self-test.

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, Datelike, Utc, Weekday};
use serde::Serialize;
use tokio::sync::Mutex;

use crate::analyze::{AlertClassifier, AlertRules, CompiledRules};
use crate::archive::{AlertSink, ArchiveRecord, JsonlArchive};
use crate::brief::writer::{build_writer, DynBriefWriter};
use crate::brief::{self, WeeklyBrief};
use crate::config::AppConfig;
use crate::dedup::{Deduplicator, FileStore};
use crate::ingest::config::Competitor;
use crate::ingest::providers::{fixture::FixtureProvider, providers_for};
use crate::ingest::types::SourceProvider;
use crate::ingest::collect_batch;
use crate::notify::{self, EmailNotifier, SlackNotifier};
use crate::pipeline::{BatchOutcome, Pipeline};
use crate::router::{AlertRouter, DeliveryReport, DispatchSummary};

#[derive(Debug, Clone, Default, Serialize)]
pub struct RunReport {
    pub fetched: usize,
    pub duplicates: usize,
    pub alerts: usize,
    pub low: usize,
    pub archived_items: usize,
    pub archived_alerts: usize,
    pub dispatch: DispatchSummary,
    pub brief: Option<PathBuf>,
}

pub struct App {
    config: AppConfig,
    pipeline: Pipeline,
    router: Mutex<AlertRouter>,
    archive: Arc<dyn AlertSink>,
    writer: DynBriefWriter,
    providers: Vec<Box<dyn SourceProvider>>,
}

impl App {
    pub fn new(
        config: AppConfig,
        pipeline: Pipeline,
        router: AlertRouter,
        archive: Arc<dyn AlertSink>,
        writer: DynBriefWriter,
        providers: Vec<Box<dyn SourceProvider>>,
    ) -> Self {
        Self {
            config,
            pipeline,
            router: Mutex::new(router),
            archive,
            writer,
            providers,
        }
    }

    /// Wire every component from configuration.
    ///
    /// Fatal: an unusable rule table, a configured-but-invalid notifier or
    /// LLM client, an archive directory that cannot be created. A dedup
    /// store that cannot be opened only disables dedup.
    pub fn from_config(
        config: AppConfig,
        rules: &AlertRules,
        competitors: &[Competitor],
        fixture: Option<PathBuf>,
    ) -> Result<Self> {
        let compiled: Arc<CompiledRules> = Arc::new(rules.compile()?);

        let dedup = match FileStore::open(&config.dedup_store_path) {
            Ok(store) => Deduplicator::new(Arc::new(store), config.retention()),
            Err(e) => {
                tracing::warn!(
                    target: "dedup",
                    error = %e,
                    path = %config.dedup_store_path.display(),
                    "dedup store unavailable; every item is treated as new"
                );
                Deduplicator::disabled()
            }
        };
        let pipeline = Pipeline::new(AlertClassifier::new(compiled.clone()), dedup);

        let mut router = AlertRouter::new(compiled);
        if let Some(slack) = SlackNotifier::try_from_setting(config.slack_webhook_url.as_deref())
            .context("chat notifier")?
        {
            router.add_notifier(Arc::new(slack));
        }
        if let Some(email) = EmailNotifier::try_from_settings(&config.smtp).context("email notifier")? {
            router.add_notifier(Arc::new(email));
        }

        let archive: Arc<dyn AlertSink> =
            Arc::new(JsonlArchive::with_retention(&config.data_dir, config.retention())?);
        let writer = build_writer(config.llm.as_ref()).context("brief writer")?;

        let providers: Vec<Box<dyn SourceProvider>> = match fixture {
            Some(path) => vec![Box::new(FixtureProvider::new(path))],
            None => providers_for(competitors),
        };

        tracing::info!(
            channels = ?router.configured_channels(),
            providers = providers.len(),
            writer = writer.name(),
            "app wired"
        );

        Ok(Self::new(config, pipeline, router, archive, writer, providers))
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    /// Fetch, process, archive and route.
    pub async fn run_alerts(&self, now: DateTime<Utc>) -> Result<RunReport> {
        let raw = collect_batch(&self.providers).await;
        let fetched = raw.len();
        let outcome = self.pipeline.process_batch(raw, now);
        let (archived_items, archived_alerts) = self.archive_outcome(&outcome, now);
        let dispatch = self.router.lock().await.dispatch(&outcome.alerts, now).await;

        Ok(RunReport {
            fetched,
            duplicates: outcome.duplicates,
            alerts: outcome.alerts.len(),
            low: outcome.low_count,
            archived_items,
            archived_alerts,
            dispatch,
            brief: None,
        })
    }

    /// Alerts run plus the weekly brief on Sundays (once per ISO week).
    pub async fn run_full(&self, now: DateTime<Utc>) -> Result<RunReport> {
        self.run_full_with(now, true).await
    }

    /// `sunday_brief = false` leaves the brief to the scheduler's weekly trigger.
    pub async fn run_full_with(&self, now: DateTime<Utc>, sunday_brief: bool) -> Result<RunReport> {
        let mut report = self.run_alerts(now).await?;
        if sunday_brief && now.weekday() == Weekday::Sun {
            let week = brief::iso_week_label(now);
            if brief::brief_path(&self.config.briefs_dir, &week).exists() {
                tracing::debug!(target: "brief", week = %week, "brief already written");
            } else {
                let (b, path) = self.write_brief(now, week).await?;
                self.send_brief(&b).await;
                report.brief = Some(path);
            }
        }
        Ok(report)
    }

    /// Build the brief from the archive, save it and send it to every channel.
    pub async fn run_weekly(&self, now: DateTime<Utc>) -> Result<WeeklyBrief> {
        self.run_weekly_for(now, brief::iso_week_label(now)).await
    }

    /// Same as [`App::run_weekly`] with the caller's week label, e.g. one
    /// taken from local time.
    pub async fn run_weekly_for(&self, now: DateTime<Utc>, week: String) -> Result<WeeklyBrief> {
        let (b, _) = self.write_brief(now, week).await?;
        self.send_brief(&b).await;
        Ok(b)
    }

    /// Fetch only: dump the raw batch to `DATA_DIR` without classifying,
    /// archiving or alerting. Returns the item count and the file written.
    pub async fn run_fetch(&self, now: DateTime<Utc>) -> Result<(usize, PathBuf)> {
        let raw = collect_batch(&self.providers).await;
        let dir = &self.config.data_dir;
        fs::create_dir_all(dir).with_context(|| format!("create {}", dir.display()))?;
        let path = dir.join(format!("raw_fetch_{}.json", now.format("%Y%m%d_%H%M%S")));
        let json = serde_json::to_vec_pretty(&raw).context("serialize raw batch")?;
        fs::write(&path, json).with_context(|| format!("write {}", path.display()))?;
        tracing::info!(items = raw.len(), path = %path.display(), "raw batch saved");
        Ok((raw.len(), path))
    }

    pub async fn send_test_alert(&self, now: DateTime<Utc>) -> DeliveryReport {
        let alert = notify::test_alert(now);
        let router = self.router.lock().await;
        router.broadcast(&notify::render_alert(&alert)).await
    }

    async fn write_brief(&self, now: DateTime<Utc>, week: String) -> Result<(WeeklyBrief, PathBuf)> {
        let records = self
            .archive
            .load_since(brief::window_start(now))
            .context("load archive for brief")?;
        let b = brief::build_brief(&records, now, week, self.writer.as_ref()).await;
        let path = brief::save_brief(&self.config.briefs_dir, &b)?;
        tracing::info!(
            target: "brief",
            week = %b.week,
            items = records.len(),
            path = %path.display(),
            "weekly brief written"
        );
        Ok((b, path))
    }

    async fn send_brief(&self, b: &WeeklyBrief) {
        let msg = brief::render_brief(b);
        let report = self.router.lock().await.broadcast(&msg).await;
        tracing::info!(
            target: "brief",
            delivered = ?report.delivered_channels(),
            failures = report.failures(),
            "weekly brief sent"
        );
    }

    /// Storage is best-effort: failures are logged and the run goes on.
    fn archive_outcome(&self, outcome: &BatchOutcome, now: DateTime<Utc>) -> (usize, usize) {
        let mut items = 0;
        for p in &outcome.processed {
            let rec = p.to_record(now);
            match self.archive.insert_or_skip(ArchiveRecord::Item(&rec)) {
                Ok(true) => items += 1,
                Ok(false) => {}
                Err(e) => tracing::warn!(error = ?e, "archive item failed"),
            }
        }
        let mut alerts = 0;
        for a in &outcome.alerts {
            match self.archive.insert_or_skip(ArchiveRecord::Alert(a)) {
                Ok(true) => alerts += 1,
                Ok(false) => {}
                Err(e) => tracing::warn!(error = ?e, "archive alert failed"),
            }
        }
        (items, alerts)
    }
}
