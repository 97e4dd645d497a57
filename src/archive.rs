// src/archive.rs
//! Storage collaborator: append-only JSON-lines archive of processed items
//! and alerts, insert-or-skip on `(source_type, fingerprint)` within the
//! retention window.

use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};

use crate::alert::Alert;
use crate::analyze::{AlertLevel, Signals};
use crate::dedup::{dedup_key, DEFAULT_RETENTION_DAYS};
use crate::ingest::types::{NormalizedItem, SourceType};

pub const ITEMS_FILE: &str = "items.jsonl";
pub const ALERTS_FILE: &str = "alerts.jsonl";

/// One processed, non-duplicate item with its classification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemRecord {
    pub company: String,
    pub source_type: SourceType,
    pub text: String,
    pub url: Option<String>,
    pub timestamp: DateTime<Utc>,
    pub fingerprint: String,
    pub level: AlertLevel,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub signals: Signals,
    pub recorded_at: DateTime<Utc>,
}

impl ItemRecord {
    pub fn new(
        item: &NormalizedItem,
        level: AlertLevel,
        keywords: Vec<String>,
        signals: Signals,
        recorded_at: DateTime<Utc>,
    ) -> Self {
        Self {
            company: item.company.clone(),
            source_type: item.source_type,
            text: item.text.clone(),
            url: item.url.clone(),
            timestamp: item.timestamp,
            fingerprint: item.fingerprint.clone(),
            level,
            keywords,
            signals,
            recorded_at,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub enum ArchiveRecord<'a> {
    Item(&'a ItemRecord),
    Alert(&'a Alert),
}

impl ArchiveRecord<'_> {
    fn key(&self) -> Option<String> {
        match self {
            ArchiveRecord::Item(r) => archive_key(r.source_type, &r.fingerprint, r.url.as_deref()),
            ArchiveRecord::Alert(a) => archive_key(a.source_type, &a.fingerprint, a.url.as_deref()),
        }
    }

    fn at(&self) -> DateTime<Utc> {
        match self {
            ArchiveRecord::Item(r) => r.recorded_at,
            ArchiveRecord::Alert(a) => a.generated_at,
        }
    }
}

/// Empty-text records fall back to their URL; with neither they are
/// always appended.
fn archive_key(source_type: SourceType, fingerprint: &str, url: Option<&str>) -> Option<String> {
    if !fingerprint.is_empty() {
        return Some(dedup_key(source_type, fingerprint));
    }
    url.filter(|u| !u.trim().is_empty())
        .map(|u| format!("{}:url:{}", source_type.as_str(), u.trim()))
}

pub trait AlertSink: Send + Sync {
    /// `Ok(false)` when a record with the same key was stored within the
    /// retention window.
    fn insert_or_skip(&self, record: ArchiveRecord<'_>) -> Result<bool>;

    /// Item records whose `timestamp` is at or after `cutoff`.
    fn load_since(&self, cutoff: DateTime<Utc>) -> Result<Vec<ItemRecord>>;
}

struct JsonlFile {
    path: PathBuf,
    /// Key -> time it was last written.
    keys: HashMap<String, DateTime<Utc>>,
}

impl JsonlFile {
    fn open<T, F>(path: PathBuf, key_of: F) -> Result<Self>
    where
        T: DeserializeOwned,
        F: Fn(&T) -> Option<(String, DateTime<Utc>)>,
    {
        let mut keys: HashMap<String, DateTime<Utc>> = HashMap::new();
        for rec in read_lines::<T>(&path)? {
            if let Some((k, at)) = key_of(&rec) {
                let e = keys.entry(k).or_insert(at);
                *e = (*e).max(at);
            }
        }
        Ok(Self { path, keys })
    }

    fn append<T: Serialize>(
        &mut self,
        key: Option<String>,
        at: DateTime<Utc>,
        retention: Duration,
        value: &T,
    ) -> Result<bool> {
        if let Some(k) = &key {
            if self.keys.get(k).is_some_and(|seen| at < *seen + retention) {
                return Ok(false);
            }
        }
        let mut f = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .with_context(|| format!("open {}", self.path.display()))?;
        let line = serde_json::to_string(value).context("serialize archive record")?;
        writeln!(f, "{line}").with_context(|| format!("append {}", self.path.display()))?;
        if let Some(k) = key {
            self.keys.insert(k, at);
        }
        Ok(true)
    }
}

/// Unparseable lines are skipped with a warning.
fn read_lines<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    let f = match File::open(path) {
        Ok(f) => f,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e).with_context(|| format!("open {}", path.display())),
    };
    let mut out = Vec::new();
    for (n, line) in BufReader::new(f).lines().enumerate() {
        let line = line.with_context(|| format!("read {}", path.display()))?;
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str(&line) {
            Ok(v) => out.push(v),
            Err(e) => {
                tracing::warn!(error = %e, file = %path.display(), line = n + 1, "skipping bad archive line")
            }
        }
    }
    Ok(out)
}

/// A key is skipped while it was written less than `retention` ago, so an
/// item that re-alerts after the dedup window is archived again.
pub struct JsonlArchive {
    dir: PathBuf,
    retention: Duration,
    items: Mutex<JsonlFile>,
    alerts: Mutex<JsonlFile>,
}

impl JsonlArchive {
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        Self::with_retention(dir, Duration::days(DEFAULT_RETENTION_DAYS))
    }

    pub fn with_retention(dir: impl Into<PathBuf>, retention: Duration) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir).with_context(|| format!("create {}", dir.display()))?;
        let items = JsonlFile::open(dir.join(ITEMS_FILE), |r: &ItemRecord| {
            archive_key(r.source_type, &r.fingerprint, r.url.as_deref()).map(|k| (k, r.recorded_at))
        })?;
        let alerts = JsonlFile::open(dir.join(ALERTS_FILE), |a: &Alert| {
            archive_key(a.source_type, &a.fingerprint, a.url.as_deref()).map(|k| (k, a.generated_at))
        })?;
        Ok(Self {
            dir,
            retention,
            items: Mutex::new(items),
            alerts: Mutex::new(alerts),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn load_alerts(&self) -> Result<Vec<Alert>> {
        read_lines(&self.dir.join(ALERTS_FILE))
    }
}

impl AlertSink for JsonlArchive {
    fn insert_or_skip(&self, record: ArchiveRecord<'_>) -> Result<bool> {
        let (key, at) = (record.key(), record.at());
        match record {
            ArchiveRecord::Item(r) => self
                .items
                .lock()
                .map_err(|_| anyhow::anyhow!("archive lock poisoned"))?
                .append(key, at, self.retention, r),
            ArchiveRecord::Alert(a) => self
                .alerts
                .lock()
                .map_err(|_| anyhow::anyhow!("archive lock poisoned"))?
                .append(key, at, self.retention, a),
        }
    }

    fn load_since(&self, cutoff: DateTime<Utc>) -> Result<Vec<ItemRecord>> {
        let all: Vec<ItemRecord> = read_lines(&self.dir.join(ITEMS_FILE))?;
        Ok(all.into_iter().filter(|r| r.timestamp >= cutoff).collect())
    }
}
