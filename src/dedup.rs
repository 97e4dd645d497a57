// src/dedup.rs
//! Best-effort deduplication by exact fingerprint.
//!
//! Keys are `"{source_type}:{fingerprint}"`. A key lives for the retention
//! window and is then treated as unseen again. Keys are created, never
//! updated. Any store failure degrades to "not a duplicate".

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Duration, Utc};
use metrics::counter;
use serde::{Deserialize, Serialize};

use crate::error::StoreError;
use crate::ingest::types::SourceType;

pub const DEFAULT_RETENTION_DAYS: i64 = 7;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DedupEntry {
    pub first_seen_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl DedupEntry {
    pub fn is_live(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at
    }
}

/// Backing key-value store with per-key TTL semantics.
pub trait DedupStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<DedupEntry>, StoreError>;

    /// Insert unless a live entry exists at `now`. Returns whether it inserted.
    fn insert_if_absent(
        &self,
        key: &str,
        entry: DedupEntry,
        now: DateTime<Utc>,
    ) -> Result<bool, StoreError>;

    /// Drop entries expired at `now`; returns how many were removed.
    fn purge_expired(&self, now: DateTime<Utc>) -> Result<usize, StoreError>;
}

pub fn dedup_key(source_type: SourceType, fingerprint: &str) -> String {
    format!("{}:{}", source_type.as_str(), fingerprint)
}

fn lock_err<T>(_: std::sync::PoisonError<T>) -> StoreError {
    StoreError::Unavailable("store lock poisoned".into())
}

/// Process-local store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, DedupEntry>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|m| m.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl DedupStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<DedupEntry>, StoreError> {
        Ok(self.entries.lock().map_err(lock_err)?.get(key).copied())
    }

    fn insert_if_absent(
        &self,
        key: &str,
        entry: DedupEntry,
        now: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        let mut map = self.entries.lock().map_err(lock_err)?;
        if map.get(key).is_some_and(|e| e.is_live(now)) {
            return Ok(false);
        }
        map.insert(key.to_string(), entry);
        Ok(true)
    }

    fn purge_expired(&self, now: DateTime<Utc>) -> Result<usize, StoreError> {
        let mut map = self.entries.lock().map_err(lock_err)?;
        let before = map.len();
        map.retain(|_, e| e.is_live(now));
        Ok(before - map.len())
    }
}

/// JSON state file, rewritten on every insert. Survives restarts between
/// scheduled runs.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    entries: Mutex<HashMap<String, DedupEntry>>,
}

impl FileStore {
    /// A missing file is an empty store; an unreadable one is an error.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let entries = match fs::read_to_string(&path) {
            Ok(s) if s.trim().is_empty() => HashMap::new(),
            Ok(s) => serde_json::from_str(&s)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => HashMap::new(),
            Err(e) => return Err(e.into()),
        };
        Ok(Self {
            path,
            entries: Mutex::new(entries),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self, map: &HashMap<String, DedupEntry>) -> Result<(), StoreError> {
        if let Some(dir) = self.path.parent() {
            if !dir.as_os_str().is_empty() {
                fs::create_dir_all(dir)?;
            }
        }
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, serde_json::to_vec_pretty(map)?)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

impl DedupStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<DedupEntry>, StoreError> {
        Ok(self.entries.lock().map_err(lock_err)?.get(key).copied())
    }

    fn insert_if_absent(
        &self,
        key: &str,
        entry: DedupEntry,
        now: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        let mut map = self.entries.lock().map_err(lock_err)?;
        if map.get(key).is_some_and(|e| e.is_live(now)) {
            return Ok(false);
        }
        map.insert(key.to_string(), entry);
        self.persist(&map)?;
        Ok(true)
    }

    fn purge_expired(&self, now: DateTime<Utc>) -> Result<usize, StoreError> {
        let mut map = self.entries.lock().map_err(lock_err)?;
        let before = map.len();
        map.retain(|_, e| e.is_live(now));
        let removed = before - map.len();
        if removed > 0 {
            self.persist(&map)?;
        }
        Ok(removed)
    }
}

#[derive(Clone)]
pub struct Deduplicator {
    store: Option<Arc<dyn DedupStore>>,
    retention: Duration,
}

impl Deduplicator {
    pub fn new(store: Arc<dyn DedupStore>, retention: Duration) -> Self {
        Self {
            store: Some(store),
            retention,
        }
    }

    /// No backing store: nothing is ever a duplicate.
    pub fn disabled() -> Self {
        Self {
            store: None,
            retention: Duration::days(DEFAULT_RETENTION_DAYS),
        }
    }

    pub fn retention(&self) -> Duration {
        self.retention
    }

    pub fn is_enabled(&self) -> bool {
        self.store.is_some()
    }

    pub fn is_duplicate(&self, source_type: SourceType, fingerprint: &str) -> bool {
        self.is_duplicate_at(source_type, fingerprint, Utc::now())
    }

    pub fn is_duplicate_at(
        &self,
        source_type: SourceType,
        fingerprint: &str,
        now: DateTime<Utc>,
    ) -> bool {
        if fingerprint.is_empty() {
            return false;
        }
        let Some(store) = &self.store else {
            return false;
        };
        match store.get(&dedup_key(source_type, fingerprint)) {
            Ok(Some(entry)) => entry.is_live(now),
            Ok(None) => false,
            Err(e) => {
                tracing::warn!(target: "dedup", error = %e, "dedup lookup failed; treating as new");
                counter!("dedup_store_errors_total").increment(1);
                false
            }
        }
    }

    /// Record a first sighting. Returns whether a key was created.
    pub fn record(&self, source_type: SourceType, fingerprint: &str, seen_at: DateTime<Utc>) -> bool {
        if fingerprint.is_empty() {
            return false;
        }
        let Some(store) = &self.store else {
            return false;
        };
        let entry = DedupEntry {
            first_seen_at: seen_at,
            expires_at: seen_at + self.retention,
        };
        match store.insert_if_absent(&dedup_key(source_type, fingerprint), entry, seen_at) {
            Ok(inserted) => inserted,
            Err(e) => {
                tracing::warn!(target: "dedup", error = %e, "dedup record failed");
                counter!("dedup_store_errors_total").increment(1);
                false
            }
        }
    }

    /// Housekeeping for stores that do not expire keys on their own.
    pub fn purge_expired(&self, now: DateTime<Utc>) -> usize {
        let Some(store) = &self.store else {
            return 0;
        };
        match store.purge_expired(now) {
            Ok(n) => n,
            Err(e) => {
                tracing::warn!(target: "dedup", error = %e, "dedup purge failed");
                counter!("dedup_store_errors_total").increment(1);
                0
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    const FP: &str = "0123456789abcdef0123456789abcdef01234567";

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 8, 1, 12, 0, 0).unwrap()
    }

    fn mem_dedup() -> Deduplicator {
        Deduplicator::new(Arc::new(MemoryStore::new()), Duration::days(7))
    }

    #[test]
    fn record_then_duplicate() {
        let d = mem_dedup();
        assert!(!d.is_duplicate_at(SourceType::Blog, FP, t0()));
        assert!(d.record(SourceType::Blog, FP, t0()));
        assert!(d.is_duplicate_at(SourceType::Blog, FP, t0()));
        // other fingerprint, other source type
        assert!(!d.is_duplicate_at(SourceType::Blog, "ffff", t0()));
        assert!(!d.is_duplicate_at(SourceType::Tweet, FP, t0()));
    }

    #[test]
    fn expires_after_retention() {
        let d = mem_dedup();
        d.record(SourceType::Tweet, FP, t0());
        let inside = t0() + Duration::days(7) - Duration::seconds(1);
        let after = t0() + Duration::days(7) + Duration::milliseconds(1);
        assert!(d.is_duplicate_at(SourceType::Tweet, FP, inside));
        assert!(!d.is_duplicate_at(SourceType::Tweet, FP, after));
        // re-sighting after expiry starts a new window
        assert!(d.record(SourceType::Tweet, FP, after));
        assert!(d.is_duplicate_at(SourceType::Tweet, FP, after + Duration::days(1)));
    }

    #[test]
    fn live_keys_are_never_overwritten() {
        let store = Arc::new(MemoryStore::new());
        let d = Deduplicator::new(store.clone(), Duration::days(7));
        assert!(d.record(SourceType::Blog, FP, t0()));
        assert!(!d.record(SourceType::Blog, FP, t0() + Duration::days(1)));
        let e = store.get(&dedup_key(SourceType::Blog, FP)).unwrap().unwrap();
        assert_eq!(e.first_seen_at, t0());
    }

    #[test]
    fn empty_fingerprint_is_ignored() {
        let store = Arc::new(MemoryStore::new());
        let d = Deduplicator::new(store.clone(), Duration::days(7));
        assert!(!d.record(SourceType::Blog, "", t0()));
        assert!(!d.is_duplicate_at(SourceType::Blog, "", t0()));
        assert!(store.is_empty());
    }

    #[test]
    fn disabled_never_dedups() {
        let d = Deduplicator::disabled();
        assert!(!d.record(SourceType::Blog, FP, t0()));
        assert!(!d.is_duplicate_at(SourceType::Blog, FP, t0()));
    }

    #[test]
    fn file_store_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state").join("dedup.json");
        {
            let d = Deduplicator::new(Arc::new(FileStore::open(&path).unwrap()), Duration::days(7));
            d.record(SourceType::JobPosting, FP, t0());
        }
        let d = Deduplicator::new(Arc::new(FileStore::open(&path).unwrap()), Duration::days(7));
        assert!(d.is_duplicate_at(SourceType::JobPosting, FP, t0() + Duration::hours(1)));
        assert_eq!(d.purge_expired(t0() + Duration::days(8)), 1);
        assert!(!d.is_duplicate_at(SourceType::JobPosting, FP, t0() + Duration::hours(1)));
    }

    #[test]
    fn corrupt_state_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dedup.json");
        fs::write(&path, "{not json").unwrap();
        assert!(matches!(FileStore::open(&path), Err(StoreError::Corrupt(_))));
    }
}
