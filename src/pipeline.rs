// src/pipeline.rs
//! One batch pass: purge expired dedup keys, then normalize → dedup check →
//! record → classify → alert or low count → priority sort. Items are
//! independent; the dedup store is the only shared state.

use chrono::{DateTime, Utc};
use metrics::{counter, gauge};
use serde::Serialize;

use crate::alert::Alert;
use crate::analyze::{AlertClassifier, AlertLevel, Classification, Signals};
use crate::archive::ItemRecord;
use crate::dedup::Deduplicator;
use crate::ingest::normalize;
use crate::ingest::types::{NormalizedItem, RawItem};
use crate::priority::sort_by_priority;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProcessedItem {
    pub item: NormalizedItem,
    pub classification: Classification,
    pub signals: Signals,
}

impl ProcessedItem {
    pub fn to_record(&self, recorded_at: DateTime<Utc>) -> ItemRecord {
        ItemRecord::new(
            &self.item,
            self.classification.level,
            self.classification.keywords.clone(),
            self.signals.clone(),
            recorded_at,
        )
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct BatchOutcome {
    pub total: usize,
    pub duplicates: usize,
    pub low_count: usize,
    /// Non-duplicate items in fetch order.
    pub processed: Vec<ProcessedItem>,
    /// Priority-sorted; discovery order within a level.
    pub alerts: Vec<Alert>,
}

impl BatchOutcome {
    pub fn is_empty(&self) -> bool {
        self.total == 0
    }

    pub fn count_level(&self, level: AlertLevel) -> usize {
        self.alerts.iter().filter(|a| a.level == level).count()
    }
}

#[derive(Clone)]
pub struct Pipeline {
    classifier: AlertClassifier,
    dedup: Deduplicator,
}

impl Pipeline {
    pub fn new(classifier: AlertClassifier, dedup: Deduplicator) -> Self {
        Self { classifier, dedup }
    }

    pub fn classifier(&self) -> &AlertClassifier {
        &self.classifier
    }

    pub fn dedup(&self) -> &Deduplicator {
        &self.dedup
    }

    pub fn process_batch(&self, items: Vec<RawItem>, now: DateTime<Utc>) -> BatchOutcome {
        let purged = self.dedup.purge_expired(now);
        if purged > 0 {
            tracing::debug!(target: "pipeline", purged, "expired dedup keys dropped");
        }

        let mut out = BatchOutcome {
            total: items.len(),
            ..Default::default()
        };
        if items.is_empty() {
            tracing::info!(target: "pipeline", "nothing to process");
            return out;
        }

        for raw in &items {
            let item = normalize(raw, now);
            if self
                .dedup
                .is_duplicate_at(item.source_type, &item.fingerprint, now)
            {
                tracing::debug!(
                    target: "pipeline",
                    company = %item.company,
                    source = %item.source_type,
                    fp = %fp_prefix(&item.fingerprint),
                    "duplicate skipped"
                );
                out.duplicates += 1;
                continue;
            }
            self.dedup.record(item.source_type, &item.fingerprint, now);

            let classification = self.classifier.classify(&item.text);
            match Alert::from_item(&item, &classification, now) {
                Some(alert) => {
                    counter!("pipeline_alerts_total", "level" => alert.level.as_str())
                        .increment(1);
                    tracing::info!(
                        target: "pipeline",
                        company = %alert.company,
                        source = %alert.source_type,
                        level = %alert.level,
                        keywords = ?alert.keywords,
                        "alert"
                    );
                    out.alerts.push(alert);
                }
                None => out.low_count += 1,
            }
            out.processed.push(ProcessedItem {
                signals: Signals::from_raw(raw),
                item,
                classification,
            });
        }

        sort_by_priority(&mut out.alerts);

        counter!("pipeline_items_total").increment(out.total as u64);
        counter!("pipeline_duplicates_total").increment(out.duplicates as u64);
        counter!("pipeline_low_total").increment(out.low_count as u64);
        gauge!("pipeline_last_run_ts").set(now.timestamp() as f64);

        tracing::info!(
            target: "pipeline",
            total = out.total,
            duplicates = out.duplicates,
            alerts = out.alerts.len(),
            low = out.low_count,
            "batch processed"
        );
        out
    }
}

fn fp_prefix(fp: &str) -> &str {
    fp.get(..8).unwrap_or(fp)
}
