// src/lib.rs
// Public library surface for the binaries and integration tests.

pub mod error;

// Ingest: providers, RawItem, normalization
pub mod ingest;

// Classification rules, classifier, signals
pub mod analyze;

pub mod alert;
pub mod dedup;
pub mod priority;

// Delivery: notifiers, cadence, routing
pub mod notify;
pub mod router;

pub mod archive;
pub mod brief;

pub mod config;
pub mod metrics;
pub mod pipeline;
pub mod runner;
pub mod scheduler;

pub mod api;

// ---- Re-exports for stable public API ----
pub use crate::alert::Alert;
pub use crate::analyze::{AlertClassifier, AlertLevel, AlertRules, Cadence, Channel, Classification};
pub use crate::dedup::Deduplicator;
pub use crate::ingest::types::{NormalizedItem, RawItem, SourceType};
pub use crate::pipeline::{BatchOutcome, Pipeline};
pub use crate::priority::sort_by_priority;
pub use crate::router::AlertRouter;
pub use crate::runner::{App, RunReport};
