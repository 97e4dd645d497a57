// src/analyze/mod.rs
//! Classification layer: rule table, keyword classifier and text signals.

pub mod classifier;
pub mod rules;
pub mod signals;

// Re-export convenient types.
pub use crate::analyze::classifier::{AlertClassifier, Classification};
pub use crate::analyze::rules::{AlertLevel, AlertRules, Cadence, Channel, CompiledRules};
pub use crate::analyze::signals::{Sentiment, Signals};
