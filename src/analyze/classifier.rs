// src/analyze/classifier.rs
//! Keyword-rule alert classifier.
//!
//! Levels are checked high → medium → low; the first level with at least
//! one matching pattern wins. Inside the winning level every pattern is
//! evaluated and all matches are collected, in pattern order and then in
//! position order. Pure and deterministic: no I/O, no clock.

use std::sync::Arc;

use serde::Serialize;

use crate::analyze::rules::{AlertLevel, CompiledRules};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Classification {
    pub level: AlertLevel,
    /// Lower-cased matched substrings, first occurrence order, no repeats.
    pub keywords: Vec<String>,
}

impl Classification {
    pub fn low() -> Self {
        Self {
            level: AlertLevel::Low,
            keywords: Vec::new(),
        }
    }

    /// Whether this outcome clears the alert threshold.
    pub fn is_alert(&self) -> bool {
        self.level > AlertLevel::Low
    }
}

#[derive(Debug, Clone)]
pub struct AlertClassifier {
    rules: Arc<CompiledRules>,
}

impl AlertClassifier {
    pub fn new(rules: Arc<CompiledRules>) -> Self {
        Self { rules }
    }

    pub fn rules(&self) -> &CompiledRules {
        &self.rules
    }

    pub fn classify(&self, text: &str) -> Classification {
        if text.trim().is_empty() {
            return Classification::low();
        }

        for level in &self.rules.levels {
            let mut keywords: Vec<String> = Vec::new();
            for re in &level.patterns {
                for m in re.find_iter(text) {
                    if m.as_str().is_empty() {
                        continue;
                    }
                    let kw = m.as_str().to_lowercase();
                    if !keywords.contains(&kw) {
                        keywords.push(kw);
                    }
                }
            }
            if !keywords.is_empty() {
                return Classification {
                    level: level.level,
                    keywords,
                };
            }
        }

        Classification::low()
    }
}
