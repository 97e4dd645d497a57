// src/router.rs
//! Alert routing: level → channels → cadence.
//!
//! Every channel send is attempted on its own. A failed or unconfigured
//! channel is reported and skipped; the other channels and the rest of the
//! batch still go out. Nothing is retried.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use metrics::counter;
use serde::Serialize;

use crate::alert::Alert;
use crate::analyze::{Cadence, Channel, CompiledRules};
use crate::notify::cadence::DigestQueue;
use crate::notify::{render_alert, render_digest, Notifier, RenderedMessage};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryOutcome {
    Delivered,
    Failed,
    /// The channel has no notifier (capability absent); no attempt made.
    NotConfigured,
}

impl DeliveryOutcome {
    pub fn as_str(self) -> &'static str {
        match self {
            DeliveryOutcome::Delivered => "delivered",
            DeliveryOutcome::Failed => "failed",
            DeliveryOutcome::NotConfigured => "not_configured",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DeliveryReport {
    pub deliveries: Vec<(Channel, DeliveryOutcome)>,
}

impl DeliveryReport {
    pub fn delivered_channels(&self) -> BTreeSet<Channel> {
        self.deliveries
            .iter()
            .filter(|(_, o)| *o == DeliveryOutcome::Delivered)
            .map(|(c, _)| *c)
            .collect()
    }

    /// Sends actually tried (delivered or failed).
    pub fn attempts(&self) -> usize {
        self.deliveries
            .iter()
            .filter(|(_, o)| *o != DeliveryOutcome::NotConfigured)
            .count()
    }

    pub fn failures(&self) -> usize {
        self.deliveries
            .iter()
            .filter(|(_, o)| *o == DeliveryOutcome::Failed)
            .count()
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct DispatchSummary {
    pub immediate: Vec<DeliveryReport>,
    pub queued: usize,
    pub digests: Vec<DeliveryReport>,
}

impl DispatchSummary {
    pub fn attempts(&self) -> usize {
        self.immediate
            .iter()
            .chain(self.digests.iter())
            .map(DeliveryReport::attempts)
            .sum()
    }
}

pub struct AlertRouter {
    rules: Arc<CompiledRules>,
    notifiers: BTreeMap<Channel, Arc<dyn Notifier>>,
    queue: DigestQueue,
}

impl AlertRouter {
    pub fn new(rules: Arc<CompiledRules>) -> Self {
        Self {
            rules,
            notifiers: BTreeMap::new(),
            queue: DigestQueue::new(),
        }
    }

    /// Register a notifier under its own channel. A later one replaces an earlier one.
    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.add_notifier(notifier);
        self
    }

    pub fn add_notifier(&mut self, notifier: Arc<dyn Notifier>) {
        self.notifiers.insert(notifier.channel(), notifier);
    }

    pub fn configured_channels(&self) -> Vec<Channel> {
        self.notifiers.keys().copied().collect()
    }

    pub fn pending_digest(&self, cadence: Cadence) -> usize {
        self.queue.pending(cadence)
    }

    /// Send one alert to every deliverable channel of its level, now.
    pub async fn route(&self, alert: &Alert) -> DeliveryReport {
        let msg = render_alert(alert);
        let channels = self.rules.channels_for(alert.level).to_vec();
        let report = self.send_to(&channels, &msg).await;
        tracing::info!(
            target: "router",
            company = %alert.company,
            level = %alert.level,
            delivered = ?report.delivered_channels(),
            "alert routed"
        );
        report
    }

    /// Route a priority-sorted batch: immediate alerts go out now, the rest
    /// wait in the digest queue until their cadence is due.
    pub async fn dispatch(&mut self, alerts: &[Alert], now: DateTime<Utc>) -> DispatchSummary {
        let mut summary = DispatchSummary::default();
        for alert in alerts {
            let cadence = self.rules.cadence_for(alert.level);
            if self.queue.push(cadence, alert.clone()) {
                summary.queued += 1;
            } else {
                summary.immediate.push(self.route(alert).await);
            }
        }
        summary.digests = self.flush_due(now).await;
        summary
    }

    /// Send one digest per channel for every due batch.
    pub async fn flush_due(&mut self, now: DateTime<Utc>) -> Vec<DeliveryReport> {
        let mut reports = Vec::new();
        for (cadence, batch) in self.queue.take_due(now) {
            let mut per_channel: BTreeMap<Channel, Vec<Alert>> = BTreeMap::new();
            for alert in batch {
                for ch in self.rules.channels_for(alert.level) {
                    if ch.is_deliverable() {
                        per_channel.entry(*ch).or_default().push(alert.clone());
                    }
                }
            }
            let label = match cadence {
                Cadence::Weekly => "Weekly",
                _ => "Daily",
            };
            for (ch, alerts) in per_channel {
                let msg = render_digest(label, &alerts, now);
                reports.push(self.send_to(&[ch], &msg).await);
            }
            tracing::info!(target: "router", cadence = cadence.as_str(), "digest flushed");
        }
        reports
    }

    /// Send an already rendered message (e.g. the weekly brief) to every
    /// configured channel.
    pub async fn broadcast(&self, msg: &RenderedMessage) -> DeliveryReport {
        let channels = self.configured_channels();
        self.send_to(&channels, msg).await
    }

    async fn send_to(&self, channels: &[Channel], msg: &RenderedMessage) -> DeliveryReport {
        let mut report = DeliveryReport::default();
        for ch in channels.iter().copied().filter(|c| c.is_deliverable()) {
            let outcome = match self.notifiers.get(&ch) {
                None => {
                    tracing::debug!(target: "router", channel = %ch, "channel not configured");
                    DeliveryOutcome::NotConfigured
                }
                Some(n) => match n.send(msg).await {
                    Ok(()) => DeliveryOutcome::Delivered,
                    Err(e) => {
                        tracing::warn!(target: "router", error = ?e, channel = %ch, "send failed");
                        DeliveryOutcome::Failed
                    }
                },
            };
            counter!(
                "router_sends_total",
                "channel" => ch.as_str(),
                "outcome" => outcome.as_str()
            )
            .increment(1);
            report.deliveries.push((ch, outcome));
        }
        report
    }
}
