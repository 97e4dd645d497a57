// src/notify/cadence.rs
use chrono::{DateTime, Utc};

use crate::alert::Alert;
use crate::analyze::Cadence;

/// Cooldown gate for batched deliveries.
/// - First flush always allowed.
/// - Inside the period, flushes are held back.
/// - State is updated explicitly via `record_flush` after a flush.
#[derive(Debug, Clone)]
pub struct CadenceGate {
    cadence: Cadence,
    last_flush_ts: Option<DateTime<Utc>>,
}

impl CadenceGate {
    pub fn new(cadence: Cadence) -> Self {
        Self {
            cadence,
            last_flush_ts: None,
        }
    }

    /// Check if a batch may go out at `now`. Does NOT mutate state.
    pub fn should_flush(&self, now: DateTime<Utc>) -> bool {
        match self.last_flush_ts {
            None => true,
            Some(ts) => now.signed_duration_since(ts) >= self.cadence.period(),
        }
    }

    pub fn record_flush(&mut self, now: DateTime<Utc>) {
        self.last_flush_ts = Some(now);
    }

    pub fn last_flush(&self) -> Option<DateTime<Utc>> {
        self.last_flush_ts
    }
}

/// Alerts held back for a daily or weekly digest.
#[derive(Debug, Clone)]
pub struct DigestQueue {
    daily: Vec<Alert>,
    weekly: Vec<Alert>,
    daily_gate: CadenceGate,
    weekly_gate: CadenceGate,
}

impl Default for DigestQueue {
    fn default() -> Self {
        Self {
            daily: Vec::new(),
            weekly: Vec::new(),
            daily_gate: CadenceGate::new(Cadence::Daily),
            weekly_gate: CadenceGate::new(Cadence::Weekly),
        }
    }
}

impl DigestQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Immediate alerts are not queued; returns false for them.
    pub fn push(&mut self, cadence: Cadence, alert: Alert) -> bool {
        match cadence {
            Cadence::Immediate => false,
            Cadence::Daily => {
                self.daily.push(alert);
                true
            }
            Cadence::Weekly => {
                self.weekly.push(alert);
                true
            }
        }
    }

    pub fn pending(&self, cadence: Cadence) -> usize {
        match cadence {
            Cadence::Immediate => 0,
            Cadence::Daily => self.daily.len(),
            Cadence::Weekly => self.weekly.len(),
        }
    }

    /// Drain every non-empty batch whose gate is open at `now`, in queue order.
    /// Empty batches do not consume a flush.
    pub fn take_due(&mut self, now: DateTime<Utc>) -> Vec<(Cadence, Vec<Alert>)> {
        let mut out = Vec::new();
        for (cadence, queue, gate) in [
            (Cadence::Daily, &mut self.daily, &mut self.daily_gate),
            (Cadence::Weekly, &mut self.weekly, &mut self.weekly_gate),
        ] {
            if queue.is_empty() || !gate.should_flush(now) {
                continue;
            }
            gate.record_flush(now);
            out.push((cadence, std::mem::take(queue)));
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyze::AlertLevel;
    use crate::ingest::types::SourceType;
    use chrono::{Duration, TimeZone};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 9, 6, 9, 0, 0).unwrap()
    }

    fn alert(company: &str) -> Alert {
        Alert {
            level: AlertLevel::Medium,
            company: company.into(),
            source_type: SourceType::JobPosting,
            text: "Hiring".into(),
            url: None,
            keywords: vec!["hiring".into()],
            generated_at: t0(),
            fingerprint: String::new(),
        }
    }

    #[test]
    fn first_flush_passes() {
        let g = CadenceGate::new(Cadence::Daily);
        assert!(g.should_flush(t0()));
    }

    #[test]
    fn inside_period_blocked_then_passes() {
        let mut g = CadenceGate::new(Cadence::Daily);
        g.record_flush(t0());
        assert!(!g.should_flush(t0() + Duration::hours(23)));
        assert!(g.should_flush(t0() + Duration::hours(24)));
    }

    #[test]
    fn immediate_gate_never_blocks() {
        let mut g = CadenceGate::new(Cadence::Immediate);
        g.record_flush(t0());
        assert!(g.should_flush(t0()));
    }

    #[test]
    fn queue_flushes_by_cadence() {
        let mut q = DigestQueue::new();
        assert!(!q.push(Cadence::Immediate, alert("MPL")));
        assert!(q.push(Cadence::Daily, alert("Zupee")));
        assert!(q.push(Cadence::Daily, alert("WinZO")));

        let due = q.take_due(t0());
        assert_eq!(due.len(), 1);
        assert_eq!(due[0].0, Cadence::Daily);
        let names: Vec<_> = due[0].1.iter().map(|a| a.company.as_str()).collect();
        assert_eq!(names, vec!["Zupee", "WinZO"]);

        // next daily batch waits a full day
        q.push(Cadence::Daily, alert("MPL"));
        assert!(q.take_due(t0() + Duration::hours(2)).is_empty());
        assert_eq!(q.pending(Cadence::Daily), 1);
        assert_eq!(q.take_due(t0() + Duration::days(1)).len(), 1);
    }

    #[test]
    fn empty_batch_does_not_consume_the_gate() {
        let mut q = DigestQueue::new();
        assert!(q.take_due(t0()).is_empty());
        q.push(Cadence::Weekly, alert("MPL"));
        assert_eq!(q.take_due(t0() + Duration::hours(1)).len(), 1);
    }
}
