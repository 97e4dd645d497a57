// src/scheduler.rs
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Datelike, FixedOffset, Local, TimeZone, Timelike, Utc, Weekday};
use tokio::time::{interval, interval_at, Instant, MissedTickBehavior};

use crate::brief::{week_label, WeeklyBrief};
use crate::runner::App;

#[derive(Clone, Copy, Debug)]
pub struct ScheduleCfg {
    pub full_every: Duration,
    pub alerts_every: Duration,
    pub weekly_check_every: Duration,
}

impl Default for ScheduleCfg {
    fn default() -> Self {
        Self {
            full_every: Duration::from_secs(6 * 3600),
            alerts_every: Duration::from_secs(2 * 3600),
            weekly_check_every: Duration::from_secs(60),
        }
    }
}

/// Sunday 23:55 or later (local clock), and not yet fired this ISO week.
/// Returns the week label to remember when due.
pub fn weekly_due<Tz: TimeZone>(now: &DateTime<Tz>, last_fired: Option<&str>) -> Option<String> {
    if now.weekday() != Weekday::Sun || (now.hour(), now.minute()) < (23, 55) {
        return None;
    }
    // Label by the local date: local 23:55 can already be Monday in UTC.
    let week = week_label(now);
    if last_fired == Some(week.as_str()) {
        return None;
    }
    Some(week)
}

/// One weekly check at local time `now`. When due, the brief is built for
/// the local week label and `last_fired` is updated, even if the run fails.
pub async fn weekly_tick(
    app: &App,
    now: DateTime<FixedOffset>,
    last_fired: &mut Option<String>,
) -> Option<WeeklyBrief> {
    let week = weekly_due(&now, last_fired.as_deref())?;
    *last_fired = Some(week.clone());
    match app.run_weekly_for(now.with_timezone(&Utc), week).await {
        Ok(b) => {
            tracing::info!(target: "brief", week = %b.week, "weekly run done");
            Some(b)
        }
        Err(e) => {
            tracing::error!(target: "brief", error = ?e, "weekly run failed");
            None
        }
    }
}

/// Run forever: full pass now and every `full_every`, alert passes every
/// `alerts_every`, weekly brief checked every minute. Passes never overlap.
pub async fn run_scheduler(app: Arc<App>, cfg: ScheduleCfg) {
    let mut full = interval(cfg.full_every);
    let mut alerts = interval_at(Instant::now() + cfg.alerts_every, cfg.alerts_every);
    let mut weekly = interval(cfg.weekly_check_every);
    for t in [&mut full, &mut alerts, &mut weekly] {
        t.set_missed_tick_behavior(MissedTickBehavior::Skip);
    }
    let mut last_weekly: Option<String> = None;

    tracing::info!(?cfg, "scheduler started");
    loop {
        tokio::select! {
            _ = full.tick() => {
                match app.run_full_with(Utc::now(), false).await {
                    Ok(r) => tracing::info!(target: "pipeline", alerts = r.alerts, fetched = r.fetched, "full run done"),
                    Err(e) => tracing::error!(target: "pipeline", error = ?e, "full run failed"),
                }
            }
            _ = alerts.tick() => {
                match app.run_alerts(Utc::now()).await {
                    Ok(r) => tracing::info!(target: "pipeline", alerts = r.alerts, fetched = r.fetched, "alerts run done"),
                    Err(e) => tracing::error!(target: "pipeline", error = ?e, "alerts run failed"),
                }
            }
            _ = weekly.tick() => {
                weekly_tick(&app, Local::now().into(), &mut last_weekly).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fires_once_per_week_after_sunday_2355() {
        let utc = Utc;
        let before = utc.with_ymd_and_hms(2025, 8, 3, 23, 54, 0).unwrap();
        assert_eq!(weekly_due(&before, None), None);

        let at = utc.with_ymd_and_hms(2025, 8, 3, 23, 55, 0).unwrap();
        let week = weekly_due(&at, None).unwrap();
        assert_eq!(week, "2025-W31");
        assert_eq!(weekly_due(&at, Some(&week)), None);

        let saturday = utc.with_ymd_and_hms(2025, 8, 2, 23, 58, 0).unwrap();
        assert_eq!(weekly_due(&saturday, None), None);
    }

    #[test]
    fn uses_local_week_not_utc_week() {
        // 23:56 Sunday in UTC-05:00 is already Monday (next ISO week) in UTC.
        let tz = FixedOffset::west_opt(5 * 3600).unwrap();
        let local = tz.with_ymd_and_hms(2025, 8, 3, 23, 56, 0).unwrap();
        assert_eq!(weekly_due(&local, None).as_deref(), Some("2025-W31"));
    }
}
