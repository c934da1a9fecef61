// src/scheduler.rs
//! In-process triggers: interval ingestion and the daily report at a fixed
//! UTC time. An external cron can call the same entry points instead.

use chrono::{DateTime, Duration as ChronoDuration, NaiveTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{info, warn};

use crate::error::DistributionError;
use crate::ingest::Orchestrator;
use crate::notify::DistributionDriver;

/// Next instant strictly after `now` whose UTC wall clock reads `at`.
pub fn next_run_after(now: DateTime<Utc>, at: NaiveTime) -> DateTime<Utc> {
    let today = now.date_naive().and_time(at).and_utc();
    if today > now {
        today
    } else {
        today + ChronoDuration::days(1)
    }
}

/// Runs ingestion every `every`, starting immediately.
pub fn spawn_ingest_loop(orchestrator: Arc<Orchestrator>, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            ticker.tick().await;
            match orchestrator.update_news().await {
                Ok(report) => info!(
                    target: "ingest",
                    inserted = report.inserted,
                    sources_ok = report.sources_ok,
                    "scheduled ingest done"
                ),
                Err(e) => info!(target: "ingest", "scheduled ingest skipped: {e}"),
            }
        }
    })
}

/// Sends the daily digest once per day at `at` (UTC).
pub fn spawn_daily_report(driver: Arc<DistributionDriver>, at: NaiveTime) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            let now = Utc::now();
            let next = next_run_after(now, at);
            info!(target: "distribute", next = %next, "daily report scheduled");
            tokio::time::sleep((next - now).to_std().unwrap_or_default()).await;

            match driver.send_daily_report().await {
                Ok(s) => info!(target: "distribute", sent = s.sent, failed = s.failed, "scheduled report done"),
                Err(DistributionError::AlreadyRunning(e)) => {
                    info!(target: "distribute", "scheduled report skipped: {e}")
                }
                Err(e) => warn!(target: "distribute", error = %e, "scheduled report failed"),
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    #[test]
    fn later_today_when_time_not_reached() {
        let now = Utc.with_ymd_and_hms(2025, 6, 10, 6, 30, 0).unwrap();
        assert_eq!(
            next_run_after(now, at(8, 0)),
            Utc.with_ymd_and_hms(2025, 6, 10, 8, 0, 0).unwrap()
        );
    }

    #[test]
    fn tomorrow_when_time_passed_or_exact() {
        let now = Utc.with_ymd_and_hms(2025, 6, 10, 8, 0, 0).unwrap();
        assert_eq!(
            next_run_after(now, at(8, 0)),
            Utc.with_ymd_and_hms(2025, 6, 11, 8, 0, 0).unwrap()
        );
        let late = Utc.with_ymd_and_hms(2025, 12, 31, 23, 59, 0).unwrap();
        assert_eq!(
            next_run_after(late, at(8, 0)),
            Utc.with_ymd_and_hms(2026, 1, 1, 8, 0, 0).unwrap()
        );
    }
}
