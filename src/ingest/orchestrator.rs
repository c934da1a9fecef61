// src/ingest/orchestrator.rs
//! One ingestion run: load universe, walk the tiers, purge expired articles.
//!
//! `Idle → Running → {TierRss, TierApi, TierScrape} → Cleanup → Idle`

use chrono::{DateTime, Duration, Utc};
use metrics::{counter, gauge};
use serde::Serialize;
use std::sync::{Arc, Mutex};
use tracing::{info, warn};

use super::ensure_metrics_described;
use super::pipeline::ArticlePipeline;
use super::tier::{IngestTier, SourceHealth, TierContext, TierGate, TierOutcome};
use crate::error::AlreadyRunning;
use crate::guard::SingleFlight;
use crate::model::{SourceKind, Universe};
use crate::store::{IndustryStore, NewsStore, PortfolioStore};

pub const DEFAULT_RETENTION_DAYS: i64 = 7;
pub const MAX_RETENTION_DAYS: i64 = 3650;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    Idle,
    Running,
    TierRss,
    TierApi,
    TierScrape,
    Cleanup,
}

impl From<SourceKind> for RunState {
    fn from(kind: SourceKind) -> Self {
        match kind {
            SourceKind::Rss => RunState::TierRss,
            SourceKind::Api => RunState::TierApi,
            SourceKind::Scrape => RunState::TierScrape,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct IngestReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub universe_holdings: usize,
    pub universe_industries: usize,
    pub tiers: Vec<TierOutcome>,
    pub sources_ok: usize,
    pub inserted: usize,
    pub duplicates: usize,
    pub filtered: usize,
    pub failed_saves: usize,
    pub purged: usize,
}

impl IngestReport {
    pub fn tier(&self, kind: SourceKind) -> Option<&TierOutcome> {
        self.tiers.iter().find(|t| t.tier == kind)
    }
}

pub struct Orchestrator {
    portfolios: Arc<dyn PortfolioStore>,
    industries: Arc<dyn IndustryStore>,
    news: Arc<dyn NewsStore>,
    pipeline: ArticlePipeline,
    tiers: Vec<Box<dyn IngestTier>>,
    health: SourceHealth,
    retention: Duration,
    guard: SingleFlight,
    state: Mutex<RunState>,
}

impl Orchestrator {
    pub fn new(
        portfolios: Arc<dyn PortfolioStore>,
        industries: Arc<dyn IndustryStore>,
        news: Arc<dyn NewsStore>,
        pipeline: ArticlePipeline,
        tiers: Vec<Box<dyn IngestTier>>,
    ) -> Self {
        ensure_metrics_described();
        Self {
            portfolios,
            industries,
            news,
            pipeline,
            tiers,
            health: SourceHealth::new(),
            retention: Duration::days(DEFAULT_RETENTION_DAYS),
            guard: SingleFlight::new("ingest"),
            state: Mutex::new(RunState::Idle),
        }
    }

    pub fn with_retention_days(mut self, days: i64) -> Self {
        self.retention = Duration::days(days.clamp(1, MAX_RETENTION_DAYS));
        self
    }

    pub fn state(&self) -> RunState {
        *self.state.lock().unwrap_or_else(|p| p.into_inner())
    }

    pub fn health(&self) -> &SourceHealth {
        &self.health
    }

    fn set_state(&self, s: RunState) {
        *self.state.lock().unwrap_or_else(|p| p.into_inner()) = s;
    }

    pub async fn update_news(&self) -> Result<IngestReport, AlreadyRunning> {
        self.run_at(Utc::now()).await
    }

    /// Full run with an explicit clock. Overlapping calls fail fast.
    pub async fn run_at(&self, now: DateTime<Utc>) -> Result<IngestReport, AlreadyRunning> {
        let _permit = self.guard.try_acquire()?;
        self.set_state(RunState::Running);

        let universe = self.load_universe().await;
        info!(
            target: "ingest",
            holdings = universe.holdings.len(),
            industries = universe.industries.len(),
            "ingest run started"
        );

        let ctx = TierContext {
            universe: &universe,
            pipeline: &self.pipeline,
            health: &self.health,
            now,
        };

        let mut outcomes = Vec::with_capacity(self.tiers.len());
        let mut sources_ok = 0usize;
        for tier in &self.tiers {
            let open = match tier.gate() {
                TierGate::Always => true,
                TierGate::WhenNoSuccesses => sources_ok == 0,
            };
            if !open {
                outcomes.push(TierOutcome::skipped(tier.kind()));
                continue;
            }
            self.set_state(tier.kind().into());
            let out = tier.run(&ctx).await;
            info!(
                target: "ingest",
                tier = tier.kind().as_str(),
                ok = out.sources_ok,
                failed = out.sources_failed,
                parked = out.sources_parked,
                inserted = out.inserted,
                "tier finished"
            );
            sources_ok += out.sources_ok;
            outcomes.push(out);
        }

        if sources_ok == 0 {
            warn!(target: "ingest", "no source succeeded in this run");
        }

        self.set_state(RunState::Cleanup);
        let purged = self.purge_expired(now).await;

        let sum = |f: fn(&TierOutcome) -> usize| outcomes.iter().map(f).sum::<usize>();
        let report = IngestReport {
            started_at: now,
            finished_at: Utc::now(),
            universe_holdings: universe.holdings.len(),
            universe_industries: universe.industries.len(),
            sources_ok,
            inserted: sum(|t| t.inserted),
            duplicates: sum(|t| t.duplicates),
            filtered: sum(|t| t.filtered),
            failed_saves: sum(|t| t.failed_saves),
            purged,
            tiers: outcomes,
        };

        counter!("ingest_runs_total").increment(1);
        gauge!("ingest_last_run_ts").set(now.timestamp() as f64);
        info!(
            target: "ingest",
            inserted = report.inserted,
            duplicates = report.duplicates,
            filtered = report.filtered,
            purged = report.purged,
            "ingest run finished"
        );
        self.set_state(RunState::Idle);
        Ok(report)
    }

    /// Deletes articles ingested more than the retention window before `now`.
    pub async fn purge_expired(&self, now: DateTime<Utc>) -> usize {
        let cutoff = now - self.retention;
        match self.news.delete_older_than(cutoff).await {
            Ok(n) => {
                counter!("ingest_purged_total").increment(n as u64);
                if n > 0 {
                    info!(target: "ingest", purged = n, %cutoff, "expired articles removed");
                }
                n
            }
            Err(e) => {
                warn!(target: "ingest", error = %e, "retention cleanup failed");
                0
            }
        }
    }

    /// Store failures degrade to an empty universe (generic relevance only).
    async fn load_universe(&self) -> Universe {
        let holdings = self.portfolios.list_all_holdings().await;
        let industries = self.industries.list_watched_industries().await;
        match (holdings, industries) {
            (Ok(holdings), Ok(industries)) => Universe {
                holdings,
                industries,
            },
            (Err(e), _) | (_, Err(e)) => {
                warn!(target: "ingest", error = %e, "universe unavailable, using generic relevance");
                Universe::default()
            }
        }
    }
}
