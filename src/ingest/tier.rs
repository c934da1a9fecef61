// src/ingest/tier.rs
//! Fetch tiers. Each tier is a strategy with a gate; the orchestrator walks
//! them in order and only consults the gate, never the tier's kind.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use metrics::counter;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Mutex;
use tracing::{info, warn};

use super::pipeline::{ArticlePipeline, CandidateOutcome};
use super::providers::{build_provider, ProviderSettings};
use super::sources::sources_of_kind;
use super::types::SourceProvider;
use crate::error::FetchErrorKind;
use crate::model::{Source, SourceKind, Universe};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TierGate {
    Always,
    /// Only when no source in an earlier tier succeeded during this run.
    WhenNoSuccesses,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceFailure {
    pub source: String,
    pub kind: FetchErrorKind,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TierOutcome {
    pub tier: SourceKind,
    pub ran: bool,
    pub sources_ok: usize,
    pub sources_failed: usize,
    pub sources_parked: usize,
    pub candidates: usize,
    pub filtered: usize,
    pub inserted: usize,
    pub duplicates: usize,
    pub failed_saves: usize,
    pub failures: Vec<SourceFailure>,
}

impl TierOutcome {
    pub fn new(tier: SourceKind) -> Self {
        Self {
            tier,
            ran: true,
            sources_ok: 0,
            sources_failed: 0,
            sources_parked: 0,
            candidates: 0,
            filtered: 0,
            inserted: 0,
            duplicates: 0,
            failed_saves: 0,
            failures: Vec::new(),
        }
    }

    pub fn skipped(tier: SourceKind) -> Self {
        Self {
            ran: false,
            ..Self::new(tier)
        }
    }

    fn tally(&mut self, outcome: CandidateOutcome) {
        match outcome {
            CandidateOutcome::Filtered => self.filtered += 1,
            CandidateOutcome::Duplicate => self.duplicates += 1,
            CandidateOutcome::Inserted => self.inserted += 1,
            CandidateOutcome::Failed => self.failed_saves += 1,
        }
    }
}

/// Cross-run memory of sources that sit out the next run.
#[derive(Debug, Default)]
pub struct SourceHealth {
    parked: Mutex<HashMap<String, u32>>,
}

impl SourceHealth {
    pub fn new() -> Self {
        Self::default()
    }

    /// Consumes one parked run; `true` means skip the source now.
    pub fn take_parked(&self, source: &str) -> bool {
        let mut map = self.parked.lock().unwrap_or_else(|p| p.into_inner());
        match map.get_mut(source) {
            Some(n) if *n > 0 => {
                *n -= 1;
                true
            }
            Some(_) => {
                map.remove(source);
                false
            }
            None => false,
        }
    }

    pub fn record_failure(&self, source: &str, kind: FetchErrorKind) {
        if kind.retry_next_run() {
            return;
        }
        let mut map = self.parked.lock().unwrap_or_else(|p| p.into_inner());
        map.insert(source.to_string(), 1);
    }

    pub fn record_success(&self, source: &str) {
        let mut map = self.parked.lock().unwrap_or_else(|p| p.into_inner());
        map.remove(source);
    }

    pub fn is_parked(&self, source: &str) -> bool {
        let map = self.parked.lock().unwrap_or_else(|p| p.into_inner());
        map.get(source).is_some_and(|n| *n > 0)
    }
}

/// Shared inputs for one run.
pub struct TierContext<'a> {
    pub universe: &'a Universe,
    pub pipeline: &'a ArticlePipeline,
    pub health: &'a SourceHealth,
    pub now: DateTime<Utc>,
}

#[async_trait]
pub trait IngestTier: Send + Sync {
    fn kind(&self) -> SourceKind;
    fn gate(&self) -> TierGate;
    async fn run(&self, ctx: &TierContext<'_>) -> TierOutcome;
}

/// Runs its providers one after another.
pub struct SourceTier {
    kind: SourceKind,
    gate: TierGate,
    providers: Vec<Box<dyn SourceProvider>>,
}

impl SourceTier {
    pub fn new(kind: SourceKind, gate: TierGate, providers: Vec<Box<dyn SourceProvider>>) -> Self {
        Self {
            kind,
            gate,
            providers,
        }
    }
}

#[async_trait]
impl IngestTier for SourceTier {
    fn kind(&self) -> SourceKind {
        self.kind
    }

    fn gate(&self) -> TierGate {
        self.gate
    }

    async fn run(&self, ctx: &TierContext<'_>) -> TierOutcome {
        let mut out = TierOutcome::new(self.kind);
        for p in &self.providers {
            if ctx.health.take_parked(p.name()) {
                info!(target: "ingest", source = p.name(), "source parked for this run");
                out.sources_parked += 1;
                continue;
            }
            match p.fetch(ctx.universe).await {
                Ok(candidates) => {
                    ctx.health.record_success(p.name());
                    out.sources_ok += 1;
                    out.candidates += candidates.len();
                    for c in &candidates {
                        out.tally(ctx.pipeline.process(c, ctx.universe, ctx.now).await);
                    }
                }
                Err(e) => {
                    warn!(
                        target: "ingest",
                        source = %e.source_name,
                        kind = %e.kind,
                        detail = %e.detail,
                        "source fetch failed"
                    );
                    counter!("ingest_source_errors_total", "kind" => e.kind.as_str()).increment(1);
                    ctx.health.record_failure(p.name(), e.kind);
                    out.sources_failed += 1;
                    out.failures.push(SourceFailure {
                        source: p.name().to_string(),
                        kind: e.kind,
                    });
                }
            }
        }
        out
    }
}

/// Standard tier order: RSS (always), API (always, when a key is set),
/// scrape (only after zero successes).
pub fn build_tiers(sources: &[Source], settings: &ProviderSettings) -> Vec<Box<dyn IngestTier>> {
    let providers_of = |kind: SourceKind| -> Vec<Box<dyn SourceProvider>> {
        sources_of_kind(sources, kind)
            .iter()
            .filter_map(|s| build_provider(s, settings))
            .collect()
    };

    let mut tiers: Vec<Box<dyn IngestTier>> = vec![Box::new(SourceTier::new(
        SourceKind::Rss,
        TierGate::Always,
        providers_of(SourceKind::Rss),
    ))];

    let api = providers_of(SourceKind::Api);
    if api.is_empty() {
        info!(target: "ingest", "no news API key configured, API tier disabled");
    } else {
        tiers.push(Box::new(SourceTier::new(SourceKind::Api, TierGate::Always, api)));
    }

    tiers.push(Box::new(SourceTier::new(
        SourceKind::Scrape,
        TierGate::WhenNoSuccesses,
        providers_of(SourceKind::Scrape),
    )));
    tiers
}
