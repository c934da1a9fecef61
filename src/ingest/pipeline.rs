// src/ingest/pipeline.rs
//! Per-candidate path: relevance gate → dedup pre-check → enrichment → save.

use chrono::{DateTime, Utc};
use metrics::counter;
use serde::Serialize;
use std::sync::Arc;
use tracing::debug;

use crate::enrich::Enricher;
use crate::model::{RawCandidate, Universe};
use crate::persist::{Persister, SaveOutcome};
use crate::relevance::Classifier;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CandidateOutcome {
    Filtered,
    Duplicate,
    Inserted,
    Failed,
}

impl From<SaveOutcome> for CandidateOutcome {
    fn from(o: SaveOutcome) -> Self {
        match o {
            SaveOutcome::Inserted => CandidateOutcome::Inserted,
            SaveOutcome::Duplicate => CandidateOutcome::Duplicate,
            SaveOutcome::Failed => CandidateOutcome::Failed,
        }
    }
}

pub struct ArticlePipeline {
    classifier: Arc<dyn Classifier>,
    enricher: Enricher,
    persister: Persister,
}

impl ArticlePipeline {
    pub fn new(classifier: Arc<dyn Classifier>, enricher: Enricher, persister: Persister) -> Self {
        Self {
            classifier,
            enricher,
            persister,
        }
    }

    pub async fn process(
        &self,
        candidate: &RawCandidate,
        universe: &Universe,
        now: DateTime<Utc>,
    ) -> CandidateOutcome {
        let Some(reason) = self.classifier.match_reason(
            &candidate.title,
            &universe.holdings,
            &universe.industries,
        ) else {
            counter!("ingest_filtered_total").increment(1);
            return CandidateOutcome::Filtered;
        };
        debug!(target: "ingest", title = %candidate.title, ?reason, "candidate relevant");

        // known URLs never reach enrichment (no AI cost)
        if self.persister.is_known(&candidate.url).await {
            counter!("ingest_duplicates_total").increment(1);
            return CandidateOutcome::Duplicate;
        }

        let enrichment = self.enricher.enrich(candidate, universe).await;
        let outcome: CandidateOutcome = self.persister.save(candidate, enrichment, now).await.into();
        match outcome {
            CandidateOutcome::Inserted => counter!("ingest_articles_inserted_total").increment(1),
            CandidateOutcome::Duplicate => counter!("ingest_duplicates_total").increment(1),
            _ => {}
        }
        outcome
    }
}
