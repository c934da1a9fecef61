// src/persist.rs
//! Idempotent article writes keyed by canonical URL. Failures are logged and
//! reported as an outcome, never raised.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::enrich::Enrichment;
use crate::error::StoreError;
use crate::ingest::canonical_url;
use crate::model::{Article, RawCandidate};
use crate::store::NewsStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SaveOutcome {
    Inserted,
    Duplicate,
    Failed,
}

pub struct Persister {
    news: Arc<dyn NewsStore>,
}

impl Persister {
    pub fn new(news: Arc<dyn NewsStore>) -> Self {
        Self { news }
    }

    /// `true` when the canonical URL is already stored. A failing lookup
    /// counts as unknown; `save` settles it.
    pub async fn is_known(&self, url: &str) -> bool {
        match self.news.exists(&canonical_url(url)).await {
            Ok(found) => found,
            Err(e) => {
                debug!(target: "ingest", url, error = %e, "existence check failed");
                false
            }
        }
    }

    pub async fn save(
        &self,
        candidate: &RawCandidate,
        enrichment: Enrichment,
        now: DateTime<Utc>,
    ) -> SaveOutcome {
        let url = canonical_url(&candidate.url);
        match self.news.exists(&url).await {
            Ok(true) => return SaveOutcome::Duplicate,
            Ok(false) => {}
            Err(e) => {
                warn!(target: "ingest", %url, error = %e, "article not saved");
                return SaveOutcome::Failed;
            }
        }

        let article = Article {
            title: candidate.title.clone(),
            url: url.clone(),
            source_name: candidate.source.clone(),
            raw_content: enrichment.content,
            summary: enrichment.summary,
            category: enrichment.category,
            related_symbols: enrichment.related_symbols,
            sentiment: enrichment.sentiment.clamp(-1.0, 1.0),
            published_at: candidate.published_at.unwrap_or(now),
            ingested_at: now,
        };

        match self.news.insert(article).await {
            Ok(()) => SaveOutcome::Inserted,
            // lost a race with a concurrent writer: same outcome as the pre-check
            Err(StoreError::Constraint(_)) => SaveOutcome::Duplicate,
            Err(e) => {
                warn!(target: "ingest", %url, error = %e, "article not saved");
                SaveOutcome::Failed
            }
        }
    }
}
