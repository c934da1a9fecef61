// src/ingest/types.rs
use async_trait::async_trait;

use crate::error::SourceFetchError;
use crate::model::{RawCandidate, SourceKind, Universe};

/// One fetchable source. Implementations never return a generic error: every
/// failure carries a [`crate::error::FetchErrorKind`].
#[async_trait]
pub trait SourceProvider: Send + Sync {
    /// `universe` feeds keyword-driven sources (the news API); feeds and
    /// scrapers ignore it.
    async fn fetch(&self, universe: &Universe) -> Result<Vec<RawCandidate>, SourceFetchError>;
    fn name(&self) -> &str;
    fn kind(&self) -> SourceKind;
}
