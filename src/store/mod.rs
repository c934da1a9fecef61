// src/store/mod.rs
//! Storage contracts. The relational engine lives outside this crate; these
//! traits are the query primitives the pipeline relies on.

pub mod memory;
pub mod seed;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::StoreError;
use crate::model::{Article, EmailLogEntry, Holding, IndustryWatch, Portfolio, PortfolioId, Subscription};

pub use memory::MemoryStore;
pub use seed::SeedData;

#[async_trait]
pub trait PortfolioStore: Send + Sync {
    async fn list_holdings(&self, portfolio_id: PortfolioId) -> Result<Vec<Holding>, StoreError>;
    async fn list_public_portfolios(&self, limit: usize) -> Result<Vec<Portfolio>, StoreError>;
    async fn get_portfolio(&self, id: PortfolioId) -> Result<Option<Portfolio>, StoreError>;
    /// Every holding across all portfolios, one entry per symbol.
    async fn list_all_holdings(&self) -> Result<Vec<Holding>, StoreError>;
}

#[async_trait]
pub trait IndustryStore: Send + Sync {
    async fn list_watched_industries(&self) -> Result<Vec<IndustryWatch>, StoreError>;
}

#[async_trait]
pub trait NewsStore: Send + Sync {
    async fn exists(&self, url: &str) -> Result<bool, StoreError>;
    /// Fails with `StoreError::Constraint` when the URL is already stored.
    async fn insert(&self, article: Article) -> Result<(), StoreError>;
    /// Newest first by ingestion time.
    async fn query_recent(&self, limit: usize) -> Result<Vec<Article>, StoreError>;
    /// Articles with `start <= ingested_at <= end`, newest first.
    async fn query_by_date_range(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Article>, StoreError>;
    /// Removes articles ingested before `cutoff`; returns how many went.
    async fn delete_older_than(&self, cutoff: DateTime<Utc>) -> Result<usize, StoreError>;
}

#[async_trait]
pub trait SubscriptionStore: Send + Sync {
    async fn list_active(&self) -> Result<Vec<Subscription>, StoreError>;
}

#[async_trait]
pub trait EmailLogStore: Send + Sync {
    async fn append(&self, entry: EmailLogEntry) -> Result<(), StoreError>;
    /// Newest first.
    async fn list_recent(&self, limit: usize) -> Result<Vec<EmailLogEntry>, StoreError>;
}
