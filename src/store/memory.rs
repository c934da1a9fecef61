// src/store/memory.rs
//! In-process implementation of every store trait. Used by the binary when no
//! external database is wired in, and by the tests.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashSet};
use tokio::sync::RwLock;
use tracing::debug;

use super::{EmailLogStore, IndustryStore, NewsStore, PortfolioStore, SubscriptionStore};
use crate::error::StoreError;
use crate::model::{
    normalize_symbol, Article, EmailLogEntry, Holding, IndustryWatch, Portfolio, PortfolioId,
    Subscription, Visibility,
};

struct PortfolioEntry {
    portfolio: Portfolio,
    holdings: Vec<Holding>,
}

#[derive(Default)]
pub struct MemoryStore {
    portfolios: RwLock<BTreeMap<PortfolioId, PortfolioEntry>>,
    industries: RwLock<Vec<IndustryWatch>>,
    articles: RwLock<Vec<Article>>,
    subscriptions: RwLock<Vec<Subscription>>,
    email_log: RwLock<Vec<EmailLogEntry>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a portfolio with its holdings. Symbols are stored
    /// upper-cased and must be unique within the portfolio.
    pub async fn put_portfolio(
        &self,
        portfolio: Portfolio,
        mut holdings: Vec<Holding>,
    ) -> Result<(), StoreError> {
        let mut seen = HashSet::new();
        for h in &mut holdings {
            h.symbol = normalize_symbol(&h.symbol);
            if !seen.insert(h.symbol.clone()) {
                return Err(StoreError::Constraint(format!(
                    "duplicate symbol {} in portfolio {}",
                    h.symbol, portfolio.id
                )));
            }
        }
        let mut map = self.portfolios.write().await;
        map.insert(portfolio.id, PortfolioEntry { portfolio, holdings });
        Ok(())
    }

    pub async fn put_industry(&self, industry: IndustryWatch) {
        let mut v = self.industries.write().await;
        v.retain(|i| !i.name.eq_ignore_ascii_case(&industry.name));
        v.push(industry);
    }

    /// Unique per (email, portfolio) pair.
    pub async fn subscribe(&self, sub: Subscription) -> Result<(), StoreError> {
        let mut v = self.subscriptions.write().await;
        let dup = v
            .iter()
            .any(|s| s.email.eq_ignore_ascii_case(&sub.email) && s.portfolio_id == sub.portfolio_id);
        if dup {
            return Err(StoreError::Constraint(format!(
                "{} already subscribed to {:?}",
                sub.email, sub.portfolio_id
            )));
        }
        v.push(sub);
        Ok(())
    }

    pub async fn article_count(&self) -> usize {
        self.articles.read().await.len()
    }
}

#[async_trait]
impl PortfolioStore for MemoryStore {
    async fn list_holdings(&self, portfolio_id: PortfolioId) -> Result<Vec<Holding>, StoreError> {
        let map = self.portfolios.read().await;
        Ok(map
            .get(&portfolio_id)
            .map(|e| e.holdings.clone())
            .unwrap_or_default())
    }

    async fn list_public_portfolios(&self, limit: usize) -> Result<Vec<Portfolio>, StoreError> {
        let map = self.portfolios.read().await;
        Ok(map
            .values()
            .filter(|e| e.portfolio.visibility == Visibility::Public)
            .take(limit)
            .map(|e| e.portfolio.clone())
            .collect())
    }

    async fn get_portfolio(&self, id: PortfolioId) -> Result<Option<Portfolio>, StoreError> {
        let map = self.portfolios.read().await;
        Ok(map.get(&id).map(|e| e.portfolio.clone()))
    }

    /// One entry per distinct (symbol, display name) pair, so every name a
    /// portfolio uses for a ticker stays matchable.
    async fn list_all_holdings(&self) -> Result<Vec<Holding>, StoreError> {
        let map = self.portfolios.read().await;
        let mut seen = HashSet::new();
        let mut out = Vec::new();
        for h in map.values().flat_map(|e| e.holdings.iter()) {
            let key = (normalize_symbol(&h.symbol), h.display_name.trim().to_lowercase());
            if seen.insert(key) {
                out.push(h.clone());
            }
        }
        Ok(out)
    }
}

#[async_trait]
impl IndustryStore for MemoryStore {
    async fn list_watched_industries(&self) -> Result<Vec<IndustryWatch>, StoreError> {
        Ok(self.industries.read().await.clone())
    }
}

fn newest_first(v: &mut [Article]) {
    v.sort_by(|a, b| {
        b.ingested_at
            .cmp(&a.ingested_at)
            .then_with(|| b.published_at.cmp(&a.published_at))
    });
}

#[async_trait]
impl NewsStore for MemoryStore {
    async fn exists(&self, url: &str) -> Result<bool, StoreError> {
        Ok(self.articles.read().await.iter().any(|a| a.url == url))
    }

    async fn insert(&self, article: Article) -> Result<(), StoreError> {
        let mut v = self.articles.write().await;
        if v.iter().any(|a| a.url == article.url) {
            return Err(StoreError::Constraint(format!("url {} exists", article.url)));
        }
        debug!(target: "store", url = %article.url, "article inserted");
        v.push(article);
        Ok(())
    }

    async fn query_recent(&self, limit: usize) -> Result<Vec<Article>, StoreError> {
        let mut v = self.articles.read().await.clone();
        newest_first(&mut v);
        v.truncate(limit);
        Ok(v)
    }

    async fn query_by_date_range(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Article>, StoreError> {
        let mut v: Vec<Article> = self
            .articles
            .read()
            .await
            .iter()
            .filter(|a| a.ingested_at >= start && a.ingested_at <= end)
            .cloned()
            .collect();
        newest_first(&mut v);
        Ok(v)
    }

    async fn delete_older_than(&self, cutoff: DateTime<Utc>) -> Result<usize, StoreError> {
        let mut v = self.articles.write().await;
        let before = v.len();
        v.retain(|a| a.ingested_at >= cutoff);
        Ok(before - v.len())
    }
}

#[async_trait]
impl SubscriptionStore for MemoryStore {
    async fn list_active(&self) -> Result<Vec<Subscription>, StoreError> {
        Ok(self
            .subscriptions
            .read()
            .await
            .iter()
            .filter(|s| s.active)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl EmailLogStore for MemoryStore {
    async fn append(&self, entry: EmailLogEntry) -> Result<(), StoreError> {
        self.email_log.write().await.push(entry);
        Ok(())
    }

    async fn list_recent(&self, limit: usize) -> Result<Vec<EmailLogEntry>, StoreError> {
        let v = self.email_log.read().await;
        Ok(v.iter().rev().take(limit).cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use std::collections::BTreeSet;

    fn article(url: &str, ingested_at: DateTime<Utc>) -> Article {
        Article {
            title: format!("title {url}"),
            url: url.to_string(),
            source_name: "test".into(),
            raw_content: None,
            summary: String::new(),
            category: "general".into(),
            related_symbols: BTreeSet::new(),
            sentiment: 0.0,
            published_at: ingested_at,
            ingested_at,
        }
    }

    #[tokio::test]
    async fn insert_rejects_duplicate_url() {
        let store = MemoryStore::new();
        let now = Utc::now();
        store.insert(article("https://a.test/1", now)).await.unwrap();
        let err = store.insert(article("https://a.test/1", now)).await;
        assert!(matches!(err, Err(StoreError::Constraint(_))));
        assert_eq!(store.article_count().await, 1);
    }

    #[tokio::test]
    async fn recent_is_newest_first_and_limited() {
        let store = MemoryStore::new();
        let now = Utc::now();
        for i in 0..5 {
            store
                .insert(article(&format!("https://a.test/{i}"), now - Duration::hours(i)))
                .await
                .unwrap();
        }
        let got = store.query_recent(3).await.unwrap();
        let urls: Vec<&str> = got.iter().map(|a| a.url.as_str()).collect();
        assert_eq!(urls, vec!["https://a.test/0", "https://a.test/1", "https://a.test/2"]);
    }

    #[tokio::test]
    async fn subscription_pair_is_unique() {
        let store = MemoryStore::new();
        let sub = Subscription {
            email: "a@x.test".into(),
            portfolio_id: Some(1),
            active: true,
            created_at: Utc::now(),
        };
        store.subscribe(sub.clone()).await.unwrap();
        let mut other = sub.clone();
        other.email = "A@X.TEST".into();
        assert!(store.subscribe(other).await.is_err());
        let mut general = sub;
        general.portfolio_id = None;
        assert!(store.subscribe(general).await.is_ok());
    }

    #[tokio::test]
    async fn duplicate_symbols_in_portfolio_rejected() {
        let store = MemoryStore::new();
        let p = Portfolio {
            id: 1,
            name: "Tech".into(),
            description: None,
            owner: "o".into(),
            visibility: Visibility::Public,
        };
        let res = store
            .put_portfolio(p, vec![Holding::new("AAPL", "Apple"), Holding::new("aapl", "Apple Inc")])
            .await;
        assert!(res.is_err());
    }

    #[tokio::test]
    async fn all_holdings_keep_each_display_name() {
        let store = MemoryStore::new();
        let p = |id| Portfolio {
            id,
            name: format!("p{id}"),
            description: None,
            owner: "o".into(),
            visibility: Visibility::Private,
        };
        store
            .put_portfolio(p(1), vec![Holding::new("AAPL", "Apple Inc")])
            .await
            .unwrap();
        store
            .put_portfolio(p(2), vec![Holding::new("aapl", "Apple"), Holding::new("MSFT", "Microsoft")])
            .await
            .unwrap();
        store
            .put_portfolio(p(3), vec![Holding::new("AAPL", "apple inc ")])
            .await
            .unwrap();

        let mut pairs: Vec<(String, String)> = store
            .list_all_holdings()
            .await
            .unwrap()
            .into_iter()
            .map(|h| (h.symbol, h.display_name))
            .collect();
        pairs.sort();
        assert_eq!(
            pairs,
            vec![
                ("AAPL".to_string(), "Apple".to_string()),
                ("AAPL".to_string(), "Apple Inc".to_string()),
                ("MSFT".to_string(), "Microsoft".to_string()),
            ]
        );
    }
}
