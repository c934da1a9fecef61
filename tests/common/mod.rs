// tests/common/mod.rs
// Shared fakes for the integration tests. Not every test binary uses every helper.
#![allow(dead_code)]

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use portfolio_news_digest::enrich::{AiBackend, Enricher};
use portfolio_news_digest::error::{AiError, FetchErrorKind, MailError, SourceFetchError, StoreError};
use portfolio_news_digest::ingest::types::SourceProvider;
use portfolio_news_digest::ingest::ArticlePipeline;
use portfolio_news_digest::model::{
    Article, Holding, Portfolio, PortfolioId, RawCandidate, SourceKind, Subscription, Universe,
    Visibility,
};
use portfolio_news_digest::notify::{DeliveryResult, MailTransport, OutgoingMail};
use portfolio_news_digest::persist::Persister;
use portfolio_news_digest::relevance::{Classifier, KeywordClassifier};
use portfolio_news_digest::store::{MemoryStore, NewsStore};

pub fn candidate(title: &str, url: &str) -> RawCandidate {
    RawCandidate {
        title: title.to_string(),
        url: url.to_string(),
        source: "Stub".to_string(),
        description: None,
        published_at: None,
    }
}

pub fn article(url: &str, symbols: &[&str], category: &str, sentiment: f32, ingested_at: DateTime<Utc>) -> Article {
    Article {
        title: format!("Story at {url}"),
        url: url.to_string(),
        source_name: "Stub".to_string(),
        raw_content: None,
        summary: "summary".to_string(),
        category: category.to_string(),
        related_symbols: symbols.iter().map(|s| s.to_string()).collect::<BTreeSet<_>>(),
        sentiment,
        published_at: ingested_at,
        ingested_at,
    }
}

pub fn portfolio(id: PortfolioId, name: &str, visibility: Visibility) -> Portfolio {
    Portfolio {
        id,
        name: name.to_string(),
        description: None,
        owner: "owner".to_string(),
        visibility,
    }
}

pub fn subscription(email: &str, portfolio_id: Option<PortfolioId>) -> Subscription {
    Subscription {
        email: email.to_string(),
        portfolio_id,
        active: true,
        created_at: Utc::now(),
    }
}

pub async fn store_with_apple() -> Arc<MemoryStore> {
    let store = Arc::new(MemoryStore::new());
    store
        .put_portfolio(
            portfolio(1, "Tech", Visibility::Public),
            vec![Holding::new("AAPL", "Apple Inc")],
        )
        .await
        .unwrap();
    store
}

/// Pipeline without content fetching or AI.
pub fn offline_pipeline(news: Arc<dyn NewsStore>) -> ArticlePipeline {
    let classifier: Arc<dyn Classifier> = Arc::new(KeywordClassifier::new());
    let enricher = Enricher::new(classifier.clone(), None);
    ArticlePipeline::new(classifier, enricher, Persister::new(news))
}

/// Provider returning a fixed result and counting calls.
pub struct StubProvider {
    pub name: String,
    pub kind: SourceKind,
    pub result: Result<Vec<RawCandidate>, FetchErrorKind>,
    pub calls: Arc<AtomicUsize>,
}

impl StubProvider {
    pub fn ok(name: &str, kind: SourceKind, items: Vec<RawCandidate>) -> Self {
        Self {
            name: name.to_string(),
            kind,
            result: Ok(items),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn failing(name: &str, kind: SourceKind, err: FetchErrorKind) -> Self {
        Self {
            name: name.to_string(),
            kind,
            result: Err(err),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn counter(&self) -> Arc<AtomicUsize> {
        self.calls.clone()
    }
}

#[async_trait]
impl SourceProvider for StubProvider {
    async fn fetch(&self, _universe: &Universe) -> Result<Vec<RawCandidate>, SourceFetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.result {
            Ok(items) => Ok(items.clone()),
            Err(kind) => Err(SourceFetchError::new(&self.name, *kind, "stubbed failure")),
        }
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> SourceKind {
        self.kind
    }
}

/// AI backend answering with fixed strings.
pub struct FixedAi {
    pub summary: Result<String, ()>,
    pub sentiment: Result<String, ()>,
    pub calls: Arc<AtomicUsize>,
}

impl FixedAi {
    pub fn sentiment(raw: &str) -> Self {
        Self {
            summary: Ok("AI summary".to_string()),
            sentiment: Ok(raw.to_string()),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn broken() -> Self {
        Self {
            summary: Err(()),
            sentiment: Err(()),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }
}

#[async_trait]
impl AiBackend for FixedAi {
    async fn summarize(&self, _text: &str, _locale: &str) -> Result<String, AiError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.summary.clone().map_err(|_| AiError::Status(500))
    }

    async fn score_sentiment(&self, _text: &str) -> Result<String, AiError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.sentiment.clone().map_err(|_| AiError::Http("connection refused".into()))
    }

    fn provider_name(&self) -> &str {
        "fixed"
    }
}

/// Records every mail; addresses listed in `reject` fail.
#[derive(Default)]
pub struct RecordingTransport {
    pub sent: Mutex<Vec<OutgoingMail>>,
    pub reject: Vec<String>,
}

impl RecordingTransport {
    pub fn rejecting(addrs: &[&str]) -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            reject: addrs.iter().map(|s| s.to_string()).collect(),
        }
    }

    pub fn sent(&self) -> Vec<OutgoingMail> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl MailTransport for RecordingTransport {
    async fn send(&self, mail: &OutgoingMail) -> Result<DeliveryResult, MailError> {
        if self.reject.contains(&mail.to) {
            return Err(MailError::Transport("550 mailbox unavailable".into()));
        }
        self.sent.lock().unwrap().push(mail.clone());
        Ok(DeliveryResult::default())
    }

    fn name(&self) -> &'static str {
        "recording"
    }
}

/// News store that counts reads and can be switched to fail.
pub struct CountingNewsStore {
    pub inner: Arc<MemoryStore>,
    pub reads: AtomicUsize,
    pub fail_reads: bool,
    pub fail_range_reads: bool,
}

impl CountingNewsStore {
    pub fn new(inner: Arc<MemoryStore>) -> Self {
        Self {
            inner,
            reads: AtomicUsize::new(0),
            fail_reads: false,
            fail_range_reads: false,
        }
    }

    /// `query_recent` works, every date-range query fails.
    pub fn failing_ranges(inner: Arc<MemoryStore>) -> Self {
        Self {
            fail_range_reads: true,
            ..Self::new(inner)
        }
    }

    pub fn failing(inner: Arc<MemoryStore>) -> Self {
        Self {
            fail_reads: true,
            ..Self::new(inner)
        }
    }

    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    fn read(&self) -> Result<(), StoreError> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        if self.fail_reads {
            Err(StoreError::Unavailable("connection refused".into()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl NewsStore for CountingNewsStore {
    async fn exists(&self, url: &str) -> Result<bool, StoreError> {
        self.inner.exists(url).await
    }

    async fn insert(&self, article: Article) -> Result<(), StoreError> {
        self.inner.insert(article).await
    }

    async fn query_recent(&self, limit: usize) -> Result<Vec<Article>, StoreError> {
        self.read()?;
        self.inner.query_recent(limit).await
    }

    async fn query_by_date_range(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Article>, StoreError> {
        self.read()?;
        if self.fail_range_reads {
            return Err(StoreError::Unavailable("range scan timed out".into()));
        }
        self.inner.query_by_date_range(start, end).await
    }

    async fn delete_older_than(&self, cutoff: DateTime<Utc>) -> Result<usize, StoreError> {
        self.inner.delete_older_than(cutoff).await
    }
}
