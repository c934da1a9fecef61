// src/model.rs
//! Domain records shared by ingestion, reporting and distribution.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

pub type PortfolioId = i64;

/// How a source is fetched. Also the tier it belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Rss,
    Api,
    Scrape,
}

impl SourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::Rss => "rss",
            SourceKind::Api => "api",
            SourceKind::Scrape => "scrape",
        }
    }
}

/// Static source registry entry (never persisted).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Source {
    pub name: String,
    pub kind: SourceKind,
    pub endpoint: String,
    /// Lower runs earlier.
    pub tier: u8,
    /// Ordered CSS selectors; scrape sources only.
    #[serde(default)]
    pub selectors: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    Public,
    #[default]
    Private,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Portfolio {
    pub id: PortfolioId,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub owner: String,
    #[serde(default)]
    pub visibility: Visibility,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Holding {
    pub symbol: String,
    pub display_name: String,
    #[serde(default)]
    pub sector: Option<String>,
}

/// Ticker form used for storage, tagging and comparison.
pub fn normalize_symbol(symbol: &str) -> String {
    symbol.trim().to_ascii_uppercase()
}

impl Holding {
    pub fn new(symbol: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            display_name: display_name.into(),
            sector: None,
        }
    }
}

/// Watched industry; `keywords` is the comma-joined form kept by the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndustryWatch {
    pub name: String,
    #[serde(default)]
    pub keywords: String,
}

impl IndustryWatch {
    pub fn new(name: impl Into<String>, keywords: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            keywords: keywords.into(),
        }
    }

    /// Trimmed, non-empty keywords.
    pub fn keyword_list(&self) -> impl Iterator<Item = &str> + '_ {
        self.keywords
            .split(',')
            .map(str::trim)
            .filter(|k| !k.is_empty())
    }
}

/// Portfolio holdings and watched industries at the moment of a run.
#[derive(Debug, Clone, Default)]
pub struct Universe {
    pub holdings: Vec<Holding>,
    pub industries: Vec<IndustryWatch>,
}

impl Universe {
    pub fn is_empty(&self) -> bool {
        self.holdings.is_empty() && self.industries.is_empty()
    }
}

/// What a fetcher returns before filtering and enrichment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawCandidate {
    pub title: String,
    pub url: String,
    pub source: String,
    pub description: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Article {
    pub title: String,
    /// Unique key.
    pub url: String,
    pub source_name: String,
    pub raw_content: Option<String>,
    pub summary: String,
    pub category: String,
    pub related_symbols: BTreeSet<String>,
    /// In `[-1.0, 1.0]`.
    pub sentiment: f32,
    pub published_at: DateTime<Utc>,
    pub ingested_at: DateTime<Utc>,
}

impl Article {
    /// Symbol comparison ignores case and surrounding whitespace.
    pub fn mentions_any<'a, I>(&self, symbols: I) -> bool
    where
        I: IntoIterator<Item = &'a str>,
    {
        symbols.into_iter().any(|s| {
            let s = s.trim();
            self.related_symbols
                .iter()
                .any(|r| r.trim().eq_ignore_ascii_case(s))
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subscription {
    pub email: String,
    /// `None` means the general digest.
    #[serde(default)]
    pub portfolio_id: Option<PortfolioId>,
    #[serde(default = "default_active")]
    pub active: bool,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
}

fn default_active() -> bool {
    true
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmailStatus {
    Sent,
    Failed,
    Pending,
}

/// Append-only audit record of one send attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmailLogEntry {
    pub recipient: String,
    pub subject: String,
    pub status: EmailStatus,
    pub error_message: Option<String>,
    pub sent_at: DateTime<Utc>,
}
