// src/enrich/mod.rs
//! Best-effort enrichment of relevant candidates: body text, summary,
//! sentiment, category and symbol tags. Every step degrades on its own; an
//! enrichment never fails as a whole.

pub mod ai;

use once_cell::sync::OnceCell;
use regex::Regex;
use reqwest::Client;
use scraper::{Html, Selector};
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use crate::ingest::providers::{fetch_text, BROWSER_USER_AGENT};
use crate::ingest::{normalize_text, truncate_chars};
use crate::model::{RawCandidate, Universe};
use crate::relevance::Classifier;
pub use ai::{build_ai_backend, AiBackend};

pub const CONTENT_MAX_CHARS: usize = 2000;
pub const FALLBACK_SUMMARY_CHARS: usize = 200;

/// Tried in order; the first container with text wins.
pub const CONTENT_SELECTORS: &[&str] = &[
    "article",
    ".article-content",
    ".article-body",
    ".post-content",
    ".entry-content",
    "main",
    "#content",
];

#[derive(Debug, Clone, PartialEq)]
pub struct Enrichment {
    pub content: Option<String>,
    pub summary: String,
    /// In `[-1.0, 1.0]`.
    pub sentiment: f32,
    pub category: String,
    pub related_symbols: BTreeSet<String>,
}

pub struct Enricher {
    classifier: Arc<dyn Classifier>,
    ai: Option<Arc<dyn AiBackend>>,
    /// `None` disables body extraction.
    http: Option<Client>,
    content_timeout: Duration,
    locale: String,
}

impl Enricher {
    pub fn new(classifier: Arc<dyn Classifier>, ai: Option<Arc<dyn AiBackend>>) -> Self {
        Self {
            classifier,
            ai,
            http: None,
            content_timeout: Duration::from_secs(8),
            locale: "en".to_string(),
        }
    }

    pub fn with_content_fetch(mut self, client: Client, timeout: Duration) -> Self {
        self.http = Some(client);
        self.content_timeout = timeout;
        self
    }

    pub fn with_locale(mut self, locale: impl Into<String>) -> Self {
        self.locale = locale.into();
        self
    }

    pub async fn enrich(&self, candidate: &RawCandidate, universe: &Universe) -> Enrichment {
        let content = self.extract_content(&candidate.url).await;

        let basis = content
            .as_deref()
            .or(candidate.description.as_deref())
            .unwrap_or(&candidate.title);
        let summary = self.summarize(basis).await;

        let sentiment_text = match candidate.description.as_deref() {
            Some(d) => format!("{}. {}", candidate.title, d),
            None => candidate.title.clone(),
        };
        let sentiment = self.score_sentiment(&sentiment_text).await;

        let category = self.classifier.categorize(&candidate.title, &universe.industries);
        let tag_text = match content.as_deref() {
            Some(c) => format!("{} {}", candidate.title, c),
            None => candidate.title.clone(),
        };
        let related_symbols = self.classifier.tag_symbols(&tag_text, &universe.holdings);

        Enrichment {
            content,
            summary,
            sentiment,
            category,
            related_symbols,
        }
    }

    /// Fetch the article page and pull its body text. Any failure is `None`.
    pub async fn extract_content(&self, url: &str) -> Option<String> {
        let client = self.http.as_ref()?;
        match fetch_text(client, "content", url, self.content_timeout, Some(BROWSER_USER_AGENT)).await {
            Ok(html) => extract_article_text(&html),
            Err(e) => {
                debug!(target: "enrich", url, kind = %e.kind, "content fetch failed");
                None
            }
        }
    }

    pub async fn summarize(&self, text: &str) -> String {
        if let Some(ai) = &self.ai {
            match ai.summarize(text, &self.locale).await {
                Ok(s) if !s.trim().is_empty() => return s,
                Ok(_) => {}
                Err(e) => debug!(target: "enrich", error = %e, "AI summary unavailable"),
            }
        }
        fallback_summary(text)
    }

    pub async fn score_sentiment(&self, text: &str) -> f32 {
        let Some(ai) = &self.ai else { return 0.0 };
        match ai.score_sentiment(text).await {
            Ok(raw) => parse_sentiment(&raw),
            Err(e) => {
                debug!(target: "enrich", error = %e, "AI sentiment unavailable");
                0.0
            }
        }
    }
}

/// Paragraph text of the first non-empty content container, capped at
/// [`CONTENT_MAX_CHARS`].
pub fn extract_article_text(html: &str) -> Option<String> {
    let doc = Html::parse_document(html);
    let paragraph = Selector::parse("p").ok()?;
    for css in CONTENT_SELECTORS {
        let Ok(sel) = Selector::parse(css) else { continue };
        for container in doc.select(&sel) {
            let paras: Vec<String> = container
                .select(&paragraph)
                .map(|p| normalize_text(&p.text().collect::<String>()))
                .filter(|t| !t.is_empty())
                .collect();
            let text = if paras.is_empty() {
                normalize_text(&container.text().collect::<Vec<_>>().join(" "))
            } else {
                paras.join(" ")
            };
            if !text.is_empty() {
                return Some(truncate_chars(&text, CONTENT_MAX_CHARS));
            }
        }
    }
    None
}

/// First 200 characters, with an ellipsis when something was cut.
pub fn fallback_summary(text: &str) -> String {
    let text = text.trim();
    if text.chars().count() <= FALLBACK_SUMMARY_CHARS {
        return text.to_string();
    }
    format!("{}...", truncate_chars(text, FALLBACK_SUMMARY_CHARS))
}

/// First number in the answer, clamped to `[-1, 1]`; anything else is neutral.
pub fn parse_sentiment(raw: &str) -> f32 {
    static RE_NUM: OnceCell<Regex> = OnceCell::new();
    let re = RE_NUM.get_or_init(|| Regex::new(r"-?\d+(?:\.\d+)?").unwrap());
    re.find(raw)
        .and_then(|m| m.as_str().parse::<f32>().ok())
        .filter(|v| v.is_finite())
        .map(|v| v.clamp(-1.0, 1.0))
        .unwrap_or(0.0)
}
