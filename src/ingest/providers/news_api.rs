// src/ingest/providers/news_api.rs
//! Keyword-search news API (NewsAPI.org `everything` endpoint shape).

use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use reqwest::Client;
use serde::Deserialize;
use std::collections::HashSet;
use std::time::Duration;

use super::{classify_request_error, classify_status};
use crate::config::NewsApiConfig;
use crate::error::{FetchErrorKind, SourceFetchError};
use crate::ingest::normalize_text;
use crate::ingest::types::SourceProvider;
use crate::model::{RawCandidate, SourceKind, Universe};

/// Used when no holdings or industries exist yet.
pub const GENERIC_QUERY_TERMS: &[&str] = &[
    "stock market",
    "earnings",
    "federal reserve",
    "inflation",
    "nasdaq",
    "wall street",
];

/// The API rejects very long queries.
const MAX_QUERY_TERMS: usize = 30;

pub const MAX_LOOKBACK_DAYS: i64 = 365;

#[derive(Debug, Deserialize)]
struct ApiResponse {
    status: String,
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    articles: Vec<ApiArticle>,
}

#[derive(Debug, Deserialize)]
struct ApiArticle {
    #[serde(default)]
    source: Option<ApiSource>,
    title: Option<String>,
    description: Option<String>,
    url: Option<String>,
    #[serde(rename = "publishedAt")]
    published_at: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiSource {
    name: Option<String>,
}

/// OR-query over holding symbols and industry keywords.
pub fn build_query(universe: &Universe) -> String {
    let mut seen = HashSet::new();
    let mut terms: Vec<String> = Vec::new();
    let candidates = universe
        .holdings
        .iter()
        .map(|h| h.symbol.trim())
        .chain(universe.industries.iter().flat_map(|i| i.keyword_list()));
    for t in candidates {
        if !t.is_empty() && seen.insert(t.to_lowercase()) {
            terms.push(t.to_string());
        }
    }
    if terms.is_empty() {
        terms = GENERIC_QUERY_TERMS.iter().map(|s| s.to_string()).collect();
    }
    terms.truncate(MAX_QUERY_TERMS);
    terms
        .iter()
        .map(|t| {
            if t.contains(char::is_whitespace) {
                format!("\"{t}\"")
            } else {
                t.clone()
            }
        })
        .collect::<Vec<_>>()
        .join(" OR ")
}

fn error_kind_for_code(code: Option<&str>) -> FetchErrorKind {
    match code.unwrap_or_default() {
        "rateLimited" | "maximumResultsReached" => FetchErrorKind::RateLimited,
        "apiKeyInvalid" | "apiKeyDisabled" | "apiKeyExhausted" | "apiKeyMissing" => {
            FetchErrorKind::Blocked
        }
        _ => FetchErrorKind::Malformed,
    }
}

pub struct NewsApiProvider {
    name: String,
    endpoint: String,
    api_key: String,
    page_size: u32,
    language: String,
    lookback_days: i64,
    client: Client,
    timeout: Duration,
}

impl NewsApiProvider {
    pub fn new(
        name: &str,
        endpoint: &str,
        api_key: String,
        cfg: &NewsApiConfig,
        client: Client,
        timeout: Duration,
    ) -> Self {
        Self {
            name: name.to_string(),
            endpoint: endpoint.to_string(),
            api_key,
            page_size: cfg.page_size.clamp(1, 100),
            language: cfg.language.clone(),
            lookback_days: cfg.lookback_days.clamp(1, MAX_LOOKBACK_DAYS),
            client,
            timeout,
        }
    }

    pub fn request_url(&self, universe: &Universe, now: DateTime<Utc>) -> String {
        let from = (now - ChronoDuration::days(self.lookback_days)).format("%Y-%m-%d");
        format!(
            "{}?q={}&from={}&sortBy=publishedAt&language={}&pageSize={}",
            self.endpoint,
            urlencoding::encode(&build_query(universe)),
            from,
            urlencoding::encode(&self.language),
            self.page_size
        )
    }

    fn parse_body(&self, body: &str) -> Result<Vec<RawCandidate>, SourceFetchError> {
        let resp: ApiResponse = serde_json::from_str(body).map_err(|e| {
            SourceFetchError::new(&self.name, FetchErrorKind::Malformed, format!("json: {e}"))
        })?;
        if resp.status != "ok" {
            return Err(SourceFetchError::new(
                &self.name,
                error_kind_for_code(resp.code.as_deref()),
                resp.message.unwrap_or_else(|| resp.status.clone()),
            ));
        }

        let mut out = Vec::with_capacity(resp.articles.len());
        for a in resp.articles.into_iter().take(self.page_size as usize) {
            let title = normalize_text(a.title.as_deref().unwrap_or_default());
            let url = a.url.as_deref().map(str::trim).unwrap_or_default();
            if title.is_empty() || url.is_empty() || title == "[Removed]" {
                continue;
            }
            out.push(RawCandidate {
                title,
                url: url.to_string(),
                source: a
                    .source
                    .and_then(|s| s.name)
                    .filter(|n| !n.trim().is_empty())
                    .unwrap_or_else(|| self.name.clone()),
                description: a
                    .description
                    .as_deref()
                    .map(normalize_text)
                    .filter(|d| !d.is_empty()),
                published_at: a
                    .published_at
                    .as_deref()
                    .and_then(|p| DateTime::parse_from_rfc3339(p).ok())
                    .map(|d| d.with_timezone(&Utc)),
            });
        }
        Ok(out)
    }
}

#[async_trait]
impl SourceProvider for NewsApiProvider {
    async fn fetch(&self, universe: &Universe) -> Result<Vec<RawCandidate>, SourceFetchError> {
        let url = self.request_url(universe, Utc::now());
        let resp = self
            .client
            .get(&url)
            .header("X-Api-Key", &self.api_key)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| classify_request_error(&self.name, &e))?;
        let status = resp.status();
        let body = resp
            .text()
            .await
            .map_err(|e| classify_request_error(&self.name, &e))?;

        if let Some(status_err) = classify_status(&self.name, status) {
            // the body usually carries a more precise code than the status
            return match self.parse_body(&body) {
                Err(e) if e.kind != FetchErrorKind::Malformed => Err(e),
                _ => Err(status_err),
            };
        }
        self.parse_body(&body)
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> SourceKind {
        SourceKind::Api
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Holding, IndustryWatch};

    fn provider() -> NewsApiProvider {
        NewsApiProvider::new(
            "NewsAPI",
            "https://api.test/v2/everything",
            "k".into(),
            &NewsApiConfig::default(),
            Client::new(),
            Duration::from_secs(1),
        )
    }

    #[test]
    fn query_uses_symbols_and_keywords() {
        let u = Universe {
            holdings: vec![Holding::new("AAPL", "Apple"), Holding::new("aapl", "Apple")],
            industries: vec![IndustryWatch::new("Energy", "oil, natural gas")],
        };
        assert_eq!(build_query(&u), "AAPL OR oil OR \"natural gas\"");
    }

    #[test]
    fn huge_lookback_is_capped() {
        let cfg = NewsApiConfig {
            lookback_days: i64::MAX,
            ..NewsApiConfig::default()
        };
        let p = NewsApiProvider::new(
            "NewsAPI",
            "https://api.test/v2/everything",
            "k".into(),
            &cfg,
            Client::new(),
            Duration::from_secs(1),
        );
        let now = DateTime::parse_from_rfc3339("2025-06-10T12:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        assert!(p.request_url(&Universe::default(), now).contains("from=2024-06-10"));
    }

    #[test]
    fn empty_universe_falls_back_to_generic_terms() {
        let q = build_query(&Universe::default());
        assert!(q.starts_with("\"stock market\" OR earnings"));
    }

    #[test]
    fn request_url_restricts_to_lookback_window() {
        let now = DateTime::parse_from_rfc3339("2025-06-10T12:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let url = provider().request_url(&Universe::default(), now);
        assert!(url.contains("from=2025-06-03"), "{url}");
        assert!(url.contains("pageSize=50"));
    }

    #[test]
    fn error_body_maps_codes() {
        let p = provider();
        let err = p
            .parse_body(r#"{"status":"error","code":"rateLimited","message":"slow down"}"#)
            .unwrap_err();
        assert_eq!(err.kind, FetchErrorKind::RateLimited);
        let err = p
            .parse_body(r#"{"status":"error","code":"apiKeyInvalid"}"#)
            .unwrap_err();
        assert_eq!(err.kind, FetchErrorKind::Blocked);
    }

    #[test]
    fn removed_articles_are_skipped() {
        let body = r#"{"status":"ok","articles":[
            {"source":{"name":"Reuters"},"title":"Nvidia beats","url":"https://n.test/1","publishedAt":"2025-06-10T10:00:00Z"},
            {"source":{"name":null},"title":"[Removed]","url":"https://removed.com"}
        ]}"#;
        let items = provider().parse_body(body).unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].source, "Reuters");
        assert!(items[0].published_at.is_some());
    }
}
