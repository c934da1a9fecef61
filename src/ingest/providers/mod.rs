// src/ingest/providers/mod.rs
//! Source fetchers plus the HTTP plumbing they share: request timeouts and the
//! mapping from transport/status failures to [`FetchErrorKind`].

pub mod news_api;
pub mod rss;
pub mod scrape;

use reqwest::{Client, StatusCode};
use std::time::Duration;

use crate::config::{AppConfig, NewsApiConfig};
use crate::error::{FetchErrorKind, SourceFetchError};
use crate::ingest::types::SourceProvider;
use crate::model::{Source, SourceKind};

pub use news_api::NewsApiProvider;
pub use rss::RssProvider;
pub use scrape::ScrapeProvider;

/// Sent by scrape sources, which tend to refuse obvious bots.
pub const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/126.0.0.0 Safari/537.36";

pub const BOT_USER_AGENT: &str = concat!(
    "portfolio-news-digest/",
    env!("CARGO_PKG_VERSION"),
    " (+rss reader)"
);

/// Shared outbound client. Per-request timeouts are set by each provider.
pub fn http_client() -> reqwest::Result<Client> {
    Client::builder()
        .user_agent(BOT_USER_AGENT)
        .connect_timeout(Duration::from_secs(4))
        .build()
}

pub fn classify_request_error(source: &str, err: &reqwest::Error) -> SourceFetchError {
    let kind = if err.is_timeout() {
        FetchErrorKind::Timeout
    } else if err.is_connect() {
        // DNS failures and refused connections both land here
        FetchErrorKind::NotFound
    } else if err.is_decode() || err.is_body() {
        FetchErrorKind::Malformed
    } else if let Some(status) = err.status() {
        return classify_status(source, status)
            .unwrap_or_else(|| SourceFetchError::new(source, FetchErrorKind::Blocked, err.to_string()));
    } else {
        FetchErrorKind::Timeout
    };
    SourceFetchError::new(source, kind, err.to_string())
}

/// `None` for non-error statuses.
pub fn classify_status(source: &str, status: StatusCode) -> Option<SourceFetchError> {
    if status.as_u16() < 400 {
        return None;
    }
    let kind = match status {
        StatusCode::NOT_FOUND | StatusCode::GONE => FetchErrorKind::NotFound,
        StatusCode::TOO_MANY_REQUESTS => FetchErrorKind::RateLimited,
        s if s.is_server_error() => FetchErrorKind::Timeout,
        _ => FetchErrorKind::Blocked,
    };
    Some(SourceFetchError::new(source, kind, format!("HTTP {status}")))
}

/// GET `url` as text, enforcing `timeout` and classifying failures.
pub async fn fetch_text(
    client: &Client,
    source: &str,
    url: &str,
    timeout: Duration,
    user_agent: Option<&str>,
) -> Result<String, SourceFetchError> {
    let mut req = client.get(url).timeout(timeout);
    if let Some(ua) = user_agent {
        req = req.header(reqwest::header::USER_AGENT, ua);
    }
    let resp = req
        .send()
        .await
        .map_err(|e| classify_request_error(source, &e))?;
    if let Some(err) = classify_status(source, resp.status()) {
        return Err(err);
    }
    resp.text()
        .await
        .map_err(|e| classify_request_error(source, &e))
}

/// Everything a provider needs besides its own [`Source`] entry.
#[derive(Clone)]
pub struct ProviderSettings {
    pub client: Client,
    pub rss_timeout: Duration,
    pub api_timeout: Duration,
    pub scrape_timeout: Duration,
    pub item_cap: usize,
    pub news_api: NewsApiConfig,
}

impl ProviderSettings {
    pub fn from_config(cfg: &AppConfig, client: Client) -> Self {
        let mut news_api = cfg.news_api.clone();
        news_api.api_key = cfg.news_api_key().map(str::to_string);
        Self {
            client,
            rss_timeout: Duration::from_secs(cfg.ingest.rss_timeout_secs),
            api_timeout: Duration::from_secs(cfg.ingest.api_timeout_secs),
            scrape_timeout: Duration::from_secs(cfg.ingest.scrape_timeout_secs),
            item_cap: cfg.ingest.rss_item_cap,
            news_api,
        }
    }
}

/// `None` for API sources when no key is configured.
pub fn build_provider(source: &Source, settings: &ProviderSettings) -> Option<Box<dyn SourceProvider>> {
    match source.kind {
        SourceKind::Rss => Some(Box::new(RssProvider::from_url(
            &source.name,
            &source.endpoint,
            settings.client.clone(),
            settings.rss_timeout,
            settings.item_cap,
        ))),
        SourceKind::Api => {
            let key = settings.news_api.api_key.clone()?;
            Some(Box::new(NewsApiProvider::new(
                &source.name,
                &source.endpoint,
                key,
                &settings.news_api,
                settings.client.clone(),
                settings.api_timeout,
            )))
        }
        SourceKind::Scrape => Some(Box::new(ScrapeProvider::new(
            &source.name,
            &source.endpoint,
            source.selectors.clone(),
            settings.client.clone(),
            settings.scrape_timeout,
            settings.item_cap,
        ))),
    }
}
