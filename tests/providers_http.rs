// tests/providers_http.rs
//
// Source providers and content extraction against a local wiremock server.

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use portfolio_news_digest::config::NewsApiConfig;
use portfolio_news_digest::enrich::Enricher;
use portfolio_news_digest::error::FetchErrorKind;
use portfolio_news_digest::ingest::providers::{
    NewsApiProvider, RssProvider, ScrapeProvider, BROWSER_USER_AGENT,
};
use portfolio_news_digest::ingest::types::SourceProvider;
use portfolio_news_digest::model::{Holding, IndustryWatch, Universe};
use portfolio_news_digest::relevance::KeywordClassifier;

const RSS: &str = include_str!("fixtures/markets_rss.xml");
const LISTING: &str = include_str!("fixtures/listing.html");
const ARTICLE: &str = include_str!("fixtures/article.html");

fn client() -> reqwest::Client {
    reqwest::Client::new()
}

fn rss(url: &str, timeout: Duration) -> RssProvider {
    RssProvider::from_url("Markets", url, client(), timeout, 20)
}

async fn serve(server: &MockServer, at: &str, resp: ResponseTemplate) {
    Mock::given(method("GET"))
        .and(path(at))
        .respond_with(resp)
        .mount(server)
        .await;
}

#[tokio::test]
async fn rss_feed_is_fetched_and_parsed() {
    let server = MockServer::start().await;
    serve(&server, "/rss", ResponseTemplate::new(200).set_body_string(RSS)).await;

    let items = rss(&format!("{}/rss", server.uri()), Duration::from_secs(5))
        .fetch(&Universe::default())
        .await
        .unwrap();
    assert_eq!(items.len(), 3);
    assert_eq!(items[0].title, "Apple Inc reports record earnings");
    assert_eq!(
        items[0].description.as_deref(),
        Some("Revenue beat expectations on services growth.")
    );
    assert_eq!(items[2].description.as_deref(), Some("Policy makers signal patience..."));
    assert!(items.iter().all(|c| c.source == "Markets" && c.published_at.is_some()));
}

#[tokio::test]
async fn rss_http_failures_are_classified() {
    let server = MockServer::start().await;
    serve(&server, "/gone", ResponseTemplate::new(404)).await;
    serve(&server, "/busy", ResponseTemplate::new(429)).await;
    serve(&server, "/down", ResponseTemplate::new(503)).await;
    serve(&server, "/forbidden", ResponseTemplate::new(403)).await;
    serve(
        &server,
        "/html",
        ResponseTemplate::new(200).set_body_string("<html><body>maintenance"),
    )
    .await;

    let cases = [
        ("/gone", FetchErrorKind::NotFound),
        ("/busy", FetchErrorKind::RateLimited),
        ("/down", FetchErrorKind::Timeout),
        ("/forbidden", FetchErrorKind::Blocked),
        ("/html", FetchErrorKind::Malformed),
    ];
    for (p, want) in cases {
        let err = rss(&format!("{}{p}", server.uri()), Duration::from_secs(5))
            .fetch(&Universe::default())
            .await
            .unwrap_err();
        assert_eq!(err.kind, want, "path {p}");
        assert_eq!(err.source_name, "Markets");
    }
}

#[tokio::test]
async fn slow_feed_times_out() {
    let server = MockServer::start().await;
    serve(
        &server,
        "/slow",
        ResponseTemplate::new(200)
            .set_body_string(RSS)
            .set_delay(Duration::from_secs(3)),
    )
    .await;

    let err = rss(&format!("{}/slow", server.uri()), Duration::from_millis(200))
        .fetch(&Universe::default())
        .await
        .unwrap_err();
    assert_eq!(err.kind, FetchErrorKind::Timeout);
}

#[tokio::test]
async fn refused_connection_is_not_found() {
    let err = rss("http://127.0.0.1:1/rss", Duration::from_secs(2))
        .fetch(&Universe::default())
        .await
        .unwrap_err();
    assert_eq!(err.kind, FetchErrorKind::NotFound);
}

#[tokio::test]
async fn scrape_sends_browser_agent_and_resolves_links() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/markets/"))
        .and(header("user-agent", BROWSER_USER_AGENT))
        .respond_with(ResponseTemplate::new(200).set_body_string(LISTING))
        .mount(&server)
        .await;

    let page = format!("{}/markets/", server.uri());
    let scraper = ScrapeProvider::new(
        "Listing",
        &page,
        vec!["div.story-card h3".into()],
        client(),
        Duration::from_secs(5),
        20,
    );
    let items = scraper.fetch(&Universe::default()).await.unwrap();
    let urls: Vec<String> = items.iter().map(|c| c.url.clone()).collect();
    assert_eq!(
        urls,
        vec![
            format!("{}/markets/nvidia-chip-demand-2025-06-10/", server.uri()),
            format!("{}/markets/article/oil-prices-slide", server.uri()),
            "https://other.test/world/storm".to_string(),
        ]
    );
    assert_eq!(items[0].title, "Nvidia rallies as chip demand stays strong");
}

#[tokio::test]
async fn scrape_without_matches_is_malformed() {
    let server = MockServer::start().await;
    serve(&server, "/markets/", ResponseTemplate::new(200).set_body_string(LISTING)).await;

    let scraper = ScrapeProvider::new(
        "Listing",
        &format!("{}/markets/", server.uri()),
        vec!["li.stream-item h3".into()],
        client(),
        Duration::from_secs(5),
        20,
    );
    let err = scraper.fetch(&Universe::default()).await.unwrap_err();
    assert_eq!(err.kind, FetchErrorKind::Malformed);
}

fn news_api(server: &MockServer) -> NewsApiProvider {
    NewsApiProvider::new(
        "NewsAPI",
        &format!("{}/v2/everything", server.uri()),
        "test-key".into(),
        &NewsApiConfig::default(),
        client(),
        Duration::from_secs(5),
    )
}

fn universe() -> Universe {
    Universe {
        holdings: vec![Holding::new("AAPL", "Apple Inc")],
        industries: vec![IndustryWatch::new("Semiconductors", "chip, wafer fab")],
    }
}

#[tokio::test]
async fn news_api_sends_key_and_keyword_query() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v2/everything"))
        .and(header("X-Api-Key", "test-key"))
        .and(query_param("q", "AAPL OR chip OR \"wafer fab\""))
        .and(query_param("sortBy", "publishedAt"))
        .and(query_param("language", "en"))
        .and(query_param("pageSize", "50"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "ok",
            "totalResults": 2,
            "articles": [
                {
                    "source": {"id": null, "name": "Wire"},
                    "title": "Apple Inc expands chip team",
                    "description": "Hiring in Munich.",
                    "url": "https://wire.test/apple-chips",
                    "publishedAt": "2025-06-10T12:00:00Z"
                },
                {
                    "source": {"id": null, "name": "[Removed]"},
                    "title": "[Removed]",
                    "url": "https://removed.com"
                }
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let items = news_api(&server).fetch(&universe()).await.unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].source, "Wire");
    assert_eq!(items[0].description.as_deref(), Some("Hiring in Munich."));
    assert!(items[0].published_at.is_some());
}

#[tokio::test]
async fn news_api_error_codes_win_over_status() {
    let server = MockServer::start().await;
    let error_body = |code: &str| {
        json!({"status": "error", "code": code, "message": "nope"})
    };
    Mock::given(method("GET"))
        .and(path("/v2/everything"))
        .respond_with(ResponseTemplate::new(429).set_body_json(error_body("rateLimited")))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v2/everything"))
        .respond_with(ResponseTemplate::new(401).set_body_json(error_body("apiKeyInvalid")))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v2/everything"))
        .respond_with(ResponseTemplate::new(502).set_body_string("bad gateway"))
        .mount(&server)
        .await;

    let api = news_api(&server);
    let kinds = [
        api.fetch(&universe()).await.unwrap_err().kind,
        api.fetch(&universe()).await.unwrap_err().kind,
        api.fetch(&universe()).await.unwrap_err().kind,
    ];
    assert_eq!(
        kinds,
        [
            FetchErrorKind::RateLimited,
            FetchErrorKind::Blocked,
            FetchErrorKind::Timeout
        ]
    );
}

#[tokio::test]
async fn article_body_is_extracted_from_content_container() {
    let server = MockServer::start().await;
    serve(&server, "/story", ResponseTemplate::new(200).set_body_string(ARTICLE)).await;
    serve(&server, "/missing", ResponseTemplate::new(404)).await;

    let enricher = Enricher::new(Arc::new(KeywordClassifier::new()), None)
        .with_content_fetch(client(), Duration::from_secs(5));

    let body = enricher
        .extract_content(&format!("{}/story", server.uri()))
        .await
        .unwrap();
    assert!(body.starts_with("Apple Inc posted record quarterly revenue"));
    assert!(body.contains("Microsoft shares were flat"));
    assert!(!body.contains("newsletter"));

    assert!(enricher
        .extract_content(&format!("{}/missing", server.uri()))
        .await
        .is_none());
}

#[tokio::test]
async fn openai_backend_caches_and_enforces_daily_limit() {
    use portfolio_news_digest::enrich::ai::{CachingBackend, OpenAiProvider};
    use portfolio_news_digest::enrich::AiBackend;
    use portfolio_news_digest::error::AiError;

    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(header("authorization", "Bearer sk-test"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{"message": {"role": "assistant", "content": " 0.42 "}}]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let provider = OpenAiProvider::new(
        "sk-test".into(),
        "gpt-4o-mini",
        &format!("{}/v1", server.uri()),
        Duration::from_secs(5),
    )
    .unwrap();
    let backend = CachingBackend::new(provider, dir.path().to_path_buf(), 1);

    assert_eq!(backend.score_sentiment("Apple beats").await.unwrap().trim(), "0.42");
    // identical prompt is served from disk
    assert_eq!(backend.score_sentiment("Apple beats").await.unwrap().trim(), "0.42");
    assert_eq!(backend.calls_today(), 1);
    assert!(matches!(
        backend.score_sentiment("Apple misses").await,
        Err(AiError::DailyLimit(1))
    ));
    assert_eq!(backend.provider_name(), "openai");
}
