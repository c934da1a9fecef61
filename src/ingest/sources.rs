// src/ingest/sources.rs
//! Built-in source registry, used when the config lists no `[[sources]]`.

use crate::model::{Source, SourceKind};

fn source(name: &str, kind: SourceKind, endpoint: &str, tier: u8, selectors: &[&str]) -> Source {
    Source {
        name: name.to_string(),
        kind,
        endpoint: endpoint.to_string(),
        tier,
        selectors: selectors.iter().map(|s| s.to_string()).collect(),
    }
}

pub fn default_sources() -> Vec<Source> {
    vec![
        source(
            "Yahoo Finance",
            SourceKind::Rss,
            "https://finance.yahoo.com/news/rssindex",
            0,
            &[],
        ),
        source(
            "CNBC Top News",
            SourceKind::Rss,
            "https://search.cnbc.com/rs/search/combinedcms/view.xml?partnerId=wrss01&id=100003114",
            0,
            &[],
        ),
        source(
            "MarketWatch",
            SourceKind::Rss,
            "https://feeds.content.dowjones.io/public/rss/mw_topstories",
            0,
            &[],
        ),
        source(
            "Investing.com",
            SourceKind::Rss,
            "https://www.investing.com/rss/news_25.rss",
            1,
            &[],
        ),
        source(
            "NewsAPI",
            SourceKind::Api,
            "https://newsapi.org/v2/everything",
            2,
            &[],
        ),
        source(
            "Reuters Markets",
            SourceKind::Scrape,
            "https://www.reuters.com/markets/",
            3,
            &["a[data-testid='Heading']", "h3 a", "article a"],
        ),
        source(
            "Yahoo Finance Latest",
            SourceKind::Scrape,
            "https://finance.yahoo.com/topic/latest-news/",
            3,
            &["li.stream-item h3", "h3 a", "a.subtle-link"],
        ),
    ]
}

/// Sources of one kind, lowest `tier` first (stable for ties).
pub fn sources_of_kind(sources: &[Source], kind: SourceKind) -> Vec<Source> {
    let mut out: Vec<Source> = sources.iter().filter(|s| s.kind == kind).cloned().collect();
    out.sort_by_key(|s| s.tier);
    out
}
