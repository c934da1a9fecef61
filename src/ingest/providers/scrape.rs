// src/ingest/providers/scrape.rs
//! Last-resort HTML listing scraper. Each source carries an ordered list of CSS
//! selectors; matches are either anchors or containers holding one.

use async_trait::async_trait;
use reqwest::Client;
use scraper::{ElementRef, Html, Selector};
use std::collections::HashSet;
use std::time::Duration;
use url::Url;

use super::{fetch_text, BROWSER_USER_AGENT};
use crate::error::{FetchErrorKind, SourceFetchError};
use crate::ingest::normalize_text;
use crate::ingest::types::SourceProvider;
use crate::model::{RawCandidate, SourceKind, Universe};

/// Headlines shorter than this are navigation links, not news.
const MIN_TITLE_CHARS: usize = 15;

fn element_text(el: &ElementRef<'_>) -> String {
    normalize_text(&el.text().collect::<Vec<_>>().join(" "))
}

fn link_of<'a>(el: ElementRef<'a>, anchor: &Selector) -> Option<ElementRef<'a>> {
    if el.value().name() == "a" && el.value().attr("href").is_some() {
        return Some(el);
    }
    el.select(anchor).next()
}

fn resolve(base: &Url, href: &str) -> Option<String> {
    let href = href.trim();
    if href.is_empty() || href.starts_with('#') {
        return None;
    }
    let url = base.join(href).ok()?;
    matches!(url.scheme(), "http" | "https").then(|| url.to_string())
}

/// Extract headline links from a listing page. Relative hrefs are resolved
/// against `page_url`; the same URL is kept once.
pub fn parse_listing(
    source: &str,
    page_url: &str,
    html: &str,
    selectors: &[String],
    cap: usize,
) -> Result<Vec<RawCandidate>, SourceFetchError> {
    let malformed = |detail: String| SourceFetchError::new(source, FetchErrorKind::Malformed, detail);

    let base = Url::parse(page_url).map_err(|e| malformed(format!("bad page url: {e}")))?;
    let parsed: Vec<Selector> = selectors
        .iter()
        .map(|s| Selector::parse(s).map_err(|e| malformed(format!("invalid selector '{s}': {e}"))))
        .collect::<Result<_, _>>()?;
    let anchor = Selector::parse("a[href]").map_err(|e| malformed(e.to_string()))?;

    let doc = Html::parse_document(html);
    let mut seen = HashSet::new();
    let mut out = Vec::new();

    'outer: for sel in &parsed {
        for el in doc.select(sel) {
            let Some(a) = link_of(el, &anchor) else { continue };
            let Some(url) = a.value().attr("href").and_then(|h| resolve(&base, h)) else {
                continue;
            };
            let mut title = element_text(&el);
            if title.chars().count() < MIN_TITLE_CHARS {
                title = element_text(&a);
            }
            if title.chars().count() < MIN_TITLE_CHARS || !seen.insert(url.clone()) {
                continue;
            }
            out.push(RawCandidate {
                title,
                url,
                source: source.to_string(),
                description: None,
                published_at: None,
            });
            if out.len() >= cap {
                break 'outer;
            }
        }
    }

    if out.is_empty() {
        return Err(malformed("no selector matched".to_string()));
    }
    Ok(out)
}

pub struct ScrapeProvider {
    name: String,
    url: String,
    selectors: Vec<String>,
    client: Client,
    timeout: Duration,
    item_cap: usize,
}

impl ScrapeProvider {
    pub fn new(
        name: &str,
        url: &str,
        selectors: Vec<String>,
        client: Client,
        timeout: Duration,
        item_cap: usize,
    ) -> Self {
        Self {
            name: name.to_string(),
            url: url.to_string(),
            selectors,
            client,
            timeout,
            item_cap,
        }
    }
}

#[async_trait]
impl SourceProvider for ScrapeProvider {
    async fn fetch(&self, _universe: &Universe) -> Result<Vec<RawCandidate>, SourceFetchError> {
        let body = fetch_text(
            &self.client,
            &self.name,
            &self.url,
            self.timeout,
            Some(BROWSER_USER_AGENT),
        )
        .await?;
        parse_listing(&self.name, &self.url, &body, &self.selectors, self.item_cap)
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> SourceKind {
        SourceKind::Scrape
    }
}
