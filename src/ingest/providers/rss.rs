// src/ingest/providers/rss.rs
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use quick_xml::de::from_str;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use time::{format_description::well_known::Rfc2822, OffsetDateTime};

use super::fetch_text;
use crate::error::{FetchErrorKind, SourceFetchError};
use crate::ingest::normalize_text;
use crate::ingest::types::SourceProvider;
use crate::model::{RawCandidate, SourceKind, Universe};

#[derive(Debug, Deserialize)]
struct Rss {
    channel: Channel,
}

#[derive(Debug, Deserialize)]
struct Channel {
    #[serde(rename = "item", default)]
    item: Vec<Item>,
}

#[derive(Debug, Deserialize)]
struct Item {
    title: Option<String>,
    link: Option<String>,
    #[serde(rename = "pubDate")]
    pub_date: Option<String>,
    description: Option<String>,
}

fn parse_pub_date(ts: &str) -> Option<DateTime<Utc>> {
    let ts = ts.trim();
    OffsetDateTime::parse(ts, &Rfc2822)
        .ok()
        .and_then(|dt| DateTime::from_timestamp(dt.unix_timestamp(), 0))
        .or_else(|| {
            // some feeds publish RFC 3339 or zone names `time` rejects
            DateTime::parse_from_rfc3339(ts)
                .or_else(|_| DateTime::parse_from_rfc2822(ts))
                .ok()
                .map(|dt| dt.with_timezone(&Utc))
        })
}

fn scrub_html_entities_for_xml(s: &str) -> String {
    s.replace("&nbsp;", " ")
        .replace("&ndash;", "-")
        .replace("&mdash;", "-")
        .replace("&ldquo;", "\"")
        .replace("&rdquo;", "\"")
        .replace("&lsquo;", "'")
        .replace("&rsquo;", "'")
        .replace("&hellip;", "...")
}

/// Parse an RSS 2.0 document into candidates, keeping the first `cap` items.
pub fn parse_feed(source: &str, xml: &str, cap: usize) -> Result<Vec<RawCandidate>, SourceFetchError> {
    let xml_clean = scrub_html_entities_for_xml(xml);
    let rss: Rss = from_str(&xml_clean).map_err(|e| {
        SourceFetchError::new(source, FetchErrorKind::Malformed, format!("rss parse: {e}"))
    })?;

    let mut out = Vec::with_capacity(rss.channel.item.len().min(cap));
    for it in rss.channel.item.into_iter().take(cap) {
        let title = normalize_text(it.title.as_deref().unwrap_or_default());
        let link = it.link.as_deref().map(str::trim).unwrap_or_default();
        if title.is_empty() || link.is_empty() {
            continue;
        }
        let description = it
            .description
            .as_deref()
            .map(normalize_text)
            .filter(|d| !d.is_empty());

        out.push(RawCandidate {
            title,
            url: link.to_string(),
            source: source.to_string(),
            description,
            published_at: it.pub_date.as_deref().and_then(parse_pub_date),
        });
    }
    Ok(out)
}

pub struct RssProvider {
    name: String,
    url: String,
    client: Client,
    timeout: Duration,
    item_cap: usize,
}

impl RssProvider {
    pub fn from_url(name: &str, url: &str, client: Client, timeout: Duration, item_cap: usize) -> Self {
        Self {
            name: name.to_string(),
            url: url.to_string(),
            client,
            timeout,
            item_cap,
        }
    }
}

#[async_trait]
impl SourceProvider for RssProvider {
    async fn fetch(&self, _universe: &Universe) -> Result<Vec<RawCandidate>, SourceFetchError> {
        let body = fetch_text(&self.client, &self.name, &self.url, self.timeout, None).await?;
        parse_feed(&self.name, &body, self.item_cap)
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> SourceKind {
        SourceKind::Rss
    }
}
