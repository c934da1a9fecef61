// src/ingest/mod.rs
pub mod orchestrator;
pub mod pipeline;
pub mod providers;
pub mod sources;
pub mod tier;
pub mod types;

use metrics::{describe_counter, describe_gauge};
use once_cell::sync::OnceCell;
use url::Url;

pub use orchestrator::{IngestReport, Orchestrator, RunState};
pub use pipeline::{ArticlePipeline, CandidateOutcome};
pub use tier::{IngestTier, SourceHealth, SourceTier, TierGate, TierOutcome};
pub use types::SourceProvider;

/// One-time metrics registration (so series show up on /metrics).
pub(crate) fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("ingest_runs_total", "Completed ingestion runs.");
        describe_counter!(
            "ingest_source_errors_total",
            "Source fetch failures, labelled by kind."
        );
        describe_counter!(
            "ingest_articles_inserted_total",
            "Articles stored after enrichment."
        );
        describe_counter!(
            "ingest_duplicates_total",
            "Candidates skipped because their URL is already stored."
        );
        describe_counter!(
            "ingest_filtered_total",
            "Candidates dropped by the relevance gate."
        );
        describe_counter!("ingest_purged_total", "Articles removed by retention.");
        describe_gauge!("ingest_last_run_ts", "Unix ts when ingestion last ran.");
    });
}

/// Normalize feed text: decode entities, strip tags, straighten quotes,
/// collapse whitespace.
pub fn normalize_text(s: &str) -> String {
    // 1) HTML entity decode
    let mut out = html_escape::decode_html_entities(s).to_string();

    // 2) Strip HTML tags
    static RE_TAGS: OnceCell<regex::Regex> = OnceCell::new();
    let re_tags = RE_TAGS.get_or_init(|| regex::Regex::new(r"(?is)</?[^>]+>").unwrap());
    out = re_tags.replace_all(&out, " ").to_string();

    // 3) Normalize “ ” ‘ ’ « » to ASCII quotes
    out = out
        .replace(['\u{201C}', '\u{201D}', '\u{00AB}', '\u{00BB}'], "\"")
        .replace(['\u{2018}', '\u{2019}'], "'");

    // 4) Collapse whitespace
    static RE_WS: OnceCell<regex::Regex> = OnceCell::new();
    let re_ws = RE_WS.get_or_init(|| regex::Regex::new(r"\s+").unwrap());
    out = re_ws.replace_all(&out, " ").to_string();
    out.trim().to_string()
}

/// Cut to at most `max` characters (not bytes).
pub fn truncate_chars(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}

fn is_tracking_param(key: &str) -> bool {
    let k = key.to_ascii_lowercase();
    k.starts_with("utm_") || k == "fbclid" || k == "gclid"
}

/// Dedup key: URL without fragment and tracking parameters. Unparseable
/// input is returned trimmed.
pub fn canonical_url(raw: &str) -> String {
    let trimmed = raw.trim();
    let Ok(mut url) = Url::parse(trimmed) else {
        return trimmed.to_string();
    };
    url.set_fragment(None);
    let kept: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(k, _)| !is_tracking_param(k))
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    if kept.is_empty() {
        url.set_query(None);
    } else {
        url.query_pairs_mut().clear().extend_pairs(kept);
    }
    url.to_string()
}
