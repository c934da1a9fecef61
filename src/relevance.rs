// src/relevance.rs
//! Relevance gate and text classification: is a headline worth keeping, which
//! category does it belong to, and which holdings does it mention.
//!
//! Matching is case-insensitive substring search over the raw text, no
//! tokenization. Callers depend on the [`Classifier`] trait so a tokenizing or
//! model-based implementation can be dropped in later.

use std::collections::BTreeSet;

use crate::model::{normalize_symbol, Holding, IndustryWatch};

/// Generic financial vocabulary. Anything mentioning one of these counts as
/// financial news even when no holding or industry matches.
pub const GENERIC_FINANCE_TERMS: &[&str] = &[
    "stock",
    "shares",
    "market",
    "earnings",
    "revenue",
    "profit",
    "nasdaq",
    "dow jones",
    "s&p 500",
    "fed",
    "inflation",
    "interest rate",
    "ipo",
    "dividend",
    "bond",
    "treasury",
    "gdp",
    "economy",
    "investor",
    "wall street",
];

/// Fallback category table, checked in order.
pub const CATEGORY_KEYWORDS: &[(&str, &[&str])] = &[
    (
        "earnings",
        &["earnings", "revenue", "profit", "quarterly", "eps", "guidance", "results"],
    ),
    (
        "market",
        &["stock", "shares", "nasdaq", "dow jones", "s&p", "rally", "sell-off", "selloff", "market"],
    ),
    (
        "policy",
        &["fed", "interest rate", "regulation", "regulator", "sec ", "tariff", "policy", "central bank"],
    ),
    (
        "economy",
        &["inflation", "gdp", "jobs", "unemployment", "cpi", "economy", "recession", "payroll"],
    ),
];

pub const DEFAULT_CATEGORY: &str = "general";

/// Why a headline passed the gate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelevanceMatch {
    Holding(String),
    Industry(String),
    GenericTerm(&'static str),
}

pub trait Classifier: Send + Sync {
    /// First matching rule, or `None` when the title is irrelevant.
    fn match_reason(
        &self,
        title: &str,
        holdings: &[Holding],
        industries: &[IndustryWatch],
    ) -> Option<RelevanceMatch>;

    fn is_relevant(&self, title: &str, holdings: &[Holding], industries: &[IndustryWatch]) -> bool {
        self.match_reason(title, holdings, industries).is_some()
    }

    fn categorize(&self, title: &str, industries: &[IndustryWatch]) -> String;

    /// Symbols of every holding mentioned in `text`.
    fn tag_symbols(&self, text: &str, holdings: &[Holding]) -> BTreeSet<String>;
}

/// Case-insensitive substring matcher.
#[derive(Debug, Clone, Copy, Default)]
pub struct KeywordClassifier;

impl KeywordClassifier {
    pub fn new() -> Self {
        Self
    }
}

fn contains_ci(haystack_lower: &str, needle: &str) -> bool {
    let n = needle.trim();
    !n.is_empty() && haystack_lower.contains(&n.to_lowercase())
}

fn holding_mentioned(text_lower: &str, h: &Holding) -> bool {
    contains_ci(text_lower, &h.symbol) || contains_ci(text_lower, &h.display_name)
}

impl Classifier for KeywordClassifier {
    fn match_reason(
        &self,
        title: &str,
        holdings: &[Holding],
        industries: &[IndustryWatch],
    ) -> Option<RelevanceMatch> {
        let t = title.to_lowercase();

        // (a) holdings; an empty universe simply falls through to the generic list
        if let Some(h) = holdings.iter().find(|h| holding_mentioned(&t, h)) {
            return Some(RelevanceMatch::Holding(normalize_symbol(&h.symbol)));
        }

        // (b) industries: keywords, then the industry name itself
        for ind in industries {
            if ind.keyword_list().any(|k| contains_ci(&t, k)) || contains_ci(&t, &ind.name) {
                return Some(RelevanceMatch::Industry(ind.name.clone()));
            }
        }

        // (c) generic financial vocabulary
        GENERIC_FINANCE_TERMS
            .iter()
            .copied()
            .find(|term| t.contains(term))
            .map(RelevanceMatch::GenericTerm)
    }

    fn categorize(&self, title: &str, industries: &[IndustryWatch]) -> String {
        let t = title.to_lowercase();
        if let Some(ind) = industries.iter().find(|i| contains_ci(&t, &i.name)) {
            return ind.name.clone();
        }
        CATEGORY_KEYWORDS
            .iter()
            .find(|(_, kws)| kws.iter().any(|k| t.contains(*k)))
            .map(|(cat, _)| (*cat).to_string())
            .unwrap_or_else(|| DEFAULT_CATEGORY.to_string())
    }

    fn tag_symbols(&self, text: &str, holdings: &[Holding]) -> BTreeSet<String> {
        let t = text.to_lowercase();
        holdings
            .iter()
            .filter(|h| holding_mentioned(&t, h))
            .map(|h| normalize_symbol(&h.symbol))
            .collect()
    }
}
