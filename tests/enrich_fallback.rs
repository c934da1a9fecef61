// tests/enrich_fallback.rs
mod common;

use std::sync::atomic::Ordering;
use std::sync::Arc;

use common::{candidate, FixedAi};
use portfolio_news_digest::enrich::{AiBackend, Enricher};
use portfolio_news_digest::model::{Holding, IndustryWatch, Universe};
use portfolio_news_digest::relevance::{Classifier, KeywordClassifier};

fn classifier() -> Arc<dyn Classifier> {
    Arc::new(KeywordClassifier::new())
}

fn universe() -> Universe {
    Universe {
        holdings: vec![Holding::new("AAPL", "Apple Inc"), Holding::new("MSFT", "Microsoft")],
        industries: vec![IndustryWatch::new("Semiconductors", "chip, foundry")],
    }
}

#[tokio::test]
async fn without_ai_sentiment_is_neutral_and_summary_is_truncated_text() {
    let enricher = Enricher::new(classifier(), None);
    let mut c = candidate("Apple Inc reports record earnings", "https://news.test/a");
    c.description = Some("x".repeat(250));

    let e = enricher.enrich(&c, &universe()).await;
    assert_eq!(e.sentiment, 0.0);
    assert_eq!(e.summary, format!("{}...", "x".repeat(200)));
    assert_eq!(e.category, "earnings");
    assert!(e.related_symbols.contains("AAPL"));
    assert!(e.content.is_none());
}

#[tokio::test]
async fn ai_sentiment_answers_are_parsed_and_clamped() {
    let cases = [("5", 1.0f32), ("-3.2", -1.0), ("0.35", 0.35), ("banana", 0.0)];
    for (raw, want) in cases {
        let ai: Arc<dyn AiBackend> = Arc::new(FixedAi::sentiment(raw));
        let enricher = Enricher::new(classifier(), Some(ai));
        let got = enricher
            .enrich(&candidate("Nasdaq rallies", "https://news.test/n"), &universe())
            .await
            .sentiment;
        assert!((got - want).abs() < 1e-6, "answer {raw:?} gave {got}");
    }
}

#[tokio::test]
async fn ai_summary_is_used_when_available() {
    let ai = Arc::new(FixedAi::sentiment("0.2"));
    let calls = ai.calls.clone();
    let enricher = Enricher::new(classifier(), Some(ai as Arc<dyn AiBackend>));

    let e = enricher
        .enrich(&candidate("Microsoft raises dividend", "https://news.test/m"), &universe())
        .await;
    assert_eq!(e.summary, "AI summary");
    assert!((e.sentiment - 0.2).abs() < 1e-6);
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn broken_ai_degrades_to_fallbacks() {
    let ai: Arc<dyn AiBackend> = Arc::new(FixedAi::broken());
    let enricher = Enricher::new(classifier(), Some(ai));
    let mut c = candidate("TSMC foundry expansion announced", "https://news.test/t");
    c.description = Some("New fab in Arizona.".into());

    let e = enricher.enrich(&c, &universe()).await;
    assert_eq!(e.summary, "New fab in Arizona.");
    assert_eq!(e.sentiment, 0.0);
    assert_eq!(e.category, "general");
    assert!(e.related_symbols.is_empty());
}
