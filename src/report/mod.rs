// src/report/mod.rs
//! Read-only report composition over the news and portfolio stores.

pub mod render;

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};
use serde::Serialize;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::config::ReportConfig;
use crate::error::ComposeError;
use crate::model::{Article, Holding, Portfolio, PortfolioId};
use crate::store::{NewsStore, PortfolioStore};

pub use render::{EmailRenderer, RenderedEmail};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryGroup {
    pub category: String,
    pub articles: Vec<Article>,
}

/// Trailing figures for one portfolio. Each one falls back to 0 on its own.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct PortfolioMetrics {
    pub related_7d: usize,
    pub related_30d: usize,
    pub avg_sentiment_7d: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PortfolioReport {
    pub portfolio: Portfolio,
    pub holdings: Vec<Holding>,
    pub report_date: NaiveDate,
    pub target_date: Option<NaiveDate>,
    pub groups: Vec<CategoryGroup>,
    pub article_count: usize,
    pub avg_sentiment: f32,
    pub metrics: PortfolioMetrics,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PortfolioSummary {
    pub id: PortfolioId,
    pub name: String,
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GeneralReport {
    pub report_date: NaiveDate,
    pub groups: Vec<CategoryGroup>,
    pub article_count: usize,
    pub avg_sentiment: f32,
    pub featured_portfolios: Vec<PortfolioSummary>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Report {
    Portfolio(PortfolioReport),
    EmptyPortfolio {
        portfolio: Portfolio,
        report_date: NaiveDate,
    },
    General(GeneralReport),
}

impl Report {
    pub fn article_count(&self) -> usize {
        match self {
            Report::Portfolio(r) => r.article_count,
            Report::EmptyPortfolio { .. } => 0,
            Report::General(r) => r.article_count,
        }
    }
}

/// Groups in order of first appearance; article order is preserved.
pub fn group_by_category(articles: Vec<Article>) -> Vec<CategoryGroup> {
    let mut groups: Vec<CategoryGroup> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();
    for a in articles {
        match index.get(&a.category) {
            Some(&i) => groups[i].articles.push(a),
            None => {
                index.insert(a.category.clone(), groups.len());
                groups.push(CategoryGroup {
                    category: a.category.clone(),
                    articles: vec![a],
                });
            }
        }
    }
    groups
}

/// Mean sentiment, 0 for no articles.
pub fn average_sentiment(articles: &[Article]) -> f32 {
    if articles.is_empty() {
        return 0.0;
    }
    articles.iter().map(|a| a.sentiment).sum::<f32>() / articles.len() as f32
}

/// `[00:00:00, 23:59:59.999999999]` of a UTC calendar day.
pub fn day_bounds(date: NaiveDate) -> (DateTime<Utc>, DateTime<Utc>) {
    let start = date.and_time(NaiveTime::MIN).and_utc();
    let end = start + Duration::days(1) - Duration::nanoseconds(1);
    (start, end)
}

pub struct ReportComposer {
    portfolios: Arc<dyn PortfolioStore>,
    news: Arc<dyn NewsStore>,
    portfolio_recent_limit: usize,
    general_recent_limit: usize,
    featured_portfolios: usize,
}

impl ReportComposer {
    pub fn new(portfolios: Arc<dyn PortfolioStore>, news: Arc<dyn NewsStore>) -> Self {
        let defaults = ReportConfig::default();
        Self {
            portfolios,
            news,
            portfolio_recent_limit: defaults.portfolio_recent_limit,
            general_recent_limit: defaults.general_recent_limit,
            featured_portfolios: defaults.featured_portfolios,
        }
    }

    pub fn with_limits(mut self, cfg: &ReportConfig) -> Self {
        self.portfolio_recent_limit = cfg.portfolio_recent_limit;
        self.general_recent_limit = cfg.general_recent_limit;
        self.featured_portfolios = cfg.featured_portfolios;
        self
    }

    pub async fn compose_portfolio_report(
        &self,
        portfolio_id: PortfolioId,
        target_date: Option<NaiveDate>,
    ) -> Result<Report, ComposeError> {
        self.compose_portfolio_report_at(portfolio_id, target_date, Utc::now())
            .await
    }

    pub async fn compose_portfolio_report_at(
        &self,
        portfolio_id: PortfolioId,
        target_date: Option<NaiveDate>,
        now: DateTime<Utc>,
    ) -> Result<Report, ComposeError> {
        let portfolio = self
            .portfolios
            .get_portfolio(portfolio_id)
            .await?
            .ok_or(ComposeError::PortfolioNotFound(portfolio_id))?;
        let holdings = self.portfolios.list_holdings(portfolio_id).await?;
        let report_date = target_date.unwrap_or_else(|| now.date_naive());

        if holdings.is_empty() {
            debug!(target: "report", portfolio_id, "portfolio has no holdings");
            return Ok(Report::EmptyPortfolio {
                portfolio,
                report_date,
            });
        }

        let symbols: BTreeSet<&str> = holdings.iter().map(|h| h.symbol.as_str()).collect();
        let candidates = match target_date {
            Some(d) => {
                let (start, end) = day_bounds(d);
                self.news.query_by_date_range(start, end).await?
            }
            None => self.news.query_recent(self.portfolio_recent_limit).await?,
        };
        let related: Vec<Article> = candidates
            .into_iter()
            .filter(|a| a.mentions_any(symbols.iter().copied()))
            .collect();

        let avg_sentiment = average_sentiment(&related);
        let metrics = self.portfolio_metrics(&symbols, now).await;
        debug!(
            target: "report",
            portfolio_id,
            articles = related.len(),
            "portfolio report composed"
        );
        Ok(Report::Portfolio(PortfolioReport {
            portfolio,
            holdings,
            report_date,
            target_date,
            article_count: related.len(),
            avg_sentiment,
            groups: group_by_category(related),
            metrics,
        }))
    }

    async fn portfolio_metrics(&self, symbols: &BTreeSet<&str>, now: DateTime<Utc>) -> PortfolioMetrics {
        let mut m = PortfolioMetrics::default();

        match self.news.query_by_date_range(now - Duration::days(7), now).await {
            Ok(v) => {
                let related: Vec<Article> = v
                    .into_iter()
                    .filter(|a| a.mentions_any(symbols.iter().copied()))
                    .collect();
                m.related_7d = related.len();
                m.avg_sentiment_7d = average_sentiment(&related);
            }
            Err(e) => warn!(target: "report", error = %e, "7-day metrics unavailable"),
        }

        match self.news.query_by_date_range(now - Duration::days(30), now).await {
            Ok(v) => {
                m.related_30d = v
                    .iter()
                    .filter(|a| a.mentions_any(symbols.iter().copied()))
                    .count();
            }
            Err(e) => warn!(target: "report", error = %e, "30-day metrics unavailable"),
        }
        m
    }

    pub async fn compose_general_report(&self) -> Result<Report, ComposeError> {
        self.compose_general_report_at(Utc::now()).await
    }

    pub async fn compose_general_report_at(&self, now: DateTime<Utc>) -> Result<Report, ComposeError> {
        let articles = self.news.query_recent(self.general_recent_limit).await?;
        let featured = self
            .portfolios
            .list_public_portfolios(self.featured_portfolios)
            .await?
            .into_iter()
            .map(|p| PortfolioSummary {
                id: p.id,
                name: p.name,
                description: p.description,
            })
            .collect();
        Ok(Report::General(GeneralReport {
            report_date: now.date_naive(),
            article_count: articles.len(),
            avg_sentiment: average_sentiment(&articles),
            groups: group_by_category(articles),
            featured_portfolios: featured,
        }))
    }
}
