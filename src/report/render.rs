// src/report/render.rs
//! Report → subject + HTML + plain-text bodies.

use chrono::NaiveDate;
use html_escape::{encode_double_quoted_attribute, encode_text};
use serde::Serialize;
use std::fmt::Write as _;

use super::{CategoryGroup, GeneralReport, PortfolioReport, Report};
use crate::config::ReportConfig;
use crate::model::{Article, PortfolioId};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RenderedEmail {
    pub subject: String,
    pub html: String,
    pub text: String,
}

pub fn sentiment_label(score: f32) -> &'static str {
    if score > 0.2 {
        "positive"
    } else if score < -0.2 {
        "negative"
    } else {
        "neutral"
    }
}

fn sentiment_color(score: f32) -> &'static str {
    match sentiment_label(score) {
        "positive" => "#1a7f37",
        "negative" => "#cf222e",
        _ => "#57606a",
    }
}

#[derive(Debug, Clone)]
pub struct EmailRenderer {
    brand: String,
    site_url: Option<String>,
}

impl EmailRenderer {
    pub fn new(brand: impl Into<String>, site_url: Option<String>) -> Self {
        Self {
            brand: brand.into(),
            site_url,
        }
    }

    pub fn from_config(cfg: &ReportConfig) -> Self {
        Self::new(cfg.brand.clone(), cfg.site_url.clone())
    }

    pub fn subject(&self, report: &Report) -> String {
        match report {
            Report::Portfolio(r) => format!(
                "[{}] {}: {} articles for {}",
                self.brand, r.portfolio.name, r.article_count, r.report_date
            ),
            Report::EmptyPortfolio {
                portfolio,
                report_date,
            } => format!("[{}] {}: digest for {}", self.brand, portfolio.name, report_date),
            Report::General(r) => format!("[{}] Market news for {}", self.brand, r.report_date),
        }
    }

    /// Subject for log rows when no report could be composed.
    pub fn fallback_subject(&self, portfolio_id: Option<PortfolioId>, date: NaiveDate) -> String {
        match portfolio_id {
            Some(id) => format!("[{}] Portfolio #{id}: digest for {date}", self.brand),
            None => format!("[{}] Market news for {date}", self.brand),
        }
    }

    pub fn render(&self, report: &Report) -> RenderedEmail {
        let subject = self.subject(report);
        let (html_body, text_body) = match report {
            Report::Portfolio(r) => (self.portfolio_html(r), self.portfolio_text(r)),
            Report::EmptyPortfolio { portfolio, .. } => {
                let msg = format!(
                    "Portfolio \"{}\" has no holdings yet, so there is no news to report.",
                    portfolio.name
                );
                (format!("<p>{}</p>", encode_text(&msg)), format!("{msg}\n"))
            }
            Report::General(r) => (self.general_html(r), self.general_text(r)),
        };

        let mut html = String::new();
        let _ = write!(
            html,
            "<!DOCTYPE html><html><head><meta charset=\"utf-8\"><title>{}</title></head>\
             <body style=\"font-family:Arial,sans-serif;max-width:640px;margin:auto\">\
             <h1 style=\"font-size:20px\">{}</h1>{}{}</body></html>",
            encode_text(&subject),
            encode_text(&subject),
            html_body,
            self.footer_html()
        );
        let mut text = format!("{subject}\n{}\n\n{text_body}", "=".repeat(subject.chars().count()));
        if let Some(url) = &self.site_url {
            let _ = write!(text, "\n--\n{} · {}\n", self.brand, url);
        } else {
            let _ = write!(text, "\n--\n{}\n", self.brand);
        }
        RenderedEmail {
            subject,
            html,
            text,
        }
    }

    fn footer_html(&self) -> String {
        let brand = encode_text(&self.brand);
        match &self.site_url {
            Some(url) => format!(
                "<hr><p style=\"color:#57606a;font-size:12px\"><a href=\"{}\">{}</a></p>",
                encode_double_quoted_attribute(url),
                brand
            ),
            None => format!("<hr><p style=\"color:#57606a;font-size:12px\">{brand}</p>"),
        }
    }

    fn portfolio_html(&self, r: &PortfolioReport) -> String {
        let mut h = String::new();
        let symbols: Vec<&str> = r.holdings.iter().map(|h| h.symbol.as_str()).collect();
        let _ = write!(
            h,
            "<p>Holdings: {}</p><p>Average sentiment: {}</p>\
             <p>Last 7 days: {} related articles (avg sentiment {:+.2}). Last 30 days: {}.</p>",
            encode_text(&symbols.join(", ")),
            sentiment_badge(r.avg_sentiment),
            r.metrics.related_7d,
            r.metrics.avg_sentiment_7d,
            r.metrics.related_30d
        );
        if r.groups.is_empty() {
            h.push_str("<p>No news mentioned your holdings in this period.</p>");
        }
        for g in &r.groups {
            h.push_str(&group_html(g));
        }
        h
    }

    fn portfolio_text(&self, r: &PortfolioReport) -> String {
        let mut t = String::new();
        let symbols: Vec<&str> = r.holdings.iter().map(|h| h.symbol.as_str()).collect();
        let _ = writeln!(t, "Holdings: {}", symbols.join(", "));
        let _ = writeln!(
            t,
            "Average sentiment: {:+.2} ({})",
            r.avg_sentiment,
            sentiment_label(r.avg_sentiment)
        );
        let _ = writeln!(
            t,
            "Last 7 days: {} related articles (avg sentiment {:+.2}). Last 30 days: {}.",
            r.metrics.related_7d, r.metrics.avg_sentiment_7d, r.metrics.related_30d
        );
        if r.groups.is_empty() {
            t.push_str("\nNo news mentioned your holdings in this period.\n");
        }
        for g in &r.groups {
            t.push_str(&group_text(g));
        }
        t
    }

    fn general_html(&self, r: &GeneralReport) -> String {
        let mut h = String::new();
        let _ = write!(h, "<p>Average sentiment: {}</p>", sentiment_badge(r.avg_sentiment));
        if r.groups.is_empty() {
            h.push_str("<p>No news yet today.</p>");
        }
        for g in &r.groups {
            h.push_str(&group_html(g));
        }
        if !r.featured_portfolios.is_empty() {
            h.push_str("<h2 style=\"font-size:16px\">Featured portfolios</h2><ul>");
            for p in &r.featured_portfolios {
                let _ = write!(h, "<li><b>{}</b>", encode_text(&p.name));
                if let Some(d) = &p.description {
                    let _ = write!(h, ": {}", encode_text(d));
                }
                h.push_str("</li>");
            }
            h.push_str("</ul>");
        }
        h
    }

    fn general_text(&self, r: &GeneralReport) -> String {
        let mut t = String::new();
        let _ = writeln!(
            t,
            "Average sentiment: {:+.2} ({})",
            r.avg_sentiment,
            sentiment_label(r.avg_sentiment)
        );
        if r.groups.is_empty() {
            t.push_str("\nNo news yet today.\n");
        }
        for g in &r.groups {
            t.push_str(&group_text(g));
        }
        if !r.featured_portfolios.is_empty() {
            t.push_str("\nFeatured portfolios\n");
            for p in &r.featured_portfolios {
                match &p.description {
                    Some(d) => {
                        let _ = writeln!(t, "- {}: {}", p.name, d);
                    }
                    None => {
                        let _ = writeln!(t, "- {}", p.name);
                    }
                }
            }
        }
        t
    }
}

fn sentiment_badge(score: f32) -> String {
    format!(
        "<span style=\"color:{}\">{:+.2} ({})</span>",
        sentiment_color(score),
        score,
        sentiment_label(score)
    )
}

fn article_html(a: &Article) -> String {
    let mut h = format!(
        "<li><a href=\"{}\">{}</a> <small>({}, {})</small>",
        encode_double_quoted_attribute(&a.url),
        encode_text(&a.title),
        encode_text(&a.source_name),
        a.published_at.format("%Y-%m-%d %H:%M UTC")
    );
    if !a.summary.is_empty() {
        let _ = write!(h, "<br>{}", encode_text(&a.summary));
    }
    if !a.related_symbols.is_empty() {
        let syms: Vec<&str> = a.related_symbols.iter().map(String::as_str).collect();
        let _ = write!(h, "<br><small>{}</small>", encode_text(&syms.join(", ")));
    }
    h.push_str("</li>");
    h
}

fn group_html(g: &CategoryGroup) -> String {
    let mut h = format!(
        "<h2 style=\"font-size:16px;text-transform:capitalize\">{}</h2><ul>",
        encode_text(&g.category)
    );
    for a in &g.articles {
        h.push_str(&article_html(a));
    }
    h.push_str("</ul>");
    h
}

fn group_text(g: &CategoryGroup) -> String {
    let mut t = format!("\n## {}\n", g.category);
    for a in &g.articles {
        let _ = writeln!(t, "- {} ({})\n  {}", a.title, a.source_name, a.url);
        if !a.summary.is_empty() {
            let _ = writeln!(t, "  {}", a.summary);
        }
    }
    t
}
