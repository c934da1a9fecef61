// src/config/mod.rs
//! Application configuration: TOML file + environment overrides for secrets.
//!
//! Lookup order:
//! 1) $DIGEST_CONFIG_PATH (must exist)
//! 2) config/digest.toml
//! 3) built-in defaults

pub mod ai;

use anyhow::{anyhow, Context, Result};
use chrono::NaiveTime;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::ingest::orchestrator::MAX_RETENTION_DAYS;
use crate::ingest::providers::news_api::MAX_LOOKBACK_DAYS;
use crate::model::Source;
pub use ai::AiConfig;

pub const ENV_CONFIG_PATH: &str = "DIGEST_CONFIG_PATH";
pub const DEFAULT_CONFIG_PATH: &str = "config/digest.toml";

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub ingest: IngestConfig,
    /// Empty means the built-in registry.
    pub sources: Vec<Source>,
    pub news_api: NewsApiConfig,
    pub ai: AiConfig,
    pub smtp: SmtpConfig,
    pub report: ReportConfig,
    pub seed_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
    pub interval_secs: u64,
    pub retention_days: i64,
    pub rss_item_cap: usize,
    pub rss_timeout_secs: u64,
    pub api_timeout_secs: u64,
    pub scrape_timeout_secs: u64,
    pub content_timeout_secs: u64,
    /// Fetch each kept article's page for its body text.
    pub extract_content: bool,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            interval_secs: 3600,
            retention_days: 7,
            rss_item_cap: 20,
            rss_timeout_secs: 10,
            api_timeout_secs: 15,
            scrape_timeout_secs: 8,
            content_timeout_secs: 8,
            extract_content: true,
        }
    }
}

impl IngestConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs.max(60))
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct NewsApiConfig {
    /// Overridden by NEWS_API_KEY. No key means the API tier is skipped.
    pub api_key: Option<String>,
    pub page_size: u32,
    pub language: String,
    pub lookback_days: i64,
}

impl Default for NewsApiConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            page_size: 50,
            language: "en".to_string(),
            lookback_days: 7,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SmtpConfig {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub from: String,
    pub timeout_secs: u64,
}

impl Default for SmtpConfig {
    fn default() -> Self {
        Self {
            host: None,
            port: None,
            username: None,
            password: None,
            from: "Portfolio News Digest <digest@localhost>".to_string(),
            timeout_secs: 20,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ReportConfig {
    /// UTC "HH:MM".
    pub send_at: String,
    pub brand: String,
    pub site_url: Option<String>,
    pub locale: String,
    pub portfolio_recent_limit: usize,
    pub general_recent_limit: usize,
    pub featured_portfolios: usize,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            send_at: "08:00".to_string(),
            brand: "Portfolio News Digest".to_string(),
            site_url: None,
            locale: "en".to_string(),
            portfolio_recent_limit: 20,
            general_recent_limit: 10,
            featured_portfolios: 5,
        }
    }
}

impl ReportConfig {
    pub fn send_time(&self) -> Result<NaiveTime> {
        NaiveTime::parse_from_str(self.send_at.trim(), "%H:%M")
            .with_context(|| format!("invalid report.send_at '{}'", self.send_at))
    }
}

impl AppConfig {
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading config from {}", path.display()))?;
        Self::from_toml_str(&content).with_context(|| format!("parsing {}", path.display()))
    }

    pub fn from_toml_str(s: &str) -> Result<Self> {
        let cfg: AppConfig = toml::from_str(s)?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// File lookup (env → default path → defaults), then env overrides.
    pub fn load_default() -> Result<Self> {
        let mut cfg = if let Ok(p) = std::env::var(ENV_CONFIG_PATH) {
            let pb = PathBuf::from(p);
            if !pb.exists() {
                return Err(anyhow!("{ENV_CONFIG_PATH} points to non-existent path"));
            }
            Self::load_from(&pb)?
        } else {
            let default = PathBuf::from(DEFAULT_CONFIG_PATH);
            if default.exists() {
                Self::load_from(&default)?
            } else {
                AppConfig::default()
            }
        };
        cfg.apply_env_overrides();
        Ok(cfg)
    }

    pub fn apply_env_overrides(&mut self) {
        fn env_nonempty(key: &str) -> Option<String> {
            std::env::var(key).ok().filter(|v| !v.trim().is_empty())
        }
        if let Some(k) = env_nonempty("NEWS_API_KEY") {
            self.news_api.api_key = Some(k);
        }
        if let Some(h) = env_nonempty("SMTP_HOST") {
            self.smtp.host = Some(h);
        }
        if let Some(p) = env_nonempty("SMTP_PORT").and_then(|p| p.parse().ok()) {
            self.smtp.port = Some(p);
        }
        if let Some(u) = env_nonempty("SMTP_USER") {
            self.smtp.username = Some(u);
        }
        if let Some(p) = env_nonempty("SMTP_PASS") {
            self.smtp.password = Some(p);
        }
        if let Some(f) = env_nonempty("DIGEST_EMAIL_FROM") {
            self.smtp.from = f;
        }
    }

    pub fn news_api_key(&self) -> Option<&str> {
        self.news_api
            .api_key
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty())
    }

    /// Configured sources, or the built-in registry when none are listed.
    pub fn sources(&self) -> Vec<Source> {
        if self.sources.is_empty() {
            crate::ingest::sources::default_sources()
        } else {
            self.sources.clone()
        }
    }

    fn validate(&self) -> Result<()> {
        self.report.send_time()?;
        if !(1..=MAX_RETENTION_DAYS).contains(&self.ingest.retention_days) {
            return Err(anyhow!(
                "ingest.retention_days must be within 1..={MAX_RETENTION_DAYS}"
            ));
        }
        if !(1..=MAX_LOOKBACK_DAYS).contains(&self.news_api.lookback_days) {
            return Err(anyhow!(
                "news_api.lookback_days must be within 1..={MAX_LOOKBACK_DAYS}"
            ));
        }
        Ok(())
    }
}
