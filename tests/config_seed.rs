// tests/config_seed.rs
use std::env;
use std::fs;
use std::path::Path;

use serial_test::serial;
use tempfile::tempdir;

use portfolio_news_digest::config::{AppConfig, ENV_CONFIG_PATH};
use portfolio_news_digest::model::SourceKind;
use portfolio_news_digest::store::{PortfolioStore, SubscriptionStore};
use portfolio_news_digest::App;

#[test]
fn shipped_config_parses() {
    let cfg = AppConfig::load_from(Path::new("config/digest.toml")).unwrap();
    assert_eq!(cfg.ingest.retention_days, 7);
    assert_eq!(cfg.report.send_time().unwrap().to_string(), "08:00:00");
    assert!(cfg.seed_path.is_some());
    // no [[sources]] means the built-in registry
    assert!(cfg.sources().iter().any(|s| s.kind == SourceKind::Scrape));
}

#[test]
fn invalid_values_are_rejected() {
    assert!(AppConfig::from_toml_str("[report]\nsend_at = \"8 o'clock\"").is_err());
    assert!(AppConfig::from_toml_str("[ingest]\nretention_days = 0").is_err());
}

#[test]
fn configured_sources_replace_the_registry() {
    let cfg = AppConfig::from_toml_str(
        r#"
        [[sources]]
        name = "Only Feed"
        kind = "rss"
        endpoint = "https://feeds.test/only.xml"
        tier = 0
        "#,
    )
    .unwrap();
    let sources = cfg.sources();
    assert_eq!(sources.len(), 1);
    assert_eq!(sources[0].name, "Only Feed");
    assert!(sources[0].selectors.is_empty());
}

#[serial]
#[test]
fn env_path_and_secret_overrides() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("digest.toml");
    fs::write(&path, "[report]\nsend_at = \"06:30\"\nbrand = \"Morning Wire\"\n").unwrap();

    env::set_var(ENV_CONFIG_PATH, &path);
    env::set_var("NEWS_API_KEY", "from-env");
    env::set_var("SMTP_PORT", "2525");
    let cfg = AppConfig::load_default();
    env::remove_var(ENV_CONFIG_PATH);
    env::remove_var("NEWS_API_KEY");
    env::remove_var("SMTP_PORT");

    let cfg = cfg.unwrap();
    assert_eq!(cfg.report.brand, "Morning Wire");
    assert_eq!(cfg.report.send_time().unwrap().to_string(), "06:30:00");
    assert_eq!(cfg.news_api_key(), Some("from-env"));
    assert_eq!(cfg.smtp.port, Some(2525));
}

#[serial]
#[test]
fn missing_env_config_path_is_an_error() {
    env::set_var(ENV_CONFIG_PATH, "/definitely/not/here.toml");
    let res = AppConfig::load_default();
    env::remove_var(ENV_CONFIG_PATH);
    assert!(res.is_err());
}

#[tokio::test]
async fn app_builds_from_seed_file() {
    let dir = tempdir().unwrap();
    let seed = dir.path().join("seed.json");
    fs::copy("config/seed.json", &seed).unwrap();

    let cfg = AppConfig {
        seed_path: Some(seed),
        ..AppConfig::default()
    };
    let app = App::build(cfg).await.unwrap();

    let public = app.store.list_public_portfolios(5).await.unwrap();
    assert_eq!(public.len(), 1);
    assert_eq!(public[0].name, "Big Tech");
    assert_eq!(app.store.list_holdings(2).await.unwrap().len(), 2);
    assert!(!app.store.list_active().await.unwrap().is_empty());
}

#[tokio::test]
async fn broken_seed_file_fails_startup() {
    let dir = tempdir().unwrap();
    let seed = dir.path().join("seed.json");
    fs::write(&seed, "{ not json").unwrap();

    let cfg = AppConfig {
        seed_path: Some(seed),
        ..AppConfig::default()
    };
    assert!(App::build(cfg).await.is_err());
}
