// src/app.rs
//! Component wiring shared by the binary and the end-to-end tests.

use anyhow::{Context, Result};
use axum::Router;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::api::{self, AppState};
use crate::config::AppConfig;
use crate::enrich::{build_ai_backend, Enricher};
use crate::ingest::providers::{http_client, ProviderSettings};
use crate::ingest::tier::build_tiers;
use crate::ingest::{ArticlePipeline, Orchestrator};
use crate::notify::{DistributionDriver, LogTransport, MailTransport, SmtpMailer};
use crate::persist::Persister;
use crate::relevance::{Classifier, KeywordClassifier};
use crate::report::{EmailRenderer, ReportComposer};
use crate::store::{MemoryStore, SeedData};

pub struct App {
    pub config: AppConfig,
    pub store: Arc<MemoryStore>,
    pub orchestrator: Arc<Orchestrator>,
    pub driver: Arc<DistributionDriver>,
}

impl App {
    /// Build every component from `config`. The store is seeded from
    /// `seed_path` when one is set.
    pub async fn build(config: AppConfig) -> Result<Self> {
        let store = match &config.seed_path {
            Some(path) => {
                let seed = SeedData::load_from_file(path)?;
                Arc::new(MemoryStore::from_seed(seed).await?)
            }
            None => {
                warn!("no seed_path configured, starting with an empty store");
                Arc::new(MemoryStore::new())
            }
        };
        let transport: Arc<dyn MailTransport> = match SmtpMailer::from_config(&config.smtp)? {
            Some(smtp) => Arc::new(smtp),
            None => {
                warn!(target: "distribute", "SMTP not configured, digests are only logged");
                Arc::new(LogTransport)
            }
        };
        Self::with_parts(config, store, transport)
    }

    pub fn with_parts(
        config: AppConfig,
        store: Arc<MemoryStore>,
        transport: Arc<dyn MailTransport>,
    ) -> Result<Self> {
        let client = http_client().context("building HTTP client")?;
        let classifier: Arc<dyn Classifier> = Arc::new(KeywordClassifier::new());

        let ai = build_ai_backend(&config.ai);
        let mut enricher = Enricher::new(classifier.clone(), ai).with_locale(config.report.locale.clone());
        if config.ingest.extract_content {
            enricher = enricher.with_content_fetch(
                client.clone(),
                Duration::from_secs(config.ingest.content_timeout_secs),
            );
        }
        let pipeline = ArticlePipeline::new(classifier, enricher, Persister::new(store.clone()));

        let settings = ProviderSettings::from_config(&config, client);
        let tiers = build_tiers(&config.sources(), &settings);
        let orchestrator = Arc::new(
            Orchestrator::new(store.clone(), store.clone(), store.clone(), pipeline, tiers)
                .with_retention_days(config.ingest.retention_days),
        );

        let composer = ReportComposer::new(store.clone(), store.clone()).with_limits(&config.report);
        let driver = Arc::new(DistributionDriver::new(
            store.clone(),
            store.clone(),
            composer,
            EmailRenderer::from_config(&config.report),
            transport,
            config.smtp.from.clone(),
        ));

        info!(
            sources = config.sources().len(),
            ai = config.ai.enabled,
            "components ready"
        );
        Ok(Self {
            config,
            store,
            orchestrator,
            driver,
        })
    }

    pub fn router(&self) -> Router {
        api::router(AppState {
            orchestrator: self.orchestrator.clone(),
            driver: self.driver.clone(),
            email_log: self.store.clone(),
        })
    }
}
