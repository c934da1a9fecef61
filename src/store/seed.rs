// src/store/seed.rs
//! JSON seed file for the in-memory store (portfolios, industries, subscribers).

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

use super::MemoryStore;
use crate::model::{Holding, IndustryWatch, Portfolio, Subscription};

#[derive(Debug, Clone, Deserialize, Default)]
pub struct SeedData {
    #[serde(default)]
    pub portfolios: Vec<SeedPortfolio>,
    #[serde(default)]
    pub industries: Vec<IndustryWatch>,
    #[serde(default)]
    pub subscriptions: Vec<Subscription>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SeedPortfolio {
    #[serde(flatten)]
    pub portfolio: Portfolio,
    #[serde(default)]
    pub holdings: Vec<Holding>,
}

impl SeedData {
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading seed data from {}", path.display()))?;
        serde_json::from_str(&raw).with_context(|| format!("parsing seed data {}", path.display()))
    }
}

impl MemoryStore {
    pub async fn from_seed(seed: SeedData) -> Result<Self> {
        let store = MemoryStore::new();
        for p in seed.portfolios {
            let id = p.portfolio.id;
            store
                .put_portfolio(p.portfolio, p.holdings)
                .await
                .with_context(|| format!("seeding portfolio {id}"))?;
        }
        for i in seed.industries {
            store.put_industry(i).await;
        }
        for s in seed.subscriptions {
            let email = s.email.clone();
            store
                .subscribe(s)
                .await
                .with_context(|| format!("seeding subscription {email}"))?;
        }
        Ok(store)
    }
}
