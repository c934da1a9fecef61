// src/config/ai.rs
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;

fn default_provider() -> String {
    "openai".to_string()
}
fn default_api_key() -> String {
    "ENV".to_string()
}
fn default_model() -> String {
    "gpt-4o-mini".to_string()
}
fn default_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}
fn default_daily_limit() -> u32 {
    400
}
fn default_cache_dir() -> PathBuf {
    PathBuf::from("cache/ai")
}
fn default_timeout_secs() -> u64 {
    10
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AiConfig {
    #[serde(default)]
    pub enabled: bool,
    /// Only "openai" (or an OpenAI-compatible endpoint) is supported.
    #[serde(default = "default_provider")]
    pub provider: String,
    /// "ENV" means: read from OPENAI_API_KEY.
    #[serde(default = "default_api_key")]
    pub api_key: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Real provider calls per UTC day; cache hits are free.
    #[serde(default = "default_daily_limit")]
    pub daily_limit: u32,
    #[serde(default = "default_cache_dir")]
    pub cache_dir: PathBuf,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            provider: default_provider(),
            api_key: default_api_key(),
            model: default_model(),
            base_url: default_base_url(),
            daily_limit: default_daily_limit(),
            cache_dir: default_cache_dir(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl AiConfig {
    /// Resolved key; `None` when missing, which disables the AI backend.
    pub fn resolved_api_key(&self) -> Option<String> {
        let raw = self.api_key.trim();
        let key = if raw.eq_ignore_ascii_case("env") {
            env::var("OPENAI_API_KEY").ok()?
        } else {
            raw.to_string()
        };
        let key = key.trim().to_string();
        (!key.is_empty()).then_some(key)
    }

    pub fn provider_normalized(&self) -> String {
        self.provider.trim().to_lowercase()
    }
}
