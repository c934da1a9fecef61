// src/enrich/ai.rs
//! AI backend: provider abstraction + file cache + daily call limit.
//!
//! The backend is optional everywhere. Callers receive
//! `Option<Arc<dyn AiBackend>>` and fall back to heuristics on `None` or on
//! any error.

use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::config::AiConfig;
use crate::error::AiError;

/// Longest summary we keep from a provider.
pub const SUMMARY_MAX_CHARS: usize = 150;

#[async_trait]
pub trait AiBackend: Send + Sync {
    /// Short summary (≤150 chars) in `locale`.
    async fn summarize(&self, text: &str, locale: &str) -> Result<String, AiError>;
    /// Raw model answer; the caller extracts and clamps the number.
    async fn score_sentiment(&self, text: &str) -> Result<String, AiError>;
    fn provider_name(&self) -> &str;
}

/// Low-level provider: does the real remote call. Separated so the same
/// caching wrapper serves production and tests.
#[async_trait]
pub trait ChatProvider: Send + Sync + 'static {
    async fn complete(&self, system: &str, user: &str, max_tokens: u32) -> Result<String, AiError>;
    fn name(&self) -> &'static str;
}

/// Factory.
///
/// * `AI_TEST_MODE=mock` → deterministic mock wrapped in the cache.
/// * disabled / unknown provider / missing key → `None`.
/// * otherwise OpenAI chat completions behind cache + daily limit.
pub fn build_ai_backend(cfg: &AiConfig) -> Option<Arc<dyn AiBackend>> {
    if std::env::var("AI_TEST_MODE")
        .map(|v| v == "mock")
        .unwrap_or(false)
    {
        info!(target: "enrich", "AI backend: mock");
        return Some(Arc::new(CachingBackend::new(
            MockProvider,
            cfg.cache_dir.clone(),
            cfg.daily_limit,
        )));
    }
    if !cfg.enabled {
        return None;
    }
    if cfg.provider_normalized() != "openai" {
        warn!(target: "enrich", provider = %cfg.provider, "unsupported AI provider, AI disabled");
        return None;
    }
    let Some(key) = cfg.resolved_api_key() else {
        warn!(target: "enrich", "AI enabled but no API key resolved, AI disabled");
        return None;
    };
    match OpenAiProvider::new(
        key,
        &cfg.model,
        &cfg.base_url,
        Duration::from_secs(cfg.timeout_secs),
    ) {
        Ok(p) => {
            info!(target: "enrich", model = %cfg.model, daily_limit = cfg.daily_limit, "AI backend: openai");
            Some(Arc::new(CachingBackend::new(
                p,
                cfg.cache_dir.clone(),
                cfg.daily_limit,
            )))
        }
        Err(e) => {
            warn!(target: "enrich", error = %e, "AI client build failed, AI disabled");
            None
        }
    }
}

// ------------------------------------------------------------
// Providers
// ------------------------------------------------------------

/// OpenAI-compatible chat completions.
pub struct OpenAiProvider {
    http: reqwest::Client,
    api_key: String,
    model: String,
    endpoint: String,
}

impl OpenAiProvider {
    pub fn new(api_key: String, model: &str, base_url: &str, timeout: Duration) -> reqwest::Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("portfolio-news-digest/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(Duration::from_secs(4))
            .timeout(timeout)
            .build()?;
        Ok(Self {
            http,
            api_key,
            model: model.to_string(),
            endpoint: format!("{}/chat/completions", base_url.trim_end_matches('/')),
        })
    }
}

#[async_trait]
impl ChatProvider for OpenAiProvider {
    async fn complete(&self, system: &str, user: &str, max_tokens: u32) -> Result<String, AiError> {
        #[derive(Serialize)]
        struct Msg<'a> {
            role: &'a str,
            content: &'a str,
        }
        #[derive(Serialize)]
        struct Req<'a> {
            model: &'a str,
            messages: Vec<Msg<'a>>,
            temperature: f32,
            max_tokens: u32,
        }
        #[derive(Deserialize)]
        struct Resp {
            choices: Vec<Choice>,
        }
        #[derive(Deserialize)]
        struct Choice {
            message: ChoiceMsg,
        }
        #[derive(Deserialize)]
        struct ChoiceMsg {
            content: Option<String>,
        }

        let req = Req {
            model: &self.model,
            messages: vec![
                Msg {
                    role: "system",
                    content: system,
                },
                Msg {
                    role: "user",
                    content: user,
                },
            ],
            temperature: 0.2,
            max_tokens,
        };

        let resp = self
            .http
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&req)
            .send()
            .await
            .map_err(|e| AiError::Http(e.to_string()))?;
        if !resp.status().is_success() {
            return Err(AiError::Status(resp.status().as_u16()));
        }
        let body: Resp = resp.json().await.map_err(|e| AiError::Http(e.to_string()))?;
        body.choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|c| !c.trim().is_empty())
            .ok_or(AiError::Empty)
    }

    fn name(&self) -> &'static str {
        "openai"
    }
}

/// Deterministic provider for local runs: the summary is the first sentence of
/// the input, the sentiment a fixed neutral-positive value.
#[derive(Debug, Clone, Copy, Default)]
pub struct MockProvider;

#[async_trait]
impl ChatProvider for MockProvider {
    async fn complete(&self, system: &str, user: &str, _max_tokens: u32) -> Result<String, AiError> {
        if system.contains("sentiment") {
            return Ok("0.1".to_string());
        }
        let first = user.split_terminator(". ").next().unwrap_or(user);
        Ok(first.to_string())
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}

// ------------------------------------------------------------
// Caching wrapper (file cache + daily limit)
// ------------------------------------------------------------

const SUMMARY_SYSTEM: &str = "You summarize financial news. Reply with ONE plain sentence of at most 150 characters, no emojis, no preamble.";
const SENTIMENT_SYSTEM: &str = "You rate the market sentiment of financial news. Reply with a single number between -1 (very negative) and 1 (very positive). Output only the number.";

#[derive(Debug, Clone, Serialize, Deserialize)]
struct CachedAnswer {
    answer: String,
}

pub struct CachingBackend<P: ChatProvider> {
    inner: P,
    cache_dir: PathBuf,
    daily_limit: u32,
    counter: Mutex<DailyCounter>,
}

impl<P: ChatProvider> CachingBackend<P> {
    pub fn new(inner: P, cache_dir: PathBuf, daily_limit: u32) -> Self {
        if let Err(e) = fs::create_dir_all(&cache_dir) {
            warn!(target: "enrich", dir = %cache_dir.display(), error = %e, "AI cache dir not writable");
        }
        let counter = Mutex::new(load_daily_counter(&cache_dir).unwrap_or_default());
        Self {
            inner,
            cache_dir,
            daily_limit,
            counter,
        }
    }

    /// Real calls made today (cache hits are not counted).
    pub fn calls_today(&self) -> u32 {
        let mut g = self.counter.lock().unwrap_or_else(|p| p.into_inner());
        g.roll_over(&self.cache_dir);
        g.count
    }

    async fn ask(&self, system: &str, user: &str, max_tokens: u32) -> Result<String, AiError> {
        let key = cache_key(self.inner.name(), system, user);
        if let Some(hit) = read_cache_file(&self.cache_dir, &key) {
            debug!(target: "enrich", key = %&key[..12], "AI cache hit");
            return Ok(hit.answer);
        }

        {
            let mut g = self.counter.lock().unwrap_or_else(|p| p.into_inner());
            g.roll_over(&self.cache_dir);
            if g.count >= self.daily_limit {
                return Err(AiError::DailyLimit(self.daily_limit));
            }
        }

        let answer = self.inner.complete(system, user, max_tokens).await?;
        {
            let mut g = self.counter.lock().unwrap_or_else(|p| p.into_inner());
            g.count = g.count.saturating_add(1);
            if let Err(e) = save_daily_counter(&self.cache_dir, &g) {
                debug!(target: "enrich", error = %e, "AI counter not persisted");
            }
        }
        if let Err(e) = write_cache_file(&self.cache_dir, &key, &CachedAnswer { answer: answer.clone() }) {
            debug!(target: "enrich", error = %e, "AI cache write failed");
        }
        Ok(answer)
    }
}

#[async_trait]
impl<P: ChatProvider> AiBackend for CachingBackend<P> {
    async fn summarize(&self, text: &str, locale: &str) -> Result<String, AiError> {
        let user = format!("Language: {locale}\n\n{text}");
        let raw = self.ask(SUMMARY_SYSTEM, &user, 80).await?;
        let cleaned = sanitize_answer(&raw, SUMMARY_MAX_CHARS);
        if cleaned.is_empty() {
            return Err(AiError::Empty);
        }
        Ok(cleaned)
    }

    async fn score_sentiment(&self, text: &str) -> Result<String, AiError> {
        self.ask(SENTIMENT_SYSTEM, text, 8).await
    }

    fn provider_name(&self) -> &str {
        self.inner.name()
    }
}

fn cache_key(provider: &str, system: &str, user: &str) -> String {
    use sha2::{Digest, Sha256};
    use std::fmt::Write as _;
    let mut hasher = Sha256::new();
    for part in [provider, system, user] {
        hasher.update(part.as_bytes());
        hasher.update([0u8]);
    }
    let digest = hasher.finalize();
    let mut out = String::with_capacity(64);
    for b in digest.iter() {
        let _ = write!(&mut out, "{:02x}", b);
    }
    out
}

fn cache_path(dir: &Path, key: &str) -> PathBuf {
    dir.join(format!("{key}.json"))
}

fn read_cache_file(dir: &Path, key: &str) -> Option<CachedAnswer> {
    let s = fs::read_to_string(cache_path(dir, key)).ok()?;
    serde_json::from_str(&s).ok()
}

fn write_atomic(path: &Path, contents: &str) -> io::Result<()> {
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, contents)?;
    fs::rename(tmp, path)
}

fn write_cache_file(dir: &Path, key: &str, value: &CachedAnswer) -> io::Result<()> {
    let json = serde_json::to_string(value).map_err(io::Error::other)?;
    write_atomic(&cache_path(dir, key), &json)
}

// ------------------------------------------------------------
// Daily counter
// ------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
struct DailyCounter {
    /// UTC date, `YYYY-MM-DD`.
    date: String,
    count: u32,
}

impl Default for DailyCounter {
    fn default() -> Self {
        Self {
            date: today(),
            count: 0,
        }
    }
}

impl DailyCounter {
    fn roll_over(&mut self, dir: &Path) {
        if self.date != today() {
            self.date = today();
            self.count = 0;
            let _ = save_daily_counter(dir, self);
        }
    }
}

fn today() -> String {
    Utc::now().date_naive().to_string()
}

fn counter_path(dir: &Path) -> PathBuf {
    dir.join("daily_count.json")
}

fn load_daily_counter(dir: &Path) -> io::Result<DailyCounter> {
    let s = fs::read_to_string(counter_path(dir))?;
    serde_json::from_str(&s).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
}

fn save_daily_counter(dir: &Path, dc: &DailyCounter) -> io::Result<()> {
    let json = serde_json::to_string(dc).map_err(io::Error::other)?;
    write_atomic(&counter_path(dir), &json)
}

/// Single line, collapsed whitespace, at most `max_chars` characters.
pub fn sanitize_answer(input: &str, max_chars: usize) -> String {
    let collapsed = input.split_whitespace().collect::<Vec<_>>().join(" ");
    let trimmed = collapsed.trim_matches(|c| c == '"' || c == '\'').trim();
    trimmed.chars().take(max_chars).collect::<String>().trim_end().to_string()
}
