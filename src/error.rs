// src/error.rs
//! Error types at component seams. Wiring code uses `anyhow` on top of these.

use serde::Serialize;
use std::fmt;
use thiserror::Error;

use crate::model::PortfolioId;

/// Machine-readable reason a source fetch failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FetchErrorKind {
    Timeout,
    Blocked,
    RateLimited,
    NotFound,
    Malformed,
}

impl FetchErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FetchErrorKind::Timeout => "timeout",
            FetchErrorKind::Blocked => "blocked",
            FetchErrorKind::RateLimited => "rate_limited",
            FetchErrorKind::NotFound => "not_found",
            FetchErrorKind::Malformed => "malformed",
        }
    }

    /// Whether the source should be tried again on the very next scheduled run.
    /// `Blocked` and `NotFound` sit out one run first.
    pub fn retry_next_run(&self) -> bool {
        matches!(
            self,
            FetchErrorKind::Timeout | FetchErrorKind::RateLimited | FetchErrorKind::Malformed
        )
    }
}

impl fmt::Display for FetchErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Error)]
#[error("source '{source_name}' failed ({kind}): {detail}")]
pub struct SourceFetchError {
    pub source_name: String,
    pub kind: FetchErrorKind,
    pub detail: String,
}

impl SourceFetchError {
    pub fn new(source_name: impl Into<String>, kind: FetchErrorKind, detail: impl Into<String>) -> Self {
        Self {
            source_name: source_name.into(),
            kind,
            detail: detail.into(),
        }
    }
}

#[derive(Debug, Clone, Error)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("constraint violation: {0}")]
    Constraint(String),
}

#[derive(Debug, Error)]
pub enum ComposeError {
    #[error("portfolio {0} not found")]
    PortfolioNotFound(PortfolioId),

    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug, Error)]
pub enum MailError {
    #[error("invalid address '{0}'")]
    Address(String),

    #[error("could not build message: {0}")]
    Build(String),

    #[error("transport failure: {0}")]
    Transport(String),
}

#[derive(Debug, Error)]
pub enum AiError {
    #[error("AI request failed: {0}")]
    Http(String),

    #[error("AI provider returned status {0}")]
    Status(u16),

    #[error("AI provider returned an empty answer")]
    Empty,

    #[error("daily AI call limit of {0} reached")]
    DailyLimit(u32),
}

/// Returned by single-flight guarded operations when a run is already active.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("{0} run already in progress")]
pub struct AlreadyRunning(pub &'static str);

#[derive(Debug, Error)]
pub enum DistributionError {
    #[error(transparent)]
    AlreadyRunning(#[from] AlreadyRunning),

    #[error("could not resolve subscribers: {0}")]
    Subscribers(#[from] StoreError),
}
