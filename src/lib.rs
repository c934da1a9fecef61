// src/lib.rs
// Public library surface for the binary and integration tests.

pub mod api;
pub mod app;
pub mod config;
pub mod enrich;
pub mod error;
pub mod guard;
pub mod ingest;
pub mod metrics;
pub mod model;
pub mod notify;
pub mod persist;
pub mod relevance;
pub mod report;
pub mod scheduler;
pub mod store;

pub use crate::api::router;
pub use crate::app::App;
pub use crate::error::{AlreadyRunning, FetchErrorKind, SourceFetchError};
pub use crate::ingest::{IngestReport, Orchestrator};
pub use crate::notify::{DistributionDriver, DistributionSummary};
pub use crate::report::{Report, ReportComposer};

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Install the global subscriber: `RUST_LOG` filter (default
/// `portfolio_news_digest=info,warn`), compact output or JSON with
/// `LOG_FORMAT=json`. Keeps an already installed subscriber.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("portfolio_news_digest=info,warn"));
    let json = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let res = if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .try_init()
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().compact())
            .try_init()
    };
    if res.is_err() {
        tracing::debug!("tracing subscriber already installed");
    }
}
