//! Portfolio News Digest: binary entrypoint.
//! Loads config, wires the pipeline, starts the schedulers and serves the ops
//! router (health, manual triggers, /metrics).

use anyhow::Context;
use shuttle_axum::ShuttleAxum;
use tracing::info;

use portfolio_news_digest::config::AppConfig;
use portfolio_news_digest::metrics::Metrics;
use portfolio_news_digest::{init_tracing, scheduler, App};

#[shuttle_runtime::main]
async fn axum() -> ShuttleAxum {
    // Load .env in local/dev; no-op in prod environments.
    let _ = dotenvy::dotenv();
    init_tracing();

    let cfg = AppConfig::load_default().context("loading configuration")?;
    let send_at = cfg.report.send_time()?;
    let interval = cfg.ingest.interval();

    let metrics = Metrics::init()?;
    let app = App::build(cfg).await?;

    scheduler::spawn_ingest_loop(app.orchestrator.clone(), interval);
    scheduler::spawn_daily_report(app.driver.clone(), send_at);
    info!(?interval, %send_at, "schedulers started");

    let router = app.router().merge(metrics.router());
    Ok(router.into())
}
