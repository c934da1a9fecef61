// src/api.rs
//! Ops-only HTTP surface: health, manual triggers, preview and email log.

use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;
use tracing::warn;

use crate::error::{ComposeError, DistributionError};
use crate::ingest::{IngestReport, Orchestrator, RunState};
use crate::model::{EmailLogEntry, PortfolioId};
use crate::notify::{DistributionDriver, DistributionSummary};
use crate::report::RenderedEmail;
use crate::store::EmailLogStore;

const EMAIL_LOG_DEFAULT: usize = 50;
const EMAIL_LOG_MAX: usize = 500;

#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<Orchestrator>,
    pub driver: Arc<DistributionDriver>,
    pub email_log: Arc<dyn EmailLogStore>,
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
}

type ApiError = (StatusCode, Json<ErrorBody>);
type ApiResult<T> = Result<Json<T>, ApiError>;

fn api_error(status: StatusCode, msg: impl ToString) -> ApiError {
    (
        status,
        Json(ErrorBody {
            error: msg.to_string(),
        }),
    )
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/admin/update-news", post(update_news))
        .route("/admin/send-report", post(send_report))
        .route("/admin/preview", get(preview))
        .route("/admin/email-log", get(email_log))
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}

#[derive(Debug, Serialize)]
struct HealthOut {
    status: &'static str,
    ingest: RunState,
    distribution_running: bool,
}

async fn health(State(state): State<AppState>) -> Json<HealthOut> {
    Json(HealthOut {
        status: "ok",
        ingest: state.orchestrator.state(),
        distribution_running: state.driver.is_running(),
    })
}

async fn update_news(State(state): State<AppState>) -> ApiResult<IngestReport> {
    state
        .orchestrator
        .update_news()
        .await
        .map(Json)
        .map_err(|e| api_error(StatusCode::CONFLICT, e))
}

async fn send_report(State(state): State<AppState>) -> ApiResult<DistributionSummary> {
    match state.driver.send_daily_report().await {
        Ok(summary) => Ok(Json(summary)),
        Err(e @ DistributionError::AlreadyRunning(_)) => Err(api_error(StatusCode::CONFLICT, e)),
        Err(e @ DistributionError::Subscribers(_)) => {
            warn!(target: "distribute", error = %e, "manual send failed");
            Err(api_error(StatusCode::SERVICE_UNAVAILABLE, e))
        }
    }
}

#[derive(Debug, Deserialize)]
struct PreviewQuery {
    portfolio_id: Option<PortfolioId>,
    date: Option<NaiveDate>,
}

async fn preview(
    State(state): State<AppState>,
    Query(q): Query<PreviewQuery>,
) -> ApiResult<RenderedEmail> {
    match state.driver.preview(q.portfolio_id, q.date).await {
        Ok(email) => Ok(Json(email)),
        Err(e @ ComposeError::PortfolioNotFound(_)) => Err(api_error(StatusCode::NOT_FOUND, e)),
        Err(e @ ComposeError::Store(_)) => Err(api_error(StatusCode::SERVICE_UNAVAILABLE, e)),
    }
}

#[derive(Debug, Deserialize)]
struct LogQuery {
    limit: Option<usize>,
}

async fn email_log(
    State(state): State<AppState>,
    Query(q): Query<LogQuery>,
) -> ApiResult<Vec<EmailLogEntry>> {
    let limit = q.limit.unwrap_or(EMAIL_LOG_DEFAULT).clamp(1, EMAIL_LOG_MAX);
    state
        .email_log
        .list_recent(limit)
        .await
        .map(Json)
        .map_err(|e| api_error(StatusCode::SERVICE_UNAVAILABLE, e))
}
