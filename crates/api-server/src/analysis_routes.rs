//! Analysis API Routes
//!
//! Run the pipeline for a ticker, look runs up by id and fetch the latest
//! completed report.

use analysis_core::Timeframe;
use analysis_orchestrator::{AnalysisRunRequest, AnalysisRunResponse, TimeBound};
use axum::{
    extract::{Path, Query, State},
    routing::{get, post},
    Json, Router,
};
use chrono::{Duration, Utc};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::{ApiResponse, AppError, AppState};

const DEFAULT_LONG_TERM_YEARS: i64 = 5;
const MAX_LONG_TERM_YEARS: i64 = 15;

#[derive(Debug, Deserialize)]
pub struct RunAnalysisBody {
    pub ticker: String,
    pub start: String,
    pub end: String,
    #[serde(default)]
    pub timeframe: Option<String>,
    #[serde(default = "default_include_news")]
    pub include_news: bool,
}

fn default_include_news() -> bool {
    true
}

#[derive(Debug, Deserialize)]
pub struct TickerQuery {
    pub ticker: String,
}

#[derive(Debug, Deserialize)]
pub struct LongTermQuery {
    pub ticker: String,
    #[serde(default)]
    pub years: Option<i64>,
}

pub fn analysis_routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .route("/v1/analysis/run", post(run_analysis))
        .route("/v1/analysis/run/:run_id", get(get_run))
        .route("/v1/report/latest", get(latest_report))
        .route("/v1/report/long-term", get(long_term_report))
}

async fn health() -> Json<Value> {
    Json(json!({ "ok": true }))
}

/// A failed run is still a 200; only malformed requests are rejected
async fn run_analysis(
    State(state): State<AppState>,
    Json(body): Json<RunAnalysisBody>,
) -> Result<Json<ApiResponse<AnalysisRunResponse>>, AppError> {
    let request = AnalysisRunRequest::parse(
        &body.ticker,
        &body.start,
        &body.end,
        body.timeframe.as_deref(),
        body.include_news,
    )
    .map_err(AppError::bad_request)?;

    let response = state.orchestrator.run(&request).await;
    Ok(Json(ApiResponse::success(response)))
}

async fn get_run(
    State(state): State<AppState>,
    Path(run_id): Path<String>,
) -> Result<Json<ApiResponse<AnalysisRunResponse>>, AppError> {
    let response = state.orchestrator.get_run(&run_id).await?;
    Ok(Json(ApiResponse::success(response)))
}

async fn latest_report(
    State(state): State<AppState>,
    Query(query): Query<TickerQuery>,
) -> Result<Json<ApiResponse<AnalysisRunResponse>>, AppError> {
    let response = state.orchestrator.latest_report(&query.ticker).await?;
    Ok(Json(ApiResponse::success(response)))
}

/// Daily-bar run over the trailing `years` (1 to 15), without news
async fn long_term_report(
    State(state): State<AppState>,
    Query(query): Query<LongTermQuery>,
) -> Result<Json<ApiResponse<AnalysisRunResponse>>, AppError> {
    let years = query
        .years
        .unwrap_or(DEFAULT_LONG_TERM_YEARS)
        .clamp(1, MAX_LONG_TERM_YEARS);
    let end = Utc::now();
    let start = end - Duration::days(365 * years);

    let request = AnalysisRunRequest::new(&query.ticker, TimeBound::Instant(start), TimeBound::Instant(end))
        .with_timeframe(Timeframe::Day1)
        .with_news(false);
    request.validate().map_err(AppError::bad_request)?;

    let response = state.orchestrator.run(&request).await;
    Ok(Json(ApiResponse::success(response)))
}
