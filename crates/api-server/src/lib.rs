//! HTTP surface for the analysis pipeline: run submission, run lookup and
//! latest/long-term reports, plus server bootstrap.

use analysis_orchestrator::AnalysisOrchestrator;
use analysis_store::{AnalysisDb, DEFAULT_DATABASE_URL};
use axum::{
    http::{HeaderValue, Method, StatusCode},
    middleware,
    response::{IntoResponse, Response},
    Json, Router,
};
use llm_client::OpenAiCompatibleClient;
use polygon_client::PolygonClient;
use serde::Serialize;
use std::net::SocketAddr;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

mod analysis_routes;
mod request_id;

pub use analysis_routes::analysis_routes;
pub use request_id::{request_id_middleware, RequestId};

const DEFAULT_LOG_FILTER: &str = "api_server=info,analysis_orchestrator=info,tower_http=info";
const DASHBOARD_ORIGINS: [&str; 2] = ["http://localhost:3000", "http://127.0.0.1:3000"];

/// Server settings read from the environment
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub host: String,
    pub port: u16,
    pub polygon_api_key: String,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        let polygon_api_key = std::env::var("POLYGON_API_KEY")
            .map_err(|_| anyhow::anyhow!("POLYGON_API_KEY must be set"))?;
        let port = match std::env::var("API_PORT") {
            Ok(raw) => raw
                .parse()
                .map_err(|_| anyhow::anyhow!("API_PORT must be a port number, got '{}'", raw))?,
            Err(_) => 3000,
        };

        Ok(Self {
            database_url: std::env::var("DATABASE_URL").unwrap_or_else(|_| DEFAULT_DATABASE_URL.to_string()),
            host: std::env::var("API_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port,
            polygon_api_key,
        })
    }
}

#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<AnalysisOrchestrator>,
}

#[derive(Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn error(message: String) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message),
        }
    }
}

/// Handler error rendered as an `ApiResponse` with a status code
pub struct AppError {
    status: StatusCode,
    error: anyhow::Error,
}

impl AppError {
    pub fn with_status(status: StatusCode, error: anyhow::Error) -> Self {
        Self { status, error }
    }

    pub fn bad_request(error: impl Into<anyhow::Error>) -> Self {
        Self::with_status(StatusCode::BAD_REQUEST, error.into())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            tracing::error!("Request failed: {:#}", self.error);
        }
        let body = ApiResponse::<()>::error(format!("{:#}", self.error));
        (self.status, Json(body)).into_response()
    }
}

impl<E> From<E> for AppError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        Self::with_status(StatusCode::INTERNAL_SERVER_ERROR, err.into())
    }
}

/// Install the global subscriber. `LOG_FORMAT=json` selects JSON lines.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    let json = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_target(true);
    let result = if json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
    if result.is_err() {
        tracing::debug!("Tracing subscriber already installed");
    }
}

pub fn build_router(state: AppState) -> Router {
    let origins: Vec<HeaderValue> = DASHBOARD_ORIGINS
        .iter()
        .filter_map(|o| HeaderValue::from_str(o).ok())
        .collect();
    let cors = CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([axum::http::header::CONTENT_TYPE]);

    Router::new()
        .merge(analysis_routes())
        .layer(
            ServiceBuilder::new()
                .layer(middleware::from_fn(request_id_middleware))
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
        .with_state(state)
}

/// Assemble the orchestrator from configuration. The external model is
/// attached only when `OPENAI_API_KEY` is present.
pub async fn build_orchestrator(config: &Config) -> anyhow::Result<AnalysisOrchestrator> {
    let db = AnalysisDb::new(&config.database_url).await?;
    tracing::info!("Database ready at {}", config.database_url);

    let polygon = Arc::new(PolygonClient::new(config.polygon_api_key.clone()));
    let mut orchestrator = AnalysisOrchestrator::new(db, polygon.clone(), polygon);

    let llm = OpenAiCompatibleClient::from_env()?;
    if llm.is_configured() {
        tracing::info!("External report model enabled");
        orchestrator = orchestrator.with_llm(Arc::new(llm));
    } else {
        tracing::info!("OPENAI_API_KEY not set, reports will be rule-based");
    }

    Ok(orchestrator)
}

pub async fn run_server() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let config = Config::from_env()?;
    let orchestrator = build_orchestrator(&config).await?;
    let state = AppState {
        orchestrator: Arc::new(orchestrator),
    };

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("API server listening on {}", addr);

    axum::serve(listener, build_router(state)).await?;
    Ok(())
}
