//! HTTP front end for answer search.
//!
//! Loads the configured Q&A table once and serves ranked results to any
//! number of clients (a chat widget, scripts, other services).
//!
//! # Usage
//!
//! ```bash
//! TANYA_DATASET=./qa_with_embeddings.json tanya-service
//! ```
//!
//! # Endpoints
//!
//! - `GET /health` - readiness of the dataset and embedding backend
//! - `POST /api/search` - rank answers for `{ "query": "...", "top_k": 5 }`
//! - `GET /api/dataset` - summary of the loaded table
//! - `POST /api/dataset/reload` - re-read the table from its source
//! - `GET /api/backends` - embedding backends compiled into this binary
//!
//! # Environment Variables
//!
//! - `TANYA_LOG`: logging filter (default: `info,tanya=debug`)
//! - `TANYA_DATA_DIR`: override the data directory
//! - `TANYA_DATASET`: path or URL of the embedded Q&A table
//! - `TANYA_SERVICE_HOST`: bind address (default: 127.0.0.1)
//! - `TANYA_SERVICE_PORT`: port (default: 3200)

#[cfg(feature = "http-service")]
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};

#[cfg(feature = "http-service")]
use tanya_lib::{
    application::{EmbeddingBackendListResponse, SearchRequest, SearchResponse, SearchService},
    build_backend_response,
    domain::{DatasetSummary, DomainError},
    settings::ConfigManager,
    ServiceCell,
};

#[cfg(feature = "http-service")]
use anyhow::Context;

#[cfg(feature = "http-service")]
use serde::Serialize;

#[cfg(feature = "http-service")]
use std::{net::SocketAddr, sync::Arc};

#[cfg(feature = "http-service")]
use tracing::{error, info};

#[cfg(feature = "http-service")]
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

// ============================================================================
// Data Types
// ============================================================================

#[cfg(feature = "http-service")]
#[derive(Clone)]
struct AppState {
    service: ServiceCell,
    config: Arc<ConfigManager>,
}

#[cfg(feature = "http-service")]
impl AppState {
    fn current_service(&self) -> Arc<SearchService> {
        Arc::clone(&self.service.read())
    }
}

#[cfg(feature = "http-service")]
#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
    code: String,
}

#[cfg(feature = "http-service")]
struct ApiError {
    status: StatusCode,
    body: ErrorResponse,
}

#[cfg(feature = "http-service")]
impl ApiError {
    fn new(status: StatusCode, code: &str, error: impl Into<String>) -> Self {
        Self {
            status,
            body: ErrorResponse {
                error: error.into(),
                code: code.to_string(),
            },
        }
    }
}

#[cfg(feature = "http-service")]
impl From<DomainError> for ApiError {
    fn from(err: DomainError) -> Self {
        let (status, code) = match &err {
            DomainError::Validation(_) => (StatusCode::BAD_REQUEST, "INVALID_REQUEST"),
            DomainError::LimitExceeded(_) => (StatusCode::PAYLOAD_TOO_LARGE, "LIMIT_EXCEEDED"),
            DomainError::DimensionMismatch { .. } => {
                (StatusCode::UNPROCESSABLE_ENTITY, "DIMENSION_MISMATCH")
            }
            DomainError::Dataset(_) => (StatusCode::BAD_GATEWAY, "DATASET_UNAVAILABLE"),
            DomainError::Embedding(_) => (StatusCode::BAD_GATEWAY, "EMBEDDING_FAILED"),
        };
        Self::new(status, code, err.to_string())
    }
}

#[cfg(feature = "http-service")]
impl From<tokio::task::JoinError> for ApiError {
    fn from(err: tokio::task::JoinError) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "TASK_FAILED", err.to_string())
    }
}

#[cfg(feature = "http-service")]
impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}

// ============================================================================
// HTTP Handlers
// ============================================================================

#[cfg(feature = "http-service")]
async fn health_check(State(state): State<AppState>) -> Response {
    let service = state.current_service();
    match tokio::task::spawn_blocking(move || service.health()).await {
        Ok(Ok(status)) => Json(status).into_response(),
        Ok(Err(err)) => {
            error!(target: "tanya::service", "health check failed: {}", err);
            ApiError::new(StatusCode::SERVICE_UNAVAILABLE, "UNHEALTHY", err.to_string())
                .into_response()
        }
        Err(err) => ApiError::from(err).into_response(),
    }
}

#[cfg(feature = "http-service")]
async fn search_answers(
    State(state): State<AppState>,
    Json(payload): Json<SearchRequest>,
) -> Result<Json<SearchResponse>, ApiError> {
    let service = state.current_service();
    let response = tokio::task::spawn_blocking(move || service.search(payload))
        .await?
        .map_err(|err| {
            error!(target: "tanya::service", "search failed: {}", err);
            ApiError::from(err)
        })?;

    Ok(Json(response))
}

#[cfg(feature = "http-service")]
async fn dataset_info(State(state): State<AppState>) -> Json<DatasetSummary> {
    Json(state.current_service().dataset_info())
}

#[cfg(feature = "http-service")]
async fn reload_dataset(State(state): State<AppState>) -> Result<Json<DatasetSummary>, ApiError> {
    let service = state.current_service();
    let summary = tokio::task::spawn_blocking(move || service.reload_dataset())
        .await?
        .map_err(|err| {
            error!(target: "tanya::service", "dataset reload failed: {}", err);
            ApiError::from(err)
        })?;

    info!(target: "tanya::service", records = summary.records, "dataset reloaded");
    Ok(Json(summary))
}

#[cfg(feature = "http-service")]
async fn list_backends(State(state): State<AppState>) -> Json<EmbeddingBackendListResponse> {
    let active = state.config.current().embedding;
    let service = state.current_service();
    Json(build_backend_response(active, &service))
}

// ============================================================================
// Service Setup and Main
// ============================================================================

#[cfg(feature = "http-service")]
fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/api/search", post(search_answers))
        .route("/api/dataset", get(dataset_info))
        .route("/api/dataset/reload", post(reload_dataset))
        .route("/api/backends", get(list_backends))
        .with_state(state)
}

#[cfg(feature = "http-service")]
async fn run_service() -> anyhow::Result<()> {
    let filter = std::env::var("TANYA_LOG").unwrap_or_else(|_| "info,tanya=debug".into());
    tracing_subscriber::registry()
        .with(EnvFilter::new(filter))
        .with(fmt::layer().with_target(true).with_thread_ids(true))
        .init();

    info!(
        "Starting Tanya search service v{}",
        env!("CARGO_PKG_VERSION")
    );

    let app_handles = tokio::task::spawn_blocking(tanya_lib::build_environment)
        .await
        .context("initialization task panicked")?
        .context("failed to initialize application")?;

    info!("Data directory: {}", app_handles.data_dir.display());
    info!(
        "Dataset: {} ({} records)",
        app_handles.dataset.origin(),
        app_handles.service.dataset_info().records
    );

    let state = AppState {
        service: app_handles.service_cell(),
        config: app_handles.config,
    };

    let host = std::env::var("TANYA_SERVICE_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
    let port: u16 = std::env::var("TANYA_SERVICE_PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(3200);

    let addr: SocketAddr = format!("{}:{}", host, port)
        .parse()
        .with_context(|| format!("invalid bind address {host}:{port}"))?;

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;

    info!("Tanya search service listening on http://{}", addr);
    info!("Health check: http://{}/health", addr);

    axum::serve(listener, router(state))
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await
        .context("server failed")?;

    Ok(())
}

#[cfg(feature = "http-service")]
#[tokio::main]
async fn main() {
    if let Err(err) = run_service().await {
        eprintln!("[tanya::service] Service failed: {err:?}");
        std::process::exit(1);
    }
}

#[cfg(not(feature = "http-service"))]
fn main() {
    eprintln!("[tanya::service] Build with `--features http-service` to enable the service.");
    eprintln!("Example: cargo build --release --bin tanya-service --features http-service");
    std::process::exit(1);
}
