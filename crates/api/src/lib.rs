//! Swing Stats API Server
//!
//! Upload, query, and dashboard endpoints over the ingestion pipeline and
//! record repository.

use axum::{
    extract::{DefaultBodyLimit, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use feature_engine::FeatureError;
use ingest::IngestPipeline;
use insight::{InsightEngine, Presenter};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use serde::Serialize;
use serde_json::json;
use std::future::Future;
use std::net::SocketAddr;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Instant;
use storage::{Repository, StorageError};
use thiserror::Error;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_governor::GovernorLayer;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

pub mod rate_limit;
mod routes;
pub mod settings;

pub use rate_limit::{create_governor_config, RateLimitConfig};
pub use settings::{AppConfig, LoggingConfig, ServerConfig};

/// Server setup errors
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Invalid feature configuration: {0}")]
    Feature(#[from] FeatureError),
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Logging setup failed: {0}")]
    Logging(String),
    #[error("Metrics setup failed: {0}")]
    Metrics(String),
    #[error("Invalid rate limit: {0}")]
    RateLimit(String),
}

/// Application state shared across handlers
pub struct AppState {
    /// Record repository
    pub repository: Repository,
    /// Upload ingestion pipeline
    pub pipeline: IngestPipeline,
    /// Insight and projection source for query responses
    pub presenter: Box<dyn Presenter>,
    /// Loaded configuration
    pub config: AppConfig,
    /// Prometheus handle, when the recorder is installed
    pub metrics: Option<PrometheusHandle>,
    /// Version string
    pub version: String,
    /// Start time
    pub start_time: Instant,
}

impl AppState {
    /// Create application state; fails on feature parameters the pipeline rejects
    pub fn new(config: AppConfig, repository: Repository) -> Result<Self, ApiError> {
        let pipeline = IngestPipeline::new(config.features.clone(), config.records.clone())?
            .with_max_entry_bytes(config.max_entry_bytes);
        let presenter = InsightEngine::new(config.insight.clone(), pipeline.signal_column());

        Ok(Self {
            repository,
            pipeline,
            presenter: Box::new(presenter),
            config,
            metrics: None,
            version: env!("CARGO_PKG_VERSION").to_string(),
            start_time: Instant::now(),
        })
    }

    /// Serve `/metrics` from this handle
    pub fn with_metrics(mut self, handle: PrometheusHandle) -> Self {
        self.metrics = Some(handle);
        self
    }

    /// Replace the presenter
    pub fn with_presenter(mut self, presenter: Box<dyn Presenter>) -> Self {
        self.presenter = presenter;
        self
    }
}

/// Health response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: i64,
    pub version: String,
    pub uptime_seconds: u64,
    pub record_count: Option<usize>,
}

/// Create the application router
pub fn create_router(state: Arc<AppState>) -> Result<Router, ApiError> {
    let mut upload = Router::new().route("/api/v1/upload", post(routes::upload::upload));
    if state.config.rate_limit.enabled {
        let config = create_governor_config(&state.config.rate_limit)?;
        info!(
            "Rate limiting uploads: burst {}, one request per {}s",
            state.config.rate_limit.burst_size, state.config.rate_limit.per_second
        );
        upload = upload.layer(GovernorLayer { config });
    }

    let router = Router::new()
        .route("/", get(index_handler))
        .route("/api/v1/health", get(health_handler))
        .route("/api/v1/stats", get(routes::stats::get_stats))
        .route("/dashboard", get(routes::dashboard::dashboard))
        .route("/metrics", get(metrics_handler))
        .merge(upload)
        .layer(DefaultBodyLimit::max(state.config.max_upload_bytes))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
        .with_state(state);

    Ok(router)
}

/// Service banner and endpoint directory
async fn index_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(json!({
        "service": "swing-stats",
        "version": state.version,
        "endpoints": {
            "upload": "POST /api/v1/upload (multipart, field \"files\", .csv or .zip)",
            "stats": "GET /api/v1/stats?limit=N",
            "dashboard": "GET /dashboard",
            "health": "GET /api/v1/health",
            "metrics": "GET /metrics",
        },
    }))
}

/// Health check handler
async fn health_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let record_count = match state.repository.count().await {
        Ok(count) => Some(count),
        Err(e) => {
            warn!("Health check could not count records: {}", e);
            None
        }
    };

    let status = if record_count.is_some() { "healthy" } else { "degraded" };

    Json(HealthResponse {
        status: status.to_string(),
        timestamp: chrono::Utc::now().timestamp(),
        version: state.version.clone(),
        uptime_seconds: state.start_time.elapsed().as_secs(),
        record_count,
    })
}

/// Prometheus text exposition
async fn metrics_handler(State(state): State<Arc<AppState>>) -> Response {
    match &state.metrics {
        Some(handle) => (
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            handle.render(),
        )
            .into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

/// Initialize logging
pub fn init_logging(config: &LoggingConfig) -> Result<(), ApiError> {
    let level = Level::from_str(&config.level)
        .map_err(|e| ApiError::Logging(format!("level {:?}: {}", config.level, e)))?;

    let builder = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true);

    let result = if config.json {
        tracing::subscriber::set_global_default(builder.json().finish())
    } else {
        tracing::subscriber::set_global_default(builder.finish())
    };

    result.map_err(|e| ApiError::Logging(e.to_string()))
}

/// Install the global Prometheus recorder
pub fn install_metrics() -> Result<PrometheusHandle, ApiError> {
    PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| ApiError::Metrics(e.to_string()))
}

/// Serve on an already bound listener until `shutdown` resolves
pub async fn serve<F>(listener: TcpListener, state: Arc<AppState>, shutdown: F) -> Result<(), ApiError>
where
    F: Future<Output = ()> + Send + 'static,
{
    let app = create_router(Arc::clone(&state))?;

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown)
    .await?;

    state.repository.close().await;
    info!("Server stopped");
    Ok(())
}

/// Run the server until Ctrl-C
pub async fn run_server(state: AppState) -> Result<(), ApiError> {
    let addr = state.config.server.bind_addr.clone();
    let listener = TcpListener::bind(&addr).await?;

    info!("Starting API server on {}", addr);
    serve(listener, Arc::new(state), shutdown_signal()).await
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Shutdown requested"),
        Err(e) => {
            warn!("Cannot listen for Ctrl-C, running until killed: {}", e);
            std::future::pending::<()>().await;
        }
    }
}
