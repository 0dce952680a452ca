//! FocusForge API Server
//!
//! REST control surface for the study monitor: user registration, stats
//! and the start/stop monitoring signals.

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use metrics_exporter_prometheus::PrometheusHandle;
use monitor::{MonitorController, MonitorError, SessionError};
use serde::Serialize;
use std::sync::Arc;
use storage::{JsonFileStore, MemoryStore, StatsStore, StorageError};
use thiserror::Error;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

pub mod config;
mod routes;

pub use config::{AppConfig, LoggingConfig, ServerConfig, StorageBackend, StorageConfig};

/// Application state shared across handlers
pub struct AppState {
    pub controller: Arc<MonitorController>,
    pub version: String,
    pub start_time: std::time::Instant,
    /// Present once a Prometheus recorder is installed
    pub metrics: Option<PrometheusHandle>,
}

impl AppState {
    pub fn new(controller: Arc<MonitorController>, metrics: Option<PrometheusHandle>) -> Self {
        Self {
            controller,
            version: env!("CARGO_PKG_VERSION").to_string(),
            start_time: std::time::Instant::now(),
            metrics,
        }
    }
}

pub type SharedState = Arc<AppState>;

/// API errors
#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Monitor(#[from] MonitorError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Conflict(String),
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::Monitor(MonitorError::Session(
                SessionError::AlreadyRunning { .. } | SessionError::NotRunning,
            )) => StatusCode::CONFLICT,
            ApiError::Monitor(MonitorError::StatsNotRecorded { .. }) => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            ApiError::Monitor(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Storage(StorageError::UnknownUser(_)) => StatusCode::NOT_FOUND,
            ApiError::Storage(StorageError::InvalidDuration(_)) => StatusCode::BAD_REQUEST,
            ApiError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            warn!("Request failed: {}", self);
        }
        (status, Json(ErrorBody { error: self.to_string() })).into_response()
    }
}

/// Health response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: u64,
    pub version: String,
    pub uptime_seconds: u64,
    pub monitoring_active: bool,
}

/// Create the application router
pub fn create_router(state: SharedState) -> Router {
    Router::new()
        .route("/api/v1/health", get(health_handler))
        .route("/api/v1/users", post(routes::users::register_user))
        .route("/api/v1/users/:user_id/stats", get(routes::users::get_stats))
        .route("/api/v1/monitoring", get(routes::monitoring::get_status))
        .route("/api/v1/monitoring/start", post(routes::monitoring::start))
        .route("/api/v1/monitoring/stop", post(routes::monitoring::stop))
        .route("/metrics", get(metrics_handler))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn health_handler(State(state): State<SharedState>) -> impl IntoResponse {
    let timestamp = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);

    Json(HealthResponse {
        status: "healthy".to_string(),
        timestamp,
        version: state.version.clone(),
        uptime_seconds: state.start_time.elapsed().as_secs(),
        monitoring_active: state.controller.status().await.active,
    })
}

async fn metrics_handler(State(state): State<SharedState>) -> Response {
    match &state.metrics {
        Some(handle) => (
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            handle.render(),
        )
            .into_response(),
        None => (StatusCode::NOT_FOUND, "metrics recorder not installed").into_response(),
    }
}

/// Open the configured stats store
pub fn open_store(config: &StorageConfig) -> Result<Arc<dyn StatsStore>, StorageError> {
    match config.backend {
        StorageBackend::Json => {
            let store = JsonFileStore::open(&config.path)?;
            info!("User data at {}", store.path().display());
            Ok(Arc::new(store))
        }
        StorageBackend::Memory => {
            warn!("Using in-memory storage; stats are lost on exit");
            Ok(Arc::new(MemoryStore::new()))
        }
    }
}

/// Initialize logging
pub fn init_logging(config: &LoggingConfig) {
    let level = config.level.parse::<Level>().unwrap_or(Level::INFO);
    let builder = FmtSubscriber::builder().with_max_level(level).with_target(true);

    let result = if config.json {
        tracing::subscriber::set_global_default(builder.json().finish())
    } else {
        tracing::subscriber::set_global_default(builder.finish())
    };
    result.expect("Failed to set tracing subscriber");
}

/// Run the server until Ctrl-C
///
/// A session still open at shutdown is stopped so its time is credited.
pub async fn run_server(addr: &str, state: SharedState) -> std::io::Result<()> {
    let app = create_router(state.clone());

    info!("Starting API server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(state))
        .await
}

async fn shutdown_signal(state: SharedState) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Ctrl-C handler unavailable: {}", e);
        std::future::pending::<()>().await;
    }

    info!("Shutting down");
    if state.controller.status().await.active {
        match state.controller.stop_monitoring().await {
            Ok(report) => info!("Closed open session, {:.2}s credited", report.focused_secs),
            Err(e) => warn!("Open session not closed cleanly: {}", e),
        }
    }
}


#[cfg(test)]
mod tests {
    use super::testing::*;
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    #[tokio::test]
    async fn test_health() {
        let h = harness();
        let response = h
            .app
            .oneshot(Request::get("/api/v1/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["monitoring_active"], false);
    }

    #[tokio::test]
    async fn test_metrics_without_recorder() {
        let h = harness();
        let response = h
            .app
            .oneshot(Request::get("/metrics").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_error_status_mapping() {
        let conflict = ApiError::from(MonitorError::from(SessionError::NotRunning));
        assert_eq!(conflict.status(), StatusCode::CONFLICT);

        let unknown = ApiError::from(StorageError::UnknownUser("ghost".into()));
        assert_eq!(unknown.status(), StatusCode::NOT_FOUND);

        let unrecorded = ApiError::from(MonitorError::StatsNotRecorded {
            user_id: "student".into(),
            source: StorageError::Io("disk".into()),
        });
        assert_eq!(unrecorded.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn test_open_memory_store() {
        let config = StorageConfig {
            backend: StorageBackend::Memory,
            ..Default::default()
        };
        let store = open_store(&config).unwrap();
        assert!(store.register_user("a", storage::UserProfile::default()).unwrap());
    }

    #[test]
    fn test_open_json_store_creates_file() {
        let dir = tempfile::tempdir().unwrap();
        let config = StorageConfig {
            backend: StorageBackend::Json,
            path: dir.path().join("users.json"),
        };
        open_store(&config).unwrap();
        assert!(config.path.exists());
    }
}
