//! Drowsy Monitor API Server
//!
//! Session dashboard API plus the pieces of the `drowsy-monitor` binary:
//! - `GET /api/v1/health`, `/api/v1/sessions`, `/metrics`
//! - Collaborator wiring from `MonitorConfig`
//! - Terminal UI for a running monitoring session

use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use metrics_exporter_prometheus::PrometheusHandle;
use serde::Serialize;
use std::sync::Arc;
use storage::SessionStore;
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

pub mod bootstrap;
pub mod cli;
pub mod routes;
pub mod ui;

/// Application state shared across handlers
pub struct AppState {
    /// Session store
    pub store: Arc<dyn SessionStore>,
    /// Version string
    pub version: String,
    /// Start time
    pub start_time: std::time::Instant,
    /// Prometheus exporter, when installed
    pub metrics: Option<PrometheusHandle>,
}

impl AppState {
    /// Create new application state
    pub fn new(store: Arc<dyn SessionStore>) -> Self {
        Self {
            store,
            version: env!("CARGO_PKG_VERSION").to_string(),
            start_time: std::time::Instant::now(),
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, handle: PrometheusHandle) -> Self {
        self.metrics = Some(handle);
        self
    }
}

/// Health response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: u64,
    pub version: String,
    pub uptime_seconds: u64,
    pub components: ComponentStatus,
    pub metrics: SystemMetrics,
}

/// Component status
#[derive(Debug, Serialize)]
pub struct ComponentStatus {
    pub database: ComponentHealth,
}

/// Individual component health
#[derive(Debug, Serialize)]
pub struct ComponentHealth {
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// System metrics
#[derive(Debug, Serialize)]
pub struct SystemMetrics {
    pub session_count: u64,
}

/// Create the application router
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/v1/health", get(health_handler))
        .route("/api/v1/sessions", get(routes::sessions::list_sessions))
        .route(
            "/api/v1/sessions/:username/:session_id",
            get(routes::sessions::get_session),
        )
        .route("/metrics", get(metrics_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Health check handler
async fn health_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let timestamp = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);

    let (database, session_count) = match state.store.session_count().await {
        Ok(count) => (
            ComponentHealth {
                status: "ok".to_string(),
                error: None,
            },
            count,
        ),
        Err(e) => (
            ComponentHealth {
                status: "error".to_string(),
                error: Some(e.to_string()),
            },
            0,
        ),
    };

    let status = if database.error.is_none() { "healthy" } else { "degraded" };

    Json(HealthResponse {
        status: status.to_string(),
        timestamp,
        version: state.version.clone(),
        uptime_seconds: state.start_time.elapsed().as_secs(),
        components: ComponentStatus { database },
        metrics: SystemMetrics { session_count },
    })
}

/// Prometheus text exposition
async fn metrics_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    match &state.metrics {
        Some(handle) => (StatusCode::OK, handle.render()),
        None => (StatusCode::NOT_FOUND, "metrics exporter not installed\n".to_string()),
    }
}

/// Initialize logging. `RUST_LOG` wins over the `-v` count.
pub fn init_logging(verbosity: u8) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| match verbosity {
        0 => EnvFilter::new("warn"),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    });

    // A subscriber may already be installed (tests)
    let _ = tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
        .with(filter)
        .try_init();
}

/// Run the server
pub async fn run_server(addr: &str, state: AppState) -> anyhow::Result<()> {
    let app = create_router(Arc::new(state));

    info!("Starting API server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use chrono::{TimeZone, Utc};
    use drowsiness::{DriverStats, DrowsinessState};
    use storage::{MetricRow, RerouteFlag, Repository, SessionRecord};
    use tower::ServiceExt;

    fn session(username: &str, hour: u32, flags: &[RerouteFlag]) -> SessionRecord {
        let start = Utc.with_ymd_and_hms(2024, 3, 1, hour, 0, 0).unwrap();
        SessionRecord {
            session_id: format!("session_2024-03-01_{hour:02}-00-00"),
            username: username.to_string(),
            start_timestamp: start,
            metrics: flags
                .iter()
                .map(|flag| {
                    let state = if *flag == RerouteFlag::Yes {
                        DrowsinessState::Strong
                    } else {
                        DrowsinessState::Normal
                    };
                    MetricRow::new(start, &DriverStats::default(), state, *flag)
                })
                .collect(),
        }
    }

    async fn app() -> Router {
        let store = Arc::new(Repository::new());
        store.insert_session(&session("asha", 8, &[RerouteFlag::None])).await.unwrap();
        store
            .insert_session(&session("asha", 10, &[RerouteFlag::None, RerouteFlag::Yes]))
            .await
            .unwrap();
        store.insert_session(&session("ben", 9, &[])).await.unwrap();
        create_router(Arc::new(AppState::new(store)))
    }

    async fn get_json(app: Router, uri: &str) -> (StatusCode, serde_json::Value) {
        let response = app
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json = serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null);
        (status, json)
    }

    #[tokio::test]
    async fn test_health_reports_session_count() {
        let (status, body) = get_json(app().await, "/api/v1/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["metrics"]["session_count"], 3);
    }

    #[tokio::test]
    async fn test_sessions_latest_first_by_default() {
        let (status, body) = get_json(app().await, "/api/v1/sessions?username=asha").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["count"], 2);
        assert_eq!(body["data"][0]["session_id"], "session_2024-03-01_10-00-00");
        assert_eq!(body["data"][0]["reroutes"], 1);
        assert_eq!(body["data"][0]["peak_state"], "STRONG");
    }

    #[tokio::test]
    async fn test_sessions_oldest_first() {
        let (_, body) = get_json(app().await, "/api/v1/sessions?username=asha&order=oldest").await;
        assert_eq!(body["data"][0]["session_id"], "session_2024-03-01_08-00-00");
    }

    #[tokio::test]
    async fn test_blank_username_is_bad_request() {
        let (status, body) = get_json(app().await, "/api/v1/sessions?username=%20").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().contains("username"));
    }

    #[tokio::test]
    async fn test_session_detail_and_not_found() {
        let (status, body) = get_json(app().await, "/api/v1/sessions/asha/session_2024-03-01_10-00-00").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["session"]["metrics"][1]["reroute_triggered"], "Yes");
        assert_eq!(body["summary"]["total_rows"], 2);

        let (status, _) = get_json(app().await, "/api/v1/sessions/ben/session_2024-03-01_10-00-00").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_metrics_without_exporter() {
        let response = app()
            .await
            .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
