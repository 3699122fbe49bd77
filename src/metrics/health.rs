//! HTTP monitoring surface: health probes, Prometheus metrics, queue listing
//!
//! Serves the observability endpoints over Axum. Matchmaking itself never
//! depends on this server; it only reads engine state.

use crate::metrics::collector::MetricsCollector;
use crate::service::app::AppState;
use crate::service::health::{HealthCheck, HealthStatus};
use anyhow::{Context, Result};
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use prometheus::{Encoder, TextEncoder};
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tracing::{debug, error, info};

/// Where the monitoring server binds
#[derive(Debug, Clone)]
pub struct HealthServerConfig {
    pub port: u16,
    pub host: String,
}

impl Default for HealthServerConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            host: "0.0.0.0".to_string(),
        }
    }
}

/// State shared with every handler
#[derive(Clone)]
struct MonitorState {
    metrics: Arc<MetricsCollector>,
    app: Option<Arc<AppState>>,
}

/// The monitoring HTTP server
pub struct HealthServer {
    config: HealthServerConfig,
    state: MonitorState,
    shutdown_tx: broadcast::Sender<()>,
}

impl HealthServer {
    pub fn new(config: HealthServerConfig, metrics: Arc<MetricsCollector>) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);
        Self {
            config,
            state: MonitorState { metrics, app: None },
            shutdown_tx,
        }
    }

    /// Attach the application state so probes can inspect the engine
    pub fn with_app_state(mut self, app: Arc<AppState>) -> Self {
        self.state.app = Some(app);
        self
    }

    /// Bind and serve until a shutdown signal arrives
    pub async fn start(&self) -> Result<()> {
        let addr: SocketAddr = format!("{}:{}", self.config.host, self.config.port)
            .parse()
            .context("Invalid monitoring server address")?;
        let listener = TcpListener::bind(addr).await?;
        info!("Monitoring endpoints available on http://{}", addr);

        let mut shutdown_rx = self.shutdown_tx.subscribe();
        axum::serve(listener, self.router())
            .with_graceful_shutdown(async move {
                let _ = shutdown_rx.recv().await;
            })
            .await?;

        info!("Monitoring server stopped");
        Ok(())
    }

    /// Signal the serving task to drain and exit
    pub async fn stop(&self) -> Result<()> {
        // Nobody listening just means start() was never reached; harmless.
        let _ = self.shutdown_tx.send(());
        Ok(())
    }

    fn router(&self) -> Router {
        Router::new()
            .route("/", get(index))
            .route("/health", get(health))
            .route("/ready", get(ready))
            .route("/alive", get(alive))
            .route("/metrics", get(metrics))
            .route("/stats", get(stats))
            .route("/queues", get(queues))
            .with_state(self.state.clone())
    }
}

fn service_info(status: &str) -> Value {
    json!({
        "status": status,
        "service": "party-finder",
        "version": env!("CARGO_PKG_VERSION"),
    })
}

async fn index() -> impl IntoResponse {
    Json(json!({
        "service": "party-finder",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": ["/health", "/ready", "/alive", "/metrics", "/stats", "/queues"],
    }))
}

async fn health(State(state): State<MonitorState>) -> impl IntoResponse {
    let status = match &state.app {
        Some(app) => HealthCheck::liveness_check(app.clone())
            .await
            .unwrap_or(HealthStatus::Unhealthy),
        None => HealthStatus::Unhealthy,
    };

    let code = match status {
        HealthStatus::Healthy | HealthStatus::Degraded => StatusCode::OK,
        HealthStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    };
    (code, Json(service_info(&status.to_string())))
}

async fn ready(State(state): State<MonitorState>) -> impl IntoResponse {
    let Some(app) = &state.app else {
        return (StatusCode::SERVICE_UNAVAILABLE, "Service not initialized");
    };

    match HealthCheck::readiness_check(app.clone()).await {
        Ok(HealthStatus::Healthy) => (StatusCode::OK, "Ready"),
        Ok(HealthStatus::Degraded) => (StatusCode::OK, "Degraded but ready"),
        Ok(HealthStatus::Unhealthy) => (StatusCode::SERVICE_UNAVAILABLE, "Not ready"),
        Err(e) => {
            error!("Readiness probe failed: {}", e);
            (StatusCode::SERVICE_UNAVAILABLE, "Not ready")
        }
    }
}

async fn alive(State(state): State<MonitorState>) -> impl IntoResponse {
    let alive = match &state.app {
        Some(app) => matches!(
            HealthCheck::liveness_check(app.clone()).await,
            Ok(HealthStatus::Healthy)
        ),
        None => false,
    };

    if alive {
        (StatusCode::OK, "Alive")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "Not alive")
    }
}

async fn metrics(State(state): State<MonitorState>) -> Response<String> {
    let families = state.metrics.registry().gather();
    let encoder = TextEncoder::new();

    let body = match encoder.encode_to_string(&families) {
        Ok(body) => body,
        Err(e) => {
            error!("Metrics encoding failed: {}", e);
            return Response::builder()
                .status(StatusCode::INTERNAL_SERVER_ERROR)
                .body("Failed to encode metrics".to_string())
                .unwrap_or_default();
        }
    };

    debug!("Serving {} metric families", families.len());
    Response::builder()
        .status(StatusCode::OK)
        .header("content-type", encoder.format_type())
        .body(body)
        .unwrap_or_default()
}

async fn stats(State(state): State<MonitorState>) -> impl IntoResponse {
    let Some(app) = &state.app else {
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({ "error": "Service not initialized" })),
        );
    };

    match HealthCheck::check(app.clone()).await {
        Ok(health) => {
            let body = json!({
                "service": {
                    "name": "party-finder",
                    "version": env!("CARGO_PKG_VERSION"),
                    "status": health.status,
                    "uptime": health.stats.uptime_info,
                },
                "queues": {
                    "active": health.stats.active_queues,
                    "parties_formed": health.stats.parties_formed,
                },
                "participants": {
                    "waiting": health.stats.participants_waiting,
                    "joined": health.stats.joins_admitted,
                },
                "components": health.checks,
                "timestamp": chrono::Utc::now(),
            });
            (StatusCode::OK, Json(body))
        }
        Err(e) => {
            error!("Stats collection failed: {}", e);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({ "error": "Failed to gather service stats" })),
            )
        }
    }
}

/// Point-in-time snapshots of every live queue
async fn queues(State(state): State<MonitorState>) -> impl IntoResponse {
    let Some(app) = &state.app else {
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({ "error": "Service not initialized" })),
        );
    };

    match app.engine().list_queues().await {
        Ok(snapshots) => {
            let body = json!({
                "count": snapshots.len(),
                "queues": snapshots,
                "timestamp": chrono::Utc::now(),
            });
            (StatusCode::OK, Json(body))
        }
        Err(e) => {
            error!("Queue listing failed: {}", e);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({ "error": "Failed to list queues" })),
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use tower::ServiceExt;

    fn bare_router() -> Router {
        let metrics = Arc::new(MetricsCollector::new().expect("collector"));
        HealthServer::new(HealthServerConfig::default(), metrics).router()
    }

    async fn router_with_app() -> Router {
        let mut config = AppConfig::default();
        config.amqp.enabled = false;
        let app = Arc::new(AppState::new(config).await.expect("app state"));
        app.start().await.expect("start");
        app.engine().create_queue("kulve").await.expect("queue");

        HealthServer::new(HealthServerConfig::default(), app.metrics())
            .with_app_state(app)
            .router()
    }

    async fn get_response(router: Router, uri: &str) -> axum::response::Response {
        router
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_index_lists_endpoints() {
        let response = get_response(bare_router(), "/").await;
        assert_eq!(response.status(), StatusCode::OK);

        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["service"], "party-finder");
        assert!(body["endpoints"]
            .as_array()
            .unwrap()
            .contains(&json!("/queues")));
    }

    #[tokio::test]
    async fn test_metrics_endpoint_serves_prometheus_text() {
        let metrics = Arc::new(MetricsCollector::new().expect("collector"));
        metrics.record_queue_created();
        let router = HealthServer::new(HealthServerConfig::default(), metrics).router();

        let response = get_response(router, "/metrics").await;
        assert_eq!(response.status(), StatusCode::OK);

        let content_type = response.headers().get("content-type").unwrap();
        assert!(content_type.to_str().unwrap().contains("text/plain"));

        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let text = String::from_utf8(bytes.to_vec()).unwrap();
        assert!(text.contains("party_finder_queues_created_total"));
    }

    #[tokio::test]
    async fn test_probes_fail_without_app_state() {
        for uri in ["/health", "/ready", "/alive", "/stats", "/queues"] {
            let response = get_response(bare_router(), uri).await;
            assert_eq!(
                response.status(),
                StatusCode::SERVICE_UNAVAILABLE,
                "expected 503 from {}",
                uri
            );
        }
    }

    #[tokio::test]
    async fn test_queues_endpoint_reports_live_queues() {
        let response = get_response(router_with_app().await, "/queues").await;
        assert_eq!(response.status(), StatusCode::OK);

        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["count"], 1);
        assert_eq!(body["queues"][0]["name"], "kulve");
    }

    #[tokio::test]
    async fn test_stats_endpoint_reports_engine_counters() {
        let response = get_response(router_with_app().await, "/stats").await;
        assert_eq!(response.status(), StatusCode::OK);

        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["queues"]["active"], 1);
        assert_eq!(body["participants"]["waiting"], 0);
    }

    #[tokio::test]
    async fn test_unknown_route_is_404() {
        let response = get_response(bare_router(), "/nope").await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
