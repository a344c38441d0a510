//! HTTP server for probes, Prometheus metrics and the JSON API
//!
//! Probes and `/metrics` are always served. The `/api/v1` routes and the
//! state-dependent probes need an [`AppState`]; without one the probes
//! report the service as unavailable.

use crate::config::ServiceSettings;
use crate::metrics::collector::MetricsCollector;
use crate::service::api;
use crate::service::app::AppState;
use crate::service::health::{HealthCheck, HealthStatus};
use anyhow::{Context, Result};
use axum::{
    extract::State,
    http::{header, StatusCode},
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
use tracing::{debug, error, info, warn};

const SERVICE_NAME: &str = "playmate";

/// Bind address of the HTTP server
#[derive(Debug, Clone)]
pub struct HttpServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for HttpServerConfig {
    fn default() -> Self {
        Self::from(&ServiceSettings::default())
    }
}

impl From<&ServiceSettings> for HttpServerConfig {
    fn from(settings: &ServiceSettings) -> Self {
        Self {
            host: settings.http_host.clone(),
            port: settings.http_port,
        }
    }
}

#[derive(Clone)]
struct ServerState {
    metrics: Arc<MetricsCollector>,
    app: Option<Arc<AppState>>,
}

/// Serves the probes, metrics and API until [`HttpServer::stop`] is called
pub struct HttpServer {
    config: HttpServerConfig,
    state: ServerState,
    shutdown_tx: broadcast::Sender<()>,
}

impl HttpServer {
    pub fn new(config: HttpServerConfig, metrics: Arc<MetricsCollector>) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);

        Self {
            config,
            state: ServerState { metrics, app: None },
            shutdown_tx,
        }
    }

    /// Attach the application state, enabling the API and full probes
    pub fn with_app_state(mut self, app_state: Arc<AppState>) -> Self {
        self.state.app = Some(app_state);
        self
    }

    /// Bind and serve until a stop signal arrives
    pub async fn start(&self) -> Result<()> {
        let addr: SocketAddr = format!("{}:{}", self.config.host, self.config.port)
            .parse()
            .context("Invalid HTTP server address")?;

        let listener = TcpListener::bind(addr)
            .await
            .with_context(|| format!("Failed to bind {}", addr))?;
        info!("HTTP server listening on http://{}", addr);

        let mut shutdown_rx = self.shutdown_tx.subscribe();
        axum::serve(listener, self.router())
            .with_graceful_shutdown(async move {
                let _ = shutdown_rx.recv().await;
                debug!("HTTP server received shutdown signal");
            })
            .await?;

        info!("HTTP server stopped");
        Ok(())
    }

    pub fn router(&self) -> Router {
        let probes = Router::new()
            .route("/", get(index))
            .route("/health", get(health))
            .route("/ready", get(ready))
            .route("/alive", get(alive))
            .route("/metrics", get(metrics))
            .route("/stats", get(stats))
            .with_state(self.state.clone());

        match &self.state.app {
            Some(app_state) => probes.merge(api::router(app_state.clone())),
            None => probes,
        }
    }

    pub async fn stop(&self) -> Result<()> {
        if self.shutdown_tx.send(()).is_err() {
            warn!("HTTP server was not running");
        }
        Ok(())
    }
}

/// Prometheus text exposition of everything in the collector's registry
pub fn encode_metrics(collector: &MetricsCollector) -> Result<String> {
    let families = collector.registry().gather();
    TextEncoder::new()
        .encode_to_string(&families)
        .context("Failed to encode metrics")
}

fn probe_code(status: &HealthStatus) -> StatusCode {
    match status {
        HealthStatus::Healthy | HealthStatus::Degraded => StatusCode::OK,
        HealthStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    }
}

fn not_initialized() -> (StatusCode, Json<Value>) {
    (
        StatusCode::SERVICE_UNAVAILABLE,
        Json(json!({
            "status": HealthStatus::Unhealthy,
            "service": SERVICE_NAME,
            "error": "Service not initialized"
        })),
    )
}

async fn index() -> Json<Value> {
    Json(json!({
        "service": SERVICE_NAME,
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": [
            "/health",
            "/ready",
            "/alive",
            "/metrics",
            "/stats",
            "/api/v1/users",
            "/api/v1/users/{local_id}/stats",
            "/api/v1/common-games",
            "/api/v1/compatibility",
            "/api/v1/matches",
            "/api/v1/owners"
        ]
    }))
}

async fn health(State(state): State<ServerState>) -> (StatusCode, Json<Value>) {
    let Some(app_state) = state.app else {
        return not_initialized();
    };

    let status = HealthCheck::liveness_check(app_state)
        .await
        .unwrap_or(HealthStatus::Unhealthy);

    (
        probe_code(&status),
        Json(json!({
            "status": status,
            "service": SERVICE_NAME,
            "version": env!("CARGO_PKG_VERSION")
        })),
    )
}

async fn ready(State(state): State<ServerState>) -> (StatusCode, &'static str) {
    let Some(app_state) = state.app else {
        return (StatusCode::SERVICE_UNAVAILABLE, "Service not initialized");
    };

    match HealthCheck::readiness_check(app_state).await {
        Ok(HealthStatus::Healthy) => (StatusCode::OK, "Ready"),
        Ok(HealthStatus::Degraded) => (StatusCode::OK, "Degraded but ready"),
        Ok(HealthStatus::Unhealthy) => (StatusCode::SERVICE_UNAVAILABLE, "Not ready"),
        Err(e) => {
            error!("Readiness check failed: {}", e);
            (StatusCode::SERVICE_UNAVAILABLE, "Not ready")
        }
    }
}

async fn alive(State(state): State<ServerState>) -> (StatusCode, &'static str) {
    let Some(app_state) = state.app else {
        return (StatusCode::SERVICE_UNAVAILABLE, "Service not initialized");
    };

    match HealthCheck::liveness_check(app_state).await {
        Ok(HealthStatus::Healthy) => (StatusCode::OK, "Alive"),
        _ => (StatusCode::SERVICE_UNAVAILABLE, "Not alive"),
    }
}

async fn metrics(State(state): State<ServerState>) -> Response {
    match encode_metrics(&state.metrics) {
        Ok(body) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, TextEncoder::new().format_type().to_string())],
            body,
        )
            .into_response(),
        Err(e) => {
            error!("{:#}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Failed to encode metrics").into_response()
        }
    }
}

/// Human-readable snapshot of the service
async fn stats(State(state): State<ServerState>) -> (StatusCode, Json<Value>) {
    let Some(app_state) = state.app else {
        return not_initialized();
    };

    match HealthCheck::check(app_state).await {
        Ok(health) => (
            StatusCode::OK,
            Json(json!({
                "service": {
                    "name": health.service,
                    "version": health.version,
                    "status": health.status,
                    "uptime_seconds": health.stats.uptime_seconds
                },
                "registry": { "users": health.stats.registered_users },
                "cache": {
                    "entries": health.stats.cache_entries,
                    "hits": health.stats.cache_hits,
                    "misses": health.stats.cache_misses
                },
                "components": health.checks,
                "timestamp": health.timestamp
            })),
        ),
        Err(e) => {
            error!("Failed to gather stats: {}", e);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({
                    "status": HealthStatus::Unhealthy,
                    "service": SERVICE_NAME,
                    "error": "Failed to gather service stats"
                })),
            )
        }
    }
}
