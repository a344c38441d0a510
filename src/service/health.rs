//! Service health checks
//!
//! A full check reports each component (running flag, registry database,
//! response cache) plus registry and cache statistics. Liveness and
//! readiness are the cheap subsets used by the probes.

use crate::service::app::AppState;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

impl HealthStatus {
    /// Gauge value exported to Prometheus
    pub fn as_gauge(&self) -> u8 {
        match self {
            HealthStatus::Healthy => 2,
            HealthStatus::Degraded => 1,
            HealthStatus::Unhealthy => 0,
        }
    }
}

impl std::fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HealthStatus::Healthy => write!(f, "✅ healthy"),
            HealthStatus::Degraded => write!(f, "⚠️  degraded"),
            HealthStatus::Unhealthy => write!(f, "❌ unhealthy"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthCheck {
    /// Worst status among the components
    pub status: HealthStatus,
    pub service: String,
    pub version: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub checks: Vec<ComponentCheck>,
    pub stats: ServiceStats,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentCheck {
    pub name: String,
    pub status: HealthStatus,
    pub message: Option<String>,
    pub duration_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceStats {
    pub registered_users: u64,
    pub cache_entries: usize,
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub uptime_seconds: u64,
}

/// Run one component probe and time it
async fn timed<F>(name: &str, probe: F) -> ComponentCheck
where
    F: Future<Output = (HealthStatus, Option<String>)>,
{
    let start = Instant::now();
    let (status, message) = probe.await;

    ComponentCheck {
        name: name.to_string(),
        status,
        message,
        duration_ms: start.elapsed().as_millis() as u64,
    }
}

async fn probe_running(app_state: &AppState) -> (HealthStatus, Option<String>) {
    if app_state.is_running().await {
        (HealthStatus::Healthy, None)
    } else {
        (
            HealthStatus::Unhealthy,
            Some("Service is not running".to_string()),
        )
    }
}

async fn probe_database(app_state: &AppState) -> (HealthStatus, Option<String>) {
    match app_state.registry().ping().await {
        Ok(()) => (HealthStatus::Healthy, None),
        Err(e) => {
            error!("Database health check failed: {}", e);
            (
                HealthStatus::Unhealthy,
                Some(format!("Database unreachable: {}", e)),
            )
        }
    }
}

/// A full cache still answers but evicts early
async fn probe_cache(app_state: &AppState) -> (HealthStatus, Option<String>) {
    let capacity = app_state.config().cache.max_entries;

    match app_state.cache().stats() {
        Ok(stats) if stats.entries >= capacity => (
            HealthStatus::Degraded,
            Some(format!("Cache at capacity ({} entries)", stats.entries)),
        ),
        Ok(_) => (HealthStatus::Healthy, None),
        Err(e) => (
            HealthStatus::Degraded,
            Some(format!("Cache stats unavailable: {}", e)),
        ),
    }
}

impl HealthCheck {
    pub async fn check(app_state: Arc<AppState>) -> Result<Self> {
        let checks = vec![
            timed("service_running", probe_running(&app_state)).await,
            timed("database", probe_database(&app_state)).await,
            timed("cache", probe_cache(&app_state)).await,
        ];

        let status = checks
            .iter()
            .map(|c| c.status)
            .max()
            .unwrap_or(HealthStatus::Healthy);

        Ok(HealthCheck {
            status,
            service: app_state.config().service.name.clone(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            timestamp: chrono::Utc::now(),
            checks,
            stats: Self::gather_stats(&app_state).await,
        })
    }

    /// The service is alive while its running flag is set
    pub async fn liveness_check(app_state: Arc<AppState>) -> Result<HealthStatus> {
        Ok(probe_running(&app_state).await.0)
    }

    /// Ready when running and the registry answers
    pub async fn readiness_check(app_state: Arc<AppState>) -> Result<HealthStatus> {
        let running = probe_running(&app_state).await.0;
        if running != HealthStatus::Healthy {
            return Ok(running);
        }
        Ok(probe_database(&app_state).await.0)
    }

    async fn gather_stats(app_state: &AppState) -> ServiceStats {
        let registered_users = app_state.registry().count_users().await.unwrap_or_else(|e| {
            debug!("Failed to count users for health check: {}", e);
            0
        });
        let cache = app_state.cache().stats().unwrap_or_default();

        ServiceStats {
            registered_users,
            cache_entries: cache.entries,
            cache_hits: cache.hits,
            cache_misses: cache.misses,
            uptime_seconds: app_state.uptime().as_secs(),
        }
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| anyhow::anyhow!("Failed to serialize health check: {}", e))
    }
}
