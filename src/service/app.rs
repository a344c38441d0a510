//! Main application state and service coordination
//!
//! This module contains the production AppState that wires the registry,
//! cache, Steam client and matchmaking engine together, and the service
//! runner that owns the HTTP server and background tasks.

use crate::cache::InMemoryCacheStore;
use crate::config::{AppConfig, CacheTtlPolicy, RetryPolicy};
use crate::error::{MatchmakingError, Result as MatchmakingResult};
use crate::matchmaking::MatchmakingEngine;
use crate::metrics::{HttpServer, HttpServerConfig, MetricsCollector};
use crate::registry::{SqliteRegistry, User};
use crate::service::health::{HealthCheck, HealthStatus};
use crate::steam::SteamClient;
use crate::types::LocalId;
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio::time::Duration;
use tracing::{debug, error, info, warn};

/// Service-level errors
#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Database error: {message}")]
    Database { message: String },

    #[error("Service initialization error: {message}")]
    Initialization { message: String },

    #[error("Background task error: {message}")]
    BackgroundTask { message: String },
}

/// Shared application state containing all service components
pub struct AppState {
    /// Application configuration
    config: AppConfig,

    /// Persistent user registry
    registry: Arc<SqliteRegistry>,

    /// Response cache shared by the Steam client
    cache: Arc<InMemoryCacheStore>,

    /// Cache-first Steam Web API client
    steam: Arc<SteamClient>,

    /// Library comparison engine
    engine: Arc<MatchmakingEngine>,

    /// Prometheus metrics
    metrics: Arc<MetricsCollector>,

    /// Service status
    is_running: Arc<RwLock<bool>>,

    started_at: Instant,
}

impl AppState {
    /// Initialize the application with all dependencies
    pub async fn new(config: AppConfig) -> Result<Self, ServiceError> {
        info!("Initializing playmate service");
        info!(
            "Configuration: service={}, database={}, steam_api={}",
            config.service.name, config.database.path, config.steam.api_base_url
        );

        let metrics = Arc::new(
            MetricsCollector::new().map_err(|e| ServiceError::Initialization {
                message: format!("Failed to create metrics collector: {}", e),
            })?,
        );

        let registry = Arc::new(
            SqliteRegistry::connect(&config.database)
                .await
                .map_err(|e| ServiceError::Database {
                    message: format!("Failed to open registry: {}", e),
                })?,
        );

        let cache = Arc::new(InMemoryCacheStore::new(
            Duration::from_secs(config.cache.default_ttl_seconds),
            config.cache.max_entries,
        ));

        let steam = Arc::new(
            SteamClient::new(
                config.steam.clone(),
                RetryPolicy::from(&config.retry),
                cache.clone(),
                CacheTtlPolicy::from(&config.cache),
            )
            .map_err(|e| ServiceError::Initialization {
                message: format!("Failed to create Steam client: {}", e),
            })?
            .with_metrics(metrics.clone()),
        );

        let engine = Arc::new(
            MatchmakingEngine::new(registry.clone(), steam.clone(), config.matchmaking.clone())
                .with_metrics(metrics.clone()),
        );

        Ok(Self {
            config,
            registry,
            cache,
            steam,
            engine,
            metrics,
            is_running: Arc::new(RwLock::new(false)),
            started_at: Instant::now(),
        })
    }

    /// Get service configuration
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn registry(&self) -> Arc<SqliteRegistry> {
        self.registry.clone()
    }

    pub fn cache(&self) -> Arc<InMemoryCacheStore> {
        self.cache.clone()
    }

    pub fn steam(&self) -> Arc<SteamClient> {
        self.steam.clone()
    }

    pub fn engine(&self) -> Arc<MatchmakingEngine> {
        self.engine.clone()
    }

    pub fn metrics(&self) -> Arc<MetricsCollector> {
        self.metrics.clone()
    }

    /// Check if service is running
    pub async fn is_running(&self) -> bool {
        *self.is_running.read().await
    }

    pub async fn set_running(&self, running: bool) {
        *self.is_running.write().await = running;
    }

    pub fn uptime(&self) -> std::time::Duration {
        self.started_at.elapsed()
    }

    /// Register a local user by Steam handle
    ///
    /// Resolves the handle, takes the display name from the player summary
    /// when none is given, links the user and snapshots their library. The
    /// summary and snapshot are best effort: the link stands if either fails.
    pub async fn register_user(
        &self,
        local_id: LocalId,
        handle: &str,
        display_name: Option<&str>,
    ) -> MatchmakingResult<User> {
        let handle = handle.trim();
        if handle.is_empty() {
            return Err(MatchmakingError::InvalidRequest {
                reason: "Handle cannot be empty".to_string(),
            }
            .into());
        }

        let platform_id = self.steam.resolve_handle(handle).await?.ok_or_else(|| {
            MatchmakingError::HandleNotFound {
                handle: handle.to_string(),
            }
        })?;

        let persona_name = match display_name {
            Some(_) => None,
            None => match self.steam.get_player_summary(&platform_id).await {
                Ok(summary) => summary.map(|s| s.persona_name),
                Err(e) => {
                    warn!("Player summary unavailable for {}: {}", platform_id, e);
                    None
                }
            },
        };
        let display_name = display_name.or(persona_name.as_deref());

        let user = self
            .registry
            .register_user(local_id, &platform_id, display_name)
            .await?;

        match self.steam.get_owned_games(&platform_id).await {
            Ok(games) => {
                if let Err(e) = self.registry.cache_library(&platform_id, &games).await {
                    warn!("Failed to snapshot library for {}: {}", platform_id, e);
                } else {
                    debug!("Snapshotted {} games for {}", games.len(), platform_id);
                }
            }
            Err(e) => warn!("Library unavailable for {} at registration: {}", platform_id, e),
        }

        info!("Registered user {} as {}", local_id, platform_id);
        Ok(user)
    }
}

/// Runs the HTTP server and background maintenance tasks for an [`AppState`]
pub struct PlaymateService {
    state: Arc<AppState>,

    /// HTTP server for the API, health and metrics endpoints
    http_server: Arc<HttpServer>,

    /// Background task handles
    background_tasks: Vec<JoinHandle<()>>,
}

impl PlaymateService {
    /// Build the application state and HTTP server
    pub async fn new(config: AppConfig) -> Result<Self, ServiceError> {
        let state = Arc::new(AppState::new(config).await?);

        let http_server = Arc::new(
            HttpServer::new(
                HttpServerConfig::from(&state.config().service),
                state.metrics(),
            )
            .with_app_state(state.clone()),
        );

        Ok(Self {
            state,
            http_server,
            background_tasks: Vec::new(),
        })
    }

    pub fn state(&self) -> Arc<AppState> {
        self.state.clone()
    }

    /// Start the HTTP server and background tasks
    pub async fn start(&mut self) -> Result<(), ServiceError> {
        info!("Starting playmate service");

        self.state.set_running(true).await;

        self.start_http_server().await?;
        self.start_background_tasks().await?;

        info!("✅ Playmate service started successfully");
        Ok(())
    }

    /// Perform graceful shutdown
    pub async fn shutdown(&mut self) -> Result<(), ServiceError> {
        info!("Starting graceful shutdown of playmate service");

        self.state.set_running(false).await;

        info!("Stopping HTTP server...");
        if let Err(e) = self.http_server.stop().await {
            warn!("Failed to stop HTTP server: {}", e);
        } else {
            info!("✅ HTTP server stopped");
        }

        self.stop_background_tasks().await;

        let users = self
            .state
            .registry()
            .count_users()
            .await
            .map_err(|e| ServiceError::Database {
                message: format!("Failed to read final stats: {}", e),
            })?;
        let cache_stats = self
            .state
            .cache()
            .stats()
            .map_err(|e| ServiceError::BackgroundTask {
                message: format!("Failed to read cache stats: {}", e),
            })?;

        info!(
            "Final service statistics: users={}, cache_entries={}, cache_hits={}, cache_misses={}",
            users, cache_stats.entries, cache_stats.hits, cache_stats.misses
        );
        info!("✅ Playmate service shutdown completed");

        Ok(())
    }

    async fn start_http_server(&mut self) -> Result<(), ServiceError> {
        info!("Starting HTTP API and health endpoints");

        let http_server = self.http_server.clone();
        let port = self.state.config().service.http_port;

        let server_handle = tokio::spawn(async move {
            if let Err(e) = http_server.start().await {
                error!("HTTP server failed: {}", e);
            } else {
                info!("HTTP server task completed");
            }
        });

        self.background_tasks.push(server_handle);

        // Give the server a moment to start up
        tokio::time::sleep(Duration::from_millis(100)).await;

        info!("✅ HTTP server started on port {}", port);
        Ok(())
    }

    /// Start background maintenance tasks
    async fn start_background_tasks(&mut self) -> Result<(), ServiceError> {
        info!("Starting background maintenance tasks...");

        let purge_interval = self.state.config().cache_purge_interval();
        info!(
            "Starting cache purge task ({}s interval)...",
            purge_interval.as_secs()
        );
        let purge_task = {
            let state = self.state.clone();

            tokio::spawn(async move {
                let mut interval = tokio::time::interval(purge_interval);
                info!("Cache purge task started");

                while state.is_running().await {
                    interval.tick().await;

                    let cache = state.cache();
                    match cache.purge_expired() {
                        Ok(purged) => {
                            if purged > 0 {
                                debug!("Purged {} expired cache entries", purged);
                            }
                        }
                        Err(e) => warn!("Cache purge failed: {}", e),
                    }

                    if let Ok(stats) = cache.stats() {
                        state.metrics().set_cache_entries(stats.entries);
                    }
                }

                info!("Cache purge task stopped");
            })
        };

        info!("Starting health metrics task (60s interval)...");
        let health_metrics_task = {
            let state = self.state.clone();

            tokio::spawn(async move {
                let mut interval = tokio::time::interval(Duration::from_secs(60));
                info!("Health metrics task started");

                while state.is_running().await {
                    interval.tick().await;

                    let metrics = state.metrics();
                    metrics.update_uptime(state.uptime());

                    match HealthCheck::check(state.clone()).await {
                        Ok(health) => {
                            metrics.update_health_status(health.status.as_gauge());
                            for check in &health.checks {
                                metrics.update_component_health(
                                    &check.name,
                                    check.status != HealthStatus::Unhealthy,
                                );
                            }
                        }
                        Err(e) => warn!("Health check failed: {}", e),
                    }

                    debug!(
                        "Updated service health metrics - uptime: {}s",
                        state.uptime().as_secs()
                    );
                }

                info!("Health metrics task stopped");
            })
        };

        self.background_tasks.push(purge_task);
        self.background_tasks.push(health_metrics_task);

        info!("2 background maintenance tasks started successfully");
        Ok(())
    }

    /// Stop all background tasks
    async fn stop_background_tasks(&mut self) {
        let task_count = self.background_tasks.len();
        if task_count == 0 {
            info!("No background tasks to stop");
            return;
        }

        info!("Stopping {} background tasks...", task_count);

        for (i, task) in self.background_tasks.drain(..).enumerate() {
            debug!("Aborting background task {}/{}", i + 1, task_count);
            task.abort();
        }

        tokio::time::sleep(Duration::from_millis(100)).await;

        info!("✅ All {} background tasks stopped", task_count);
    }
}
