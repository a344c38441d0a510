//! Main application configuration
//!
//! This module defines the primary configuration structures for the playmate
//! service, including environment variable loading, TOML files and validation.

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::Path;
use std::time::Duration;

/// Main application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub service: ServiceSettings,
    pub steam: SteamSettings,
    pub retry: RetrySettings,
    pub cache: CacheSettings,
    pub database: DatabaseSettings,
    pub matchmaking: MatchmakingSettings,
}

/// Service-level settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceSettings {
    /// Service name for logging and metrics
    pub name: String,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Address the HTTP server binds to
    pub http_host: String,
    /// Port for the API, health and metrics endpoints
    pub http_port: u16,
    /// Graceful shutdown timeout in seconds
    pub shutdown_timeout_seconds: u64,
}

/// Steam Web API settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SteamSettings {
    pub api_key: String,
    /// Base URL of the Web API (`IPlayerService`, `ISteamUser`, ...)
    pub api_base_url: String,
    /// Base URL of the store API used for game details
    pub store_base_url: String,
    pub request_timeout_seconds: u64,
    /// Pooled idle connections kept per host
    pub max_idle_per_host: usize,
}

/// Retry policy for upstream requests
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrySettings {
    /// Total attempts including the first one
    pub max_attempts: u32,
    pub initial_delay_ms: u64,
    pub backoff_factor: f64,
    pub max_delay_ms: u64,
}

/// Cache time-to-live policy and capacity
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    pub default_ttl_seconds: u64,
    /// Owned games use the store default when unset
    pub owned_games_ttl_seconds: Option<u64>,
    pub player_summary_ttl_seconds: u64,
    pub recent_games_ttl_seconds: u64,
    pub game_details_ttl_seconds: u64,
    pub achievements_ttl_seconds: u64,
    pub resolved_handle_ttl_seconds: u64,
    pub max_entries: usize,
    pub purge_interval_seconds: u64,
}

/// Registry database settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseSettings {
    /// SQLite file path, or `:memory:`
    pub path: String,
    pub max_connections: u32,
}

/// Matchmaking-specific settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchmakingSettings {
    /// Upper bound on library fetches in flight for one operation
    pub max_concurrent_fetches: usize,
    /// Number of matches returned when the caller gives no limit
    pub default_match_limit: usize,
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self {
            name: "playmate".to_string(),
            log_level: "info".to_string(),
            http_host: "0.0.0.0".to_string(),
            http_port: 8080,
            shutdown_timeout_seconds: 30,
        }
    }
}

impl Default for SteamSettings {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            api_base_url: "https://api.steampowered.com".to_string(),
            store_base_url: "https://store.steampowered.com".to_string(),
            request_timeout_seconds: 10,
            max_idle_per_host: 20,
        }
    }
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay_ms: 500,
            backoff_factor: 2.0,
            max_delay_ms: 10_000,
        }
    }
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            default_ttl_seconds: 3600,
            owned_games_ttl_seconds: None,
            player_summary_ttl_seconds: 300,
            recent_games_ttl_seconds: 300,
            game_details_ttl_seconds: 86_400,
            achievements_ttl_seconds: 3600,
            resolved_handle_ttl_seconds: 86_400,
            max_entries: 10_000,
            purge_interval_seconds: 60,
        }
    }
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            path: "playmate.db".to_string(),
            max_connections: 5,
        }
    }
}

impl Default for MatchmakingSettings {
    fn default() -> Self {
        Self {
            max_concurrent_fetches: 8,
            default_match_limit: 5,
        }
    }
}

/// Parse an environment variable into `target` if it is set
fn override_from_env<T: std::str::FromStr>(name: &str, target: &mut T) -> Result<()> {
    if let Ok(value) = env::var(name) {
        *target = value
            .parse()
            .map_err(|_| anyhow!("Invalid {} value: {}", name, value))?;
    }
    Ok(())
}

impl AppConfig {
    /// Load configuration from environment variables with fallback to defaults
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        config.apply_env()?;
        validate_config(&config)?;
        Ok(config)
    }

    /// Load configuration from a TOML file; environment variables still take precedence
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let mut config: AppConfig = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;

        config.apply_env()?;
        validate_config(&config)?;
        Ok(config)
    }

    fn apply_env(&mut self) -> Result<()> {
        // Service settings
        if let Ok(name) = env::var("SERVICE_NAME") {
            self.service.name = name;
        }
        if let Ok(log_level) = env::var("LOG_LEVEL") {
            self.service.log_level = log_level;
        }
        if let Ok(host) = env::var("HTTP_HOST") {
            self.service.http_host = host;
        }
        override_from_env("HTTP_PORT", &mut self.service.http_port)?;
        override_from_env(
            "SHUTDOWN_TIMEOUT_SECONDS",
            &mut self.service.shutdown_timeout_seconds,
        )?;

        // Steam settings
        if let Ok(key) = env::var("STEAM_API_KEY") {
            self.steam.api_key = key;
        }
        if let Ok(url) = env::var("STEAM_API_BASE_URL") {
            self.steam.api_base_url = url;
        }
        if let Ok(url) = env::var("STEAM_STORE_BASE_URL") {
            self.steam.store_base_url = url;
        }
        override_from_env(
            "STEAM_REQUEST_TIMEOUT_SECONDS",
            &mut self.steam.request_timeout_seconds,
        )?;
        override_from_env("STEAM_MAX_IDLE_PER_HOST", &mut self.steam.max_idle_per_host)?;

        // Retry settings
        override_from_env("RETRY_MAX_ATTEMPTS", &mut self.retry.max_attempts)?;
        override_from_env("RETRY_INITIAL_DELAY_MS", &mut self.retry.initial_delay_ms)?;
        override_from_env("RETRY_BACKOFF_FACTOR", &mut self.retry.backoff_factor)?;
        override_from_env("RETRY_MAX_DELAY_MS", &mut self.retry.max_delay_ms)?;

        // Cache settings
        override_from_env(
            "CACHE_DEFAULT_TTL_SECONDS",
            &mut self.cache.default_ttl_seconds,
        )?;
        override_from_env("CACHE_MAX_ENTRIES", &mut self.cache.max_entries)?;
        override_from_env(
            "CACHE_PURGE_INTERVAL_SECONDS",
            &mut self.cache.purge_interval_seconds,
        )?;

        // Database settings
        if let Ok(path) = env::var("DATABASE_PATH") {
            self.database.path = path;
        }
        override_from_env(
            "DATABASE_MAX_CONNECTIONS",
            &mut self.database.max_connections,
        )?;

        // Matchmaking settings
        override_from_env(
            "MAX_CONCURRENT_FETCHES",
            &mut self.matchmaking.max_concurrent_fetches,
        )?;
        override_from_env(
            "DEFAULT_MATCH_LIMIT",
            &mut self.matchmaking.default_match_limit,
        )?;

        Ok(())
    }

    /// Get shutdown timeout as Duration
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.service.shutdown_timeout_seconds)
    }

    /// Get upstream request timeout as Duration
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.steam.request_timeout_seconds)
    }

    /// Get cache purge interval as Duration
    pub fn cache_purge_interval(&self) -> Duration {
        Duration::from_secs(self.cache.purge_interval_seconds)
    }
}

/// Validate configuration values
pub fn validate_config(config: &AppConfig) -> Result<()> {
    // Validate log level
    match config.service.log_level.to_lowercase().as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => {}
        _ => return Err(anyhow!("Invalid log level: {}", config.service.log_level)),
    }

    // Validate ports
    if config.service.http_port == 0 {
        return Err(anyhow!("HTTP port cannot be 0"));
    }

    // Validate timeouts
    if config.service.shutdown_timeout_seconds == 0 {
        return Err(anyhow!("Shutdown timeout must be greater than 0"));
    }
    if config.steam.request_timeout_seconds == 0 {
        return Err(anyhow!("Steam request timeout must be greater than 0"));
    }

    // Validate Steam settings
    if config.steam.api_key.trim().is_empty() {
        return Err(anyhow!("Steam API key cannot be empty"));
    }
    if config.steam.api_base_url.is_empty() || config.steam.store_base_url.is_empty() {
        return Err(anyhow!("Steam base URLs cannot be empty"));
    }

    // Validate retry settings
    if config.retry.max_attempts == 0 {
        return Err(anyhow!("Retry max attempts must be at least 1"));
    }
    if config.retry.backoff_factor < 1.0 {
        return Err(anyhow!("Retry backoff factor must be at least 1.0"));
    }

    // Validate cache settings
    if config.cache.default_ttl_seconds == 0 {
        return Err(anyhow!("Cache default TTL must be greater than 0"));
    }
    if config.cache.max_entries == 0 {
        return Err(anyhow!("Cache max entries must be greater than 0"));
    }
    if config.cache.purge_interval_seconds == 0 {
        return Err(anyhow!("Cache purge interval must be greater than 0"));
    }

    // Validate database settings
    if config.database.path.is_empty() {
        return Err(anyhow!("Database path cannot be empty"));
    }
    if config.database.max_connections == 0 {
        return Err(anyhow!("Database max connections must be greater than 0"));
    }

    // Validate matchmaking settings
    if config.matchmaking.max_concurrent_fetches == 0 {
        return Err(anyhow!("Max concurrent fetches must be greater than 0"));
    }
    if config.matchmaking.default_match_limit == 0 {
        return Err(anyhow!("Default match limit must be greater than 0"));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn create_test_config() -> AppConfig {
        let mut config = AppConfig::default();
        config.steam.api_key = "test-key".to_string();
        config
    }

    #[test]
    fn test_default_config_is_valid_with_key() {
        let config = create_test_config();
        assert!(validate_config(&config).is_ok());
        assert_eq!(config.retry.max_attempts, 3);
        assert_eq!(config.retry.backoff_factor, 2.0);
        assert_eq!(config.cache.default_ttl_seconds, 3600);
        assert_eq!(config.matchmaking.default_match_limit, 5);
    }

    #[test]
    fn test_missing_api_key_rejected() {
        let config = AppConfig::default();
        let err = validate_config(&config).unwrap_err();
        assert!(err.to_string().contains("API key"));
    }

    #[test]
    fn test_invalid_values_rejected() {
        let mut config = create_test_config();
        config.service.log_level = "verbose".to_string();
        assert!(validate_config(&config).is_err());

        let mut config = create_test_config();
        config.retry.max_attempts = 0;
        assert!(validate_config(&config).is_err());

        let mut config = create_test_config();
        config.retry.backoff_factor = 0.5;
        assert!(validate_config(&config).is_err());

        let mut config = create_test_config();
        config.matchmaking.max_concurrent_fetches = 0;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_from_file_partial_sections() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
[service]
http_port = 9090

[steam]
api_key = "file-key"

[retry]
max_attempts = 5
"#
        )
        .unwrap();

        let config = AppConfig::from_file(file.path()).unwrap();
        assert_eq!(config.service.http_port, 9090);
        assert_eq!(config.service.name, "playmate");
        assert_eq!(config.retry.max_attempts, 5);
        assert_eq!(config.retry.initial_delay_ms, 500);
        assert_eq!(config.database.path, "playmate.db");
    }

    #[test]
    fn test_from_file_missing_file() {
        let err = AppConfig::from_file("/nonexistent/playmate.toml").unwrap_err();
        assert!(err.to_string().contains("Failed to read config file"));
    }

    #[test]
    fn test_duration_helpers() {
        let config = create_test_config();
        assert_eq!(config.shutdown_timeout(), Duration::from_secs(30));
        assert_eq!(config.request_timeout(), Duration::from_secs(10));
        assert_eq!(config.cache_purge_interval(), Duration::from_secs(60));
    }
}
