//! Configuration management for the playmate service
//!
//! This module handles all configuration loading from environment variables
//! and TOML files, validation, and default values.

pub mod app;
pub mod cache;
pub mod retry;

// Re-export commonly used types
pub use app::{
    validate_config, AppConfig, CacheSettings, DatabaseSettings, MatchmakingSettings,
    RetrySettings, ServiceSettings, SteamSettings,
};
pub use cache::CacheTtlPolicy;
pub use retry::RetryPolicy;
