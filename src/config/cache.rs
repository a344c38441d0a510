//! Cache time-to-live policy

use super::app::CacheSettings;
use std::time::Duration;

/// Per-kind TTLs applied by the Steam client when it populates the cache
#[derive(Debug, Clone)]
pub struct CacheTtlPolicy {
    /// `None` defers to the store's default TTL
    pub owned_games: Option<Duration>,
    pub player_summaries: Duration,
    pub recent_games: Duration,
    pub game_details: Duration,
    pub achievements: Duration,
    pub resolved_handles: Duration,
}

impl Default for CacheTtlPolicy {
    fn default() -> Self {
        Self::from(&CacheSettings::default())
    }
}

impl From<&CacheSettings> for CacheTtlPolicy {
    fn from(settings: &CacheSettings) -> Self {
        Self {
            owned_games: settings.owned_games_ttl_seconds.map(Duration::from_secs),
            player_summaries: Duration::from_secs(settings.player_summary_ttl_seconds),
            recent_games: Duration::from_secs(settings.recent_games_ttl_seconds),
            game_details: Duration::from_secs(settings.game_details_ttl_seconds),
            achievements: Duration::from_secs(settings.achievements_ttl_seconds),
            resolved_handles: Duration::from_secs(settings.resolved_handle_ttl_seconds),
        }
    }
}
