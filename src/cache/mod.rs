//! Time-to-live cache in front of the Steam Web API

pub mod store;

pub use store::{CacheStats, CacheStore, CacheStoreExt, InMemoryCacheStore};

use crate::types::{AppId, PlatformId};

/// Cache key for a user's owned games
pub fn owned_games_key(platform_id: &str) -> String {
    format!("steam_games:{}", platform_id)
}

/// Cache key for a batch of player summaries
pub fn player_summaries_key(platform_ids: &[PlatformId]) -> String {
    format!("player_summaries:{}", platform_ids.join(","))
}

pub fn recent_games_key(platform_id: &str) -> String {
    format!("recent_games:{}", platform_id)
}

pub fn game_details_key(app_id: AppId) -> String {
    format!("game_details:{}", app_id)
}

pub fn achievements_key(platform_id: &str, app_id: AppId) -> String {
    format!("achievements:{}:{}", platform_id, app_id)
}

pub fn resolved_handle_key(handle: &str) -> String {
    format!("vanity:{}", handle)
}
