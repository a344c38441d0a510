//! Cache-first Steam Web API client
//!
//! Every successful fetch populates the cache under its kind's TTL. Failures
//! are never cached, so a later call retries the network.

use super::messages::{
    AchievementsEnvelope, AppDetailsEnvelope, OwnedGamesEnvelope, PlayerSummariesEnvelope,
    RecentGamesEnvelope, ResolveVanityEnvelope,
};
use super::provider::LibraryProvider;
use super::transport::SteamTransport;
use crate::cache::{self, CacheStore, CacheStoreExt};
use crate::config::{CacheTtlPolicy, RetryPolicy, SteamSettings};
use crate::error::Result;
use crate::metrics::MetricsCollector;
use crate::types::{
    Achievement, AppId, GameDetails, OwnedGame, PlatformId, PlayerSummary, RecentGame,
};
use crate::utils::is_numeric_handle;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Steam Web API client backed by a [`CacheStore`]
pub struct SteamClient {
    transport: SteamTransport,
    cache: Arc<dyn CacheStore>,
    ttl: CacheTtlPolicy,
    settings: SteamSettings,
    metrics: Option<Arc<MetricsCollector>>,
}

impl SteamClient {
    /// Create a new client
    pub fn new(
        settings: SteamSettings,
        retry: RetryPolicy,
        cache: Arc<dyn CacheStore>,
        ttl: CacheTtlPolicy,
    ) -> Result<Self> {
        let transport = SteamTransport::new(&settings, retry)?;

        Ok(Self {
            transport,
            cache,
            ttl,
            settings,
            metrics: None,
        })
    }

    /// Attach a metrics collector to the client and its transport
    pub fn with_metrics(mut self, metrics: Arc<MetricsCollector>) -> Self {
        self.transport = self.transport.with_metrics(metrics.clone());
        self.metrics = Some(metrics);
        self
    }

    /// Owned games for a platform id; a private profile yields an empty list
    pub async fn get_owned_games(&self, platform_id: &str) -> Result<Vec<OwnedGame>> {
        let key = cache::owned_games_key(platform_id);
        if let Some(games) = self.cached::<Vec<OwnedGame>>("owned_games", &key).await {
            return Ok(games);
        }

        let envelope: OwnedGamesEnvelope = self
            .transport
            .get_json(
                "GetOwnedGames",
                &self.api_url("IPlayerService/GetOwnedGames/v1/"),
                &[
                    ("key", self.settings.api_key.clone()),
                    ("steamid", platform_id.to_string()),
                    ("include_appinfo", "1".to_string()),
                    ("include_played_free_games", "0".to_string()),
                ],
            )
            .await?;

        let games: Vec<OwnedGame> = envelope
            .response
            .games
            .into_iter()
            .map(OwnedGame::from)
            .collect();

        debug!("Fetched {} owned games for {}", games.len(), platform_id);
        self.store(&key, &games, self.ttl.owned_games).await;
        Ok(games)
    }

    /// Public profile data for a batch of platform ids
    pub async fn get_player_summaries(
        &self,
        platform_ids: &[PlatformId],
    ) -> Result<Vec<PlayerSummary>> {
        if platform_ids.is_empty() {
            return Ok(Vec::new());
        }

        let key = cache::player_summaries_key(platform_ids);
        if let Some(players) = self
            .cached::<Vec<PlayerSummary>>("player_summaries", &key)
            .await
        {
            return Ok(players);
        }

        let envelope: PlayerSummariesEnvelope = self
            .transport
            .get_json(
                "GetPlayerSummaries",
                &self.api_url("ISteamUser/GetPlayerSummaries/v2/"),
                &[
                    ("key", self.settings.api_key.clone()),
                    ("steamids", platform_ids.join(",")),
                ],
            )
            .await?;

        let players: Vec<PlayerSummary> = envelope
            .response
            .players
            .into_iter()
            .map(PlayerSummary::from)
            .collect();

        self.store(&key, &players, Some(self.ttl.player_summaries))
            .await;
        Ok(players)
    }

    /// Profile data for one platform id
    pub async fn get_player_summary(&self, platform_id: &str) -> Result<Option<PlayerSummary>> {
        let players = self
            .get_player_summaries(&[platform_id.to_string()])
            .await?;
        Ok(players.into_iter().find(|p| p.platform_id == platform_id))
    }

    /// Games played in the last two weeks
    pub async fn get_recently_played_games(&self, platform_id: &str) -> Result<Vec<RecentGame>> {
        let key = cache::recent_games_key(platform_id);
        if let Some(games) = self.cached::<Vec<RecentGame>>("recent_games", &key).await {
            return Ok(games);
        }

        let envelope: RecentGamesEnvelope = self
            .transport
            .get_json(
                "GetRecentlyPlayedGames",
                &self.api_url("IPlayerService/GetRecentlyPlayedGames/v1/"),
                &[
                    ("key", self.settings.api_key.clone()),
                    ("steamid", platform_id.to_string()),
                ],
            )
            .await?;

        let games: Vec<RecentGame> = envelope
            .response
            .games
            .into_iter()
            .map(RecentGame::from)
            .collect();

        self.store(&key, &games, Some(self.ttl.recent_games)).await;
        Ok(games)
    }

    /// Resolve a user-supplied handle to a platform id
    ///
    /// All-digit handles are returned unchanged without touching the network.
    /// Unknown handles yield `None` and are not cached.
    pub async fn resolve_handle(&self, handle: &str) -> Result<Option<PlatformId>> {
        let handle = handle.trim();
        if is_numeric_handle(handle) {
            return Ok(Some(handle.to_string()));
        }

        let key = cache::resolved_handle_key(handle);
        if let Some(platform_id) = self.cached::<PlatformId>("resolved_handle", &key).await {
            return Ok(Some(platform_id));
        }

        let envelope: ResolveVanityEnvelope = self
            .transport
            .get_json(
                "ResolveVanityURL",
                &self.api_url("ISteamUser/ResolveVanityURL/v1/"),
                &[
                    ("key", self.settings.api_key.clone()),
                    ("vanityurl", handle.to_string()),
                ],
            )
            .await?;

        match envelope.response.into_platform_id() {
            Some(platform_id) => {
                info!("Resolved handle '{}' to {}", handle, platform_id);
                self.store(&key, &platform_id, Some(self.ttl.resolved_handles))
                    .await;
                Ok(Some(platform_id))
            }
            None => {
                debug!("Handle '{}' did not resolve", handle);
                Ok(None)
            }
        }
    }

    /// Store metadata for a game; `None` when the store has no entry
    pub async fn get_game_details(&self, app_id: AppId) -> Result<Option<GameDetails>> {
        let key = cache::game_details_key(app_id);
        if let Some(details) = self.cached::<GameDetails>("game_details", &key).await {
            return Ok(Some(details));
        }

        let mut envelope: AppDetailsEnvelope = self
            .transport
            .get_json(
                "appdetails",
                &format!(
                    "{}/api/appdetails",
                    self.settings.store_base_url.trim_end_matches('/')
                ),
                &[("appids", app_id.to_string())],
            )
            .await?;

        let details = envelope
            .remove(&app_id.to_string())
            .filter(|entry| entry.success)
            .and_then(|entry| entry.data)
            .map(|data| data.into_details(app_id));

        if let Some(details) = &details {
            self.store(&key, details, Some(self.ttl.game_details)).await;
        }
        Ok(details)
    }

    /// Achievements of one player for one game
    pub async fn get_player_achievements(
        &self,
        platform_id: &str,
        app_id: AppId,
    ) -> Result<Vec<Achievement>> {
        let key = cache::achievements_key(platform_id, app_id);
        if let Some(achievements) = self.cached::<Vec<Achievement>>("achievements", &key).await {
            return Ok(achievements);
        }

        let envelope: AchievementsEnvelope = self
            .transport
            .get_json(
                "GetPlayerAchievements",
                &self.api_url("ISteamUserStats/GetPlayerAchievements/v1/"),
                &[
                    ("key", self.settings.api_key.clone()),
                    ("steamid", platform_id.to_string()),
                    ("appid", app_id.to_string()),
                ],
            )
            .await?;

        let achievements: Vec<Achievement> = envelope
            .playerstats
            .achievements
            .into_iter()
            .map(Achievement::from)
            .collect();

        self.store(&key, &achievements, Some(self.ttl.achievements))
            .await;
        Ok(achievements)
    }

    fn api_url(&self, path: &str) -> String {
        format!("{}/{}", self.settings.api_base_url.trim_end_matches('/'), path)
    }

    /// Read and decode a cached value; cache trouble degrades to a miss
    async fn cached<T: DeserializeOwned + Send>(&self, kind: &str, key: &str) -> Option<T> {
        let decoded = match self.cache.get_json::<T>(key).await {
            Ok(decoded) => decoded,
            Err(e) => {
                warn!("Ignoring cache entry {}: {}", key, e);
                None
            }
        };

        if let Some(metrics) = &self.metrics {
            metrics.record_cache_lookup(kind, decoded.is_some());
        }
        decoded
    }

    async fn store<T: Serialize + Sync>(&self, key: &str, value: &T, ttl: Option<Duration>) {
        if let Err(e) = self.cache.set_json(key, value, ttl).await {
            warn!("Cache write failed for {}: {}", key, e);
        }
    }
}

#[async_trait]
impl LibraryProvider for SteamClient {
    async fn get_owned_games(&self, platform_id: &str) -> Result<Vec<OwnedGame>> {
        SteamClient::get_owned_games(self, platform_id).await
    }
}
