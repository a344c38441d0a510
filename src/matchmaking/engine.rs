//! Matchmaking engine
//!
//! Resolves local users through the registry, fetches their libraries with
//! bounded concurrency and runs the comparisons in [`super::scoring`].
//!
//! Failure handling depends on the operation:
//! - Operations about a fixed set of users (intersection, pairwise
//!   compatibility, stats) fail with `NotRegistered` before any fetch when a
//!   participant is unknown, and propagate fetch failures.
//! - Population scans (best matches, owner search) skip candidates that are
//!   unregistered or whose lookup or fetch fails.

use super::scoring::{self, ScoringConfig};
use crate::config::MatchmakingSettings;
use crate::error::{classify, ErrorClass, MatchmakingError, Result};
use crate::metrics::MetricsCollector;
use crate::registry::UserRegistry;
use crate::steam::LibraryProvider;
use crate::types::{
    CompatibilityResult, GameOwnership, LibraryStats, LocalId, MatchCandidate, OwnedGame,
    PlatformId,
};
use futures::stream::{self, StreamExt, TryStreamExt};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Why a candidate was left out of a population scan
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SkipReason {
    NotRegistered,
    RegistryError,
    FetchFailed,
}

impl SkipReason {
    fn as_str(&self) -> &'static str {
        match self {
            SkipReason::NotRegistered => "not_registered",
            SkipReason::RegistryError => "registry_error",
            SkipReason::FetchFailed => "fetch_failed",
        }
    }
}

/// Compares game libraries across registered users
pub struct MatchmakingEngine {
    registry: Arc<dyn UserRegistry>,
    library: Arc<dyn LibraryProvider>,
    settings: MatchmakingSettings,
    scoring: ScoringConfig,
    metrics: Option<Arc<MetricsCollector>>,
}

impl MatchmakingEngine {
    /// Create a new engine with the default scoring weights
    pub fn new(
        registry: Arc<dyn UserRegistry>,
        library: Arc<dyn LibraryProvider>,
        settings: MatchmakingSettings,
    ) -> Self {
        Self {
            registry,
            library,
            settings,
            scoring: ScoringConfig::default(),
            metrics: None,
        }
    }

    /// Replace the scoring weights
    pub fn with_scoring(mut self, scoring: ScoringConfig) -> Self {
        self.scoring = scoring;
        self
    }

    /// Attach a metrics collector
    pub fn with_metrics(mut self, metrics: Arc<MetricsCollector>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn settings(&self) -> &MatchmakingSettings {
        &self.settings
    }

    /// Games every listed user owns, most played (by the first user) first
    pub async fn common_games(&self, users: &[LocalId]) -> Result<Vec<OwnedGame>> {
        let start = Instant::now();
        let result = async {
            let platform_ids = self.resolve_participants(users).await?;
            self.common_games_by_platform_ids(&platform_ids).await
        }
        .await;

        self.record("common_games", &result, start);
        result
    }

    /// Intersection over platform ids directly
    pub async fn common_games_by_platform_ids(
        &self,
        platform_ids: &[PlatformId],
    ) -> Result<Vec<OwnedGame>> {
        if platform_ids.is_empty() {
            return Err(MatchmakingError::InvalidRequest {
                reason: "At least one participant is required".to_string(),
            }
            .into());
        }

        let libraries = self.fetch_libraries(platform_ids).await?;
        let common = scoring::intersect_libraries(&libraries);

        debug!(
            "{} common games across {} libraries",
            common.len(),
            libraries.len()
        );
        Ok(common)
    }

    /// Compatibility between two registered users
    pub async fn compatibility(&self, user: LocalId, other: LocalId) -> Result<CompatibilityResult> {
        let start = Instant::now();
        let result = async {
            let platform_ids = self.resolve_participants(&[user, other]).await?;
            self.compatibility_by_platform_ids(&platform_ids[0], &platform_ids[1])
                .await
        }
        .await;

        self.record("compatibility", &result, start);
        result
    }

    /// Compatibility between two platform ids
    pub async fn compatibility_by_platform_ids(
        &self,
        platform_id: &str,
        other_platform_id: &str,
    ) -> Result<CompatibilityResult> {
        let libraries = self
            .fetch_libraries(&[platform_id.to_string(), other_platform_id.to_string()])
            .await?;

        Ok(scoring::compatibility(
            &libraries[0],
            &libraries[1],
            &self.scoring,
        ))
    }

    /// Candidates ranked by compatibility with `user`, best first
    ///
    /// `limit` defaults to the configured match limit. Ties keep the order in
    /// which candidates were given.
    pub async fn find_best_matches(
        &self,
        user: LocalId,
        candidates: &[LocalId],
        limit: Option<usize>,
    ) -> Result<Vec<MatchCandidate>> {
        let start = Instant::now();
        let limit = limit.unwrap_or(self.settings.default_match_limit);

        let result = async {
            let platform_id = self.resolve(user).await?;

            // Primary and candidate fetches overlap
            let (own_library, pool) = tokio::join!(
                self.library.get_owned_games(&platform_id),
                self.load_candidates(candidates, Some(user))
            );
            let own_library = own_library?;

            let mut matches: Vec<MatchCandidate> = pool
                .into_iter()
                .map(|(local_id, library)| MatchCandidate {
                    local_id,
                    result: scoring::compatibility(&own_library, &library, &self.scoring),
                })
                .collect();

            // Stable: equal scores keep candidate order
            matches.sort_by(|a, b| b.result.composite.total_cmp(&a.result.composite));
            matches.truncate(limit);

            info!(
                "Found {} matches for user {} from {} candidates",
                matches.len(),
                user,
                candidates.len()
            );
            Ok(matches)
        }
        .await;

        self.record("best_matches", &result, start);
        result
    }

    /// Candidates owning a game whose name contains `title` (case-insensitive),
    /// most played first
    pub async fn find_players_for_game(
        &self,
        title: &str,
        candidates: &[LocalId],
    ) -> Result<Vec<GameOwnership>> {
        let start = Instant::now();
        let needle = title.trim().to_lowercase();

        let result = async {
            if needle.is_empty() {
                return Err(MatchmakingError::InvalidRequest {
                    reason: "Game title cannot be empty".to_string(),
                }
                .into());
            }

            let pool = self.load_candidates(candidates, None).await;
            let mut owners: Vec<(u64, GameOwnership)> = pool
                .into_iter()
                .filter_map(|(local_id, library)| {
                    scoring::find_game_by_title(&library, &needle).map(|game| {
                        (
                            game.playtime_minutes,
                            GameOwnership {
                                local_id,
                                game_name: game.name.clone(),
                                app_id: game.app_id,
                                playtime_hours: game.playtime_hours(),
                            },
                        )
                    })
                })
                .collect();

            // Stable: equal playtimes keep candidate order
            owners.sort_by(|a, b| b.0.cmp(&a.0));

            debug!("{} candidates own a game matching '{}'", owners.len(), title);
            Ok(owners.into_iter().map(|(_, ownership)| ownership).collect())
        }
        .await;

        self.record("find_players", &result, start);
        result
    }

    /// Totals and top titles for one registered user
    pub async fn library_stats(&self, user: LocalId) -> Result<LibraryStats> {
        let start = Instant::now();
        let result = async {
            let platform_id = self.resolve(user).await?;
            let library = self.library.get_owned_games(&platform_id).await?;
            Ok(scoring::library_stats(&library))
        }
        .await;

        self.record("library_stats", &result, start);
        result
    }

    /// Resolve every participant in order, failing on the first unknown one
    ///
    /// Runs before any library fetch so an unregistered participant costs no
    /// network traffic.
    pub async fn resolve_participants(&self, users: &[LocalId]) -> Result<Vec<PlatformId>> {
        let mut platform_ids = Vec::with_capacity(users.len());
        for &user in users {
            platform_ids.push(self.resolve(user).await?);
        }
        Ok(platform_ids)
    }

    async fn resolve(&self, user: LocalId) -> Result<PlatformId> {
        self.registry
            .get_platform_id(user)
            .await?
            .ok_or_else(|| MatchmakingError::NotRegistered { local_id: user }.into())
    }

    /// Fetch libraries concurrently, in input order; the first failure aborts
    async fn fetch_libraries(&self, platform_ids: &[PlatformId]) -> Result<Vec<Vec<OwnedGame>>> {
        let concurrency = self.settings.max_concurrent_fetches.max(1);

        stream::iter(platform_ids.to_vec())
            .map(|platform_id| async move { self.library.get_owned_games(&platform_id).await })
            .buffered(concurrency)
            .try_collect()
            .await
    }

    /// Resolve and fetch each distinct candidate, dropping any that fail
    async fn load_candidates(
        &self,
        candidates: &[LocalId],
        exclude: Option<LocalId>,
    ) -> Vec<(LocalId, Vec<OwnedGame>)> {
        let mut seen = HashSet::new();
        let distinct: Vec<LocalId> = candidates
            .iter()
            .copied()
            .filter(|&id| Some(id) != exclude)
            .filter(|id| seen.insert(*id))
            .collect();

        let concurrency = self.settings.max_concurrent_fetches.max(1);

        let loaded: Vec<(LocalId, std::result::Result<Vec<OwnedGame>, SkipReason>)> =
            stream::iter(distinct)
                .map(|local_id| async move { (local_id, self.load_candidate(local_id).await) })
                .buffered(concurrency)
                .collect()
                .await;

        loaded
            .into_iter()
            .filter_map(|(local_id, outcome)| match outcome {
                Ok(library) => Some((local_id, library)),
                Err(reason) => {
                    if let Some(metrics) = &self.metrics {
                        metrics.record_candidate_skipped(reason.as_str());
                    }
                    None
                }
            })
            .collect()
    }

    async fn load_candidate(
        &self,
        local_id: LocalId,
    ) -> std::result::Result<Vec<OwnedGame>, SkipReason> {
        let platform_id = match self.registry.get_platform_id(local_id).await {
            Ok(Some(platform_id)) => platform_id,
            Ok(None) => {
                debug!("Skipping unregistered candidate {}", local_id);
                return Err(SkipReason::NotRegistered);
            }
            Err(e) => {
                warn!("Registry lookup failed for candidate {}: {}", local_id, e);
                return Err(SkipReason::RegistryError);
            }
        };

        self.library
            .get_owned_games(&platform_id)
            .await
            .map_err(|e| {
                warn!(
                    "Skipping candidate {} after library fetch failure: {}",
                    local_id, e
                );
                SkipReason::FetchFailed
            })
    }

    fn record<T>(&self, operation: &str, result: &Result<T>, start: Instant) {
        let Some(metrics) = &self.metrics else {
            return;
        };

        let outcome = match result {
            Ok(_) => "ok",
            Err(e) => match classify(e) {
                ErrorClass::NotRegistered => "not_registered",
                ErrorClass::Transient => "upstream_error",
                ErrorClass::InvalidInput => "invalid_request",
                ErrorClass::Internal => "error",
            },
        };
        metrics.record_operation(operation, outcome, start.elapsed());
    }
}
