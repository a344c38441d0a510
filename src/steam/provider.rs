//! Library provider interface and implementations
//!
//! The matchmaking engine only needs owned-game lists, so it depends on this
//! narrow trait rather than on the full Steam client.

use crate::error::{MatchmakingError, Result};
use crate::types::{OwnedGame, PlatformId};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::RwLock;
use std::time::Duration;

/// Source of owned-game libraries
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LibraryProvider: Send + Sync {
    /// Full library for a platform id
    async fn get_owned_games(&self, platform_id: &str) -> Result<Vec<OwnedGame>>;
}

/// Library provider serving preset libraries
///
/// Unknown platform ids yield an empty library. Ids marked as failing return
/// `UpstreamUnavailable`. An optional delay simulates network latency.
#[derive(Debug, Default)]
pub struct StaticLibraryProvider {
    libraries: RwLock<HashMap<PlatformId, Vec<OwnedGame>>>,
    failing: RwLock<HashSet<PlatformId>>,
    delay: Option<Duration>,
    fetch_count: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl StaticLibraryProvider {
    /// Create an empty provider
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulate latency on every fetch
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Set the library returned for a platform id
    pub fn set_library(&self, platform_id: &str, games: Vec<OwnedGame>) -> Result<()> {
        let mut libraries = self
            .libraries
            .write()
            .map_err(|_| MatchmakingError::InternalError {
                message: "Failed to acquire libraries write lock".to_string(),
            })?;
        libraries.insert(platform_id.to_string(), games);
        Ok(())
    }

    /// Make fetches for a platform id fail
    pub fn set_failing(&self, platform_id: &str) -> Result<()> {
        let mut failing = self
            .failing
            .write()
            .map_err(|_| MatchmakingError::InternalError {
                message: "Failed to acquire failing-ids write lock".to_string(),
            })?;
        failing.insert(platform_id.to_string());
        Ok(())
    }

    /// Number of fetches served so far, failures included
    pub fn fetch_count(&self) -> usize {
        self.fetch_count.load(Ordering::SeqCst)
    }

    /// Highest number of fetches observed running at the same time
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    fn lookup(&self, platform_id: &str) -> Result<Vec<OwnedGame>> {
        let failing = self
            .failing
            .read()
            .map_err(|_| MatchmakingError::InternalError {
                message: "Failed to acquire failing-ids read lock".to_string(),
            })?;
        if failing.contains(platform_id) {
            return Err(MatchmakingError::UpstreamUnavailable {
                endpoint: "GetOwnedGames".to_string(),
                message: format!("Simulated failure for {}", platform_id),
            }
            .into());
        }

        let libraries = self
            .libraries
            .read()
            .map_err(|_| MatchmakingError::InternalError {
                message: "Failed to acquire libraries read lock".to_string(),
            })?;
        Ok(libraries.get(platform_id).cloned().unwrap_or_default())
    }
}

#[async_trait]
impl LibraryProvider for StaticLibraryProvider {
    async fn get_owned_games(&self, platform_id: &str) -> Result<Vec<OwnedGame>> {
        self.fetch_count.fetch_add(1, Ordering::SeqCst);
        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(current, Ordering::SeqCst);

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let result = self.lookup(platform_id);
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }
}
