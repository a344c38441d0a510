//! Cache storage interface and implementations
//!
//! Values are stored as JSON documents with a per-key expiry. An expired entry
//! reads exactly like a missing one.

use crate::error::{MatchmakingError, Result};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;
use std::time::{Duration, Instant};
use tracing::debug;

/// Key-value store with per-key time-to-live
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Fetch a value; `None` when absent or expired
    async fn get(&self, key: &str) -> Result<Option<Value>>;

    /// Store a value; `None` uses the store's default TTL
    async fn set(&self, key: &str, value: Value, ttl: Option<Duration>) -> Result<()>;
}

/// Typed access on top of any [`CacheStore`]
///
/// A stored value that no longer decodes as `T` is reported as a
/// `CacheError`, never as a hit.
#[async_trait]
pub trait CacheStoreExt: CacheStore {
    async fn get_json<T: DeserializeOwned + Send>(&self, key: &str) -> Result<Option<T>> {
        let Some(value) = self.get(key).await? else {
            return Ok(None);
        };

        serde_json::from_value(value).map(Some).map_err(|e| {
            MatchmakingError::CacheError {
                message: format!("Failed to decode cache entry {}: {}", key, e),
            }
            .into()
        })
    }

    async fn set_json<T: Serialize + Sync>(
        &self,
        key: &str,
        value: &T,
        ttl: Option<Duration>,
    ) -> Result<()> {
        let value = serde_json::to_value(value).map_err(|e| MatchmakingError::CacheError {
            message: format!("Failed to encode cache entry {}: {}", key, e),
        })?;
        self.set(key, value, ttl).await
    }
}

impl<S: CacheStore + ?Sized> CacheStoreExt for S {}

/// Counters describing cache usage
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CacheStats {
    pub entries: usize,
    pub hits: u64,
    pub misses: u64,
}

#[derive(Debug, Clone)]
struct CacheEntry {
    value: Value,
    expires_at: Instant,
}

impl CacheEntry {
    fn is_expired(&self, now: Instant) -> bool {
        now >= self.expires_at
    }
}

/// In-process cache store
#[derive(Debug)]
pub struct InMemoryCacheStore {
    entries: RwLock<HashMap<String, CacheEntry>>,
    default_ttl: Duration,
    max_entries: usize,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl InMemoryCacheStore {
    /// Create a new in-memory cache store
    pub fn new(default_ttl: Duration, max_entries: usize) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            default_ttl,
            max_entries,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Remove every expired entry, returning how many were dropped
    pub fn purge_expired(&self) -> Result<usize> {
        let mut entries = self.entries.write().map_err(|_| MatchmakingError::CacheError {
            message: "Failed to acquire cache write lock".to_string(),
        })?;

        let now = Instant::now();
        let before = entries.len();
        entries.retain(|_, entry| !entry.is_expired(now));
        let removed = before - entries.len();

        if removed > 0 {
            debug!("Purged {} expired cache entries", removed);
        }
        Ok(removed)
    }

    /// Current usage counters
    pub fn stats(&self) -> Result<CacheStats> {
        let entries = self.entries.read().map_err(|_| MatchmakingError::CacheError {
            message: "Failed to acquire cache read lock".to_string(),
        })?;

        Ok(CacheStats {
            entries: entries.len(),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        })
    }

    /// Evict entries while over capacity: expired first, then soonest to expire
    fn cleanup_if_needed(&self) -> Result<()> {
        let mut entries = self.entries.write().map_err(|_| MatchmakingError::CacheError {
            message: "Failed to acquire cache write lock".to_string(),
        })?;

        if entries.len() <= self.max_entries {
            return Ok(());
        }

        let now = Instant::now();
        entries.retain(|_, entry| !entry.is_expired(now));

        if entries.len() > self.max_entries {
            let mut by_expiry: Vec<_> = entries
                .iter()
                .map(|(k, v)| (k.clone(), v.expires_at))
                .collect();
            by_expiry.sort_by(|a, b| a.1.cmp(&b.1));

            let to_remove = entries.len() - self.max_entries;
            for (key, _) in by_expiry.into_iter().take(to_remove) {
                entries.remove(&key);
            }
        }

        Ok(())
    }
}

impl Default for InMemoryCacheStore {
    fn default() -> Self {
        Self::new(Duration::from_secs(3600), 10_000)
    }
}

#[async_trait]
impl CacheStore for InMemoryCacheStore {
    async fn get(&self, key: &str) -> Result<Option<Value>> {
        let entries = self.entries.read().map_err(|_| MatchmakingError::CacheError {
            message: "Failed to acquire cache read lock".to_string(),
        })?;

        match entries.get(key) {
            Some(entry) if !entry.is_expired(Instant::now()) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                Ok(Some(entry.value.clone()))
            }
            _ => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                Ok(None)
            }
        }
    }

    async fn set(&self, key: &str, value: Value, ttl: Option<Duration>) -> Result<()> {
        let ttl = ttl.unwrap_or(self.default_ttl);
        {
            let mut entries = self.entries.write().map_err(|_| MatchmakingError::CacheError {
                message: "Failed to acquire cache write lock".to_string(),
            })?;

            entries.insert(
                key.to_string(),
                CacheEntry {
                    value,
                    expires_at: Instant::now() + ttl,
                },
            );
        }

        self.cleanup_if_needed()
    }
}
