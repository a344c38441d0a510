//! User registry interface and in-memory implementation
//!
//! The matchmaking engine resolves participants through [`UserRegistry`] and
//! nothing else, so any backing store can stand behind it.

use crate::error::{MatchmakingError, Result};
use crate::types::{LocalId, PlatformId};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::RwLock;

/// Mapping from local users to platform ids
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait UserRegistry: Send + Sync {
    /// Platform id linked to a local user, `None` when unregistered
    async fn get_platform_id(&self, local_id: LocalId) -> Result<Option<PlatformId>>;
}

/// In-memory registry
#[derive(Debug, Default)]
pub struct InMemoryUserRegistry {
    users: RwLock<HashMap<LocalId, PlatformId>>,
    unavailable: RwLock<HashSet<LocalId>>,
}

impl InMemoryUserRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Link a local user to a platform id
    pub fn register(&self, local_id: LocalId, platform_id: &str) -> Result<()> {
        let mut users = self
            .users
            .write()
            .map_err(|_| MatchmakingError::InternalError {
                message: "Failed to acquire users write lock".to_string(),
            })?;
        users.insert(local_id, platform_id.to_string());
        Ok(())
    }

    /// Remove a user, returning whether they were registered
    pub fn unregister(&self, local_id: LocalId) -> Result<bool> {
        let mut users = self
            .users
            .write()
            .map_err(|_| MatchmakingError::InternalError {
                message: "Failed to acquire users write lock".to_string(),
            })?;
        Ok(users.remove(&local_id).is_some())
    }

    /// Make lookups for a user fail with a storage error
    pub fn set_unavailable(&self, local_id: LocalId) -> Result<()> {
        let mut unavailable =
            self.unavailable
                .write()
                .map_err(|_| MatchmakingError::InternalError {
                    message: "Failed to acquire unavailable-ids write lock".to_string(),
                })?;
        unavailable.insert(local_id);
        Ok(())
    }
}

#[async_trait]
impl UserRegistry for InMemoryUserRegistry {
    async fn get_platform_id(&self, local_id: LocalId) -> Result<Option<PlatformId>> {
        let unavailable =
            self.unavailable
                .read()
                .map_err(|_| MatchmakingError::InternalError {
                    message: "Failed to acquire unavailable-ids read lock".to_string(),
                })?;
        if unavailable.contains(&local_id) {
            return Err(MatchmakingError::StorageError {
                message: format!("Lookup for user {} unavailable", local_id),
            }
            .into());
        }

        let users = self
            .users
            .read()
            .map_err(|_| MatchmakingError::InternalError {
                message: "Failed to acquire users read lock".to_string(),
            })?;
        Ok(users.get(&local_id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_register_and_lookup() {
        let registry = InMemoryUserRegistry::new();
        assert!(registry.get_platform_id(1).await.unwrap().is_none());

        registry.register(1, "76561197960287930").unwrap();
        assert_eq!(
            registry.get_platform_id(1).await.unwrap().as_deref(),
            Some("76561197960287930")
        );

        assert!(registry.unregister(1).unwrap());
        assert!(!registry.unregister(1).unwrap());
        assert!(registry.get_platform_id(1).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_unavailable_lookup_errors() {
        let registry = InMemoryUserRegistry::new();
        registry.register(1, "1").unwrap();
        registry.set_unavailable(1).unwrap();

        assert!(registry.get_platform_id(1).await.is_err());
    }
}
