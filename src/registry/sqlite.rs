//! SQLite-backed registry
//!
//! Owns the `users` and `user_games` tables. Library snapshots are replaced
//! inside a single transaction so readers never see a partial or empty list
//! mid-refresh.

use super::models::User;
use super::storage::UserRegistry;
use crate::config::DatabaseSettings;
use crate::error::{MatchmakingError, Result};
use crate::types::{LocalId, OwnedGame, PlatformId};
use crate::utils::current_timestamp;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow};
use sqlx::{Row, SqlitePool};
use tracing::{debug, info};

/// Map a sqlx failure into a storage error carrying the operation name
pub(crate) fn storage_error(operation: &'static str) -> impl Fn(sqlx::Error) -> anyhow::Error {
    move |e| {
        MatchmakingError::StorageError {
            message: format!("{}: {}", operation, e),
        }
        .into()
    }
}

/// Local ids are stored in SQLite's signed 64-bit integer column
pub(crate) fn to_db_id(id: u64) -> Result<i64> {
    i64::try_from(id).map_err(|_| {
        MatchmakingError::InvalidRequest {
            reason: format!("Identifier {} is out of range", id),
        }
        .into()
    })
}

pub(crate) fn from_unix(seconds: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(seconds, 0).unwrap_or_default()
}

/// Registry persisted in SQLite
#[derive(Debug, Clone)]
pub struct SqliteRegistry {
    pub(crate) pool: SqlitePool,
}

impl SqliteRegistry {
    /// Open (creating if needed) the database and run migrations
    pub async fn connect(settings: &DatabaseSettings) -> Result<Self> {
        let in_memory = settings.path == ":memory:";
        let options = SqliteConnectOptions::new()
            .filename(&settings.path)
            .create_if_missing(true)
            .foreign_keys(true);

        // Each in-memory connection is its own database
        let max_connections = if in_memory { 1 } else { settings.max_connections };

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await
            .map_err(storage_error("Failed to open registry database"))?;

        let registry = Self { pool };
        registry.migrate().await?;

        info!("Registry database ready at {}", settings.path);
        Ok(registry)
    }

    /// Fresh in-memory registry
    pub async fn in_memory() -> Result<Self> {
        Self::connect(&DatabaseSettings {
            path: ":memory:".to_string(),
            max_connections: 1,
        })
        .await
    }

    /// Apply embedded migrations
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| MatchmakingError::StorageError {
                message: format!("Migration failed: {}", e),
            })?;
        Ok(())
    }

    /// Cheap connectivity check
    pub async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(storage_error("Registry ping failed"))?;
        Ok(())
    }

    /// Number of registered users
    pub async fn count_users(&self) -> Result<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
            .fetch_one(&self.pool)
            .await
            .map_err(storage_error("Failed to count users"))?;
        Ok(count.max(0) as u64)
    }

    /// Link a local user to a platform id, updating an existing link
    ///
    /// Re-linking to a different platform id drops the old library snapshot.
    /// A platform id already linked to another local user is rejected.
    pub async fn register_user(
        &self,
        local_id: LocalId,
        platform_id: &str,
        display_name: Option<&str>,
    ) -> Result<User> {
        let db_id = to_db_id(local_id)?;
        let now = current_timestamp().timestamp();

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(storage_error("Failed to begin registration"))?;

        let owner: Option<i64> =
            sqlx::query_scalar("SELECT local_id FROM users WHERE platform_id = ?")
                .bind(platform_id)
                .fetch_optional(&mut *tx)
                .await
                .map_err(storage_error("Failed to look up platform id owner"))?;

        if let Some(owner) = owner {
            if owner != db_id {
                return Err(MatchmakingError::PlatformIdInUse {
                    platform_id: platform_id.to_string(),
                }
                .into());
            }
        }

        let previous: Option<String> =
            sqlx::query_scalar("SELECT platform_id FROM users WHERE local_id = ?")
                .bind(db_id)
                .fetch_optional(&mut *tx)
                .await
                .map_err(storage_error("Failed to look up existing registration"))?;

        if let Some(previous) = previous {
            if previous != platform_id {
                debug!(
                    "User {} re-linking from {} to {}",
                    local_id, previous, platform_id
                );
                sqlx::query("DELETE FROM user_games WHERE platform_id = ?")
                    .bind(&previous)
                    .execute(&mut *tx)
                    .await
                    .map_err(storage_error("Failed to drop previous library"))?;
            }
        }

        sqlx::query(
            r#"
            INSERT INTO users (local_id, platform_id, display_name, registered_at, updated_at)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT(local_id) DO UPDATE SET
                platform_id = excluded.platform_id,
                display_name = excluded.display_name,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(db_id)
        .bind(platform_id)
        .bind(display_name)
        .bind(now)
        .bind(now)
        .execute(&mut *tx)
        .await
        .map_err(storage_error("Failed to register user"))?;

        tx.commit()
            .await
            .map_err(storage_error("Failed to commit registration"))?;

        info!("Registered user {} as {}", local_id, platform_id);

        self.get_user(local_id).await?.ok_or_else(|| {
            MatchmakingError::InternalError {
                message: format!("User {} missing after registration", local_id),
            }
            .into()
        })
    }

    /// Remove a user; cascades to their library, preferences and alerts
    pub async fn unregister_user(&self, local_id: LocalId) -> Result<bool> {
        let result = sqlx::query("DELETE FROM users WHERE local_id = ?")
            .bind(to_db_id(local_id)?)
            .execute(&self.pool)
            .await
            .map_err(storage_error("Failed to unregister user"))?;

        let removed = result.rows_affected() > 0;
        if removed {
            info!("Unregistered user {}", local_id);
        }
        Ok(removed)
    }

    pub async fn get_user(&self, local_id: LocalId) -> Result<Option<User>> {
        let row = sqlx::query(
            "SELECT local_id, platform_id, display_name, registered_at, updated_at \
             FROM users WHERE local_id = ?",
        )
        .bind(to_db_id(local_id)?)
        .fetch_optional(&self.pool)
        .await
        .map_err(storage_error("Failed to load user"))?;

        row.map(|r| user_from_row(&r))
            .transpose()
            .map_err(storage_error("Failed to decode user"))
    }

    /// Users linked to any of the given platform ids
    pub async fn get_users_by_platform_ids(&self, platform_ids: &[PlatformId]) -> Result<Vec<User>> {
        if platform_ids.is_empty() {
            return Ok(Vec::new());
        }

        let placeholders = vec!["?"; platform_ids.len()].join(", ");
        let sql = format!(
            "SELECT local_id, platform_id, display_name, registered_at, updated_at \
             FROM users WHERE platform_id IN ({}) ORDER BY local_id",
            placeholders
        );

        let mut query = sqlx::query(&sql);
        for platform_id in platform_ids {
            query = query.bind(platform_id);
        }

        let rows = query
            .fetch_all(&self.pool)
            .await
            .map_err(storage_error("Failed to load users"))?;

        rows.iter()
            .map(user_from_row)
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(storage_error("Failed to decode users"))
    }

    /// Replace a user's library snapshot atomically
    ///
    /// A repeated app id keeps its first entry, matching how libraries are scored.
    pub async fn cache_library(&self, platform_id: &str, games: &[OwnedGame]) -> Result<()> {
        let now = current_timestamp().timestamp();

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(storage_error("Failed to begin library refresh"))?;

        sqlx::query("DELETE FROM user_games WHERE platform_id = ?")
            .bind(platform_id)
            .execute(&mut *tx)
            .await
            .map_err(storage_error("Failed to clear library"))?;

        for game in games {
            let playtime = i64::try_from(game.playtime_minutes).unwrap_or(i64::MAX);
            sqlx::query(
                r#"
                INSERT INTO user_games (platform_id, app_id, game_name, playtime_minutes, last_played, cached_at)
                VALUES (?, ?, ?, ?, ?, ?)
                ON CONFLICT(platform_id, app_id) DO NOTHING
                "#,
            )
            .bind(platform_id)
            .bind(game.app_id)
            .bind(&game.name)
            .bind(playtime)
            .bind(game.last_played.map(|t| t.timestamp()))
            .bind(now)
            .execute(&mut *tx)
            .await
            .map_err(storage_error("Failed to store library entry"))?;
        }

        tx.commit()
            .await
            .map_err(storage_error("Failed to commit library refresh"))?;

        debug!("Cached {} games for {}", games.len(), platform_id);
        Ok(())
    }

    /// Stored library snapshot, most played first
    pub async fn get_cached_library(&self, platform_id: &str) -> Result<Vec<OwnedGame>> {
        let rows = sqlx::query(
            "SELECT app_id, game_name, playtime_minutes, last_played FROM user_games \
             WHERE platform_id = ? ORDER BY playtime_minutes DESC, app_id ASC",
        )
        .bind(platform_id)
        .fetch_all(&self.pool)
        .await
        .map_err(storage_error("Failed to load library"))?;

        rows.iter()
            .map(|row| -> std::result::Result<OwnedGame, sqlx::Error> {
                let playtime: i64 = row.try_get("playtime_minutes")?;
                let last_played: Option<i64> = row.try_get("last_played")?;
                Ok(OwnedGame::new(
                    row.try_get::<u32, _>("app_id")?,
                    row.try_get::<String, _>("game_name")?,
                    playtime.max(0) as u64,
                )
                .with_last_played(last_played.map(from_unix)))
            })
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(storage_error("Failed to decode library"))
    }
}

fn user_from_row(row: &SqliteRow) -> std::result::Result<User, sqlx::Error> {
    let local_id: i64 = row.try_get("local_id")?;
    Ok(User {
        local_id: local_id as u64,
        platform_id: row.try_get("platform_id")?,
        display_name: row.try_get("display_name")?,
        registered_at: from_unix(row.try_get("registered_at")?),
        updated_at: from_unix(row.try_get("updated_at")?),
    })
}

#[async_trait]
impl UserRegistry for SqliteRegistry {
    async fn get_platform_id(&self, local_id: LocalId) -> Result<Option<PlatformId>> {
        sqlx::query_scalar::<_, String>("SELECT platform_id FROM users WHERE local_id = ?")
            .bind(to_db_id(local_id)?)
            .fetch_optional(&self.pool)
            .await
            .map_err(storage_error("Failed to resolve platform id"))
    }
}
