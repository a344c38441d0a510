//! Preferences, events, price alerts, LFG posts and game metadata

use super::models::{
    EventStatus, GameEvent, GameMetadata, LfgPost, LfgStatus, NewGameEvent, NewLfgPost,
    PreferencesUpdate, PriceAlert, UserPreferences,
};
use super::sqlite::{from_unix, storage_error, to_db_id, SqliteRegistry};
use crate::error::{MatchmakingError, Result};
use crate::types::{AppId, LocalId};
use crate::utils::current_timestamp;
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use std::str::FromStr;

fn decode_json_list<T: serde::de::DeserializeOwned>(raw: &str) -> Result<Vec<T>> {
    serde_json::from_str(raw).map_err(|e| {
        MatchmakingError::StorageError {
            message: format!("Corrupt JSON column: {}", e),
        }
        .into()
    })
}

fn encode_json_list<T: serde::Serialize>(items: &[T]) -> Result<String> {
    serde_json::to_string(items).map_err(|e| {
        MatchmakingError::StorageError {
            message: format!("Failed to encode JSON column: {}", e),
        }
        .into()
    })
}

impl SqliteRegistry {
    async fn require_registered(&self, local_id: LocalId) -> Result<()> {
        if self.get_user(local_id).await?.is_none() {
            return Err(MatchmakingError::NotRegistered { local_id }.into());
        }
        Ok(())
    }

    /// Apply a partial preferences change, creating the row on first use
    pub async fn set_user_preferences(
        &self,
        local_id: LocalId,
        update: &PreferencesUpdate,
    ) -> Result<UserPreferences> {
        self.require_registered(local_id).await?;

        let current = self
            .get_user_preferences(local_id)
            .await?
            .unwrap_or_else(|| UserPreferences::defaults_for(local_id));
        let merged = current.merge(update);

        sqlx::query(
            r#"
            INSERT INTO user_preferences
                (local_id, notification_type, preferred_genres, playtime_threshold_hours, language, updated_at)
            VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT(local_id) DO UPDATE SET
                notification_type = excluded.notification_type,
                preferred_genres = excluded.preferred_genres,
                playtime_threshold_hours = excluded.playtime_threshold_hours,
                language = excluded.language,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(to_db_id(local_id)?)
        .bind(merged.notification_type.as_str())
        .bind(encode_json_list(&merged.preferred_genres)?)
        .bind(merged.playtime_threshold_hours)
        .bind(&merged.language)
        .bind(current_timestamp().timestamp())
        .execute(&self.pool)
        .await
        .map_err(storage_error("Failed to save preferences"))?;

        Ok(merged)
    }

    pub async fn get_user_preferences(&self, local_id: LocalId) -> Result<Option<UserPreferences>> {
        let row = sqlx::query(
            "SELECT notification_type, preferred_genres, playtime_threshold_hours, language \
             FROM user_preferences WHERE local_id = ?",
        )
        .bind(to_db_id(local_id)?)
        .fetch_optional(&self.pool)
        .await
        .map_err(storage_error("Failed to load preferences"))?;

        let Some(row) = row else {
            return Ok(None);
        };

        let notification_type: String = row
            .try_get("notification_type")
            .map_err(storage_error("Failed to decode preferences"))?;
        let genres: String = row
            .try_get("preferred_genres")
            .map_err(storage_error("Failed to decode preferences"))?;

        Ok(Some(UserPreferences {
            local_id,
            notification_type: notification_type.parse()?,
            preferred_genres: decode_json_list(&genres)?,
            playtime_threshold_hours: row
                .try_get("playtime_threshold_hours")
                .map_err(storage_error("Failed to decode preferences"))?,
            language: row
                .try_get("language")
                .map_err(storage_error("Failed to decode preferences"))?,
        }))
    }

    /// Schedule a gaming session, returning its id
    pub async fn create_game_event(&self, event: &NewGameEvent) -> Result<i64> {
        let result = sqlx::query(
            r#"
            INSERT INTO game_events
                (guild_id, game_name, app_id, scheduled_time, created_by, participants, status, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(to_db_id(event.guild_id)?)
        .bind(&event.game_name)
        .bind(event.app_id)
        .bind(event.scheduled_time.timestamp())
        .bind(to_db_id(event.created_by)?)
        .bind(encode_json_list(&event.participants)?)
        .bind(EventStatus::Upcoming.as_str())
        .bind(current_timestamp().timestamp())
        .execute(&self.pool)
        .await
        .map_err(storage_error("Failed to create event"))?;

        Ok(result.last_insert_rowid())
    }

    /// Upcoming events of a guild scheduled after `now`, soonest first
    pub async fn get_upcoming_events(
        &self,
        guild_id: u64,
        now: DateTime<Utc>,
    ) -> Result<Vec<GameEvent>> {
        let rows = sqlx::query(
            "SELECT id, guild_id, game_name, app_id, scheduled_time, created_by, participants, \
             status, created_at FROM game_events \
             WHERE guild_id = ? AND status = 'upcoming' AND scheduled_time > ? \
             ORDER BY scheduled_time ASC, id ASC",
        )
        .bind(to_db_id(guild_id)?)
        .bind(now.timestamp())
        .fetch_all(&self.pool)
        .await
        .map_err(storage_error("Failed to load events"))?;

        rows.iter().map(event_from_row).collect()
    }

    pub async fn update_event_status(&self, event_id: i64, status: EventStatus) -> Result<bool> {
        let result = sqlx::query("UPDATE game_events SET status = ? WHERE id = ?")
            .bind(status.as_str())
            .bind(event_id)
            .execute(&self.pool)
            .await
            .map_err(storage_error("Failed to update event status"))?;
        Ok(result.rows_affected() > 0)
    }

    /// Watch a game's price for a registered user, returning the alert id
    pub async fn add_price_alert(
        &self,
        local_id: LocalId,
        app_id: AppId,
        game_name: &str,
        target_price: f64,
    ) -> Result<i64> {
        if !target_price.is_finite() || target_price < 0.0 {
            return Err(MatchmakingError::InvalidRequest {
                reason: format!("Invalid target price: {}", target_price),
            }
            .into());
        }
        self.require_registered(local_id).await?;

        let result = sqlx::query(
            "INSERT INTO price_alerts (local_id, app_id, game_name, target_price, created_at) \
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(to_db_id(local_id)?)
        .bind(app_id)
        .bind(game_name)
        .bind(target_price)
        .bind(current_timestamp().timestamp())
        .execute(&self.pool)
        .await
        .map_err(storage_error("Failed to add price alert"))?;

        Ok(result.last_insert_rowid())
    }

    /// A user's alerts that have not fired yet
    pub async fn get_user_alerts(&self, local_id: LocalId) -> Result<Vec<PriceAlert>> {
        let rows = sqlx::query(
            "SELECT id, local_id, app_id, game_name, target_price, current_price, notified, created_at \
             FROM price_alerts WHERE local_id = ? AND notified = 0 ORDER BY id ASC",
        )
        .bind(to_db_id(local_id)?)
        .fetch_all(&self.pool)
        .await
        .map_err(storage_error("Failed to load price alerts"))?;

        rows.iter()
            .map(alert_from_row)
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(storage_error("Failed to decode price alerts"))
    }

    /// Every alert that has not fired yet
    pub async fn get_all_active_alerts(&self) -> Result<Vec<PriceAlert>> {
        let rows = sqlx::query(
            "SELECT id, local_id, app_id, game_name, target_price, current_price, notified, created_at \
             FROM price_alerts WHERE notified = 0 ORDER BY id ASC",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(storage_error("Failed to load price alerts"))?;

        rows.iter()
            .map(alert_from_row)
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(storage_error("Failed to decode price alerts"))
    }

    pub async fn mark_alert_notified(
        &self,
        alert_id: i64,
        current_price: Option<f64>,
    ) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE price_alerts SET notified = 1, current_price = COALESCE(?, current_price) \
             WHERE id = ?",
        )
        .bind(current_price)
        .bind(alert_id)
        .execute(&self.pool)
        .await
        .map_err(storage_error("Failed to update price alert"))?;
        Ok(result.rows_affected() > 0)
    }

    /// Open a looking-for-group post, returning its id
    pub async fn create_lfg_post(&self, post: &NewLfgPost) -> Result<i64> {
        let result = sqlx::query(
            r#"
            INSERT INTO lfg_posts
                (guild_id, local_id, app_id, game_name, description, players_needed, scheduled_time, status, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(to_db_id(post.guild_id)?)
        .bind(to_db_id(post.local_id)?)
        .bind(post.app_id)
        .bind(&post.game_name)
        .bind(&post.description)
        .bind(post.players_needed.max(1))
        .bind(post.scheduled_time.map(|t| t.timestamp()))
        .bind(LfgStatus::Active.as_str())
        .bind(current_timestamp().timestamp())
        .execute(&self.pool)
        .await
        .map_err(storage_error("Failed to create LFG post"))?;

        Ok(result.last_insert_rowid())
    }

    /// Active posts of a guild, newest first
    pub async fn get_active_lfg_posts(&self, guild_id: u64) -> Result<Vec<LfgPost>> {
        let rows = sqlx::query(
            "SELECT id, guild_id, local_id, app_id, game_name, description, players_needed, \
             scheduled_time, status, created_at FROM lfg_posts \
             WHERE guild_id = ? AND status = 'active' ORDER BY created_at DESC, id DESC",
        )
        .bind(to_db_id(guild_id)?)
        .fetch_all(&self.pool)
        .await
        .map_err(storage_error("Failed to load LFG posts"))?;

        rows.iter().map(lfg_from_row).collect()
    }

    /// Close an active post; `false` when it was missing or already closed
    pub async fn close_lfg_post(&self, post_id: i64) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE lfg_posts SET status = 'closed' WHERE id = ? AND status = 'active'",
        )
        .bind(post_id)
        .execute(&self.pool)
        .await
        .map_err(storage_error("Failed to close LFG post"))?;
        Ok(result.rows_affected() > 0)
    }

    /// Insert or refresh metadata for a game
    pub async fn cache_game_metadata(&self, metadata: &GameMetadata) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO game_metadata
                (app_id, name, genres, categories, multiplayer_types, release_date, metacritic_score, steam_rating, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(app_id) DO UPDATE SET
                name = excluded.name,
                genres = excluded.genres,
                categories = excluded.categories,
                multiplayer_types = excluded.multiplayer_types,
                release_date = excluded.release_date,
                metacritic_score = excluded.metacritic_score,
                steam_rating = excluded.steam_rating,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(metadata.app_id)
        .bind(&metadata.name)
        .bind(encode_json_list(&metadata.genres)?)
        .bind(encode_json_list(&metadata.categories)?)
        .bind(encode_json_list(&metadata.multiplayer_types)?)
        .bind(&metadata.release_date)
        .bind(metadata.metacritic_score)
        .bind(metadata.steam_rating)
        .bind(current_timestamp().timestamp())
        .execute(&self.pool)
        .await
        .map_err(storage_error("Failed to cache game metadata"))?;
        Ok(())
    }

    pub async fn get_game_metadata(&self, app_id: AppId) -> Result<Option<GameMetadata>> {
        let row = sqlx::query(
            "SELECT app_id, name, genres, categories, multiplayer_types, release_date, \
             metacritic_score, steam_rating FROM game_metadata WHERE app_id = ?",
        )
        .bind(app_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(storage_error("Failed to load game metadata"))?;

        row.map(|r| metadata_from_row(&r)).transpose()
    }
}

fn event_from_row(row: &SqliteRow) -> Result<GameEvent> {
    let decode = storage_error("Failed to decode event");
    let guild_id: i64 = row.try_get("guild_id").map_err(&decode)?;
    let created_by: i64 = row.try_get("created_by").map_err(&decode)?;
    let participants: String = row.try_get("participants").map_err(&decode)?;
    let status: String = row.try_get("status").map_err(&decode)?;

    Ok(GameEvent {
        id: row.try_get("id").map_err(&decode)?,
        guild_id: guild_id as u64,
        game_name: row.try_get("game_name").map_err(&decode)?,
        app_id: row.try_get("app_id").map_err(&decode)?,
        scheduled_time: from_unix(row.try_get("scheduled_time").map_err(&decode)?),
        created_by: created_by as u64,
        participants: decode_json_list(&participants)?,
        status: EventStatus::from_str(&status)?,
        created_at: from_unix(row.try_get("created_at").map_err(&decode)?),
    })
}

fn alert_from_row(row: &SqliteRow) -> std::result::Result<PriceAlert, sqlx::Error> {
    let local_id: i64 = row.try_get("local_id")?;
    Ok(PriceAlert {
        id: row.try_get("id")?,
        local_id: local_id as u64,
        app_id: row.try_get("app_id")?,
        game_name: row.try_get("game_name")?,
        target_price: row.try_get("target_price")?,
        current_price: row.try_get("current_price")?,
        notified: row.try_get("notified")?,
        created_at: from_unix(row.try_get("created_at")?),
    })
}

fn lfg_from_row(row: &SqliteRow) -> Result<LfgPost> {
    let decode = storage_error("Failed to decode LFG post");
    let guild_id: i64 = row.try_get("guild_id").map_err(&decode)?;
    let local_id: i64 = row.try_get("local_id").map_err(&decode)?;
    let scheduled_time: Option<i64> = row.try_get("scheduled_time").map_err(&decode)?;
    let status: String = row.try_get("status").map_err(&decode)?;

    Ok(LfgPost {
        id: row.try_get("id").map_err(&decode)?,
        guild_id: guild_id as u64,
        local_id: local_id as u64,
        app_id: row.try_get("app_id").map_err(&decode)?,
        game_name: row.try_get("game_name").map_err(&decode)?,
        description: row.try_get("description").map_err(&decode)?,
        players_needed: row.try_get("players_needed").map_err(&decode)?,
        scheduled_time: scheduled_time.map(from_unix),
        status: LfgStatus::from_str(&status)?,
        created_at: from_unix(row.try_get("created_at").map_err(&decode)?),
    })
}

fn metadata_from_row(row: &SqliteRow) -> Result<GameMetadata> {
    let decode = storage_error("Failed to decode game metadata");
    let genres: String = row.try_get("genres").map_err(&decode)?;
    let categories: String = row.try_get("categories").map_err(&decode)?;
    let multiplayer_types: String = row.try_get("multiplayer_types").map_err(&decode)?;

    Ok(GameMetadata {
        app_id: row.try_get("app_id").map_err(&decode)?,
        name: row.try_get("name").map_err(&decode)?,
        genres: decode_json_list(&genres)?,
        categories: decode_json_list(&categories)?,
        multiplayer_types: decode_json_list(&multiplayer_types)?,
        release_date: row.try_get("release_date").map_err(&decode)?,
        metacritic_score: row.try_get("metacritic_score").map_err(&decode)?,
        steam_rating: row.try_get("steam_rating").map_err(&decode)?,
    })
}
