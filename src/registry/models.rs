//! Records persisted by the registry

use crate::error::MatchmakingError;
use crate::types::{AppId, LocalId, PlatformId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// A registered user and their platform link
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub local_id: LocalId,
    pub platform_id: PlatformId,
    pub display_name: Option<String>,
    pub registered_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Where a user wants to be notified
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationType {
    Dm,
    Channel,
}

impl NotificationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationType::Dm => "dm",
            NotificationType::Channel => "channel",
        }
    }
}

impl FromStr for NotificationType {
    type Err = MatchmakingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "dm" => Ok(NotificationType::Dm),
            "channel" => Ok(NotificationType::Channel),
            other => Err(MatchmakingError::StorageError {
                message: format!("Unknown notification type: {}", other),
            }),
        }
    }
}

/// Per-user preferences
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserPreferences {
    pub local_id: LocalId,
    pub notification_type: NotificationType,
    pub preferred_genres: Vec<String>,
    pub playtime_threshold_hours: u32,
    pub language: String,
}

impl UserPreferences {
    /// Preferences a user starts with
    pub fn defaults_for(local_id: LocalId) -> Self {
        Self {
            local_id,
            notification_type: NotificationType::Channel,
            preferred_genres: Vec::new(),
            playtime_threshold_hours: 2,
            language: "en-US".to_string(),
        }
    }

    /// Apply the fields present in `update`
    pub fn merge(mut self, update: &PreferencesUpdate) -> Self {
        if let Some(notification_type) = update.notification_type {
            self.notification_type = notification_type;
        }
        if let Some(genres) = &update.preferred_genres {
            self.preferred_genres = genres.clone();
        }
        if let Some(threshold) = update.playtime_threshold_hours {
            self.playtime_threshold_hours = threshold;
        }
        if let Some(language) = &update.language {
            self.language = language.clone();
        }
        self
    }
}

/// Partial preferences change; `None` leaves a field untouched
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PreferencesUpdate {
    pub notification_type: Option<NotificationType>,
    pub preferred_genres: Option<Vec<String>>,
    pub playtime_threshold_hours: Option<u32>,
    pub language: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventStatus {
    Upcoming,
    Completed,
    Cancelled,
}

impl EventStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventStatus::Upcoming => "upcoming",
            EventStatus::Completed => "completed",
            EventStatus::Cancelled => "cancelled",
        }
    }
}

impl FromStr for EventStatus {
    type Err = MatchmakingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "upcoming" => Ok(EventStatus::Upcoming),
            "completed" => Ok(EventStatus::Completed),
            "cancelled" => Ok(EventStatus::Cancelled),
            other => Err(MatchmakingError::StorageError {
                message: format!("Unknown event status: {}", other),
            }),
        }
    }
}

/// A scheduled gaming session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameEvent {
    pub id: i64,
    pub guild_id: u64,
    pub game_name: String,
    pub app_id: Option<AppId>,
    pub scheduled_time: DateTime<Utc>,
    pub created_by: LocalId,
    pub participants: Vec<LocalId>,
    pub status: EventStatus,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewGameEvent {
    pub guild_id: u64,
    pub game_name: String,
    pub app_id: Option<AppId>,
    pub scheduled_time: DateTime<Utc>,
    pub created_by: LocalId,
    pub participants: Vec<LocalId>,
}

/// A request to be told when a game drops below a price
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceAlert {
    pub id: i64,
    pub local_id: LocalId,
    pub app_id: AppId,
    pub game_name: String,
    pub target_price: f64,
    pub current_price: Option<f64>,
    pub notified: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LfgStatus {
    Active,
    Closed,
}

impl LfgStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            LfgStatus::Active => "active",
            LfgStatus::Closed => "closed",
        }
    }
}

impl FromStr for LfgStatus {
    type Err = MatchmakingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(LfgStatus::Active),
            "closed" => Ok(LfgStatus::Closed),
            other => Err(MatchmakingError::StorageError {
                message: format!("Unknown LFG status: {}", other),
            }),
        }
    }
}

/// A looking-for-group post
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LfgPost {
    pub id: i64,
    pub guild_id: u64,
    pub local_id: LocalId,
    pub app_id: Option<AppId>,
    pub game_name: String,
    pub description: Option<String>,
    pub players_needed: u32,
    pub scheduled_time: Option<DateTime<Utc>>,
    pub status: LfgStatus,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewLfgPost {
    pub guild_id: u64,
    pub local_id: LocalId,
    pub app_id: Option<AppId>,
    pub game_name: String,
    pub description: Option<String>,
    pub players_needed: u32,
    pub scheduled_time: Option<DateTime<Utc>>,
}

/// Locally kept metadata about a game
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameMetadata {
    pub app_id: AppId,
    pub name: String,
    pub genres: Vec<String>,
    pub categories: Vec<String>,
    pub multiplayer_types: Vec<String>,
    pub release_date: Option<String>,
    pub metacritic_score: Option<u32>,
    pub steam_rating: Option<f64>,
}

impl From<crate::types::GameDetails> for GameMetadata {
    fn from(details: crate::types::GameDetails) -> Self {
        let multiplayer_types = details
            .categories
            .iter()
            .filter(|c| {
                let c = c.to_lowercase();
                c.contains("multi-player") || c.contains("co-op") || c.contains("pvp")
            })
            .cloned()
            .collect();

        Self {
            app_id: details.app_id,
            name: details.name,
            genres: details.genres,
            categories: details.categories,
            multiplayer_types,
            release_date: details.release_date,
            metacritic_score: details.metacritic_score,
            steam_rating: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_preferences_merge_is_partial() {
        let prefs = UserPreferences::defaults_for(1);
        let update = PreferencesUpdate {
            language: Some("de-DE".to_string()),
            ..Default::default()
        };

        let merged = prefs.merge(&update);
        assert_eq!(merged.language, "de-DE");
        assert_eq!(merged.notification_type, NotificationType::Channel);
        assert_eq!(merged.playtime_threshold_hours, 2);
    }

    #[test]
    fn test_status_round_trip() {
        for status in [
            EventStatus::Upcoming,
            EventStatus::Completed,
            EventStatus::Cancelled,
        ] {
            assert_eq!(status.as_str().parse::<EventStatus>().unwrap(), status);
        }
        assert!("archived".parse::<LfgStatus>().is_err());
    }

    #[test]
    fn test_metadata_from_details_picks_multiplayer_categories() {
        let details = crate::types::GameDetails {
            app_id: 570,
            name: "Dota 2".to_string(),
            is_free: true,
            short_description: None,
            genres: vec!["Action".to_string()],
            categories: vec![
                "Multi-player".to_string(),
                "Steam Trading Cards".to_string(),
                "Online Co-op".to_string(),
            ],
            metacritic_score: Some(90),
            release_date: None,
        };

        let metadata = GameMetadata::from(details);
        assert_eq!(
            metadata.multiplayer_types,
            vec!["Multi-player".to_string(), "Online Co-op".to_string()]
        );
    }
}
