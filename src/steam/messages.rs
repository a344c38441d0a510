//! Wire formats of the Steam Web API and store API responses

use crate::types::{
    Achievement, AppId, GameDetails, OwnedGame, PlayerSummary, RecentGame,
};
use crate::utils::timestamp_from_unix;
use serde::Deserialize;
use std::collections::HashMap;

/// `IPlayerService/GetOwnedGames/v1`
#[derive(Debug, Default, Deserialize)]
pub struct OwnedGamesEnvelope {
    #[serde(default)]
    pub response: OwnedGamesResponse,
}

/// Private profiles come back as an empty `response` object
#[derive(Debug, Default, Deserialize)]
pub struct OwnedGamesResponse {
    #[serde(default)]
    pub game_count: u32,
    #[serde(default)]
    pub games: Vec<WireOwnedGame>,
}

#[derive(Debug, Deserialize)]
pub struct WireOwnedGame {
    pub appid: AppId,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub playtime_forever: u64,
    #[serde(default)]
    pub rtime_last_played: i64,
}

impl From<WireOwnedGame> for OwnedGame {
    fn from(game: WireOwnedGame) -> Self {
        OwnedGame::new(game.appid, game.name, game.playtime_forever)
            .with_last_played(timestamp_from_unix(game.rtime_last_played))
    }
}

/// `ISteamUser/GetPlayerSummaries/v2`
#[derive(Debug, Deserialize)]
pub struct PlayerSummariesEnvelope {
    pub response: PlayerSummariesResponse,
}

#[derive(Debug, Deserialize)]
pub struct PlayerSummariesResponse {
    #[serde(default)]
    pub players: Vec<WirePlayerSummary>,
}

#[derive(Debug, Deserialize)]
pub struct WirePlayerSummary {
    pub steamid: String,
    #[serde(default)]
    pub personaname: String,
    pub profileurl: Option<String>,
    pub avatarfull: Option<String>,
    pub gameextrainfo: Option<String>,
}

impl From<WirePlayerSummary> for PlayerSummary {
    fn from(player: WirePlayerSummary) -> Self {
        Self {
            platform_id: player.steamid,
            persona_name: player.personaname,
            profile_url: player.profileurl,
            avatar_url: player.avatarfull,
            current_game: player.gameextrainfo,
        }
    }
}

/// `IPlayerService/GetRecentlyPlayedGames/v1`
#[derive(Debug, Default, Deserialize)]
pub struct RecentGamesEnvelope {
    #[serde(default)]
    pub response: RecentGamesResponse,
}

#[derive(Debug, Default, Deserialize)]
pub struct RecentGamesResponse {
    #[serde(default)]
    pub games: Vec<WireRecentGame>,
}

#[derive(Debug, Deserialize)]
pub struct WireRecentGame {
    pub appid: AppId,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub playtime_2weeks: u64,
    #[serde(default)]
    pub playtime_forever: u64,
}

impl From<WireRecentGame> for RecentGame {
    fn from(game: WireRecentGame) -> Self {
        let owned = OwnedGame::new(game.appid, game.name, game.playtime_forever);
        Self {
            app_id: owned.app_id,
            name: owned.name,
            playtime_two_weeks_minutes: game.playtime_2weeks,
            playtime_forever_minutes: owned.playtime_minutes,
        }
    }
}

/// `ISteamUser/ResolveVanityURL/v1`
#[derive(Debug, Deserialize)]
pub struct ResolveVanityEnvelope {
    pub response: ResolveVanityResponse,
}

#[derive(Debug, Deserialize)]
pub struct ResolveVanityResponse {
    /// 1 on success, 42 when no match was found
    pub success: i32,
    pub steamid: Option<String>,
    pub message: Option<String>,
}

impl ResolveVanityResponse {
    pub fn into_platform_id(self) -> Option<String> {
        if self.success == 1 {
            self.steamid
        } else {
            None
        }
    }
}

/// Store `api/appdetails`, keyed by the app id as a string
pub type AppDetailsEnvelope = HashMap<String, AppDetailsEntry>;

#[derive(Debug, Deserialize)]
pub struct AppDetailsEntry {
    pub success: bool,
    pub data: Option<WireAppDetails>,
}

#[derive(Debug, Deserialize)]
pub struct WireAppDetails {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub is_free: bool,
    pub short_description: Option<String>,
    #[serde(default)]
    pub genres: Vec<WireDescription>,
    #[serde(default)]
    pub categories: Vec<WireDescription>,
    pub metacritic: Option<WireMetacritic>,
    pub release_date: Option<WireReleaseDate>,
}

#[derive(Debug, Deserialize)]
pub struct WireDescription {
    pub description: String,
}

#[derive(Debug, Deserialize)]
pub struct WireMetacritic {
    pub score: u32,
}

#[derive(Debug, Deserialize)]
pub struct WireReleaseDate {
    #[serde(default)]
    pub date: String,
}

impl WireAppDetails {
    pub fn into_details(self, app_id: AppId) -> GameDetails {
        GameDetails {
            app_id,
            name: self.name,
            is_free: self.is_free,
            short_description: self.short_description,
            genres: self.genres.into_iter().map(|g| g.description).collect(),
            categories: self.categories.into_iter().map(|c| c.description).collect(),
            metacritic_score: self.metacritic.map(|m| m.score),
            release_date: self
                .release_date
                .map(|r| r.date)
                .filter(|date| !date.is_empty()),
        }
    }
}

/// `ISteamUserStats/GetPlayerAchievements/v1`
#[derive(Debug, Default, Deserialize)]
pub struct AchievementsEnvelope {
    #[serde(default)]
    pub playerstats: PlayerStats,
}

#[derive(Debug, Default, Deserialize)]
pub struct PlayerStats {
    #[serde(default)]
    pub achievements: Vec<WireAchievement>,
}

#[derive(Debug, Deserialize)]
pub struct WireAchievement {
    pub apiname: String,
    #[serde(default)]
    pub achieved: u8,
    #[serde(default)]
    pub unlocktime: i64,
}

impl From<WireAchievement> for Achievement {
    fn from(achievement: WireAchievement) -> Self {
        Self {
            api_name: achievement.apiname,
            achieved: achievement.achieved == 1,
            unlocked_at: timestamp_from_unix(achievement.unlocktime),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_owned_games_decode() {
        let body = json!({
            "response": {
                "game_count": 2,
                "games": [
                    {"appid": 570, "name": "Dota 2", "playtime_forever": 1000, "rtime_last_played": 1700000000},
                    {"appid": 730, "playtime_forever": 0, "rtime_last_played": 0}
                ]
            }
        });

        let envelope: OwnedGamesEnvelope = serde_json::from_value(body).unwrap();
        let games: Vec<OwnedGame> = envelope.response.games.into_iter().map(Into::into).collect();

        assert_eq!(games.len(), 2);
        assert_eq!(games[0].name, "Dota 2");
        assert!(games[0].last_played.is_some());
        assert_eq!(games[1].name, crate::types::UNKNOWN_GAME_NAME);
        assert!(games[1].last_played.is_none());
    }

    #[test]
    fn test_private_profile_decodes_empty() {
        let envelope: OwnedGamesEnvelope =
            serde_json::from_value(json!({"response": {}})).unwrap();
        assert!(envelope.response.games.is_empty());
    }

    #[test]
    fn test_vanity_resolution() {
        let found: ResolveVanityEnvelope = serde_json::from_value(json!({
            "response": {"steamid": "76561197960287930", "success": 1}
        }))
        .unwrap();
        assert_eq!(
            found.response.into_platform_id(),
            Some("76561197960287930".to_string())
        );

        let missing: ResolveVanityEnvelope = serde_json::from_value(json!({
            "response": {"success": 42, "message": "No match"}
        }))
        .unwrap();
        assert_eq!(missing.response.into_platform_id(), None);
    }

    #[test]
    fn test_app_details_decode() {
        let body = json!({
            "570": {
                "success": true,
                "data": {
                    "name": "Dota 2",
                    "is_free": true,
                    "genres": [{"id": "1", "description": "Action"}],
                    "categories": [{"id": 1, "description": "Multi-player"}],
                    "metacritic": {"score": 90, "url": "https://example.com"},
                    "release_date": {"coming_soon": false, "date": "9 Jul, 2013"}
                }
            }
        });

        let mut envelope: AppDetailsEnvelope = serde_json::from_value(body).unwrap();
        let entry = envelope.remove("570").unwrap();
        assert!(entry.success);

        let details = entry.data.unwrap().into_details(570);
        assert_eq!(details.genres, vec!["Action".to_string()]);
        assert_eq!(details.categories, vec!["Multi-player".to_string()]);
        assert_eq!(details.metacritic_score, Some(90));
        assert_eq!(details.release_date.as_deref(), Some("9 Jul, 2013"));
    }
}
