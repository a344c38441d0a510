//! Common types used throughout the matchmaking service

use crate::utils::{minutes_to_hours, round_to_tenth};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Chat-side identifier of a user
pub type LocalId = u64;

/// Stable identifier of a user on the gaming platform (64-bit Steam id as text)
pub type PlatformId = String;

/// Platform identifier of a game
pub type AppId = u32;

/// Name used when the platform returns a game without a title
pub const UNKNOWN_GAME_NAME: &str = "Unknown Game";

/// A game in a user's library
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OwnedGame {
    pub app_id: AppId,
    pub name: String,
    /// Cumulative playtime in minutes
    pub playtime_minutes: u64,
    pub last_played: Option<DateTime<Utc>>,
}

impl OwnedGame {
    /// Create a game entry, substituting a placeholder for blank names
    pub fn new(app_id: AppId, name: impl Into<String>, playtime_minutes: u64) -> Self {
        let name = name.into();
        let name = if name.trim().is_empty() {
            UNKNOWN_GAME_NAME.to_string()
        } else {
            name
        };

        Self {
            app_id,
            name,
            playtime_minutes,
            last_played: None,
        }
    }

    /// Attach a last-played timestamp
    pub fn with_last_played(mut self, last_played: Option<DateTime<Utc>>) -> Self {
        self.last_played = last_played;
        self
    }

    /// Playtime in hours
    pub fn playtime_hours(&self) -> f64 {
        minutes_to_hours(self.playtime_minutes)
    }

    pub fn has_been_played(&self) -> bool {
        self.playtime_minutes > 0
    }
}

/// Pairwise compatibility between two libraries
///
/// Ratios are kept unrounded; the accessor methods produce the rounded,
/// percentage form shown to users.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CompatibilityResult {
    /// Composite score in [0, 100], unrounded
    pub composite: f64,
    /// Jaccard overlap of the two app-id sets, in [0, 1]
    pub overlap: f64,
    /// Mean per-title playtime ratio over qualifying shared titles, in [0, 1]
    pub playtime_similarity: f64,
    /// Number of app ids present in both libraries
    pub shared_games: usize,
}

impl CompatibilityResult {
    /// Composite score rounded to one decimal
    pub fn score(&self) -> f64 {
        round_to_tenth(self.composite)
    }

    /// Overlap as a percentage rounded to one decimal
    pub fn library_overlap_percent(&self) -> f64 {
        round_to_tenth(self.overlap * 100.0)
    }

    /// Playtime similarity as a percentage rounded to one decimal
    pub fn playtime_similarity_percent(&self) -> f64 {
        round_to_tenth(self.playtime_similarity * 100.0)
    }

    /// Presentation form of the result
    pub fn report(&self) -> CompatibilityReport {
        CompatibilityReport {
            score: self.score(),
            shared_games: self.shared_games,
            library_overlap: self.library_overlap_percent(),
            playtime_similarity: self.playtime_similarity_percent(),
        }
    }
}

/// Rounded compatibility figures as handed to callers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompatibilityReport {
    pub score: f64,
    pub shared_games: usize,
    pub library_overlap: f64,
    pub playtime_similarity: f64,
}

/// A candidate ranked by compatibility with the primary user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchCandidate {
    pub local_id: LocalId,
    pub result: CompatibilityResult,
}

/// A candidate who owns the searched game
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameOwnership {
    pub local_id: LocalId,
    pub game_name: String,
    pub app_id: AppId,
    pub playtime_hours: f64,
}

/// Summary statistics over one library
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LibraryStats {
    pub total_games: usize,
    pub played_games: usize,
    pub total_playtime_hours: f64,
    /// Average over played games only
    pub average_playtime_hours: f64,
    pub top_games: Vec<OwnedGame>,
}

/// Public profile data for a platform user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerSummary {
    pub platform_id: PlatformId,
    pub persona_name: String,
    pub profile_url: Option<String>,
    pub avatar_url: Option<String>,
    /// Name of the game currently being played, if any
    pub current_game: Option<String>,
}

/// A game played within the last two weeks
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecentGame {
    pub app_id: AppId,
    pub name: String,
    pub playtime_two_weeks_minutes: u64,
    pub playtime_forever_minutes: u64,
}

/// Store metadata for a game
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameDetails {
    pub app_id: AppId,
    pub name: String,
    pub is_free: bool,
    pub short_description: Option<String>,
    pub genres: Vec<String>,
    pub categories: Vec<String>,
    pub metacritic_score: Option<u32>,
    pub release_date: Option<String>,
}

/// A single achievement for one player and game
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Achievement {
    pub api_name: String,
    pub achieved: bool,
    pub unlocked_at: Option<DateTime<Utc>>,
}
