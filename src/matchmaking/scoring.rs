//! Library comparison and compatibility scoring
//!
//! Everything here is pure: libraries in, numbers out. Shared app ids are
//! always visited in ascending order so floating-point sums come out the same
//! whichever library is passed first.

use crate::types::{AppId, CompatibilityResult, LibraryStats, OwnedGame};
use crate::utils::round_to_tenth;
use std::collections::{HashMap, HashSet};

/// Both players need more than this many minutes on a title for it to count
/// towards playtime similarity
pub const PLAYTIME_FLOOR_MINUTES: u64 = 60;

/// Shared-title count at which the shared-games component saturates
pub const SHARED_GAMES_SATURATION: f64 = 20.0;

/// Number of titles listed in library stats
pub const TOP_GAMES_LIMIT: usize = 5;

/// Weights and thresholds of the composite score
#[derive(Debug, Clone)]
pub struct ScoringConfig {
    pub overlap_weight: f64,
    pub similarity_weight: f64,
    pub shared_weight: f64,
    pub playtime_floor_minutes: u64,
    pub shared_games_saturation: f64,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            overlap_weight: 0.4,
            similarity_weight: 0.3,
            shared_weight: 0.3,
            playtime_floor_minutes: PLAYTIME_FLOOR_MINUTES,
            shared_games_saturation: SHARED_GAMES_SATURATION,
        }
    }
}

fn app_ids(library: &[OwnedGame]) -> HashSet<AppId> {
    library.iter().map(|g| g.app_id).collect()
}

/// First playtime seen for each app id
fn playtimes(library: &[OwnedGame]) -> HashMap<AppId, u64> {
    let mut map = HashMap::with_capacity(library.len());
    for game in library {
        map.entry(game.app_id).or_insert(game.playtime_minutes);
    }
    map
}

/// App ids present in both libraries, ascending
pub fn shared_app_ids(a: &[OwnedGame], b: &[OwnedGame]) -> Vec<AppId> {
    let b_ids = app_ids(b);
    let mut shared: Vec<AppId> = app_ids(a).into_iter().filter(|id| b_ids.contains(id)).collect();
    shared.sort_unstable();
    shared
}

/// Jaccard overlap of the two app-id sets; 0 when either library is empty
pub fn library_overlap(a: &[OwnedGame], b: &[OwnedGame]) -> f64 {
    let a_ids = app_ids(a);
    let b_ids = app_ids(b);
    if a_ids.is_empty() || b_ids.is_empty() {
        return 0.0;
    }

    let intersection = a_ids.intersection(&b_ids).count();
    let union = a_ids.union(&b_ids).count();
    intersection as f64 / union as f64
}

/// Mean of `min/max` playtime over shared titles both players have played
/// for more than `floor_minutes`; 0 when no title qualifies
pub fn playtime_similarity(a: &[OwnedGame], b: &[OwnedGame], floor_minutes: u64) -> f64 {
    let a_times = playtimes(a);
    let b_times = playtimes(b);

    let mut total = 0.0;
    let mut counted = 0usize;

    for app_id in shared_app_ids(a, b) {
        let (Some(&ta), Some(&tb)) = (a_times.get(&app_id), b_times.get(&app_id)) else {
            continue;
        };
        if ta > floor_minutes && tb > floor_minutes {
            total += ta.min(tb) as f64 / ta.max(tb) as f64;
            counted += 1;
        }
    }

    if counted == 0 {
        0.0
    } else {
        total / counted as f64
    }
}

/// Full compatibility between two libraries
pub fn compatibility(
    a: &[OwnedGame],
    b: &[OwnedGame],
    config: &ScoringConfig,
) -> CompatibilityResult {
    let overlap = library_overlap(a, b);
    let similarity = playtime_similarity(a, b, config.playtime_floor_minutes);
    let shared_games = shared_app_ids(a, b).len();
    let shared_component = (shared_games as f64 / config.shared_games_saturation).min(1.0);

    let composite = 100.0
        * (config.overlap_weight * overlap
            + config.similarity_weight * similarity
            + config.shared_weight * shared_component);

    CompatibilityResult {
        composite: composite.clamp(0.0, 100.0),
        overlap,
        playtime_similarity: similarity,
        shared_games,
    }
}

/// Games owned by every library, taken from the first library and sorted by
/// its playtime, most played first
///
/// Any empty library makes the intersection empty.
pub fn intersect_libraries(libraries: &[Vec<OwnedGame>]) -> Vec<OwnedGame> {
    let Some((first, rest)) = libraries.split_first() else {
        return Vec::new();
    };

    let others: Vec<HashSet<AppId>> = rest.iter().map(|lib| app_ids(lib)).collect();
    let mut seen = HashSet::new();

    let mut common: Vec<OwnedGame> = first
        .iter()
        .filter(|game| others.iter().all(|ids| ids.contains(&game.app_id)))
        .filter(|game| seen.insert(game.app_id))
        .cloned()
        .collect();

    // Stable: equal playtimes keep the first library's order
    common.sort_by(|a, b| b.playtime_minutes.cmp(&a.playtime_minutes));
    common
}

/// First game in library order whose name contains `needle` (already lowercased)
pub fn find_game_by_title<'a>(library: &'a [OwnedGame], needle: &str) -> Option<&'a OwnedGame> {
    library
        .iter()
        .find(|game| game.name.to_lowercase().contains(needle))
}

/// Totals and top titles for one library
pub fn library_stats(library: &[OwnedGame]) -> LibraryStats {
    let played: Vec<&OwnedGame> = library.iter().filter(|g| g.has_been_played()).collect();
    let total_minutes: u64 = library.iter().map(|g| g.playtime_minutes).sum();
    let total_hours = total_minutes as f64 / 60.0;

    let average_playtime_hours = if played.is_empty() {
        0.0
    } else {
        round_to_tenth(total_hours / played.len() as f64)
    };

    let mut top_games = library.to_vec();
    top_games.sort_by(|a, b| b.playtime_minutes.cmp(&a.playtime_minutes));
    top_games.truncate(TOP_GAMES_LIMIT);

    LibraryStats {
        total_games: library.len(),
        played_games: played.len(),
        total_playtime_hours: round_to_tenth(total_hours),
        average_playtime_hours,
        top_games,
    }
}
