//! Test fixtures shared by the integration tests

#![allow(dead_code)]

use playmate::config::MatchmakingSettings;
use playmate::matchmaking::MatchmakingEngine;
use playmate::registry::InMemoryUserRegistry;
use playmate::steam::StaticLibraryProvider;
use playmate::types::{AppId, LocalId, OwnedGame};
use std::sync::Arc;

/// Well-known titles used across scenarios
pub const DOTA_2: AppId = 570;
pub const CS2: AppId = 730;
pub const TF2: AppId = 440;
pub const PORTAL_2: AppId = 620;
pub const ROCKET_LEAGUE: AppId = 252950;

pub fn game_name(app_id: AppId) -> String {
    match app_id {
        DOTA_2 => "Dota 2".to_string(),
        CS2 => "Counter-Strike 2".to_string(),
        TF2 => "Team Fortress 2".to_string(),
        PORTAL_2 => "Portal 2".to_string(),
        ROCKET_LEAGUE => "Rocket League".to_string(),
        other => format!("Game {}", other),
    }
}

/// Build a library from `(app_id, playtime_minutes)` pairs
pub fn library(entries: &[(AppId, u64)]) -> Vec<OwnedGame> {
    entries
        .iter()
        .map(|&(app_id, minutes)| OwnedGame::new(app_id, game_name(app_id), minutes))
        .collect()
}

pub fn platform_id(local_id: LocalId) -> String {
    format!("7656119800000{:04}", local_id)
}

/// Registry and library provider wired to an engine
pub struct TestSystem {
    pub registry: Arc<InMemoryUserRegistry>,
    pub library: Arc<StaticLibraryProvider>,
    pub engine: MatchmakingEngine,
}

impl TestSystem {
    pub fn new() -> Self {
        Self::with_provider(StaticLibraryProvider::new(), MatchmakingSettings::default())
    }

    pub fn with_provider(provider: StaticLibraryProvider, settings: MatchmakingSettings) -> Self {
        let registry = Arc::new(InMemoryUserRegistry::new());
        let library = Arc::new(provider);
        let engine = MatchmakingEngine::new(registry.clone(), library.clone(), settings);

        Self {
            registry,
            library,
            engine,
        }
    }

    /// Register a user and give them a library
    pub fn add_user(&self, local_id: LocalId, entries: &[(AppId, u64)]) {
        let platform_id = platform_id(local_id);
        self.registry.register(local_id, &platform_id).unwrap();
        self.library
            .set_library(&platform_id, library(entries))
            .unwrap();
    }

    /// Register a user whose library fetch always fails
    pub fn add_failing_user(&self, local_id: LocalId) {
        let platform_id = platform_id(local_id);
        self.registry.register(local_id, &platform_id).unwrap();
        self.library.set_failing(&platform_id).unwrap();
    }
}
