//! Integration tests for the playmate matchmaking engine
//!
//! These tests run the engine against an in-memory registry and a static
//! library provider, covering:
//! - Group intersections and the fail-fast contract for unknown users
//! - Pairwise compatibility scores
//! - Best-match ranking and owner search over candidate pools
//! - Bounded fetch concurrency

mod fixtures;

use fixtures::{TestSystem, CS2, DOTA_2, PORTAL_2, ROCKET_LEAGUE, TF2};
use playmate::config::MatchmakingSettings;
use playmate::error::{classify, not_registered_id, ErrorClass};
use playmate::steam::StaticLibraryProvider;
use playmate::types::AppId;
use std::time::Duration;

fn ids_of(games: &[playmate::types::OwnedGame]) -> Vec<AppId> {
    games.iter().map(|g| g.app_id).collect()
}

#[tokio::test]
async fn test_common_games_across_group() {
    let system = TestSystem::new();
    system.add_user(1, &[(DOTA_2, 10), (CS2, 50), (TF2, 50), (PORTAL_2, 1)]);
    system.add_user(2, &[(TF2, 999), (CS2, 1), (DOTA_2, 7)]);
    system.add_user(3, &[(DOTA_2, 0), (CS2, 0), (TF2, 0), (ROCKET_LEAGUE, 0)]);

    let common = system.engine.common_games(&[1, 2, 3]).await.unwrap();

    // Ordered by the first user's playtime; CS2 and TF2 tie and keep order
    assert_eq!(ids_of(&common), vec![CS2, TF2, DOTA_2]);
    assert_eq!(common[0].playtime_minutes, 50);
    assert_eq!(system.library.fetch_count(), 3);
}

#[tokio::test]
async fn test_common_games_single_user() {
    let system = TestSystem::new();
    system.add_user(1, &[(DOTA_2, 10), (CS2, 30), (TF2, 20)]);

    let common = system.engine.common_games(&[1]).await.unwrap();
    assert_eq!(ids_of(&common), vec![CS2, TF2, DOTA_2]);
}

#[tokio::test]
async fn test_common_games_with_empty_library() {
    let system = TestSystem::new();
    system.add_user(1, &[(DOTA_2, 10)]);
    system.add_user(2, &[]);

    let common = system.engine.common_games(&[1, 2]).await.unwrap();
    assert!(common.is_empty());
}

#[tokio::test]
async fn test_unregistered_participant_fails_before_fetching() {
    let system = TestSystem::new();
    system.add_user(1, &[(DOTA_2, 10)]);
    system.add_user(3, &[(DOTA_2, 10)]);

    let err = system.engine.common_games(&[1, 2, 3]).await.unwrap_err();

    assert_eq!(classify(&err), ErrorClass::NotRegistered);
    assert_eq!(not_registered_id(&err), Some(2));
    assert_eq!(system.library.fetch_count(), 0);
}

#[tokio::test]
async fn test_compatibility_reference_scenario() {
    let system = TestSystem::new();
    system.add_user(1, &[(DOTA_2, 1000), (CS2, 500), (TF2, 300)]);
    system.add_user(2, &[(DOTA_2, 1200), (CS2, 400)]);

    let report = system.engine.compatibility(1, 2).await.unwrap().report();

    assert_eq!(report.score, 54.2);
    assert_eq!(report.shared_games, 2);
    assert_eq!(report.library_overlap, 66.7);
    assert_eq!(report.playtime_similarity, 81.7);
}

#[tokio::test]
async fn test_compatibility_is_symmetric() {
    let system = TestSystem::new();
    system.add_user(1, &[(DOTA_2, 1000), (CS2, 500), (TF2, 300)]);
    system.add_user(2, &[(DOTA_2, 1200), (CS2, 400), (PORTAL_2, 90)]);

    let forward = system.engine.compatibility(1, 2).await.unwrap();
    let backward = system.engine.compatibility(2, 1).await.unwrap();

    assert_eq!(forward, backward);
}

#[tokio::test]
async fn test_compatibility_with_empty_library() {
    let system = TestSystem::new();
    system.add_user(1, &[(DOTA_2, 1000)]);
    system.add_user(2, &[]);

    let result = system.engine.compatibility(1, 2).await.unwrap();
    assert_eq!(result.composite, 0.0);
    assert_eq!(result.shared_games, 0);
}

#[tokio::test]
async fn test_compatibility_upstream_failure_propagates() {
    let system = TestSystem::new();
    system.add_user(1, &[(DOTA_2, 1000)]);
    system.add_failing_user(2);

    let err = system.engine.compatibility(1, 2).await.unwrap_err();
    assert_eq!(classify(&err), ErrorClass::Transient);
}

#[tokio::test]
async fn test_best_matches_ranking() {
    let system = TestSystem::new();
    system.add_user(1, &[(DOTA_2, 1000), (CS2, 500), (TF2, 300)]);
    system.add_user(2, &[(DOTA_2, 1000), (CS2, 500), (TF2, 300)]);
    system.add_user(3, &[(DOTA_2, 1200), (CS2, 400)]);
    system.add_user(4, &[(PORTAL_2, 100)]);
    system.add_failing_user(6);

    let matches = system
        .engine
        .find_best_matches(1, &[4, 5, 3, 6, 2], None)
        .await
        .unwrap();

    let ranked: Vec<u64> = matches.iter().map(|m| m.local_id).collect();
    assert_eq!(ranked, vec![2, 3, 4]);
    assert!(matches[0].result.composite > matches[1].result.composite);
    assert_eq!(matches[2].result.composite, 0.0);
}

#[tokio::test]
async fn test_best_matches_limit_and_ties() {
    let system = TestSystem::new();
    system.add_user(1, &[(DOTA_2, 1000), (CS2, 500)]);
    system.add_user(2, &[(DOTA_2, 800)]);
    system.add_user(3, &[(DOTA_2, 800)]);
    system.add_user(4, &[(DOTA_2, 800)]);

    let matches = system
        .engine
        .find_best_matches(1, &[4, 2, 3], Some(2))
        .await
        .unwrap();

    // Equal scores keep candidate order
    let ranked: Vec<u64> = matches.iter().map(|m| m.local_id).collect();
    assert_eq!(ranked, vec![4, 2]);
}

#[tokio::test]
async fn test_best_matches_skips_self_and_duplicates() {
    let system = TestSystem::new();
    system.add_user(1, &[(DOTA_2, 1000)]);
    system.add_user(2, &[(DOTA_2, 900)]);

    let matches = system
        .engine
        .find_best_matches(1, &[1, 2, 2, 1], None)
        .await
        .unwrap();

    assert_eq!(matches.len(), 1);
    assert_eq!(matches[0].local_id, 2);
    // Primary plus one distinct candidate
    assert_eq!(system.library.fetch_count(), 2);
}

#[tokio::test]
async fn test_best_matches_empty_pool() {
    let system = TestSystem::new();
    system.add_user(1, &[(DOTA_2, 1000)]);

    let matches = system.engine.find_best_matches(1, &[], None).await.unwrap();
    assert!(matches.is_empty());
}

#[tokio::test]
async fn test_best_matches_default_limit() {
    let system = TestSystem::new();
    system.add_user(1, &[(DOTA_2, 1000)]);
    for id in 2..=9 {
        system.add_user(id, &[(DOTA_2, 100 * id)]);
    }

    let candidates: Vec<u64> = (2..=9).collect();
    let matches = system
        .engine
        .find_best_matches(1, &candidates, None)
        .await
        .unwrap();

    assert_eq!(
        matches.len(),
        MatchmakingSettings::default().default_match_limit
    );
}

#[tokio::test]
async fn test_find_players_for_game() {
    let system = TestSystem::new();
    system.add_user(1, &[(CS2, 120)]);
    system.add_user(2, &[(DOTA_2, 5000)]);
    system.add_user(3, &[(CS2, 600), (DOTA_2, 10)]);
    system.add_user(4, &[(CS2, 120)]);
    system.add_failing_user(5);

    let owners = system
        .engine
        .find_players_for_game("COUNTER", &[1, 2, 3, 4, 5, 6])
        .await
        .unwrap();

    let ids: Vec<u64> = owners.iter().map(|o| o.local_id).collect();
    assert_eq!(ids, vec![3, 1, 4]);
    assert_eq!(owners[0].game_name, "Counter-Strike 2");
    assert_eq!(owners[0].app_id, CS2);
    assert_eq!(owners[0].playtime_hours, 10.0);
}

#[tokio::test]
async fn test_find_players_no_owner() {
    let system = TestSystem::new();
    system.add_user(1, &[(CS2, 120)]);

    let owners = system
        .engine
        .find_players_for_game("portal", &[1])
        .await
        .unwrap();
    assert!(owners.is_empty());
}

#[tokio::test]
async fn test_library_stats() {
    let system = TestSystem::new();
    system.add_user(1, &[(DOTA_2, 600), (CS2, 0), (TF2, 120), (PORTAL_2, 60)]);

    let stats = system.engine.library_stats(1).await.unwrap();
    assert_eq!(stats.total_games, 4);
    assert_eq!(stats.played_games, 3);
    assert_eq!(stats.total_playtime_hours, 13.0);
    assert_eq!(stats.top_games[0].app_id, DOTA_2);

    let err = system.engine.library_stats(99).await.unwrap_err();
    assert_eq!(not_registered_id(&err), Some(99));
}

#[tokio::test]
async fn test_fetch_concurrency_is_bounded() {
    let provider = StaticLibraryProvider::new().with_delay(Duration::from_millis(30));
    let settings = MatchmakingSettings {
        max_concurrent_fetches: 2,
        ..MatchmakingSettings::default()
    };
    let system = TestSystem::with_provider(provider, settings);
    for id in 1..=6 {
        system.add_user(id, &[(DOTA_2, 100)]);
    }

    let users: Vec<u64> = (1..=6).collect();
    let common = system.engine.common_games(&users).await.unwrap();

    assert_eq!(ids_of(&common), vec![DOTA_2]);
    assert_eq!(system.library.fetch_count(), 6);
    assert!(system.library.max_in_flight() <= 2);
}

#[tokio::test]
async fn test_fetches_run_concurrently() {
    let provider = StaticLibraryProvider::new().with_delay(Duration::from_millis(30));
    let system = TestSystem::with_provider(provider, MatchmakingSettings::default());
    for id in 1..=4 {
        system.add_user(id, &[(DOTA_2, 100)]);
    }

    system.engine.common_games(&[1, 2, 3, 4]).await.unwrap();
    assert!(system.library.max_in_flight() > 1);
}

#[tokio::test]
async fn test_best_matches_fetches_primary_alongside_candidates() {
    let provider = StaticLibraryProvider::new().with_delay(Duration::from_millis(50));
    let system = TestSystem::with_provider(provider, MatchmakingSettings::default());
    system.add_user(1, &[(DOTA_2, 100)]);
    system.add_user(2, &[(DOTA_2, 100)]);

    let matches = system.engine.find_best_matches(1, &[2], None).await.unwrap();

    assert_eq!(matches.len(), 1);
    assert_eq!(system.library.fetch_count(), 2);
    assert!(system.library.max_in_flight() > 1);
}

#[tokio::test]
async fn test_best_matches_primary_fetch_failure_propagates() {
    let system = TestSystem::new();
    system.add_failing_user(1);
    system.add_user(2, &[(DOTA_2, 100)]);

    let err = system.engine.find_best_matches(1, &[2], None).await.unwrap_err();
    assert_eq!(classify(&err), ErrorClass::Transient);
}
