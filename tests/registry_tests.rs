//! Integration tests for the SQLite registry
//!
//! Covers registration and re-linking, library snapshots and the community
//! tables (preferences, events, price alerts, LFG posts, game metadata).

mod fixtures;

use chrono::{Duration, Utc};
use fixtures::{library, platform_id, CS2, DOTA_2, TF2};
use playmate::config::DatabaseSettings;
use playmate::error::{classify, not_registered_id, ErrorClass, MatchmakingError};
use playmate::registry::models::{
    EventStatus, GameMetadata, LfgStatus, NewGameEvent, NewLfgPost, NotificationType,
    PreferencesUpdate,
};
use playmate::registry::SqliteRegistry;

async fn registry() -> SqliteRegistry {
    SqliteRegistry::in_memory().await.unwrap()
}

#[tokio::test]
async fn test_register_get_and_unregister() {
    let registry = registry().await;

    let user = registry
        .register_user(1, &platform_id(1), Some("Alice"))
        .await
        .unwrap();
    assert_eq!(user.local_id, 1);
    assert_eq!(user.platform_id, platform_id(1));
    assert_eq!(user.display_name.as_deref(), Some("Alice"));
    assert_eq!(registry.count_users().await.unwrap(), 1);

    assert!(registry.unregister_user(1).await.unwrap());
    assert!(registry.get_user(1).await.unwrap().is_none());
    assert!(!registry.unregister_user(1).await.unwrap());
    assert_eq!(registry.count_users().await.unwrap(), 0);
}

#[tokio::test]
async fn test_reregistration_updates_display_name() {
    let registry = registry().await;
    registry
        .register_user(1, &platform_id(1), Some("Alice"))
        .await
        .unwrap();

    let user = registry
        .register_user(1, &platform_id(1), Some("Alicia"))
        .await
        .unwrap();

    assert_eq!(user.display_name.as_deref(), Some("Alicia"));
    assert_eq!(registry.count_users().await.unwrap(), 1);
}

#[tokio::test]
async fn test_platform_id_linked_to_another_user_is_rejected() {
    let registry = registry().await;
    registry
        .register_user(1, &platform_id(1), None)
        .await
        .unwrap();

    let err = registry
        .register_user(2, &platform_id(1), None)
        .await
        .unwrap_err();

    assert!(matches!(
        err.downcast_ref::<MatchmakingError>(),
        Some(MatchmakingError::PlatformIdInUse { .. })
    ));
    assert_eq!(classify(&err), ErrorClass::InvalidInput);
    assert!(registry.get_user(2).await.unwrap().is_none());
}

#[tokio::test]
async fn test_relinking_drops_previous_library() {
    let registry = registry().await;
    let old_id = platform_id(1);
    let new_id = platform_id(100);

    registry.register_user(1, &old_id, None).await.unwrap();
    registry
        .cache_library(&old_id, &library(&[(DOTA_2, 100), (CS2, 50)]))
        .await
        .unwrap();

    let user = registry.register_user(1, &new_id, None).await.unwrap();

    assert_eq!(user.platform_id, new_id);
    assert!(registry.get_cached_library(&old_id).await.unwrap().is_empty());
    assert!(registry.get_cached_library(&new_id).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_library_snapshot_is_replaced() {
    let registry = registry().await;
    let id = platform_id(1);
    registry.register_user(1, &id, None).await.unwrap();

    registry
        .cache_library(&id, &library(&[(DOTA_2, 100), (CS2, 500), (TF2, 10)]))
        .await
        .unwrap();
    registry
        .cache_library(&id, &library(&[(TF2, 20), (DOTA_2, 300)]))
        .await
        .unwrap();

    let games = registry.get_cached_library(&id).await.unwrap();
    let entries: Vec<(u32, u64)> = games
        .iter()
        .map(|g| (g.app_id, g.playtime_minutes))
        .collect();

    // Most played first, and nothing left over from the first snapshot
    assert_eq!(entries, vec![(DOTA_2, 300), (TF2, 20)]);
    assert_eq!(games[0].name, "Dota 2");
}

#[tokio::test]
async fn test_library_snapshot_keeps_first_duplicate() {
    let registry = registry().await;
    let id = platform_id(1);
    registry.register_user(1, &id, None).await.unwrap();

    registry
        .cache_library(&id, &library(&[(DOTA_2, 900), (CS2, 50), (DOTA_2, 10)]))
        .await
        .unwrap();

    let cached = registry.get_cached_library(&id).await.unwrap();
    let rows: Vec<(u32, u64)> = cached
        .iter()
        .map(|g| (g.app_id, g.playtime_minutes))
        .collect();
    assert_eq!(rows, vec![(DOTA_2, 900), (CS2, 50)]);
}

#[tokio::test]
async fn test_unregister_cascades_to_library_and_preferences() {
    let registry = registry().await;
    let id = platform_id(1);
    registry.register_user(1, &id, None).await.unwrap();
    registry
        .cache_library(&id, &library(&[(DOTA_2, 100)]))
        .await
        .unwrap();
    registry
        .set_user_preferences(1, &PreferencesUpdate::default())
        .await
        .unwrap();
    registry
        .add_price_alert(1, DOTA_2, "Dota 2", 0.0)
        .await
        .unwrap();

    registry.unregister_user(1).await.unwrap();

    assert!(registry.get_cached_library(&id).await.unwrap().is_empty());
    assert!(registry.get_user_preferences(1).await.unwrap().is_none());
    assert!(registry.get_all_active_alerts().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_users_by_platform_ids() {
    let registry = registry().await;
    for id in [3, 1, 2] {
        registry
            .register_user(id, &platform_id(id), None)
            .await
            .unwrap();
    }

    let users = registry
        .get_users_by_platform_ids(&[platform_id(2), platform_id(3), platform_id(9)])
        .await
        .unwrap();
    let ids: Vec<u64> = users.iter().map(|u| u.local_id).collect();
    assert_eq!(ids, vec![2, 3]);

    assert!(registry
        .get_users_by_platform_ids(&[])
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn test_preferences_are_merged() {
    let registry = registry().await;
    registry
        .register_user(1, &platform_id(1), None)
        .await
        .unwrap();

    assert!(registry.get_user_preferences(1).await.unwrap().is_none());

    let first = registry
        .set_user_preferences(
            1,
            &PreferencesUpdate {
                notification_type: Some(NotificationType::Dm),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(first.notification_type, NotificationType::Dm);
    assert_eq!(first.playtime_threshold_hours, 2);

    registry
        .set_user_preferences(
            1,
            &PreferencesUpdate {
                preferred_genres: Some(vec!["RPG".to_string(), "Strategy".to_string()]),
                language: Some("de-DE".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    let stored = registry.get_user_preferences(1).await.unwrap().unwrap();
    assert_eq!(stored.notification_type, NotificationType::Dm);
    assert_eq!(stored.preferred_genres, vec!["RPG", "Strategy"]);
    assert_eq!(stored.language, "de-DE");
}

#[tokio::test]
async fn test_preferences_require_registration() {
    let registry = registry().await;

    let err = registry
        .set_user_preferences(7, &PreferencesUpdate::default())
        .await
        .unwrap_err();
    assert_eq!(not_registered_id(&err), Some(7));
}

#[tokio::test]
async fn test_upcoming_events() {
    let registry = registry().await;
    let now = Utc::now();

    let later = registry
        .create_game_event(&NewGameEvent {
            guild_id: 10,
            game_name: "Dota 2".to_string(),
            app_id: Some(DOTA_2),
            scheduled_time: now + Duration::hours(5),
            created_by: 1,
            participants: vec![1, 2],
        })
        .await
        .unwrap();
    let sooner = registry
        .create_game_event(&NewGameEvent {
            guild_id: 10,
            game_name: "Counter-Strike 2".to_string(),
            app_id: Some(CS2),
            scheduled_time: now + Duration::hours(1),
            created_by: 2,
            participants: vec![2],
        })
        .await
        .unwrap();
    registry
        .create_game_event(&NewGameEvent {
            guild_id: 10,
            game_name: "Old session".to_string(),
            app_id: None,
            scheduled_time: now - Duration::hours(1),
            created_by: 1,
            participants: vec![],
        })
        .await
        .unwrap();
    registry
        .create_game_event(&NewGameEvent {
            guild_id: 11,
            game_name: "Other guild".to_string(),
            app_id: None,
            scheduled_time: now + Duration::hours(1),
            created_by: 3,
            participants: vec![3],
        })
        .await
        .unwrap();

    let events = registry.get_upcoming_events(10, now).await.unwrap();
    let ids: Vec<i64> = events.iter().map(|e| e.id).collect();
    assert_eq!(ids, vec![sooner, later]);
    assert_eq!(events[1].participants, vec![1, 2]);
    assert_eq!(events[1].status, EventStatus::Upcoming);

    assert!(registry
        .update_event_status(sooner, EventStatus::Cancelled)
        .await
        .unwrap());
    let events = registry.get_upcoming_events(10, now).await.unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].id, later);

    assert!(!registry
        .update_event_status(9999, EventStatus::Completed)
        .await
        .unwrap());
}

#[tokio::test]
async fn test_price_alerts() {
    let registry = registry().await;
    registry
        .register_user(1, &platform_id(1), None)
        .await
        .unwrap();

    let first = registry
        .add_price_alert(1, DOTA_2, "Dota 2", 9.99)
        .await
        .unwrap();
    let second = registry
        .add_price_alert(1, CS2, "Counter-Strike 2", 4.5)
        .await
        .unwrap();

    let alerts = registry.get_user_alerts(1).await.unwrap();
    assert_eq!(alerts.len(), 2);
    assert_eq!(alerts[0].id, first);
    assert_eq!(alerts[0].target_price, 9.99);
    assert!(!alerts[0].notified);

    assert!(registry
        .mark_alert_notified(first, Some(7.49))
        .await
        .unwrap());

    let active = registry.get_all_active_alerts().await.unwrap();
    let ids: Vec<i64> = active.iter().map(|a| a.id).collect();
    assert_eq!(ids, vec![second]);
}

#[tokio::test]
async fn test_price_alert_validation() {
    let registry = registry().await;
    registry
        .register_user(1, &platform_id(1), None)
        .await
        .unwrap();

    let err = registry
        .add_price_alert(1, DOTA_2, "Dota 2", -1.0)
        .await
        .unwrap_err();
    assert_eq!(classify(&err), ErrorClass::InvalidInput);

    let err = registry
        .add_price_alert(1, DOTA_2, "Dota 2", f64::NAN)
        .await
        .unwrap_err();
    assert_eq!(classify(&err), ErrorClass::InvalidInput);

    let err = registry
        .add_price_alert(2, DOTA_2, "Dota 2", 5.0)
        .await
        .unwrap_err();
    assert_eq!(not_registered_id(&err), Some(2));
}

#[tokio::test]
async fn test_lfg_posts() {
    let registry = registry().await;

    let post = registry
        .create_lfg_post(&NewLfgPost {
            guild_id: 10,
            local_id: 1,
            app_id: Some(CS2),
            game_name: "Counter-Strike 2".to_string(),
            description: Some("Need two for premier".to_string()),
            players_needed: 2,
            scheduled_time: None,
        })
        .await
        .unwrap();

    let posts = registry.get_active_lfg_posts(10).await.unwrap();
    assert_eq!(posts.len(), 1);
    assert_eq!(posts[0].id, post);
    assert_eq!(posts[0].players_needed, 2);
    assert_eq!(posts[0].status, LfgStatus::Active);
    assert!(registry.get_active_lfg_posts(11).await.unwrap().is_empty());

    assert!(registry.close_lfg_post(post).await.unwrap());
    assert!(!registry.close_lfg_post(post).await.unwrap());
    assert!(registry.get_active_lfg_posts(10).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_game_metadata_round_trip() {
    let registry = registry().await;
    assert!(registry.get_game_metadata(DOTA_2).await.unwrap().is_none());

    let metadata = GameMetadata {
        app_id: DOTA_2,
        name: "Dota 2".to_string(),
        genres: vec!["Action".to_string(), "Strategy".to_string()],
        categories: vec!["Multi-player".to_string()],
        multiplayer_types: vec!["Multi-player".to_string()],
        release_date: Some("9 Jul, 2013".to_string()),
        metacritic_score: Some(90),
        steam_rating: None,
    };
    registry.cache_game_metadata(&metadata).await.unwrap();
    assert_eq!(
        registry.get_game_metadata(DOTA_2).await.unwrap(),
        Some(metadata.clone())
    );

    let refreshed = GameMetadata {
        steam_rating: Some(0.82),
        ..metadata
    };
    registry.cache_game_metadata(&refreshed).await.unwrap();
    assert_eq!(
        registry.get_game_metadata(DOTA_2).await.unwrap(),
        Some(refreshed)
    );
}

#[tokio::test]
async fn test_file_backed_registry_persists() {
    let dir = tempfile::tempdir().unwrap();
    let settings = DatabaseSettings {
        path: dir.path().join("playmate.db").to_string_lossy().into_owned(),
        max_connections: 2,
    };

    {
        let registry = SqliteRegistry::connect(&settings).await.unwrap();
        registry
            .register_user(1, &platform_id(1), Some("Alice"))
            .await
            .unwrap();
        registry
            .cache_library(&platform_id(1), &library(&[(TF2, 42)]))
            .await
            .unwrap();
    }

    let reopened = SqliteRegistry::connect(&settings).await.unwrap();
    let user = reopened.get_user(1).await.unwrap().unwrap();
    assert_eq!(user.display_name.as_deref(), Some("Alice"));

    let games = reopened.get_cached_library(&platform_id(1)).await.unwrap();
    assert_eq!(games.len(), 1);
    assert_eq!(games[0].playtime_minutes, 42);
}
