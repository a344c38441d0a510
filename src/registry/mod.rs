//! Persistent user registry
//!
//! This module maps chat users to platform ids and keeps the durable side
//! data of the service: library snapshots, preferences, scheduled events,
//! price alerts, LFG posts and game metadata.

pub mod community;
pub mod models;
pub mod sqlite;
pub mod storage;

pub use models::{
    EventStatus, GameEvent, GameMetadata, LfgPost, LfgStatus, NewGameEvent, NewLfgPost,
    NotificationType, PreferencesUpdate, PriceAlert, User, UserPreferences,
};
pub use sqlite::SqliteRegistry;
pub use storage::{InMemoryUserRegistry, UserRegistry};
