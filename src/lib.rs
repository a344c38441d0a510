//! Playmate - game-library matchmaking for Steam users
//!
//! This crate compares the game libraries of registered users: games every
//! member of a group owns, pairwise compatibility scores, best-match ranking
//! and owner search, backed by a cache-first Steam Web API client and a
//! SQLite user registry.

pub mod cache;
pub mod config;
pub mod error;
pub mod matchmaking;
pub mod metrics;
pub mod registry;
pub mod service;
pub mod steam;
pub mod types;
pub mod utils;

// Re-export commonly used types and traits
pub use error::{MatchmakingError, Result};
pub use types::*;

// Re-export key components
pub use matchmaking::MatchmakingEngine;
pub use registry::{SqliteRegistry, UserRegistry};
pub use steam::{LibraryProvider, SteamClient, StaticLibraryProvider};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
