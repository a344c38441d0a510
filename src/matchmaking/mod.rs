//! Library comparison and matchmaking
//!
//! `scoring` holds the pure comparison functions; `engine` wires them to the
//! registry and the library provider.

pub mod engine;
pub mod scoring;

pub use engine::MatchmakingEngine;
pub use scoring::{ScoringConfig, PLAYTIME_FLOOR_MINUTES, SHARED_GAMES_SATURATION};
