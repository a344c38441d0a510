//! Steam Web API access
//!
//! This module contains the HTTP transport with retry, the wire formats,
//! the cache-first client and the narrow library provider interface the
//! matchmaking engine depends on.

pub mod client;
pub mod messages;
pub mod provider;
pub mod transport;

pub use client::SteamClient;
pub use provider::{LibraryProvider, StaticLibraryProvider};
pub use transport::SteamTransport;
