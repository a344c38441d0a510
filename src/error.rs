//! Error types for the matchmaking service
//!
//! This module defines all error types using anyhow for consistent error handling
//! throughout the application. Callers that need to react to a specific failure
//! downcast to [`MatchmakingError`] or use [`classify`].

use crate::types::LocalId;

/// Result type alias for convenience
pub type Result<T> = anyhow::Result<T>;

/// Custom error types for specific matchmaking scenarios
#[derive(Debug, thiserror::Error)]
pub enum MatchmakingError {
    #[error("User {local_id} is not registered")]
    NotRegistered { local_id: LocalId },

    #[error("Upstream request to {endpoint} failed: {message}")]
    UpstreamUnavailable { endpoint: String, message: String },

    #[error("Could not resolve handle: {handle}")]
    HandleNotFound { handle: String },

    #[error("Platform id {platform_id} is already linked to another user")]
    PlatformIdInUse { platform_id: String },

    #[error("Invalid request: {reason}")]
    InvalidRequest { reason: String },

    #[error("Storage error: {message}")]
    StorageError { message: String },

    #[error("Cache error: {message}")]
    CacheError { message: String },

    #[error("Configuration error: {message}")]
    ConfigurationError { message: String },

    #[error("Internal service error: {message}")]
    InternalError { message: String },
}

/// Coarse classification used by presentation layers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// A participant must register before the operation can run
    NotRegistered,
    /// The remote platform failed; retrying later may succeed
    Transient,
    /// The caller sent something unusable
    InvalidInput,
    /// Anything else
    Internal,
}

/// Classify an error produced anywhere in the crate
pub fn classify(err: &anyhow::Error) -> ErrorClass {
    match err.downcast_ref::<MatchmakingError>() {
        Some(MatchmakingError::NotRegistered { .. }) => ErrorClass::NotRegistered,
        Some(MatchmakingError::UpstreamUnavailable { .. }) => ErrorClass::Transient,
        Some(MatchmakingError::InvalidRequest { .. })
        | Some(MatchmakingError::HandleNotFound { .. })
        | Some(MatchmakingError::PlatformIdInUse { .. }) => ErrorClass::InvalidInput,
        _ => ErrorClass::Internal,
    }
}

/// Returns the local id carried by a `NotRegistered` error, if that is what this is
pub fn not_registered_id(err: &anyhow::Error) -> Option<LocalId> {
    match err.downcast_ref::<MatchmakingError>() {
        Some(MatchmakingError::NotRegistered { local_id }) => Some(*local_id),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_known_errors() {
        let err: anyhow::Error = MatchmakingError::NotRegistered { local_id: 42 }.into();
        assert_eq!(classify(&err), ErrorClass::NotRegistered);
        assert_eq!(not_registered_id(&err), Some(42));

        let err: anyhow::Error = MatchmakingError::UpstreamUnavailable {
            endpoint: "GetOwnedGames".to_string(),
            message: "HTTP 503".to_string(),
        }
        .into();
        assert_eq!(classify(&err), ErrorClass::Transient);
        assert_eq!(not_registered_id(&err), None);

        let err: anyhow::Error = MatchmakingError::InvalidRequest {
            reason: "no participants".to_string(),
        }
        .into();
        assert_eq!(classify(&err), ErrorClass::InvalidInput);
    }

    #[test]
    fn test_classify_foreign_error_is_internal() {
        let err = anyhow::anyhow!("something unexpected");
        assert_eq!(classify(&err), ErrorClass::Internal);
    }

    #[test]
    fn test_classify_survives_context() {
        let err: anyhow::Error = MatchmakingError::NotRegistered { local_id: 7 }.into();
        let err = err.context("while comparing libraries");
        assert_eq!(classify(&err), ErrorClass::NotRegistered);
    }
}
