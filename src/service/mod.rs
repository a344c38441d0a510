//! Service layer for the playmate service
//!
//! This module contains the application state, the JSON API, health checks
//! and background task management for the production service.

pub mod api;
pub mod app;
pub mod health;

pub use app::{AppState, PlaymateService, ServiceError};
pub use health::{HealthCheck, HealthStatus};
