//! Service layer for the stranger-room service
//!
//! This module contains the main application state, the core event loop,
//! service coordination and background task management.

pub mod app;
pub mod health;

pub use app::{spawn_core, AppState, CoreHandle, ServiceError, MSG_SHUTTING_DOWN};
pub use health::{HealthCheck, HealthProbe, HealthStatus};
