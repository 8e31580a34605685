//! Backup Coordinator Library
//!
//! Runs database dumps and restores through external binaries, keeps the
//! archives in a remote object store and exposes the lifecycle over HTTP.

// Core modules
pub mod config;
pub mod models;

// Routes and middleware
pub mod middleware;
pub mod routes;

// Services
pub mod services;

// Storage
pub mod stores;

// Utilities
pub mod utils;

// External library integrations
pub mod libs;

// Re-export commonly used types
pub use config::Config;
pub use models::error::{CommandError, ConfigError, CoordinatorError, StorageError};
pub use models::types::{BackupArtifact, ScheduleInterval};
pub use services::coordinator::Coordinator;
