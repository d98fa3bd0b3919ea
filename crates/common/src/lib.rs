//! CampusDesk Common Library
//!
//! Shared code for the CampusDesk services including:
//! - Database models, schema bootstrap and the tenant-scoped repository
//! - Domain rules (lifecycles, ledger balancing, voting, summaries)
//! - Error types and handling
//! - Configuration management
//! - Authentication utilities
//! - Metrics and observability

pub mod auth;
pub mod config;
pub mod db;
pub mod domain;
pub mod errors;
pub mod metrics;

// Re-export commonly used types
pub use config::AppConfig;
pub use db::{DbPool, Repository};
pub use errors::{AppError, Result};

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
