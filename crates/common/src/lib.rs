//! PaperShelf Common Library
//!
//! Shared code for the PaperShelf service including:
//! - Error taxonomy and HTTP mapping
//! - Configuration management
//! - Input validation for paper records
//! - Database model, schema, and repository (the record store)
//! - Metrics and observability

pub mod config;
pub mod db;
pub mod errors;
pub mod metrics;
pub mod validation;

// Re-export commonly used types
pub use config::AppConfig;
pub use db::{DbPool, NewPaper, Paper, PaperFilter, Repository};
pub use errors::{AppError, Result};
pub use validation::{validate_filter, validate_id, validate_paper, ListQuery, PaperPayload};

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
