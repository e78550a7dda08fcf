//! Database layer for PaperShelf
//!
//! Provides:
//! - SeaORM entity model for papers
//! - Schema bootstrap (SQLite or PostgreSQL)
//! - Repository for all reads and writes of the papers table
//! - Connection pool lifecycle

mod filter;
pub mod models;
mod repository;
pub mod schema;

pub use filter::{PaperFilter, DEFAULT_LIMIT, MAX_LIMIT};
pub use models::{NewPaper, Paper};
pub use repository::Repository;

use crate::config::DatabaseConfig;
use crate::errors::{AppError, Result};
use sea_orm::{ConnectOptions, ConnectionTrait, Database, DatabaseConnection, DbBackend};
use std::time::Duration;
use tracing::info;

/// Database connection pool wrapper.
///
/// Opened once at startup and closed once at shutdown; every store call
/// checks a connection out of the pool for its own duration only.
#[derive(Clone)]
pub struct DbPool {
    conn: DatabaseConnection,
}

impl DbPool {
    /// Connect with the given configuration and make sure the schema exists
    pub async fn new(config: &DatabaseConfig) -> Result<Self> {
        info!("Connecting to database...");

        let mut opts = ConnectOptions::new(&config.url);
        opts.max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .acquire_timeout(Duration::from_secs(config.connect_timeout_secs))
            .idle_timeout(Duration::from_secs(config.idle_timeout_secs))
            .sqlx_logging(cfg!(debug_assertions));

        let conn = Database::connect(opts)
            .await
            .map_err(|e| AppError::StoreUnavailable {
                message: format!("Failed to connect: {}", e),
            })?;

        schema::ensure_schema(&conn).await?;

        info!(
            max_connections = config.max_connections,
            min_connections = config.min_connections,
            "Database connection pool initialized"
        );

        Ok(Self { conn })
    }

    /// Connection used by every store operation
    pub fn conn(&self) -> &DatabaseConnection {
        &self.conn
    }

    pub fn backend(&self) -> DbBackend {
        self.conn.get_database_backend()
    }

    /// Ping the database to check connectivity
    pub async fn ping(&self) -> Result<()> {
        self.conn
            .execute_unprepared("SELECT 1")
            .await
            .map_err(|e| AppError::StoreUnavailable {
                message: format!("Ping failed: {}", e),
            })?;

        Ok(())
    }

    /// Close every pooled connection; clones of this pool stop working
    pub async fn close(self) -> Result<()> {
        self.conn.close().await?;
        info!("Database connections closed");
        Ok(())
    }
}
