//! Table definitions for the papers store
//!
//! The `year > 1900` rule is declared here as well as in validation so it
//! holds for rows written by any path.

use sea_orm::{ConnectionTrait, DatabaseConnection, DbBackend};
use tracing::info;

use crate::errors::{AppError, Result};

const SQLITE_PAPERS: &str = r#"
CREATE TABLE IF NOT EXISTS papers (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    title TEXT NOT NULL,
    authors TEXT NOT NULL,
    published_in TEXT NOT NULL,
    year INTEGER NOT NULL CHECK (year > 1900),
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
)
"#;

const POSTGRES_PAPERS: &str = r#"
CREATE TABLE IF NOT EXISTS papers (
    id BIGSERIAL PRIMARY KEY,
    title TEXT NOT NULL,
    authors TEXT NOT NULL,
    published_in TEXT NOT NULL,
    year INTEGER NOT NULL CHECK (year > 1900),
    created_at TIMESTAMPTZ NOT NULL,
    updated_at TIMESTAMPTZ NOT NULL,
    CHECK (created_at <= updated_at)
)
"#;

/// Create the papers table if it does not exist yet
pub async fn ensure_schema(conn: &DatabaseConnection) -> Result<()> {
    let backend = conn.get_database_backend();
    let ddl = match backend {
        DbBackend::Sqlite => SQLITE_PAPERS,
        DbBackend::Postgres => POSTGRES_PAPERS,
        other => {
            return Err(AppError::Configuration {
                message: format!("unsupported database backend: {:?}", other),
            })
        }
    };

    conn.execute_unprepared(ddl).await?;
    info!(backend = ?backend, "Papers schema ready");

    Ok(())
}
