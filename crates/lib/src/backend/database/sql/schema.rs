//! SQL schema definitions.
//!
//! Every Fieldbook table lives in the single `kv` table, partitioned by the `tbl`
//! column. Keys compare with SQLite's default BINARY collation, which orders
//! UTF-8 text the same way Rust orders `str`.

use crate::Result;
use crate::backend::errors::BackendError;

use super::{Sqlite, SqlxResultExt};

/// Current schema version.
///
/// Databases stamped with a newer version are refused.
pub const SCHEMA_VERSION: i64 = 1;

/// SQL statements to create the schema tables.
pub const CREATE_TABLES: &[&str] = &[
    // Schema version tracking
    "CREATE TABLE IF NOT EXISTS schema_version (
        version BIGINT PRIMARY KEY
    )",
    // Sorted key-value rows for every Fieldbook table
    "CREATE TABLE IF NOT EXISTS kv (
        tbl TEXT NOT NULL,
        key TEXT NOT NULL,
        value TEXT NOT NULL,
        PRIMARY KEY (tbl, key)
    )",
];

/// Initialize the database schema.
///
/// Creates tables if they don't exist and stamps a fresh database with
/// [`SCHEMA_VERSION`].
pub async fn initialize(backend: &Sqlite) -> Result<()> {
    let pool = backend.pool();

    for statement in CREATE_TABLES {
        sqlx::query(statement)
            .execute(pool)
            .await
            .map_err(|e| BackendError::SqlxError {
                reason: format!("Schema creation failed: {e} - SQL: {statement}"),
                source: Some(e),
            })?;
    }

    let row: Option<(i64,)> = sqlx::query_as("SELECT version FROM schema_version")
        .fetch_optional(pool)
        .await
        .sql_context("Failed to check schema version")?;

    match row {
        None => {
            sqlx::query("INSERT INTO schema_version (version) VALUES ($1)")
                .bind(SCHEMA_VERSION)
                .execute(pool)
                .await
                .sql_context("Failed to initialize schema version")?;
        }
        Some((current,)) if current > SCHEMA_VERSION => {
            return Err(BackendError::SqlxError {
                reason: format!(
                    "Database schema v{current} is newer than supported v{SCHEMA_VERSION}"
                ),
                source: None,
            }
            .into());
        }
        Some(_) => {}
    }

    Ok(())
}
