//! SQL-based backend implementation for Fieldbook storage.
//!
//! This module provides a SQLite backend that implements the `BackendImpl` trait,
//! allowing Fieldbook tables to live in a single embedded database file.
//!
//! ## Architecture
//!
//! The backend uses sqlx with `AnyPool`. Every Fieldbook table is a slice of one
//! SQL table keyed by `(tbl, key)`, so table names never become SQL identifiers.
//! Each Fieldbook transaction maps onto one SQL transaction. Read-write transactions
//! are additionally serialized in-process, which keeps SQLite from ever having to
//! upgrade two competing read locks.
//!
//! ## Schema and Migrations
//!
//! The database schema is defined in the [`schema`] module and automatically
//! initialized when connecting.

mod storage;

/// Schema definition and migration system.
pub mod schema;

use std::any::Any;
use std::sync::Arc;

use async_trait::async_trait;
use sqlx::AnyPool;
use sqlx::any::AnyPoolOptions;
use tokio::sync::Mutex;

use crate::Result;
use crate::backend::errors::BackendError;
use crate::backend::{BackendImpl, BackendTransaction, TransactionMode};

/// Extension trait for sqlx Result types to simplify error handling.
///
/// Similar to `anyhow::Context`, this trait adds a method to convert
/// sqlx errors to `BackendError::SqlxError` with a context message.
pub(crate) trait SqlxResultExt<T> {
    /// Convert sqlx error to BackendError with context message.
    fn sql_context(self, context: &str) -> Result<T>;
}

impl<T> SqlxResultExt<T> for std::result::Result<T, sqlx::Error> {
    fn sql_context(self, context: &str) -> Result<T> {
        self.map_err(|e| {
            BackendError::SqlxError {
                reason: format!("{context}: {e}"),
                source: Some(e),
            }
            .into()
        })
    }
}

/// SQLite backend implementing `BackendImpl` using sqlx.
///
/// # Thread Safety
///
/// `Sqlite` is `Send + Sync` as required by `BackendImpl`. The underlying
/// sqlx pool handles connection pooling, and an internal mutex admits one
/// read-write transaction at a time.
#[derive(Clone)]
pub struct Sqlite {
    pool: AnyPool,
    writer: Arc<Mutex<()>>,
}

impl std::fmt::Debug for Sqlite {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Sqlite")
            .field("pool_size", &self.pool.size())
            .finish()
    }
}

impl Sqlite {
    /// Get a reference to the underlying pool.
    pub fn pool(&self) -> &AnyPool {
        &self.pool
    }

    /// Open a SQLite database at the given path.
    ///
    /// Creates the database file and schema if they don't exist.
    ///
    /// # Example
    ///
    /// ```ignore
    /// use fieldbook::backend::database::Sqlite;
    ///
    /// #[tokio::main]
    /// async fn main() {
    ///     let backend = Sqlite::open("fieldbook.db").await.unwrap();
    /// }
    /// ```
    pub async fn open<P: AsRef<std::path::Path>>(path: P) -> Result<Self> {
        // mode=rwc: read-write-create (create file if it doesn't exist)
        let url = format!("sqlite:{}?mode=rwc", path.as_ref().display());
        Self::connect(&url).await
    }

    /// Connect to a SQLite database using a connection URL.
    ///
    /// # Arguments
    ///
    /// * `url` - SQLite connection URL (e.g., "sqlite:./fieldbook.db")
    pub async fn connect(url: &str) -> Result<Self> {
        // Install any driver support
        sqlx::any::install_default_drivers();

        let is_in_memory = url.contains("mode=memory");

        // A shared-cache in-memory database is destroyed when its last connection
        // closes, and shared-cache table locks do not honor busy_timeout, so it
        // gets exactly one connection that never expires.
        let pool = if is_in_memory {
            AnyPoolOptions::new()
                .max_connections(1)
                .min_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
                .connect(url)
                .await
                .sql_context("Failed to connect to SQLite")?
        } else {
            AnyPoolOptions::new()
                .max_connections(5)
                .connect(url)
                .await
                .sql_context("Failed to connect to SQLite")?
        };

        if is_in_memory {
            sqlx::query("PRAGMA busy_timeout = 5000;")
                .execute(&pool)
                .await
                .sql_context("Failed to configure SQLite")?;
        } else {
            // File-based SQLite:
            // - journal_mode=WAL: readers do not block the writer
            // - synchronous=NORMAL: Balanced durability (safe with WAL)
            // - busy_timeout=5000: Wait up to 5s for locks before failing
            sqlx::query(
                "PRAGMA journal_mode = WAL;
                 PRAGMA synchronous = NORMAL;
                 PRAGMA busy_timeout = 5000;",
            )
            .execute(&pool)
            .await
            .sql_context("Failed to configure SQLite")?;
        }

        let backend = Self {
            pool,
            writer: Arc::new(Mutex::new(())),
        };

        schema::initialize(&backend).await?;

        Ok(backend)
    }

    /// Create an in-memory SQLite database.
    ///
    /// The database exists only for the lifetime of this backend instance.
    /// Useful for testing.
    pub async fn in_memory() -> Result<Self> {
        // Use a unique name per instance to avoid sharing between tests.
        let unique_id = uuid::Uuid::new_v4();
        let url = format!("sqlite:file:mem_{unique_id}?mode=memory&cache=shared");
        Self::connect(&url).await
    }
}

#[async_trait]
impl BackendImpl for Sqlite {
    async fn begin(
        &self,
        tables: &[String],
        mode: TransactionMode,
    ) -> Result<Box<dyn BackendTransaction>> {
        let writer = match mode {
            TransactionMode::ReadWrite => Some(self.writer.clone().lock_owned().await),
            TransactionMode::ReadOnly => None,
        };
        let txn = self
            .pool
            .begin()
            .await
            .sql_context("Failed to begin transaction")?;
        Ok(Box::new(storage::SqliteTransaction::new(
            txn, tables, mode, writer,
        )))
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
