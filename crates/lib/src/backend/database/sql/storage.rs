//! Transaction implementation for the SQLite backend.

use std::collections::HashSet;
use std::ops::Bound;

use async_trait::async_trait;
use sqlx::{Any, Transaction};
use tokio::sync::OwnedMutexGuard;

use super::SqlxResultExt;
use crate::Result;
use crate::backend::errors::BackendError;
use crate::backend::{BackendTransaction, KeyRange, TransactionMode};

pub(super) struct SqliteTransaction {
    txn: Transaction<'static, Any>,
    scope: HashSet<String>,
    mode: TransactionMode,
    /// Held for the lifetime of a read-write transaction.
    _writer: Option<OwnedMutexGuard<()>>,
}

impl SqliteTransaction {
    pub(super) fn new(
        txn: Transaction<'static, Any>,
        tables: &[String],
        mode: TransactionMode,
        writer: Option<OwnedMutexGuard<()>>,
    ) -> Self {
        Self {
            txn,
            scope: tables.iter().cloned().collect(),
            mode,
            _writer: writer,
        }
    }

    fn check_read(&self, table: &str) -> Result<()> {
        if self.scope.contains(table) {
            Ok(())
        } else {
            Err(BackendError::TableNotInScope {
                table: table.to_string(),
            }
            .into())
        }
    }

    fn check_write(&self, table: &str, operation: &'static str) -> Result<()> {
        self.check_read(table)?;
        if self.mode.is_writable() {
            Ok(())
        } else {
            Err(BackendError::ReadOnlyTransaction {
                operation,
                table: table.to_string(),
            }
            .into())
        }
    }
}

/// Build the `WHERE` clause for a key range.
///
/// `$1` is always the table name; bound values follow in order.
fn range_clause(range: &KeyRange) -> (String, Vec<String>) {
    let mut clause = String::from("tbl = $1");
    let mut params = Vec::new();
    let mut push = |op: &str, value: &str| {
        params.push(value.to_string());
        clause.push_str(&format!(" AND key {op} ${}", params.len() + 1));
    };
    match range.lower() {
        Bound::Included(lo) => push(">=", lo),
        Bound::Excluded(lo) => push(">", lo),
        Bound::Unbounded => {}
    }
    match range.upper() {
        Bound::Included(hi) => push("<=", hi),
        Bound::Excluded(hi) => push("<", hi),
        Bound::Unbounded => {}
    }
    (clause, params)
}

#[async_trait]
impl BackendTransaction for SqliteTransaction {
    async fn get(&mut self, table: &str, key: &str) -> Result<Option<String>> {
        self.check_read(table)?;
        let row: Option<(String,)> =
            sqlx::query_as("SELECT value FROM kv WHERE tbl = $1 AND key = $2")
                .bind(table.to_string())
                .bind(key.to_string())
                .fetch_optional(&mut *self.txn)
                .await
                .sql_context("Failed to read key")?;
        Ok(row.map(|(value,)| value))
    }

    async fn put(&mut self, table: &str, key: &str, value: String) -> Result<()> {
        self.check_write(table, "put")?;
        sqlx::query(
            "INSERT INTO kv (tbl, key, value) VALUES ($1, $2, $3)
             ON CONFLICT (tbl, key) DO UPDATE SET value = excluded.value",
        )
        .bind(table.to_string())
        .bind(key.to_string())
        .bind(value)
        .execute(&mut *self.txn)
        .await
        .sql_context("Failed to write key")?;
        Ok(())
    }

    async fn delete(&mut self, table: &str, key: &str) -> Result<()> {
        self.check_write(table, "delete")?;
        sqlx::query("DELETE FROM kv WHERE tbl = $1 AND key = $2")
            .bind(table.to_string())
            .bind(key.to_string())
            .execute(&mut *self.txn)
            .await
            .sql_context("Failed to delete key")?;
        Ok(())
    }

    async fn range(&mut self, table: &str, range: &KeyRange) -> Result<Vec<(String, String)>> {
        self.check_read(table)?;
        if range.is_empty() {
            return Ok(Vec::new());
        }
        let (clause, params) = range_clause(range);
        let sql = format!("SELECT key, value FROM kv WHERE {clause} ORDER BY key");
        let mut query = sqlx::query_as::<_, (String, String)>(&sql).bind(table.to_string());
        for param in params {
            query = query.bind(param);
        }
        query
            .fetch_all(&mut *self.txn)
            .await
            .sql_context("Failed to scan range")
    }

    async fn keys(&mut self, table: &str, range: &KeyRange) -> Result<Vec<String>> {
        self.check_read(table)?;
        if range.is_empty() {
            return Ok(Vec::new());
        }
        let (clause, params) = range_clause(range);
        let sql = format!("SELECT key FROM kv WHERE {clause} ORDER BY key");
        let mut query = sqlx::query_as::<_, (String,)>(&sql).bind(table.to_string());
        for param in params {
            query = query.bind(param);
        }
        let rows = query
            .fetch_all(&mut *self.txn)
            .await
            .sql_context("Failed to list keys")?;
        Ok(rows.into_iter().map(|(key,)| key).collect())
    }

    async fn delete_range(&mut self, table: &str, range: &KeyRange) -> Result<()> {
        self.check_write(table, "delete range")?;
        if range.is_empty() {
            return Ok(());
        }
        let (clause, params) = range_clause(range);
        let sql = format!("DELETE FROM kv WHERE {clause}");
        let mut query = sqlx::query(&sql).bind(table.to_string());
        for param in params {
            query = query.bind(param);
        }
        query
            .execute(&mut *self.txn)
            .await
            .sql_context("Failed to delete range")?;
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        self.txn
            .commit()
            .await
            .sql_context("Failed to commit transaction")
    }

    async fn rollback(self: Box<Self>) -> Result<()> {
        self.txn
            .rollback()
            .await
            .sql_context("Failed to roll back transaction")
    }
}
