//! Backend implementations for Fieldbook storage
//!
//! This module provides the core `BackendImpl` trait and the storage engines that
//! implement it.
//!
//! A backend is a sorted key-value store organized into named tables. Every read and
//! write happens inside a [`BackendTransaction`] that declares up front which tables
//! it touches and whether it writes. Writes become visible to other transactions only
//! when the transaction commits; a rollback (or dropping the transaction) discards them.
//! Keys within a table are ordered lexically by their UTF-8 bytes, which is what makes
//! [`KeyRange`] scans meaningful.

use std::any::Any;

use async_trait::async_trait;

use crate::Result;

pub mod database;
pub mod errors;
mod range;

pub use errors::BackendError;
pub use range::KeyRange;

/// Whether a transaction only reads, or may also write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TransactionMode {
    /// The transaction only reads. Engines may let several run at once.
    #[default]
    ReadOnly,
    /// The transaction may write. Engines serialize these against each other.
    ReadWrite,
}

impl TransactionMode {
    /// Check if this mode permits writes.
    pub fn is_writable(&self) -> bool {
        matches!(self, TransactionMode::ReadWrite)
    }
}

/// Storage engine abstraction for Fieldbook tables.
///
/// All backend implementations must be `Send` and `Sync` to allow sharing across tasks,
/// and implement `Any` to allow for downcasting if needed.
#[async_trait]
pub trait BackendImpl: Send + Sync + Any {
    /// Open a transaction over `tables` in the given mode.
    ///
    /// Touching a table outside `tables` inside the returned transaction is an error,
    /// as is writing through a read-only transaction.
    async fn begin(
        &self,
        tables: &[String],
        mode: TransactionMode,
    ) -> Result<Box<dyn BackendTransaction>>;

    /// Returns a reference to the backend as `Any` for downcasting.
    fn as_any(&self) -> &dyn Any;
}

/// One open transaction against a backend.
///
/// Dropping a transaction without calling [`commit`](BackendTransaction::commit)
/// discards every write it made.
#[async_trait]
pub trait BackendTransaction: Send {
    /// Read the value stored under `key`, if any.
    async fn get(&mut self, table: &str, key: &str) -> Result<Option<String>>;

    /// Store `value` under `key`, replacing any previous value.
    async fn put(&mut self, table: &str, key: &str, value: String) -> Result<()>;

    /// Remove `key`. Removing an absent key is not an error.
    async fn delete(&mut self, table: &str, key: &str) -> Result<()>;

    /// All `(key, value)` pairs inside `range`, in ascending key order.
    async fn range(&mut self, table: &str, range: &KeyRange) -> Result<Vec<(String, String)>>;

    /// All keys inside `range`, in ascending key order.
    async fn keys(&mut self, table: &str, range: &KeyRange) -> Result<Vec<String>>;

    /// Remove every key inside `range`.
    async fn delete_range(&mut self, table: &str, range: &KeyRange) -> Result<()>;

    /// Make every write of this transaction visible, atomically.
    async fn commit(self: Box<Self>) -> Result<()>;

    /// Discard every write of this transaction.
    async fn rollback(self: Box<Self>) -> Result<()>;
}
