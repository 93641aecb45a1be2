//! In-memory database backend implementation
//!
//! This module provides an in-memory implementation of the `BackendImpl` trait,
//! suitable for testing, development, or scenarios where data persistence
//! is handled by saving and loading the whole state as a JSON file.

mod persistence;

use std::any::Any;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{OwnedRwLockReadGuard, OwnedRwLockWriteGuard, RwLock};

use crate::Result;
use crate::backend::errors::BackendError;
use crate::backend::{BackendImpl, BackendTransaction, KeyRange, TransactionMode};

/// Table name -> sorted key/value pairs.
pub(crate) type Tables = HashMap<String, BTreeMap<String, String>>;

/// A simple in-memory database holding every table in a `BTreeMap`.
///
/// Transactions hold a tokio `RwLock` guard for their whole lifetime, so read-only
/// transactions run side by side while read-write transactions run one at a time.
/// Writes go straight into the locked tables and leave an undo entry behind;
/// rollback, or dropping an uncommitted transaction, replays the entries in
/// reverse.
#[derive(Debug, Default, Clone)]
pub struct InMemory {
    pub(crate) tables: Arc<RwLock<Tables>>,
}

impl InMemory {
    /// Creates a new, empty `InMemory` database.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the names of all tables that currently hold at least one key.
    pub async fn table_names(&self) -> Vec<String> {
        let tables = self.tables.read().await;
        let mut names: Vec<String> = tables
            .iter()
            .filter(|(_, rows)| !rows.is_empty())
            .map(|(name, _)| name.clone())
            .collect();
        names.sort();
        names
    }

    /// Saves every table to a specified file as JSON.
    ///
    /// # Arguments
    /// * `path` - The path to the file where the state should be saved.
    ///
    /// # Returns
    /// A `Result` indicating success or an I/O or serialization error.
    pub async fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        persistence::save_to_file(self, path).await
    }

    /// Loads the database state from a specified JSON file.
    ///
    /// If the file does not exist, a new, empty `InMemory` database is returned.
    ///
    /// # Arguments
    /// * `path` - The path to the file from which to load the state.
    ///
    /// # Returns
    /// A `Result` containing the loaded `InMemory` database or an I/O or deserialization error.
    pub async fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        persistence::load_from_file(path).await
    }
}

#[async_trait]
impl BackendImpl for InMemory {
    async fn begin(
        &self,
        tables: &[String],
        mode: TransactionMode,
    ) -> Result<Box<dyn BackendTransaction>> {
        let guard = match mode {
            TransactionMode::ReadOnly => Guard::Read(self.tables.clone().read_owned().await),
            TransactionMode::ReadWrite => Guard::Write(self.tables.clone().write_owned().await),
        };
        Ok(Box::new(InMemoryTransaction {
            scope: tables.iter().cloned().collect(),
            guard,
            undo: Vec::new(),
        }))
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

enum Guard {
    Read(OwnedRwLockReadGuard<Tables>),
    Write(OwnedRwLockWriteGuard<Tables>),
}

impl Guard {
    fn tables(&self) -> &Tables {
        match self {
            Guard::Read(guard) => guard,
            Guard::Write(guard) => guard,
        }
    }
}

/// A row as it was before the transaction touched it.
struct UndoEntry {
    table: String,
    key: String,
    previous: Option<String>,
}

struct InMemoryTransaction {
    scope: HashSet<String>,
    guard: Guard,
    /// One entry per row change, oldest first.
    undo: Vec<UndoEntry>,
}

impl InMemoryTransaction {
    fn check_scope(&self, table: &str) -> Result<()> {
        if self.scope.contains(table) {
            Ok(())
        } else {
            Err(BackendError::TableNotInScope {
                table: table.to_string(),
            }
            .into())
        }
    }

    fn read_table(&self, table: &str) -> Result<Option<&BTreeMap<String, String>>> {
        self.check_scope(table)?;
        Ok(self.guard.tables().get(table))
    }

    /// The rows of `table` together with the undo log, for a write.
    fn write_table(
        &mut self,
        table: &str,
        operation: &'static str,
    ) -> Result<(&mut BTreeMap<String, String>, &mut Vec<UndoEntry>)> {
        self.check_scope(table)?;
        match &mut self.guard {
            Guard::Write(tables) => Ok((tables.entry(table.to_string()).or_default(), &mut self.undo)),
            Guard::Read(_) => Err(BackendError::ReadOnlyTransaction {
                operation,
                table: table.to_string(),
            }
            .into()),
        }
    }

    /// Put every touched row back the way it was.
    fn undo_all(&mut self) {
        let Guard::Write(tables) = &mut self.guard else {
            return;
        };
        while let Some(entry) = self.undo.pop() {
            let rows = tables.entry(entry.table).or_default();
            match entry.previous {
                Some(value) => {
                    rows.insert(entry.key, value);
                }
                None => {
                    rows.remove(&entry.key);
                }
            }
        }
    }

    fn scan<'a>(
        rows: Option<&'a BTreeMap<String, String>>,
        range: &KeyRange,
    ) -> impl Iterator<Item = (&'a String, &'a String)> {
        let rows = if range.is_empty() { None } else { rows };
        rows.into_iter()
            .flat_map(move |rows| rows.range::<str, _>(range.as_bounds()))
    }
}

#[async_trait]
impl BackendTransaction for InMemoryTransaction {
    async fn get(&mut self, table: &str, key: &str) -> Result<Option<String>> {
        Ok(self
            .read_table(table)?
            .and_then(|rows| rows.get(key))
            .cloned())
    }

    async fn put(&mut self, table: &str, key: &str, value: String) -> Result<()> {
        let (rows, undo) = self.write_table(table, "put")?;
        let previous = rows.insert(key.to_string(), value);
        undo.push(UndoEntry {
            table: table.to_string(),
            key: key.to_string(),
            previous,
        });
        Ok(())
    }

    async fn delete(&mut self, table: &str, key: &str) -> Result<()> {
        let (rows, undo) = self.write_table(table, "delete")?;
        if let Some(previous) = rows.remove(key) {
            undo.push(UndoEntry {
                table: table.to_string(),
                key: key.to_string(),
                previous: Some(previous),
            });
        }
        Ok(())
    }

    async fn range(&mut self, table: &str, range: &KeyRange) -> Result<Vec<(String, String)>> {
        let rows = self.read_table(table)?;
        Ok(Self::scan(rows, range)
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect())
    }

    async fn keys(&mut self, table: &str, range: &KeyRange) -> Result<Vec<String>> {
        let rows = self.read_table(table)?;
        Ok(Self::scan(rows, range).map(|(k, _)| k.clone()).collect())
    }

    async fn delete_range(&mut self, table: &str, range: &KeyRange) -> Result<()> {
        let (rows, undo) = self.write_table(table, "delete range")?;
        let removed: Vec<(String, String)> = if range.is_unbounded() {
            std::mem::take(rows).into_iter().collect()
        } else {
            let keys: Vec<String> = Self::scan(Some(&*rows), range)
                .map(|(k, _)| k.clone())
                .collect();
            keys.into_iter()
                .filter_map(|key| rows.remove(&key).map(|value| (key, value)))
                .collect()
        };
        undo.extend(removed.into_iter().map(|(key, value)| UndoEntry {
            table: table.to_string(),
            key,
            previous: Some(value),
        }));
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        let mut txn = self;
        txn.undo.clear();
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<()> {
        let mut txn = self;
        txn.undo_all();
        Ok(())
    }
}

impl Drop for InMemoryTransaction {
    fn drop(&mut self) {
        self.undo_all();
    }
}
