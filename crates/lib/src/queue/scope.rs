//! The operation-capturing handle passed to a transaction body.

use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::sync::oneshot;

use super::op::{Op, OpKind, UpdateFn};
use super::pending::{self, Pending};
use crate::Result;
use crate::backend::KeyRange;

/// Collects the operations of one transaction.
///
/// Nothing touches the store while the body runs: each call records an
/// operation and hands back a [`Pending`] for its result. The queue replays the
/// recorded operations in order, inside one backend transaction, once the body
/// returns.
#[derive(Default)]
pub struct TxnScope {
    pub(crate) ops: Vec<Op>,
    /// Number of operations captured before `abort()` was called.
    pub(crate) abort_at: Option<usize>,
}

impl std::fmt::Debug for TxnScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TxnScope")
            .field("ops", &self.ops.len())
            .field("abort_at", &self.abort_at)
            .finish()
    }
}

impl TxnScope {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    fn push<T>(&mut self, kind: OpKind, decode: fn(super::op::Output) -> Result<T>) -> Pending<T> {
        let (reply, rx) = oneshot::channel();
        self.ops.push(Op { kind, reply });
        Pending::new(rx, decode)
    }

    /// Serialize `value`, turning a failure into an operation that fails on replay.
    fn encode<V: Serialize + ?Sized>(value: &V) -> std::result::Result<String, crate::Error> {
        serde_json::to_string(value).map_err(Into::into)
    }

    /// Store `value` under `key`.
    pub fn save<V: Serialize + ?Sized>(
        &mut self,
        table: &str,
        key: impl Into<String>,
        value: &V,
    ) -> Pending<()> {
        let kind = match Self::encode(value) {
            Ok(value) => OpKind::Put {
                table: table.to_string(),
                key: key.into(),
                value,
            },
            Err(error) => OpKind::Rejected {
                table: table.to_string(),
                error,
            },
        };
        self.push(kind, pending::unit)
    }

    /// Store several `(key, value)` pairs as one operation.
    pub fn save_all<K, V, I>(&mut self, table: &str, entries: I) -> Pending<()>
    where
        K: Into<String>,
        V: Serialize,
        I: IntoIterator<Item = (K, V)>,
    {
        let encoded: std::result::Result<Vec<(String, String)>, crate::Error> = entries
            .into_iter()
            .map(|(key, value)| Ok((key.into(), Self::encode(&value)?)))
            .collect();
        let kind = match encoded {
            Ok(entries) => OpKind::PutAll {
                table: table.to_string(),
                entries,
            },
            Err(error) => OpKind::Rejected {
                table: table.to_string(),
                error,
            },
        };
        self.push(kind, pending::unit)
    }

    /// Read the value stored under `key`.
    pub fn load<V: DeserializeOwned>(
        &mut self,
        table: &str,
        key: impl Into<String>,
    ) -> Pending<Option<V>> {
        self.push(
            OpKind::Get {
                table: table.to_string(),
                key: key.into(),
            },
            pending::value::<V>,
        )
    }

    /// Read every `(key, value)` pair inside `range`, in key order.
    pub fn load_all<V: DeserializeOwned>(
        &mut self,
        table: &str,
        range: KeyRange,
    ) -> Pending<Vec<(String, V)>> {
        self.push(
            OpKind::Range {
                table: table.to_string(),
                range,
            },
            pending::entries::<V>,
        )
    }

    /// List every key inside `range`, in key order.
    pub fn list(&mut self, table: &str, range: KeyRange) -> Pending<Vec<String>> {
        self.push(
            OpKind::Keys {
                table: table.to_string(),
                range,
            },
            pending::keys,
        )
    }

    /// Remove `key`.
    pub fn delete(&mut self, table: &str, key: impl Into<String>) -> Pending<()> {
        self.push(
            OpKind::Delete {
                table: table.to_string(),
                key: key.into(),
            },
            pending::unit,
        )
    }

    /// Remove every key inside `range`.
    pub fn delete_all(&mut self, table: &str, range: KeyRange) -> Pending<()> {
        self.push(
            OpKind::DeleteRange {
                table: table.to_string(),
                range,
            },
            pending::unit,
        )
    }

    /// Remove every key in `table`.
    pub fn clear(&mut self, table: &str) -> Pending<()> {
        self.delete_all(table, KeyRange::all())
    }

    /// Replace the value under `key` with `f(current)`, atomically with the rest
    /// of the transaction.
    ///
    /// Returning `None` from `f` removes the key. The handle resolves to the
    /// value that was written.
    pub fn update<V, F>(&mut self, table: &str, key: impl Into<String>, f: F) -> Pending<Option<V>>
    where
        V: Serialize + DeserializeOwned + 'static,
        F: FnOnce(Option<V>) -> Option<V> + Send + 'static,
    {
        let apply: UpdateFn = Box::new(move |raw: Option<String>| -> Result<Option<String>> {
            let current = raw.map(|s| serde_json::from_str::<V>(&s)).transpose()?;
            Ok(f(current).map(|v| serde_json::to_string(&v)).transpose()?)
        });
        self.push(
            OpKind::Update {
                table: table.to_string(),
                key: key.into(),
                apply,
            },
            pending::value::<V>,
        )
    }

    /// Roll the transaction back instead of committing it.
    ///
    /// Operations captured before this call still run (their effects are then
    /// discarded); operations captured after it never run. Every handle of the
    /// transaction resolves to [`TransactionAborted`](super::QueueError::TransactionAborted).
    pub fn abort(&mut self) {
        if self.abort_at.is_none() {
            self.abort_at = Some(self.ops.len());
        }
    }

    /// Check if `abort()` has been called.
    pub fn is_aborted(&self) -> bool {
        self.abort_at.is_some()
    }

    /// Number of operations captured so far.
    pub fn len(&self) -> usize {
        self.ops.len()
    }

    /// Check if no operations have been captured.
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }
}
