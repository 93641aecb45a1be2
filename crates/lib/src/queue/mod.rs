//! Transaction queue over a storage backend.
//!
//! A [`Queue`] turns a synchronous transaction body into one atomic backend
//! transaction. The body records operations on a [`TxnScope`] and receives a
//! [`Pending`] handle for each. Once the body returns, the queue opens a backend
//! transaction over exactly the tables the operations name, replays them in
//! capture order, and commits. Each handle then resolves to its operation's
//! result.
//!
//! If the body calls [`TxnScope::abort`], or any operation fails, the backend
//! transaction is rolled back and every handle resolves to
//! [`QueueError::TransactionAborted`]. The call to [`Queue::transaction`] itself
//! reports the failure that caused the rollback.
//!
//! The backend is opened on first use. If opening fails, the failure is logged
//! once and every later operation fails with [`QueueError::StoreUnavailable`]
//! until [`Queue::reopen`] succeeds.
//!
//! ```
//! use fieldbook::backend::database::InMemory;
//! use fieldbook::queue::Queue;
//!
//! # #[tokio::main]
//! # async fn main() -> fieldbook::Result<()> {
//! let queue = Queue::with_backend(InMemory::new());
//! let (count, missing) = queue
//!     .transaction(|t| {
//!         let _ = t.save("counters", "visits", &1u32);
//!         (t.load::<u32>("counters", "visits"), t.load::<u32>("counters", "other"))
//!     })
//!     .await?;
//! assert_eq!(count.await?, Some(1));
//! assert_eq!(missing.await?, None);
//! # Ok(())
//! # }
//! ```

mod errors;
mod op;
mod pending;
mod scope;

use std::collections::BTreeSet;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

pub use errors::QueueError;
pub use pending::Pending;
pub use scope::TxnScope;

use crate::Result;
use crate::backend::{BackendImpl, KeyRange, TransactionMode};
use op::Op;

/// Opens the backend a [`Queue`] runs against.
///
/// Any `Fn() -> impl Future<Output = Result<Arc<dyn BackendImpl>>>` closure is
/// an opener.
#[async_trait]
pub trait BackendOpener: Send + Sync {
    /// Open (or connect to) the backend.
    async fn open(&self) -> Result<Arc<dyn BackendImpl>>;
}

#[async_trait]
impl<F, Fut> BackendOpener for F
where
    F: Fn() -> Fut + Send + Sync,
    Fut: Future<Output = Result<Arc<dyn BackendImpl>>> + Send,
{
    async fn open(&self) -> Result<Arc<dyn BackendImpl>> {
        (self)().await
    }
}

enum Connection {
    Closed,
    Open(Arc<dyn BackendImpl>),
    Broken(String),
}

struct QueueInner {
    opener: Box<dyn BackendOpener>,
    connection: Mutex<Connection>,
}

/// Serializes store access into atomic, multi-table transactions.
///
/// Cloning a `Queue` is cheap; clones share the same backend.
#[derive(Clone)]
pub struct Queue {
    inner: Arc<QueueInner>,
}

impl std::fmt::Debug for Queue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Queue").finish_non_exhaustive()
    }
}

impl Queue {
    /// Create a queue that opens its backend with `opener` on first use.
    pub fn new(opener: impl BackendOpener + 'static) -> Self {
        Self {
            inner: Arc::new(QueueInner {
                opener: Box::new(opener),
                connection: Mutex::new(Connection::Closed),
            }),
        }
    }

    /// Create a queue over a backend that is already open.
    pub fn with_backend(backend: impl BackendImpl) -> Self {
        let backend: Arc<dyn BackendImpl> = Arc::new(backend);
        Self::from_arc(backend)
    }

    /// Create a queue over a shared, already open backend.
    pub fn from_arc(backend: Arc<dyn BackendImpl>) -> Self {
        let reopen = backend.clone();
        Self {
            inner: Arc::new(QueueInner {
                opener: Box::new(move || {
                    let backend = reopen.clone();
                    async move { Ok::<_, crate::Error>(backend) }
                }),
                connection: Mutex::new(Connection::Open(backend)),
            }),
        }
    }

    /// Get the open backend, opening it on first use.
    pub async fn backend(&self) -> Result<Arc<dyn BackendImpl>> {
        self.connect()
            .await
            .map_err(|reason| QueueError::StoreUnavailable { reason }.into())
    }

    async fn connect(&self) -> std::result::Result<Arc<dyn BackendImpl>, String> {
        let mut connection = self.inner.connection.lock().await;
        match &*connection {
            Connection::Open(backend) => return Ok(backend.clone()),
            Connection::Broken(reason) => return Err(reason.clone()),
            Connection::Closed => {}
        }
        match self.inner.opener.open().await {
            Ok(backend) => {
                info!("Opened record store");
                *connection = Connection::Open(backend.clone());
                Ok(backend)
            }
            Err(e) => {
                let reason = e.to_string();
                error!(error = %reason, "Record store unavailable");
                *connection = Connection::Broken(reason.clone());
                Err(reason)
            }
        }
    }

    /// Try to open the backend again, replacing whatever is open or broken.
    pub async fn reopen(&self) -> Result<()> {
        let mut connection = self.inner.connection.lock().await;
        match self.inner.opener.open().await {
            Ok(backend) => {
                info!("Reopened record store");
                *connection = Connection::Open(backend);
                Ok(())
            }
            Err(e) => {
                let reason = e.to_string();
                warn!(error = %reason, "Record store still unavailable");
                *connection = Connection::Broken(reason.clone());
                Err(QueueError::StoreUnavailable { reason }.into())
            }
        }
    }

    /// Check if opening the backend has failed.
    pub async fn is_unavailable(&self) -> bool {
        matches!(*self.inner.connection.lock().await, Connection::Broken(_))
    }

    /// Run `body` as one atomic transaction.
    ///
    /// `body` records operations on the [`TxnScope`] it is given; its return value
    /// (typically one or more [`Pending`] handles) is handed back once the
    /// transaction has committed.
    pub async fn transaction<R, F>(&self, body: F) -> Result<R>
    where
        F: FnOnce(&mut TxnScope) -> R,
    {
        let mut scope = TxnScope::new();
        let result = body(&mut scope);
        self.execute(scope).await?;
        Ok(result)
    }

    async fn execute(&self, scope: TxnScope) -> Result<()> {
        let TxnScope { ops, abort_at } = scope;
        if ops.is_empty() {
            return match abort_at {
                Some(_) => Err(QueueError::TransactionAborted.into()),
                None => Ok(()),
            };
        }

        let backend = match self.connect().await {
            Ok(backend) => backend,
            Err(reason) => {
                reject(ops, || QueueError::StoreUnavailable {
                    reason: reason.clone(),
                });
                return Err(QueueError::StoreUnavailable { reason }.into());
            }
        };

        let tables: Vec<String> = ops
            .iter()
            .map(|op| op.kind.table().to_string())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let mode = if ops.iter().any(|op| op.kind.writes()) {
            TransactionMode::ReadWrite
        } else {
            TransactionMode::ReadOnly
        };
        debug!(?tables, ?mode, ops = ops.len(), "Running transaction");

        let mut txn = match backend.begin(&tables, mode).await {
            Ok(txn) => txn,
            Err(e) => {
                warn!(error = %e, "Failed to open transaction");
                reject(ops, || QueueError::TransactionAborted);
                return Err(e);
            }
        };

        let mut replies = Vec::with_capacity(ops.len());
        let mut outputs = Vec::with_capacity(ops.len());
        let mut failure = None;
        for (position, Op { kind, reply }) in ops.into_iter().enumerate() {
            replies.push(reply);
            if failure.is_some() || abort_at.is_some_and(|at| position >= at) {
                continue;
            }
            let name = kind.name();
            match kind.apply(txn.as_mut()).await {
                Ok(output) => outputs.push(output),
                Err(e) => {
                    warn!(operation = name, position, error = %e, "Operation failed, aborting transaction");
                    failure = Some(e);
                }
            }
        }

        if failure.is_none() && abort_at.is_none() {
            return match txn.commit().await {
                Ok(()) => {
                    for (reply, output) in replies.into_iter().zip(outputs) {
                        // The caller may have dropped the handle; that is fine.
                        let _ = reply.send(Ok(output));
                    }
                    Ok(())
                }
                Err(e) => {
                    warn!(error = %e, "Commit failed");
                    reject_replies(replies);
                    Err(e)
                }
            };
        }

        if let Err(e) = txn.rollback().await {
            warn!(error = %e, "Rollback failed");
        }
        reject_replies(replies);
        match failure {
            Some(e) => Err(e),
            None => {
                debug!("Transaction aborted by caller");
                Err(QueueError::TransactionAborted.into())
            }
        }
    }

    /// Store `value` under `key` in its own transaction.
    pub async fn save<V: Serialize + ?Sized>(&self, table: &str, key: &str, value: &V) -> Result<()> {
        self.transaction(|t| t.save(table, key, value)).await?.await
    }

    /// Store several `(key, value)` pairs in one transaction.
    pub async fn save_all<K, V, I>(&self, table: &str, entries: I) -> Result<()>
    where
        K: Into<String>,
        V: Serialize,
        I: IntoIterator<Item = (K, V)>,
    {
        self.transaction(|t| t.save_all(table, entries)).await?.await
    }

    /// Read the value under `key` in its own transaction.
    pub async fn load<V: DeserializeOwned>(&self, table: &str, key: &str) -> Result<Option<V>> {
        self.transaction(|t| t.load(table, key)).await?.await
    }

    /// Read every pair inside `range` in its own transaction.
    pub async fn load_all<V: DeserializeOwned>(
        &self,
        table: &str,
        range: KeyRange,
    ) -> Result<Vec<(String, V)>> {
        self.transaction(|t| t.load_all(table, range)).await?.await
    }

    /// List every key inside `range` in its own transaction.
    pub async fn list(&self, table: &str, range: KeyRange) -> Result<Vec<String>> {
        self.transaction(|t| t.list(table, range)).await?.await
    }

    /// Remove `key` in its own transaction.
    pub async fn delete(&self, table: &str, key: &str) -> Result<()> {
        self.transaction(|t| t.delete(table, key)).await?.await
    }

    /// Remove every key inside `range` in its own transaction.
    pub async fn delete_all(&self, table: &str, range: KeyRange) -> Result<()> {
        self.transaction(|t| t.delete_all(table, range)).await?.await
    }

    /// Remove every key of `table` in its own transaction.
    pub async fn clear(&self, table: &str) -> Result<()> {
        self.transaction(|t| t.clear(table)).await?.await
    }
}

fn reject(ops: Vec<Op>, error: impl Fn() -> QueueError) {
    for op in ops {
        let _ = op.reply.send(Err(error().into()));
    }
}

fn reject_replies(replies: Vec<tokio::sync::oneshot::Sender<Result<op::Output>>>) {
    for reply in replies {
        let _ = reply.send(Err(QueueError::TransactionAborted.into()));
    }
}
