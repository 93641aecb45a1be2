//! Captured store operations and their raw results.

use tokio::sync::oneshot;

use crate::Result;
use crate::backend::{BackendTransaction, KeyRange};

/// Read-modify-write step run against the raw stored value.
///
/// `None` in means the key is absent; `None` out deletes it.
pub(crate) type UpdateFn = Box<dyn FnOnce(Option<String>) -> Result<Option<String>> + Send>;

/// What an operation asks the store to do.
pub(crate) enum OpKind {
    Put {
        table: String,
        key: String,
        value: String,
    },
    PutAll {
        table: String,
        entries: Vec<(String, String)>,
    },
    Get {
        table: String,
        key: String,
    },
    Range {
        table: String,
        range: KeyRange,
    },
    Keys {
        table: String,
        range: KeyRange,
    },
    Delete {
        table: String,
        key: String,
    },
    DeleteRange {
        table: String,
        range: KeyRange,
    },
    Update {
        table: String,
        key: String,
        apply: UpdateFn,
    },
    /// An operation that failed while it was being captured, e.g. a value that
    /// could not be serialized. Replaying it fails the transaction.
    Rejected {
        table: String,
        error: crate::Error,
    },
}

/// Raw result of one operation, before the caller's handle decodes it.
#[derive(Debug)]
pub(crate) enum Output {
    Done,
    Value(Option<String>),
    Entries(Vec<(String, String)>),
    Keys(Vec<String>),
}

pub(crate) struct Op {
    pub(crate) kind: OpKind,
    pub(crate) reply: oneshot::Sender<Result<Output>>,
}

impl OpKind {
    pub(crate) fn table(&self) -> &str {
        match self {
            OpKind::Put { table, .. }
            | OpKind::PutAll { table, .. }
            | OpKind::Get { table, .. }
            | OpKind::Range { table, .. }
            | OpKind::Keys { table, .. }
            | OpKind::Delete { table, .. }
            | OpKind::DeleteRange { table, .. }
            | OpKind::Update { table, .. }
            | OpKind::Rejected { table, .. } => table,
        }
    }

    pub(crate) fn writes(&self) -> bool {
        !matches!(
            self,
            OpKind::Get { .. } | OpKind::Range { .. } | OpKind::Keys { .. }
        )
    }

    pub(crate) fn name(&self) -> &'static str {
        match self {
            OpKind::Put { .. } => "put",
            OpKind::PutAll { .. } => "put_all",
            OpKind::Get { .. } => "get",
            OpKind::Range { .. } => "range",
            OpKind::Keys { .. } => "keys",
            OpKind::Delete { .. } => "delete",
            OpKind::DeleteRange { .. } => "delete_range",
            OpKind::Update { .. } => "update",
            OpKind::Rejected { .. } => "rejected",
        }
    }

    /// Run this operation inside an open transaction.
    pub(crate) async fn apply(self, txn: &mut dyn BackendTransaction) -> Result<Output> {
        match self {
            OpKind::Put { table, key, value } => {
                txn.put(&table, &key, value).await?;
                Ok(Output::Done)
            }
            OpKind::PutAll { table, entries } => {
                for (key, value) in entries {
                    txn.put(&table, &key, value).await?;
                }
                Ok(Output::Done)
            }
            OpKind::Get { table, key } => Ok(Output::Value(txn.get(&table, &key).await?)),
            OpKind::Range { table, range } => Ok(Output::Entries(txn.range(&table, &range).await?)),
            OpKind::Keys { table, range } => Ok(Output::Keys(txn.keys(&table, &range).await?)),
            OpKind::Delete { table, key } => {
                txn.delete(&table, &key).await?;
                Ok(Output::Done)
            }
            OpKind::DeleteRange { table, range } => {
                txn.delete_range(&table, &range).await?;
                Ok(Output::Done)
            }
            OpKind::Update { table, key, apply } => {
                let current = txn.get(&table, &key).await?;
                let next = apply(current)?;
                match &next {
                    Some(value) => txn.put(&table, &key, value.clone()).await?,
                    None => txn.delete(&table, &key).await?,
                }
                Ok(Output::Value(next))
            }
            OpKind::Rejected { error, .. } => Err(error),
        }
    }
}
