//! Transaction queue errors
//!
//! Failures of the queue itself, as opposed to failures of the storage engine
//! underneath it, which surface as `BackendError`.

use thiserror::Error;

/// Errors raised by the transaction queue.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum QueueError {
    /// The store could not be opened. Every operation fails with this until the
    /// queue is reopened.
    #[error("Record store unavailable: {reason}")]
    StoreUnavailable {
        /// Why opening the store failed
        reason: String,
    },

    /// The transaction this operation belonged to was rolled back, either
    /// explicitly or because another operation in it failed.
    #[error("Transaction aborted")]
    TransactionAborted,

    /// An operation produced a result of the wrong shape for its handle.
    #[error("Operation {operation} produced an unexpected result")]
    UnexpectedOutput {
        /// The operation whose result could not be decoded
        operation: &'static str,
    },
}

impl QueueError {
    /// Check if this error indicates the store could not be opened.
    pub fn is_store_unavailable(&self) -> bool {
        matches!(self, QueueError::StoreUnavailable { .. })
    }

    /// Check if this error indicates the surrounding transaction was rolled back.
    pub fn is_aborted(&self) -> bool {
        matches!(self, QueueError::TransactionAborted)
    }
}

impl From<QueueError> for crate::Error {
    fn from(err: QueueError) -> Self {
        crate::Error::Queue(err)
    }
}
