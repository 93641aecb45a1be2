//!
//! Fieldbook: the offline data layer underneath a form-based data-collection application.
//! This library provides the components a form runtime needs to edit, persist and present records.
//!
//! ## Core Concepts
//!
//! * **Documents (`document::Document`)**: A change-tracking, annotatable view over nested plain data.
//!   Edits are compared against the value captured when the document was wrapped, so a form knows
//!   whether it has unsaved changes. Notes (validation errors, provenance) hang off any node.
//! * **Backends (`backend::BackendImpl`)**: A sorted, range-queryable key-value engine with atomic
//!   multi-table transactions. `InMemory` and `Sqlite` implementations are provided.
//! * **Queue (`queue::Queue`)**: Captures store operations into one atomic transaction per call and
//!   resolves each operation's result once the transaction commits.
//! * **Repository (`repository::Repository`)**: Records split into an index facet and a field blob
//!   that share a compound `table:id` key, plus per-table variable descriptors.
//! * **Column order (`order::order_variables`)**: Rebuilds the authoring order of variables from the
//!   neighbor hints saved alongside them.

pub mod backend;
pub mod clock;
pub mod constants;
pub mod document;
pub mod id;
pub mod order;
pub mod queue;
pub mod repository;

pub use clock::{Clock, SystemClock};
#[cfg(any(test, feature = "testing"))]
pub use clock::FixedClock;
pub use document::Document;
pub use id::RecordId;
pub use queue::Queue;
pub use repository::Repository;

/// Result type used throughout the Fieldbook library.
pub type Result<T> = std::result::Result<T, Error>;

/// Common error type for the Fieldbook library.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),

    /// Structured storage engine errors from the backend module
    #[error(transparent)]
    Backend(backend::BackendError),

    /// Structured document errors from the document module
    #[error(transparent)]
    Document(document::DocumentError),

    /// Structured transaction queue errors from the queue module
    #[error(transparent)]
    Queue(queue::QueueError),

    /// Structured record errors from the repository module
    #[error(transparent)]
    Repository(repository::RepositoryError),
}

impl Error {
    /// Get the originating module for this error.
    pub fn module(&self) -> &'static str {
        match self {
            Error::Backend(_) => "backend",
            Error::Document(_) => "document",
            Error::Queue(_) => "queue",
            Error::Repository(_) => "repository",
            Error::Io(_) => "io",
            Error::Serialize(_) => "serialize",
        }
    }

    /// Check if this error was raised for a node the document does not manage.
    pub fn is_unmanaged_node(&self) -> bool {
        match self {
            Error::Document(doc_err) => doc_err.is_unmanaged_node(),
            _ => false,
        }
    }

    /// Check if this error indicates the store could not be opened.
    pub fn is_store_unavailable(&self) -> bool {
        match self {
            Error::Queue(queue_err) => queue_err.is_store_unavailable(),
            _ => false,
        }
    }

    /// Check if this error indicates the surrounding transaction was aborted.
    pub fn is_transaction_aborted(&self) -> bool {
        match self {
            Error::Queue(queue_err) => queue_err.is_aborted(),
            _ => false,
        }
    }

    /// Check if this error is storage-engine related.
    pub fn is_backend_error(&self) -> bool {
        matches!(self, Error::Backend(_))
    }

    /// Check if this error is a caller mistake rather than a runtime failure.
    pub fn is_validation_error(&self) -> bool {
        match self {
            Error::Document(doc_err) => doc_err.is_usage_error(),
            Error::Repository(repo_err) => repo_err.is_validation_error(),
            Error::Backend(backend_err) => backend_err.is_scope_error(),
            _ => false,
        }
    }

    /// Check if this error is related to (de)serialization of stored values.
    pub fn is_serialization_error(&self) -> bool {
        match self {
            Error::Serialize(_) => true,
            Error::Backend(backend_err) => backend_err.is_serialization_error(),
            _ => false,
        }
    }

    /// Check if this error is I/O related.
    pub fn is_io_error(&self) -> bool {
        match self {
            Error::Io(_) => true,
            Error::Backend(backend_err) => backend_err.is_io_error(),
            _ => false,
        }
    }
}
