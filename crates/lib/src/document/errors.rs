//! Document error types
//!
//! Errors raised while reading, editing or annotating a [`Document`](super::Document).

use thiserror::Error;

/// Errors that can occur when working with a document.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum DocumentError {
    /// The node handle does not belong to this document.
    #[error("Node {node} is not managed by this document")]
    UnmanagedNode {
        /// Debug rendering of the foreign handle
        node: String,
    },

    /// Only objects and arrays can be wrapped or navigated into.
    #[error("Expected an object or array, found {found}")]
    NotAContainer {
        /// The JSON kind that was found instead
        found: &'static str,
    },

    /// The key cannot address a slot of this container.
    #[error("Invalid key '{key}': {reason}")]
    InvalidKey {
        /// The rejected key
        key: String,
        /// Why the key was rejected
        reason: String,
    },

    /// The operation needs a different kind of container.
    #[error("Expected {expected}, found {found}")]
    WrongContainer {
        /// The container kind the operation needs
        expected: &'static str,
        /// The container kind the node actually is
        found: &'static str,
    },
}

impl DocumentError {
    /// Check if this error was raised for a node the document does not manage.
    pub fn is_unmanaged_node(&self) -> bool {
        matches!(self, DocumentError::UnmanagedNode { .. })
    }

    /// Check if this error is a caller mistake (every current variant is).
    pub fn is_usage_error(&self) -> bool {
        matches!(
            self,
            DocumentError::UnmanagedNode { .. }
                | DocumentError::NotAContainer { .. }
                | DocumentError::InvalidKey { .. }
                | DocumentError::WrongContainer { .. }
        )
    }
}

impl From<DocumentError> for crate::Error {
    fn from(err: DocumentError) -> Self {
        crate::Error::Document(err)
    }
}
