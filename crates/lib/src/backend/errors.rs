//! Storage engine error types for the Fieldbook backend.
//!
//! This module defines structured error types for key-value store operations,
//! providing better error context and type safety compared to string-based errors.

use thiserror::Error;

/// Errors that can occur inside a storage engine.
///
/// # Stability
///
/// - New variants may be added in minor versions (enum is `#[non_exhaustive]`)
/// - Existing variants will not be removed in minor versions
/// - Field additions/changes require a major version bump
/// - Helper methods like `is_*()` provide stable APIs
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum BackendError {
    /// A transaction touched a table it did not declare when it was opened.
    #[error("Table '{table}' is not part of this transaction's scope")]
    TableNotInScope {
        /// The undeclared table
        table: String,
    },

    /// A write was attempted inside a read-only transaction.
    #[error("Cannot {operation} on table '{table}' in a read-only transaction")]
    ReadOnlyTransaction {
        /// The rejected operation
        operation: &'static str,
        /// The table that was written to
        table: String,
    },

    /// Serialization failed.
    #[error("Serialization failed")]
    SerializationFailed {
        /// The underlying serialization error
        #[source]
        source: serde_json::Error,
    },

    /// Deserialization failed.
    #[error("Deserialization failed")]
    DeserializationFailed {
        /// The underlying deserialization error
        #[source]
        source: serde_json::Error,
    },

    /// File I/O error.
    #[error("File I/O error")]
    FileIo {
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// Error from the SQL engine.
    #[cfg(feature = "sqlite")]
    #[error("SQL error: {reason}")]
    SqlxError {
        /// What was being attempted, including the driver's message
        reason: String,
        /// The underlying sqlx error, when there is one
        #[source]
        source: Option<sqlx::Error>,
    },
}

impl BackendError {
    /// Check if this error was caused by touching a table or mode the transaction
    /// was not opened for.
    pub fn is_scope_error(&self) -> bool {
        matches!(
            self,
            BackendError::TableNotInScope { .. } | BackendError::ReadOnlyTransaction { .. }
        )
    }

    /// Check if this error is related to I/O operations.
    pub fn is_io_error(&self) -> bool {
        matches!(self, BackendError::FileIo { .. })
    }

    /// Check if this error is related to (de)serialization of the engine's state.
    pub fn is_serialization_error(&self) -> bool {
        matches!(
            self,
            BackendError::SerializationFailed { .. } | BackendError::DeserializationFailed { .. }
        )
    }

    /// Check if this error came from the SQL engine.
    pub fn is_sql_error(&self) -> bool {
        #[cfg(feature = "sqlite")]
        {
            matches!(self, BackendError::SqlxError { .. })
        }
        #[cfg(not(feature = "sqlite"))]
        {
            false
        }
    }

    /// Get the table name if this error is about a specific table.
    pub fn table(&self) -> Option<&str> {
        match self {
            BackendError::TableNotInScope { table }
            | BackendError::ReadOnlyTransaction { table, .. } => Some(table),
            _ => None,
        }
    }
}

// Conversion from BackendError to the main Error type
impl From<BackendError> for crate::Error {
    fn from(err: BackendError) -> Self {
        crate::Error::Backend(err)
    }
}
