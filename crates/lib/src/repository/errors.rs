//! Record repository errors

use thiserror::Error;

/// Errors raised by the record repository itself.
///
/// Store failures are not wrapped; they reach the caller as the queue or
/// backend error they started as.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// The table name cannot be used to build compound keys.
    #[error("Invalid table name '{table}': {reason}")]
    InvalidTable {
        /// The rejected table name
        table: String,
        /// Why it was rejected
        reason: &'static str,
    },

    /// The record id cannot be used to build compound keys.
    #[error("Invalid record id '{id}': {reason}")]
    InvalidId {
        /// The rejected id
        id: String,
        /// Why it was rejected
        reason: &'static str,
    },
}

impl RepositoryError {
    /// Check if this error is a caller mistake.
    pub fn is_validation_error(&self) -> bool {
        matches!(
            self,
            RepositoryError::InvalidTable { .. } | RepositoryError::InvalidId { .. }
        )
    }
}

impl From<RepositoryError> for crate::Error {
    fn from(err: RepositoryError) -> Self {
        crate::Error::Repository(err)
    }
}
