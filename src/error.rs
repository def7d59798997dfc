//! Error types for the guard
//!
//! - `StoreError`: the backing store could not answer
//! - `GuardError`: outcome of a uniqueness check that did not pass
//! - `EventError`: a host event could not be turned into a candidate

use crate::key::RecordId;

/// Message shown to the user when a duplicate is rejected
pub const DUPLICATE_RECORD_MESSAGE: &str = "A record with the same source property, \
    source system, source legal and source account number already exists.";

/// Failure reported by a `RecordStore`
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Query could not be executed
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// SQLite driver error
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// A stored row could not be decoded
    #[error("corrupt row: {0}")]
    Corrupt(String),
}

/// Outcome of a uniqueness check that did not pass
#[derive(Debug, thiserror::Error)]
pub enum GuardError {
    /// Business-rule violation, surfaced verbatim
    #[error("{message}")]
    DuplicateRecord { existing: RecordId, message: String },

    /// Infrastructure failure, not retried
    #[error(transparent)]
    StoreUnavailable(#[from] StoreError),

    /// Field completion targeted a record that no longer exists
    #[error("record not found: {0}")]
    RecordNotFound(RecordId),
}

impl GuardError {
    #[must_use]
    pub fn is_duplicate(&self) -> bool {
        matches!(self, GuardError::DuplicateRecord { .. })
    }
}

/// A host event could not be mapped onto a candidate
#[derive(Debug, thiserror::Error)]
pub enum EventError {
    #[error("unsupported message: {0}")]
    UnsupportedMessage(String),

    #[error("update event is missing the record identity")]
    MissingIdentity,

    #[error("invalid value for attribute {attribute}: {reason}")]
    InvalidAttribute { attribute: String, reason: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duplicate_displays_fixed_message() {
        let err = GuardError::DuplicateRecord {
            existing: RecordId::new(),
            message: DUPLICATE_RECORD_MESSAGE.to_string(),
        };
        assert_eq!(err.to_string(), DUPLICATE_RECORD_MESSAGE);
        assert!(err.is_duplicate());
    }

    #[test]
    fn test_store_error_is_transparent() {
        let err: GuardError = StoreError::Unavailable("connection refused".to_string()).into();
        assert_eq!(err.to_string(), "store unavailable: connection refused");
        assert!(!err.is_duplicate());
    }
}
