//! # Error Types
//!
//! Storage error reported by every persistence adapter.

use thiserror::Error;

/// Errors raised by the outbox, cursor, chain-event and projection stores.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// Backing database operation failed.
    #[error("Database error: {0}")]
    Database(String),

    /// A stored value could not be encoded or decoded.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Loan row does not exist.
    #[error("Loan not found: {loan_id}")]
    LoanNotFound { loan_id: String },

    /// Loan id already taken.
    #[error("Loan already exists: {loan_id}")]
    DuplicateLoan { loan_id: String },

    /// Outbox job does not exist.
    #[error("Outbox job not found: {job_id}")]
    JobNotFound { job_id: u64 },

    /// Outbox job is not in the state the operation requires.
    #[error("Invalid job transition for {job_id}: {from} -> {to}")]
    InvalidTransition {
        job_id: u64,
        from: String,
        to: String,
    },

    /// Chain event does not exist.
    #[error("Chain event not found: {event_id}")]
    EventNotFound { event_id: u64 },

    /// Attempted to move an ingestion cursor backwards.
    #[error("Cursor regression for {key}: stored {stored}, attempted {attempted}")]
    CursorRegression {
        key: String,
        stored: u64,
        attempted: u64,
    },
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Serialization(err.to_string())
    }
}
