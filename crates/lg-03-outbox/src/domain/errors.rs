//! # Domain Errors

use lg_02_chain_writer::WriterError;
use lg_shared_types::StoreError;
use thiserror::Error;

/// Failure of a single job. The Display text is what gets recorded as the
/// job's `last_error`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum JobError {
    /// Payload is not the JSON object the topic expects.
    #[error("invalid_payload")]
    InvalidPayload,

    #[error("missing_loan_id")]
    MissingLoanId,

    /// No handler for the topic.
    #[error("unsupported_topic")]
    UnsupportedTopic,

    #[error("{0}")]
    Writer(#[from] WriterError),

    /// The submission could not be recorded on the loan.
    #[error("{0}")]
    Persistence(StoreError),
}

/// Run-level failure. Aborts the current pass; the loop retries next tick.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OutboxError {
    #[error("outbox store error: {0}")]
    Store(#[from] StoreError),
}
