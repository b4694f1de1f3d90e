//! # Domain Errors

use lg_shared_types::StoreError;
use thiserror::Error;

/// Projection failure. Stops the pass; the event stays unprocessed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProjectionError {
    /// Stored payload is unusable.
    #[error("invalid {event} payload in event {event_id}: {reason}")]
    InvalidPayload {
        event_id: u64,
        event: &'static str,
        reason: String,
    },

    #[error(transparent)]
    Store(#[from] StoreError),
}
