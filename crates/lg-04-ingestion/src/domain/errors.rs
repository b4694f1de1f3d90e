//! # Domain Errors

use lg_01_chain_rpc::RpcError;
use lg_shared_types::StoreError;
use thiserror::Error;

/// A recognized log that cannot be stored. Fails the pass without moving
/// the cursor.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("{event} missing indexed topics (got {got})")]
    MissingIndexedTopics { event: &'static str, got: usize },

    #[error("{event} payload encoding failed: {reason}")]
    Encode { event: &'static str, reason: String },
}

/// Ingestion pass failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IngestionError {
    #[error(transparent)]
    Rpc(#[from] RpcError),

    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error(transparent)]
    Store(#[from] StoreError),
}
