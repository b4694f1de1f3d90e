//! # Domain Errors
//!
//! Errors surfaced by the JSON-RPC transport. All of them are transient
//! from the caller's point of view: the polling loop retries on the next
//! tick.

use thiserror::Error;

/// Chain RPC error types.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RpcError {
    /// No endpoint URL configured.
    #[error("missing JSON-RPC endpoint URL")]
    MissingEndpoint,

    /// HTTP-level failure (connect, timeout, TLS).
    #[error("transport error: {0}")]
    Transport(String),

    /// Node answered with an error object.
    #[error("rpc error {code}: {message}")]
    Rpc {
        /// JSON-RPC error code
        code: i64,
        /// Node supplied message
        message: String,
    },

    /// Node answered without a result.
    #[error("rpc empty result for {method}")]
    EmptyResult {
        /// Method that was called
        method: String,
    },

    /// Response body did not match the expected shape.
    #[error("invalid rpc response: {0}")]
    Decode(String),

    /// A hex quantity inside a log could not be parsed.
    #[error("invalid {field} in log: {value:?}")]
    InvalidQuantity {
        /// Field name (`blockNumber`, `logIndex`)
        field: &'static str,
        /// Raw value
        value: String,
    },
}
