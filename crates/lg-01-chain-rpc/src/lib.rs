//! # LG-01 Chain RPC Client
//!
//! Thin JSON-RPC transport to an Ethereum-style node.
//!
//! **Subsystem ID:** 01
//! **Architecture:** Hexagonal (DDD + Ports/Adapters)
//!
//! ## Methods consumed
//!
//! | Method | Used by |
//! |--------|---------|
//! | `eth_blockNumber` | Ingestion (safe head) |
//! | `eth_getLogs` | Ingestion (range scan) |
//! | `eth_sendTransaction` | Chain Writer (via [`JsonRpcTransport`]) |
//!
//! Every call uses the `{jsonrpc:"2.0", id, method, params}` envelope. A
//! response carrying an `error` object, or no `result`, is a hard failure.
//!
//! ## Module Structure
//!
//! ```text
//! lg-01-chain-rpc/
//! ├── domain/     # LogFilter, LogEntry, RpcError
//! ├── ports/      # LogRpcClient, MockLogRpc
//! └── adapters/   # JsonRpcTransport, JsonRpcLogClient
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod adapters;
pub mod domain;
pub mod ports;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

// Re-exports
pub use adapters::{JsonRpcLogClient, JsonRpcTransport};
pub use domain::{LogEntry, LogFilter, RpcError};
pub use ports::{LogRpcClient, MockLogRpc};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
