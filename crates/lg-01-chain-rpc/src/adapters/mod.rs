//! # Adapters
//!
//! HTTP JSON-RPC implementations of the chain RPC port.

pub mod log_client;
pub mod transport;

pub use log_client::JsonRpcLogClient;
pub use transport::JsonRpcTransport;
