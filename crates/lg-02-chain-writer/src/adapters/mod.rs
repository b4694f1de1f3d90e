//! # Adapters
//!
//! Writer implementations and the config-time selector.

pub mod chain_writer;
pub mod rpc;
pub mod stub;

pub use chain_writer::ChainWriter;
pub use rpc::RpcWriter;
pub use stub::StubWriter;
