//! # LG-02 Chain Writer
//!
//! Submits loan registry actions to the chain and returns a transaction
//! hash.
//!
//! **Subsystem ID:** 02
//! **Architecture:** Hexagonal (DDD + Ports/Adapters)
//!
//! ## Modes
//!
//! | Mode | Adapter | Behavior |
//! |------|---------|----------|
//! | `stub` (default, also `""`) | [`StubWriter`] | Synthesized hashes, no network |
//! | `real` | [`RpcWriter`] | `eth_sendTransaction` against the configured node |
//!
//! The mode is resolved once by [`ChainWriter::from_config`]; unknown modes
//! fail at construction time.
//!
//! ## Transaction data
//!
//! `RpcWriter` sends `data = 0x || hex(json{"action", "payload"})` to the
//! registry contract with `value = 0x0`.

#![warn(clippy::all)]

pub mod adapters;
pub mod domain;
pub mod ports;

// Re-exports
pub use adapters::{ChainWriter, RpcWriter, StubWriter};
pub use domain::{WriterConfig, WriterError, WriterMode, DEFAULT_GAS_LIMIT};
pub use ports::{LoanRegistryWriter, MockRegistryWriter, WriterCall};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
