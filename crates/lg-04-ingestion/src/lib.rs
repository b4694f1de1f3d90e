//! # LG-04 Ingestion
//!
//! Pulls loan registry logs from the chain in bounded block ranges, behind
//! a confirmation lag, and stores them as deduplicated chain events.
//!
//! **Subsystem ID:** 04
//! **Architecture:** Hexagonal (DDD + Ports/Adapters)
//!
//! ## One pass
//!
//! ```text
//! latest ── eth_blockNumber
//! safe_head = latest - confirmations
//! from = cursor + 1 (or start_block)
//! to   = min(safe_head, from + block_batch - 1)
//! eth_getLogs [from, to] ── decode ── insert_chain_event (dedup)
//! cursor = to
//! ```
//!
//! Any failure leaves the cursor where it was, so the range is scanned
//! again on the next pass. Re-inserted events are absorbed by the store's
//! `(contract, tx_hash, log_index)` uniqueness.

#![warn(clippy::all)]

pub mod domain;
pub mod ports;
pub mod service;

// Re-exports
pub use domain::{decode_log, event_topic, DecodeError, EventTopics, IngestionError};
pub use ports::{IngestionStore, MockIngestionStore};
pub use service::{
    IngestionConfig, IngestionOutcome, IngestionReport, IngestionService, DEFAULT_BLOCK_BATCH,
    DEFAULT_CURSOR_KEY,
};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
