//! # LG-05 Event Projector
//!
//! Applies stored chain events, in id order, to the off-chain loan records
//! and the per-borrower credit passport cache.
//!
//! **Subsystem ID:** 05
//! **Architecture:** Hexagonal (DDD + Ports/Adapters)
//!
//! | Event | Effect |
//! |-------|--------|
//! | `LoanRegistered` | `on_chain_tx = tx_hash`, `on_chain_confirmed = true` |
//! | `RepaymentRecorded` | `amount_repaid += amount`, `Repaid` once covered (never out of `Defaulted`), passport refresh |
//! | `LoanDefaulted` | `Defaulted` from `Active` only, passport refresh |
//! | anything else | ignored, marked processed |
//!
//! An event is marked processed only after its effect has been applied.
//! The first failure stops the pass; the event is retried next pass.

#![warn(clippy::all)]

pub mod domain;
pub mod ports;
pub mod service;

// Re-exports
pub use domain::ProjectionError;
pub use ports::{ChainEventStore, LoanReadModel, MockProjectionStore, ProjectionStore};
pub use service::{EventProjector, ProjectionReport, DEFAULT_BATCH_SIZE};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
