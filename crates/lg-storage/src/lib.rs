//! # LG Storage
//!
//! Persistence adapters for every store port of the bridge.
//!
//! | Adapter | Backend | Notes |
//! |---------|---------|-------|
//! | [`MemoryLedger`] | `parking_lot::Mutex` over ordered maps | default, tests, single process |
//! | `RocksLedger` | RocksDB column families (feature `rocksdb`) | directory lock, `WriteBatch` per operation |
//!
//! Both adapters serialize every read-modify-write behind one lock, which
//! makes `claim_pending` atomic and keeps the outbox worker and the event
//! projector from overwriting each other's loan fields.

#![warn(clippy::all)]

pub mod lock;
pub mod memory;
#[cfg(feature = "rocksdb")]
pub mod rocks;

pub use lock::{DatabaseLock, LockError};
pub use memory::MemoryLedger;
#[cfg(feature = "rocksdb")]
pub use rocks::{RocksLedger, RocksLedgerConfig, COLUMN_FAMILIES};

use lg_03_outbox::{LoanIntake, LoanSubmissionStore, OutboxStore};
use lg_04_ingestion::IngestionStore;
use lg_05_projector::{ChainEventStore, LoanReadModel, ProjectionStore};

/// Every store port in one object, so the runtime can hold a single
/// `Arc<dyn Ledger>` and hand it to each service.
pub trait Ledger:
    OutboxStore
    + LoanSubmissionStore
    + LoanIntake
    + IngestionStore
    + ChainEventStore
    + ProjectionStore
    + LoanReadModel
{
}

impl<T> Ledger for T where
    T: OutboxStore
        + LoanSubmissionStore
        + LoanIntake
        + IngestionStore
        + ChainEventStore
        + ProjectionStore
        + LoanReadModel
        + ?Sized
{
}

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
