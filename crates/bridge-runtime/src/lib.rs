//! # Bridge Runtime
//!
//! Wires the LoanGraph chain bridge together and runs it.
//!
//! **Architecture:** one shared ledger, three independent polling loops
//!
//! | Loop | Component | Interval |
//! |------|-----------|----------|
//! | worker | LG-03 Outbox Worker | `LG_WORKER_POLL_INTERVAL_MS` |
//! | ingestion | LG-04 Ingestion Service (when enabled) | `LG_INDEXER_POLL_INTERVAL_MS` |
//! | projector | LG-05 Event Projector | `LG_INDEXER_POLL_INTERVAL_MS` |
//!
//! Every run is bounded by `LG_RUN_TIMEOUT_SECS`. A run cut off mid-job
//! leaves the job `processing` until its lease expires.

#![warn(clippy::all)]

pub mod container;
pub mod metrics_server;
pub mod runtime;
pub mod scheduler;

pub use container::{BridgeConfig, BridgeContainer, ConfigError};
pub use runtime::BridgeRuntime;
pub use scheduler::{run_tick, spawn_loop, Tick};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
