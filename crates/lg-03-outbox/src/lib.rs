//! # LG-03 Outbox
//!
//! Transactional outbox: domain operations enqueue jobs in the same unit of
//! work as their state change, and the [`OutboxWorker`] turns them into
//! at-least-once chain submissions.
//!
//! **Subsystem ID:** 03
//! **Architecture:** Hexagonal (DDD + Ports/Adapters)
//!
//! ## Job lifecycle
//!
//! ```text
//!            claim (attempts += 1)
//!  Pending ─────────────────────────▶ Processing ──ok──▶ Done
//!     ▲  ▲                                │
//!     │  └──── retry (now + backoff) ◀────┤ attempts < max
//!     │  └──── lease expired ◀────────────┤ claimed_at too old
//!     │                                   └── attempts >= max ──▶ Failed
//!     └────────────────── requeue (operator) ◀──────────────────────┘
//! ```
//!
//! ## Topics
//!
//! | Topic | Payload | Handled |
//! |-------|---------|---------|
//! | `register_loan` | `{"loan_id"}` | yes |
//! | `record_repayment` | `{"loan_id","amount_minor","currency"}` | reserved, `unsupported_topic` |
//! | `mark_default` | `{"loan_id","reason","lender_id"}` | reserved, `unsupported_topic` |

#![warn(clippy::all)]

pub mod domain;
pub mod ports;
pub mod service;

// Re-exports
pub use domain::*;
pub use ports::{LoanIntake, LoanSubmissionStore, MockOutboxStore, OutboxStore};
pub use service::{OutboxWorker, WorkerConfig, WorkerRunReport, DEFAULT_BATCH_SIZE};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
