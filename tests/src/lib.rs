//! # LoanGraph Chain Bridge Test Suite
//!
//! Cross-crate flows over the in-memory ledger.
//!
//! ```text
//! tests/src/
//! └── integration/
//!     ├── fixtures.rs       # clock, loan ids, log builders
//!     ├── outbox_flow.rs    # enqueue -> worker -> writer -> loan
//!     ├── indexer_flow.rs   # logs -> ingestion -> projector -> passport
//!     └── runtime_flow.rs   # config-built container against a JSON-RPC stub
//! ```
//!
//! ## Running Tests
//!
//! ```bash
//! cargo test -p lg-tests
//! cargo test -p lg-tests integration::indexer_flow::
//! ```

pub mod integration;
