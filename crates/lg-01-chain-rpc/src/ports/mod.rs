//! # Ports Module
//!
//! Outbound port consumed by the ingestion service.

pub mod outbound;

pub use outbound::*;
