//! # Ports Module
//!
//! Storage ports the worker and domain callers depend on.

pub mod outbound;

pub use outbound::*;
