//! # Domain Module
//!
//! Log filter / log entry types and the RPC error taxonomy.

pub mod entities;
pub mod errors;

pub use entities::*;
pub use errors::*;
