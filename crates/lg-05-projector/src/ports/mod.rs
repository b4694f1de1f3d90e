//! # Ports Module
//!
//! - `inbound`: read model served to callers
//! - `outbound`: event and projection persistence

pub mod inbound;
pub mod outbound;

pub use inbound::*;
pub use outbound::*;
