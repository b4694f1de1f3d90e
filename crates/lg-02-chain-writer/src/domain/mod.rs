//! # Domain Module
//!
//! Writer configuration and errors.

pub mod config;
pub mod errors;

pub use config::*;
pub use errors::*;
