//! # Domain Module
//!
//! Topic hashes, ABI word decoding and log-to-event decoding.

pub mod abi;
pub mod decoder;
pub mod errors;
pub mod topics;

pub use abi::{normalize_bytes32, project_loan_id, AbiData};
pub use decoder::decode_log;
pub use errors::*;
pub use topics::{event_topic, EventTopics};
