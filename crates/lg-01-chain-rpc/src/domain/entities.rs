//! # Log Types
//!
//! `eth_getLogs` filter and the parsed log entries returned by the node.

use super::errors::RpcError;
use lg_shared_types::{parse_hex_u64, to_hex_quantity};
use serde::Deserialize;
use serde_json::{json, Value};

/// Block range + address + topic filter for `eth_getLogs`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogFilter {
    /// Inclusive lower bound.
    pub from_block: u64,
    /// Inclusive upper bound.
    pub to_block: u64,
    /// Emitting contract.
    pub address: String,
    /// Accepted values for topic position 0 (OR-ed).
    pub topics: Vec<String>,
}

impl LogFilter {
    /// JSON-RPC params object.
    pub fn to_params(&self) -> Value {
        json!({
            "fromBlock": to_hex_quantity(self.from_block),
            "toBlock": to_hex_quantity(self.to_block),
            "address": self.address,
            "topics": [self.topics],
        })
    }

    /// Whether a block falls inside the range.
    pub fn covers(&self, block_number: u64) -> bool {
        (self.from_block..=self.to_block).contains(&block_number)
    }
}

/// A log as reported by the node, quantities already decoded.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LogEntry {
    pub address: String,
    pub topics: Vec<String>,
    pub data: String,
    pub block_number: u64,
    pub transaction_hash: String,
    pub log_index: u64,
    /// Set by the node when the log was dropped by a reorg.
    pub removed: bool,
}

/// Wire shape of a log inside the `eth_getLogs` result.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RawLog {
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub topics: Vec<String>,
    #[serde(default)]
    pub data: String,
    #[serde(default)]
    pub block_number: Option<String>,
    #[serde(default)]
    pub transaction_hash: String,
    #[serde(default)]
    pub log_index: Option<String>,
    #[serde(default)]
    pub removed: bool,
}

impl TryFrom<RawLog> for LogEntry {
    type Error = RpcError;

    fn try_from(raw: RawLog) -> Result<Self, Self::Error> {
        let block_number = parse_quantity("blockNumber", raw.block_number)?;
        let log_index = parse_quantity("logIndex", raw.log_index)?;
        Ok(Self {
            address: raw.address,
            topics: raw.topics,
            data: raw.data,
            block_number,
            transaction_hash: raw.transaction_hash,
            log_index,
            removed: raw.removed,
        })
    }
}

fn parse_quantity(field: &'static str, value: Option<String>) -> Result<u64, RpcError> {
    let value = value.unwrap_or_default();
    parse_hex_u64(&value).map_err(|_| RpcError::InvalidQuantity { field, value })
}
