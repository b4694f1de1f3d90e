//! # JSON-RPC Log Client
//!
//! [`LogRpcClient`] over [`JsonRpcTransport`].

use super::transport::JsonRpcTransport;
use crate::domain::{entities::RawLog, LogEntry, LogFilter, RpcError};
use crate::ports::LogRpcClient;
use async_trait::async_trait;
use lg_shared_types::parse_hex_u64;
use serde_json::json;
use std::sync::Arc;
use tracing::debug;

/// Reads block numbers and logs from a JSON-RPC node.
pub struct JsonRpcLogClient {
    transport: Arc<JsonRpcTransport>,
}

impl JsonRpcLogClient {
    /// Client over a shared transport.
    pub fn new(transport: Arc<JsonRpcTransport>) -> Self {
        Self { transport }
    }

    /// Convenience constructor from an endpoint URL.
    pub fn connect(url: impl Into<String>) -> Result<Self, RpcError> {
        Ok(Self::new(Arc::new(JsonRpcTransport::new(url)?)))
    }
}

#[async_trait]
impl LogRpcClient for JsonRpcLogClient {
    async fn block_number(&self) -> Result<u64, RpcError> {
        let raw: String = self.transport.call("eth_blockNumber", json!([])).await?;
        parse_hex_u64(&raw).map_err(|_| RpcError::InvalidQuantity {
            field: "blockNumber",
            value: raw,
        })
    }

    async fn get_logs(&self, filter: &LogFilter) -> Result<Vec<LogEntry>, RpcError> {
        let raw: Vec<RawLog> = self
            .transport
            .call("eth_getLogs", json!([filter.to_params()]))
            .await?;
        debug!(
            "[lg-01] eth_getLogs [{}, {}] returned {} logs",
            filter.from_block,
            filter.to_block,
            raw.len()
        );
        raw.into_iter().map(LogEntry::try_from).collect()
    }
}
