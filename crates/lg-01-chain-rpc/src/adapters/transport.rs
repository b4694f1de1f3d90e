//! # JSON-RPC Transport
//!
//! HTTP POST of `{jsonrpc, id, method, params}` envelopes.

use crate::domain::RpcError;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::debug;

/// Per-request HTTP timeout.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(20);

#[derive(Serialize)]
struct JsonRpcRequest<'a> {
    jsonrpc: &'static str,
    id: u64,
    method: &'a str,
    params: Value,
}

#[derive(Deserialize)]
struct JsonRpcResponse {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<JsonRpcErrorObject>,
}

#[derive(Deserialize)]
struct JsonRpcErrorObject {
    code: i64,
    #[serde(default)]
    message: String,
}

/// Shared JSON-RPC client used by the log reader and the chain writer.
pub struct JsonRpcTransport {
    url: String,
    client: reqwest::Client,
    next_id: AtomicU64,
}

impl JsonRpcTransport {
    /// Create a transport for `url`.
    pub fn new(url: impl Into<String>) -> Result<Self, RpcError> {
        let url = url.into().trim().to_string();
        if url.is_empty() {
            return Err(RpcError::MissingEndpoint);
        }
        let client = reqwest::Client::builder()
            .timeout(DEFAULT_REQUEST_TIMEOUT)
            .build()
            .map_err(|e| RpcError::Transport(e.to_string()))?;
        Ok(Self {
            url,
            client,
            next_id: AtomicU64::new(1),
        })
    }

    /// Endpoint URL.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Invoke `method` and decode its `result`.
    pub async fn call<R: DeserializeOwned>(
        &self,
        method: &str,
        params: Value,
    ) -> Result<R, RpcError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        debug!("[lg-01] -> {} (id={})", method, id);

        let request = JsonRpcRequest {
            jsonrpc: "2.0",
            id,
            method,
            params,
        };
        let response = self
            .client
            .post(&self.url)
            .json(&request)
            .send()
            .await
            .map_err(|e| RpcError::Transport(e.to_string()))?;
        let envelope: JsonRpcResponse = response
            .json()
            .await
            .map_err(|e| RpcError::Decode(e.to_string()))?;

        if let Some(err) = envelope.error {
            return Err(RpcError::Rpc {
                code: err.code,
                message: err.message,
            });
        }
        let result = match envelope.result {
            Some(value) if !value.is_null() => value,
            _ => {
                return Err(RpcError::EmptyResult {
                    method: method.to_string(),
                })
            }
        };
        serde_json::from_value(result).map_err(|e| RpcError::Decode(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::RpcStub;
    use serde_json::json;

    #[test]
    fn test_blank_url_rejected() {
        assert!(matches!(
            JsonRpcTransport::new("  "),
            Err(RpcError::MissingEndpoint)
        ));
    }

    #[tokio::test]
    async fn test_envelope_and_result() {
        let stub = RpcStub::start(|req| RpcStub::result(req, json!("0x1"))).await;
        let transport = JsonRpcTransport::new(stub.url()).unwrap();

        let result: String = transport.call("web3_clientVersion", json!([])).await.unwrap();
        assert_eq!(result, "0x1");

        let requests = stub.requests();
        assert_eq!(requests[0]["jsonrpc"], "2.0");
        assert_eq!(requests[0]["method"], "web3_clientVersion");
        assert!(requests[0]["id"].is_u64());
    }

    #[tokio::test]
    async fn test_ids_are_increasing() {
        let stub = RpcStub::start(|req| RpcStub::result(req, json!(true))).await;
        let transport = JsonRpcTransport::new(stub.url()).unwrap();
        let _: bool = transport.call("a", json!([])).await.unwrap();
        let _: bool = transport.call("b", json!([])).await.unwrap();

        let requests = stub.requests();
        let first = requests[0]["id"].as_u64().unwrap();
        let second = requests[1]["id"].as_u64().unwrap();
        assert!(second > first);
    }

    #[tokio::test]
    async fn test_error_object_is_failure() {
        let stub = RpcStub::start(|req| {
            RpcStub::error(req, -32000, "insufficient funds for gas")
        })
        .await;
        let transport = JsonRpcTransport::new(stub.url()).unwrap();

        let err = transport
            .call::<String>("eth_sendTransaction", json!([]))
            .await
            .unwrap_err();
        assert_eq!(
            err,
            RpcError::Rpc {
                code: -32000,
                message: "insufficient funds for gas".into()
            }
        );
    }

    #[tokio::test]
    async fn test_null_result_is_failure() {
        let stub = RpcStub::start(|req| RpcStub::result(req, Value::Null)).await;
        let transport = JsonRpcTransport::new(stub.url()).unwrap();

        let err = transport
            .call::<String>("eth_blockNumber", json!([]))
            .await
            .unwrap_err();
        assert!(matches!(err, RpcError::EmptyResult { .. }));
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_is_transport_error() {
        let transport = JsonRpcTransport::new("http://127.0.0.1:1").unwrap();
        let err = transport
            .call::<String>("eth_blockNumber", json!([]))
            .await
            .unwrap_err();
        assert!(matches!(err, RpcError::Transport(_)));
    }
}
