//! # JSON-RPC Writer
//!
//! Sends marker transactions to the loan registry contract through
//! `eth_sendTransaction`. The node signs with the unlocked `from` account.

use crate::domain::{WriterError, DEFAULT_GAS_LIMIT};
use crate::ports::LoanRegistryWriter;
use async_trait::async_trait;
use lg_01_chain_rpc::JsonRpcTransport;
use lg_shared_types::{to_hex_quantity, Address};
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, info};

#[derive(Serialize)]
struct TxObject {
    from: String,
    to: String,
    gas: String,
    data: String,
    value: &'static str,
}

/// Writer backed by a JSON-RPC node.
pub struct RpcWriter {
    transport: Arc<JsonRpcTransport>,
    from: Address,
    contract: Address,
    gas_limit: u64,
}

impl RpcWriter {
    /// Validate inputs and open a transport to `rpc_url`.
    pub fn new(
        rpc_url: &str,
        from_address: &str,
        contract_address: &str,
        gas_limit: u64,
    ) -> Result<Self, WriterError> {
        if rpc_url.trim().is_empty() {
            return Err(WriterError::MissingRpcUrl);
        }
        let from = Address::parse(from_address).map_err(WriterError::InvalidFromAddress)?;
        let contract =
            Address::parse(contract_address).map_err(WriterError::InvalidContractAddress)?;
        let transport = Arc::new(JsonRpcTransport::new(rpc_url)?);
        Ok(Self::with_transport(transport, from, contract, gas_limit))
    }

    /// Build over an existing transport.
    pub fn with_transport(
        transport: Arc<JsonRpcTransport>,
        from: Address,
        contract: Address,
        gas_limit: u64,
    ) -> Self {
        let gas_limit = if gas_limit == 0 {
            DEFAULT_GAS_LIMIT
        } else {
            gas_limit
        };
        Self {
            transport,
            from,
            contract,
            gas_limit,
        }
    }

    pub fn gas_limit(&self) -> u64 {
        self.gas_limit
    }

    async fn send_marker(&self, action: &str, payload: Value) -> Result<String, WriterError> {
        let marker = json!({ "action": action, "payload": payload });
        let tx = TxObject {
            from: self.from.to_string(),
            to: self.contract.to_string(),
            gas: to_hex_quantity(self.gas_limit),
            data: format!("0x{}", hex::encode(marker.to_string())),
            value: "0x0",
        };
        debug!("[lg-02] eth_sendTransaction action={}", action);

        let tx_hash: String = self
            .transport
            .call("eth_sendTransaction", json!([tx]))
            .await?;
        if !tx_hash.starts_with("0x") {
            return Err(WriterError::InvalidTxHash(tx_hash));
        }
        info!("[lg-02] {} submitted: {}", action, tx_hash);
        Ok(tx_hash)
    }
}

#[async_trait]
impl LoanRegistryWriter for RpcWriter {
    async fn register_loan(&self, loan_id: &str) -> Result<String, WriterError> {
        let loan_id = loan_id.trim();
        if loan_id.is_empty() {
            return Err(WriterError::MissingLoanId);
        }
        self.send_marker("register_loan", json!({ "loan_id": loan_id }))
            .await
    }

    async fn record_repayment(
        &self,
        loan_id: &str,
        amount_minor: i64,
        currency: &str,
    ) -> Result<String, WriterError> {
        let loan_id = loan_id.trim();
        let currency = currency.trim();
        if loan_id.is_empty() || amount_minor <= 0 || currency.chars().count() != 3 {
            return Err(WriterError::InvalidRepaymentArgs);
        }
        self.send_marker(
            "record_repayment",
            json!({
                "loan_id": loan_id,
                "amount_minor": amount_minor,
                "currency": currency.to_uppercase(),
            }),
        )
        .await
    }

    async fn mark_default(&self, loan_id: &str, reason: &str) -> Result<String, WriterError> {
        let loan_id = loan_id.trim();
        if loan_id.is_empty() {
            return Err(WriterError::InvalidDefaultArgs);
        }
        self.send_marker(
            "mark_default",
            json!({ "loan_id": loan_id, "reason": reason.trim() }),
        )
        .await
    }
}
