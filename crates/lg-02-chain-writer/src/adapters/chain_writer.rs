//! # Writer Selection
//!
//! Resolves the configured mode into a concrete writer once, at startup.

use super::{RpcWriter, StubWriter};
use crate::domain::{WriterConfig, WriterError, WriterMode};
use crate::ports::LoanRegistryWriter;
use async_trait::async_trait;
use lg_shared_types::Clock;
use std::sync::Arc;
use tracing::info;

/// The writer the runtime hands to the outbox worker.
pub enum ChainWriter {
    Stub(StubWriter),
    Rpc(RpcWriter),
}

impl ChainWriter {
    pub fn from_config(config: &WriterConfig, clock: Arc<dyn Clock>) -> Result<Self, WriterError> {
        match config.mode {
            WriterMode::Stub => {
                info!("[lg-02] Chain writer mode: stub");
                Ok(ChainWriter::Stub(StubWriter::new(clock)))
            }
            WriterMode::Real => {
                let writer = RpcWriter::new(
                    &config.rpc_url,
                    &config.from_address,
                    &config.contract_address,
                    config.gas_limit,
                )?;
                info!(
                    "[lg-02] Chain writer mode: real (gas limit {})",
                    writer.gas_limit()
                );
                Ok(ChainWriter::Rpc(writer))
            }
        }
    }

    pub fn mode(&self) -> WriterMode {
        match self {
            ChainWriter::Stub(_) => WriterMode::Stub,
            ChainWriter::Rpc(_) => WriterMode::Real,
        }
    }

    fn inner(&self) -> &dyn LoanRegistryWriter {
        match self {
            ChainWriter::Stub(writer) => writer,
            ChainWriter::Rpc(writer) => writer,
        }
    }
}

#[async_trait]
impl LoanRegistryWriter for ChainWriter {
    async fn register_loan(&self, loan_id: &str) -> Result<String, WriterError> {
        self.inner().register_loan(loan_id).await
    }

    async fn record_repayment(
        &self,
        loan_id: &str,
        amount_minor: i64,
        currency: &str,
    ) -> Result<String, WriterError> {
        self.inner()
            .record_repayment(loan_id, amount_minor, currency)
            .await
    }

    async fn mark_default(&self, loan_id: &str, reason: &str) -> Result<String, WriterError> {
        self.inner().mark_default(loan_id, reason).await
    }
}
