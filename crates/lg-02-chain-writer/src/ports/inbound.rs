//! # Inbound Ports
//!
//! The writer API consumed by the outbox worker.

use crate::domain::WriterError;
use async_trait::async_trait;
use lg_01_chain_rpc::RpcError;
use parking_lot::Mutex;

/// Loan registry write operations. Each returns the transaction hash.
#[async_trait]
pub trait LoanRegistryWriter: Send + Sync {
    async fn register_loan(&self, loan_id: &str) -> Result<String, WriterError>;

    async fn record_repayment(
        &self,
        loan_id: &str,
        amount_minor: i64,
        currency: &str,
    ) -> Result<String, WriterError>;

    async fn mark_default(&self, loan_id: &str, reason: &str) -> Result<String, WriterError>;
}

// =============================================================================
// Mock Implementations for Testing
// =============================================================================

/// A call observed by [`MockRegistryWriter`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriterCall {
    RegisterLoan(String),
    RecordRepayment(String, i64, String),
    MarkDefault(String, String),
}

/// Mock writer for testing.
///
/// Returns `0xmock<n>` hashes, or a transport error while failing.
#[derive(Default)]
pub struct MockRegistryWriter {
    calls: Mutex<Vec<WriterCall>>,
    failure: Mutex<Option<String>>,
}

impl MockRegistryWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail every call with `message` until [`Self::succeed`].
    pub fn fail_with(&self, message: impl Into<String>) {
        *self.failure.lock() = Some(message.into());
    }

    pub fn succeed(&self) {
        *self.failure.lock() = None;
    }

    pub fn calls(&self) -> Vec<WriterCall> {
        self.calls.lock().clone()
    }

    fn respond(&self, call: WriterCall) -> Result<String, WriterError> {
        let mut calls = self.calls.lock();
        calls.push(call);
        if let Some(message) = self.failure.lock().clone() {
            return Err(WriterError::Rpc(RpcError::Transport(message)));
        }
        Ok(format!("0xmock{}", calls.len()))
    }
}

#[async_trait]
impl LoanRegistryWriter for MockRegistryWriter {
    async fn register_loan(&self, loan_id: &str) -> Result<String, WriterError> {
        self.respond(WriterCall::RegisterLoan(loan_id.to_string()))
    }

    async fn record_repayment(
        &self,
        loan_id: &str,
        amount_minor: i64,
        currency: &str,
    ) -> Result<String, WriterError> {
        self.respond(WriterCall::RecordRepayment(
            loan_id.to_string(),
            amount_minor,
            currency.to_string(),
        ))
    }

    async fn mark_default(&self, loan_id: &str, reason: &str) -> Result<String, WriterError> {
        self.respond(WriterCall::MarkDefault(
            loan_id.to_string(),
            reason.to_string(),
        ))
    }
}
