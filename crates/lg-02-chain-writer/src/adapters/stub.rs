//! # Stub Writer
//!
//! Synthesizes transaction hashes locally. Used in development and as the
//! default mode.

use crate::domain::WriterError;
use crate::ports::LoanRegistryWriter;
use async_trait::async_trait;
use lg_shared_types::Clock;
use std::sync::Arc;

/// Writer that never touches the network.
pub struct StubWriter {
    clock: Arc<dyn Clock>,
}

impl StubWriter {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self { clock }
    }

    /// `<prefix><first 8 chars of id><unix nanos as hex>`
    fn hash(&self, prefix: &str, loan_id: &str) -> String {
        let short: String = loan_id.chars().take(8).collect();
        let nanos = self.clock.now().timestamp_nanos_opt().unwrap_or_default();
        format!("{prefix}{short}{nanos:x}")
    }
}

#[async_trait]
impl LoanRegistryWriter for StubWriter {
    async fn register_loan(&self, loan_id: &str) -> Result<String, WriterError> {
        if loan_id.trim().is_empty() {
            return Err(WriterError::MissingLoanId);
        }
        Ok(self.hash("0xstub", loan_id))
    }

    async fn record_repayment(
        &self,
        loan_id: &str,
        amount_minor: i64,
        currency: &str,
    ) -> Result<String, WriterError> {
        if loan_id.trim().is_empty() || amount_minor <= 0 || currency.trim().chars().count() != 3
        {
            return Err(WriterError::InvalidRepaymentArgs);
        }
        Ok(self.hash("0xrepay", loan_id))
    }

    async fn mark_default(&self, loan_id: &str, _reason: &str) -> Result<String, WriterError> {
        if loan_id.trim().is_empty() {
            return Err(WriterError::InvalidDefaultArgs);
        }
        Ok(self.hash("0xdef", loan_id))
    }
}
