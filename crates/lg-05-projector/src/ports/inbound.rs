//! # Inbound Ports
//!
//! Read side of the projection.

use async_trait::async_trait;
use lg_shared_types::{Loan, PassportCache, StoreError};

#[async_trait]
pub trait LoanReadModel: Send + Sync {
    async fn get_loan(&self, loan_id: &str) -> Result<Option<Loan>, StoreError>;

    async fn get_passport(&self, borrower_id: &str) -> Result<Option<PassportCache>, StoreError>;

    /// All loans of a borrower, oldest first.
    async fn loans_for_borrower(&self, borrower_id: &str) -> Result<Vec<Loan>, StoreError>;
}
