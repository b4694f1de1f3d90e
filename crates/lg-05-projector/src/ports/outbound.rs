//! # Outbound Ports

use super::inbound::LoanReadModel;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use lg_shared_types::{
    ChainEvent, EventId, Loan, NewChainEvent, PassportCache, StoreError,
};
use parking_lot::Mutex;
use std::collections::BTreeMap;

/// Stored chain events awaiting projection.
#[async_trait]
pub trait ChainEventStore: Send + Sync {
    /// Unprocessed events, ascending id.
    async fn list_unprocessed(&self, limit: usize) -> Result<Vec<ChainEvent>, StoreError>;

    async fn mark_processed(&self, id: EventId) -> Result<(), StoreError>;
}

/// Loan and passport writes. Each call is one atomic read-modify-write.
#[async_trait]
pub trait ProjectionStore: Send + Sync {
    async fn apply_loan_registered(
        &self,
        loan_id: &str,
        tx_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<(), StoreError>;

    /// Returns `false` when the loan is defaulted and the repayment dropped.
    async fn apply_repayment(
        &self,
        loan_id: &str,
        amount_minor: i64,
        now: DateTime<Utc>,
    ) -> Result<bool, StoreError>;

    /// Returns whether the status changed.
    async fn apply_default(&self, loan_id: &str, now: DateTime<Utc>) -> Result<bool, StoreError>;

    /// Recompute and upsert the passport of the loan's borrower.
    async fn refresh_passport_by_loan(
        &self,
        loan_id: &str,
        now: DateTime<Utc>,
    ) -> Result<PassportCache, StoreError>;
}

// =============================================================================
// Mock Implementations for Testing
// =============================================================================

/// In-memory event, loan and passport tables.
#[derive(Default)]
pub struct MockProjectionStore {
    state: Mutex<MockState>,
}

#[derive(Default)]
struct MockState {
    events: BTreeMap<EventId, ChainEvent>,
    loans: BTreeMap<String, Loan>,
    passports: BTreeMap<String, PassportCache>,
    fail_mark: bool,
}

impl MockProjectionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_loan(&self, loan: Loan) {
        self.state.lock().loans.insert(loan.id.clone(), loan);
    }

    pub fn push_event(&self, event: NewChainEvent) -> EventId {
        let mut state = self.state.lock();
        let id = EventId(state.events.len() as u64 + 1);
        state.events.insert(id, ChainEvent::from_new(id, event));
        id
    }

    pub fn event(&self, id: EventId) -> Option<ChainEvent> {
        self.state.lock().events.get(&id).cloned()
    }

    pub fn set_fail_mark(&self, fail: bool) {
        self.state.lock().fail_mark = fail;
    }

    fn with_loan<T, F>(&self, loan_id: &str, apply: F) -> Result<T, StoreError>
    where
        F: FnOnce(&mut Loan) -> T,
    {
        let mut state = self.state.lock();
        let loan = state
            .loans
            .get_mut(loan_id)
            .ok_or_else(|| StoreError::LoanNotFound {
                loan_id: loan_id.to_string(),
            })?;
        Ok(apply(loan))
    }
}

#[async_trait]
impl ChainEventStore for MockProjectionStore {
    async fn list_unprocessed(&self, limit: usize) -> Result<Vec<ChainEvent>, StoreError> {
        let state = self.state.lock();
        Ok(state
            .events
            .values()
            .filter(|e| !e.processed)
            .take(limit)
            .cloned()
            .collect())
    }

    async fn mark_processed(&self, id: EventId) -> Result<(), StoreError> {
        let mut state = self.state.lock();
        if state.fail_mark {
            return Err(StoreError::Database("mock mark failure".into()));
        }
        let event = state
            .events
            .get_mut(&id)
            .ok_or(StoreError::EventNotFound { event_id: id.0 })?;
        event.processed = true;
        Ok(())
    }
}

#[async_trait]
impl ProjectionStore for MockProjectionStore {
    async fn apply_loan_registered(
        &self,
        loan_id: &str,
        tx_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        self.with_loan(loan_id, |loan| loan.confirm_registration(tx_hash, now))
    }

    async fn apply_repayment(
        &self,
        loan_id: &str,
        amount_minor: i64,
        now: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        self.with_loan(loan_id, |loan| loan.apply_repayment(amount_minor, now))
    }

    async fn apply_default(&self, loan_id: &str, now: DateTime<Utc>) -> Result<bool, StoreError> {
        self.with_loan(loan_id, |loan| loan.apply_default(now))
    }

    async fn refresh_passport_by_loan(
        &self,
        loan_id: &str,
        now: DateTime<Utc>,
    ) -> Result<PassportCache, StoreError> {
        let mut state = self.state.lock();
        let borrower_id = state
            .loans
            .get(loan_id)
            .map(|loan| loan.borrower_id.clone())
            .ok_or_else(|| StoreError::LoanNotFound {
                loan_id: loan_id.to_string(),
            })?;
        let passport = PassportCache::summarize(&borrower_id, state.loans.values(), now);
        state.passports.insert(borrower_id, passport.clone());
        Ok(passport)
    }
}

#[async_trait]
impl LoanReadModel for MockProjectionStore {
    async fn get_loan(&self, loan_id: &str) -> Result<Option<Loan>, StoreError> {
        Ok(self.state.lock().loans.get(loan_id).cloned())
    }

    async fn get_passport(&self, borrower_id: &str) -> Result<Option<PassportCache>, StoreError> {
        Ok(self.state.lock().passports.get(borrower_id).cloned())
    }

    async fn loans_for_borrower(&self, borrower_id: &str) -> Result<Vec<Loan>, StoreError> {
        let state = self.state.lock();
        let mut loans: Vec<Loan> = state
            .loans
            .values()
            .filter(|loan| loan.borrower_id == borrower_id)
            .cloned()
            .collect();
        loans.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(loans)
    }
}
