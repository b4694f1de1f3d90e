//! # In-Memory Ledger
//!
//! All tables behind a single mutex. Used when `LG_STORAGE_BACKEND=memory`
//! and by the integration tests.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use lg_03_outbox::{
    JobId, JobStatus, LoanIntake, LoanSubmissionStore, NewOutboxJob, OutboxJob, OutboxStore,
};
use lg_04_ingestion::IngestionStore;
use lg_05_projector::{ChainEventStore, LoanReadModel, ProjectionStore};
use lg_shared_types::{
    ChainEvent, EventId, InsertOutcome, Loan, NewChainEvent, PassportCache, StoreError,
};
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap};

#[derive(Default)]
pub struct MemoryLedger {
    state: Mutex<LedgerState>,
}

#[derive(Default)]
struct LedgerState {
    last_job_id: u64,
    jobs: BTreeMap<JobId, OutboxJob>,
    loans: BTreeMap<String, Loan>,
    passports: BTreeMap<String, PassportCache>,
    last_event_id: u64,
    events: BTreeMap<EventId, ChainEvent>,
    event_keys: HashMap<String, EventId>,
    cursors: HashMap<String, u64>,
}

impl LedgerState {
    fn push_job(&mut self, job: NewOutboxJob, now: DateTime<Utc>) -> JobId {
        self.last_job_id += 1;
        let id = JobId(self.last_job_id);
        self.jobs.insert(id, OutboxJob::new(id, job, now));
        id
    }

    fn job_mut(&mut self, id: JobId) -> Result<&mut OutboxJob, StoreError> {
        self.jobs
            .get_mut(&id)
            .ok_or(StoreError::JobNotFound { job_id: id.0 })
    }

    fn loan_mut(&mut self, loan_id: &str) -> Result<&mut Loan, StoreError> {
        self.loans
            .get_mut(loan_id)
            .ok_or_else(|| StoreError::LoanNotFound {
                loan_id: loan_id.to_string(),
            })
    }
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl OutboxStore for MemoryLedger {
    async fn enqueue(&self, job: NewOutboxJob, now: DateTime<Utc>) -> Result<JobId, StoreError> {
        Ok(self.state.lock().push_job(job, now))
    }

    async fn claim_pending(
        &self,
        limit: usize,
        now: DateTime<Utc>,
    ) -> Result<Vec<OutboxJob>, StoreError> {
        let mut state = self.state.lock();
        let mut claimed = Vec::new();
        for job in state.jobs.values_mut() {
            if claimed.len() >= limit {
                break;
            }
            if job.is_claimable(now) {
                job.claim(now);
                claimed.push(job.clone());
            }
        }
        Ok(claimed)
    }

    async fn mark_done(&self, id: JobId, now: DateTime<Utc>) -> Result<(), StoreError> {
        self.state.lock().job_mut(id)?.complete(now)
    }

    async fn mark_retry(
        &self,
        id: JobId,
        available_at: DateTime<Utc>,
        last_error: &str,
        now: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        self.state
            .lock()
            .job_mut(id)?
            .retry(available_at, last_error, now)
    }

    async fn mark_failed(
        &self,
        id: JobId,
        last_error: &str,
        now: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        self.state.lock().job_mut(id)?.fail(last_error, now)
    }

    async fn reclaim_expired(
        &self,
        cutoff: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<Vec<JobId>, StoreError> {
        let mut state = self.state.lock();
        let mut reclaimed = Vec::new();
        for job in state.jobs.values_mut().filter(|j| j.lease_expired(cutoff)) {
            job.release_lease(now);
            reclaimed.push(job.id);
        }
        Ok(reclaimed)
    }

    async fn get_job(&self, id: JobId) -> Result<Option<OutboxJob>, StoreError> {
        Ok(self.state.lock().jobs.get(&id).cloned())
    }

    async fn list_jobs(
        &self,
        status: Option<JobStatus>,
        limit: usize,
    ) -> Result<Vec<OutboxJob>, StoreError> {
        let state = self.state.lock();
        Ok(state
            .jobs
            .values()
            .filter(|job| status.map_or(true, |s| job.status == s))
            .take(limit)
            .cloned()
            .collect())
    }

    async fn requeue(&self, id: JobId, now: DateTime<Utc>) -> Result<OutboxJob, StoreError> {
        let mut state = self.state.lock();
        let job = state.job_mut(id)?;
        job.requeue(now)?;
        Ok(job.clone())
    }
}

#[async_trait]
impl LoanSubmissionStore for MemoryLedger {
    async fn set_on_chain_submission(
        &self,
        loan_id: &str,
        tx_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        self.state.lock().loan_mut(loan_id)?.record_submission(tx_hash, now);
        Ok(())
    }
}

#[async_trait]
impl LoanIntake for MemoryLedger {
    async fn open_loan(
        &self,
        loan: Loan,
        job: NewOutboxJob,
        now: DateTime<Utc>,
    ) -> Result<JobId, StoreError> {
        let mut state = self.state.lock();
        if state.loans.contains_key(&loan.id) {
            return Err(StoreError::DuplicateLoan { loan_id: loan.id });
        }
        state.loans.insert(loan.id.clone(), loan);
        Ok(state.push_job(job, now))
    }
}

#[async_trait]
impl IngestionStore for MemoryLedger {
    async fn get_cursor(&self, key: &str) -> Result<Option<u64>, StoreError> {
        Ok(self.state.lock().cursors.get(key).copied())
    }

    async fn set_cursor(&self, key: &str, block_number: u64) -> Result<(), StoreError> {
        let mut state = self.state.lock();
        match state.cursors.get(key).copied() {
            Some(stored) if block_number < stored => Err(StoreError::CursorRegression {
                key: key.to_string(),
                stored,
                attempted: block_number,
            }),
            _ => {
                state.cursors.insert(key.to_string(), block_number);
                Ok(())
            }
        }
    }

    async fn insert_chain_event(
        &self,
        event: NewChainEvent,
    ) -> Result<InsertOutcome, StoreError> {
        let mut state = self.state.lock();
        let key = event.natural_key();
        if let Some(id) = state.event_keys.get(&key) {
            return Ok(InsertOutcome::Duplicate(*id));
        }
        state.last_event_id += 1;
        let id = EventId(state.last_event_id);
        state.event_keys.insert(key, id);
        state.events.insert(id, ChainEvent::from_new(id, event));
        Ok(InsertOutcome::Inserted(id))
    }
}

#[async_trait]
impl ChainEventStore for MemoryLedger {
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
        let event = state
            .events
            .get_mut(&id)
            .ok_or(StoreError::EventNotFound { event_id: id.0 })?;
        event.processed = true;
        Ok(())
    }
}

#[async_trait]
impl ProjectionStore for MemoryLedger {
    async fn apply_loan_registered(
        &self,
        loan_id: &str,
        tx_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        self.state
            .lock()
            .loan_mut(loan_id)?
            .confirm_registration(tx_hash, now);
        Ok(())
    }

    async fn apply_repayment(
        &self,
        loan_id: &str,
        amount_minor: i64,
        now: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        Ok(self
            .state
            .lock()
            .loan_mut(loan_id)?
            .apply_repayment(amount_minor, now))
    }

    async fn apply_default(&self, loan_id: &str, now: DateTime<Utc>) -> Result<bool, StoreError> {
        Ok(self.state.lock().loan_mut(loan_id)?.apply_default(now))
    }

    async fn refresh_passport_by_loan(
        &self,
        loan_id: &str,
        now: DateTime<Utc>,
    ) -> Result<PassportCache, StoreError> {
        let mut state = self.state.lock();
        let borrower_id = state.loan_mut(loan_id)?.borrower_id.clone();
        let passport = PassportCache::summarize(&borrower_id, state.loans.values(), now);
        state.passports.insert(borrower_id, passport.clone());
        Ok(passport)
    }
}

#[async_trait]
impl LoanReadModel for MemoryLedger {
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
