//! # Outbound Ports
//!
//! Persistence required by the outbox worker and by domain callers that
//! enqueue jobs.

use crate::domain::{JobId, JobStatus, NewOutboxJob, OutboxJob};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use lg_shared_types::{Loan, StoreError};
use parking_lot::Mutex;
use std::collections::BTreeMap;

/// Durable job queue.
///
/// `claim_pending` must be atomic: a job is handed to at most one caller
/// until it is resolved or its lease is reclaimed.
#[async_trait]
pub trait OutboxStore: Send + Sync {
    /// Insert a pending job, available immediately.
    async fn enqueue(&self, job: NewOutboxJob, now: DateTime<Utc>) -> Result<JobId, StoreError>;

    /// Claim up to `limit` claimable jobs, oldest id first.
    async fn claim_pending(
        &self,
        limit: usize,
        now: DateTime<Utc>,
    ) -> Result<Vec<OutboxJob>, StoreError>;

    async fn mark_done(&self, id: JobId, now: DateTime<Utc>) -> Result<(), StoreError>;

    async fn mark_retry(
        &self,
        id: JobId,
        available_at: DateTime<Utc>,
        last_error: &str,
        now: DateTime<Utc>,
    ) -> Result<(), StoreError>;

    async fn mark_failed(
        &self,
        id: JobId,
        last_error: &str,
        now: DateTime<Utc>,
    ) -> Result<(), StoreError>;

    /// Return every processing job claimed before `cutoff` to pending.
    async fn reclaim_expired(
        &self,
        cutoff: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<Vec<JobId>, StoreError>;

    async fn get_job(&self, id: JobId) -> Result<Option<OutboxJob>, StoreError>;

    /// Jobs in id order, optionally filtered by status.
    async fn list_jobs(
        &self,
        status: Option<JobStatus>,
        limit: usize,
    ) -> Result<Vec<OutboxJob>, StoreError>;

    /// Move a failed job back to pending.
    async fn requeue(&self, id: JobId, now: DateTime<Utc>) -> Result<OutboxJob, StoreError>;
}

/// Loan write used by the worker after a successful submission.
#[async_trait]
pub trait LoanSubmissionStore: Send + Sync {
    /// Record `tx_hash` as the loan's unconfirmed submission. A loan already
    /// confirmed by the chain is left untouched.
    async fn set_on_chain_submission(
        &self,
        loan_id: &str,
        tx_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<(), StoreError>;
}

/// Atomic "create loan + enqueue its registration" unit of work.
#[async_trait]
pub trait LoanIntake: Send + Sync {
    /// Neither the loan nor the job is stored if either write fails.
    async fn open_loan(
        &self,
        loan: Loan,
        job: NewOutboxJob,
        now: DateTime<Utc>,
    ) -> Result<JobId, StoreError>;
}

// =============================================================================
// Mock Implementations for Testing
// =============================================================================

/// In-memory outbox + loan table with failure injection.
#[derive(Default)]
pub struct MockOutboxStore {
    state: Mutex<MockState>,
}

#[derive(Default)]
struct MockState {
    next_id: u64,
    jobs: BTreeMap<JobId, OutboxJob>,
    loans: BTreeMap<String, Loan>,
    fail_claim: bool,
    fail_resolve: bool,
    fail_loan_write: bool,
}

impl MockOutboxStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_loan(&self, loan: Loan) {
        self.state.lock().loans.insert(loan.id.clone(), loan);
    }

    pub fn loan(&self, loan_id: &str) -> Option<Loan> {
        self.state.lock().loans.get(loan_id).cloned()
    }

    pub fn job(&self, id: JobId) -> Option<OutboxJob> {
        self.state.lock().jobs.get(&id).cloned()
    }

    /// Overwrite a stored job (tests set attempts / status directly).
    pub fn put_job(&self, job: OutboxJob) {
        let mut state = self.state.lock();
        state.next_id = state.next_id.max(job.id.0);
        state.jobs.insert(job.id, job);
    }

    pub fn set_fail_claim(&self, fail: bool) {
        self.state.lock().fail_claim = fail;
    }

    pub fn set_fail_resolve(&self, fail: bool) {
        self.state.lock().fail_resolve = fail;
    }

    pub fn set_fail_loan_write(&self, fail: bool) {
        self.state.lock().fail_loan_write = fail;
    }

    fn resolve<F>(&self, id: JobId, apply: F) -> Result<(), StoreError>
    where
        F: FnOnce(&mut OutboxJob) -> Result<(), StoreError>,
    {
        let mut state = self.state.lock();
        if state.fail_resolve {
            return Err(StoreError::Database("mock resolve failure".into()));
        }
        let job = state
            .jobs
            .get_mut(&id)
            .ok_or(StoreError::JobNotFound { job_id: id.0 })?;
        apply(job)
    }
}

#[async_trait]
impl OutboxStore for MockOutboxStore {
    async fn enqueue(&self, job: NewOutboxJob, now: DateTime<Utc>) -> Result<JobId, StoreError> {
        let mut state = self.state.lock();
        state.next_id += 1;
        let id = JobId(state.next_id);
        state.jobs.insert(id, OutboxJob::new(id, job, now));
        Ok(id)
    }

    async fn claim_pending(
        &self,
        limit: usize,
        now: DateTime<Utc>,
    ) -> Result<Vec<OutboxJob>, StoreError> {
        let mut state = self.state.lock();
        if state.fail_claim {
            return Err(StoreError::Database("mock claim failure".into()));
        }
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
        self.resolve(id, |job| job.complete(now))
    }

    async fn mark_retry(
        &self,
        id: JobId,
        available_at: DateTime<Utc>,
        last_error: &str,
        now: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        self.resolve(id, |job| job.retry(available_at, last_error, now))
    }

    async fn mark_failed(
        &self,
        id: JobId,
        last_error: &str,
        now: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        self.resolve(id, |job| job.fail(last_error, now))
    }

    async fn reclaim_expired(
        &self,
        cutoff: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<Vec<JobId>, StoreError> {
        let mut state = self.state.lock();
        let mut reclaimed = Vec::new();
        for job in state.jobs.values_mut() {
            if job.lease_expired(cutoff) {
                job.release_lease(now);
                reclaimed.push(job.id);
            }
        }
        Ok(reclaimed)
    }

    async fn get_job(&self, id: JobId) -> Result<Option<OutboxJob>, StoreError> {
        Ok(self.job(id))
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
        let job = state
            .jobs
            .get_mut(&id)
            .ok_or(StoreError::JobNotFound { job_id: id.0 })?;
        job.requeue(now)?;
        Ok(job.clone())
    }
}

#[async_trait]
impl LoanSubmissionStore for MockOutboxStore {
    async fn set_on_chain_submission(
        &self,
        loan_id: &str,
        tx_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let mut state = self.state.lock();
        if state.fail_loan_write {
            return Err(StoreError::Database("mock loan write failure".into()));
        }
        let loan = state
            .loans
            .get_mut(loan_id)
            .ok_or_else(|| StoreError::LoanNotFound {
                loan_id: loan_id.to_string(),
            })?;
        loan.record_submission(tx_hash, now);
        Ok(())
    }
}

#[async_trait]
impl LoanIntake for MockOutboxStore {
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
        state.next_id += 1;
        let id = JobId(state.next_id);
        state.loans.insert(loan.id.clone(), loan);
        state.jobs.insert(id, OutboxJob::new(id, job, now));
        Ok(id)
    }
}
