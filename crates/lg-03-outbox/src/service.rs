//! Outbox Worker - drains claimed jobs to the chain writer

use crate::domain::{
    JobError, JobTopic, OutboxError, OutboxJob, RegisterLoanPayload, RetryPolicy,
};
use crate::ports::{LoanSubmissionStore, OutboxStore};
use chrono::{DateTime, Utc};
use lg_02_chain_writer::LoanRegistryWriter;
use lg_shared_types::Clock;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Claim limit used when a caller passes 0.
pub const DEFAULT_BATCH_SIZE: usize = 20;

/// Worker configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerConfig {
    pub retry: RetryPolicy,
    /// Processing jobs claimed longer ago than this are returned to the
    /// queue at the start of each run. `None` disables reclaiming.
    pub lease_timeout: Option<Duration>,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            retry: RetryPolicy::default(),
            lease_timeout: Some(Duration::from_secs(300)),
        }
    }
}

/// Counts from one `run_once` pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WorkerRunReport {
    pub reclaimed: usize,
    pub claimed: usize,
    pub done: usize,
    pub retried: usize,
    pub failed: usize,
}

enum Resolution {
    Retried,
    Failed,
}

/// Outbox worker.
///
/// Generic over its ports; `?Sized` so the runtime can hand in trait
/// objects.
pub struct OutboxWorker<O, L, W>
where
    O: OutboxStore + ?Sized,
    L: LoanSubmissionStore + ?Sized,
    W: LoanRegistryWriter + ?Sized,
{
    outbox: Arc<O>,
    loans: Arc<L>,
    writer: Arc<W>,
    clock: Arc<dyn Clock>,
    config: WorkerConfig,
}

impl<O, L, W> OutboxWorker<O, L, W>
where
    O: OutboxStore + ?Sized,
    L: LoanSubmissionStore + ?Sized,
    W: LoanRegistryWriter + ?Sized,
{
    pub fn new(
        outbox: Arc<O>,
        loans: Arc<L>,
        writer: Arc<W>,
        clock: Arc<dyn Clock>,
        config: WorkerConfig,
    ) -> Self {
        Self {
            outbox,
            loans,
            writer,
            clock,
            config,
        }
    }

    pub fn config(&self) -> &WorkerConfig {
        &self.config
    }

    /// One pass: reclaim expired leases, claim up to `batch_size` jobs and
    /// resolve each of them.
    ///
    /// Job failures are recorded on the job. Only storage failures while
    /// claiming or resolving abort the pass.
    pub async fn run_once(&self, batch_size: usize) -> Result<WorkerRunReport, OutboxError> {
        let mut report = WorkerRunReport::default();
        let limit = if batch_size == 0 {
            DEFAULT_BATCH_SIZE
        } else {
            batch_size
        };

        report.reclaimed = self.reclaim_expired().await?;

        let jobs = self.outbox.claim_pending(limit, self.clock.now()).await?;
        report.claimed = jobs.len();
        if !jobs.is_empty() {
            debug!("[lg-03] Claimed {} outbox jobs", jobs.len());
        }

        for job in jobs {
            match self.process(&job).await {
                Ok(tx_hash) => {
                    self.outbox.mark_done(job.id, self.clock.now()).await?;
                    info!(
                        job_id = job.id.0,
                        topic = %job.topic,
                        tx_hash = %tx_hash,
                        "[lg-03] Job done"
                    );
                    report.done += 1;
                }
                Err(err) => match self.resolve_failure(&job, &err).await? {
                    Resolution::Retried => report.retried += 1,
                    Resolution::Failed => report.failed += 1,
                },
            }
        }

        Ok(report)
    }

    async fn reclaim_expired(&self) -> Result<usize, OutboxError> {
        let Some(lease) = self.config.lease_timeout else {
            return Ok(0);
        };
        let now = self.clock.now();
        let Some(cutoff) = lease_cutoff(now, lease) else {
            return Ok(0);
        };
        let reclaimed = self.outbox.reclaim_expired(cutoff, now).await?;
        if !reclaimed.is_empty() {
            warn!(
                "[lg-03] Reclaimed {} jobs with expired leases: {:?}",
                reclaimed.len(),
                reclaimed
            );
        }
        Ok(reclaimed.len())
    }

    /// Dispatch by topic. Returns the submitted transaction hash.
    async fn process(&self, job: &OutboxJob) -> Result<String, JobError> {
        match JobTopic::parse(&job.topic) {
            Some(JobTopic::RegisterLoan) => self.register_loan(job).await,
            // record_repayment and mark_default are reserved
            _ => Err(JobError::UnsupportedTopic),
        }
    }

    async fn register_loan(&self, job: &OutboxJob) -> Result<String, JobError> {
        let payload: RegisterLoanPayload =
            serde_json::from_slice(&job.payload).map_err(|_| JobError::InvalidPayload)?;
        let loan_id = payload.loan_id.as_deref().unwrap_or_default().trim();
        if loan_id.is_empty() {
            return Err(JobError::MissingLoanId);
        }

        let tx_hash = self.writer.register_loan(loan_id).await?;
        self.loans
            .set_on_chain_submission(loan_id, &tx_hash, self.clock.now())
            .await
            .map_err(JobError::Persistence)?;
        Ok(tx_hash)
    }

    async fn resolve_failure(
        &self,
        job: &OutboxJob,
        err: &JobError,
    ) -> Result<Resolution, OutboxError> {
        let message = err.to_string();
        let now = self.clock.now();

        if self.config.retry.is_exhausted(job.attempts) {
            self.outbox.mark_failed(job.id, &message, now).await?;
            warn!(
                job_id = job.id.0,
                topic = %job.topic,
                attempts = job.attempts,
                "[lg-03] Job failed permanently: {}",
                message
            );
            return Ok(Resolution::Failed);
        }

        let next = self.config.retry.next_attempt_at(job.attempts, now);
        self.outbox.mark_retry(job.id, next, &message, now).await?;
        debug!(
            job_id = job.id.0,
            attempts = job.attempts,
            retry_at = %next,
            "[lg-03] Job will retry: {}",
            message
        );
        Ok(Resolution::Retried)
    }
}

fn lease_cutoff(now: DateTime<Utc>, lease: Duration) -> Option<DateTime<Utc>> {
    chrono::Duration::from_std(lease)
        .ok()
        .and_then(|lease| now.checked_sub_signed(lease))
}
