//! # Outbox Entities
//!
//! [`OutboxJob`] carries its own state machine so that every store applies
//! the same transitions.

use chrono::{DateTime, Utc};
use lg_shared_types::StoreError;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::fmt;

/// `last_error` recorded when a stuck claim is returned to the queue.
pub const LEASE_EXPIRED: &str = "lease_expired";

/// Outbox job identifier. Allocated in insertion order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct JobId(pub u64);

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Processing,
    Done,
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Processing => "processing",
            JobStatus::Done => "done",
            JobStatus::Failed => "failed",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "pending" => Some(JobStatus::Pending),
            "processing" => Some(JobStatus::Processing),
            "done" => Some(JobStatus::Done),
            "failed" => Some(JobStatus::Failed),
            _ => None,
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Known outbox topics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobTopic {
    RegisterLoan,
    RecordRepayment,
    MarkDefault,
}

impl JobTopic {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobTopic::RegisterLoan => "register_loan",
            JobTopic::RecordRepayment => "record_repayment",
            JobTopic::MarkDefault => "mark_default",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "register_loan" => Some(JobTopic::RegisterLoan),
            "record_repayment" => Some(JobTopic::RecordRepayment),
            "mark_default" => Some(JobTopic::MarkDefault),
            _ => None,
        }
    }
}

/// `register_loan` payload. An absent and a `null` id read the same.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RegisterLoanPayload {
    pub loan_id: Option<String>,
}

/// A job to be enqueued.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewOutboxJob {
    pub topic: String,
    pub payload: Vec<u8>,
}

impl NewOutboxJob {
    /// Arbitrary topic and payload.
    pub fn new(topic: impl Into<String>, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            topic: topic.into(),
            payload: payload.into(),
        }
    }

    pub fn register_loan(loan_id: &str) -> Self {
        Self::new(
            JobTopic::RegisterLoan.as_str(),
            json!({ "loan_id": loan_id }).to_string(),
        )
    }

    pub fn record_repayment(loan_id: &str, amount_minor: i64, currency: &str) -> Self {
        Self::new(
            JobTopic::RecordRepayment.as_str(),
            json!({
                "loan_id": loan_id,
                "amount_minor": amount_minor,
                "currency": currency,
            })
            .to_string(),
        )
    }

    pub fn mark_default(loan_id: &str, reason: &str, lender_id: &str) -> Self {
        Self::new(
            JobTopic::MarkDefault.as_str(),
            json!({
                "loan_id": loan_id,
                "reason": reason,
                "lender_id": lender_id,
            })
            .to_string(),
        )
    }
}

/// A durable outbox job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutboxJob {
    pub id: JobId,
    pub topic: String,
    pub payload: Vec<u8>,
    pub status: JobStatus,
    pub attempts: u32,
    pub last_error: Option<String>,
    pub available_at: DateTime<Utc>,
    pub claimed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl OutboxJob {
    /// Fresh pending job, available immediately.
    pub fn new(id: JobId, job: NewOutboxJob, now: DateTime<Utc>) -> Self {
        Self {
            id,
            topic: job.topic,
            payload: job.payload,
            status: JobStatus::Pending,
            attempts: 0,
            last_error: None,
            available_at: now,
            claimed_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_claimable(&self, now: DateTime<Utc>) -> bool {
        self.status == JobStatus::Pending && self.available_at <= now
    }

    /// Processing job whose claim is older than `cutoff`.
    pub fn lease_expired(&self, cutoff: DateTime<Utc>) -> bool {
        self.status == JobStatus::Processing && self.claimed_at.is_some_and(|at| at < cutoff)
    }

    pub fn claim(&mut self, now: DateTime<Utc>) {
        self.status = JobStatus::Processing;
        self.attempts = self.attempts.saturating_add(1);
        self.claimed_at = Some(now);
        self.updated_at = now;
    }

    pub fn complete(&mut self, now: DateTime<Utc>) -> Result<(), StoreError> {
        self.expect_status(JobStatus::Processing, JobStatus::Done)?;
        self.status = JobStatus::Done;
        self.last_error = None;
        self.claimed_at = None;
        self.updated_at = now;
        Ok(())
    }

    pub fn retry(
        &mut self,
        available_at: DateTime<Utc>,
        error: &str,
        now: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        self.expect_status(JobStatus::Processing, JobStatus::Pending)?;
        self.status = JobStatus::Pending;
        self.available_at = self.available_at.max(available_at);
        self.last_error = Some(error.to_string());
        self.claimed_at = None;
        self.updated_at = now;
        Ok(())
    }

    pub fn fail(&mut self, error: &str, now: DateTime<Utc>) -> Result<(), StoreError> {
        self.expect_status(JobStatus::Processing, JobStatus::Failed)?;
        self.status = JobStatus::Failed;
        self.last_error = Some(error.to_string());
        self.claimed_at = None;
        self.updated_at = now;
        Ok(())
    }

    /// Return an expired claim to the queue. Attempts are kept.
    pub fn release_lease(&mut self, now: DateTime<Utc>) {
        self.status = JobStatus::Pending;
        self.available_at = self.available_at.max(now);
        self.last_error = Some(LEASE_EXPIRED.to_string());
        self.claimed_at = None;
        self.updated_at = now;
    }

    /// Operator action: put a failed job back in the queue.
    pub fn requeue(&mut self, now: DateTime<Utc>) -> Result<(), StoreError> {
        self.expect_status(JobStatus::Failed, JobStatus::Pending)?;
        self.status = JobStatus::Pending;
        self.available_at = self.available_at.max(now);
        self.updated_at = now;
        Ok(())
    }

    fn expect_status(&self, required: JobStatus, to: JobStatus) -> Result<(), StoreError> {
        if self.status != required {
            return Err(StoreError::InvalidTransition {
                job_id: self.id.0,
                from: self.status.to_string(),
                to: to.to_string(),
            });
        }
        Ok(())
    }
}
