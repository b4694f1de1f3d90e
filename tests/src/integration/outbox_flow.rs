//! # Outbox Flow
//!
//! Loan intake enqueues a registration job; the worker claims it, submits it
//! through the chain writer and records the transaction on the loan.
//!
//! Covers retry backoff, terminal failure, operator requeue, lease reclaim
//! after a crashed claimer, and several workers draining one ledger.

#[cfg(test)]
mod tests {
    use crate::integration::fixtures::*;
    use chrono::Duration as ChronoDuration;
    use lg_02_chain_writer::{MockRegistryWriter, WriterCall};
    use lg_03_outbox::{
        JobStatus, NewOutboxJob, OutboxStore, OutboxWorker, RetryPolicy, WorkerConfig,
        LEASE_EXPIRED,
    };
    use lg_05_projector::{LoanReadModel, ProjectionStore};
    use lg_shared_types::{Clock, ManualClock};
    use lg_storage::MemoryLedger;
    use std::collections::HashSet;
    use std::sync::Arc;
    use std::time::Duration;

    type Worker = OutboxWorker<MemoryLedger, MemoryLedger, MockRegistryWriter>;

    struct Harness {
        ledger: Arc<MemoryLedger>,
        writer: Arc<MockRegistryWriter>,
        clock: Arc<ManualClock>,
        worker: Worker,
    }

    fn harness(config: WorkerConfig) -> Harness {
        let ledger = Arc::new(MemoryLedger::new());
        let writer = Arc::new(MockRegistryWriter::new());
        let clock = clock();
        let worker = OutboxWorker::new(
            ledger.clone(),
            ledger.clone(),
            writer.clone(),
            clock.clone(),
            config,
        );
        Harness {
            ledger,
            writer,
            clock,
            worker,
        }
    }

    fn retry_config(max_attempts: u32) -> WorkerConfig {
        WorkerConfig {
            retry: RetryPolicy {
                max_attempts,
                backoff_step: Duration::from_secs(10),
            },
            lease_timeout: Some(Duration::from_secs(60)),
        }
    }

    #[tokio::test]
    async fn test_registration_reaches_loan() {
        let h = harness(WorkerConfig::default());
        let job_id = open_loan(h.ledger.as_ref(), LOAN_A, 100_000).await;

        let report = h.worker.run_once(10).await.unwrap();
        assert_eq!((report.claimed, report.done), (1, 1));

        let job = h.ledger.get_job(job_id).await.unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Done);
        assert_eq!(job.attempts, 1);
        assert_eq!(job.last_error, None);

        let loan = h.ledger.get_loan(LOAN_A).await.unwrap().unwrap();
        assert_eq!(loan.on_chain_tx.as_deref(), Some("0xmock1"));
        assert!(!loan.on_chain_confirmed);
        assert_eq!(h.writer.calls(), vec![WriterCall::RegisterLoan(LOAN_A.into())]);

        // Nothing left to do.
        assert_eq!(h.worker.run_once(10).await.unwrap().claimed, 0);
    }

    #[tokio::test]
    async fn test_backoff_then_failure_then_requeue() {
        let h = harness(retry_config(3));
        let job_id = open_loan(h.ledger.as_ref(), LOAN_A, 100_000).await;
        h.writer.fail_with("connection refused");

        // Attempt 1 fails: retry after 1 * 10s.
        assert_eq!(h.worker.run_once(10).await.unwrap().retried, 1);
        let job = h.ledger.get_job(job_id).await.unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Pending);
        assert_eq!(job.attempts, 1);
        assert_eq!(job.available_at, t0() + ChronoDuration::seconds(10));
        assert!(job.last_error.unwrap().contains("connection refused"));

        // Not yet visible.
        h.clock.advance(ChronoDuration::seconds(9));
        assert_eq!(h.worker.run_once(10).await.unwrap().claimed, 0);

        // Attempt 2 fails: retry after 2 * 10s.
        h.clock.advance(ChronoDuration::seconds(1));
        assert_eq!(h.worker.run_once(10).await.unwrap().retried, 1);
        let job = h.ledger.get_job(job_id).await.unwrap().unwrap();
        assert_eq!(job.available_at, h.clock.now() + ChronoDuration::seconds(20));

        // Attempt 3 exhausts the policy.
        h.clock.advance(ChronoDuration::seconds(20));
        assert_eq!(h.worker.run_once(10).await.unwrap().failed, 1);
        let job = h.ledger.get_job(job_id).await.unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Failed);
        assert_eq!(job.attempts, 3);
        assert_eq!(
            h.ledger
                .list_jobs(Some(JobStatus::Failed), 10)
                .await
                .unwrap()
                .len(),
            1
        );

        // Failed jobs stay put until an operator requeues them.
        h.clock.advance(ChronoDuration::hours(1));
        assert_eq!(h.worker.run_once(10).await.unwrap().claimed, 0);

        let requeued = h.ledger.requeue(job_id, h.clock.now()).await.unwrap();
        assert_eq!(requeued.status, JobStatus::Pending);
        assert_eq!(requeued.attempts, 3);

        h.writer.succeed();
        let report = h.worker.run_once(10).await.unwrap();
        assert_eq!(report.done, 1);
        let job = h.ledger.get_job(job_id).await.unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Done);
        assert_eq!(job.attempts, 4);
        assert!(h.ledger.get_loan(LOAN_A).await.unwrap().unwrap().on_chain_tx.is_some());
    }

    #[tokio::test]
    async fn test_reserved_topics_fail_without_writer_call() {
        let h = harness(retry_config(2));
        let job_id = h
            .ledger
            .enqueue(NewOutboxJob::record_repayment(LOAN_A, 500, "NGN"), t0())
            .await
            .unwrap();

        assert_eq!(h.worker.run_once(10).await.unwrap().retried, 1);
        h.clock.advance(ChronoDuration::seconds(10));
        assert_eq!(h.worker.run_once(10).await.unwrap().failed, 1);

        let job = h.ledger.get_job(job_id).await.unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Failed);
        assert_eq!(job.last_error.as_deref(), Some("unsupported_topic"));
        assert!(h.writer.calls().is_empty());
    }

    #[tokio::test]
    async fn test_crashed_claim_is_reclaimed_after_lease() {
        let h = harness(retry_config(5));
        let job_id = open_loan(h.ledger.as_ref(), LOAN_A, 100_000).await;

        // A worker claims the job and dies before resolving it.
        let claimed = h.ledger.claim_pending(10, h.clock.now()).await.unwrap();
        assert_eq!(claimed.len(), 1);

        h.clock.advance(ChronoDuration::seconds(30));
        let report = h.worker.run_once(10).await.unwrap();
        assert_eq!((report.reclaimed, report.claimed), (0, 0));

        h.clock.advance(ChronoDuration::seconds(31));
        let report = h.worker.run_once(10).await.unwrap();
        assert_eq!((report.reclaimed, report.done), (1, 1));

        let job = h.ledger.get_job(job_id).await.unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Done);
        assert_eq!(job.attempts, 2);
        assert_ne!(job.last_error.as_deref(), Some(LEASE_EXPIRED));
    }

    #[tokio::test]
    async fn test_chain_confirmation_is_not_overwritten() {
        let h = harness(WorkerConfig::default());
        open_loan(h.ledger.as_ref(), LOAN_A, 100_000).await;

        // The projector saw the registration before the worker ran.
        h.ledger
            .apply_loan_registered(LOAN_A, "0xfromchain", t0())
            .await
            .unwrap();

        assert_eq!(h.worker.run_once(10).await.unwrap().done, 1);
        let loan = h.ledger.get_loan(LOAN_A).await.unwrap().unwrap();
        assert!(loan.on_chain_confirmed);
        assert_eq!(loan.on_chain_tx.as_deref(), Some("0xfromchain"));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_parallel_workers_never_share_a_job() {
        let h = harness(WorkerConfig::default());
        for i in 0..24 {
            open_loan(h.ledger.as_ref(), &format!("loan-{i}"), 1_000).await;
        }

        let second = Arc::new(OutboxWorker::new(
            h.ledger.clone(),
            h.ledger.clone(),
            h.writer.clone(),
            h.clock.clone(),
            WorkerConfig::default(),
        ));
        let first = Arc::new(h.worker);

        let mut tasks = Vec::new();
        for worker in [first.clone(), second.clone(), first, second] {
            tasks.push(tokio::spawn(async move { worker.run_once(5).await.unwrap() }));
        }
        let mut done = 0;
        for task in tasks {
            done += task.await.unwrap().done;
        }
        assert_eq!(done, 20);

        let calls = h.writer.calls();
        let loans: HashSet<String> = calls
            .into_iter()
            .map(|call| match call {
                WriterCall::RegisterLoan(loan_id) => loan_id,
                other => panic!("unexpected call {other:?}"),
            })
            .collect();
        assert_eq!(loans.len(), 20);
    }
}
