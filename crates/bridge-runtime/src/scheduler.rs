//! # Polling Loops
//!
//! Each component runs on its own fixed-interval loop. A loop never overlaps
//! with itself: the next tick starts only after the previous run returned or
//! hit the run timeout. Run reports are turned into Prometheus samples here,
//! so the component crates stay free of metrics code.

use crate::container::{Ingestion, Projector, Worker};
use anyhow::Result;
use async_trait::async_trait;
use lg_04_ingestion::IngestionOutcome;
use lg_telemetry::metrics::{
    INGESTION_CURSOR_BLOCK, INGESTION_EVENTS, INGESTION_SAFE_HEAD_BLOCK, OUTBOX_JOBS,
    OUTBOX_LEASES_RECLAIMED, PROJECTOR_EVENTS, RUN_FAILURES,
};
use lg_telemetry::RunTimer;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

/// One run of a polled component.
#[async_trait]
pub trait Tick: Send + Sync {
    /// Metric label and log field.
    fn component(&self) -> &'static str;

    async fn tick(&self) -> Result<()>;
}

/// Drains the outbox.
pub struct WorkerTick {
    pub worker: Arc<Worker>,
    pub batch_size: usize,
}

#[async_trait]
impl Tick for WorkerTick {
    fn component(&self) -> &'static str {
        "worker"
    }

    async fn tick(&self) -> Result<()> {
        let report = self.worker.run_once(self.batch_size).await?;

        OUTBOX_LEASES_RECLAIMED.inc_by(report.reclaimed as u64);
        OUTBOX_JOBS.with_label_values(&["done"]).inc_by(report.done as u64);
        OUTBOX_JOBS.with_label_values(&["retry"]).inc_by(report.retried as u64);
        OUTBOX_JOBS.with_label_values(&["failed"]).inc_by(report.failed as u64);

        if report.claimed > 0 || report.reclaimed > 0 {
            info!(
                reclaimed = report.reclaimed,
                claimed = report.claimed,
                done = report.done,
                retried = report.retried,
                failed = report.failed,
                "[lg-03] Outbox pass complete"
            );
        }
        Ok(())
    }
}

/// Scans the next block range.
pub struct IngestionTick {
    pub ingestion: Arc<Ingestion>,
}

#[async_trait]
impl Tick for IngestionTick {
    fn component(&self) -> &'static str {
        "ingestion"
    }

    async fn tick(&self) -> Result<()> {
        match self.ingestion.run_once().await? {
            IngestionOutcome::ChainTooYoung { latest } => {
                debug!(latest, "[lg-04] Chain shorter than confirmation lag");
            }
            IngestionOutcome::UpToDate { safe_head, .. } => {
                INGESTION_SAFE_HEAD_BLOCK.set(gauge(safe_head));
            }
            IngestionOutcome::Advanced(report) => {
                INGESTION_SAFE_HEAD_BLOCK.set(gauge(report.safe_head));
                INGESTION_CURSOR_BLOCK.set(gauge(report.to_block));
                for (outcome, count) in [
                    ("inserted", report.inserted),
                    ("duplicate", report.duplicates),
                    ("removed", report.removed_skipped),
                    ("unrecognized", report.unrecognized_skipped),
                ] {
                    INGESTION_EVENTS
                        .with_label_values(&[outcome])
                        .inc_by(count as u64);
                }
            }
        }
        Ok(())
    }
}

/// Applies stored chain events.
pub struct ProjectorTick {
    pub projector: Arc<Projector>,
    pub batch_size: usize,
}

#[async_trait]
impl Tick for ProjectorTick {
    fn component(&self) -> &'static str {
        "projector"
    }

    async fn tick(&self) -> Result<()> {
        let report = self.projector.run_once(self.batch_size).await?;
        for (outcome, count) in [
            ("registered", report.registered),
            ("repayment", report.repayments),
            ("default", report.defaults),
            ("ignored", report.ignored),
            ("unmatched", report.unmatched),
        ] {
            PROJECTOR_EVENTS
                .with_label_values(&[outcome])
                .inc_by(count as u64);
        }
        Ok(())
    }
}

fn gauge(block: u64) -> i64 {
    i64::try_from(block).unwrap_or(i64::MAX)
}

/// Run one tick under `run_timeout`. Returns whether it succeeded.
///
/// Failures and timeouts are logged and counted; the next tick retries.
pub async fn run_tick(tick: &dyn Tick, run_timeout: Duration) -> bool {
    let component = tick.component();
    let _timer = RunTimer::start(component);

    match tokio::time::timeout(run_timeout, tick.tick()).await {
        Ok(Ok(())) => true,
        Ok(Err(e)) => {
            RUN_FAILURES.with_label_values(&[component]).inc();
            warn!(component, error = %e, "[lg-bridge] Run failed");
            false
        }
        Err(_) => {
            RUN_FAILURES.with_label_values(&[component]).inc();
            warn!(
                component,
                timeout_ms = run_timeout.as_millis() as u64,
                "[lg-bridge] Run timed out"
            );
            false
        }
    }
}

/// Spawn a loop that ticks every `interval` until `shutdown` flips to true
/// or its sender is dropped. An in-flight run is allowed to finish.
pub fn spawn_loop(
    tick: Arc<dyn Tick>,
    interval: Duration,
    run_timeout: Duration,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let component = tick.component();
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!(
            component,
            interval_ms = interval.as_millis() as u64,
            "[lg-bridge] Loop started"
        );

        loop {
            if *shutdown.borrow() {
                break;
            }
            tokio::select! {
                _ = ticker.tick() => {
                    run_tick(tick.as_ref(), run_timeout).await;
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        info!(component, "[lg-bridge] Loop stopped");
    })
}
