//! Prometheus metrics for the bridge loops.
//!
//! All metrics follow the naming convention: `lg_<component>_<metric>_<unit>`

use lazy_static::lazy_static;
use prometheus::{
    exponential_buckets, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge, Opts,
    Registry, TextEncoder,
};
use std::time::Instant;

use crate::TelemetryError;

lazy_static! {
    /// Global metrics registry
    pub static ref REGISTRY: Registry = Registry::new();

    // =========================================================================
    // OUTBOX WORKER (Subsystem 3)
    // =========================================================================

    /// Resolved jobs by outcome: done/retry/failed
    pub static ref OUTBOX_JOBS: IntCounterVec = IntCounterVec::new(
        Opts::new("lg_outbox_jobs_total", "Outbox jobs resolved by the worker"),
        &["outcome"]
    ).expect("metric creation failed");

    /// Processing jobs returned to pending after their lease ran out
    pub static ref OUTBOX_LEASES_RECLAIMED: IntCounter = IntCounter::new(
        "lg_outbox_leases_reclaimed_total",
        "Stuck outbox claims returned to the queue"
    ).expect("metric creation failed");

    // =========================================================================
    // INGESTION (Subsystem 4)
    // =========================================================================

    /// Logs by outcome: inserted/duplicate/removed/unrecognized
    pub static ref INGESTION_EVENTS: IntCounterVec = IntCounterVec::new(
        Opts::new("lg_ingestion_events_total", "Chain logs seen by ingestion"),
        &["outcome"]
    ).expect("metric creation failed");

    pub static ref INGESTION_CURSOR_BLOCK: IntGauge = IntGauge::new(
        "lg_ingestion_cursor_block",
        "Last block fully ingested"
    ).expect("metric creation failed");

    pub static ref INGESTION_SAFE_HEAD_BLOCK: IntGauge = IntGauge::new(
        "lg_ingestion_safe_head_block",
        "Chain head minus the confirmation lag"
    ).expect("metric creation failed");

    // =========================================================================
    // PROJECTOR (Subsystem 5)
    // =========================================================================

    /// Events by outcome: registered/repayment/default/ignored/unmatched
    pub static ref PROJECTOR_EVENTS: IntCounterVec = IntCounterVec::new(
        Opts::new("lg_projector_events_total", "Chain events projected"),
        &["outcome"]
    ).expect("metric creation failed");

    // =========================================================================
    // RUN LOOPS
    // =========================================================================

    /// Failed or timed-out runs by component: worker/ingestion/projector
    pub static ref RUN_FAILURES: IntCounterVec = IntCounterVec::new(
        Opts::new("lg_run_failures_total", "Runs that returned an error or timed out"),
        &["component"]
    ).expect("metric creation failed");

    pub static ref RUN_DURATION: HistogramVec = HistogramVec::new(
        HistogramOpts::new("lg_run_duration_seconds", "Wall time of one run")
            .buckets(exponential_buckets(0.001, 2.0, 15).expect("valid buckets")),
        &["component"]
    ).expect("metric creation failed");
}

/// Register every bridge metric with [`REGISTRY`]. Safe to call twice.
pub fn register_metrics() -> Result<(), TelemetryError> {
    let metrics: Vec<Box<dyn prometheus::core::Collector>> = vec![
        Box::new(OUTBOX_JOBS.clone()),
        Box::new(OUTBOX_LEASES_RECLAIMED.clone()),
        Box::new(INGESTION_EVENTS.clone()),
        Box::new(INGESTION_CURSOR_BLOCK.clone()),
        Box::new(INGESTION_SAFE_HEAD_BLOCK.clone()),
        Box::new(PROJECTOR_EVENTS.clone()),
        Box::new(RUN_FAILURES.clone()),
        Box::new(RUN_DURATION.clone()),
    ];

    for metric in metrics {
        match REGISTRY.register(metric) {
            Ok(()) | Err(prometheus::Error::AlreadyReg) => {}
            Err(e) => return Err(TelemetryError::MetricsInit(e.to_string())),
        }
    }
    Ok(())
}

/// Encode all metrics as Prometheus text format.
pub fn encode_metrics() -> Result<String, TelemetryError> {
    TextEncoder::new()
        .encode_to_string(&REGISTRY.gather())
        .map_err(|e| TelemetryError::MetricsInit(e.to_string()))
}

/// Observes `lg_run_duration_seconds{component}` on drop.
pub struct RunTimer {
    component: &'static str,
    start: Instant,
}

impl RunTimer {
    pub fn start(component: &'static str) -> Self {
        Self {
            component,
            start: Instant::now(),
        }
    }
}

impl Drop for RunTimer {
    fn drop(&mut self) {
        RUN_DURATION
            .with_label_values(&[self.component])
            .observe(self.start.elapsed().as_secs_f64());
    }
}
