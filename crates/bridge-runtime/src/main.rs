//! # lg-bridge
//!
//! Entry point of the LoanGraph chain bridge.
//!
//! ```text
//! lg-bridge [run]                     # all loops until Ctrl+C
//! lg-bridge once                      # one pass of each enabled component
//! lg-bridge jobs --status failed      # inspect the outbox
//! lg-bridge requeue 42                # retry a failed job
//! ```
//!
//! `jobs` and `requeue` open the ledger themselves, so with the RocksDB
//! backend they must run while the bridge is stopped.

use anyhow::{bail, Context, Result};
use bridge_runtime::container::StorageBackend;
use bridge_runtime::{BridgeConfig, BridgeContainer, BridgeRuntime};
use clap::{Parser, Subcommand};
use lg_03_outbox::{JobId, JobStatus, OutboxJob, OutboxStore};
use lg_shared_types::{Clock, SystemClock};
use lg_telemetry::{init_telemetry, TelemetryConfig};
use std::sync::Arc;
use tracing::{info, warn};

/// LoanGraph chain bridge: outbox worker, log ingestion and projection
#[derive(Parser, Debug)]
#[command(name = "lg-bridge")]
#[command(about = "Outbox worker and chain-log indexer for the LoanGraph ledger", version)]
struct Args {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run every enabled loop until Ctrl+C (default)
    Run,

    /// Run one pass of each enabled component and exit
    Once,

    /// List outbox jobs in id order
    Jobs {
        /// Only jobs in this status (pending, processing, done, failed)
        #[arg(short, long, value_parser = parse_status)]
        status: Option<JobStatus>,

        /// Maximum number of jobs to print
        #[arg(short, long, default_value = "20")]
        limit: usize,

        /// One JSON object per line instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Move a failed job back to pending
    Requeue {
        /// Job id as printed by `jobs`
        job_id: u64,
    },
}

fn parse_status(raw: &str) -> Result<JobStatus, String> {
    JobStatus::parse(raw).ok_or_else(|| format!("unknown job status {raw:?}"))
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let telemetry = TelemetryConfig::from_env();
    let _telemetry = init_telemetry(&telemetry).context("Failed to initialize telemetry")?;

    let config = BridgeConfig::from_env().context("Invalid configuration")?;
    config.validate().context("Invalid configuration")?;

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let container = BridgeContainer::build(config, clock).context("Failed to wire bridge")?;

    match args.command.unwrap_or(Command::Run) {
        Command::Run => run(container, telemetry.metrics_port).await,
        Command::Once => {
            if !BridgeRuntime::new(container).run_once().await {
                bail!("One or more runs failed");
            }
            Ok(())
        }
        Command::Jobs {
            status,
            limit,
            json,
        } => list_jobs(&container, status, limit, json).await,
        Command::Requeue { job_id } => requeue(&container, JobId(job_id)).await,
    }
}

async fn run(container: BridgeContainer, metrics_port: Option<u16>) -> Result<()> {
    let mut runtime = BridgeRuntime::new(container);
    runtime.start(metrics_port).await?;

    info!("Bridge is running. Press Ctrl+C to stop.");
    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl+C")?;

    runtime.shutdown().await;
    Ok(())
}

async fn list_jobs(
    container: &BridgeContainer,
    status: Option<JobStatus>,
    limit: usize,
    json: bool,
) -> Result<()> {
    warn_if_ephemeral(container);
    let jobs = container.ledger.list_jobs(status, limit).await?;
    for job in &jobs {
        if json {
            println!("{}", serde_json::to_string(job)?);
        } else {
            println!("{}", job_line(job));
        }
    }
    if !json {
        println!("{} job(s)", jobs.len());
    }
    Ok(())
}

async fn requeue(container: &BridgeContainer, id: JobId) -> Result<()> {
    warn_if_ephemeral(container);
    let now = container.clock.now();
    let job = container
        .ledger
        .requeue(id, now)
        .await
        .with_context(|| format!("Failed to requeue job {id}"))?;
    println!("{}", job_line(&job));
    Ok(())
}

fn job_line(job: &OutboxJob) -> String {
    format!(
        "{:>8}  {:<10}  {:<16}  attempts={}  available_at={}  last_error={}",
        job.id.0,
        job.status.as_str(),
        job.topic,
        job.attempts,
        job.available_at.to_rfc3339(),
        job.last_error.as_deref().unwrap_or("-"),
    )
}

fn warn_if_ephemeral(container: &BridgeContainer) {
    if container.config.storage.backend == StorageBackend::Memory {
        warn!("In-memory ledger: this process sees only its own jobs");
    }
}
