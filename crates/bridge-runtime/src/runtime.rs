//! # Bridge Runtime
//!
//! Starts one loop per enabled component plus the optional metrics
//! endpoint, and stops them together on shutdown.

use crate::container::BridgeContainer;
use crate::metrics_server;
use crate::scheduler::{run_tick, spawn_loop, IngestionTick, ProjectorTick, Tick, WorkerTick};
use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info};

/// The bridge process: container, loops and shutdown signal.
pub struct BridgeRuntime {
    container: Arc<BridgeContainer>,
    handles: Vec<JoinHandle<()>>,
    shutdown_tx: watch::Sender<bool>,
    shutdown_rx: watch::Receiver<bool>,
}

impl BridgeRuntime {
    pub fn new(container: BridgeContainer) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        Self {
            container: Arc::new(container),
            handles: Vec::new(),
            shutdown_tx,
            shutdown_rx,
        }
    }

    pub fn container(&self) -> Arc<BridgeContainer> {
        Arc::clone(&self.container)
    }

    /// Enabled components with their poll interval, in pipeline order.
    fn ticks(&self) -> Vec<(Arc<dyn Tick>, Duration)> {
        let c = &self.container;
        let mut ticks: Vec<(Arc<dyn Tick>, Duration)> = vec![(
            Arc::new(WorkerTick {
                worker: c.worker.clone(),
                batch_size: c.config.worker.batch_size,
            }),
            c.config.worker.poll_interval,
        )];
        if let Some(ingestion) = &c.ingestion {
            ticks.push((
                Arc::new(IngestionTick {
                    ingestion: ingestion.clone(),
                }),
                c.config.indexer.poll_interval,
            ));
        }
        ticks.push((
            Arc::new(ProjectorTick {
                projector: c.projector.clone(),
                batch_size: c.config.indexer.projector_batch_size,
            }),
            c.config.indexer.poll_interval,
        ));
        ticks
    }

    /// Spawn every loop and, when `metrics_port` is set, the metrics server.
    pub async fn start(&mut self, metrics_port: Option<u16>) -> Result<()> {
        let config = &self.container.config;
        info!("===========================================");
        info!("  LoanGraph Chain Bridge v{}", crate::VERSION);
        info!("===========================================");
        info!(mode = ?config.chain.writer_mode, "Writer mode");
        info!(enabled = config.indexer.ingest_enabled, "Ingestion");
        info!(backend = ?config.storage.backend, data_dir = ?config.storage.data_dir, "Storage");

        if let Some(port) = metrics_port {
            let addr = SocketAddr::from(([0, 0, 0, 0], port));
            let listener = TcpListener::bind(addr)
                .await
                .with_context(|| format!("Failed to bind metrics endpoint on {addr}"))?;
            let shutdown = self.shutdown_rx.clone();
            self.handles.push(tokio::spawn(async move {
                if let Err(e) = metrics_server::serve(listener, shutdown).await {
                    error!("[lg-telemetry] Metrics endpoint failed: {}", e);
                }
            }));
        }

        let run_timeout = self.container.config.runtime.run_timeout;
        for (tick, interval) in self.ticks() {
            self.handles.push(spawn_loop(
                tick,
                interval,
                run_timeout,
                self.shutdown_rx.clone(),
            ));
        }

        info!("All bridge loops running");
        Ok(())
    }

    /// One pass of each enabled component. Returns whether every run
    /// succeeded.
    pub async fn run_once(&self) -> bool {
        let run_timeout = self.container.config.runtime.run_timeout;
        let mut ok = true;
        for (tick, _) in self.ticks() {
            ok &= run_tick(tick.as_ref(), run_timeout).await;
        }
        ok
    }

    /// Signal every loop to stop and wait for in-flight runs to finish.
    pub async fn shutdown(self) {
        info!("Initiating graceful shutdown...");
        if let Err(e) = self.shutdown_tx.send(true) {
            error!("Failed to send shutdown signal: {}", e);
        }
        for handle in self.handles {
            if let Err(e) = handle.await {
                error!("Bridge task ended abnormally: {}", e);
            }
        }
        info!("Shutdown complete");
    }
}
