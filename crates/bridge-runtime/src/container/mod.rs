//! # Bridge Container
//!
//! Owns the ledger and every component built on top of it. All services
//! share one `Arc<dyn Ledger>`, so the same store backs the outbox, the
//! loan table, the chain events and the projections.

pub mod config;

pub use config::{
    BridgeConfig, ChainConfig, ConfigError, IndexerConfig, RuntimeConfig, StorageBackend,
    StorageConfig, WorkerSettings,
};

use anyhow::{Context, Result};
use lg_01_chain_rpc::{JsonRpcLogClient, LogRpcClient};
use lg_02_chain_writer::{ChainWriter, LoanRegistryWriter};
use lg_03_outbox::OutboxWorker;
use lg_04_ingestion::IngestionService;
use lg_05_projector::EventProjector;
use lg_shared_types::Clock;
use lg_storage::{Ledger, MemoryLedger};
use std::sync::Arc;
use tracing::info;

pub type Worker = OutboxWorker<dyn Ledger, dyn Ledger, dyn LoanRegistryWriter>;
pub type Ingestion = IngestionService<dyn Ledger, dyn LogRpcClient>;
pub type Projector = EventProjector<dyn Ledger, dyn Ledger>;

/// Wired bridge components.
pub struct BridgeContainer {
    pub config: BridgeConfig,
    pub clock: Arc<dyn Clock>,
    pub ledger: Arc<dyn Ledger>,
    pub worker: Arc<Worker>,
    /// `None` unless ingestion is enabled.
    pub ingestion: Option<Arc<Ingestion>>,
    pub projector: Arc<Projector>,
}

impl BridgeContainer {
    /// Open the configured ledger and build the chain-facing adapters.
    ///
    /// The writer mode is resolved here, once; an invalid mode or a
    /// missing real-mode setting fails startup.
    pub fn build(config: BridgeConfig, clock: Arc<dyn Clock>) -> Result<Self> {
        let ledger = open_ledger(&config.storage)?;

        let writer = ChainWriter::from_config(&config.writer_config(), clock.clone())
            .context("Failed to build chain writer")?;
        info!(mode = ?writer.mode(), "[lg-02] Chain writer ready");

        let rpc: Option<Arc<dyn LogRpcClient>> = if config.indexer.ingest_enabled {
            let client = JsonRpcLogClient::connect(config.chain.rpc_url.clone())
                .context("Failed to build chain RPC client")?;
            Some(Arc::new(client))
        } else {
            None
        };

        Ok(Self::assemble(config, ledger, Arc::new(writer), rpc, clock))
    }

    /// Wire components over already-built adapters.
    pub fn assemble(
        config: BridgeConfig,
        ledger: Arc<dyn Ledger>,
        writer: Arc<dyn LoanRegistryWriter>,
        rpc: Option<Arc<dyn LogRpcClient>>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let worker = Arc::new(OutboxWorker::new(
            ledger.clone(),
            ledger.clone(),
            writer,
            clock.clone(),
            config.worker_config(),
        ));

        let ingestion = rpc.map(|rpc| {
            Arc::new(IngestionService::new(
                ledger.clone(),
                rpc,
                config.ingestion_config(),
            ))
        });

        let projector = Arc::new(EventProjector::new(
            ledger.clone(),
            ledger.clone(),
            clock.clone(),
        ));

        Self {
            config,
            clock,
            ledger,
            worker,
            ingestion,
            projector,
        }
    }
}

fn open_ledger(storage: &StorageConfig) -> Result<Arc<dyn Ledger>> {
    match storage.backend {
        StorageBackend::Memory => {
            info!("[lg-storage] Using in-memory ledger (state is lost on exit)");
            Ok(Arc::new(MemoryLedger::new()))
        }
        #[cfg(feature = "rocksdb")]
        StorageBackend::RocksDb => {
            use lg_storage::{RocksLedger, RocksLedgerConfig};

            let ledger = RocksLedger::open(RocksLedgerConfig::new(&storage.data_dir))
                .with_context(|| {
                    format!("Failed to open ledger at {}", storage.data_dir.display())
                })?;
            info!(path = ?storage.data_dir, "[lg-storage] RocksDB ledger opened");
            Ok(Arc::new(ledger))
        }
        #[cfg(not(feature = "rocksdb"))]
        StorageBackend::RocksDb => Err(ConfigError::RocksDbUnavailable.into()),
    }
}
