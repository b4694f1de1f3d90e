//! # Bridge Configuration
//!
//! Unified configuration for the worker, the indexer loops and storage.
//!
//! Every field has a default and an `LG_*` environment override. Empty
//! values fall back to the default; values that do not parse are rejected
//! so a typo never silently turns into a default.
//!
//! ## Validation
//!
//! - ingestion needs `LG_CHAIN_RPC_URL` and a valid `LG_CONTRACT_ADDRESS`
//! - `real` writer mode needs the RPC URL and valid from/contract addresses
//! - batch sizes, attempt caps, poll intervals and the run timeout are > 0
//! - the `rocksdb` backend needs a build with the `rocksdb` feature

use lg_02_chain_writer::{WriterConfig, WriterMode, DEFAULT_GAS_LIMIT};
use lg_03_outbox::{RetryPolicy, WorkerConfig};
use lg_04_ingestion::IngestionConfig;
use lg_shared_types::Address;
use std::env;
use std::fmt::Display;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

/// Complete bridge configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BridgeConfig {
    /// Chain endpoint and writer selection.
    pub chain: ChainConfig,
    /// Outbox worker loop.
    pub worker: WorkerSettings,
    /// Ingestion and projector loops.
    pub indexer: IndexerConfig,
    /// Limits shared by every loop.
    pub runtime: RuntimeConfig,
    /// Ledger backend.
    pub storage: StorageConfig,
}

/// Chain endpoint and writer selection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainConfig {
    pub rpc_url: String,
    /// Loan registry contract.
    pub contract_address: String,
    pub writer_mode: WriterMode,
    /// Sender of `eth_sendTransaction` in real mode.
    pub from_address: String,
    pub gas_limit: u64,
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            rpc_url: String::new(),
            contract_address: String::new(),
            writer_mode: WriterMode::Stub,
            from_address: String::new(),
            gas_limit: DEFAULT_GAS_LIMIT,
        }
    }
}

/// Outbox worker loop settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerSettings {
    pub poll_interval: Duration,
    /// Jobs claimed per pass.
    pub batch_size: usize,
    pub max_attempts: u32,
    /// Linear backoff unit between attempts.
    pub backoff_step: Duration,
    /// `None` disables reclaiming stuck `processing` jobs.
    pub lease_timeout: Option<Duration>,
}

impl Default for WorkerSettings {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(2000),
            batch_size: 20,
            max_attempts: 5,
            backoff_step: Duration::from_secs(15),
            lease_timeout: Some(Duration::from_secs(300)),
        }
    }
}

/// Ingestion + projector loop settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexerConfig {
    /// Ingestion only runs when enabled; the projector always runs.
    pub ingest_enabled: bool,
    pub poll_interval: Duration,
    /// Chain events projected per pass.
    pub projector_batch_size: usize,
    /// First block scanned when no cursor is stored.
    pub start_block: u64,
    pub block_batch_size: u64,
    /// Confirmation lag in blocks.
    pub confirmations: u64,
}

impl Default for IndexerConfig {
    fn default() -> Self {
        Self {
            ingest_enabled: false,
            poll_interval: Duration::from_millis(2000),
            projector_batch_size: 100,
            start_block: 0,
            block_batch_size: 500,
            confirmations: 2,
        }
    }
}

/// Limits shared by every loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeConfig {
    /// Upper bound on a single run of any component.
    pub run_timeout: Duration,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            run_timeout: Duration::from_secs(30),
        }
    }
}

/// Ledger backend selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StorageBackend {
    #[default]
    Memory,
    RocksDb,
}

impl FromStr for StorageBackend {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "memory" => Ok(StorageBackend::Memory),
            "rocksdb" => Ok(StorageBackend::RocksDb),
            other => Err(format!("unknown backend {other:?}, expected memory or rocksdb")),
        }
    }
}

/// Storage configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageConfig {
    /// Data directory for the RocksDB ledger and its lock file.
    pub data_dir: PathBuf,
    pub backend: StorageBackend,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data"),
            backend: StorageBackend::Memory,
        }
    }
}

/// Configuration errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("{key}={value:?} is invalid: {reason}")]
    InvalidValue {
        key: &'static str,
        value: String,
        reason: String,
    },

    #[error("{key} is required when {when}")]
    Missing { key: &'static str, when: &'static str },

    #[error("{key} must be greater than zero")]
    Zero { key: &'static str },

    #[error("LG_STORAGE_BACKEND=rocksdb requires a build with the rocksdb feature")]
    RocksDbUnavailable,
}

impl BridgeConfig {
    /// Load configuration from `LG_*` environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) over an arbitrary lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = Lookup(&lookup);
        let d = Self::default();

        let writer_mode = match env.raw("LG_WRITER_MODE") {
            Some(raw) => WriterMode::parse(&raw).map_err(|e| ConfigError::InvalidValue {
                key: "LG_WRITER_MODE",
                value: raw.clone(),
                reason: e.to_string(),
            })?,
            None => d.chain.writer_mode,
        };

        let lease_secs: u64 = env.parse(
            "LG_WORKER_LEASE_TIMEOUT_SECS",
            d.worker.lease_timeout.map_or(0, |t| t.as_secs()),
        )?;

        Ok(Self {
            chain: ChainConfig {
                rpc_url: env.string("LG_CHAIN_RPC_URL", d.chain.rpc_url),
                contract_address: env.string("LG_CONTRACT_ADDRESS", d.chain.contract_address),
                writer_mode,
                from_address: env.string("LG_WRITER_FROM_ADDRESS", d.chain.from_address),
                gas_limit: env.parse("LG_CHAIN_TX_GAS_LIMIT", d.chain.gas_limit)?,
            },
            worker: WorkerSettings {
                poll_interval: env.millis("LG_WORKER_POLL_INTERVAL_MS", d.worker.poll_interval)?,
                batch_size: env.parse("LG_WORKER_BATCH_SIZE", d.worker.batch_size)?,
                max_attempts: env.parse("LG_WORKER_MAX_ATTEMPTS", d.worker.max_attempts)?,
                backoff_step: env.secs("LG_WORKER_BACKOFF_STEP_SECS", d.worker.backoff_step)?,
                lease_timeout: (lease_secs > 0).then(|| Duration::from_secs(lease_secs)),
            },
            indexer: IndexerConfig {
                ingest_enabled: env.flag("LG_INDEXER_INGEST_ENABLED", d.indexer.ingest_enabled)?,
                poll_interval: env.millis("LG_INDEXER_POLL_INTERVAL_MS", d.indexer.poll_interval)?,
                projector_batch_size: env
                    .parse("LG_INDEXER_BATCH_SIZE", d.indexer.projector_batch_size)?,
                start_block: env.parse("LG_INDEXER_START_BLOCK", d.indexer.start_block)?,
                block_batch_size: env
                    .parse("LG_INDEXER_BLOCK_BATCH_SIZE", d.indexer.block_batch_size)?,
                confirmations: env.parse("LG_INDEXER_CONFIRMATIONS", d.indexer.confirmations)?,
            },
            runtime: RuntimeConfig {
                run_timeout: env.secs("LG_RUN_TIMEOUT_SECS", d.runtime.run_timeout)?,
            },
            storage: StorageConfig {
                data_dir: env
                    .raw("LG_DATA_DIR")
                    .map(PathBuf::from)
                    .unwrap_or(d.storage.data_dir),
                backend: env.parse("LG_STORAGE_BACKEND", d.storage.backend)?,
            },
        })
    }

    /// Fail fast on combinations the components cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let positive = [
            ("LG_WORKER_BATCH_SIZE", self.worker.batch_size as u64),
            ("LG_WORKER_MAX_ATTEMPTS", u64::from(self.worker.max_attempts)),
            ("LG_WORKER_POLL_INTERVAL_MS", self.worker.poll_interval.as_millis() as u64),
            ("LG_INDEXER_BATCH_SIZE", self.indexer.projector_batch_size as u64),
            ("LG_INDEXER_BLOCK_BATCH_SIZE", self.indexer.block_batch_size),
            ("LG_INDEXER_POLL_INTERVAL_MS", self.indexer.poll_interval.as_millis() as u64),
            ("LG_RUN_TIMEOUT_SECS", self.runtime.run_timeout.as_secs()),
        ];
        if let Some((key, _)) = positive.iter().find(|(_, value)| *value == 0) {
            return Err(ConfigError::Zero { key });
        }

        if self.indexer.ingest_enabled {
            const WHEN: &str = "LG_INDEXER_INGEST_ENABLED=true";
            require("LG_CHAIN_RPC_URL", &self.chain.rpc_url, WHEN)?;
            require_address("LG_CONTRACT_ADDRESS", &self.chain.contract_address, WHEN)?;
        }

        if self.chain.writer_mode == WriterMode::Real {
            const WHEN: &str = "LG_WRITER_MODE=real";
            require("LG_CHAIN_RPC_URL", &self.chain.rpc_url, WHEN)?;
            require_address("LG_WRITER_FROM_ADDRESS", &self.chain.from_address, WHEN)?;
            require_address("LG_CONTRACT_ADDRESS", &self.chain.contract_address, WHEN)?;
        }

        if self.storage.backend == StorageBackend::RocksDb && !cfg!(feature = "rocksdb") {
            return Err(ConfigError::RocksDbUnavailable);
        }

        Ok(())
    }

    pub fn writer_config(&self) -> WriterConfig {
        WriterConfig {
            mode: self.chain.writer_mode,
            rpc_url: self.chain.rpc_url.clone(),
            from_address: self.chain.from_address.clone(),
            contract_address: self.chain.contract_address.clone(),
            gas_limit: self.chain.gas_limit,
        }
    }

    pub fn worker_config(&self) -> WorkerConfig {
        WorkerConfig {
            retry: RetryPolicy {
                max_attempts: self.worker.max_attempts,
                backoff_step: self.worker.backoff_step,
            },
            lease_timeout: self.worker.lease_timeout,
        }
    }

    pub fn ingestion_config(&self) -> IngestionConfig {
        IngestionConfig {
            contract_address: self.chain.contract_address.clone(),
            start_block: self.indexer.start_block,
            block_batch_size: self.indexer.block_batch_size,
            confirmations: self.indexer.confirmations,
            ..IngestionConfig::default()
        }
    }
}

fn require(key: &'static str, value: &str, when: &'static str) -> Result<(), ConfigError> {
    if value.trim().is_empty() {
        return Err(ConfigError::Missing { key, when });
    }
    Ok(())
}

fn require_address(key: &'static str, value: &str, when: &'static str) -> Result<(), ConfigError> {
    require(key, value, when)?;
    Address::parse(value)
        .map(|_| ())
        .map_err(|e| ConfigError::InvalidValue {
            key,
            value: value.to_string(),
            reason: e.to_string(),
        })
}

/// Typed accessors over an environment lookup.
struct Lookup<'a, F>(&'a F);

impl<F> Lookup<'_, F>
where
    F: Fn(&str) -> Option<String>,
{
    /// Trimmed value; empty counts as unset.
    fn raw(&self, key: &str) -> Option<String> {
        (self.0)(key)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    fn string(&self, key: &str, default: String) -> String {
        self.raw(key).unwrap_or(default)
    }

    fn parse<T>(&self, key: &'static str, default: T) -> Result<T, ConfigError>
    where
        T: FromStr,
        T::Err: Display,
    {
        match self.raw(key) {
            Some(raw) => raw.parse().map_err(|e: T::Err| ConfigError::InvalidValue {
                key,
                value: raw.clone(),
                reason: e.to_string(),
            }),
            None => Ok(default),
        }
    }

    fn millis(&self, key: &'static str, default: Duration) -> Result<Duration, ConfigError> {
        self.parse(key, default.as_millis() as u64)
            .map(Duration::from_millis)
    }

    fn secs(&self, key: &'static str, default: Duration) -> Result<Duration, ConfigError> {
        self.parse(key, default.as_secs()).map(Duration::from_secs)
    }

    fn flag(&self, key: &'static str, default: bool) -> Result<bool, ConfigError> {
        match self.raw(key) {
            Some(raw) => match raw.to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => Ok(true),
                "0" | "false" | "no" | "off" => Ok(false),
                _ => Err(ConfigError::InvalidValue {
                    key,
                    value: raw,
                    reason: "expected true or false".into(),
                }),
            },
            None => Ok(default),
        }
    }
}
