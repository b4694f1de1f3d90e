//! # RocksDB Ledger
//!
//! Durable implementation of every store port.
//!
//! ## Column Families
//!
//! | CF | Key | Value |
//! |----|-----|-------|
//! | `outbox` | job id (u64 BE) | `OutboxJob` JSON |
//! | `outbox_open` | job id (u64 BE) | empty, present while pending/processing |
//! | `loans` | loan id | `Loan` JSON |
//! | `loans_by_borrower` | `borrower \0 loan id` | empty |
//! | `passports` | borrower id | `PassportCache` JSON |
//! | `chain_events` | event id (u64 BE) | `ChainEvent` JSON |
//! | `events_unprocessed` | event id (u64 BE) | empty |
//! | `event_keys` | `contract\|tx\|log_index` | event id (u64 BE) |
//! | `cursors` | cursor key | block (u64 BE) |
//! | `meta` | sequence name | last id (u64 BE) |
//!
//! Every mutation reads under the write lock and commits one `WriteBatch`.

use crate::lock::{DatabaseLock, LockError};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use lg_03_outbox::{
    JobId, JobStatus, LoanIntake, LoanSubmissionStore, NewOutboxJob, OutboxJob, OutboxStore,
};
use lg_04_ingestion::IngestionStore;
use lg_05_projector::{ChainEventStore, LoanReadModel, ProjectionStore};
use lg_shared_types::{
    ChainEvent, EventId, InsertOutcome, Loan, NewChainEvent, PassportCache, StoreError,
};
use parking_lot::RwLock;
use rocksdb::{
    ColumnFamily, ColumnFamilyDescriptor, Direction, IteratorMode, Options, WriteBatch,
    WriteOptions, DB,
};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::PathBuf;
use tracing::info;

pub const CF_OUTBOX: &str = "outbox";
pub const CF_OUTBOX_OPEN: &str = "outbox_open";
pub const CF_LOANS: &str = "loans";
pub const CF_LOANS_BY_BORROWER: &str = "loans_by_borrower";
pub const CF_PASSPORTS: &str = "passports";
pub const CF_CHAIN_EVENTS: &str = "chain_events";
pub const CF_EVENTS_UNPROCESSED: &str = "events_unprocessed";
pub const CF_EVENT_KEYS: &str = "event_keys";
pub const CF_CURSORS: &str = "cursors";
pub const CF_META: &str = "meta";

pub const COLUMN_FAMILIES: &[&str] = &[
    CF_OUTBOX,
    CF_OUTBOX_OPEN,
    CF_LOANS,
    CF_LOANS_BY_BORROWER,
    CF_PASSPORTS,
    CF_CHAIN_EVENTS,
    CF_EVENTS_UNPROCESSED,
    CF_EVENT_KEYS,
    CF_CURSORS,
    CF_META,
];

const SEQ_JOB: &[u8] = b"seq.outbox_job";
const SEQ_EVENT: &[u8] = b"seq.chain_event";

#[derive(Debug, Clone)]
pub struct RocksLedgerConfig {
    pub path: PathBuf,
    /// Block cache size in bytes (default: 64MB)
    pub block_cache_size: usize,
    /// Write buffer size in bytes (default: 16MB)
    pub write_buffer_size: usize,
    /// fsync every batch (default: true)
    pub sync_writes: bool,
}

impl RocksLedgerConfig {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            block_cache_size: 64 * 1024 * 1024,
            write_buffer_size: 16 * 1024 * 1024,
            sync_writes: true,
        }
    }

    /// Small buffers, no fsync.
    pub fn for_testing(path: impl Into<PathBuf>) -> Self {
        Self {
            block_cache_size: 8 * 1024 * 1024,
            write_buffer_size: 4 * 1024 * 1024,
            sync_writes: false,
            ..Self::new(path)
        }
    }
}

pub struct RocksLedger {
    db: RwLock<DB>,
    config: RocksLedgerConfig,
    _lock: DatabaseLock,
}

impl RocksLedger {
    /// Lock the directory, then open or create the database.
    pub fn open(config: RocksLedgerConfig) -> Result<Self, StoreError> {
        let lock = DatabaseLock::acquire(&config.path).map_err(|e: LockError| {
            StoreError::Database(e.to_string())
        })?;

        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);
        opts.set_write_buffer_size(config.write_buffer_size);
        opts.set_compression_type(rocksdb::DBCompressionType::Snappy);

        let mut block_opts = rocksdb::BlockBasedOptions::default();
        block_opts.set_bloom_filter(10.0, false);
        block_opts.set_block_cache(&rocksdb::Cache::new_lru_cache(config.block_cache_size));
        opts.set_block_based_table_factory(&block_opts);

        let cf_descriptors: Vec<ColumnFamilyDescriptor> = COLUMN_FAMILIES
            .iter()
            .map(|name| {
                let mut cf_opts = Options::default();
                cf_opts.set_compression_type(rocksdb::DBCompressionType::Snappy);
                ColumnFamilyDescriptor::new(*name, cf_opts)
            })
            .collect();

        let db = DB::open_cf_descriptors(&opts, &config.path, cf_descriptors)
            .map_err(db_err("open"))?;
        info!("[lg-storage] RocksDB ledger opened at {}", config.path.display());

        Ok(Self {
            db: RwLock::new(db),
            config,
            _lock: lock,
        })
    }

    fn write(&self, db: &DB, batch: WriteBatch) -> Result<(), StoreError> {
        let mut write_opts = WriteOptions::default();
        write_opts.set_sync(self.config.sync_writes);
        db.write_opt(batch, &write_opts).map_err(db_err("batch write"))
    }
}

// =============================================================================
// Encoding helpers
// =============================================================================

fn db_err(op: &'static str) -> impl Fn(rocksdb::Error) -> StoreError {
    move |e| StoreError::Database(format!("RocksDB {op} failed: {e}"))
}

fn cf<'a>(db: &'a DB, name: &str) -> Result<&'a ColumnFamily, StoreError> {
    db.cf_handle(name)
        .ok_or_else(|| StoreError::Database(format!("missing column family {name}")))
}

fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>, StoreError> {
    Ok(serde_json::to_vec(value)?)
}

fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, StoreError> {
    Ok(serde_json::from_slice(bytes)?)
}

fn decode_u64(bytes: &[u8]) -> Result<u64, StoreError> {
    let raw: [u8; 8] = bytes
        .try_into()
        .map_err(|_| StoreError::Serialization(format!("expected 8 bytes, got {}", bytes.len())))?;
    Ok(u64::from_be_bytes(raw))
}

fn borrower_key(borrower_id: &str, loan_id: &str) -> Vec<u8> {
    let mut key = borrower_prefix(borrower_id);
    key.extend_from_slice(loan_id.as_bytes());
    key
}

fn borrower_prefix(borrower_id: &str) -> Vec<u8> {
    let mut key = Vec::with_capacity(borrower_id.len() + 1);
    key.extend_from_slice(borrower_id.as_bytes());
    key.push(0);
    key
}

fn get<T: DeserializeOwned>(db: &DB, cf_name: &str, key: &[u8]) -> Result<Option<T>, StoreError> {
    db.get_cf(cf(db, cf_name)?, key)
        .map_err(db_err("get"))?
        .map(|bytes| decode(&bytes))
        .transpose()
}

fn next_seq(db: &DB, name: &[u8], batch: &mut WriteBatch) -> Result<u64, StoreError> {
    let meta = cf(db, CF_META)?;
    let last = match db.get_cf(meta, name).map_err(db_err("get"))? {
        Some(bytes) => decode_u64(&bytes)?,
        None => 0,
    };
    let next = last + 1;
    batch.put_cf(meta, name, next.to_be_bytes());
    Ok(next)
}

/// Keys of `cf_name` in order, optionally restricted to `prefix`.
fn scan_keys(db: &DB, cf_name: &str, prefix: &[u8]) -> Result<Vec<Vec<u8>>, StoreError> {
    let mode = if prefix.is_empty() {
        IteratorMode::Start
    } else {
        IteratorMode::From(prefix, Direction::Forward)
    };
    let mut keys = Vec::new();
    for item in db.iterator_cf(cf(db, cf_name)?, mode) {
        let (key, _) = item.map_err(db_err("scan"))?;
        if !key.starts_with(prefix) {
            break;
        }
        keys.push(key.to_vec());
    }
    Ok(keys)
}

fn load_job(db: &DB, id: JobId) -> Result<OutboxJob, StoreError> {
    get(db, CF_OUTBOX, &id.0.to_be_bytes())?.ok_or(StoreError::JobNotFound { job_id: id.0 })
}

fn load_loan(db: &DB, loan_id: &str) -> Result<Loan, StoreError> {
    get(db, CF_LOANS, loan_id.as_bytes())?.ok_or_else(|| StoreError::LoanNotFound {
        loan_id: loan_id.to_string(),
    })
}

fn borrower_loans(db: &DB, borrower_id: &str) -> Result<Vec<Loan>, StoreError> {
    let prefix = borrower_prefix(borrower_id);
    let mut loans = Vec::new();
    for key in scan_keys(db, CF_LOANS_BY_BORROWER, &prefix)? {
        let loan_id = String::from_utf8_lossy(&key[prefix.len()..]).into_owned();
        loans.push(load_loan(db, &loan_id)?);
    }
    Ok(loans)
}

/// Stage `job` and keep `outbox_open` in step with its status.
fn put_job(db: &DB, batch: &mut WriteBatch, job: &OutboxJob) -> Result<(), StoreError> {
    let key = job.id.0.to_be_bytes();
    batch.put_cf(cf(db, CF_OUTBOX)?, key, encode(job)?);
    let open = cf(db, CF_OUTBOX_OPEN)?;
    match job.status {
        JobStatus::Pending | JobStatus::Processing => batch.put_cf(open, key, b""),
        JobStatus::Done | JobStatus::Failed => batch.delete_cf(open, key),
    }
    Ok(())
}

fn put_loan(db: &DB, batch: &mut WriteBatch, loan: &Loan) -> Result<(), StoreError> {
    batch.put_cf(cf(db, CF_LOANS)?, loan.id.as_bytes(), encode(loan)?);
    Ok(())
}

impl RocksLedger {
    fn resolve<F>(&self, id: JobId, apply: F) -> Result<OutboxJob, StoreError>
    where
        F: FnOnce(&mut OutboxJob) -> Result<(), StoreError>,
    {
        let db = self.db.write();
        let mut job = load_job(&db, id)?;
        apply(&mut job)?;
        let mut batch = WriteBatch::default();
        put_job(&db, &mut batch, &job)?;
        self.write(&db, batch)?;
        Ok(job)
    }

    fn update_loan<T, F>(&self, loan_id: &str, apply: F) -> Result<T, StoreError>
    where
        F: FnOnce(&mut Loan) -> T,
    {
        let db = self.db.write();
        let mut loan = load_loan(&db, loan_id)?;
        let out = apply(&mut loan);
        let mut batch = WriteBatch::default();
        put_loan(&db, &mut batch, &loan)?;
        self.write(&db, batch)?;
        Ok(out)
    }
}

#[async_trait]
impl OutboxStore for RocksLedger {
    async fn enqueue(&self, job: NewOutboxJob, now: DateTime<Utc>) -> Result<JobId, StoreError> {
        let db = self.db.write();
        let mut batch = WriteBatch::default();
        let id = JobId(next_seq(&db, SEQ_JOB, &mut batch)?);
        put_job(&db, &mut batch, &OutboxJob::new(id, job, now))?;
        self.write(&db, batch)?;
        Ok(id)
    }

    async fn claim_pending(
        &self,
        limit: usize,
        now: DateTime<Utc>,
    ) -> Result<Vec<OutboxJob>, StoreError> {
        let db = self.db.write();
        let mut batch = WriteBatch::default();
        let mut claimed = Vec::new();
        for key in scan_keys(&db, CF_OUTBOX_OPEN, &[])? {
            if claimed.len() >= limit {
                break;
            }
            let mut job = load_job(&db, JobId(decode_u64(&key)?))?;
            if job.is_claimable(now) {
                job.claim(now);
                put_job(&db, &mut batch, &job)?;
                claimed.push(job);
            }
        }
        if !claimed.is_empty() {
            self.write(&db, batch)?;
        }
        Ok(claimed)
    }

    async fn mark_done(&self, id: JobId, now: DateTime<Utc>) -> Result<(), StoreError> {
        self.resolve(id, |job| job.complete(now)).map(|_| ())
    }

    async fn mark_retry(
        &self,
        id: JobId,
        available_at: DateTime<Utc>,
        last_error: &str,
        now: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        self.resolve(id, |job| job.retry(available_at, last_error, now))
            .map(|_| ())
    }

    async fn mark_failed(
        &self,
        id: JobId,
        last_error: &str,
        now: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        self.resolve(id, |job| job.fail(last_error, now)).map(|_| ())
    }

    async fn reclaim_expired(
        &self,
        cutoff: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<Vec<JobId>, StoreError> {
        let db = self.db.write();
        let mut batch = WriteBatch::default();
        let mut reclaimed = Vec::new();
        for key in scan_keys(&db, CF_OUTBOX_OPEN, &[])? {
            let mut job = load_job(&db, JobId(decode_u64(&key)?))?;
            if job.lease_expired(cutoff) {
                job.release_lease(now);
                put_job(&db, &mut batch, &job)?;
                reclaimed.push(job.id);
            }
        }
        if !reclaimed.is_empty() {
            self.write(&db, batch)?;
        }
        Ok(reclaimed)
    }

    async fn get_job(&self, id: JobId) -> Result<Option<OutboxJob>, StoreError> {
        let db = self.db.read();
        get(&db, CF_OUTBOX, &id.0.to_be_bytes())
    }

    async fn list_jobs(
        &self,
        status: Option<JobStatus>,
        limit: usize,
    ) -> Result<Vec<OutboxJob>, StoreError> {
        let db = self.db.read();
        let mut jobs = Vec::new();
        for item in db.iterator_cf(cf(&db, CF_OUTBOX)?, IteratorMode::Start) {
            if jobs.len() >= limit {
                break;
            }
            let (_, value) = item.map_err(db_err("scan"))?;
            let job: OutboxJob = decode(&value)?;
            if status.map_or(true, |s| job.status == s) {
                jobs.push(job);
            }
        }
        Ok(jobs)
    }

    async fn requeue(&self, id: JobId, now: DateTime<Utc>) -> Result<OutboxJob, StoreError> {
        self.resolve(id, |job| job.requeue(now))
    }
}

#[async_trait]
impl LoanSubmissionStore for RocksLedger {
    async fn set_on_chain_submission(
        &self,
        loan_id: &str,
        tx_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        self.update_loan(loan_id, |loan| loan.record_submission(tx_hash, now))
            .map(|_| ())
    }
}

#[async_trait]
impl LoanIntake for RocksLedger {
    async fn open_loan(
        &self,
        loan: Loan,
        job: NewOutboxJob,
        now: DateTime<Utc>,
    ) -> Result<JobId, StoreError> {
        let db = self.db.write();
        if get::<Loan>(&db, CF_LOANS, loan.id.as_bytes())?.is_some() {
            return Err(StoreError::DuplicateLoan { loan_id: loan.id });
        }
        let mut batch = WriteBatch::default();
        put_loan(&db, &mut batch, &loan)?;
        batch.put_cf(
            cf(&db, CF_LOANS_BY_BORROWER)?,
            borrower_key(&loan.borrower_id, &loan.id),
            b"",
        );
        let id = JobId(next_seq(&db, SEQ_JOB, &mut batch)?);
        put_job(&db, &mut batch, &OutboxJob::new(id, job, now))?;
        self.write(&db, batch)?;
        Ok(id)
    }
}

#[async_trait]
impl IngestionStore for RocksLedger {
    async fn get_cursor(&self, key: &str) -> Result<Option<u64>, StoreError> {
        let db = self.db.read();
        db.get_cf(cf(&db, CF_CURSORS)?, key.as_bytes())
            .map_err(db_err("get"))?
            .map(|bytes| decode_u64(&bytes))
            .transpose()
    }

    async fn set_cursor(&self, key: &str, block_number: u64) -> Result<(), StoreError> {
        let db = self.db.write();
        let cursors = cf(&db, CF_CURSORS)?;
        if let Some(bytes) = db.get_cf(cursors, key.as_bytes()).map_err(db_err("get"))? {
            let stored = decode_u64(&bytes)?;
            if block_number < stored {
                return Err(StoreError::CursorRegression {
                    key: key.to_string(),
                    stored,
                    attempted: block_number,
                });
            }
        }
        let mut batch = WriteBatch::default();
        batch.put_cf(cursors, key.as_bytes(), block_number.to_be_bytes());
        self.write(&db, batch)
    }

    async fn insert_chain_event(
        &self,
        event: NewChainEvent,
    ) -> Result<InsertOutcome, StoreError> {
        let db = self.db.write();
        let keys = cf(&db, CF_EVENT_KEYS)?;
        let natural_key = event.natural_key();
        if let Some(bytes) = db
            .get_cf(keys, natural_key.as_bytes())
            .map_err(db_err("get"))?
        {
            return Ok(InsertOutcome::Duplicate(EventId(decode_u64(&bytes)?)));
        }

        let mut batch = WriteBatch::default();
        let id = EventId(next_seq(&db, SEQ_EVENT, &mut batch)?);
        let id_key = id.0.to_be_bytes();
        batch.put_cf(keys, natural_key.as_bytes(), id_key);
        batch.put_cf(
            cf(&db, CF_CHAIN_EVENTS)?,
            id_key,
            encode(&ChainEvent::from_new(id, event))?,
        );
        batch.put_cf(cf(&db, CF_EVENTS_UNPROCESSED)?, id_key, b"");
        self.write(&db, batch)?;
        Ok(InsertOutcome::Inserted(id))
    }
}

#[async_trait]
impl ChainEventStore for RocksLedger {
    async fn list_unprocessed(&self, limit: usize) -> Result<Vec<ChainEvent>, StoreError> {
        let db = self.db.read();
        let mut events = Vec::new();
        for key in scan_keys(&db, CF_EVENTS_UNPROCESSED, &[])?.into_iter().take(limit) {
            let event = get(&db, CF_CHAIN_EVENTS, &key)?.ok_or(StoreError::EventNotFound {
                event_id: decode_u64(&key)?,
            })?;
            events.push(event);
        }
        Ok(events)
    }

    async fn mark_processed(&self, id: EventId) -> Result<(), StoreError> {
        let db = self.db.write();
        let key = id.0.to_be_bytes();
        let mut event: ChainEvent = get(&db, CF_CHAIN_EVENTS, &key)?
            .ok_or(StoreError::EventNotFound { event_id: id.0 })?;
        event.processed = true;
        let mut batch = WriteBatch::default();
        batch.put_cf(cf(&db, CF_CHAIN_EVENTS)?, key, encode(&event)?);
        batch.delete_cf(cf(&db, CF_EVENTS_UNPROCESSED)?, key);
        self.write(&db, batch)
    }
}

#[async_trait]
impl ProjectionStore for RocksLedger {
    async fn apply_loan_registered(
        &self,
        loan_id: &str,
        tx_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        self.update_loan(loan_id, |loan| loan.confirm_registration(tx_hash, now))
    }

    async fn apply_repayment(
        &self,
        loan_id: &str,
        amount_minor: i64,
        now: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        self.update_loan(loan_id, |loan| loan.apply_repayment(amount_minor, now))
    }

    async fn apply_default(&self, loan_id: &str, now: DateTime<Utc>) -> Result<bool, StoreError> {
        self.update_loan(loan_id, |loan| loan.apply_default(now))
    }

    async fn refresh_passport_by_loan(
        &self,
        loan_id: &str,
        now: DateTime<Utc>,
    ) -> Result<PassportCache, StoreError> {
        let db = self.db.write();
        let borrower_id = load_loan(&db, loan_id)?.borrower_id;
        let loans = borrower_loans(&db, &borrower_id)?;
        let passport = PassportCache::summarize(&borrower_id, &loans, now);
        let mut batch = WriteBatch::default();
        batch.put_cf(
            cf(&db, CF_PASSPORTS)?,
            borrower_id.as_bytes(),
            encode(&passport)?,
        );
        self.write(&db, batch)?;
        Ok(passport)
    }
}

#[async_trait]
impl LoanReadModel for RocksLedger {
    async fn get_loan(&self, loan_id: &str) -> Result<Option<Loan>, StoreError> {
        let db = self.db.read();
        get(&db, CF_LOANS, loan_id.as_bytes())
    }

    async fn get_passport(&self, borrower_id: &str) -> Result<Option<PassportCache>, StoreError> {
        let db = self.db.read();
        get(&db, CF_PASSPORTS, borrower_id.as_bytes())
    }

    async fn loans_for_borrower(&self, borrower_id: &str) -> Result<Vec<Loan>, StoreError> {
        let db = self.db.read();
        let mut loans = borrower_loans(&db, borrower_id)?;
        loans.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(loans)
    }
}
