//! Ingestion Service - block range scanning behind a confirmation lag

use crate::domain::{decode_log, EventTopics, IngestionError};
use crate::ports::IngestionStore;
use lg_01_chain_rpc::{LogFilter, LogRpcClient};
use lg_shared_types::InsertOutcome;
use std::sync::Arc;
use tracing::{debug, info};

/// Cursor key of the loan registry scan.
pub const DEFAULT_CURSOR_KEY: &str = "indexer.loan_registry.last_block";

/// Blocks per pass when none (or 0) is configured.
pub const DEFAULT_BLOCK_BATCH: u64 = 500;

/// Ingestion configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestionConfig {
    /// Loan registry contract whose logs are scanned.
    pub contract_address: String,
    /// First block scanned when no cursor exists.
    pub start_block: u64,
    pub block_batch_size: u64,
    /// Blocks behind the head that are considered final.
    pub confirmations: u64,
    pub cursor_key: String,
}

impl Default for IngestionConfig {
    fn default() -> Self {
        Self {
            contract_address: String::new(),
            start_block: 0,
            block_batch_size: DEFAULT_BLOCK_BATCH,
            confirmations: 2,
            cursor_key: DEFAULT_CURSOR_KEY.to_string(),
        }
    }
}

/// What one pass did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IngestionOutcome {
    /// Chain shorter than the confirmation lag.
    ChainTooYoung { latest: u64 },
    /// Nothing new below the safe head.
    UpToDate { from_block: u64, safe_head: u64 },
    /// Range scanned and cursor advanced.
    Advanced(IngestionReport),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IngestionReport {
    pub from_block: u64,
    pub to_block: u64,
    pub safe_head: u64,
    pub logs_seen: usize,
    pub removed_skipped: usize,
    pub unrecognized_skipped: usize,
    pub inserted: usize,
    pub duplicates: usize,
}

/// Ingestion service.
pub struct IngestionService<S, R>
where
    S: IngestionStore + ?Sized,
    R: LogRpcClient + ?Sized,
{
    store: Arc<S>,
    rpc: Arc<R>,
    topics: EventTopics,
    config: IngestionConfig,
}

impl<S, R> IngestionService<S, R>
where
    S: IngestionStore + ?Sized,
    R: LogRpcClient + ?Sized,
{
    pub fn new(store: Arc<S>, rpc: Arc<R>, mut config: IngestionConfig) -> Self {
        config.contract_address = config.contract_address.trim().to_string();
        if config.block_batch_size == 0 {
            config.block_batch_size = DEFAULT_BLOCK_BATCH;
        }
        Self {
            store,
            rpc,
            topics: EventTopics::new(),
            config,
        }
    }

    pub fn config(&self) -> &IngestionConfig {
        &self.config
    }

    /// Scan the next block range. The cursor only moves after every log in
    /// the range has been stored.
    pub async fn run_once(&self) -> Result<IngestionOutcome, IngestionError> {
        let latest = self.rpc.block_number().await?;
        let Some(safe_head) = latest.checked_sub(self.config.confirmations) else {
            debug!(
                "[lg-04] Chain head {} below confirmation lag {}",
                latest, self.config.confirmations
            );
            return Ok(IngestionOutcome::ChainTooYoung { latest });
        };

        let cursor = self.store.get_cursor(&self.config.cursor_key).await?;
        let from_block = match cursor {
            Some(last) => match last.checked_add(1) {
                Some(next) => next,
                None => {
                    return Ok(IngestionOutcome::UpToDate {
                        from_block: last,
                        safe_head,
                    })
                }
            },
            None => self.config.start_block,
        };
        if from_block > safe_head {
            return Ok(IngestionOutcome::UpToDate {
                from_block,
                safe_head,
            });
        }

        let to_block = safe_head.min(
            from_block
                .saturating_add(self.config.block_batch_size)
                .saturating_sub(1),
        );
        let filter = LogFilter {
            from_block,
            to_block,
            address: self.config.contract_address.clone(),
            topics: self.topics.all(),
        };
        let logs = self.rpc.get_logs(&filter).await?;

        let mut report = IngestionReport {
            from_block,
            to_block,
            safe_head,
            logs_seen: logs.len(),
            ..Default::default()
        };

        for log in &logs {
            if log.removed {
                report.removed_skipped += 1;
                continue;
            }
            let Some(event) = decode_log(log, &self.topics)? else {
                report.unrecognized_skipped += 1;
                continue;
            };
            match self.store.insert_chain_event(event).await? {
                InsertOutcome::Inserted(_) => report.inserted += 1,
                InsertOutcome::Duplicate(id) => {
                    debug!("[lg-04] Event already stored as {}", id);
                    report.duplicates += 1;
                }
            }
        }

        self.store
            .set_cursor(&self.config.cursor_key, to_block)
            .await?;

        if report.inserted > 0 {
            info!(
                from_block,
                to_block,
                inserted = report.inserted,
                duplicates = report.duplicates,
                "[lg-04] Ingested chain events"
            );
        }
        Ok(IngestionOutcome::Advanced(report))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::DecodeError;
    use crate::ports::MockIngestionStore;
    use lg_01_chain_rpc::{LogEntry, MockLogRpc, RpcError};
    use lg_shared_types::{ChainEventKind, RepaymentRecordedData};

    const CONTRACT: &str = "0x2222222222222222222222222222222222222222";
    const LOAN_TOPIC: &str = "0x7f1c2a9e0b5d4c3e8f7a6b5c4d3e2f1a00000000000000000000000000000000";
    const BORROWER_TOPIC: &str = "0x00000000000000000000000000000000000000000000000000000000000000b1";

    fn config() -> IngestionConfig {
        IngestionConfig {
            contract_address: CONTRACT.into(),
            start_block: 100,
            ..Default::default()
        }
    }

    fn words(values: &[u64]) -> String {
        let mut out = String::from("0x");
        for v in values {
            out.push_str(&format!("{v:064x}"));
        }
        out
    }

    fn repayment_log(block_number: u64, log_index: u64) -> LogEntry {
        LogEntry {
            address: CONTRACT.into(),
            topics: vec![
                EventTopics::new().topic_of(ChainEventKind::RepaymentRecorded),
                LOAN_TOPIC.into(),
                BORROWER_TOPIC.into(),
            ],
            data: words(&[500, 1000, 123]),
            block_number,
            transaction_hash: format!("0xtx{block_number}"),
            log_index,
            removed: false,
        }
    }

    fn service(
        store: &Arc<MockIngestionStore>,
        rpc: &Arc<MockLogRpc>,
        config: IngestionConfig,
    ) -> IngestionService<MockIngestionStore, MockLogRpc> {
        IngestionService::new(store.clone(), rpc.clone(), config)
    }

    #[tokio::test]
    async fn test_first_pass_scans_to_safe_head() {
        let store = Arc::new(MockIngestionStore::new());
        let rpc = Arc::new(MockLogRpc::new(105).with_logs(vec![repayment_log(101, 0)]));

        let outcome = service(&store, &rpc, config()).run_once().await.unwrap();
        let IngestionOutcome::Advanced(report) = outcome else {
            panic!("expected advance");
        };
        assert_eq!((report.from_block, report.to_block), (100, 103));
        assert_eq!(report.inserted, 1);

        let filter = &rpc.filters()[0];
        assert_eq!((filter.from_block, filter.to_block), (100, 103));
        assert_eq!(filter.address, CONTRACT);
        assert_eq!(filter.topics, EventTopics::new().all());
        assert_eq!(store.cursor(DEFAULT_CURSOR_KEY), Some(103));
    }

    #[tokio::test]
    async fn test_stored_repayment_payload() {
        let store = Arc::new(MockIngestionStore::new());
        let rpc = Arc::new(MockLogRpc::new(105).with_logs(vec![repayment_log(101, 0)]));
        service(&store, &rpc, config()).run_once().await.unwrap();

        let event = &store.events()[0];
        assert_eq!(event.event_name, "RepaymentRecorded");
        assert!(!event.processed);
        let data: RepaymentRecordedData =
            serde_json::from_value(event.raw_data.clone()).unwrap();
        assert_eq!(data.loan_id, "7f1c2a9e-0b5d-4c3e-8f7a-6b5c4d3e2f1a");
        assert_eq!(
            (data.amount_minor, data.total_repaid_minor, data.timestamp),
            (500, 1000, 123)
        );
    }

    #[tokio::test]
    async fn test_chain_too_young() {
        let store = Arc::new(MockIngestionStore::new());
        let rpc = Arc::new(MockLogRpc::new(1));
        let outcome = service(&store, &rpc, config()).run_once().await.unwrap();
        assert_eq!(outcome, IngestionOutcome::ChainTooYoung { latest: 1 });
        assert!(rpc.filters().is_empty());
    }

    #[tokio::test]
    async fn test_up_to_date_does_not_query_logs() {
        let store = Arc::new(MockIngestionStore::new());
        store.set_cursor(DEFAULT_CURSOR_KEY, 103).await.unwrap();
        let rpc = Arc::new(MockLogRpc::new(105));

        let outcome = service(&store, &rpc, config()).run_once().await.unwrap();
        assert_eq!(
            outcome,
            IngestionOutcome::UpToDate {
                from_block: 104,
                safe_head: 103
            }
        );
        assert!(rpc.filters().is_empty());
    }

    #[tokio::test]
    async fn test_block_batch_bounds_each_pass() {
        let store = Arc::new(MockIngestionStore::new());
        let rpc = Arc::new(MockLogRpc::new(1_000));
        let svc = service(
            &store,
            &rpc,
            IngestionConfig {
                start_block: 0,
                block_batch_size: 10,
                ..config()
            },
        );

        svc.run_once().await.unwrap();
        svc.run_once().await.unwrap();
        let ranges: Vec<_> = rpc
            .filters()
            .iter()
            .map(|f| (f.from_block, f.to_block))
            .collect();
        assert_eq!(ranges, vec![(0, 9), (10, 19)]);
        assert_eq!(store.cursor(DEFAULT_CURSOR_KEY), Some(19));
    }

    #[tokio::test]
    async fn test_zero_batch_uses_default() {
        let store = Arc::new(MockIngestionStore::new());
        let rpc = Arc::new(MockLogRpc::new(10_000));
        let svc = service(
            &store,
            &rpc,
            IngestionConfig {
                start_block: 0,
                block_batch_size: 0,
                ..config()
            },
        );
        svc.run_once().await.unwrap();
        assert_eq!(rpc.filters()[0].to_block, 499);
    }

    #[tokio::test]
    async fn test_removed_and_unknown_logs_are_skipped() {
        let store = Arc::new(MockIngestionStore::new());
        let mut removed = repayment_log(101, 0);
        removed.removed = true;
        let mut unknown = repayment_log(101, 1);
        unknown.topics[0] = format!("0x{}", "9".repeat(64));
        let rpc = Arc::new(MockLogRpc::new(105).with_logs(vec![removed, unknown]));

        let outcome = service(&store, &rpc, config()).run_once().await.unwrap();
        let IngestionOutcome::Advanced(report) = outcome else {
            panic!("expected advance");
        };
        assert_eq!(report.removed_skipped, 1);
        assert_eq!(report.unrecognized_skipped, 1);
        assert!(store.events().is_empty());
        assert_eq!(store.cursor(DEFAULT_CURSOR_KEY), Some(103));
    }

    #[tokio::test]
    async fn test_decode_failure_keeps_cursor() {
        let store = Arc::new(MockIngestionStore::new());
        let mut bad = repayment_log(102, 0);
        bad.topics.truncate(1);
        let rpc = Arc::new(MockLogRpc::new(105).with_logs(vec![repayment_log(101, 0), bad]));

        let err = service(&store, &rpc, config()).run_once().await.unwrap_err();
        assert!(matches!(
            err,
            IngestionError::Decode(DecodeError::MissingIndexedTopics { .. })
        ));
        assert_eq!(store.cursor(DEFAULT_CURSOR_KEY), None);
    }

    #[tokio::test]
    async fn test_bad_data_is_stored_and_cursor_advances() {
        let store = Arc::new(MockIngestionStore::new());
        let mut oversized = repayment_log(101, 0);
        oversized.data = format!("0x{}{}", "f".repeat(64), &words(&[1000, 123])[2..]);
        let mut misaligned = repayment_log(102, 0);
        misaligned.data = "0x1234".into();
        let rpc = Arc::new(MockLogRpc::new(105).with_logs(vec![oversized, misaligned]));

        let IngestionOutcome::Advanced(report) =
            service(&store, &rpc, config()).run_once().await.unwrap()
        else {
            panic!("expected advance");
        };
        assert_eq!(report.inserted, 2);
        assert_eq!(store.cursor(DEFAULT_CURSOR_KEY), Some(103));

        let amounts: Vec<(i64, i64)> = store
            .events()
            .into_iter()
            .map(|e| {
                let data: RepaymentRecordedData = serde_json::from_value(e.raw_data).unwrap();
                (data.amount_minor, data.total_repaid_minor)
            })
            .collect();
        assert_eq!(amounts, vec![(0, 1000), (0, 0)]);
    }

    #[tokio::test]
    async fn test_rescan_after_failure_deduplicates() {
        let store = Arc::new(MockIngestionStore::new());
        let rpc = Arc::new(MockLogRpc::new(105).with_logs(vec![repayment_log(101, 0)]));
        let svc = service(&store, &rpc, config());

        // Insert succeeds, then the pass fails before the cursor moves.
        let event = decode_log(&repayment_log(101, 0), &EventTopics::new())
            .unwrap()
            .unwrap();
        store.insert_chain_event(event).await.unwrap();

        let IngestionOutcome::Advanced(report) = svc.run_once().await.unwrap() else {
            panic!("expected advance");
        };
        assert_eq!(report.duplicates, 1);
        assert_eq!(report.inserted, 0);
        assert_eq!(store.events().len(), 1);
    }

    #[tokio::test]
    async fn test_rpc_failure_propagates() {
        let store = Arc::new(MockIngestionStore::new());
        let rpc = Arc::new(MockLogRpc::new(105));
        rpc.set_failing(true);
        assert!(matches!(
            service(&store, &rpc, config()).run_once().await,
            Err(IngestionError::Rpc(RpcError::Transport(_)))
        ));
    }

    #[tokio::test]
    async fn test_store_failure_keeps_cursor() {
        let store = Arc::new(MockIngestionStore::new());
        store.set_fail_insert(true);
        let rpc = Arc::new(MockLogRpc::new(105).with_logs(vec![repayment_log(101, 0)]));
        assert!(matches!(
            service(&store, &rpc, config()).run_once().await,
            Err(IngestionError::Store(_))
        ));
        assert_eq!(store.cursor(DEFAULT_CURSOR_KEY), None);
    }

    #[tokio::test]
    async fn test_cursor_continues_from_last_block() {
        let store = Arc::new(MockIngestionStore::new());
        let rpc = Arc::new(MockLogRpc::new(105));
        let svc = service(&store, &rpc, config());
        svc.run_once().await.unwrap();

        rpc.set_head(110);
        rpc.push_log(repayment_log(105, 0));
        let IngestionOutcome::Advanced(report) = svc.run_once().await.unwrap() else {
            panic!("expected advance");
        };
        assert_eq!((report.from_block, report.to_block), (104, 108));
        assert_eq!(report.inserted, 1);
    }
}
