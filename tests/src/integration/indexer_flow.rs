//! # Indexer Flow
//!
//! Registry logs are scanned behind the confirmation lag, stored once per
//! natural key, then projected onto loans and credit passports.

#[cfg(test)]
mod tests {
    use crate::integration::fixtures::*;
    use lg_01_chain_rpc::{LogEntry, MockLogRpc};
    use lg_04_ingestion::{
        IngestionConfig, IngestionError, IngestionOutcome, IngestionService, IngestionStore,
        DEFAULT_CURSOR_KEY,
    };
    use lg_05_projector::{ChainEventStore, EventProjector, LoanReadModel};
    use lg_shared_types::LoanStatus;
    use lg_storage::MemoryLedger;
    use std::sync::Arc;

    struct Harness {
        ledger: Arc<MemoryLedger>,
        rpc: Arc<MockLogRpc>,
        ingestion: IngestionService<MemoryLedger, MockLogRpc>,
        projector: EventProjector<MemoryLedger, MemoryLedger>,
    }

    fn config() -> IngestionConfig {
        IngestionConfig {
            contract_address: CONTRACT.into(),
            start_block: 100,
            ..Default::default()
        }
    }

    fn harness(head: u64, logs: Vec<LogEntry>) -> Harness {
        let ledger = Arc::new(MemoryLedger::new());
        let rpc = Arc::new(MockLogRpc::new(head).with_logs(logs));
        let ingestion = IngestionService::new(ledger.clone(), rpc.clone(), config());
        let projector = EventProjector::new(ledger.clone(), ledger.clone(), clock());
        Harness {
            ledger,
            rpc,
            ingestion,
            projector,
        }
    }

    fn advanced(outcome: IngestionOutcome) -> lg_04_ingestion::IngestionReport {
        match outcome {
            IngestionOutcome::Advanced(report) => report,
            other => panic!("expected the cursor to advance, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_registration_and_full_repayment() {
        let registered = registered_log(LOAN_A, 100_000, 101, 0);
        let h = harness(
            105,
            vec![
                registered.clone(),
                repayment_log(LOAN_A, 60_000, 60_000, 102, 0),
                repayment_log(LOAN_A, 40_000, 100_000, 103, 1),
            ],
        );
        open_loan(h.ledger.as_ref(), LOAN_A, 100_000).await;

        let report = advanced(h.ingestion.run_once().await.unwrap());
        assert_eq!((report.from_block, report.to_block), (100, 103));
        assert_eq!(report.inserted, 3);
        assert_eq!(
            h.ledger.get_cursor(DEFAULT_CURSOR_KEY).await.unwrap(),
            Some(103)
        );

        let projected = h.projector.run_once(100).await.unwrap();
        assert_eq!((projected.registered, projected.repayments), (1, 2));
        assert!(h.ledger.list_unprocessed(100).await.unwrap().is_empty());

        let loan = h.ledger.get_loan(LOAN_A).await.unwrap().unwrap();
        assert!(loan.on_chain_confirmed);
        assert_eq!(loan.on_chain_tx.as_deref(), Some(registered.transaction_hash.as_str()));
        assert_eq!(loan.status, LoanStatus::Repaid);
        assert_eq!(loan.amount_repaid_minor, 100_000);

        let passport = h.ledger.get_passport(BORROWER).await.unwrap().unwrap();
        assert_eq!(passport.total_loans, 1);
        assert_eq!(passport.total_repaid, 1);
        assert_eq!(passport.cumulative_repaid_minor, 100_000);
        assert_eq!(passport.credit_score, 850);
    }

    #[tokio::test]
    async fn test_confirmation_lag_defers_recent_logs() {
        let h = harness(105, vec![repayment_log(LOAN_A, 500, 500, 104, 0)]);

        let report = advanced(h.ingestion.run_once().await.unwrap());
        assert_eq!(report.to_block, 103);
        assert_eq!(report.inserted, 0);

        // Same head: nothing new below it.
        assert_eq!(
            h.ingestion.run_once().await.unwrap(),
            IngestionOutcome::UpToDate {
                from_block: 104,
                safe_head: 103
            }
        );

        h.rpc.set_head(106);
        let report = advanced(h.ingestion.run_once().await.unwrap());
        assert_eq!((report.from_block, report.to_block), (104, 104));
        assert_eq!(report.inserted, 1);
    }

    #[tokio::test]
    async fn test_rescanned_range_is_not_applied_twice() {
        let h = harness(
            105,
            vec![
                registered_log(LOAN_A, 100_000, 101, 0),
                repayment_log(LOAN_A, 30_000, 30_000, 102, 0),
            ],
        );
        open_loan(h.ledger.as_ref(), LOAN_A, 100_000).await;

        assert_eq!(advanced(h.ingestion.run_once().await.unwrap()).inserted, 2);

        // A second scanner over the same blocks, e.g. after a cursor reset.
        let rescan = IngestionService::new(
            h.ledger.clone(),
            h.rpc.clone(),
            IngestionConfig {
                cursor_key: "indexer.rescan".into(),
                ..config()
            },
        );
        let report = advanced(rescan.run_once().await.unwrap());
        assert_eq!((report.inserted, report.duplicates), (0, 2));

        h.projector.run_once(100).await.unwrap();
        assert_eq!(h.projector.run_once(100).await.unwrap().fetched, 0);
        let loan = h.ledger.get_loan(LOAN_A).await.unwrap().unwrap();
        assert_eq!(loan.amount_repaid_minor, 30_000);
        assert_eq!(loan.status, LoanStatus::Active);
    }

    #[tokio::test]
    async fn test_default_lowers_borrower_score() {
        let h = harness(
            105,
            vec![
                registered_log(LOAN_A, 100_000, 101, 0),
                registered_log(LOAN_B, 100_000, 101, 1),
                repayment_log(LOAN_A, 100_000, 100_000, 102, 0),
                defaulted_log(LOAN_B, 103, 0),
            ],
        );
        open_loan(h.ledger.as_ref(), LOAN_A, 100_000).await;
        open_loan(h.ledger.as_ref(), LOAN_B, 100_000).await;

        advanced(h.ingestion.run_once().await.unwrap());
        let projected = h.projector.run_once(100).await.unwrap();
        assert_eq!(
            (projected.registered, projected.repayments, projected.defaults),
            (2, 1, 1)
        );

        let loan_b = h.ledger.get_loan(LOAN_B).await.unwrap().unwrap();
        assert_eq!(loan_b.status, LoanStatus::Defaulted);

        let passport = h.ledger.get_passport(BORROWER).await.unwrap().unwrap();
        assert_eq!(passport.total_loans, 2);
        assert_eq!(passport.total_repaid, 1);
        assert_eq!(passport.total_defaulted, 1);
        assert_eq!(passport.credit_score, 535);
        assert_eq!(h.ledger.loans_for_borrower(BORROWER).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_zero_amount_repayment_stops_projection() {
        let h = harness(
            105,
            vec![
                registered_log(LOAN_A, 100_000, 101, 0),
                repayment_log(LOAN_A, 0, 0, 102, 0),
                repayment_log(LOAN_A, 100, 100, 103, 0),
            ],
        );
        open_loan(h.ledger.as_ref(), LOAN_A, 100_000).await;
        advanced(h.ingestion.run_once().await.unwrap());

        assert!(h.projector.run_once(100).await.is_err());
        // The registration before the bad event was applied and marked.
        let pending = h.ledger.list_unprocessed(100).await.unwrap();
        assert_eq!(pending.len(), 2);
        assert_eq!(pending[0].block_number, 102);
        let loan = h.ledger.get_loan(LOAN_A).await.unwrap().unwrap();
        assert!(loan.on_chain_confirmed);
        assert_eq!(loan.amount_repaid_minor, 0);
    }

    #[tokio::test]
    async fn test_rpc_failure_leaves_cursor_untouched() {
        let h = harness(105, vec![registered_log(LOAN_A, 100_000, 101, 0)]);
        h.rpc.set_failing(true);

        assert!(matches!(
            h.ingestion.run_once().await,
            Err(IngestionError::Rpc(_))
        ));
        assert_eq!(h.ledger.get_cursor(DEFAULT_CURSOR_KEY).await.unwrap(), None);

        h.rpc.set_failing(false);
        assert_eq!(advanced(h.ingestion.run_once().await.unwrap()).inserted, 1);
    }

    #[tokio::test]
    async fn test_log_without_indexed_ids_blocks_the_range() {
        let mut bad = registered_log(LOAN_A, 100_000, 102, 0);
        bad.topics.truncate(1);
        let h = harness(105, vec![registered_log(LOAN_B, 1, 101, 0), bad]);

        assert!(matches!(
            h.ingestion.run_once().await,
            Err(IngestionError::Decode(_))
        ));
        assert_eq!(h.ledger.get_cursor(DEFAULT_CURSOR_KEY).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_address_in_data_does_not_block_ingestion() {
        // Word 0 carries the borrower address as the registry emits it.
        let mut registered = registered_log(LOAN_A, 0, 101, 0);
        registered.data = format!("0x{:0>64}{:064x}", &SENDER[2..], 1_735_689_600u64);
        let h = harness(
            105,
            vec![registered, repayment_log(LOAN_A, 100_000, 100_000, 102, 0)],
        );
        open_loan(h.ledger.as_ref(), LOAN_A, 100_000).await;

        assert_eq!(advanced(h.ingestion.run_once().await.unwrap()).inserted, 2);
        assert_eq!(
            h.ledger.get_cursor(DEFAULT_CURSOR_KEY).await.unwrap(),
            Some(103)
        );

        let projected = h.projector.run_once(100).await.unwrap();
        assert_eq!((projected.registered, projected.repayments), (1, 1));
        let loan = h.ledger.get_loan(LOAN_A).await.unwrap().unwrap();
        assert!(loan.on_chain_confirmed);
        assert_eq!(loan.status, LoanStatus::Repaid);
    }

    #[tokio::test]
    async fn test_repayment_after_default_is_ignored() {
        let h = harness(
            105,
            vec![
                registered_log(LOAN_A, 100_000, 101, 0),
                defaulted_log(LOAN_A, 102, 0),
                repayment_log(LOAN_A, 100_000, 100_000, 103, 0),
            ],
        );
        open_loan(h.ledger.as_ref(), LOAN_A, 100_000).await;

        advanced(h.ingestion.run_once().await.unwrap());
        h.projector.run_once(100).await.unwrap();

        let loan = h.ledger.get_loan(LOAN_A).await.unwrap().unwrap();
        assert_eq!(loan.status, LoanStatus::Defaulted);
        assert_eq!(loan.amount_repaid_minor, 0);
        let passport = h.ledger.get_passport(BORROWER).await.unwrap().unwrap();
        assert_eq!(passport.cumulative_repaid_minor, 0);
        assert_eq!(passport.credit_score, 300);
    }

    #[tokio::test]
    async fn test_registration_of_foreign_loan_does_not_stall_projection() {
        let h = harness(
            105,
            vec![
                registered_log(LOAN_B, 100_000, 101, 0),
                repayment_log(LOAN_A, 100_000, 100_000, 102, 0),
            ],
        );
        // Only loan A was originated here.
        open_loan(h.ledger.as_ref(), LOAN_A, 100_000).await;

        advanced(h.ingestion.run_once().await.unwrap());
        let projected = h.projector.run_once(100).await.unwrap();
        assert_eq!((projected.unmatched, projected.repayments), (1, 1));
        assert!(h.ledger.list_unprocessed(100).await.unwrap().is_empty());
        assert_eq!(h.ledger.get_loan(LOAN_B).await.unwrap(), None);

        let loan = h.ledger.get_loan(LOAN_A).await.unwrap().unwrap();
        assert_eq!(loan.status, LoanStatus::Repaid);
    }

    #[tokio::test]
    async fn test_removed_logs_are_skipped() {
        let mut removed = registered_log(LOAN_A, 100_000, 101, 0);
        removed.removed = true;
        let h = harness(105, vec![removed]);

        let report = advanced(h.ingestion.run_once().await.unwrap());
        assert_eq!((report.removed_skipped, report.inserted), (1, 0));
        assert!(h.ledger.list_unprocessed(10).await.unwrap().is_empty());
    }
}
