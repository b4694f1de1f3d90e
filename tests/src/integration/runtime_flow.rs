//! # Runtime Flow
//!
//! The container is built from environment-style configuration in real
//! writer mode, with ingestion enabled, against an in-process JSON-RPC node.
//! One `once` pass submits the registration, then reads it back from the
//! chain and projects it.

#[cfg(test)]
mod tests {
    use crate::integration::fixtures::*;
    use bridge_runtime::{BridgeConfig, BridgeContainer, BridgeRuntime};
    use lg_01_chain_rpc::test_utils::RpcStub;
    use lg_03_outbox::{JobStatus, OutboxStore};
    use lg_05_projector::LoanReadModel;
    use lg_shared_types::LoanStatus;
    use serde_json::{json, Value};
    use std::collections::HashMap;

    fn config(rpc_url: &str) -> BridgeConfig {
        let env: HashMap<&str, String> = HashMap::from([
            ("LG_CHAIN_RPC_URL", rpc_url.to_string()),
            ("LG_CONTRACT_ADDRESS", CONTRACT.to_string()),
            ("LG_WRITER_MODE", "real".to_string()),
            ("LG_WRITER_FROM_ADDRESS", SENDER.to_string()),
            ("LG_INDEXER_INGEST_ENABLED", "true".to_string()),
            ("LG_INDEXER_START_BLOCK", "100".to_string()),
        ]);
        let config = BridgeConfig::from_lookup(|key| env.get(key).cloned()).unwrap();
        config.validate().unwrap();
        config
    }

    /// Node at head 105 holding a registration and a full repayment.
    fn node(req: &Value) -> Value {
        match req["method"].as_str() {
            Some("eth_sendTransaction") => RpcStub::result(req, json!("0xfeed01")),
            Some("eth_blockNumber") => RpcStub::result(req, json!("0x69")),
            Some("eth_getLogs") => RpcStub::result(
                req,
                json!([
                    raw_log(&registered_log(LOAN_A, 250_000, 101, 0)),
                    raw_log(&repayment_log(LOAN_A, 250_000, 250_000, 102, 3)),
                ]),
            ),
            _ => RpcStub::error(req, -32601, "method not found"),
        }
    }

    fn methods(stub: &RpcStub) -> Vec<String> {
        stub.requests()
            .iter()
            .filter_map(|r| r["method"].as_str().map(str::to_string))
            .collect()
    }

    #[tokio::test]
    async fn test_once_submits_then_projects_from_chain() {
        let stub = RpcStub::start(node).await;
        let container = BridgeContainer::build(config(&stub.url()), clock()).unwrap();
        let ledger = container.ledger.clone();
        let job_id = open_loan(ledger.as_ref(), LOAN_A, 250_000).await;

        let runtime = BridgeRuntime::new(container);
        assert!(runtime.run_once().await);

        assert_eq!(
            methods(&stub),
            vec!["eth_sendTransaction", "eth_blockNumber", "eth_getLogs"]
        );
        let send = &stub.requests()[0]["params"][0];
        assert_eq!(send["from"], SENDER);
        assert_eq!(send["to"], CONTRACT);

        let job = ledger.get_job(job_id).await.unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Done);

        // The chain's registration replaces the submitted hash.
        let loan = ledger.get_loan(LOAN_A).await.unwrap().unwrap();
        assert!(loan.on_chain_confirmed);
        assert_eq!(loan.on_chain_tx.as_deref(), Some("0x00650000"));
        assert_eq!(loan.status, LoanStatus::Repaid);

        let passport = ledger.get_passport(BORROWER).await.unwrap().unwrap();
        assert_eq!(passport.credit_score, 850);

        // Second pass: outbox empty, chain up to date, nothing to project.
        assert!(runtime.run_once().await);
        let methods = methods(&stub);
        assert_eq!(methods.len(), 4);
        assert_eq!(methods[3], "eth_blockNumber");
    }

    #[tokio::test]
    async fn test_node_errors_are_retried_not_fatal() {
        let stub = RpcStub::start(|req| match req["method"].as_str() {
            Some("eth_sendTransaction") => RpcStub::error(req, -32000, "insufficient funds"),
            _ => RpcStub::error(req, -32603, "node syncing"),
        })
        .await;
        let container = BridgeContainer::build(config(&stub.url()), clock()).unwrap();
        let ledger = container.ledger.clone();
        let job_id = open_loan(ledger.as_ref(), LOAN_A, 250_000).await;

        // The job failure is recorded on the job; the ingestion failure fails the pass.
        let runtime = BridgeRuntime::new(container);
        assert!(!runtime.run_once().await);

        let job = ledger.get_job(job_id).await.unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Pending);
        assert_eq!(job.attempts, 1);
        assert!(job.last_error.unwrap().contains("insufficient funds"));

        let loan = ledger.get_loan(LOAN_A).await.unwrap().unwrap();
        assert_eq!(loan.on_chain_tx, None);
    }
}
