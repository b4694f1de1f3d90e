//! Shared fixtures: a manual clock, loan ids and registry log builders.

use chrono::{DateTime, Utc};
use lg_01_chain_rpc::LogEntry;
use lg_03_outbox::{JobId, LoanIntake, NewOutboxJob};
use lg_04_ingestion::EventTopics;
use lg_shared_types::{ChainEventKind, Loan, ManualClock};
use serde_json::{json, Value};
use std::sync::Arc;

pub const CONTRACT: &str = "0x5fbdb2315678afecb367f032d93f642f64180aa3";
pub const SENDER: &str = "0xf39fd6e51aad88f6f4ce6ab8827279cfffb92266";
pub const BORROWER: &str = "borrower-1";
pub const BORROWER_TOPIC: &str =
    "0x00000000000000000000000000000000000000000000000000000000000000b1";

/// UUIDs so that log topics project back onto the same loan ids.
pub const LOAN_A: &str = "7f1c2a9e-0b5d-4c3e-8f7a-6b5c4d3e2f1a";
pub const LOAN_B: &str = "0c9d7e55-3b1a-4f6e-9d2c-8a7b6c5d4e3f";

pub fn t0() -> DateTime<Utc> {
    DateTime::from_timestamp(1_700_000_000, 0).unwrap()
}

pub fn clock() -> Arc<ManualClock> {
    Arc::new(ManualClock::new(t0()))
}

/// Open a loan and enqueue its registration in one unit of work.
pub async fn open_loan<S>(store: &S, loan_id: &str, principal_minor: i64) -> JobId
where
    S: LoanIntake + ?Sized,
{
    store
        .open_loan(
            Loan::new(loan_id, BORROWER, principal_minor, "NGN", t0()),
            NewOutboxJob::register_loan(loan_id),
            t0(),
        )
        .await
        .unwrap()
}

/// A UUID left-aligned in a bytes32 topic.
pub fn loan_topic(loan_id: &str) -> String {
    format!("0x{}{}", loan_id.replace('-', ""), "0".repeat(32))
}

fn words(values: &[u64]) -> String {
    let mut out = String::from("0x");
    for v in values {
        out.push_str(&format!("{v:064x}"));
    }
    out
}

fn log(kind: ChainEventKind, loan_id: &str, data: &[u64], block: u64, index: u64) -> LogEntry {
    LogEntry {
        address: CONTRACT.into(),
        topics: vec![
            EventTopics::new().topic_of(kind),
            loan_topic(loan_id),
            BORROWER_TOPIC.into(),
        ],
        data: words(data),
        block_number: block,
        transaction_hash: format!("0x{block:04x}{index:04x}"),
        log_index: index,
        removed: false,
    }
}

pub fn registered_log(loan_id: &str, principal: u64, block: u64, index: u64) -> LogEntry {
    log(
        ChainEventKind::LoanRegistered,
        loan_id,
        &[principal, 1_735_689_600],
        block,
        index,
    )
}

pub fn repayment_log(loan_id: &str, amount: u64, total: u64, block: u64, index: u64) -> LogEntry {
    log(
        ChainEventKind::RepaymentRecorded,
        loan_id,
        &[amount, total, 1_700_000_500],
        block,
        index,
    )
}

pub fn defaulted_log(loan_id: &str, block: u64, index: u64) -> LogEntry {
    log(
        ChainEventKind::LoanDefaulted,
        loan_id,
        &[1_700_000_900],
        block,
        index,
    )
}

/// `eth_getLogs` wire shape of a log.
pub fn raw_log(log: &LogEntry) -> Value {
    json!({
        "address": log.address,
        "topics": log.topics,
        "data": log.data,
        "blockNumber": format!("0x{:x}", log.block_number),
        "transactionHash": log.transaction_hash,
        "logIndex": format!("0x{:x}", log.log_index),
        "removed": log.removed,
    })
}
