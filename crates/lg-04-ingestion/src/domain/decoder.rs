//! # Log Decoder
//!
//! Maps a raw log to a [`NewChainEvent`]. Unknown topics are skipped;
//! recognized logs without their indexed topics are errors. Bad data
//! sections decode as zeros.

use super::abi::{normalize_bytes32, project_loan_id, AbiData};
use super::errors::DecodeError;
use super::topics::EventTopics;
use lg_01_chain_rpc::LogEntry;
use lg_shared_types::{
    ChainEventKind, LoanDefaultedData, LoanRegisteredData, NewChainEvent, RepaymentRecordedData,
};
use serde::Serialize;

/// Indexed ids every consumed event carries in topics 1 and 2.
struct IndexedIds {
    loan_id: String,
    loan_id_bytes32: String,
    borrower_id_bytes32: String,
}

/// `Ok(None)` for logs that are not loan registry events.
pub fn decode_log(
    log: &LogEntry,
    topics: &EventTopics,
) -> Result<Option<NewChainEvent>, DecodeError> {
    let Some(kind) = log.topics.first().and_then(|t| topics.kind_of(t)) else {
        return Ok(None);
    };
    let event = kind.as_str();
    let ids = indexed_ids(event, &log.topics)?;
    let data = AbiData::parse(event, &log.data);

    let raw_data = match kind {
        ChainEventKind::LoanRegistered => {
            let [principal_minor, maturity_ts] = data.int64_words::<2>();
            encode(
                event,
                LoanRegisteredData {
                    loan_id: ids.loan_id,
                    loan_id_bytes32: ids.loan_id_bytes32,
                    borrower_id_bytes32: ids.borrower_id_bytes32,
                    principal_minor,
                    maturity_ts,
                    currency_code: data.string_at(2).unwrap_or_default(),
                },
            )?
        }
        ChainEventKind::RepaymentRecorded => {
            let [amount_minor, total_repaid_minor, timestamp] = data.int64_words::<3>();
            encode(
                event,
                RepaymentRecordedData {
                    loan_id: ids.loan_id,
                    loan_id_bytes32: ids.loan_id_bytes32,
                    borrower_id_bytes32: ids.borrower_id_bytes32,
                    amount_minor,
                    total_repaid_minor,
                    timestamp,
                },
            )?
        }
        ChainEventKind::LoanDefaulted => {
            let [timestamp] = data.int64_words::<1>();
            encode(
                event,
                LoanDefaultedData {
                    loan_id: ids.loan_id,
                    loan_id_bytes32: ids.loan_id_bytes32,
                    borrower_id_bytes32: ids.borrower_id_bytes32,
                    timestamp,
                },
            )?
        }
    };

    Ok(Some(NewChainEvent {
        contract_address: log.address.trim().to_ascii_lowercase(),
        event_name: event.to_string(),
        tx_hash: log.transaction_hash.trim().to_ascii_lowercase(),
        block_number: log.block_number,
        log_index: log.log_index,
        raw_data,
    }))
}

fn indexed_ids(event: &'static str, topics: &[String]) -> Result<IndexedIds, DecodeError> {
    if topics.len() < 3 {
        return Err(DecodeError::MissingIndexedTopics {
            event,
            got: topics.len(),
        });
    }
    let loan_id_bytes32 = normalize_bytes32(&topics[1]);
    Ok(IndexedIds {
        loan_id: project_loan_id(&loan_id_bytes32),
        loan_id_bytes32,
        borrower_id_bytes32: normalize_bytes32(&topics[2]),
    })
}

fn encode<T: Serialize>(event: &'static str, data: T) -> Result<serde_json::Value, DecodeError> {
    serde_json::to_value(data).map_err(|e| DecodeError::Encode {
        event,
        reason: e.to_string(),
    })
}
