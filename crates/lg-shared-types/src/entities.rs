//! # Core Domain Entities
//!
//! ## Clusters
//!
//! - **Ledger**: [`Loan`], [`LoanStatus`]
//! - **Chain read-back**: [`ChainEvent`], [`NewChainEvent`], [`ChainEventKind`]
//!   and the normalized payloads stored in `raw_data`

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

// =============================================================================
// CLUSTER A: THE LEDGER
// =============================================================================

/// Lifecycle of a loan on the read side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum LoanStatus {
    /// Open and accruing repayments.
    #[default]
    Active,
    /// Repayments cover the principal.
    Repaid,
    /// Terminal; never overridden by later repayments.
    Defaulted,
}

impl LoanStatus {
    /// Stable lowercase name.
    pub fn as_str(&self) -> &'static str {
        match self {
            LoanStatus::Active => "active",
            LoanStatus::Repaid => "repaid",
            LoanStatus::Defaulted => "defaulted",
        }
    }
}

impl fmt::Display for LoanStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The loan aggregate shared by the outbox worker and the event projector.
///
/// The worker writes only the submission fields; the projector writes the
/// confirmation, repayment and status fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Loan {
    pub id: String,
    pub borrower_id: String,
    pub principal_minor: i64,
    pub currency_code: String,
    pub status: LoanStatus,
    pub amount_repaid_minor: i64,
    pub on_chain_tx: Option<String>,
    pub on_chain_confirmed: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Loan {
    /// A freshly originated, active loan with nothing on chain yet.
    pub fn new(
        id: impl Into<String>,
        borrower_id: impl Into<String>,
        principal_minor: i64,
        currency_code: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: id.into(),
            borrower_id: borrower_id.into(),
            principal_minor,
            currency_code: currency_code.into(),
            status: LoanStatus::Active,
            amount_repaid_minor: 0,
            on_chain_tx: None,
            on_chain_confirmed: false,
            created_at: now,
            updated_at: now,
        }
    }

    /// Record a submitted (not yet confirmed) registration transaction.
    ///
    /// Returns `false` and leaves the loan untouched when the projector has
    /// already confirmed a registration.
    pub fn record_submission(&mut self, tx_hash: &str, now: DateTime<Utc>) -> bool {
        if self.on_chain_confirmed {
            return false;
        }
        self.on_chain_tx = Some(tx_hash.to_string());
        self.on_chain_confirmed = false;
        self.updated_at = now;
        true
    }

    /// Registration observed on chain.
    pub fn confirm_registration(&mut self, tx_hash: &str, now: DateTime<Utc>) {
        self.on_chain_tx = Some(tx_hash.to_string());
        self.on_chain_confirmed = true;
        self.updated_at = now;
    }

    /// Add a repayment; flips to `Repaid` once the principal is covered.
    ///
    /// Defaulted loans are closed: the repayment is dropped and `false`
    /// returned.
    pub fn apply_repayment(&mut self, amount_minor: i64, now: DateTime<Utc>) -> bool {
        if self.status == LoanStatus::Defaulted {
            return false;
        }
        self.amount_repaid_minor = self.amount_repaid_minor.saturating_add(amount_minor);
        if self.status == LoanStatus::Active && self.amount_repaid_minor >= self.principal_minor {
            self.status = LoanStatus::Repaid;
        }
        self.updated_at = now;
        true
    }

    /// Default an active loan. Returns whether the status changed.
    pub fn apply_default(&mut self, now: DateTime<Utc>) -> bool {
        if self.status != LoanStatus::Active {
            return false;
        }
        self.status = LoanStatus::Defaulted;
        self.updated_at = now;
        true
    }
}

// =============================================================================
// CLUSTER B: CHAIN READ-BACK
// =============================================================================

/// Identifier of a stored chain event; ascending id = insertion order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EventId(pub u64);

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The loan registry events the bridge understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChainEventKind {
    LoanRegistered,
    RepaymentRecorded,
    LoanDefaulted,
}

impl ChainEventKind {
    /// All known kinds.
    pub const ALL: [ChainEventKind; 3] = [
        ChainEventKind::LoanRegistered,
        ChainEventKind::RepaymentRecorded,
        ChainEventKind::LoanDefaulted,
    ];

    /// Name stored in `ChainEvent::event_name`.
    pub fn as_str(&self) -> &'static str {
        match self {
            ChainEventKind::LoanRegistered => "LoanRegistered",
            ChainEventKind::RepaymentRecorded => "RepaymentRecorded",
            ChainEventKind::LoanDefaulted => "LoanDefaulted",
        }
    }

    /// Canonical Solidity signature hashed into the event topic.
    pub fn signature(&self) -> &'static str {
        match self {
            ChainEventKind::LoanRegistered => {
                "LoanRegistered(bytes32,bytes32,address,uint256,uint256,string)"
            }
            ChainEventKind::RepaymentRecorded => {
                "RepaymentRecorded(bytes32,bytes32,uint256,uint256,uint256)"
            }
            ChainEventKind::LoanDefaulted => "LoanDefaulted(bytes32,bytes32,uint256)",
        }
    }

    /// Resolve a stored event name.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.as_str() == name.trim())
    }
}

impl fmt::Display for ChainEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A decoded log ready to be stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewChainEvent {
    pub contract_address: String,
    pub event_name: String,
    pub tx_hash: String,
    pub block_number: u64,
    pub log_index: u64,
    pub raw_data: serde_json::Value,
}

impl NewChainEvent {
    /// Natural key: one stored event per `(contract, tx, log index)`.
    pub fn natural_key(&self) -> String {
        format!(
            "{}|{}|{}",
            self.contract_address, self.tx_hash, self.log_index
        )
    }
}

/// A stored chain event awaiting (or done with) projection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChainEvent {
    pub id: EventId,
    pub contract_address: String,
    pub event_name: String,
    pub tx_hash: String,
    pub block_number: u64,
    pub log_index: u64,
    pub raw_data: serde_json::Value,
    pub processed: bool,
}

impl ChainEvent {
    /// Materialize a stored row from its insert form.
    pub fn from_new(id: EventId, event: NewChainEvent) -> Self {
        Self {
            id,
            contract_address: event.contract_address,
            event_name: event.event_name,
            tx_hash: event.tx_hash,
            block_number: event.block_number,
            log_index: event.log_index,
            raw_data: event.raw_data,
            processed: false,
        }
    }
}

/// Result of inserting a chain event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    /// A new row was written.
    Inserted(EventId),
    /// The natural key already existed; nothing was written.
    Duplicate(EventId),
}

/// Normalized `LoanRegistered` payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct LoanRegisteredData {
    pub loan_id: String,
    pub loan_id_bytes32: String,
    pub borrower_id_bytes32: String,
    pub principal_minor: i64,
    pub maturity_ts: i64,
    /// Empty when the event's string field could not be read.
    pub currency_code: String,
}

/// Normalized `RepaymentRecorded` payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct RepaymentRecordedData {
    pub loan_id: String,
    pub loan_id_bytes32: String,
    pub borrower_id_bytes32: String,
    pub amount_minor: i64,
    pub total_repaid_minor: i64,
    pub timestamp: i64,
}

/// Normalized `LoanDefaulted` payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct LoanDefaultedData {
    pub loan_id: String,
    pub loan_id_bytes32: String,
    pub borrower_id_bytes32: String,
    pub timestamp: i64,
}
