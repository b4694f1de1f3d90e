//! # Outbound Ports
//!
//! Cursor and chain event persistence.

use async_trait::async_trait;
use lg_shared_types::{ChainEvent, EventId, InsertOutcome, NewChainEvent, StoreError};
use parking_lot::Mutex;
use std::collections::HashMap;

#[async_trait]
pub trait IngestionStore: Send + Sync {
    /// Last fully processed block, `None` before the first pass.
    async fn get_cursor(&self, key: &str) -> Result<Option<u64>, StoreError>;

    /// Rejects a value lower than the stored one.
    async fn set_cursor(&self, key: &str, block_number: u64) -> Result<(), StoreError>;

    /// Store an event once per `(contract, tx_hash, log_index)`.
    async fn insert_chain_event(&self, event: NewChainEvent)
        -> Result<InsertOutcome, StoreError>;
}

// =============================================================================
// Mock Implementations for Testing
// =============================================================================

/// In-memory cursor + event table.
#[derive(Default)]
pub struct MockIngestionStore {
    state: Mutex<MockState>,
}

#[derive(Default)]
struct MockState {
    cursors: HashMap<String, u64>,
    events: Vec<ChainEvent>,
    keys: HashMap<String, EventId>,
    fail_insert: bool,
}

impl MockIngestionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<ChainEvent> {
        self.state.lock().events.clone()
    }

    pub fn cursor(&self, key: &str) -> Option<u64> {
        self.state.lock().cursors.get(key).copied()
    }

    pub fn set_fail_insert(&self, fail: bool) {
        self.state.lock().fail_insert = fail;
    }
}

#[async_trait]
impl IngestionStore for MockIngestionStore {
    async fn get_cursor(&self, key: &str) -> Result<Option<u64>, StoreError> {
        Ok(self.cursor(key))
    }

    async fn set_cursor(&self, key: &str, block_number: u64) -> Result<(), StoreError> {
        let mut state = self.state.lock();
        if let Some(stored) = state.cursors.get(key).copied() {
            if block_number < stored {
                return Err(StoreError::CursorRegression {
                    key: key.to_string(),
                    stored,
                    attempted: block_number,
                });
            }
        }
        state.cursors.insert(key.to_string(), block_number);
        Ok(())
    }

    async fn insert_chain_event(
        &self,
        event: NewChainEvent,
    ) -> Result<InsertOutcome, StoreError> {
        let mut state = self.state.lock();
        if state.fail_insert {
            return Err(StoreError::Database("mock insert failure".into()));
        }
        let key = event.natural_key();
        if let Some(id) = state.keys.get(&key) {
            return Ok(InsertOutcome::Duplicate(*id));
        }
        let id = EventId(state.events.len() as u64 + 1);
        state.keys.insert(key, id);
        state.events.push(ChainEvent::from_new(id, event));
        Ok(InsertOutcome::Inserted(id))
    }
}
