//! # Outbound Ports
//!
//! Read-side chain access required by ingestion.

use crate::domain::{LogEntry, LogFilter, RpcError};
use async_trait::async_trait;
use parking_lot::Mutex;

/// Node access used to scan the loan registry's logs.
#[async_trait]
pub trait LogRpcClient: Send + Sync {
    /// Latest block number (`eth_blockNumber`).
    async fn block_number(&self) -> Result<u64, RpcError>;

    /// Logs matching the filter (`eth_getLogs`).
    async fn get_logs(&self, filter: &LogFilter) -> Result<Vec<LogEntry>, RpcError>;
}

// =============================================================================
// Mock Implementations for Testing
// =============================================================================

/// Mock log client for testing.
///
/// Serves logs from memory, limited to the requested block range, and
/// records every filter it receives.
#[derive(Default)]
pub struct MockLogRpc {
    state: Mutex<MockState>,
}

#[derive(Default)]
struct MockState {
    head: u64,
    logs: Vec<LogEntry>,
    should_fail: bool,
    filters: Vec<LogFilter>,
}

impl MockLogRpc {
    /// Mock node whose latest block is `head`.
    pub fn new(head: u64) -> Self {
        let mock = Self::default();
        mock.state.lock().head = head;
        mock
    }

    /// Builder: seed logs.
    pub fn with_logs(self, logs: Vec<LogEntry>) -> Self {
        self.state.lock().logs.extend(logs);
        self
    }

    /// Move the chain head.
    pub fn set_head(&self, head: u64) {
        self.state.lock().head = head;
    }

    /// Append a log.
    pub fn push_log(&self, log: LogEntry) {
        self.state.lock().logs.push(log);
    }

    /// Make every call fail until reset.
    pub fn set_failing(&self, should_fail: bool) {
        self.state.lock().should_fail = should_fail;
    }

    /// Filters passed to `get_logs`, oldest first.
    pub fn filters(&self) -> Vec<LogFilter> {
        self.state.lock().filters.clone()
    }
}

#[async_trait]
impl LogRpcClient for MockLogRpc {
    async fn block_number(&self) -> Result<u64, RpcError> {
        let state = self.state.lock();
        if state.should_fail {
            return Err(RpcError::Transport("Mock failure".to_string()));
        }
        Ok(state.head)
    }

    async fn get_logs(&self, filter: &LogFilter) -> Result<Vec<LogEntry>, RpcError> {
        let mut state = self.state.lock();
        if state.should_fail {
            return Err(RpcError::Transport("Mock failure".to_string()));
        }
        state.filters.push(filter.clone());
        Ok(state
            .logs
            .iter()
            .filter(|log| filter.covers(log.block_number))
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn log_at(block_number: u64) -> LogEntry {
        LogEntry {
            block_number,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_mock_filters_by_range() {
        let mock = MockLogRpc::new(10).with_logs(vec![log_at(1), log_at(5), log_at(9)]);
        let filter = LogFilter {
            from_block: 2,
            to_block: 9,
            address: "0xabc".into(),
            topics: vec![],
        };
        let logs = mock.get_logs(&filter).await.unwrap();
        assert_eq!(logs.len(), 2);
        assert_eq!(mock.filters(), vec![filter]);
    }

    #[tokio::test]
    async fn test_mock_failure() {
        let mock = MockLogRpc::new(10);
        mock.set_failing(true);
        assert!(mock.block_number().await.is_err());
        mock.set_failing(false);
        assert_eq!(mock.block_number().await.unwrap(), 10);
    }
}
