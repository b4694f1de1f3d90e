//! # Event Topics
//!
//! Topic 0 of a log is the Keccak-256 hash of the event signature.

use lg_shared_types::ChainEventKind;
use sha3::{Digest, Keccak256};

/// `0x`-prefixed lowercase Keccak-256 of `signature`.
pub fn event_topic(signature: &str) -> String {
    let mut hasher = Keccak256::new();
    hasher.update(signature.as_bytes());
    format!("0x{}", hex::encode(hasher.finalize()))
}

/// Precomputed topic hashes of the consumed events.
#[derive(Debug, Clone)]
pub struct EventTopics {
    entries: Vec<(ChainEventKind, String)>,
}

impl EventTopics {
    pub fn new() -> Self {
        Self {
            entries: ChainEventKind::ALL
                .into_iter()
                .map(|kind| (kind, event_topic(kind.signature())))
                .collect(),
        }
    }

    /// All topic hashes, for the `eth_getLogs` position-0 filter.
    pub fn all(&self) -> Vec<String> {
        self.entries.iter().map(|(_, topic)| topic.clone()).collect()
    }

    /// Case-insensitive lookup of a topic 0 value.
    pub fn kind_of(&self, topic0: &str) -> Option<ChainEventKind> {
        let topic0 = topic0.trim().to_ascii_lowercase();
        self.entries
            .iter()
            .find(|(_, topic)| *topic == topic0)
            .map(|(kind, _)| *kind)
    }

    pub fn topic_of(&self, kind: ChainEventKind) -> String {
        self.entries
            .iter()
            .find(|(k, _)| *k == kind)
            .map(|(_, topic)| topic.clone())
            .unwrap_or_else(|| event_topic(kind.signature()))
    }
}

impl Default for EventTopics {
    fn default() -> Self {
        Self::new()
    }
}
