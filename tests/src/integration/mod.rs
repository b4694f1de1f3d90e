//! Cross-crate integration flows.

#[cfg(test)]
mod fixtures;

mod indexer_flow;
mod outbox_flow;
mod runtime_flow;
