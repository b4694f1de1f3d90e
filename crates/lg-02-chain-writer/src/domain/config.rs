//! # Writer Configuration

use super::errors::WriterError;

/// Gas limit used when none (or 0) is configured.
pub const DEFAULT_GAS_LIMIT: u64 = 300_000;

/// Which writer implementation to build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WriterMode {
    #[default]
    Stub,
    Real,
}

impl WriterMode {
    /// Case-insensitive; empty means stub.
    pub fn parse(raw: &str) -> Result<Self, WriterError> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "" | "stub" => Ok(WriterMode::Stub),
            "real" => Ok(WriterMode::Real),
            _ => Err(WriterError::InvalidMode(raw.to_string())),
        }
    }
}

/// Inputs to [`crate::ChainWriter::from_config`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriterConfig {
    pub mode: WriterMode,
    pub rpc_url: String,
    pub from_address: String,
    pub contract_address: String,
    pub gas_limit: u64,
}

impl Default for WriterConfig {
    fn default() -> Self {
        Self {
            mode: WriterMode::Stub,
            rpc_url: String::new(),
            from_address: String::new(),
            contract_address: String::new(),
            gas_limit: DEFAULT_GAS_LIMIT,
        }
    }
}
