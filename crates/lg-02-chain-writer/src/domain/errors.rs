//! # Domain Errors

use lg_01_chain_rpc::RpcError;
use lg_shared_types::AddressError;
use thiserror::Error;

/// Chain writer errors.
///
/// Argument errors surface before any network call; construction errors
/// are raised by [`crate::ChainWriter::from_config`] at startup.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WriterError {
    #[error("missing loan id")]
    MissingLoanId,

    #[error("invalid repayment args")]
    InvalidRepaymentArgs,

    #[error("invalid default args")]
    InvalidDefaultArgs,

    #[error("invalid writer mode: {0}")]
    InvalidMode(String),

    #[error("missing chain RPC URL")]
    MissingRpcUrl,

    #[error("invalid writer from address: {0}")]
    InvalidFromAddress(AddressError),

    #[error("invalid contract address: {0}")]
    InvalidContractAddress(AddressError),

    /// Node returned something that is not a `0x` hash.
    #[error("invalid tx hash response: {0:?}")]
    InvalidTxHash(String),

    #[error(transparent)]
    Rpc(#[from] RpcError),
}
