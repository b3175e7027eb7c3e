//! Error types for the settlement bridge.

use alloy_primitives::U256;
use bullion_economy::LedgerError;
use thiserror::Error;

/// Settlement and signing failures.
#[derive(Debug, Error)]
pub enum ChainError {
    /// Signing key is not 32 bytes of hex or not a valid scalar.
    #[error("invalid signing key: {0}")]
    InvalidKey(String),

    /// Address string did not parse.
    #[error("invalid address {0:?}")]
    InvalidAddress(String),

    /// Signature had the wrong length or did not recover.
    #[error("signature error: {0}")]
    Signature(String),

    /// On-chain amount does not fit the ledger's integer range.
    #[error("amount {0} does not fit a ledger balance")]
    AmountOutOfRange(U256),

    /// Ledger rejected or failed the operation.
    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

/// Result alias for this crate.
pub type ChainResult<T> = Result<T, ChainError>;
