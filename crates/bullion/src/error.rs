//! Errors surfaced by the room server.

use thiserror::Error;

use bullion_chain::ChainError;
use bullion_economy::{LedgerError, StoreError};
use bullion_sim::SimError;

/// Anything that can stop a room from starting or a call from completing.
#[derive(Debug, Error)]
pub enum RoomError {
    /// Engine lifecycle or sim config failure.
    #[error(transparent)]
    Sim(#[from] SimError),

    /// Ledger failure (contention, key reuse, invalid amount, store).
    #[error(transparent)]
    Ledger(#[from] LedgerError),

    /// Store connection failure.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Signer or settlement failure.
    #[error(transparent)]
    Chain(#[from] ChainError),

    /// A configuration value is out of range.
    #[error("invalid config: {0}")]
    InvalidConfig(String),

    /// The configuration file could not be parsed.
    #[error("config parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    /// The configuration file could not be read.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for room operations.
pub type RoomResult<T> = Result<T, RoomError>;
