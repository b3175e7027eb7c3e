//! # Economy Error Types
//!
//! Insufficient funds is never an error here: it is an ordinary `false` or
//! `None` the caller must check. Errors mean the call was malformed, the
//! store misbehaved, or the retry budget ran out.

use thiserror::Error;

/// Errors from a `KvStore` backend.
#[derive(Error, Debug)]
pub enum StoreError {
    /// A value that should be an integer was not.
    #[error("corrupt value at {key}: {value:?}")]
    Corrupt {
        /// Key holding the value.
        key: String,
        /// What was found.
        value: String,
    },

    /// Backend connection or command failure.
    #[cfg(feature = "redis")]
    #[error("redis: {0}")]
    Redis(#[from] redis::RedisError),
}

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors from the ledger and reservation service.
#[derive(Error, Debug)]
pub enum LedgerError {
    /// Amount above the configured maximum.
    #[error("invalid amount {amount}: must be at most {max}")]
    InvalidAmount {
        /// Requested amount.
        amount: u64,
        /// Configured ceiling.
        max: u64,
    },

    /// The optimistic retry budget ran out. Nothing was committed; re-issue
    /// the call with the same idempotency key.
    #[error("store contention: gave up after {attempts} attempts")]
    ContentionExhausted {
        /// Attempts made.
        attempts: u32,
    },

    /// An idempotency key was reused for a different operation.
    #[error("idempotency key {key} was recorded for {recorded}, not {requested}")]
    IdempotencyConflict {
        /// The reused key.
        key: String,
        /// Operation on record.
        recorded: String,
        /// Operation attempted now.
        requested: String,
    },

    /// Ticket signing failed.
    #[error("ticket signing failed: {0}")]
    Signing(String),

    /// Bad configuration value.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Store failure.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Idempotency or reservation record did not decode.
    #[error("record codec: {0}")]
    Codec(#[from] serde_json::Error),

    /// Config file did not parse.
    #[error("config parse: {0}")]
    ConfigParse(#[from] toml::de::Error),

    /// Config file could not be read.
    #[error("config io: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for ledger operations.
pub type LedgerResult<T> = Result<T, LedgerError>;
