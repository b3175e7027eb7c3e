//! # Store Contract
//!
//! Everything the ledger needs from a shared key-value store. Values are
//! strings; integers are stored in decimal.
//!
//! ## Watch-Then-Commit
//!
//! ```text
//! transact(watch, plan):
//!   1. read every watched key
//!   2. plan(values) -> writes          (pure, may run many times)
//!   3. commit writes atomically IF no watched key changed since step 1
//!      else report Conflict            (caller retries)
//! ```
//!
//! Two scripts cover the hot paths that need no idempotency record:
//! `decr_if_at_least` and `move_if_at_least`. Both are single atomic
//! operations, so concurrent spends never overdraw.

mod memory;
#[cfg(feature = "redis")]
mod redis;

pub use memory::MemoryStore;
#[cfg(feature = "redis")]
pub use self::redis::RedisStore;

use crate::error::{StoreError, StoreResult};

/// One write inside an atomic commit.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum WriteOp {
    /// Set a string value, optionally expiring after `ttl_secs`.
    Set {
        /// Key.
        key: String,
        /// Value.
        value: String,
        /// Expiry in seconds.
        ttl_secs: Option<u64>,
    },
    /// Add `delta` to an integer value (missing counts as 0).
    IncrBy {
        /// Key.
        key: String,
        /// Signed change.
        delta: i64,
    },
    /// Remove a key.
    Delete {
        /// Key.
        key: String,
    },
    /// Add or re-score a sorted-set member.
    ZAdd {
        /// Sorted set.
        key: String,
        /// Member.
        member: String,
        /// Score.
        score: u64,
    },
    /// Remove a sorted-set member.
    ZRem {
        /// Sorted set.
        key: String,
        /// Member.
        member: String,
    },
}

/// How a transaction ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TxOutcome {
    /// Writes applied.
    Committed,
    /// A watched key changed; nothing applied.
    Conflict,
}

/// Planner handed to [`KvStore::transact`]: watched values in, writes out.
pub type Plan<'a> = dyn FnMut(&[Option<String>]) -> Vec<WriteOp> + 'a;

/// Shared atomic store.
pub trait KvStore: Send + Sync {
    /// Reads a value.
    ///
    /// # Errors
    ///
    /// Backend failure.
    fn get(&self, key: &str) -> StoreResult<Option<String>>;

    /// Up to `limit` members of a sorted set with score `<= max_score`,
    /// lowest score first.
    ///
    /// # Errors
    ///
    /// Backend failure.
    fn zrange_by_score(&self, key: &str, max_score: u64, limit: usize) -> StoreResult<Vec<String>>;

    /// Optimistic transaction over `watch`. See the module docs.
    ///
    /// # Errors
    ///
    /// Backend failure. Contention is `Ok(TxOutcome::Conflict)`, not an error.
    fn transact(&self, watch: &[String], plan: &mut Plan<'_>) -> StoreResult<TxOutcome>;

    /// Atomic increment; returns the new value.
    ///
    /// # Errors
    ///
    /// Backend failure or a non-integer value.
    fn incr_by(&self, key: &str, delta: i64) -> StoreResult<i64>;

    /// Atomically subtracts `amount` if the value is at least `amount`.
    /// Returns the new value, or `None` when short.
    ///
    /// # Errors
    ///
    /// Backend failure or a non-integer value.
    fn decr_if_at_least(&self, key: &str, amount: u64) -> StoreResult<Option<u64>>;

    /// Atomically moves `amount` from `from` to `to` if `from` holds at least
    /// `amount`. Returns the new `from` value, or `None` when short.
    ///
    /// # Errors
    ///
    /// Backend failure or a non-integer value.
    fn move_if_at_least(&self, from: &str, to: &str, amount: u64) -> StoreResult<Option<u64>>;
}

/// Parses a stored integer; a missing key is zero.
///
/// # Errors
///
/// `StoreError::Corrupt` for anything that is not a decimal integer.
pub fn parse_int(key: &str, value: Option<&str>) -> StoreResult<i64> {
    match value {
        None => Ok(0),
        Some(v) => v.trim().parse().map_err(|_| StoreError::Corrupt {
            key: key.to_string(),
            value: v.to_string(),
        }),
    }
}

/// Like [`parse_int`] but for balances, which are never negative.
///
/// # Errors
///
/// `StoreError::Corrupt` for a negative or non-integer value.
pub fn parse_amount(key: &str, value: Option<&str>) -> StoreResult<u64> {
    let raw = parse_int(key, value)?;
    u64::try_from(raw).map_err(|_| StoreError::Corrupt {
        key: key.to_string(),
        value: raw.to_string(),
    })
}
