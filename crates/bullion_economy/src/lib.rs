//! # Bullion Economy
//!
//! Money outside the simulation: account balances, the pellet spend budget
//! and exit escrow, all held in a shared key-value store so any number of
//! room processes can work on the same accounts.
//!
//! ## Design Principles
//!
//! 1. **Integers only** - amounts are `u64` in the smallest unit, capped by
//!    `LedgerConfig::max_amount`
//! 2. **Optimistic concurrency** - watch, decide, commit-if-unchanged, retry
//!    with jitter; no lock is held across store I/O
//! 3. **Exactly once with a key** - idempotency records cache every outcome,
//!    failures included
//! 4. **Loud failures** - exhausted retries and key reuse are errors, short
//!    balances are plain `false`/`None`
//!
//! ## Example
//!
//! ```rust
//! use std::sync::Arc;
//! use bullion_economy::{Ledger, LedgerConfig, MemoryStore};
//!
//! let store = Arc::new(MemoryStore::new());
//! let ledger = Ledger::new(store, "room-1", LedgerConfig::default()).unwrap();
//!
//! assert_eq!(ledger.deposit("acc1", 100, Some("k1")).unwrap(), 100);
//! assert_eq!(ledger.deposit("acc1", 100, Some("k1")).unwrap(), 100);
//! assert!(!ledger.transfer("acc1", "acc2", 500, None).unwrap());
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod config;
pub mod error;
pub mod ledger;
pub mod reservation;
pub mod store;
pub mod ticket;

pub use config::LedgerConfig;
pub use error::{LedgerError, LedgerResult, StoreError, StoreResult};
pub use ledger::{accounts, unix_now, Ledger, OpKind};
pub use reservation::{Reservation, ReservationService};
#[cfg(feature = "redis")]
pub use store::RedisStore;
pub use store::{KvStore, MemoryStore, TxOutcome, WriteOp};
pub use ticket::{ExitRequest, ExitTicket, TicketClaim, TicketSigner};
