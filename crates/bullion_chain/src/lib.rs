//! # Bullion Settlement Bridge
//!
//! Everything between the ledger and the vault contract.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────┐    Logs     ┌─────────────────┐          ┌─────────────────┐
//! │  BullionVault   │ ─────────▶  │ SettlementQueue │ ───────▶ │ SettlementSync  │ ──▶ Ledger
//! │  (Solidity)     │             │  (bounded)      │          │ (event id keys) │
//! └────────▲────────┘             └─────────────────┘          └─────────────────┘
//!          │ redeemExit(ticket, signature)
//!          │
//! ┌────────┴────────┐
//! │ Eip712Ticket    │ ◀── Ledger::withdraw_with_ticket
//! │ Signer          │
//! └─────────────────┘
//! ```
//!
//! No RPC client lives here: whatever indexes the chain feeds raw logs into
//! the queue.

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod contracts;
pub mod error;
pub mod events;
pub mod queue;
pub mod signer;
pub mod sync;

pub use contracts::{id_hash, ExitTicket as TypedExitTicket, IBullionVault};
pub use error::{ChainError, ChainResult};
pub use events::{EventParser, SettlementEvent, VaultTransfer};
pub use queue::{QueueStats, SettlementQueue};
pub use signer::{Eip712TicketSigner, SIGNATURE_LEN};
pub use sync::{SettlementSync, DEFAULT_PELLET_SHARE_BPS};
