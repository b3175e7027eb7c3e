//! # BULLION
//!
//! The room server crate: one simulation room wired to the ledger.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                            BULLION ROOM                                 │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │  ┌─────────────────┐     ┌─────────────────┐     ┌─────────────────┐    │
//! │  │  bullion_sim    │     │  RoomDriver     │     │ bullion_economy │    │
//! │  │                 │────>│                 │────>│                 │    │
//! │  │  • Engine       │     │  • join / exit  │     │  • Ledger       │    │
//! │  │  • TickLoop     │<────│  • event route  │     │  • Reservations │    │
//! │  │  • Snapshots    │     │  • sweeps       │     │  • KvStore      │    │
//! │  └─────────────────┘     └────────┬────────┘     └────────┬────────┘    │
//! │                                   │                       │             │
//! │                          ┌────────▼────────┐     ┌────────▼────────┐    │
//! │                          │  NoticeBus      │     │  bullion_chain  │    │
//! │                          │  (transport)    │     │  • EIP-712      │    │
//! │                          └─────────────────┘     │  • settlement   │    │
//! │                                                  └─────────────────┘    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - `config`: process configuration
//! - `driver`: engine events to ledger calls
//! - `notices`: room notices for the transport layer
//! - `bots`: scripted players

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]

pub mod bots;
pub mod config;
pub mod driver;
pub mod error;
pub mod notices;

pub use bullion_chain as chain;
pub use bullion_economy as economy;
pub use bullion_sim as sim;

pub use bots::ScriptedBot;
pub use config::{ServerConfig, DEV_SIGNER_KEY};
pub use driver::{DriverSettings, DriverStats, ExitStage, PendingExit, RoomDriver, TickReport};
pub use error::{RoomError, RoomResult};
pub use notices::{NoticeBus, NoticeReceiver, NoticeSender, RoomNotice};
