//! # Bullion Room Simulation
//!
//! Deterministic, fixed-tick world for one room: players with a monetary
//! balance as mass, charged shots and dashes, spills, pellets, taxes and
//! a dynamic circular border.
//!
//! ## Architecture
//!
//! ```text
//!  transport ──set_input──►┌────────┐──StepResult──► room driver
//!                          │ Engine │                (ledger, reservations)
//!  join/leave ──add/remove►└────────┘──WorldNode───► snapshots
//! ```
//!
//! - **Engine**: owns the world, advances it with `step()`
//! - **Config**: every tuning constant, loadable from TOML
//! - **Snapshot**: tagged world nodes and a state digest for replays
//! - **Tick**: wall-clock pacing at 20Hz
//!
//! ## Money Rules
//!
//! Mass is a `u64` in the smallest currency unit. Mass only leaves the world
//! through `RecycleMass` (taxes, burns, costs) and `PlayerExited`; it only
//! enters through a join or a `PelletSpawned`.
//!
//! ## Example
//!
//! ```rust
//! use bullion_sim::{Engine, InputPatch, SimConfig};
//!
//! let mut engine = Engine::new(SimConfig::default(), 42).unwrap();
//! engine.add_player("s1", "0xabc", "alice", 1_000).unwrap();
//! engine.set_input("s1", InputPatch { d: Some(true), ..InputPatch::default() });
//!
//! let result = engine.step();
//! assert_eq!(result.tick, 1);
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::cast_precision_loss, clippy::module_name_repetitions)]

pub mod config;
pub mod engine;
pub mod entities;
pub mod error;
pub mod events;
pub mod input;
pub mod snapshot;
pub mod tick;

pub use config::SimConfig;
pub use engine::{Border, Engine};
pub use entities::{Bullet, Obstacle, Pickup, PickupKind, Player, SpillLock, Timers};
pub use error::{SimError, SimResult};
pub use events::{SimEvent, StepResult};
pub use input::{Edges, InputPatch, PlayerInput};
pub use snapshot::{
    color_for_session, status, BulletNode, ObstacleNode, PelletNode, PlayerNode, Rect, SpillNode,
    WorldNode,
};
pub use tick::{TickLoop, TickStats};
