//! # Tick Events
//!
//! What `Engine::step` reports to the room driver. The driver turns these
//! into ledger and reservation calls; the engine itself never touches money
//! outside its own world.
//!
//! ```text
//! step() ──► RecycleMass    ──► credit pellet reserve
//!        ──► PelletSpawned  ──► spend from pellet reserve (revoke on failure)
//!        ──► PlayerExited   ──► reserve + ticket
//!        ──► PlayerDied     ──► log / notify transport
//! ```

use serde::{Deserialize, Serialize};

use bullion_core::EntityId;

/// One event emitted by a step.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SimEvent {
    /// Mass removed from play this tick (taxes, burns, action costs,
    /// liquidations), summed. At most one per step, emitted last.
    RecycleMass {
        /// Total recycled.
        mass: u64,
    },

    /// A pellet was placed and must be paid for from the spend budget.
    PelletSpawned {
        /// The new pickup.
        id: EntityId,
        /// Its value.
        mass: u64,
    },

    /// A player completed the exit hold and left with their balance.
    PlayerExited {
        /// Session.
        session_id: String,
        /// Payout wallet.
        wallet: String,
        /// Balance at exit, owed to the wallet.
        mass: u64,
    },

    /// A player was evicted by death, liquidation or disconnect timeout.
    PlayerDied {
        /// Session.
        session_id: String,
        /// Wallet.
        wallet: String,
        /// Mass dropped as pickups on the way out.
        spilled: u64,
    },
}

/// Result of one step.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StepResult {
    /// Tick number after the step.
    pub tick: u64,
    /// Events in emission order.
    pub events: Vec<SimEvent>,
}

impl StepResult {
    /// Total mass recycled this step.
    #[must_use]
    pub fn recycled(&self) -> u64 {
        self.events
            .iter()
            .map(|e| match e {
                SimEvent::RecycleMass { mass } => *mass,
                _ => 0,
            })
            .sum()
    }
}
