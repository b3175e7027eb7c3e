//! # World Entities
//!
//! Plain data owned by the engine. Behaviour lives in the engine stages; the
//! only logic here keeps `radius` tied to `mass`.

use serde::{Deserialize, Serialize};

use bullion_core::EntityId;
use bullion_shared::{pickup_radius, player_radius, Micro, Vec2};

use crate::config::SimConfig;
use crate::input::{Edges, PlayerInput};

/// Per-feature countdowns, in ticks. All tick down by one at the end of
/// every step.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Timers {
    /// Cannot act or accelerate.
    pub stun: u32,
    /// Accelerates at `slow_factor`.
    pub slow: u32,
    /// Dash unavailable.
    pub dash_cooldown: u32,
    /// Dash burst in progress.
    pub dash_active: u32,
    /// Bullets are blocked.
    pub invulnerable: u32,
    /// Accelerates at `shoot_recovery_factor`.
    pub shoot_recovery: u32,
    /// Shot unavailable.
    pub shoot_cooldown: u32,
    /// Magnet range multiplied.
    pub magnet_boost: u32,
    /// Exit progress blocked.
    pub combat_tag: u32,
    /// Cosmetic.
    pub hit_flash: u32,
}

impl Timers {
    /// Decrements every timer, stopping at zero.
    pub fn tick_down(&mut self) {
        for t in [
            &mut self.stun,
            &mut self.slow,
            &mut self.dash_cooldown,
            &mut self.dash_active,
            &mut self.invulnerable,
            &mut self.shoot_recovery,
            &mut self.shoot_cooldown,
            &mut self.magnet_boost,
            &mut self.combat_tag,
            &mut self.hit_flash,
        ] {
            *t = t.saturating_sub(1);
        }
    }
}

/// A player body.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Player {
    /// Entity id.
    pub id: EntityId,
    /// Transport session.
    pub session_id: String,
    /// Payout wallet.
    pub wallet: String,
    /// Display name.
    pub display_name: String,
    /// Position.
    pub pos: Vec2,
    /// Velocity, units per tick.
    pub vel: Vec2,
    /// Current balance in the smallest unit.
    mass: u64,
    /// Stake at join time. Baseline for costs and the floor.
    pub spawn_mass: u64,
    /// Derived from `mass` and `spawn_mass`.
    radius: f64,
    /// False once the player has exited or died this tick.
    pub alive: bool,
    /// Set when the player cashed out through the exit hold.
    pub exited: bool,
    /// Controls as last set by the transport.
    pub input: PlayerInput,
    /// Controls as of the previous step.
    pub prev_input: PlayerInput,
    /// Edges computed at the start of the current step.
    pub edges: Edges,
    /// Last non-zero movement direction; aim fallback.
    pub last_move_dir: Vec2,
    /// Countdowns.
    pub timers: Timers,
    /// Shoot hold ticks.
    pub shoot_charge: u32,
    /// Dash hold ticks.
    pub dash_charge: u32,
    /// Consecutive exit hold ticks.
    pub exit_hold_ticks: u32,
    /// Exit progress in `[0, 1]`.
    pub exit_progress: f64,
    /// Sub-unit base tax carried between passes.
    pub tax_carry: Micro,
    /// Tick of the last disconnect, if the session is gone.
    pub disconnected_at: Option<u64>,
    /// Spilled by a lethal hit this tick; reported when the player is evicted.
    pub fatal_spill: u64,
}

impl Player {
    /// Creates a player at `pos` with `mass == spawn_mass`.
    #[must_use]
    pub fn new(
        id: EntityId,
        session_id: String,
        wallet: String,
        display_name: String,
        spawn_mass: u64,
        pos: Vec2,
        config: &SimConfig,
    ) -> Self {
        let mut player = Self {
            id,
            session_id,
            wallet,
            display_name,
            pos,
            vel: Vec2::ZERO,
            mass: spawn_mass,
            spawn_mass,
            radius: 0.0,
            alive: true,
            exited: false,
            input: PlayerInput::default(),
            prev_input: PlayerInput::default(),
            edges: Edges::default(),
            last_move_dir: Vec2::X,
            timers: Timers::default(),
            shoot_charge: 0,
            dash_charge: 0,
            exit_hold_ticks: 0,
            exit_progress: 0.0,
            tax_carry: Micro::ZERO,
            disconnected_at: None,
            fatal_spill: 0,
        };
        player.refresh_radius(config);
        player
    }

    /// Current balance.
    #[inline]
    #[must_use]
    pub const fn mass(&self) -> u64 {
        self.mass
    }

    /// Current radius.
    #[inline]
    #[must_use]
    pub const fn radius(&self) -> f64 {
        self.radius
    }

    /// Sets the balance and re-derives the radius.
    pub fn set_mass(&mut self, mass: u64, config: &SimConfig) {
        self.mass = mass;
        self.refresh_radius(config);
    }

    /// Removes up to `amount`, returning what was actually removed.
    pub fn take_mass(&mut self, amount: u64, config: &SimConfig) -> u64 {
        let taken = amount.min(self.mass);
        self.set_mass(self.mass - taken, config);
        taken
    }

    /// Adds `amount`.
    pub fn add_mass(&mut self, amount: u64, config: &SimConfig) {
        self.set_mass(self.mass.saturating_add(amount), config);
    }

    /// Recomputes the radius from the current mass.
    pub fn refresh_radius(&mut self, config: &SimConfig) {
        self.radius = player_radius(
            self.mass,
            self.spawn_mass,
            config.player_base_radius,
            config.player_radius_scale,
            config.player_max_radius,
        );
    }

    /// Minimum balance.
    #[must_use]
    pub const fn floor(&self, config: &SimConfig) -> u64 {
        config.floor_for(self.spawn_mass)
    }

    /// Mobility multiplier for the current radius.
    #[must_use]
    pub fn mobility(&self, config: &SimConfig) -> f64 {
        bullion_shared::mobility_for_radius(
            self.radius,
            config.mobility_reference_radius,
            config.mobility_min,
            config.mobility_max,
        )
    }

    /// True while a dash burst is running.
    #[must_use]
    pub const fn is_dashing(&self) -> bool {
        self.timers.dash_active > 0
    }

    /// True while the player holds a dash charge; this shields from bullets.
    #[must_use]
    pub const fn is_charging_dash(&self) -> bool {
        self.input.dash && self.dash_charge > 0
    }

    /// Aim direction: explicit aim, else last movement direction.
    #[must_use]
    pub fn aim(&self) -> Vec2 {
        self.input.aim_dir().unwrap_or(self.last_move_dir)
    }

    /// Drops every in-progress commitment (charges and exit hold).
    pub fn cancel_commitments(&mut self) {
        self.shoot_charge = 0;
        self.dash_charge = 0;
        self.reset_exit();
    }

    /// Resets exit progress to zero.
    pub fn reset_exit(&mut self) {
        self.exit_hold_ticks = 0;
        self.exit_progress = 0.0;
    }
}

/// A projectile.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Bullet {
    /// Entity id.
    pub id: EntityId,
    /// Position.
    pub pos: Vec2,
    /// Position before this tick's move; start of the swept test.
    pub prev_pos: Vec2,
    /// Velocity.
    pub vel: Vec2,
    /// Radius.
    pub radius: f64,
    /// Damage dealt on hit.
    pub damage: u64,
    /// Shooter's session.
    pub owner: String,
    /// Remaining lifetime.
    pub ttl: u32,
    /// Destroyed this tick.
    pub dead: bool,
    /// Died at the end of this tick's flight (lifetime or border); the
    /// final segment is still swept for hits.
    pub spent: bool,
}

/// Ownership lock on a spill.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpillLock {
    /// Session that caused the spill, if any.
    pub attacker: Option<String>,
    /// Session that lost the mass.
    pub victim: String,
    /// First tick anyone may take it.
    pub unlock_tick: u64,
    /// First tick it may be collected at all.
    pub collectible_tick: u64,
}

/// What a pickup is.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum PickupKind {
    /// Budget-funded spawn.
    Pellet,
    /// Mass ejected from a player.
    Spill(SpillLock),
}

/// A collectible.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Pickup {
    /// Entity id.
    pub id: EntityId,
    /// Pellet or spill.
    pub kind: PickupKind,
    /// Position.
    pub pos: Vec2,
    /// Residual velocity from a spill fling.
    pub vel: Vec2,
    /// Radius.
    pub radius: f64,
    /// Mass value.
    pub value: u64,
    /// Taken this tick.
    pub collected: bool,
}

impl Pickup {
    /// Creates a pickup sized for its value.
    #[must_use]
    pub fn new(
        id: EntityId,
        kind: PickupKind,
        pos: Vec2,
        vel: Vec2,
        value: u64,
        pellet_value: u64,
        config: &SimConfig,
    ) -> Self {
        Self {
            id,
            kind,
            pos,
            vel,
            radius: pickup_radius(
                value,
                pellet_value,
                config.pickup_base_radius,
                config.pickup_radius_scale,
                config.pickup_max_radius,
            ),
            value,
            collected: false,
        }
    }

    /// May `session` attract or collect this pickup at `tick`?
    #[must_use]
    pub fn eligible_for(&self, session: &str, tick: u64) -> bool {
        match &self.kind {
            PickupKind::Pellet => true,
            PickupKind::Spill(lock) => {
                tick >= lock.unlock_tick || lock.attacker.as_deref().map_or(true, |a| a == session)
            }
        }
    }

    /// Past the readability delay?
    #[must_use]
    pub fn collectible_at(&self, tick: u64) -> bool {
        match &self.kind {
            PickupKind::Pellet => true,
            PickupKind::Spill(lock) => tick >= lock.collectible_tick,
        }
    }
}

/// A static circular obstacle.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Obstacle {
    /// Entity id.
    pub id: EntityId,
    /// Center.
    pub pos: Vec2,
    /// Radius.
    pub radius: f64,
}
