//! # Room Engine
//!
//! Owns one room's world and advances it one fixed tick at a time.
//!
//! ## Determinism
//!
//! Storage is arena-based and lookups go through hash maps, but no stage ever
//! iterates a hash map. Every pass walks players, bullets and pickups sorted
//! by entity id, and every random draw comes from the room's own LCG. Same
//! seed + same ordered inputs = same world, bit for bit.
//!
//! ## Tick Pipeline
//!
//! ```text
//!  1 border          8 projectiles      15 exits
//!  2 edges           9 grid/obstacles   16 tax (1/s)
//!  3 charges           /border clamp    17 pellets
//!  4 movement       10 player pairs     18 cleanup
//!  5 friction       11 bullets          19 radii/timers/recycle
//!  6 dash           12 damage
//!  7 shoot          13 magnetism
//!                   14 collection
//! ```

mod actions;
mod combat;
mod economy;
mod lifecycle;
mod motion;
mod pickups;


use std::collections::HashMap;
use std::hash::Hasher;

use serde::{Deserialize, Serialize};
use siphasher::sip::SipHasher13;
use tracing::{debug, trace};

use bullion_core::{Arena, EntityId, EntityKind, Handle, IdAllocator, SpatialGrid};
use bullion_shared::DeterministicRng;

use crate::config::SimConfig;
use crate::entities::{Bullet, Obstacle, Pickup, PickupKind, Player};
use crate::error::{SimError, SimResult};
use crate::events::{SimEvent, StepResult};
use crate::input::InputPatch;
use crate::snapshot::{
    color_for_session, status, BulletNode, ObstacleNode, PelletNode, PlayerNode, Rect, SpillNode,
    WorldNode, DIGEST_KEYS,
};

/// Longest display name kept, in chars.
const MAX_NAME_CHARS: usize = 24;

/// Dynamic circular border.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Border {
    /// Live radius.
    pub radius: f64,
    /// Radius the border is moving toward.
    pub target: f64,
    /// Change applied this tick (negative while contracting).
    pub velocity: f64,
}

/// One room's authoritative simulation.
pub struct Engine {
    config: SimConfig,
    tick: u64,
    rng: DeterministicRng,
    ids: IdAllocator,

    players: Arena<Player>,
    sessions: HashMap<String, Handle>,
    bullets: Arena<Bullet>,
    pickups: Arena<Pickup>,
    /// Id -> arena slot for every live player, bullet and pickup.
    index: HashMap<EntityId, (EntityKind, Handle)>,
    /// Sorted by id; never changes after construction.
    obstacles: Vec<Obstacle>,

    grid: SpatialGrid,
    border: Border,
    baseline_spawn_mass: Option<u64>,

    // Per-tick accumulators.
    recycled: u64,
    events: Vec<SimEvent>,
}

impl Engine {
    /// Creates a room and places its obstacles.
    ///
    /// # Errors
    ///
    /// Returns `SimError::InvalidConfig` if the config fails validation.
    pub fn new(config: SimConfig, seed: u32) -> SimResult<Self> {
        config.validate()?;
        let border = Border {
            radius: config.border_base_radius,
            target: config.border_base_radius,
            velocity: 0.0,
        };
        let mut engine = Self {
            grid: SpatialGrid::new(config.grid_cell_size),
            config,
            tick: 0,
            rng: DeterministicRng::new(seed),
            ids: IdAllocator::new(),
            players: Arena::with_capacity(64),
            sessions: HashMap::new(),
            bullets: Arena::with_capacity(256),
            pickups: Arena::with_capacity(512),
            index: HashMap::new(),
            obstacles: Vec::new(),
            border,
            baseline_spawn_mass: None,
            recycled: 0,
            events: Vec::new(),
        };
        engine.place_obstacles();
        Ok(engine)
    }

    // =========================================================================
    // ACCESSORS
    // =========================================================================

    /// Tuning in use.
    #[must_use]
    pub const fn config(&self) -> &SimConfig {
        &self.config
    }

    /// Ticks completed.
    #[must_use]
    pub const fn tick(&self) -> u64 {
        self.tick
    }

    /// Current border.
    #[must_use]
    pub const fn border(&self) -> Border {
        self.border
    }

    /// RNG state, for replays.
    #[must_use]
    pub const fn rng_state(&self) -> u32 {
        self.rng.state()
    }

    /// Stake of the first player to join; scales pellet economics.
    #[must_use]
    pub const fn baseline_spawn_mass(&self) -> Option<u64> {
        self.baseline_spawn_mass
    }

    /// Players still in the world.
    #[must_use]
    pub fn alive_players(&self) -> usize {
        self.players.values().filter(|p| p.alive).count()
    }

    /// Player by session.
    #[must_use]
    pub fn player(&self, session_id: &str) -> Option<&Player> {
        let handle = self.sessions.get(session_id)?;
        self.players.get(*handle)
    }

    /// All players, sorted by id.
    #[must_use]
    pub fn players(&self) -> Vec<&Player> {
        let mut out: Vec<&Player> = self.players.values().collect();
        out.sort_unstable_by_key(|p| p.id);
        out
    }

    /// Pickup by id.
    #[must_use]
    pub fn pickup(&self, id: EntityId) -> Option<&Pickup> {
        match self.index.get(&id)? {
            (EntityKind::Pellet | EntityKind::Spill, handle) => self.pickups.get(*handle),
            _ => None,
        }
    }

    /// Static obstacles, sorted by id.
    #[must_use]
    pub fn obstacles(&self) -> &[Obstacle] {
        &self.obstacles
    }

    /// Current balance of a session's player.
    #[must_use]
    pub fn player_total_mass(&self, session_id: &str) -> Option<u64> {
        self.player(session_id).map(Player::mass)
    }

    /// Lowest-id player paying out to `wallet`.
    #[must_use]
    pub fn find_player_by_wallet(&self, wallet: &str) -> Option<&Player> {
        self.players
            .values()
            .filter(|p| p.wallet.eq_ignore_ascii_case(wallet))
            .min_by_key(|p| p.id)
    }

    /// Sum of every player's balance and every pickup's value.
    #[must_use]
    pub fn world_mass(&self) -> u64 {
        let players: u64 = self.players.values().map(Player::mass).sum();
        let pickups: u64 = self.pickups.values().map(|p| p.value).sum();
        players + pickups
    }

    // =========================================================================
    // LIFECYCLE
    // =========================================================================

    /// Adds a player, or returns the existing one for this session.
    ///
    /// # Errors
    ///
    /// Returns `SimError::ZeroSpawnMass` for a zero stake.
    pub fn add_player(
        &mut self,
        session_id: &str,
        wallet: &str,
        display_name: &str,
        spawn_mass: u64,
    ) -> SimResult<&Player> {
        if let Some(&handle) = self.sessions.get(session_id) {
            return self
                .players
                .get(handle)
                .ok_or_else(|| SimError::UnknownSession(session_id.to_string()));
        }
        if spawn_mass == 0 {
            return Err(SimError::ZeroSpawnMass);
        }

        self.baseline_spawn_mass.get_or_insert(spawn_mass);
        let radius = bullion_shared::player_radius(
            spawn_mass,
            spawn_mass,
            self.config.player_base_radius,
            self.config.player_radius_scale,
            self.config.player_max_radius,
        );
        let pos = self.sample_spawn_point(radius);
        let id = self.ids.allocate();
        let name: String = display_name.chars().take(MAX_NAME_CHARS).collect();
        let player = Player::new(
            id,
            session_id.to_string(),
            wallet.to_string(),
            name,
            spawn_mass,
            pos,
            &self.config,
        );

        let handle = self.players.insert(player);
        self.sessions.insert(session_id.to_string(), handle);
        self.index.insert(id, (EntityKind::Player, handle));
        debug!(session_id, wallet, spawn_mass, id = %id, "player joined");

        self.players
            .get(handle)
            .ok_or_else(|| SimError::UnknownSession(session_id.to_string()))
    }

    /// Removes a player immediately, without a spill.
    pub fn remove_player(&mut self, session_id: &str) -> Option<Player> {
        let handle = self.sessions.remove(session_id)?;
        let player = self.players.remove(handle)?;
        self.index.remove(&player.id);
        debug!(session_id, mass = player.mass(), "player removed");
        Some(player)
    }

    /// Merges a partial input into the player's controls. Returns false for
    /// an unknown or departed session.
    pub fn set_input(&mut self, session_id: &str, patch: impl Into<InputPatch>) -> bool {
        let Some(&handle) = self.sessions.get(session_id) else {
            trace!(session_id, "input for unknown session");
            return false;
        };
        match self.players.get_mut(handle) {
            Some(player) if player.alive => {
                patch.into().apply_to(&mut player.input);
                true
            }
            _ => false,
        }
    }

    /// Moves a player to a new session id (reconnect) and clears any
    /// pending disconnect.
    ///
    /// # Errors
    ///
    /// Fails if `old` is unknown or `new` is already taken.
    pub fn rekey_session(&mut self, old: &str, new: &str) -> SimResult<()> {
        if old == new {
            return if self.sessions.contains_key(old) {
                self.mark_connected(old);
                Ok(())
            } else {
                Err(SimError::UnknownSession(old.to_string()))
            };
        }
        if self.sessions.contains_key(new) {
            return Err(SimError::SessionInUse(new.to_string()));
        }
        let handle = self
            .sessions
            .remove(old)
            .ok_or_else(|| SimError::UnknownSession(old.to_string()))?;
        if let Some(player) = self.players.get_mut(handle) {
            player.session_id = new.to_string();
            player.disconnected_at = None;
        }
        self.sessions.insert(new.to_string(), handle);

        for (_, bullet) in self.bullets.iter_mut() {
            if bullet.owner == old {
                bullet.owner = new.to_string();
            }
        }
        for (_, pickup) in self.pickups.iter_mut() {
            if let PickupKind::Spill(lock) = &mut pickup.kind {
                if lock.attacker.as_deref() == Some(old) {
                    lock.attacker = Some(new.to_string());
                }
                if lock.victim == old {
                    lock.victim = new.to_string();
                }
            }
        }
        debug!(old, new, "session rekeyed");
        Ok(())
    }

    /// Starts the disconnect grace period. Returns false for an unknown
    /// session.
    pub fn mark_disconnected(&mut self, session_id: &str) -> bool {
        let tick = self.tick;
        let Some(player) = self
            .sessions
            .get(session_id)
            .and_then(|h| self.players.get_mut(*h))
        else {
            return false;
        };
        player.disconnected_at.get_or_insert(tick);
        debug!(session_id, tick, "player disconnected");
        true
    }

    fn mark_connected(&mut self, session_id: &str) {
        if let Some(player) = self
            .sessions
            .get(session_id)
            .and_then(|h| self.players.get_mut(*h))
        {
            player.disconnected_at = None;
        }
    }

    /// Removes a pickup, returning its value. Used to revoke a pellet the
    /// spend budget could not fund.
    pub fn remove_pickup(&mut self, id: EntityId) -> Option<u64> {
        let &(kind, handle) = self.index.get(&id)?;
        if !matches!(kind, EntityKind::Pellet | EntityKind::Spill) {
            return None;
        }
        let pickup = self.pickups.remove(handle)?;
        self.index.remove(&id);
        trace!(id = %id, value = pickup.value, "pickup removed");
        Some(pickup.value)
    }

    // =========================================================================
    // TICK
    // =========================================================================

    /// Advances the world exactly one tick.
    ///
    /// Never fails and never blocks. Must not be called concurrently.
    pub fn step(&mut self) -> StepResult {
        self.tick += 1;
        self.recycled = 0;
        self.events.clear();

        let order = self.player_order();

        self.update_border(); // 1
        self.compute_edges(&order); // 2
        self.accumulate_charges(&order); // 3
        self.integrate_players(&order); // 4, 5
        self.resolve_dashes(&order); // 6
        self.resolve_shots(&order); // 7
        self.integrate_projectiles(); // 8

        self.rebuild_grid(); // 9
        self.resolve_obstacles(&order);
        self.clamp_players_to_border(&order);

        self.rebuild_grid();
        self.resolve_player_pairs(&order); // 10

        self.rebuild_grid();
        let hits = self.resolve_bullets(); // 11
        self.apply_damage(hits); // 12
        self.resolve_magnetism(); // 13
        self.resolve_collection(); // 14

        self.advance_exits(&order); // 15
        if self.tick % self.config.tax_interval_ticks == 0 {
            self.apply_taxes(&order); // 16
        }
        if self.tick % self.config.pellet_interval_ticks == 0 {
            self.spawn_pellets(); // 17
        }
        self.cleanup(&order); // 18
        self.finish_tick(); // 19

        StepResult {
            tick: self.tick,
            events: std::mem::take(&mut self.events),
        }
    }

    /// Player handles sorted by id.
    fn player_order(&self) -> Vec<Handle> {
        let mut order: Vec<(EntityId, Handle)> =
            self.players.iter().map(|(h, p)| (p.id, h)).collect();
        order.sort_unstable_by_key(|(id, _)| *id);
        order.into_iter().map(|(_, h)| h).collect()
    }

    fn bullet_order(&self) -> Vec<Handle> {
        let mut order: Vec<(EntityId, Handle)> =
            self.bullets.iter().map(|(h, b)| (b.id, h)).collect();
        order.sort_unstable_by_key(|(id, _)| *id);
        order.into_iter().map(|(_, h)| h).collect()
    }

    fn pickup_order(&self) -> Vec<Handle> {
        let mut order: Vec<(EntityId, Handle)> =
            self.pickups.iter().map(|(h, p)| (p.id, h)).collect();
        order.sort_unstable_by_key(|(id, _)| *id);
        order.into_iter().map(|(_, h)| h).collect()
    }

    fn player_handle(&self, id: EntityId) -> Option<Handle> {
        match self.index.get(&id)? {
            (EntityKind::Player, handle) => Some(*handle),
            _ => None,
        }
    }

    fn pellet_value(&self) -> u64 {
        self.baseline_spawn_mass
            .map_or(1, |b| self.config.pellet_value_for(b))
    }

    /// Stage 9 (and refreshes before 10 and 11): re-inserts every live body.
    fn rebuild_grid(&mut self) {
        self.grid.clear();
        for p in self.players.values().filter(|p| p.alive) {
            self.grid.insert(EntityKind::Player, p.id, p.pos, p.radius());
        }
        for o in &self.obstacles {
            self.grid.insert(EntityKind::Obstacle, o.id, o.pos, o.radius);
        }
        for b in self.bullets.values().filter(|b| !b.dead) {
            self.grid.insert(EntityKind::Bullet, b.id, b.pos, b.radius);
        }
        for p in self.pickups.values().filter(|p| !p.collected) {
            let kind = match p.kind {
                PickupKind::Pellet => EntityKind::Pellet,
                PickupKind::Spill(_) => EntityKind::Spill,
            };
            self.grid.insert(kind, p.id, p.pos, p.radius);
        }
    }

    // =========================================================================
    // SNAPSHOTS
    // =========================================================================

    /// Every node in the world, sorted by id.
    #[must_use]
    pub fn world_nodes(&self) -> Vec<WorldNode> {
        let mut nodes = Vec::with_capacity(
            self.players.len() + self.bullets.len() + self.pickups.len() + self.obstacles.len(),
        );
        nodes.extend(
            self.players
                .values()
                .filter(|p| p.alive)
                .map(|p| self.player_node(p)),
        );
        nodes.extend(self.bullets.values().filter(|b| !b.dead).map(|b| {
            WorldNode::Bullet(BulletNode {
                id: b.id,
                pos: b.pos,
                vel: b.vel,
                radius: b.radius,
                owner: b.owner.clone(),
            })
        }));
        nodes.extend(
            self.pickups
                .values()
                .filter(|p| !p.collected)
                .map(|p| match &p.kind {
                    PickupKind::Pellet => WorldNode::Pellet(PelletNode {
                        id: p.id,
                        pos: p.pos,
                        radius: p.radius,
                        mass: p.value,
                    }),
                    PickupKind::Spill(lock) => WorldNode::Spill(SpillNode {
                        id: p.id,
                        pos: p.pos,
                        radius: p.radius,
                        mass: p.value,
                        attacker: lock.attacker.clone(),
                        victim: lock.victim.clone(),
                        unlock_tick: lock.unlock_tick,
                    }),
                }),
        );
        nodes.extend(self.obstacles.iter().map(|o| {
            WorldNode::Obstacle(ObstacleNode {
                id: o.id,
                pos: o.pos,
                radius: o.radius,
            })
        }));
        nodes.sort_unstable_by_key(WorldNode::id);
        nodes
    }

    /// Nodes touching `view`, sorted by id.
    #[must_use]
    pub fn world_nodes_in_box(&self, view: Rect) -> Vec<WorldNode> {
        let mut nodes = self.world_nodes();
        nodes.retain(|n| view.overlaps_circle(n.pos(), n.radius()));
        nodes
    }

    fn player_node(&self, p: &Player) -> WorldNode {
        let cfg = &self.config;
        let mut bits = 0;
        for (on, bit) in [
            (p.is_dashing(), status::DASHING),
            (p.timers.stun > 0, status::STUNNED),
            (p.exit_hold_ticks > 0, status::EXITING),
            (p.timers.invulnerable > 0, status::INVULNERABLE),
            (p.timers.slow > 0, status::SLOWED),
            (p.timers.combat_tag > 0, status::COMBAT_TAGGED),
            (p.timers.hit_flash > 0, status::HIT_FLASH),
            (p.shoot_charge > 0, status::CHARGING_SHOT),
            (p.dash_charge > 0, status::CHARGING_DASH),
        ] {
            if on {
                bits |= bit;
            }
        }
        let ratio = |charge: u32, full: u32| (f64::from(charge) / f64::from(full.max(1))).min(1.0);

        WorldNode::Player(PlayerNode {
            id: p.id,
            session_id: p.session_id.clone(),
            display_name: p.display_name.clone(),
            pos: p.pos,
            radius: p.radius(),
            mass: p.mass(),
            spawn_mass: p.spawn_mass,
            color: color_for_session(&p.session_id),
            status: bits,
            shoot_charge: ratio(p.shoot_charge, cfg.shoot_full_charge_ticks),
            dash_charge: ratio(p.dash_charge, cfg.dash_charge_ticks),
            exit_progress: p.exit_progress,
            dash_cooldown: p.timers.dash_cooldown,
            shoot_cooldown: p.timers.shoot_cooldown,
        })
    }

    /// SipHash-1-3 over the snapshot, hidden per-player state, the border
    /// and the RNG. Equal digests mean equal worlds.
    #[must_use]
    pub fn state_digest(&self) -> u64 {
        let mut h = SipHasher13::new_with_keys(DIGEST_KEYS.0, DIGEST_KEYS.1);
        h.write_u64(self.tick);
        h.write_u32(self.rng.state());
        h.write_u64(self.border.radius.to_bits());
        h.write_u64(self.border.target.to_bits());
        h.write_u64(self.border.velocity.to_bits());
        for node in self.world_nodes() {
            node.digest_into(&mut h);
        }
        for p in self.players() {
            h.write_u64(p.id.raw());
            let [vx, vy] = p.vel.to_bits();
            h.write_u64(vx);
            h.write_u64(vy);
            h.write_u64(p.tax_carry.raw());
            h.write_u32(p.exit_hold_ticks);
            h.write_u32(p.timers.stun);
            h.write_u32(p.timers.slow);
            h.write_u32(p.timers.dash_active);
            h.write_u32(p.timers.magnet_boost);
            h.write_u32(p.timers.combat_tag);
        }
        h.finish()
    }
}
