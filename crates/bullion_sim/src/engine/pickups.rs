//! Spills, magnetism and collection.

use bullion_core::{EntityKind, Handle};
use bullion_shared::{distance, Vec2};

use super::motion::clamp_into_circle;
use super::Engine;
use crate::entities::{Pickup, PickupKind, Player, SpillLock};

impl Engine {
    /// Scatters `amount` as spill pickups around `origin`. Chunks are about
    /// `spill_chunk_pellets` pellets each, at most `spill_max_chunks`; the
    /// division remainder rides on the first chunk so no mass is lost.
    pub(super) fn spawn_spill(
        &mut self,
        origin: Vec2,
        spread: f64,
        amount: u64,
        attacker: Option<String>,
        victim: &str,
    ) {
        if amount == 0 {
            return;
        }
        let pellet_value = self.pellet_value();
        let cfg = &self.config;
        let chunk = cfg.spill_chunk_pellets.saturating_mul(pellet_value).max(1);
        let chunks = (amount / chunk).clamp(1, cfg.spill_max_chunks);
        let base = amount / chunks;
        let remainder = amount % chunks;

        for i in 0..chunks {
            let value = if i == 0 { base + remainder } else { base };
            let angle = self.rng.angle();
            let dir = Vec2::from_angle(angle);
            let pos = origin + dir * self.rng.range(0.0, spread.max(0.0));
            let vel = dir * self.rng.range(cfg.spill_min_speed, cfg.spill_max_speed);

            let lock = SpillLock {
                attacker: attacker.clone(),
                victim: victim.to_string(),
                unlock_tick: self.tick + cfg.spill_lock_ticks,
                collectible_tick: self.tick + cfg.spill_collect_delay_ticks,
            };
            let id = self.ids.allocate();
            let mut pickup = Pickup::new(id, PickupKind::Spill(lock), pos, vel, value, pellet_value, cfg);
            clamp_into_circle(&mut pickup.pos, self.border.radius - pickup.radius);
            let handle = self.pickups.insert(pickup);
            self.index.insert(id, (EntityKind::Spill, handle));
        }
    }

    /// Nearest live player near `pos` that `accept` allows, ties to the
    /// lower id.
    fn nearest_player(
        &mut self,
        pos: Vec2,
        query: f64,
        mut accept: impl FnMut(&Player, f64) -> bool,
    ) -> Option<Handle> {
        let mut best: Option<(f64, Handle)> = None;
        for c in self.grid.query_circle_kind(pos, query, EntityKind::Player) {
            let Some(&(EntityKind::Player, h)) = self.index.get(&c.id) else {
                continue;
            };
            let Some(p) = self.players.get(h) else { continue };
            if !p.alive {
                continue;
            }
            let d = distance(pos, p.pos);
            if accept(p, d) && best.map_or(true, |(bd, _)| d < bd) {
                best = Some((d, h));
            }
        }
        best.map(|(_, h)| h)
    }

    /// Stage 13: each pickup drifts toward the nearest player whose magnet
    /// reaches it. Locked spills only answer to their attacker.
    pub(super) fn resolve_magnetism(&mut self) {
        let tick = self.tick;
        let range = self.config.magnet_range;
        let boost = self.config.magnet_boost_factor.max(1.0);
        let pull = self.config.magnet_pull;
        let border = self.border.radius;

        for hk in self.pickup_order() {
            let Some(pk) = self.pickups.get(hk) else { continue };
            if pk.collected {
                continue;
            }
            let pos = pk.pos;
            let snapshot = pk.clone();

            let target = self.nearest_player(pos, range * boost, |p, d| {
                let reach = if p.timers.magnet_boost > 0 {
                    p.radius() + range * boost
                } else {
                    p.radius() + range
                };
                d <= reach && snapshot.eligible_for(&p.session_id, tick)
            });
            let Some(target) = target.and_then(|h| self.players.get(h)).map(|p| p.pos) else {
                continue;
            };

            let Some(pk) = self.pickups.get_mut(hk) else { continue };
            let to = target - pk.pos;
            let d = to.length();
            if d > 0.0 {
                pk.pos += to * (pull.min(d) / d);
            }
            clamp_into_circle(&mut pk.pos, border - pk.radius);
        }
    }

    /// Stage 14: touching (not magnet range) collects. Spills wait out the
    /// readability delay and their lock.
    pub(super) fn resolve_collection(&mut self) {
        let tick = self.tick;
        for hk in self.pickup_order() {
            let Some(pk) = self.pickups.get(hk) else { continue };
            if pk.collected || !pk.collectible_at(tick) {
                continue;
            }
            let snapshot = pk.clone();

            let collector = self.nearest_player(snapshot.pos, snapshot.radius, |p, d| {
                d <= p.radius() + snapshot.radius && snapshot.eligible_for(&p.session_id, tick)
            });
            let Some(hp) = collector else { continue };

            if let Some(p) = self.players.get_mut(hp) {
                p.add_mass(snapshot.value, &self.config);
            }
            if let Some(pk) = self.pickups.get_mut(hk) {
                pk.collected = true;
            }
        }
    }
}
