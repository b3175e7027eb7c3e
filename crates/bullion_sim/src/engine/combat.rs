//! Player rams, bullet hits and damage.

use std::collections::BTreeMap;

use tracing::debug;

use bullion_core::{EntityId, EntityKind, Handle};
use bullion_shared::constants::apply_bps;
use bullion_shared::{distance_sq, segment_circle_intersects, Vec2};

use super::Engine;
use crate::config::SimConfig;
use crate::entities::Player;

/// Damage landed on one player this tick, before it is applied.
#[derive(Debug, Default)]
pub(super) struct PendingDamage {
    pub(super) total: u64,
    /// Summed bullet directions; the knockback direction.
    pub(super) push: Vec2,
    /// Attacker credited with the spill: biggest single contributor,
    /// earliest bullet on ties.
    pub(super) attacker: Option<(u64, String)>,
}

impl PendingDamage {
    fn add(&mut self, damage: u64, from: &str, dir: Vec2) {
        self.total = self.total.saturating_add(damage);
        self.push += dir;
        let replace = self.attacker.as_ref().map_or(true, |(best, _)| damage > *best);
        if replace {
            self.attacker = Some((damage, from.to_string()));
        }
    }
}

/// What one application of damage did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) struct HitOutcome {
    pub(super) spilled: u64,
    pub(super) burned: u64,
    pub(super) lethal: bool,
}

/// Applies `damage` to `p`: clamp to mass, then either a lethal hit (the
/// whole balance spills, nothing burns) or an 80/20 spill/burn split. Also
/// applies hit effects and breaks any exit hold.
pub(super) fn apply_hit(p: &mut Player, damage: u64, push: Vec2, cfg: &SimConfig) -> HitOutcome {
    let mass = p.mass();
    let damage = damage.min(mass);
    let floor = p.floor(cfg);

    let outcome = if mass - damage <= floor {
        p.set_mass(0, cfg);
        p.fatal_spill = mass;
        HitOutcome {
            spilled: mass,
            burned: 0,
            lethal: true,
        }
    } else {
        let spilled = apply_bps(damage, cfg.spill_bps);
        p.set_mass(mass - damage, cfg);
        HitOutcome {
            spilled,
            burned: damage - spilled,
            lethal: false,
        }
    };

    if let Some(dir) = push.normalized() {
        p.vel += dir * cfg.hit_knockback;
    }
    p.timers.slow = p.timers.slow.max(cfg.hit_slow_ticks);
    p.timers.combat_tag = p.timers.combat_tag.max(cfg.combat_tag_ticks);
    p.timers.hit_flash = cfg.hit_flash_ticks;
    p.reset_exit();
    outcome
}

/// Separates two overlapping players and resolves the contact. A dashing
/// body rams a non-dashing one; two dashers compare momentum.
fn resolve_pair(a: &mut Player, b: &mut Player, cfg: &SimConfig) {
    let delta = b.pos - a.pos;
    let min = a.radius() + b.radius();
    let dist = delta.length();
    if dist >= min {
        return;
    }
    let n = delta.normalized().unwrap_or(Vec2::X);
    let half = (min - dist) / 2.0;
    a.pos -= n * half;
    b.pos += n * half;

    let a_wins = match (a.is_dashing(), b.is_dashing()) {
        (true, false) => Some(true),
        (false, true) => Some(false),
        (true, true) => {
            let pa = a.mass() as f64 * a.vel.length();
            let pb = b.mass() as f64 * b.vel.length();
            Some(pa >= pb)
        }
        (false, false) => None,
    };

    match a_wins {
        Some(a_wins) => {
            // `dir` points from winner to loser.
            let (winner, loser, dir) = if a_wins { (a, b, n) } else { (b, a, -n) };
            loser.timers.stun = loser.timers.stun.max(cfg.dash_hit_stun_ticks);
            loser.timers.dash_active = 0;
            loser.cancel_commitments();
            loser.vel = dir * cfg.dash_knockback;
            winner.vel = -dir * cfg.dash_knockback;
        }
        None => {
            let approach = (b.vel - a.vel).dot(n);
            if approach < 0.0 {
                let inv_a = 1.0 / a.mass().max(1) as f64;
                let inv_b = 1.0 / b.mass().max(1) as f64;
                let j = -(1.0 + cfg.pair_restitution) * approach / (inv_a + inv_b);
                a.vel -= n * (j * inv_a);
                b.vel += n * (j * inv_b);
            }
        }
    }
}

impl Engine {
    /// Stage 10: every overlapping pair once, lower id first.
    pub(super) fn resolve_player_pairs(&mut self, order: &[Handle]) {
        let cfg = &self.config;
        let reach = 2.0 * cfg.player_max_radius;
        for &ha in order {
            let Some(a) = self.players.get(ha) else { continue };
            if !a.alive {
                continue;
            }
            let (a_id, a_pos, a_radius) = (a.id, a.pos, a.radius());

            let candidates = self
                .grid
                .query_circle_kind(a_pos, a_radius + reach, EntityKind::Player);
            for c in candidates {
                if c.id <= a_id {
                    continue;
                }
                let Some(&(EntityKind::Player, hb)) = self.index.get(&c.id) else {
                    continue;
                };
                let Some((a, b)) = self.players.get2_mut(ha, hb) else { continue };
                if a.alive && b.alive {
                    resolve_pair(a, b, cfg);
                }
            }
        }
    }

    /// Stage 11: swept bullet tests, obstacles first, then the nearest player
    /// along the path. Returns damage per victim, keyed by id.
    pub(super) fn resolve_bullets(&mut self) -> BTreeMap<EntityId, PendingDamage> {
        let mut pending: BTreeMap<EntityId, PendingDamage> = BTreeMap::new();

        for hb in self.bullet_order() {
            let Some(b) = self.bullets.get(hb) else { continue };
            if b.dead && !b.spent {
                continue;
            }
            let (from, to, radius) = (b.prev_pos, b.pos, b.radius);

            let blocked = self
                .obstacles
                .iter()
                .any(|o| segment_circle_intersects(from, to, o.pos, o.radius + radius));
            if blocked {
                if let Some(b) = self.bullets.get_mut(hb) {
                    b.dead = true;
                }
                continue;
            }

            let mid = (from + to) * 0.5;
            let reach = (to - from).length() * 0.5 + radius;
            let mut best: Option<(f64, Handle)> = None;
            for c in self.grid.query_circle_kind(mid, reach, EntityKind::Player) {
                let Some(&(EntityKind::Player, hp)) = self.index.get(&c.id) else {
                    continue;
                };
                let Some(p) = self.players.get(hp) else { continue };
                if !p.alive || p.session_id == b.owner {
                    continue;
                }
                if segment_circle_intersects(from, to, p.pos, p.radius() + radius) {
                    let d = distance_sq(from, p.pos);
                    if best.map_or(true, |(bd, _)| d < bd) {
                        best = Some((d, hp));
                    }
                }
            }

            let Some((_, hp)) = best else { continue };
            let (damage, owner, dir) = (b.damage, b.owner.clone(), b.vel);
            if let Some(b) = self.bullets.get_mut(hb) {
                b.dead = true;
            }
            let Some(p) = self.players.get(hp) else { continue };
            if p.is_charging_dash() || p.timers.invulnerable > 0 {
                continue;
            }
            pending
                .entry(p.id)
                .or_default()
                .add(damage, &owner, dir.normalized().unwrap_or(Vec2::ZERO));
        }
        pending
    }

    /// Stage 12: one summed hit per victim, in id order.
    pub(super) fn apply_damage(&mut self, pending: BTreeMap<EntityId, PendingDamage>) {
        for (victim_id, hit) in pending {
            let Some(hv) = self.player_handle(victim_id) else { continue };
            let Some(p) = self.players.get_mut(hv) else { continue };
            if !p.alive || p.mass() == 0 {
                continue;
            }
            let (origin, spread) = (p.pos, p.radius());
            let outcome = apply_hit(p, hit.total, hit.push, &self.config);
            self.recycled += outcome.burned;
            let victim = p.session_id.clone();
            let attacker = hit.attacker.map(|(_, session)| session);

            if outcome.lethal {
                debug!(victim = %victim, attacker = ?attacker, spilled = outcome.spilled, "lethal hit");
                let boost = self.config.kill_magnet_boost_ticks;
                if let Some(killer) = attacker
                    .as_deref()
                    .and_then(|s| self.sessions.get(s))
                    .and_then(|h| self.players.get_mut(*h))
                {
                    killer.timers.magnet_boost = killer.timers.magnet_boost.max(boost);
                }
            }
            self.spawn_spill(origin, spread, outcome.spilled, attacker, &victim);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn player(id: u64, mass: u64, pos: Vec2) -> Player {
        Player::new(
            EntityId::new(id),
            format!("s{id}"),
            format!("w{id}"),
            String::new(),
            mass,
            pos,
            &SimConfig::default(),
        )
    }

    #[test]
    fn test_non_lethal_split() {
        let cfg = SimConfig::default();
        let mut p = player(1, 1000, Vec2::ZERO);
        let outcome = apply_hit(&mut p, 300, Vec2::X, &cfg);

        assert_eq!(outcome, HitOutcome { spilled: 240, burned: 60, lethal: false });
        assert_eq!(p.mass(), 700);
        assert_eq!(p.timers.combat_tag, cfg.combat_tag_ticks);
        assert!(p.vel.x > 0.0);
    }

    #[test]
    fn test_lethal_spills_everything() {
        let cfg = SimConfig::default();
        let mut p = player(1, 1000, Vec2::ZERO);
        p.set_mass(100, &cfg);
        p.exit_hold_ticks = 30;

        let outcome = apply_hit(&mut p, 80, Vec2::ZERO, &cfg);
        assert_eq!(outcome, HitOutcome { spilled: 100, burned: 0, lethal: true });
        assert_eq!(p.mass(), 0);
        assert_eq!(p.exit_hold_ticks, 0);

        // Overkill is clamped to the balance
        let mut q = player(2, 1000, Vec2::ZERO);
        let outcome = apply_hit(&mut q, 5000, Vec2::ZERO, &cfg);
        assert_eq!(outcome.spilled, 1000);
        assert_eq!(q.mass(), 0);
    }

    #[test]
    fn test_dash_ram_stuns_loser() {
        let cfg = SimConfig::default();
        let mut a = player(1, 1000, Vec2::ZERO);
        let mut b = player(2, 1000, Vec2::new(50.0, 0.0));
        a.timers.dash_active = 3;
        b.exit_hold_ticks = 10;

        resolve_pair(&mut a, &mut b, &cfg);
        assert_eq!(b.timers.stun, cfg.dash_hit_stun_ticks);
        assert_eq!(b.exit_hold_ticks, 0);
        assert_eq!(b.vel, Vec2::new(cfg.dash_knockback, 0.0));
        assert_eq!(a.vel, Vec2::new(-cfg.dash_knockback, 0.0));
        assert_eq!(a.timers.stun, 0);
        assert!((b.pos - a.pos).length() >= a.radius() + b.radius() - 1e-9);
    }

    #[test]
    fn test_plain_bounce_conserves_momentum() {
        let cfg = SimConfig::default();
        let mut a = player(1, 1000, Vec2::ZERO);
        let mut b = player(2, 1000, Vec2::new(60.0, 0.0));
        a.vel = Vec2::new(4.0, 0.0);

        resolve_pair(&mut a, &mut b, &cfg);
        assert!((a.vel.x + b.vel.x - 4.0).abs() < 1e-9);
        assert!(b.vel.x > a.vel.x);
        assert_eq!(a.timers.stun + b.timers.stun, 0);
    }
}
