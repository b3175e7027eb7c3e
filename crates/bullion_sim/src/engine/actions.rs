//! Input edges, charge holds, dash and shoot.
//!
//! Costs are a share of `spawn_mass`, not of the current balance, and an
//! action is refused when paying for it would leave the player at or below
//! the floor.

use tracing::trace;

use bullion_core::{EntityKind, Handle};
use bullion_shared::constants::{apply_bps, BPS_DENOMINATOR};

use super::Engine;
use crate::entities::Bullet;
use crate::input::Edges;

/// `amount * bps * permille / (10000 * 1000)`, rounded down.
pub(super) fn scaled_bps(amount: u64, bps: u64, permille: u64) -> u64 {
    let raw = u128::from(amount) * u128::from(bps) * u128::from(permille)
        / (u128::from(BPS_DENOMINATOR) * 1000);
    u64::try_from(raw).unwrap_or(u64::MAX)
}

impl Engine {
    /// Stage 2: press/release edges against last tick's input.
    pub(super) fn compute_edges(&mut self, order: &[Handle]) {
        for &h in order {
            let Some(p) = self.players.get_mut(h) else { continue };
            if !p.alive {
                continue;
            }
            p.edges = Edges::between(&p.prev_input, &p.input);
            if let Some(dir) = p.input.move_dir() {
                p.last_move_dir = dir;
            }
        }
    }

    /// Stage 3: grow held charges unless something blocks them. A blocked
    /// hold loses its charge.
    pub(super) fn accumulate_charges(&mut self, order: &[Handle]) {
        let cfg = &self.config;
        for &h in order {
            let Some(p) = self.players.get_mut(h) else { continue };
            if !p.alive {
                continue;
            }
            let blocked = p.timers.stun > 0 || p.input.exit;

            if p.input.shoot {
                if blocked || p.timers.shoot_cooldown > 0 {
                    p.shoot_charge = 0;
                } else {
                    p.shoot_charge = (p.shoot_charge + 1).min(cfg.shoot_full_charge_ticks);
                }
            }

            if p.input.dash {
                if blocked || p.timers.dash_cooldown > 0 || p.is_dashing() {
                    p.dash_charge = 0;
                } else {
                    p.dash_charge = p.dash_charge.saturating_add(1);
                }
            }
        }
    }

    /// Stage 6: overheat check while holding, dash on release.
    pub(super) fn resolve_dashes(&mut self, order: &[Handle]) {
        let cfg = &self.config;
        for &h in order {
            let Some(p) = self.players.get_mut(h) else { continue };
            if !p.alive {
                continue;
            }

            if p.input.dash && p.dash_charge > cfg.dash_charge_ticks + cfg.dash_overheat_ticks {
                p.timers.stun = p.timers.stun.max(cfg.dash_overheat_stun_ticks);
                p.cancel_commitments();
                trace!(session_id = %p.session_id, "dash overheated");
                continue;
            }

            if !p.edges.dash_released {
                continue;
            }
            let charge = std::mem::take(&mut p.dash_charge);
            if charge < cfg.dash_charge_ticks || p.timers.dash_cooldown > 0 || p.timers.stun > 0 {
                continue;
            }

            let cost = apply_bps(p.spawn_mass, cfg.dash_cost_bps);
            if p.mass().saturating_sub(cost) <= p.floor(cfg) {
                continue;
            }
            self.recycled += p.take_mass(cost, cfg);

            let dir = p.input.move_dir().unwrap_or_else(|| p.aim());
            p.vel += dir * cfg.dash_impulse;
            p.timers.dash_active = cfg.dash_active_ticks;
            p.timers.invulnerable = p.timers.invulnerable.max(cfg.dash_invulnerable_ticks);
            p.timers.dash_cooldown = cfg.dash_cooldown_ticks;
        }
    }

    /// Stage 7: fire on release. Charge scales cost, damage, speed, size and
    /// recoil; a shot cancels a running dash.
    pub(super) fn resolve_shots(&mut self, order: &[Handle]) {
        let cfg = &self.config;
        for &h in order {
            let Some(p) = self.players.get_mut(h) else { continue };
            if !p.alive || !p.edges.shoot_released {
                continue;
            }
            let charge = std::mem::take(&mut p.shoot_charge);
            if charge == 0 || p.timers.shoot_cooldown > 0 || p.timers.stun > 0 {
                continue;
            }

            let permille = (u64::from(charge) * 1000 / u64::from(cfg.shoot_full_charge_ticks))
                .clamp(cfg.shoot_min_charge_permille, 1000);
            let cost = scaled_bps(p.spawn_mass, cfg.shoot_cost_bps, permille);
            let damage = scaled_bps(p.spawn_mass, cfg.shoot_damage_bps, permille);
            if p.mass().saturating_sub(cost) <= p.floor(cfg) {
                continue;
            }
            self.recycled += p.take_mass(cost, cfg);

            let ratio = permille as f64 / 1000.0;
            let aim = p.aim();
            let speed = cfg.bullet_base_speed + cfg.bullet_speed_scale * ratio;
            let radius = cfg.bullet_base_radius + cfg.bullet_radius_scale * ratio;
            let origin = p.pos + aim * (p.radius() + radius);

            p.vel -= aim * (cfg.shoot_recoil * ratio);
            p.timers.shoot_recovery = cfg.shoot_recovery_ticks;
            p.timers.shoot_cooldown = cfg.shoot_cooldown_ticks;
            p.timers.dash_active = 0;

            let id = self.ids.allocate();
            let handle = self.bullets.insert(Bullet {
                id,
                pos: origin,
                prev_pos: origin,
                vel: aim * speed,
                radius,
                damage,
                owner: p.session_id.clone(),
                ttl: cfg.bullet_ttl_ticks,
                dead: false,
                spent: false,
            });
            self.index.insert(id, (EntityKind::Bullet, handle));
            trace!(session_id = %p.session_id, damage, cost, "shot fired");
        }
    }
}
