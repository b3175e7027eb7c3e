//! Obstacle placement, spawn points, exits, eviction and end-of-tick upkeep.

use tracing::{debug, trace};

use bullion_core::Handle;
use bullion_shared::constants::apply_bps;
use bullion_shared::{distance, Vec2};

use super::Engine;
use crate::entities::{Obstacle, Player};
use crate::events::SimEvent;

impl Engine {
    /// Scatters the room's obstacles once, center-weighted, without overlaps.
    /// An obstacle that finds no free spot is dropped.
    pub(super) fn place_obstacles(&mut self) {
        let cfg = &self.config;
        let margin = cfg.spawn_margin;
        for _ in 0..cfg.obstacle_count {
            let radius = self.rng.range(cfg.obstacle_min_radius, cfg.obstacle_max_radius);
            let reach = (cfg.border_base_radius * cfg.obstacle_spread - radius).max(0.0);

            let mut placed = None;
            for _ in 0..cfg.spawn_attempts {
                let angle = self.rng.angle();
                let pos = Vec2::from_angle(angle) * (reach * self.rng.next_f64().sqrt());
                let clear = self
                    .obstacles
                    .iter()
                    .all(|o| distance(pos, o.pos) > o.radius + radius + margin);
                if clear {
                    placed = Some(pos);
                    break;
                }
            }

            if let Some(pos) = placed {
                let id = self.ids.allocate();
                self.obstacles.push(Obstacle { id, pos, radius });
            }
        }
        self.obstacles.sort_unstable_by_key(|o| o.id);
        debug!(count = self.obstacles.len(), "obstacles placed");
    }

    /// Uniform point inside the border that clears obstacles and live
    /// players. Falls back to an unchecked point when every attempt fails.
    pub(super) fn sample_spawn_point(&mut self, radius: f64) -> Vec2 {
        let margin = self.config.spawn_margin;
        let limit = (self.border.radius - radius - margin).max(0.0);

        for _ in 0..self.config.spawn_attempts {
            let pos = self.random_point(limit);
            let blocked_by_obstacle = self
                .obstacles
                .iter()
                .any(|o| distance(pos, o.pos) <= o.radius + radius + margin);
            let blocked_by_player = self
                .players
                .values()
                .filter(|p| p.alive)
                .any(|p| distance(pos, p.pos) <= p.radius() + radius + margin);
            if !blocked_by_obstacle && !blocked_by_player {
                return pos;
            }
        }

        trace!(radius, "no clear spawn point, using an unchecked one");
        self.random_point(limit)
    }

    fn random_point(&mut self, limit: f64) -> Vec2 {
        let angle = self.rng.angle();
        Vec2::from_angle(angle) * (limit * self.rng.next_f64().sqrt())
    }

    /// Stage 15: exit holds. Completion marks the player gone and reports
    /// the balance they leave with.
    pub(super) fn advance_exits(&mut self, order: &[Handle]) {
        let duration = self.config.exit_duration_ticks;
        for &h in order {
            let Some(p) = self.players.get_mut(h) else { continue };
            if !p.alive {
                continue;
            }
            if p.timers.stun > 0 || !p.input.exit {
                p.reset_exit();
                continue;
            }
            if p.timers.combat_tag > 0 {
                continue;
            }

            p.exit_hold_ticks += 1;
            p.exit_progress = (f64::from(p.exit_hold_ticks) / f64::from(duration)).min(1.0);
            if p.exit_hold_ticks < duration {
                continue;
            }

            p.alive = false;
            p.exited = true;
            debug!(session_id = %p.session_id, mass = p.mass(), "player exited");
            self.events.push(SimEvent::PlayerExited {
                session_id: p.session_id.clone(),
                wallet: p.wallet.clone(),
                mass: p.mass(),
            });
        }
    }

    /// Stage 18: drop dead bullets and taken pickups, then evict players.
    /// Exited players leave quietly; broke or timed-out players spill on the
    /// way out.
    pub(super) fn cleanup(&mut self, order: &[Handle]) {
        let index = &mut self.index;
        self.bullets.retain(|_, b| {
            if b.dead {
                index.remove(&b.id);
            }
            !b.dead
        });
        self.pickups.retain(|_, p| {
            if p.collected {
                index.remove(&p.id);
            }
            !p.collected
        });

        let grace = self.config.disconnect_grace_ticks;
        for &h in order {
            let Some(p) = self.players.get(h) else { continue };
            if p.exited {
                self.evict(h);
                continue;
            }
            let timed_out = p
                .disconnected_at
                .is_some_and(|at| self.tick.saturating_sub(at) >= grace);
            if !p.alive || !(p.mass() <= p.floor(&self.config) || timed_out) {
                continue;
            }

            let Some(p) = self.evict(h) else { continue };
            let spilled = apply_bps(p.mass(), self.config.spill_bps);
            self.recycled += p.mass() - spilled;
            self.spawn_spill(p.pos, p.radius(), spilled, None, &p.session_id);

            let total = spilled + p.fatal_spill;
            debug!(session_id = %p.session_id, spilled = total, timed_out, "player died");
            self.events.push(SimEvent::PlayerDied {
                session_id: p.session_id,
                wallet: p.wallet,
                spilled: total,
            });
        }
    }

    fn evict(&mut self, handle: Handle) -> Option<Player> {
        let mut player = self.players.remove(handle)?;
        player.alive = false;
        self.sessions.remove(&player.session_id);
        self.index.remove(&player.id);
        Some(player)
    }

    /// Stage 19: radii, timers and edge history; report the tick's recycle.
    pub(super) fn finish_tick(&mut self) {
        let cfg = &self.config;
        for (_, p) in self.players.iter_mut() {
            p.refresh_radius(cfg);
            p.timers.tick_down();
            p.prev_input = p.input;
            p.fatal_spill = 0;
        }
        if self.recycled > 0 {
            self.events.push(SimEvent::RecycleMass {
                mass: self.recycled,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::config::SimConfig;
    use crate::engine::Engine;

    #[test]
    fn test_obstacles_do_not_overlap() {
        let engine = Engine::new(SimConfig::default(), 7).unwrap();
        let obstacles = engine.obstacles();
        assert!(!obstacles.is_empty());
        for (i, a) in obstacles.iter().enumerate() {
            for b in &obstacles[i + 1..] {
                assert!(a.id < b.id);
                assert!((a.pos - b.pos).length() > a.radius + b.radius);
            }
        }
    }

    #[test]
    fn test_spawn_points_clear_obstacles() {
        let mut engine = Engine::new(SimConfig::default(), 11).unwrap();
        for i in 0..8 {
            let p = engine.add_player(&format!("s{i}"), "w", "", 1000).unwrap();
            let (pos, radius) = (p.pos, p.radius());
            for o in engine.obstacles() {
                assert!((pos - o.pos).length() > o.radius + radius);
            }
        }
    }
}
