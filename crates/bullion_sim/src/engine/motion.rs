//! Border, movement, projectile integration and static collisions.

use bullion_core::{EntityKind, Handle};
use bullion_shared::{clamp, Vec2};

use super::Engine;

/// Velocities below this are snapped to zero for drifting pickups.
const REST_SPEED: f64 = 0.05;

impl Engine {
    /// Stage 1: move the border toward its player-count target.
    pub(super) fn update_border(&mut self) {
        let cfg = &self.config;
        let alive = self.players.values().filter(|p| p.alive).count() as f64;
        let target = clamp(
            cfg.border_base_radius + cfg.border_per_player_radius * alive.sqrt(),
            cfg.border_min_radius,
            cfg.border_max_radius,
        );
        let prev = self.border.radius;
        let delta = clamp(target - prev, -cfg.border_max_speed, cfg.border_max_speed);
        self.border.radius = prev + delta;
        self.border.target = target;
        self.border.velocity = delta;
    }

    /// Stages 4 and 5: acceleration, damping, friction, speed cap, position.
    pub(super) fn integrate_players(&mut self, order: &[Handle]) {
        let cfg = &self.config;
        for &h in order {
            let Some(p) = self.players.get_mut(h) else { continue };
            if !p.alive {
                continue;
            }
            let mobility = p.mobility(cfg);

            if p.input.exit || p.exit_hold_ticks > 0 {
                p.vel *= cfg.exit_damping;
            } else if p.timers.stun == 0 {
                if let Some(dir) = p.input.move_dir() {
                    let mut accel = cfg.acceleration * mobility;
                    if p.timers.slow > 0 {
                        accel *= cfg.slow_factor;
                    }
                    if p.timers.shoot_recovery > 0 {
                        accel *= cfg.shoot_recovery_factor;
                    }
                    p.vel += dir * accel;
                }
            }

            p.vel *= cfg.friction;
            if !p.is_dashing() {
                let cap = cfg.max_speed * mobility;
                let speed = p.vel.length();
                if speed > cap {
                    let slowed = (speed * cfg.overspeed_drag).max(cap);
                    p.vel *= slowed / speed;
                }
            }

            p.pos += p.vel;
            let bound = cfg.bounds_half_extent;
            p.pos = Vec2::new(clamp(p.pos.x, -bound, bound), clamp(p.pos.y, -bound, bound));
            if !p.vel.is_finite() {
                p.vel = Vec2::ZERO;
            }
        }
    }

    /// Stage 8: bullets fly and age; spilled pickups drift to rest.
    pub(super) fn integrate_projectiles(&mut self) {
        let border = self.border.radius;
        for (_, b) in self.bullets.iter_mut() {
            if b.dead {
                continue;
            }
            b.prev_pos = b.pos;
            b.pos += b.vel;
            b.ttl = b.ttl.saturating_sub(1);
            if b.ttl == 0 || b.pos.length() > border + b.radius {
                b.dead = true;
                b.spent = true;
            }
        }

        let friction = self.config.friction;
        for (_, p) in self.pickups.iter_mut() {
            if p.vel == Vec2::ZERO {
                continue;
            }
            p.pos += p.vel;
            p.vel *= friction;
            if p.vel.length() < REST_SPEED {
                p.vel = Vec2::ZERO;
            }
            clamp_into_circle(&mut p.pos, border - p.radius);
        }
    }

    /// Stage 9: push players out of obstacles. Dashing bodies bounce,
    /// everyone else slides.
    pub(super) fn resolve_obstacles(&mut self, order: &[Handle]) {
        let cfg = &self.config;
        for &h in order {
            let Some(p) = self.players.get_mut(h) else { continue };
            if !p.alive {
                continue;
            }
            let hits = self
                .grid
                .query_circle_kind(p.pos, p.radius(), EntityKind::Obstacle);
            for hit in hits {
                let Ok(i) = self.obstacles.binary_search_by_key(&hit.id, |o| o.id) else {
                    continue;
                };
                let o = self.obstacles[i];
                let delta = p.pos - o.pos;
                let min = o.radius + p.radius();
                if delta.length_squared() >= min * min {
                    continue;
                }
                let n = delta.normalized().unwrap_or(Vec2::X);
                p.pos = o.pos + n * min;

                let vn = p.vel.dot(n);
                if vn < 0.0 {
                    if p.is_dashing() {
                        p.vel -= n * (2.0 * vn);
                    } else {
                        p.vel = (p.vel - n * vn) * cfg.obstacle_slide_keep;
                    }
                }
            }
        }
    }

    /// Stage 9: keep players inside the border. A contracting border nudges
    /// clamped players inward.
    pub(super) fn clamp_players_to_border(&mut self, order: &[Handle]) {
        let border = self.border;
        let push = self.config.border_push;
        for &h in order {
            let Some(p) = self.players.get_mut(h) else { continue };
            if !p.alive {
                continue;
            }
            let limit = (border.radius - p.radius()).max(0.0);
            if p.pos.length() <= limit {
                continue;
            }
            let n = p.pos.normalized().unwrap_or(Vec2::X);
            p.pos = n * limit;
            let outward = p.vel.dot(n);
            if outward > 0.0 {
                p.vel -= n * outward;
            }
            if border.velocity < 0.0 {
                p.vel += n * (border.velocity * push);
            }
        }
    }
}

/// Pulls `pos` back inside a circle of `limit` around the origin.
pub(super) fn clamp_into_circle(pos: &mut Vec2, limit: f64) {
    let limit = limit.max(0.0);
    let dist = pos.length();
    if dist > limit {
        *pos = pos.normalized().unwrap_or(Vec2::X) * limit;
    }
}
