//! Per-second taxes and budget-gated pellet spawning.

use tracing::{debug, trace};

use bullion_core::{EntityKind, Handle};
use bullion_shared::constants::apply_bps;
use bullion_shared::{distance, Micro, Vec2};

use super::Engine;
use crate::entities::{Pickup, PickupKind};
use crate::events::SimEvent;

impl Engine {
    /// Stage 16: base tax (ppm of stake, sub-unit carry kept per player) plus
    /// wealth tax on profit. Anyone left at or below the floor is liquidated:
    /// the rest of their balance burns instead of spilling.
    pub(super) fn apply_taxes(&mut self, order: &[Handle]) {
        let cfg = &self.config;
        for &h in order {
            let Some(p) = self.players.get_mut(h) else { continue };
            if !p.alive {
                continue;
            }

            p.tax_carry += Micro::from_ppm_of(p.spawn_mass, cfg.base_tax_ppm);
            let (base, carry) = p.tax_carry.split();
            p.tax_carry = carry;
            let wealth = apply_bps(p.mass().saturating_sub(p.spawn_mass), cfg.wealth_tax_bps);

            self.recycled += p.take_mass(base.saturating_add(wealth), cfg);

            if p.mass() <= p.floor(cfg) {
                let remaining = p.mass();
                self.recycled += p.take_mass(remaining, cfg);
                debug!(session_id = %p.session_id, burned = remaining, "player liquidated");
            }
        }
    }

    /// Stage 17: top the world up with pellets, never past the value cap.
    /// Positions are center-biased (radius linear in a uniform draw) and must
    /// clear every obstacle; a pellet that cannot be placed is skipped.
    pub(super) fn spawn_pellets(&mut self) {
        let Some(baseline) = self.baseline_spawn_mass else { return };
        if !self.players.values().any(|p| p.alive) {
            return;
        }
        let value = self.config.pellet_value_for(baseline);
        let cap = baseline.saturating_mul(self.config.pellet_cap_multiplier);
        let mut world_value: u64 = self
            .pickups
            .values()
            .filter(|p| !p.collected && p.kind == PickupKind::Pellet)
            .map(|p| p.value)
            .sum();

        for _ in 0..self.config.pellet_batch {
            if world_value.saturating_add(value) > cap {
                break;
            }
            let cfg = &self.config;
            let pickup = Pickup::new(
                self.ids.peek(),
                PickupKind::Pellet,
                Vec2::ZERO,
                Vec2::ZERO,
                value,
                value,
                cfg,
            );

            let mut placed = None;
            for _ in 0..cfg.pellet_attempts {
                let angle = self.rng.angle();
                let r = self.border.radius * cfg.pellet_spread * self.rng.next_f64();
                let pos = Vec2::from_angle(angle) * r;
                let clear = self
                    .obstacles
                    .iter()
                    .all(|o| distance(pos, o.pos) > o.radius + pickup.radius);
                if clear {
                    placed = Some(pos);
                    break;
                }
            }
            let Some(pos) = placed else { continue };

            let id = self.ids.allocate();
            let handle = self.pickups.insert(Pickup { id, pos, ..pickup });
            self.index.insert(id, (EntityKind::Pellet, handle));
            self.events.push(SimEvent::PelletSpawned { id, mass: value });
            world_value += value;
            trace!(id = %id, value, "pellet spawned");
        }
    }
}
