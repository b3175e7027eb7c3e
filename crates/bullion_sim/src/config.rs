//! # Simulation Configuration
//!
//! Every tuning value the tick reads. Loaded from TOML; any field left out
//! keeps its default, so an empty file is a valid config.
//!
//! Money-like values (costs, damage, taxes) are integer basis points or ppm
//! of a player's `spawn_mass`. Physics values are plain floats in world units
//! per tick.

use std::path::Path;

use serde::{Deserialize, Serialize};

use bullion_shared::constants::{apply_bps, BPS_DENOMINATOR, PPM_DENOMINATOR};
use bullion_shared::TICK_RATE;

use crate::error::{SimError, SimResult};

/// Room simulation tuning.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    // =========================================================================
    // WORLD
    // =========================================================================
    /// Ticks per second.
    pub tick_rate: u32,
    /// Half-extent of the legacy rectangular bounds.
    pub bounds_half_extent: f64,
    /// Spatial grid cell edge.
    pub grid_cell_size: f64,

    // =========================================================================
    // BORDER
    // =========================================================================
    /// Border radius with no players.
    pub border_base_radius: f64,
    /// Border growth per `sqrt(alive players)`.
    pub border_per_player_radius: f64,
    /// Smallest border radius.
    pub border_min_radius: f64,
    /// Largest border radius.
    pub border_max_radius: f64,
    /// Maximum border change per tick.
    pub border_max_speed: f64,
    /// Fraction of border contraction speed added inward to clamped players.
    pub border_push: f64,

    // =========================================================================
    // OBSTACLES
    // =========================================================================
    /// Obstacles placed per room.
    pub obstacle_count: u32,
    /// Smallest obstacle radius.
    pub obstacle_min_radius: f64,
    /// Largest obstacle radius.
    pub obstacle_max_radius: f64,
    /// Obstacles are placed within `spread * border_base_radius`.
    pub obstacle_spread: f64,

    // =========================================================================
    // BODIES
    // =========================================================================
    /// Player radius at zero mass.
    pub player_base_radius: f64,
    /// Player radius growth per `sqrt(mass / spawn_mass)`.
    pub player_radius_scale: f64,
    /// Player radius cap.
    pub player_max_radius: f64,
    /// Pickup radius at zero value.
    pub pickup_base_radius: f64,
    /// Pickup radius growth per `sqrt(value / pellet_value)`.
    pub pickup_radius_scale: f64,
    /// Pickup radius cap.
    pub pickup_max_radius: f64,

    // =========================================================================
    // MOVEMENT
    // =========================================================================
    /// Radius at which mobility is exactly 1.
    pub mobility_reference_radius: f64,
    /// Mobility floor.
    pub mobility_min: f64,
    /// Mobility ceiling.
    pub mobility_max: f64,
    /// Acceleration per tick at mobility 1.
    pub acceleration: f64,
    /// Speed cap at mobility 1.
    pub max_speed: f64,
    /// Velocity multiplier applied every tick.
    pub friction: f64,
    /// Velocity multiplier applied while over the speed cap.
    pub overspeed_drag: f64,
    /// Velocity multiplier while holding exit.
    pub exit_damping: f64,
    /// Acceleration multiplier while slowed.
    pub slow_factor: f64,
    /// Acceleration multiplier during shoot recovery.
    pub shoot_recovery_factor: f64,

    // =========================================================================
    // ECONOMY FLOOR
    // =========================================================================
    /// Minimum balance, in bps of spawn mass.
    pub floor_bps: u64,

    // =========================================================================
    // DASH
    // =========================================================================
    /// Dash cost in bps of spawn mass.
    pub dash_cost_bps: u64,
    /// Hold ticks needed for a dash.
    pub dash_charge_ticks: u32,
    /// Ticks past full charge before the dash overheats.
    pub dash_overheat_ticks: u32,
    /// Self-stun applied by an overheat.
    pub dash_overheat_stun_ticks: u32,
    /// Dash impulse.
    pub dash_impulse: f64,
    /// Active dash window.
    pub dash_active_ticks: u32,
    /// Bullet invulnerability after dashing.
    pub dash_invulnerable_ticks: u32,
    /// Dash cooldown.
    pub dash_cooldown_ticks: u32,

    // =========================================================================
    // SHOOT
    // =========================================================================
    /// Hold ticks for a full-strength shot.
    pub shoot_full_charge_ticks: u32,
    /// Minimum charge ratio, in permille.
    pub shoot_min_charge_permille: u64,
    /// Full-charge shot cost in bps of spawn mass.
    pub shoot_cost_bps: u64,
    /// Full-charge shot damage in bps of spawn mass.
    pub shoot_damage_bps: u64,
    /// Bullet speed at zero charge.
    pub bullet_base_speed: f64,
    /// Bullet speed added at full charge.
    pub bullet_speed_scale: f64,
    /// Bullet radius at zero charge.
    pub bullet_base_radius: f64,
    /// Bullet radius added at full charge.
    pub bullet_radius_scale: f64,
    /// Bullet lifetime.
    pub bullet_ttl_ticks: u32,
    /// Recoil at full charge.
    pub shoot_recoil: f64,
    /// Slowed-movement window after a shot.
    pub shoot_recovery_ticks: u32,
    /// Shot cooldown.
    pub shoot_cooldown_ticks: u32,

    // =========================================================================
    // COLLISIONS
    // =========================================================================
    /// Tangential velocity kept when sliding along an obstacle.
    pub obstacle_slide_keep: f64,
    /// Player-vs-player restitution.
    pub pair_restitution: f64,
    /// Stun dealt by a dash ram.
    pub dash_hit_stun_ticks: u32,
    /// Knockback speed on both sides of a dash ram.
    pub dash_knockback: f64,

    // =========================================================================
    // DAMAGE
    // =========================================================================
    /// Share of non-lethal damage that is spilled, in bps. The rest burns.
    pub spill_bps: u64,
    /// Knockback speed on a bullet hit.
    pub hit_knockback: f64,
    /// Slow applied by a hit.
    pub hit_slow_ticks: u32,
    /// Combat tag applied by a hit; blocks exit progress.
    pub combat_tag_ticks: u32,
    /// Hit flash duration.
    pub hit_flash_ticks: u32,
    /// Magnet boost granted for a kill.
    pub kill_magnet_boost_ticks: u32,

    // =========================================================================
    // SPILLS
    // =========================================================================
    /// Most pickups a single spill is split into.
    pub spill_max_chunks: u64,
    /// Target chunk size, in pellet values.
    pub spill_chunk_pellets: u64,
    /// Slowest fling speed.
    pub spill_min_speed: f64,
    /// Fastest fling speed.
    pub spill_max_speed: f64,
    /// Ticks a spill is reserved for the attacker.
    pub spill_lock_ticks: u64,
    /// Ticks before a spill can be collected at all.
    pub spill_collect_delay_ticks: u64,

    // =========================================================================
    // MAGNET
    // =========================================================================
    /// Reach beyond the player radius.
    pub magnet_range: f64,
    /// Range multiplier while boosted.
    pub magnet_boost_factor: f64,
    /// Most a pickup moves toward its magnet per tick.
    pub magnet_pull: f64,

    // =========================================================================
    // EXIT
    // =========================================================================
    /// Uninterrupted hold ticks needed to cash out.
    pub exit_duration_ticks: u32,

    // =========================================================================
    // TAX
    // =========================================================================
    /// Ticks between tax passes.
    pub tax_interval_ticks: u64,
    /// Base tax per pass, ppm of spawn mass.
    pub base_tax_ppm: u64,
    /// Wealth tax per pass, bps of profit over spawn mass.
    pub wealth_tax_bps: u64,

    // =========================================================================
    // PELLETS
    // =========================================================================
    /// Ticks between pellet passes.
    pub pellet_interval_ticks: u64,
    /// Most pellets spawned per pass.
    pub pellet_batch: u32,
    /// Pellet value, bps of baseline spawn mass.
    pub pellet_value_bps: u64,
    /// World pellet value cap, multiple of baseline spawn mass.
    pub pellet_cap_multiplier: u64,
    /// Pellets are placed within `spread * border radius`.
    pub pellet_spread: f64,
    /// Placement attempts per pellet.
    pub pellet_attempts: u32,

    // =========================================================================
    // LIFECYCLE
    // =========================================================================
    /// Ticks a disconnected player stays in the world.
    pub disconnect_grace_ticks: u64,
    /// Spawn rejection-sampling attempts.
    pub spawn_attempts: u32,
    /// Clearance kept around spawn points.
    pub spawn_margin: f64,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            tick_rate: TICK_RATE,
            bounds_half_extent: 2000.0,
            grid_cell_size: 128.0,

            border_base_radius: 700.0,
            border_per_player_radius: 180.0,
            border_min_radius: 500.0,
            border_max_radius: 2000.0,
            border_max_speed: 3.0,
            border_push: 1.0,

            obstacle_count: 10,
            obstacle_min_radius: 40.0,
            obstacle_max_radius: 90.0,
            obstacle_spread: 0.75,

            player_base_radius: 18.0,
            player_radius_scale: 22.0,
            player_max_radius: 140.0,
            pickup_base_radius: 4.0,
            pickup_radius_scale: 2.0,
            pickup_max_radius: 14.0,

            mobility_reference_radius: 40.0,
            mobility_min: 0.45,
            mobility_max: 1.25,
            acceleration: 1.1,
            max_speed: 9.0,
            friction: 0.88,
            overspeed_drag: 0.7,
            exit_damping: 0.55,
            slow_factor: 0.6,
            shoot_recovery_factor: 0.5,

            floor_bps: 250,

            dash_cost_bps: 100,
            dash_charge_ticks: 8,
            dash_overheat_ticks: 30,
            dash_overheat_stun_ticks: 30,
            dash_impulse: 26.0,
            dash_active_ticks: 6,
            dash_invulnerable_ticks: 6,
            dash_cooldown_ticks: 40,

            shoot_full_charge_ticks: 20,
            shoot_min_charge_permille: 200,
            shoot_cost_bps: 200,
            shoot_damage_bps: 3000,
            bullet_base_speed: 16.0,
            bullet_speed_scale: 14.0,
            bullet_base_radius: 5.0,
            bullet_radius_scale: 5.0,
            bullet_ttl_ticks: 40,
            shoot_recoil: 5.0,
            shoot_recovery_ticks: 6,
            shoot_cooldown_ticks: 10,

            obstacle_slide_keep: 0.85,
            pair_restitution: 0.5,
            dash_hit_stun_ticks: 24,
            dash_knockback: 14.0,

            spill_bps: 8000,
            hit_knockback: 6.0,
            hit_slow_ticks: 30,
            combat_tag_ticks: 60,
            hit_flash_ticks: 4,
            kill_magnet_boost_ticks: 100,

            spill_max_chunks: 12,
            spill_chunk_pellets: 4,
            spill_min_speed: 5.0,
            spill_max_speed: 11.0,
            spill_lock_ticks: 60,
            spill_collect_delay_ticks: 10,

            magnet_range: 70.0,
            magnet_boost_factor: 2.0,
            magnet_pull: 6.0,

            exit_duration_ticks: 60,

            tax_interval_ticks: 20,
            base_tax_ppm: 500,
            wealth_tax_bps: 20,

            pellet_interval_ticks: 10,
            pellet_batch: 6,
            pellet_value_bps: 50,
            pellet_cap_multiplier: 4,
            pellet_spread: 0.92,
            pellet_attempts: 6,

            disconnect_grace_ticks: 200,
            spawn_attempts: 24,
            spawn_margin: 30.0,
        }
    }
}

impl SimConfig {
    /// Parses a TOML document and validates it.
    ///
    /// # Errors
    ///
    /// Returns an error if the document is malformed or a value is out of range.
    pub fn from_toml_str(text: &str) -> SimResult<Self> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads and parses a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is invalid.
    pub fn load(path: impl AsRef<Path>) -> SimResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    /// Checks ranges the tick relies on.
    ///
    /// # Errors
    ///
    /// Returns `SimError::InvalidConfig` naming the first bad field.
    pub fn validate(&self) -> SimResult<()> {
        fn bad(field: &str) -> SimResult<()> {
            Err(SimError::InvalidConfig(field.to_string()))
        }

        if self.tick_rate == 0 {
            return bad("tick_rate must be positive");
        }
        if !(self.grid_cell_size.is_finite() && self.grid_cell_size > 0.0) {
            return bad("grid_cell_size must be positive");
        }
        if self.border_min_radius <= 0.0 || self.border_min_radius > self.border_max_radius {
            return bad("border_min_radius must be in (0, border_max_radius]");
        }
        if !(0.0..=1.0).contains(&self.friction) || !(0.0..=1.0).contains(&self.overspeed_drag) {
            return bad("friction and overspeed_drag must be in [0, 1]");
        }
        if self.obstacle_min_radius > self.obstacle_max_radius {
            return bad("obstacle_min_radius must not exceed obstacle_max_radius");
        }
        if self.floor_bps >= BPS_DENOMINATOR || self.spill_bps > BPS_DENOMINATOR {
            return bad("floor_bps must be < 10000 and spill_bps <= 10000");
        }
        if self.shoot_full_charge_ticks == 0 || self.shoot_min_charge_permille > 1000 {
            return bad("shoot charge settings out of range");
        }
        if self.base_tax_ppm > PPM_DENOMINATOR {
            return bad("base_tax_ppm must be <= 1000000");
        }
        if self.exit_duration_ticks == 0 {
            return bad("exit_duration_ticks must be positive");
        }
        if self.tax_interval_ticks == 0 || self.pellet_interval_ticks == 0 {
            return bad("tax and pellet intervals must be positive");
        }
        if self.spill_max_chunks == 0 || self.spill_chunk_pellets == 0 {
            return bad("spill chunking must be positive");
        }
        if self.spill_min_speed > self.spill_max_speed {
            return bad("spill_min_speed must not exceed spill_max_speed");
        }
        Ok(())
    }

    /// Minimum balance for a player staked with `spawn_mass`.
    #[must_use]
    pub const fn floor_for(&self, spawn_mass: u64) -> u64 {
        apply_bps(spawn_mass, self.floor_bps)
    }

    /// Pellet value for a room whose baseline stake is `baseline`.
    #[must_use]
    pub fn pellet_value_for(&self, baseline: u64) -> u64 {
        apply_bps(baseline, self.pellet_value_bps).max(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = SimConfig::default();
        config.validate().unwrap();
        assert_eq!(config.floor_for(1000), 25);
        assert_eq!(config.pellet_value_for(1000), 5);
        assert_eq!(config.pellet_value_for(10), 1);
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = SimConfig::from_toml_str("exit_duration_ticks = 40\nfriction = 0.9\n").unwrap();
        assert_eq!(config.exit_duration_ticks, 40);
        assert_eq!(config.friction, 0.9);
        assert_eq!(config.dash_cost_bps, 100);
    }

    #[test]
    fn test_rejects_bad_values() {
        assert!(matches!(
            SimConfig::from_toml_str("tick_rate = 0"),
            Err(SimError::InvalidConfig(_))
        ));
        assert!(matches!(
            SimConfig::from_toml_str("floor_bps = 10000"),
            Err(SimError::InvalidConfig(_))
        ));
        assert!(matches!(
            SimConfig::from_toml_str("friction = \"fast\""),
            Err(SimError::ConfigParse(_))
        ));
    }
}
