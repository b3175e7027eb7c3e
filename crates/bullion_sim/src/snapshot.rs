//! # World Snapshots
//!
//! Read-only node records handed to the transport for interest-managed
//! delta transmission. How they are encoded on the wire is the transport's
//! business; this module only decides what is in them.

use std::hash::Hasher;

use serde::{Deserialize, Serialize};
use siphasher::sip::SipHasher13;

use bullion_core::{EntityId, EntityKind};
use bullion_shared::Vec2;

/// Player status bitflags.
pub mod status {
    /// Dash burst running.
    pub const DASHING: u32 = 1;
    /// Stunned.
    pub const STUNNED: u32 = 1 << 1;
    /// Exit hold in progress.
    pub const EXITING: u32 = 1 << 2;
    /// Bullet-immune.
    pub const INVULNERABLE: u32 = 1 << 3;
    /// Slowed by a hit.
    pub const SLOWED: u32 = 1 << 4;
    /// Recently hit; cannot exit.
    pub const COMBAT_TAGGED: u32 = 1 << 5;
    /// Hit flash.
    pub const HIT_FLASH: u32 = 1 << 6;
    /// Holding a shot.
    pub const CHARGING_SHOT: u32 = 1 << 7;
    /// Holding a dash.
    pub const CHARGING_DASH: u32 = 1 << 8;
}

/// Axis-aligned query box.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    /// Lower corner.
    pub min: Vec2,
    /// Upper corner.
    pub max: Vec2,
}

impl Rect {
    /// Creates a box from two corners in any order.
    #[must_use]
    pub fn new(a: Vec2, b: Vec2) -> Self {
        Self {
            min: Vec2::new(a.x.min(b.x), a.y.min(b.y)),
            max: Vec2::new(a.x.max(b.x), a.y.max(b.y)),
        }
    }

    /// A box of half-size `half` around `center` (a client's view).
    #[must_use]
    pub fn around(center: Vec2, half: Vec2) -> Self {
        Self::new(center - half, center + half)
    }

    /// Does the circle touch this box?
    #[must_use]
    pub fn overlaps_circle(&self, center: Vec2, radius: f64) -> bool {
        let nearest = Vec2::new(
            center.x.clamp(self.min.x, self.max.x),
            center.y.clamp(self.min.y, self.max.y),
        );
        (nearest - center).length_squared() <= radius * radius
    }
}

/// Snapshot of a player.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PlayerNode {
    /// Entity id.
    pub id: EntityId,
    /// Session.
    pub session_id: String,
    /// Display name.
    pub display_name: String,
    /// Position.
    pub pos: Vec2,
    /// Radius.
    pub radius: f64,
    /// Balance.
    pub mass: u64,
    /// Stake.
    pub spawn_mass: u64,
    /// `0xRRGGBB`, stable per session.
    pub color: u32,
    /// [`status`] bits.
    pub status: u32,
    /// Shot charge in `[0, 1]`.
    pub shoot_charge: f64,
    /// Dash charge in `[0, 1]`.
    pub dash_charge: f64,
    /// Exit progress in `[0, 1]`.
    pub exit_progress: f64,
    /// Ticks until a dash is available.
    pub dash_cooldown: u32,
    /// Ticks until a shot is available.
    pub shoot_cooldown: u32,
}

/// Snapshot of a bullet.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BulletNode {
    /// Entity id.
    pub id: EntityId,
    /// Position.
    pub pos: Vec2,
    /// Velocity, for client extrapolation.
    pub vel: Vec2,
    /// Radius.
    pub radius: f64,
    /// Shooter's session.
    pub owner: String,
}

/// Snapshot of a pellet.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PelletNode {
    /// Entity id.
    pub id: EntityId,
    /// Position.
    pub pos: Vec2,
    /// Radius.
    pub radius: f64,
    /// Value.
    pub mass: u64,
}

/// Snapshot of a spill.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SpillNode {
    /// Entity id.
    pub id: EntityId,
    /// Position.
    pub pos: Vec2,
    /// Radius.
    pub radius: f64,
    /// Value.
    pub mass: u64,
    /// Who caused it.
    pub attacker: Option<String>,
    /// Who lost it.
    pub victim: String,
    /// First tick anyone may take it.
    pub unlock_tick: u64,
}

/// Snapshot of an obstacle.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ObstacleNode {
    /// Entity id.
    pub id: EntityId,
    /// Center.
    pub pos: Vec2,
    /// Radius.
    pub radius: f64,
}

/// One world node, tagged by kind.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum WorldNode {
    /// Player.
    Player(PlayerNode),
    /// Bullet.
    Bullet(BulletNode),
    /// Pellet.
    Pellet(PelletNode),
    /// Spill.
    Spill(SpillNode),
    /// Obstacle.
    Obstacle(ObstacleNode),
}

impl WorldNode {
    /// Entity id.
    #[must_use]
    pub const fn id(&self) -> EntityId {
        match self {
            Self::Player(n) => n.id,
            Self::Bullet(n) => n.id,
            Self::Pellet(n) => n.id,
            Self::Spill(n) => n.id,
            Self::Obstacle(n) => n.id,
        }
    }

    /// Node kind.
    #[must_use]
    pub const fn kind(&self) -> EntityKind {
        match self {
            Self::Player(_) => EntityKind::Player,
            Self::Bullet(_) => EntityKind::Bullet,
            Self::Pellet(_) => EntityKind::Pellet,
            Self::Spill(_) => EntityKind::Spill,
            Self::Obstacle(_) => EntityKind::Obstacle,
        }
    }

    /// Position.
    #[must_use]
    pub const fn pos(&self) -> Vec2 {
        match self {
            Self::Player(n) => n.pos,
            Self::Bullet(n) => n.pos,
            Self::Pellet(n) => n.pos,
            Self::Spill(n) => n.pos,
            Self::Obstacle(n) => n.pos,
        }
    }

    /// Radius.
    #[must_use]
    pub const fn radius(&self) -> f64 {
        match self {
            Self::Player(n) => n.radius,
            Self::Bullet(n) => n.radius,
            Self::Pellet(n) => n.radius,
            Self::Spill(n) => n.radius,
            Self::Obstacle(n) => n.radius,
        }
    }

    /// Feeds every field into `h`, floats by their bit patterns.
    pub fn digest_into(&self, h: &mut impl Hasher) {
        fn vec(h: &mut impl Hasher, v: Vec2) {
            let [x, y] = v.to_bits();
            h.write_u64(x);
            h.write_u64(y);
        }
        fn text(h: &mut impl Hasher, s: &str) {
            h.write_usize(s.len());
            h.write(s.as_bytes());
        }

        h.write_u8(self.kind() as u8);
        h.write_u64(self.id().raw());
        vec(h, self.pos());
        h.write_u64(self.radius().to_bits());
        match self {
            Self::Player(n) => {
                text(h, &n.session_id);
                text(h, &n.display_name);
                h.write_u64(n.mass);
                h.write_u64(n.spawn_mass);
                h.write_u32(n.status);
                h.write_u64(n.shoot_charge.to_bits());
                h.write_u64(n.dash_charge.to_bits());
                h.write_u64(n.exit_progress.to_bits());
                h.write_u32(n.dash_cooldown);
                h.write_u32(n.shoot_cooldown);
            }
            Self::Bullet(n) => {
                vec(h, n.vel);
                text(h, &n.owner);
            }
            Self::Pellet(n) => h.write_u64(n.mass),
            Self::Spill(n) => {
                h.write_u64(n.mass);
                text(h, n.attacker.as_deref().unwrap_or(""));
                text(h, &n.victim);
                h.write_u64(n.unlock_tick);
            }
            Self::Obstacle(_) => {}
        }
    }
}

/// Fixed SipHash keys; digests must agree across processes.
pub(crate) const DIGEST_KEYS: (u64, u64) = (0x6275_6c6c_696f_6e00, 0x7374_6174_6521_0000);

/// Display colour for a session: a hue from the session hash, fixed
/// saturation and lightness.
#[must_use]
pub fn color_for_session(session_id: &str) -> u32 {
    let mut h = SipHasher13::new_with_keys(DIGEST_KEYS.0, DIGEST_KEYS.1);
    h.write(session_id.as_bytes());
    let hue = (h.finish() % 360) as f64;
    hsl_to_rgb(hue, 0.65, 0.55)
}

fn hsl_to_rgb(hue: f64, sat: f64, light: f64) -> u32 {
    let c = (1.0 - (2.0 * light - 1.0).abs()) * sat;
    let hp = hue / 60.0;
    let x = c * (1.0 - (hp % 2.0 - 1.0).abs());
    let (r, g, b) = match hp as u32 {
        0 => (c, x, 0.0),
        1 => (x, c, 0.0),
        2 => (0.0, c, x),
        3 => (0.0, x, c),
        4 => (x, 0.0, c),
        _ => (c, 0.0, x),
    };
    let m = light - c / 2.0;
    let channel = |v: f64| ((v + m) * 255.0).round().clamp(0.0, 255.0) as u32;
    (channel(r) << 16) | (channel(g) << 8) | channel(b)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rect_overlap() {
        let rect = Rect::new(Vec2::new(10.0, 10.0), Vec2::new(-10.0, -10.0));
        assert_eq!(rect.min, Vec2::new(-10.0, -10.0));
        assert!(rect.overlaps_circle(Vec2::new(15.0, 0.0), 5.0));
        assert!(!rect.overlaps_circle(Vec2::new(15.0, 15.0), 5.0));
        assert!(rect.overlaps_circle(Vec2::ZERO, 0.0));
    }

    #[test]
    fn test_color_is_stable() {
        assert_eq!(color_for_session("abc"), color_for_session("abc"));
        assert!(color_for_session("abc") <= 0xFF_FFFF);
        assert_eq!(hsl_to_rgb(0.0, 1.0, 0.5), 0xFF_0000);
        assert_eq!(hsl_to_rgb(120.0, 1.0, 0.5), 0x00_FF00);
    }
}
