//! Scalar and 2D vector math shared by the simulation.
//!
//! Every function here is a pure function of its arguments. The tick relies on
//! that for bit-identical replays.

use bytemuck::{Pod, Zeroable};
use serde::{Deserialize, Serialize};

/// 2D Vector - position, velocity, direction
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable, Serialize, Deserialize)]
pub struct Vec2 {
    /// X component
    pub x: f64,
    /// Y component
    pub y: f64,
}

impl Vec2 {
    /// Creates a new Vec2
    #[must_use]
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Zero vector
    pub const ZERO: Self = Self::new(0.0, 0.0);

    /// Unit X vector
    pub const X: Self = Self::new(1.0, 0.0);

    /// Unit vector at `angle` radians.
    #[must_use]
    pub fn from_angle(angle: f64) -> Self {
        Self::new(angle.cos(), angle.sin())
    }

    /// Dot product
    #[must_use]
    pub fn dot(self, other: Self) -> f64 {
        self.x * other.x + self.y * other.y
    }

    /// Length squared (avoids sqrt)
    #[must_use]
    pub fn length_squared(self) -> f64 {
        self.dot(self)
    }

    /// Length
    #[must_use]
    pub fn length(self) -> f64 {
        self.length_squared().sqrt()
    }

    /// Unit vector in the same direction, or `None` for (near-)zero or
    /// non-finite input.
    #[must_use]
    pub fn normalized(self) -> Option<Self> {
        let len = self.length();
        if !len.is_finite() || len < 1e-9 {
            return None;
        }
        Some(self * (1.0 / len))
    }

    /// True when both components are finite.
    #[must_use]
    pub fn is_finite(self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }

    /// Raw bits of both components, for hashing.
    #[must_use]
    pub fn to_bits(self) -> [u64; 2] {
        [self.x.to_bits(), self.y.to_bits()]
    }
}

impl std::ops::Add for Vec2 {
    type Output = Self;
    fn add(self, rhs: Self) -> Self {
        Self::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl std::ops::AddAssign for Vec2 {
    fn add_assign(&mut self, rhs: Self) {
        self.x += rhs.x;
        self.y += rhs.y;
    }
}

impl std::ops::Sub for Vec2 {
    type Output = Self;
    fn sub(self, rhs: Self) -> Self {
        Self::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl std::ops::SubAssign for Vec2 {
    fn sub_assign(&mut self, rhs: Self) {
        self.x -= rhs.x;
        self.y -= rhs.y;
    }
}

impl std::ops::Mul<f64> for Vec2 {
    type Output = Self;
    fn mul(self, rhs: f64) -> Self {
        Self::new(self.x * rhs, self.y * rhs)
    }
}

impl std::ops::MulAssign<f64> for Vec2 {
    fn mul_assign(&mut self, rhs: f64) {
        self.x *= rhs;
        self.y *= rhs;
    }
}

impl std::ops::Neg for Vec2 {
    type Output = Self;
    fn neg(self) -> Self {
        Self::new(-self.x, -self.y)
    }
}

/// Distance between two points.
#[inline]
#[must_use]
pub fn distance(a: Vec2, b: Vec2) -> f64 {
    (a - b).length()
}

/// Squared distance between two points (avoids sqrt).
#[inline]
#[must_use]
pub fn distance_sq(a: Vec2, b: Vec2) -> f64 {
    (a - b).length_squared()
}

/// Linear interpolation from `a` to `b` by `t`.
#[inline]
#[must_use]
pub fn lerp(a: f64, b: f64, t: f64) -> f64 {
    a + (b - a) * t
}

/// Clamps `value` into `[min, max]`. NaN maps to `min`.
#[inline]
#[must_use]
pub fn clamp(value: f64, min: f64, max: f64) -> f64 {
    if value.is_nan() {
        return min;
    }
    value.max(min).min(max)
}

/// Does the segment `a -> b` pass within `radius` of `center`?
///
/// Used for swept bullet tests so fast bullets cannot tunnel through a body
/// between two ticks.
#[must_use]
pub fn segment_circle_intersects(a: Vec2, b: Vec2, center: Vec2, radius: f64) -> bool {
    let ab = b - a;
    let len_sq = ab.length_squared();
    let t = if len_sq <= f64::EPSILON {
        0.0
    } else {
        clamp((center - a).dot(ab) / len_sq, 0.0, 1.0)
    };
    let closest = a + ab * t;
    distance_sq(closest, center) <= radius * radius
}

/// Player radius for `mass` relative to the original stake.
///
/// `radius = base + scale * sqrt(mass / spawn_mass)`, capped. Non-decreasing in
/// `mass` for a fixed `spawn_mass`.
#[must_use]
pub fn player_radius(mass: u64, spawn_mass: u64, base: f64, scale: f64, cap: f64) -> f64 {
    let ratio = mass as f64 / spawn_mass.max(1) as f64;
    (base + scale * ratio.sqrt()).min(cap)
}

/// Pickup radius for a pickup worth `value`, relative to one pellet.
#[must_use]
pub fn pickup_radius(value: u64, pellet_value: u64, base: f64, scale: f64, cap: f64) -> f64 {
    let ratio = value as f64 / pellet_value.max(1) as f64;
    (base + scale * ratio.sqrt()).min(cap)
}

/// Movement multiplier: big bodies turn and accelerate slower.
///
/// `clamp(sqrt(reference / radius), min, max)`.
#[must_use]
pub fn mobility_for_radius(radius: f64, reference: f64, min: f64, max: f64) -> f64 {
    if radius <= 0.0 {
        return max;
    }
    clamp((reference / radius).sqrt(), min, max)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vec2_operations() {
        let a = Vec2::new(3.0, 4.0);
        assert_eq!(a.length(), 5.0);
        assert_eq!((a + Vec2::X).x, 4.0);
        assert_eq!(a.dot(Vec2::new(1.0, 1.0)), 7.0);
        assert!(Vec2::ZERO.normalized().is_none());
        assert!(Vec2::new(f64::NAN, 1.0).normalized().is_none());
    }

    #[test]
    fn test_clamp_nan() {
        assert_eq!(clamp(f64::NAN, -1.0, 1.0), -1.0);
        assert_eq!(clamp(5.0, -1.0, 1.0), 1.0);
        assert_eq!(lerp(0.0, 10.0, 0.25), 2.5);
    }

    #[test]
    fn test_segment_circle() {
        let center = Vec2::new(5.0, 1.0);
        assert!(segment_circle_intersects(Vec2::ZERO, Vec2::new(10.0, 0.0), center, 1.5));
        assert!(!segment_circle_intersects(Vec2::ZERO, Vec2::new(10.0, 0.0), center, 0.5));
        // Circle behind the start point
        assert!(!segment_circle_intersects(Vec2::ZERO, Vec2::new(10.0, 0.0), Vec2::new(-5.0, 0.0), 1.0));
        // Degenerate segment
        assert!(segment_circle_intersects(Vec2::ZERO, Vec2::ZERO, Vec2::new(0.5, 0.0), 1.0));
    }

    #[test]
    fn test_player_radius_monotonic() {
        let mut last = 0.0;
        for mass in (0..5000).step_by(37) {
            let r = player_radius(mass, 1000, 18.0, 22.0, 140.0);
            assert!(r >= last);
            last = r;
        }
        assert_eq!(player_radius(1_000_000_000, 1000, 18.0, 22.0, 140.0), 140.0);
    }

    #[test]
    fn test_mobility_bounds() {
        assert_eq!(mobility_for_radius(1.0, 40.0, 0.45, 1.25), 1.25);
        assert_eq!(mobility_for_radius(10_000.0, 40.0, 0.45, 1.25), 0.45);
        assert_eq!(mobility_for_radius(40.0, 40.0, 0.45, 1.25), 1.0);
    }

    #[test]
    fn test_vec2_bytemuck() {
        let v = Vec2::new(1.0, 2.0);
        let bytes: &[u8] = bytemuck::bytes_of(&v);
        assert_eq!(bytes.len(), 16);
    }
}
