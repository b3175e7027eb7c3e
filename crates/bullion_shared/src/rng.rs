//! Deterministic seeded random number generator.
//!
//! Linear-congruential generator with the Numerical Recipes constants. It is
//! small, its whole state is one `u32`, and two rooms seeded identically draw
//! identical sequences on every platform. That is all the tick needs; it is
//! not a cryptographic generator and must never pick anything worth money
//! outside the simulation.

use serde::{Deserialize, Serialize};
use std::f64::consts::TAU;

/// LCG multiplier.
const LCG_A: u32 = 1_664_525;
/// LCG increment.
const LCG_C: u32 = 1_013_904_223;
/// 2^32 as a float, for mapping states onto `[0, 1)`.
const TWO_POW_32: f64 = 4_294_967_296.0;

/// Deterministic LCG. `state = state * A + C (mod 2^32)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeterministicRng {
    state: u32,
}

impl DeterministicRng {
    /// Creates a new RNG with the given seed. Every seed, including 0, is valid.
    #[must_use]
    pub const fn new(seed: u32) -> Self {
        Self { state: seed }
    }

    /// Advances and returns the raw 32-bit state.
    pub fn next_u32(&mut self) -> u32 {
        self.state = self.state.wrapping_mul(LCG_A).wrapping_add(LCG_C);
        self.state
    }

    /// Returns a float in `[0, 1)`.
    pub fn next_f64(&mut self) -> f64 {
        f64::from(self.next_u32()) / TWO_POW_32
    }

    /// Returns a float in `[min, max)`.
    pub fn range(&mut self, min: f64, max: f64) -> f64 {
        min + self.next_f64() * (max - min)
    }

    /// Returns an integer in `0..max`; 0 when `max == 0`.
    pub fn int(&mut self, max: u32) -> u32 {
        if max == 0 {
            return 0;
        }
        ((u64::from(self.next_u32()) * u64::from(max)) >> 32) as u32
    }

    /// Returns an angle in `[0, 2π)`.
    pub fn angle(&mut self) -> f64 {
        self.next_f64() * TAU
    }

    /// Current internal state (for digests and replays).
    #[must_use]
    pub const fn state(&self) -> u32 {
        self.state
    }

    /// Restores a previously captured state.
    pub fn set_state(&mut self, state: u32) {
        self.state = state;
    }
}

impl Default for DeterministicRng {
    fn default() -> Self {
        Self::new(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deterministic_sequence() {
        let mut rng1 = DeterministicRng::new(12345);
        let mut rng2 = DeterministicRng::new(12345);

        for _ in 0..1000 {
            assert_eq!(rng1.next_u32(), rng2.next_u32());
        }
    }

    #[test]
    fn known_first_values() {
        // Numerical Recipes reference: seed 0 -> 1013904223 -> 1196435762
        let mut rng = DeterministicRng::new(0);
        assert_eq!(rng.next_u32(), 1_013_904_223);
        assert_eq!(rng.next_u32(), 1_196_435_762);
    }

    #[test]
    fn int_bounds() {
        let mut rng = DeterministicRng::new(42);
        for _ in 0..1000 {
            assert!(rng.int(10) < 10);
        }
        assert_eq!(rng.int(0), 0);
    }

    #[test]
    fn float_and_angle_bounds() {
        let mut rng = DeterministicRng::new(7);
        for _ in 0..1000 {
            let f = rng.next_f64();
            assert!((0.0..1.0).contains(&f));
            let a = rng.angle();
            assert!((0.0..TAU).contains(&a));
            let r = rng.range(-3.0, 5.0);
            assert!((-3.0..5.0).contains(&r));
        }
    }

    #[test]
    fn state_roundtrip() {
        let mut rng = DeterministicRng::new(99);
        rng.next_u32();
        let saved = rng.state();
        let expected = rng.next_u32();
        rng.set_state(saved);
        assert_eq!(rng.next_u32(), expected);
    }
}
