//! # Fixed-Point Micro Units
//!
//! **NO FLOATING POINT IN MONEY**
//!
//! Per-second taxes are often a fraction of one mass unit. Rounding them away
//! every second would silently exempt small stakes, so we accumulate them in
//! micro units (10^-6 of a mass unit) and only move whole units.
//!
//! ## Why Fixed-Point?
//!
//! - Deterministic: same calculation = same result on all hardware
//! - Exact carry: the sub-unit remainder is preserved across seconds
//! - Auditable: every recycled unit can be reproduced from the inputs

use std::fmt;
use std::ops::{Add, AddAssign};

use serde::{Deserialize, Serialize};

/// Micro units per whole mass unit.
const MICROS_PER_UNIT: u64 = 1_000_000;

/// An amount of mass with 6 implied decimals.
///
/// Internally stores `value * 10^6` as a u64.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[repr(transparent)]
pub struct Micro(u64);

impl Micro {
    /// Zero value.
    pub const ZERO: Self = Self(0);

    /// Creates from whole units.
    #[inline]
    #[must_use]
    pub const fn from_units(units: u64) -> Self {
        Self(units.saturating_mul(MICROS_PER_UNIT))
    }

    /// Creates from a raw micro value.
    #[inline]
    #[must_use]
    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    /// `units * ppm` expressed in micro units (ppm of a unit == micro units).
    #[inline]
    #[must_use]
    pub const fn from_ppm_of(units: u64, ppm: u64) -> Self {
        let raw = units as u128 * ppm as u128;
        if raw > u64::MAX as u128 {
            Self(u64::MAX)
        } else {
            Self(raw as u64)
        }
    }

    /// Returns the raw micro value.
    #[inline]
    #[must_use]
    pub const fn raw(self) -> u64 {
        self.0
    }

    /// Whole-unit part.
    #[inline]
    #[must_use]
    pub const fn whole(self) -> u64 {
        self.0 / MICROS_PER_UNIT
    }

    /// Sub-unit remainder.
    #[inline]
    #[must_use]
    pub const fn fraction(self) -> Self {
        Self(self.0 % MICROS_PER_UNIT)
    }

    /// Splits into whole units and the remaining carry.
    #[inline]
    #[must_use]
    pub const fn split(self) -> (u64, Self) {
        (self.whole(), self.fraction())
    }
}

impl Add for Micro {
    type Output = Self;

    #[inline]
    fn add(self, rhs: Self) -> Self {
        Self(self.0.saturating_add(rhs.0))
    }
}

impl AddAssign for Micro {
    #[inline]
    fn add_assign(&mut self, rhs: Self) {
        *self = *self + rhs;
    }
}

impl fmt::Debug for Micro {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Micro({}.{:06})", self.whole(), self.fraction().0)
    }
}

impl fmt::Display for Micro {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:06}", self.whole(), self.fraction().0)
    }
}
