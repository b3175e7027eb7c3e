//! # Timing & Accounting Constants
//!
//! Values every crate agrees on.
//!
//! **CRITICAL:** The tick rate is part of the determinism contract. A replay
//! recorded at one rate cannot be verified at another.

// =============================================================================
// TIMING
// =============================================================================

/// Simulation ticks per second (50 ms per tick).
pub const TICK_RATE: u32 = 20;

/// Ticks in one simulated second. Periodic work (tax, sweeps) keys off this.
pub const TICKS_PER_SECOND: u64 = TICK_RATE as u64;

/// Tick duration in microseconds.
pub const TICK_DURATION_MICROS: u64 = 1_000_000 / TICK_RATE as u64;

// =============================================================================
// ACCOUNTING
// =============================================================================

/// Denominator for basis-point rates (1 bps = 0.01%).
pub const BPS_DENOMINATOR: u64 = 10_000;

/// Denominator for parts-per-million rates.
pub const PPM_DENOMINATOR: u64 = 1_000_000;

/// Applies a basis-point rate to an integer amount, rounding down.
///
/// Uses a 128-bit intermediate so `amount * bps` cannot overflow.
#[inline]
#[must_use]
pub const fn apply_bps(amount: u64, bps: u64) -> u64 {
    ((amount as u128 * bps as u128) / BPS_DENOMINATOR as u128) as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tick_duration() {
        assert_eq!(TICK_DURATION_MICROS, 50_000);
        assert_eq!(TICKS_PER_SECOND, 20);
    }

    #[test]
    fn test_apply_bps_rounds_down() {
        assert_eq!(apply_bps(1000, 250), 25);
        assert_eq!(apply_bps(999, 100), 9);
        assert_eq!(apply_bps(u64::MAX, BPS_DENOMINATOR), u64::MAX);
    }
}
