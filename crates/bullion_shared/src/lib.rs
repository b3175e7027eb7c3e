//! # BULLION Shared
//!
//! Common types used by the simulation engine and the economy layer.
//!
//! ## CRITICAL RULE
//!
//! This crate must NEVER depend on:
//! - a clock (`Instant`, `SystemTime`)
//! - OS randomness
//! - any store or network client
//!
//! Everything here feeds the deterministic tick. If it can differ between two
//! machines given the same inputs, it does not belong here.

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![warn(clippy::pedantic)]

pub mod constants;
pub mod fixed_point;
pub mod math;
pub mod rng;

pub use constants::{BPS_DENOMINATOR, TICKS_PER_SECOND, TICK_DURATION_MICROS, TICK_RATE};
pub use fixed_point::Micro;
pub use math::{
    clamp, distance, distance_sq, lerp, mobility_for_radius, pickup_radius, player_radius,
    segment_circle_intersects, Vec2,
};
pub use rng::DeterministicRng;
