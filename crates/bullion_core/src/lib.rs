//! # BULLION Core
//!
//! Storage primitives for one room's world:
//! - `EntityId` / `EntityKind`: unique, monotonically increasing ids tagged by
//!   what they identify
//! - `Arena<T>`: dense slots with generation-checked `Handle`s
//! - `SpatialGrid`: uniform-cell broad-phase, cleared and refilled each tick
//!
//! ## Architecture Rules
//!
//! 1. **Order is explicit** - nothing here hands out hash-map iteration order.
//!    Every query result is sorted by id before it leaves the crate.
//! 2. **No clock, no OS randomness** - same as `bullion_shared`.

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]

pub mod arena;
pub mod entity;
pub mod grid;

pub use arena::{Arena, Handle};
pub use entity::{EntityId, EntityKind, IdAllocator, TypedId};
pub use grid::SpatialGrid;
