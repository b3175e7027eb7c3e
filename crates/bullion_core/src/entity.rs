//! # Entity Identity
//!
//! Entities are plain integers handed out by a per-room counter:
//! - never reused, so a stale id can only miss, never alias
//! - strictly increasing, so sorting by id is sorting by creation order

use serde::{Deserialize, Serialize};
use std::fmt;

/// Unique identifier for an entity within one room.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(transparent)]
pub struct EntityId(u64);

impl EntityId {
    /// Wraps a raw id.
    #[inline]
    #[must_use]
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Returns the raw id.
    #[inline]
    #[must_use]
    pub const fn raw(self) -> u64 {
        self.0
    }

    /// Null/invalid entity ID.
    pub const NULL: Self = Self(0);

    /// Checks if this entity ID is null/invalid.
    #[inline]
    #[must_use]
    pub const fn is_null(self) -> bool {
        self.0 == 0
    }
}

impl Default for EntityId {
    fn default() -> Self {
        Self::NULL
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// What an entity is. Declaration order is the tie-break order in
/// [`TypedId`] sorting.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    /// A connected player body.
    Player,
    /// A live projectile.
    Bullet,
    /// A budget-funded pickup.
    Pellet,
    /// Mass ejected from a damaged or killed player.
    Spill,
    /// Static circular obstacle.
    Obstacle,
}

impl EntityKind {
    /// Lowercase name used in snapshots and logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Player => "player",
            Self::Bullet => "bullet",
            Self::Pellet => "pellet",
            Self::Spill => "spill",
            Self::Obstacle => "obstacle",
        }
    }
}

/// An id together with its kind. This is what the spatial grid stores.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TypedId {
    /// Kind of the entity.
    pub kind: EntityKind,
    /// The id itself.
    pub id: EntityId,
}

impl TypedId {
    /// Creates a typed id.
    #[inline]
    #[must_use]
    pub const fn new(kind: EntityKind, id: EntityId) -> Self {
        Self { kind, id }
    }
}

/// Monotonic id counter. The first id handed out is 1; 0 is [`EntityId::NULL`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdAllocator {
    next: u64,
}

impl IdAllocator {
    /// Creates a counter starting at 1.
    #[must_use]
    pub const fn new() -> Self {
        Self { next: 1 }
    }

    /// Hands out the next id.
    pub fn allocate(&mut self) -> EntityId {
        let id = EntityId(self.next);
        self.next += 1;
        id
    }

    /// The id the next call to [`allocate`](Self::allocate) returns.
    #[must_use]
    pub const fn peek(&self) -> EntityId {
        EntityId(self.next)
    }
}

impl Default for IdAllocator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_are_monotonic() {
        let mut ids = IdAllocator::new();
        let a = ids.allocate();
        let b = ids.allocate();
        assert!(!a.is_null());
        assert!(a < b);
        assert_eq!(ids.peek().raw(), 3);
    }

    #[test]
    fn test_typed_id_ordering() {
        let p = TypedId::new(EntityKind::Player, EntityId::new(9));
        let o = TypedId::new(EntityKind::Obstacle, EntityId::new(1));
        assert!(p < o);
        assert_eq!(EntityKind::Spill.as_str(), "spill");
    }
}
