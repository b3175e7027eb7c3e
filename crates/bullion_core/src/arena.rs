//! # Generational Arena
//!
//! Dense slot storage for objects that are frequently inserted and removed
//! (bullets, pickups, players).

use serde::{Deserialize, Serialize};

/// A slot arena with generation-checked handles.
///
/// Freed slots are recycled through a free list, so steady-state churn
/// (bullets spawning and expiring every tick) never reallocates once the
/// arena has grown to its working size. Each reuse bumps the slot's
/// generation, which turns every handle to the previous occupant stale.
///
/// # Ordering
///
/// Iteration is in slot order, which is NOT creation order once slots are
/// reused. Callers that need a deterministic order sort by their own ids.
///
/// # Example
///
/// ```rust
/// use bullion_core::Arena;
///
/// let mut arena: Arena<u32> = Arena::with_capacity(16);
/// let handle = arena.insert(42);
/// assert_eq!(arena.get(handle), Some(&42));
/// assert_eq!(arena.remove(handle), Some(42));
/// assert!(arena.get(handle).is_none());
/// ```
#[derive(Debug, Clone)]
pub struct Arena<T> {
    /// Slot storage; `None` marks a free slot.
    slots: Vec<Slot<T>>,
    /// Free list - indices of available slots.
    free_list: Vec<u32>,
    /// Number of occupied slots.
    len: usize,
}

#[derive(Debug, Clone)]
struct Slot<T> {
    generation: u32,
    value: Option<T>,
}

/// Handle to a value in an [`Arena`].
///
/// Packs the slot index (low 32 bits) and generation (high 32 bits).
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Handle(u64);

impl Handle {
    #[inline]
    const fn new(index: u32, generation: u32) -> Self {
        Self(((generation as u64) << 32) | (index as u64))
    }

    /// Returns the slot index.
    #[inline]
    #[must_use]
    pub const fn index(self) -> u32 {
        self.0 as u32
    }

    /// Returns the slot generation this handle was issued for.
    #[inline]
    #[must_use]
    pub const fn generation(self) -> u32 {
        (self.0 >> 32) as u32
    }
}

impl<T> Arena<T> {
    /// Creates an empty arena.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            slots: Vec::new(),
            free_list: Vec::new(),
            len: 0,
        }
    }

    /// Creates an arena with room for `capacity` values before growing.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            slots: Vec::with_capacity(capacity),
            free_list: Vec::with_capacity(capacity),
            len: 0,
        }
    }

    /// Returns the number of live values.
    #[inline]
    #[must_use]
    pub const fn len(&self) -> usize {
        self.len
    }

    /// Returns true if no value is stored.
    #[inline]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Stores a value and returns its handle. O(1).
    pub fn insert(&mut self, value: T) -> Handle {
        self.len += 1;
        if let Some(index) = self.free_list.pop() {
            let slot = &mut self.slots[index as usize];
            slot.value = Some(value);
            return Handle::new(index, slot.generation);
        }

        let index = u32::try_from(self.slots.len()).unwrap_or(u32::MAX);
        self.slots.push(Slot {
            generation: 0,
            value: Some(value),
        });
        Handle::new(index, 0)
    }

    /// Removes a value. O(1).
    ///
    /// # Returns
    ///
    /// The removed value, or None if the handle was stale.
    pub fn remove(&mut self, handle: Handle) -> Option<T> {
        let slot = self.slots.get_mut(handle.index() as usize)?;
        if slot.generation != handle.generation() {
            return None;
        }
        let value = slot.value.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free_list.push(handle.index());
        self.len -= 1;
        Some(value)
    }

    /// Returns true if the handle still refers to a live value.
    #[inline]
    #[must_use]
    pub fn contains(&self, handle: Handle) -> bool {
        self.get(handle).is_some()
    }

    /// Gets a reference to a live value.
    #[inline]
    #[must_use]
    pub fn get(&self, handle: Handle) -> Option<&T> {
        let slot = self.slots.get(handle.index() as usize)?;
        if slot.generation != handle.generation() {
            return None;
        }
        slot.value.as_ref()
    }

    /// Gets a mutable reference to a live value.
    #[inline]
    pub fn get_mut(&mut self, handle: Handle) -> Option<&mut T> {
        let slot = self.slots.get_mut(handle.index() as usize)?;
        if slot.generation != handle.generation() {
            return None;
        }
        slot.value.as_mut()
    }

    /// Gets two distinct values mutably at once. None if either handle is
    /// stale or both name the same slot.
    pub fn get2_mut(&mut self, a: Handle, b: Handle) -> Option<(&mut T, &mut T)> {
        let (ia, ib) = (a.index() as usize, b.index() as usize);
        if ia == ib || ia >= self.slots.len() || ib >= self.slots.len() {
            return None;
        }
        let (first, second) = if ia < ib {
            let (lo, hi) = self.slots.split_at_mut(ib);
            (&mut lo[ia], &mut hi[0])
        } else {
            let (lo, hi) = self.slots.split_at_mut(ia);
            (&mut hi[0], &mut lo[ib])
        };
        if first.generation != a.generation() || second.generation != b.generation() {
            return None;
        }
        Some((first.value.as_mut()?, second.value.as_mut()?))
    }

    /// Removes every value. Outstanding handles all become stale.
    pub fn clear(&mut self) {
        self.free_list.clear();
        for (index, slot) in self.slots.iter_mut().enumerate().rev() {
            if slot.value.take().is_some() {
                slot.generation = slot.generation.wrapping_add(1);
            }
            self.free_list.push(u32::try_from(index).unwrap_or(u32::MAX));
        }
        self.len = 0;
    }

    /// Keeps only the values for which `keep` returns true.
    pub fn retain(&mut self, mut keep: impl FnMut(Handle, &mut T) -> bool) {
        for (index, slot) in self.slots.iter_mut().enumerate() {
            let Some(value) = slot.value.as_mut() else {
                continue;
            };
            let index = u32::try_from(index).unwrap_or(u32::MAX);
            if !keep(Handle::new(index, slot.generation), value) {
                slot.value = None;
                slot.generation = slot.generation.wrapping_add(1);
                self.free_list.push(index);
                self.len -= 1;
            }
        }
    }

    /// Iterates over all live values in slot order.
    pub fn iter(&self) -> impl Iterator<Item = (Handle, &T)> {
        self.slots.iter().enumerate().filter_map(|(index, slot)| {
            let index = u32::try_from(index).ok()?;
            slot.value
                .as_ref()
                .map(|v| (Handle::new(index, slot.generation), v))
        })
    }

    /// Iterates mutably over all live values in slot order.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = (Handle, &mut T)> {
        self.slots.iter_mut().enumerate().filter_map(|(index, slot)| {
            let index = u32::try_from(index).ok()?;
            let generation = slot.generation;
            slot.value
                .as_mut()
                .map(|v| (Handle::new(index, generation), v))
        })
    }

    /// Iterates over all live values.
    pub fn values(&self) -> impl Iterator<Item = &T> {
        self.slots.iter().filter_map(|slot| slot.value.as_ref())
    }
}

impl<T> Default for Arena<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_arena_insert_remove() {
        let mut arena: Arena<u32> = Arena::with_capacity(10);

        let h1 = arena.insert(42);
        assert_eq!(*arena.get(h1).unwrap(), 42);
        assert_eq!(arena.len(), 1);

        let freed = arena.remove(h1).unwrap();
        assert_eq!(freed, 42);
        assert!(arena.is_empty());
        assert!(arena.remove(h1).is_none());
    }

    #[test]
    fn test_arena_reuse_bumps_generation() {
        let mut arena: Arena<u32> = Arena::new();

        let h1 = arena.insert(1);
        arena.remove(h1);

        let h2 = arena.insert(2);
        assert_eq!(h1.index(), h2.index()); // Same slot reused
        assert_ne!(h1.generation(), h2.generation());
        assert!(arena.get(h1).is_none());
        assert_eq!(*arena.get(h2).unwrap(), 2);
    }

    #[test]
    fn test_arena_retain_and_clear() {
        let mut arena: Arena<u32> = Arena::new();
        let handles: Vec<_> = (0..6).map(|v| arena.insert(v)).collect();

        arena.retain(|_, v| *v % 2 == 0);
        assert_eq!(arena.len(), 3);
        assert!(arena.get(handles[1]).is_none());
        assert_eq!(arena.get(handles[2]), Some(&2));

        arena.clear();
        assert!(arena.is_empty());
        assert!(handles.iter().all(|h| !arena.contains(*h)));
    }

    #[test]
    fn test_arena_get2_mut() {
        let mut arena: Arena<u32> = Arena::new();
        let a = arena.insert(1);
        let b = arena.insert(2);

        let (x, y) = arena.get2_mut(b, a).unwrap();
        std::mem::swap(x, y);
        assert_eq!(arena.get(a), Some(&2));
        assert!(arena.get2_mut(a, a).is_none());
    }
}
