//! # Spatial Grid
//!
//! Uniform-cell broad-phase index. The engine clears it and re-inserts every
//! body once per tick, then asks it "who is near here?" instead of testing
//! every pair.
//!
//! Bodies are circles. A body is registered in every cell its bounding box
//! touches; queries gather candidates from the cells under the query shape,
//! drop the ones that do not actually overlap, and return the rest sorted by
//! `(kind, id)` without duplicates.

use std::collections::HashMap;

use bullion_shared::Vec2;

use crate::entity::{EntityId, EntityKind, TypedId};

#[derive(Debug, Clone, Copy)]
struct Body {
    id: TypedId,
    center: Vec2,
    radius: f64,
}

/// Uniform-cell spatial hash over typed entity ids.
#[derive(Debug, Clone)]
pub struct SpatialGrid {
    cell_size: f64,
    bodies: Vec<Body>,
    cells: HashMap<(i32, i32), Vec<u32>>,
    /// Scratch buffer reused across queries.
    scratch: Vec<u32>,
}

impl SpatialGrid {
    /// Creates an empty grid. Non-positive or non-finite cell sizes fall back
    /// to 1.
    #[must_use]
    pub fn new(cell_size: f64) -> Self {
        let cell_size = if cell_size.is_finite() && cell_size > 0.0 {
            cell_size
        } else {
            1.0
        };
        Self {
            cell_size,
            bodies: Vec::new(),
            cells: HashMap::new(),
            scratch: Vec::new(),
        }
    }

    /// Cell edge length.
    #[must_use]
    pub const fn cell_size(&self) -> f64 {
        self.cell_size
    }

    /// Number of inserted bodies.
    #[must_use]
    pub fn len(&self) -> usize {
        self.bodies.len()
    }

    /// True when nothing has been inserted since the last clear.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bodies.is_empty()
    }

    /// Removes every body, keeping the cell allocations.
    pub fn clear(&mut self) {
        self.bodies.clear();
        for bucket in self.cells.values_mut() {
            bucket.clear();
        }
    }

    #[inline]
    fn cell_coord(&self, v: f64) -> i32 {
        // Saturating float->int cast keeps absurd coordinates in the edge cells.
        (v / self.cell_size).floor() as i32
    }

    /// Inserts a circular body. Non-finite input is ignored.
    pub fn insert(&mut self, kind: EntityKind, id: EntityId, center: Vec2, radius: f64) {
        if !center.is_finite() || !radius.is_finite() {
            return;
        }
        let radius = radius.max(0.0);
        let Ok(index) = u32::try_from(self.bodies.len()) else {
            return;
        };
        self.bodies.push(Body {
            id: TypedId::new(kind, id),
            center,
            radius,
        });

        let (x0, x1) = (self.cell_coord(center.x - radius), self.cell_coord(center.x + radius));
        let (y0, y1) = (self.cell_coord(center.y - radius), self.cell_coord(center.y + radius));
        for cx in x0..=x1 {
            for cy in y0..=y1 {
                self.cells.entry((cx, cy)).or_default().push(index);
            }
        }
    }

    fn gather(&mut self, min: Vec2, max: Vec2) {
        self.scratch.clear();
        let (x0, x1) = (self.cell_coord(min.x), self.cell_coord(max.x));
        let (y0, y1) = (self.cell_coord(min.y), self.cell_coord(max.y));
        for cx in x0..=x1 {
            for cy in y0..=y1 {
                if let Some(bucket) = self.cells.get(&(cx, cy)) {
                    self.scratch.extend_from_slice(bucket);
                }
            }
        }
        self.scratch.sort_unstable();
        self.scratch.dedup();
    }

    /// Every body overlapping the circle, sorted by `(kind, id)`.
    pub fn query_circle(&mut self, center: Vec2, radius: f64) -> Vec<TypedId> {
        if !center.is_finite() || !radius.is_finite() || radius < 0.0 {
            return Vec::new();
        }
        let extent = Vec2::new(radius, radius);
        self.gather(center - extent, center + extent);

        let mut out: Vec<TypedId> = self
            .scratch
            .iter()
            .filter_map(|&i| self.bodies.get(i as usize))
            .filter(|b| {
                let reach = b.radius + radius;
                (b.center - center).length_squared() <= reach * reach
            })
            .map(|b| b.id)
            .collect();
        out.sort_unstable();
        out.dedup();
        out
    }

    /// Every body whose circle overlaps the axis-aligned box `[min, max]`,
    /// sorted by `(kind, id)`.
    pub fn query_rect(&mut self, min: Vec2, max: Vec2) -> Vec<TypedId> {
        if !min.is_finite() || !max.is_finite() || min.x > max.x || min.y > max.y {
            return Vec::new();
        }
        self.gather(min, max);

        let mut out: Vec<TypedId> = self
            .scratch
            .iter()
            .filter_map(|&i| self.bodies.get(i as usize))
            .filter(|b| {
                let nearest = Vec2::new(
                    b.center.x.clamp(min.x, max.x),
                    b.center.y.clamp(min.y, max.y),
                );
                (nearest - b.center).length_squared() <= b.radius * b.radius
            })
            .map(|b| b.id)
            .collect();
        out.sort_unstable();
        out.dedup();
        out
    }

    /// Like [`query_circle`](Self::query_circle) but keeps only one kind.
    pub fn query_circle_kind(&mut self, center: Vec2, radius: f64, kind: EntityKind) -> Vec<TypedId> {
        let mut out = self.query_circle(center, radius);
        out.retain(|t| t.kind == kind);
        out
    }
}
