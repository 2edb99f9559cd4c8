//! Uniform-grid broadphase
//!
//! Rebuilt from scratch every tick from active enemies. Query results are a
//! deduplicated superset of true overlaps; callers must narrowphase-confirm
//! with a circle or segment test.

use std::collections::HashMap;

use glam::Vec2;

use super::entity::EntityId;

#[derive(Debug, Clone)]
pub struct SpatialIndex {
    cell_size: f32,
    cells: HashMap<(i32, i32), Vec<EntityId>>,
}

impl SpatialIndex {
    pub fn new(cell_size: f32) -> Self {
        Self {
            cell_size,
            cells: HashMap::new(),
        }
    }

    pub fn clear(&mut self) {
        // Keep allocated buckets; populations are similar tick to tick
        for bucket in self.cells.values_mut() {
            bucket.clear();
        }
    }

    fn cell_range(&self, pos: Vec2, radius: f32) -> (i32, i32, i32, i32) {
        let min_x = ((pos.x - radius) / self.cell_size).floor() as i32;
        let max_x = ((pos.x + radius) / self.cell_size).floor() as i32;
        let min_y = ((pos.y - radius) / self.cell_size).floor() as i32;
        let max_y = ((pos.y + radius) / self.cell_size).floor() as i32;
        (min_x, max_x, min_y, max_y)
    }

    /// File an entity into every cell its bounding circle overlaps
    pub fn insert(&mut self, id: EntityId, pos: Vec2, radius: f32) {
        let (min_x, max_x, min_y, max_y) = self.cell_range(pos, radius);
        for cx in min_x..=max_x {
            for cy in min_y..=max_y {
                self.cells.entry((cx, cy)).or_default().push(id);
            }
        }
    }

    /// Dedup union of all ids registered in cells overlapping the query circle
    ///
    /// Sorted by id so downstream iteration is deterministic.
    pub fn query(&self, pos: Vec2, radius: f32) -> Vec<EntityId> {
        let (min_x, max_x, min_y, max_y) = self.cell_range(pos, radius);
        let mut out = Vec::new();
        for cx in min_x..=max_x {
            for cy in min_y..=max_y {
                if let Some(bucket) = self.cells.get(&(cx, cy)) {
                    out.extend_from_slice(bucket);
                }
            }
        }
        out.sort_unstable();
        out.dedup();
        out
    }
}
