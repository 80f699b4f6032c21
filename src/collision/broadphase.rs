use std::collections::{HashMap, HashSet};

use glam::Vec2;

use super::shapes::Aabb;
use crate::utils::allocator::ColliderHandle;

/// Proxies covering more cells than this skip the grid and are tested against everything.
const MAX_CELLS_PER_PROXY: i64 = 1024;

/// Uniform grid spatial partitioning used by the broad-phase.
#[derive(Debug, Clone)]
pub struct SpatialGrid {
    cell_size: f32,
    grid: HashMap<(i32, i32), Vec<usize>>,
}

impl SpatialGrid {
    pub fn new(cell_size: f32) -> Self {
        Self {
            cell_size,
            grid: HashMap::new(),
        }
    }

    pub fn cell_size(&self) -> f32 {
        self.cell_size
    }

    fn world_to_grid(&self, pos: Vec2) -> (i32, i32) {
        (
            (pos.x / self.cell_size).floor() as i32,
            (pos.y / self.cell_size).floor() as i32,
        )
    }

    fn cell_range(&self, aabb: &Aabb) -> ((i32, i32), (i32, i32)) {
        (self.world_to_grid(aabb.min), self.world_to_grid(aabb.max))
    }

    fn cell_count(&self, aabb: &Aabb) -> i64 {
        let (min, max) = self.cell_range(aabb);
        let columns = (i64::from(max.0) - i64::from(min.0) + 1).max(0);
        let rows = (i64::from(max.1) - i64::from(min.1) + 1).max(0);
        columns.saturating_mul(rows)
    }

    /// Whether `aabb` is small enough to be walked cell by cell.
    pub fn fits(&self, aabb: &Aabb) -> bool {
        self.cell_count(aabb) <= MAX_CELLS_PER_PROXY
    }

    pub fn clear(&mut self) {
        self.grid.clear();
    }

    /// Registers proxy `slot` in every cell its bounds touch.
    pub fn insert(&mut self, slot: usize, aabb: &Aabb) {
        let (min_cell, max_cell) = self.cell_range(aabb);
        for x in min_cell.0..=max_cell.0 {
            for y in min_cell.1..=max_cell.1 {
                self.grid.entry((x, y)).or_default().push(slot);
            }
        }
    }

    /// Proxy slots sharing a cell with `aabb`, sorted and deduplicated.
    ///
    /// Callers must check [`SpatialGrid::fits`] first; larger regions are not walked.
    pub fn query(&self, aabb: &Aabb) -> Vec<usize> {
        let mut results = Vec::new();
        let (min_cell, max_cell) = self.cell_range(aabb);

        if self.grid.is_empty() || !self.fits(aabb) {
            return results;
        }

        for x in min_cell.0..=max_cell.0 {
            for y in min_cell.1..=max_cell.1 {
                if let Some(slots) = self.grid.get(&(x, y)) {
                    results.extend(slots);
                }
            }
        }

        results.sort_unstable();
        results.dedup();
        results
    }
}

/// Broad phase driver returning potential collider pairs.
///
/// Bounds are committed once per step by [`BroadPhase::sync`]; pairs come back
/// sorted by collider index so contact creation order is reproducible.
#[derive(Debug, Clone)]
pub struct BroadPhase {
    grid: SpatialGrid,
    proxies: Vec<(ColliderHandle, Aabb)>,
    oversized: Vec<usize>,
}

impl BroadPhase {
    pub fn new(cell_size: f32) -> Self {
        Self {
            grid: SpatialGrid::new(cell_size),
            proxies: Vec::new(),
            oversized: Vec::new(),
        }
    }

    pub fn proxy_count(&self) -> usize {
        self.proxies.len()
    }

    /// Rebuilds the grid from the committed collider bounds.
    pub fn sync(&mut self, proxies: &[(ColliderHandle, Aabb)]) {
        self.grid.clear();
        self.oversized.clear();
        self.proxies.clear();
        self.proxies.extend_from_slice(proxies);

        for (slot, (_, aabb)) in self.proxies.iter().enumerate() {
            if !self.grid.fits(aabb) {
                self.oversized.push(slot);
            } else {
                self.grid.insert(slot, aabb);
            }
        }
    }

    pub fn potential_pairs(&self) -> Vec<(ColliderHandle, ColliderHandle)> {
        let mut pairs = Vec::new();
        let mut checked = HashSet::new();

        for (slot, (handle, aabb)) in self.proxies.iter().enumerate() {
            let nearby = self.candidates(aabb);
            for other in nearby {
                if other == slot {
                    continue;
                }
                let (other_handle, other_aabb) = &self.proxies[other];
                if !aabb.overlaps(other_aabb) {
                    continue;
                }

                let pair_key = if handle < other_handle {
                    (*handle, *other_handle)
                } else {
                    (*other_handle, *handle)
                };

                if checked.insert(pair_key) {
                    pairs.push(pair_key);
                }
            }
        }

        pairs.sort_unstable();
        pairs
    }

    /// Proxy slots that may overlap `aabb`. Regions too large for the grid
    /// fall back to every proxy.
    fn candidates(&self, aabb: &Aabb) -> Vec<usize> {
        if self.grid.fits(aabb) {
            let mut slots = self.grid.query(aabb);
            slots.extend_from_slice(&self.oversized);
            slots
        } else {
            (0..self.proxies.len()).collect()
        }
    }

    /// Colliders whose committed bounds overlap `aabb`, in handle order.
    pub fn query(&self, aabb: &Aabb) -> Vec<ColliderHandle> {
        let mut hits: Vec<ColliderHandle> = self
            .candidates(aabb)
            .into_iter()
            .filter_map(|slot| {
                let (handle, bounds) = &self.proxies[slot];
                bounds.overlaps(aabb).then_some(*handle)
            })
            .collect();
        hits.sort_unstable();
        hits.dedup();
        hits
    }
}
