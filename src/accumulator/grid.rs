//! Dense per-level state grid backing the update accumulator.

use crate::core::{SpatialKey, VoxelState};

/// One dense grid of [`VoxelState`] covering the update region at a single
/// tree level.
///
/// The grid's corner and dimensions are aligned one level up: both bound
/// corners are truncated to the next-coarser voxel size, and the top corner
/// is expanded by one voxel at this level. This makes every octant pair
/// complete, so the grid's dimensions are even on every axis (the root-level
/// grid is the exception at 1x1x1), and lines the corner cells up with the
/// coarser grid that consumes them during downsampling.
#[derive(Clone, Debug)]
pub(crate) struct LevelGrid {
    level: u8,
    root: bool,
    min_key: SpatialKey,
    dims: [usize; 3],
    skip: usize,
    grid: Vec<VoxelState>,
}

impl LevelGrid {
    /// Create an empty grid for `level`; `root` marks the 1x1x1 top grid.
    pub fn new(level: u8, root: bool) -> Self {
        Self {
            level,
            root,
            min_key: SpatialKey::ZERO,
            dims: [0; 3],
            skip: 0,
            grid: Vec::new(),
        }
    }

    /// Reallocate for a new inclusive key range, all cells UNKNOWN.
    pub fn set_bounds(&mut self, min_key: SpatialKey, max_key: SpatialKey) {
        if self.root {
            self.min_key = SpatialKey::ZERO;
            self.dims = [1, 1, 1];
        } else {
            let step = 1u32 << self.level;
            let min = min_key.ancestor_at(self.level + 1);
            let max = max_key.ancestor_at(self.level + 1);
            self.min_key = min;
            self.dims = [
                (((max.x + step - min.x) >> self.level) + 1) as usize,
                (((max.y + step - min.y) >> self.level) + 1) as usize,
                (((max.z + step - min.z) >> self.level) + 1) as usize,
            ];
            debug_assert!(self.dims.iter().all(|d| d % 2 == 0));
        }
        self.skip = self.dims[0] * self.dims[1];
        self.grid.clear();
        self.grid
            .resize(self.skip * self.dims[2], VoxelState::UNKNOWN);
    }

    /// Reset all cells to UNKNOWN without reallocating.
    pub fn clear(&mut self) {
        self.grid.fill(VoxelState::UNKNOWN);
    }

    /// Flat index of a key's cell, or None if outside the grid.
    #[inline]
    pub fn index_of(&self, key: SpatialKey) -> Option<usize> {
        if self.root {
            return if self.grid.is_empty() { None } else { Some(0) };
        }
        let dx = (key.x.wrapping_sub(self.min_key.x) >> self.level) as usize;
        let dy = (key.y.wrapping_sub(self.min_key.y) >> self.level) as usize;
        let dz = (key.z.wrapping_sub(self.min_key.z) >> self.level) as usize;
        if key.x < self.min_key.x
            || key.y < self.min_key.y
            || key.z < self.min_key.z
            || dx >= self.dims[0]
            || dy >= self.dims[1]
            || dz >= self.dims[2]
        {
            return None;
        }
        Some(dz * self.skip + dy * self.dims[0] + dx)
    }

    /// Cell state at a key; UNKNOWN outside the grid.
    #[inline]
    pub fn cell(&self, key: SpatialKey) -> VoxelState {
        self.index_of(key)
            .map_or(VoxelState::UNKNOWN, |index| self.grid[index])
    }

    /// Mutable cell access for in-bounds keys.
    #[inline]
    pub fn cell_mut(&mut self, key: SpatialKey) -> Option<&mut VoxelState> {
        self.index_of(key).map(move |index| &mut self.grid[index])
    }

    /// Reduce this grid's octants into the next-coarser grid.
    ///
    /// Target cells are addressed by key because the target grid's corner
    /// may sit below this grid's corner; cells the source does not cover
    /// stay UNKNOWN.
    pub fn downsample_into(&self, target: &mut LevelGrid) {
        debug_assert!(self.dims.iter().all(|d| d % 2 == 0));
        let step = 1u32 << self.level;
        for z in (0..self.dims[2]).step_by(2) {
            for y in (0..self.dims[1]).step_by(2) {
                let base = z * self.skip + y * self.dims[0];
                for x in (0..self.dims[0]).step_by(2) {
                    let corner = base + x;
                    let octant = [
                        self.grid[corner],
                        self.grid[corner + 1],
                        self.grid[corner + self.dims[0]],
                        self.grid[corner + self.dims[0] + 1],
                        self.grid[corner + self.skip],
                        self.grid[corner + self.skip + 1],
                        self.grid[corner + self.skip + self.dims[0]],
                        self.grid[corner + self.skip + self.dims[0] + 1],
                    ];
                    let reduced = VoxelState::reduce_octant(octant);
                    if reduced.is_unknown() {
                        continue;
                    }
                    // The octant corner key is also the target cell's key
                    // since both grids align on the coarser voxel size.
                    let key = SpatialKey::new(
                        self.min_key.x + (x as u32) * step,
                        self.min_key.y + (y as u32) * step,
                        self.min_key.z + (z as u32) * step,
                    );
                    if let Some(cell) = target.cell_mut(key) {
                        *cell = reduced;
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bounds_alignment_and_even_dims() {
        let mut grid = LevelGrid::new(0, false);
        grid.set_bounds(SpatialKey::new(5, 5, 5), SpatialKey::new(9, 9, 9));
        // min truncates to 4, max truncates to 8 and expands by one voxel
        assert_eq!(grid.min_key, SpatialKey::new(4, 4, 4));
        assert_eq!(grid.dims, [6, 6, 6]);

        // The expanded top cell covers the original max key
        assert!(grid.index_of(SpatialKey::new(9, 9, 9)).is_some());
        assert!(grid.index_of(SpatialKey::new(10, 9, 9)).is_none());
        assert!(grid.index_of(SpatialKey::new(3, 4, 4)).is_none());
    }

    #[test]
    fn test_coarse_level_bounds() {
        let mut grid = LevelGrid::new(2, false);
        grid.set_bounds(SpatialKey::new(5, 5, 5), SpatialKey::new(9, 9, 9));
        // Truncated to 8-alignment: min 0, max 8; expanded by 4
        assert_eq!(grid.min_key, SpatialKey::ZERO);
        assert_eq!(grid.dims, [4, 4, 4]);
    }

    #[test]
    fn test_root_grid_is_unit() {
        let mut grid = LevelGrid::new(16, true);
        grid.set_bounds(SpatialKey::new(5, 5, 5), SpatialKey::new(9, 9, 9));
        assert_eq!(grid.dims, [1, 1, 1]);
        assert_eq!(grid.index_of(SpatialKey::new(12345, 1, 40000)), Some(0));
    }

    #[test]
    fn test_cell_roundtrip() {
        let mut grid = LevelGrid::new(0, false);
        grid.set_bounds(SpatialKey::ZERO, SpatialKey::new(7, 7, 7));
        let key = SpatialKey::new(3, 1, 6);
        *grid.cell_mut(key).unwrap() = VoxelState::OCCUPIED;
        assert_eq!(grid.cell(key), VoxelState::OCCUPIED);
        assert_eq!(grid.cell(SpatialKey::new(3, 1, 5)), VoxelState::UNKNOWN);
        grid.clear();
        assert_eq!(grid.cell(key), VoxelState::UNKNOWN);
    }

    #[test]
    fn test_downsample_uniform_octant() {
        let mut fine = LevelGrid::new(0, false);
        let mut coarse = LevelGrid::new(1, false);
        let min = SpatialKey::ZERO;
        let max = SpatialKey::new(7, 7, 7);
        fine.set_bounds(min, max);
        coarse.set_bounds(min, max);

        // Fill the octant at keys (0..2)^3 entirely FREE
        for z in 0..2 {
            for y in 0..2 {
                for x in 0..2 {
                    *fine.cell_mut(SpatialKey::new(x, y, z)).unwrap() = VoxelState::FREE;
                }
            }
        }
        // One lone occupied voxel in the octant at (2..4, 0..2, 0..2)
        *fine.cell_mut(SpatialKey::new(2, 0, 0)).unwrap() = VoxelState::OCCUPIED;

        fine.downsample_into(&mut coarse);
        assert_eq!(coarse.cell(SpatialKey::ZERO), VoxelState::FREE);
        assert_eq!(coarse.cell(SpatialKey::new(2, 0, 0)), VoxelState::INNER);
        assert_eq!(coarse.cell(SpatialKey::new(0, 2, 0)), VoxelState::UNKNOWN);
    }
}
