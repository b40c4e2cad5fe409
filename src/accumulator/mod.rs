//! Per-cycle batch accumulator for voxel observations.
//!
//! An [`UpdateAccumulator`] collects one sensor cycle's worth of free and
//! occupied voxel observations for a bounded region in a dense hierarchy of
//! [`VoxelState`] grids, one per tree level. After [`finish`] downsamples
//! the hierarchy, the whole batch merges into the persistent tree with a
//! single recursive pass (see `OccupancyTree::apply_update`) instead of one
//! tree descent per observed point.
//!
//! [`finish`]: UpdateAccumulator::finish

mod grid;

use crate::core::{KeyError, SpatialKey, VoxelState};
use grid::LevelGrid;

/// Short-lived dense batch of voxel observations for one update cycle.
#[derive(Clone, Debug)]
pub struct UpdateAccumulator {
    depth: u8,
    /// One grid per level 0..depth, plus the 1x1x1 root grid at index depth
    levels: Vec<LevelGrid>,
    finished: bool,
}

impl UpdateAccumulator {
    /// Create an accumulator for a tree of the given depth. Bounds must be
    /// set before inserting.
    pub fn new(depth: u8) -> Self {
        let levels = (0..=depth)
            .map(|level| LevelGrid::new(level, level == depth))
            .collect();
        Self {
            depth,
            levels,
            finished: false,
        }
    }

    /// Tree depth this accumulator was built for.
    #[inline]
    pub fn depth(&self) -> u8 {
        self.depth
    }

    /// Whether [`finish`](Self::finish) has run since the last mutation.
    #[inline]
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Bound the update region and allocate every level's grid.
    ///
    /// The corners are normalized per axis, validated against the tree
    /// depth, then truncated/expanded per level so each grid lines up with
    /// the next-coarser one.
    pub fn set_bounds(&mut self, min_key: SpatialKey, max_key: SpatialKey) -> Result<(), KeyError> {
        let min = min_key.min(max_key).checked(self.depth)?;
        let max = min_key.max(max_key).checked(self.depth)?;
        for level in &mut self.levels {
            level.set_bounds(min, max);
        }
        self.finished = false;
        Ok(())
    }

    /// Reset all cells to UNKNOWN, keeping bounds and storage.
    pub fn clear(&mut self) {
        for level in &mut self.levels {
            level.clear();
        }
        self.finished = false;
    }

    /// Record a free observation at a finest-level key.
    ///
    /// Returns true only on the first write to the cell this cycle; false
    /// tells the caller no further work (e.g. ray tracing through this
    /// voxel) is needed. A cell already marked occupied is never downgraded.
    /// Keys outside the bounded region are ignored and return false.
    pub fn insert_free(&mut self, key: SpatialKey) -> bool {
        self.insert(key, VoxelState::FREE)
    }

    /// Record an occupied observation at a finest-level key.
    ///
    /// First-write semantics as [`insert_free`](Self::insert_free), except
    /// that an occupied observation upgrades a cell previously marked free
    /// (occupied takes precedence) while still returning false.
    pub fn insert_occupied(&mut self, key: SpatialKey) -> bool {
        self.insert(key, VoxelState::OCCUPIED)
    }

    /// Mark a finest-level cell INNER directly, masking it from bulk
    /// free/occupied decisions (used for floor-truncation style masking).
    pub fn insert_inner(&mut self, key: SpatialKey) {
        self.insert(key, VoxelState::INNER);
    }

    fn insert(&mut self, key: SpatialKey, state: VoxelState) -> bool {
        let cell = match self.levels[0].cell_mut(key) {
            Some(cell) => cell,
            None => return false,
        };
        if cell.is_unknown() {
            *cell = state;
            self.finished = false;
            return true;
        }
        if state == VoxelState::OCCUPIED && *cell == VoxelState::FREE {
            *cell = VoxelState::OCCUPIED;
            self.finished = false;
        }
        false
    }

    /// State of a finest-level cell; UNKNOWN outside the region.
    #[inline]
    pub fn find(&self, key: SpatialKey) -> VoxelState {
        self.levels[0].cell(key)
    }

    /// State of the cell covering `key` at a given level; UNKNOWN for
    /// levels beyond the accumulator's depth.
    #[inline]
    pub fn find_at(&self, key: SpatialKey, level: u8) -> VoxelState {
        match self.levels.get(level as usize) {
            Some(grid) => grid.cell(key),
            None => VoxelState::UNKNOWN,
        }
    }

    /// State of the conceptual root cell.
    #[inline]
    pub(crate) fn root_state(&self) -> VoxelState {
        self.levels[self.depth as usize].cell(SpatialKey::ZERO)
    }

    /// Downsample every level into the next, finest first, making the
    /// accumulator ready to merge.
    pub fn finish(&mut self) {
        for level in 0..self.depth as usize {
            // Split the slice so source and target can be borrowed together
            let (source, rest) = self.levels[level..].split_first_mut().expect("level exists");
            source.downsample_into(&mut rest[0]);
        }
        self.finished = true;
    }
}
