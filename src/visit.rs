//! Per-cycle ray visit tracking.
//!
//! Many rays in one sensor cycle pass through the same voxels near the
//! origin. [`RayVisitSet`] is a dense bitset over the cycle's bounded key
//! region whose insert reports whether a key is seen for the first time, so
//! callers can skip re-tracing work. Marks are monotonic: a key never
//! reverts to unvisited until the set is cleared for the next cycle.

use crate::core::{KeyError, SpatialKey};

/// Minimal binary set over finest-level keys for one update cycle.
#[derive(Clone, Debug)]
pub struct RayVisitSet {
    depth: u8,
    min_key: SpatialKey,
    dims: [usize; 3],
    skip: usize,
    bits: Vec<u64>,
}

impl RayVisitSet {
    /// Create an empty set for a tree of the given depth; bound it before
    /// use.
    pub fn new(depth: u8) -> Self {
        Self {
            depth,
            min_key: SpatialKey::ZERO,
            dims: [0; 3],
            skip: 0,
            bits: Vec::new(),
        }
    }

    /// Cover the inclusive key range, clearing all marks.
    ///
    /// The corners are normalized per axis and validated against the tree
    /// depth, the same contract as the accumulator's bound setter.
    pub fn set_bounds(&mut self, min_key: SpatialKey, max_key: SpatialKey) -> Result<(), KeyError> {
        let min = min_key.min(max_key).checked(self.depth)?;
        let max = min_key.max(max_key).checked(self.depth)?;
        self.min_key = min;
        self.dims = [
            (max.x - min.x + 1) as usize,
            (max.y - min.y + 1) as usize,
            (max.z - min.z + 1) as usize,
        ];
        self.skip = self.dims[0] * self.dims[1];
        let cells = self.skip * self.dims[2];
        self.bits.clear();
        self.bits.resize(cells.div_ceil(64), 0);
        Ok(())
    }

    /// Clear all marks, keeping bounds and storage.
    pub fn clear(&mut self) {
        self.bits.fill(0);
    }

    #[inline]
    fn index_of(&self, key: SpatialKey) -> Option<usize> {
        if key.x < self.min_key.x || key.y < self.min_key.y || key.z < self.min_key.z {
            return None;
        }
        let dx = (key.x - self.min_key.x) as usize;
        let dy = (key.y - self.min_key.y) as usize;
        let dz = (key.z - self.min_key.z) as usize;
        if dx >= self.dims[0] || dy >= self.dims[1] || dz >= self.dims[2] {
            return None;
        }
        Some(dz * self.skip + dy * self.dims[0] + dx)
    }

    /// Mark a key as visited. Returns true only on the first insertion;
    /// keys outside the bounded region return false.
    pub fn insert(&mut self, key: SpatialKey) -> bool {
        match self.index_of(key) {
            Some(index) => {
                let mask = 1u64 << (index % 64);
                let word = &mut self.bits[index / 64];
                let first = *word & mask == 0;
                *word |= mask;
                first
            }
            None => false,
        }
    }

    /// Whether a key has been marked this cycle.
    #[inline]
    pub fn contains(&self, key: SpatialKey) -> bool {
        self.index_of(key)
            .is_some_and(|index| self.bits[index / 64] & (1 << (index % 64)) != 0)
    }
}
