//! Leaf traversal over the occupancy tree.

use super::arena::{Node, NodeId};
use super::OccupancyTree;
use crate::core::SpatialKey;

/// One stored leaf: its minimum corner key, level and edge length.
///
/// A leaf above level 0 stands for a uniform cube of `2^level` voxels per
/// axis, so consumers must not assume finest-resolution entries.
pub struct LeafEntry<'a> {
    /// Minimum corner key of the region the leaf covers
    pub key: SpatialKey,
    /// Tree level; 0 is the finest
    pub level: u8,
    /// Edge length in meters
    pub size: f32,
    /// The stored node
    pub node: &'a Node,
}

/// Depth-first iterator over all leaves.
pub struct LeafIter<'a> {
    tree: &'a OccupancyTree,
    stack: Vec<(NodeId, SpatialKey, u8)>,
}

impl<'a> Iterator for LeafIter<'a> {
    type Item = LeafEntry<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        while let Some((id, key, level)) = self.stack.pop() {
            let node = self.tree.arena.node(id);
            if node.is_leaf() {
                return Some(LeafEntry {
                    key,
                    level,
                    size: self.tree.config.voxel_size(level),
                    node,
                });
            }
            let child_level = level - 1;
            for octant in 0..8 {
                if let Some(child) = self.tree.arena.child(id, octant) {
                    self.stack
                        .push((child, key.with_octant(octant, child_level), child_level));
                }
            }
        }
        None
    }
}

impl OccupancyTree {
    /// Iterate over every stored leaf.
    pub fn leaves(&self) -> LeafIter<'_> {
        let mut stack = Vec::new();
        if let Some(root) = self.root {
            stack.push((root, SpatialKey::ZERO, self.config.depth));
        }
        LeafIter { tree: self, stack }
    }

    /// Leaves at or above the occupancy threshold.
    pub fn occupied_leaves(&self) -> impl Iterator<Item = LeafEntry<'_>> {
        let threshold = self.config.occupancy_threshold;
        self.leaves().filter(move |leaf| leaf.node.log_odds >= threshold)
    }

    /// Leaves below the occupancy threshold.
    pub fn free_leaves(&self) -> impl Iterator<Item = LeafEntry<'_>> {
        let threshold = self.config.occupancy_threshold;
        self.leaves().filter(move |leaf| leaf.node.log_odds < threshold)
    }
}
