//! Sparse, time-aware occupancy octree.
//!
//! The tree stores a log-odds occupancy estimate per voxel together with a
//! last-update timestamp and a lazily computed expiry time. Mutation comes
//! in two forms:
//!
//! - single-voxel updates ([`OccupancyTree::update_log_odds`]), which descend
//!   from the root creating missing nodes on the way;
//! - whole-batch merges ([`OccupancyTree::apply_update`]), which walk the
//!   tree once per *region* touched by a finished [`UpdateAccumulator`]
//!   rather than once per observed point.
//!
//! Maintenance passes ([`expire_nodes`](OccupancyTree::expire_nodes),
//! [`prune`](OccupancyTree::prune) and
//! [`expire_out_of_bounds`](OccupancyTree::expire_out_of_bounds)) run on a
//! separate, coarser cadence and never in the same cycle as each other.

mod arena;
mod expiry;
mod iter;

pub use arena::{Node, NodeId, EMA_UNSET};
pub use iter::{LeafEntry, LeafIter};

use crate::accumulator::UpdateAccumulator;
use crate::config::{ConfigError, DecayConfig, MapConfig, TreeConfig};
use crate::core::{KeyError, SpatialKey, WorldPoint};
use arena::NodeArena;
use std::fmt;

/// The persistent sparse occupancy octree.
pub struct OccupancyTree {
    config: TreeConfig,
    decay: DecayConfig,
    arena: NodeArena,
    root: Option<NodeId>,
    /// Logical clock in seconds. Advances only when an update cycle or an
    /// expiry pass explicitly moves it, so comparisons within a single pass
    /// stay stable even if wall-clock time moves mid-pass.
    last_update_time: u32,
    free_stamp_mask: u32,
    a_coeff_log_odds: f32,
}

impl OccupancyTree {
    /// Create an empty tree from a validated configuration.
    pub fn new(config: MapConfig) -> Result<Self, ConfigError> {
        config.tree.validate()?;
        let free_stamp_mask = config.decay.free_stamp_mask();
        let a_coeff_log_odds = config.decay.a_coeff_log_odds(config.tree.hit_log_odds);
        log::info!(
            "occupancy tree: resolution {}m depth {} a_coeff {} c_coeff {} free_timeout {:?} stamp_mask {:#x}",
            config.tree.resolution,
            config.tree.depth,
            config.decay.a_coeff,
            config.decay.c_coeff,
            config.decay.free_timeout,
            free_stamp_mask
        );
        Ok(Self {
            config: config.tree,
            decay: config.decay,
            arena: NodeArena::new(),
            root: None,
            last_update_time: 0,
            free_stamp_mask,
            a_coeff_log_odds,
        })
    }

    /// Tree geometry and log-odds configuration.
    #[inline]
    pub fn config(&self) -> &TreeConfig {
        &self.config
    }

    /// Temporal decay configuration.
    #[inline]
    pub fn decay(&self) -> &DecayConfig {
        &self.decay
    }

    /// Tree depth in bits per axis.
    #[inline]
    pub fn depth(&self) -> u8 {
        self.config.depth
    }

    /// Number of live nodes (inner and leaf).
    #[inline]
    pub fn node_count(&self) -> usize {
        self.arena.len()
    }

    /// Whether the tree holds no data.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.root.is_none()
    }

    /// Drop all nodes.
    pub fn clear(&mut self) {
        self.arena.clear();
        self.root = None;
    }

    /// The tree's logical clock: time of the last update or expiry pass.
    #[inline]
    pub fn last_update_time(&self) -> u32 {
        self.last_update_time
    }

    /// Logical clock masked to the free-space stamping granularity.
    #[inline]
    pub fn last_update_time_free_space(&self) -> u32 {
        self.last_update_time & self.free_stamp_mask
    }

    /// Maximum possible voxel lifespan in seconds at full clamp strength.
    /// Derived constant for external bookkeeping; the sweep does not use it.
    #[inline]
    pub fn max_expiry_delta(&self) -> u32 {
        self.decay
            .max_expiry_delta(self.config.hit_log_odds, self.config.clamp_max)
    }

    /// Advance the logical clock to `now` (never backwards). Call once at
    /// the start of each update cycle.
    pub fn advance_clock(&mut self, now: u32) {
        if now > self.last_update_time {
            self.last_update_time = now;
        }
    }

    /// Whether a node classifies as occupied under the configured threshold.
    #[inline]
    pub fn is_occupied(&self, node: &Node) -> bool {
        node.log_odds >= self.config.occupancy_threshold
    }

    // === Coordinate conversion ===

    /// Key of the finest voxel containing a world point.
    pub fn coord_to_key(&self, point: WorldPoint) -> Result<SpatialKey, KeyError> {
        let offset = 1i64 << (self.config.depth - 1);
        let limit = 1u32 << self.config.depth;
        let mut out = [0u32; 3];
        for (slot, (axis, coord)) in out
            .iter_mut()
            .zip([('x', point.x), ('y', point.y), ('z', point.z)])
        {
            let index = (coord / self.config.resolution).floor() as i64 + offset;
            if index < 0 || index >= limit as i64 {
                return Err(KeyError::OutOfRange {
                    axis,
                    value: index.clamp(0, u32::MAX as i64) as u32,
                    limit,
                });
            }
            *slot = index as u32;
        }
        Ok(SpatialKey::new(out[0], out[1], out[2]))
    }

    /// Center of the voxel at `key` and `level` in world coordinates.
    pub fn key_to_coord(&self, key: SpatialKey, level: u8) -> WorldPoint {
        let offset = 1i64 << (self.config.depth - 1);
        let half = (1u32 << level) as f32 * 0.5;
        let axis = |component: u32| {
            ((component & (!0u32 << level)) as i64 - offset) as f32 * self.config.resolution
                + half * self.config.resolution
        };
        WorldPoint::new(axis(key.x), axis(key.y), axis(key.z))
    }

    /// Min/max keys of a distance-limited update region around a base
    /// position: `xy_distance` sideways, `z_height` up, `z_depth` down.
    /// Corners are clamped to the representable key range.
    pub fn calculate_bounds(
        &self,
        xy_distance: f32,
        z_height: f32,
        z_depth: f32,
        base: WorldPoint,
    ) -> (SpatialKey, SpatialKey) {
        let min = self.coord_to_key_clamped(WorldPoint::new(
            base.x - xy_distance,
            base.y - xy_distance,
            base.z - z_depth,
        ));
        let max = self.coord_to_key_clamped(WorldPoint::new(
            base.x + xy_distance,
            base.y + xy_distance,
            base.z + z_height,
        ));
        (min, max)
    }

    fn coord_to_key_clamped(&self, point: WorldPoint) -> SpatialKey {
        let offset = 1i64 << (self.config.depth - 1);
        let top = (1i64 << self.config.depth) - 1;
        let axis = |coord: f32| {
            ((coord / self.config.resolution).floor() as i64 + offset).clamp(0, top) as u32
        };
        SpatialKey::new(axis(point.x), axis(point.y), axis(point.z))
    }

    // === Single-voxel updates ===

    /// Add a log-odds delta to the voxel at `key`, creating the path to it
    /// if needed, and restore every ancestor's aggregates. Returns the
    /// updated leaf.
    pub fn update_log_odds(&mut self, key: SpatialKey, delta: f32) -> Result<&Node, KeyError> {
        let key = key.checked(self.config.depth)?;
        let mut path: Vec<NodeId> = Vec::with_capacity(self.config.depth as usize);
        let (mut current, mut just_created) = match self.root {
            Some(root) => (root, false),
            None => {
                let root = self.arena.alloc(Node::background());
                self.root = Some(root);
                (root, true)
            }
        };
        for level in (0..self.config.depth).rev() {
            path.push(current);
            let octant = key.child_index(level);
            current = match self.arena.child(current, octant) {
                Some(child) => {
                    just_created = false;
                    child
                }
                None => {
                    if !just_created && self.arena.node(current).is_leaf() {
                        // A pruned coarse leaf: push its value down before
                        // refining one octant of it
                        self.arena.expand(current);
                        just_created = false;
                        self.arena.child(current, octant).expect("just expanded")
                    } else {
                        let child = self.arena.alloc(Node::background());
                        self.arena.set_child(current, octant, child);
                        just_created = true;
                        child
                    }
                }
            };
        }
        self.apply_leaf_delta(current, delta);
        for &ancestor in path.iter().rev() {
            self.arena.refresh_aggregates(ancestor);
        }
        Ok(self.arena.node(current))
    }

    /// Convenience over the configured hit/miss increments.
    pub fn update_occupancy(&mut self, key: SpatialKey, occupied: bool) -> Result<&Node, KeyError> {
        let delta = if occupied {
            self.config.hit_log_odds
        } else {
            self.config.miss_log_odds
        };
        self.update_log_odds(key, delta)
    }

    /// Experimental: fold an auxiliary occupancy-like sample into the EMA
    /// fields of the deepest node covering `key`. Returns false if the key
    /// is unmapped. Aggregates propagate as plain averages.
    pub fn update_auxiliary(
        &mut self,
        key: SpatialKey,
        value: f32,
        alpha: f32,
    ) -> Result<bool, KeyError> {
        let key = key.checked(self.config.depth)?;
        let mut current = match self.root {
            Some(root) => root,
            None => return Ok(false),
        };
        let mut path: Vec<NodeId> = Vec::new();
        for level in (0..self.config.depth).rev() {
            if self.arena.node(current).is_leaf() {
                break;
            }
            path.push(current);
            match self.arena.child(current, key.child_index(level)) {
                Some(child) => current = child,
                None => return Ok(false),
            }
        }
        self.arena.node_mut(current).update_ema(value, alpha);
        for &ancestor in path.iter().rev() {
            self.arena.refresh_aggregates(ancestor);
        }
        Ok(true)
    }

    /// Deepest stored node covering `key`, with its level.
    pub fn search(&self, key: SpatialKey) -> Option<(&Node, u8)> {
        let mut current = self.root?;
        for level in (0..self.config.depth).rev() {
            if self.arena.node(current).is_leaf() {
                return Some((self.arena.node(current), level + 1));
            }
            current = self.arena.child(current, key.child_index(level))?;
        }
        Some((self.arena.node(current), 0))
    }

    /// Decay-on-read followed by the clamped log-odds update, new stamp and
    /// a reset (unresolved) expiry.
    fn apply_leaf_delta(&mut self, id: NodeId, delta: f32) {
        let threshold = self.config.occupancy_threshold;
        let now = self.last_update_time;
        let node = self.arena.node_mut(id);

        // Bring a stale occupied value down to its time-corrected level
        // before stacking new evidence on it. Rarely hit in practice: the
        // expiry is only resolved for voxels not seen recently.
        if let Some(expiry) = node.expiry {
            if node.log_odds >= threshold {
                if expiry <= now {
                    node.log_odds = threshold;
                } else {
                    let orig_delta = (expiry - node.stamp) as f32;
                    let curr_delta = (expiry - now) as f32;
                    node.log_odds = threshold + (node.log_odds - threshold) * (curr_delta / orig_delta);
                }
            }
        }

        node.log_odds =
            (node.log_odds + delta).clamp(self.config.clamp_min, self.config.clamp_max);
        // Free space is stamped at a coarser granularity so staggered free
        // observations stay prunable
        node.stamp = if node.log_odds >= threshold {
            now
        } else {
            now & self.free_stamp_mask
        };
        // Recomputed lazily by the next expiry sweep; updating it here would
        // be wasted work repeated every sensor cycle
        node.expiry = None;
    }

    // === Batched merge ===

    /// Merge a finished accumulator into the tree in one recursive pass
    /// proportional to the number of distinct regions touched.
    ///
    /// Fails before mutating anything if the accumulator does not match the
    /// tree's depth or has not been downsampled.
    pub fn apply_update(&mut self, update: &UpdateAccumulator) -> Result<(), MergeError> {
        if update.depth() != self.config.depth {
            return Err(MergeError::DepthMismatch {
                tree: self.config.depth,
                update: update.depth(),
            });
        }
        if !update.is_finished() {
            return Err(MergeError::NotDownsampled);
        }
        if update.root_state().is_unknown() {
            return Ok(());
        }
        let (root, just_created) = match self.root {
            Some(root) => (root, false),
            None => {
                let root = self.arena.alloc(Node::background());
                self.root = Some(root);
                (root, true)
            }
        };
        if self.apply_update_recurs(update, root, just_created, SpatialKey::ZERO, self.config.depth)
        {
            self.arena.free_subtree(root);
            self.root = None;
        }
        Ok(())
    }

    /// Merge one accumulator region into the subtree at `key`/`level`.
    /// Returns true if the caller should detach and release this node.
    fn apply_update_recurs(
        &mut self,
        update: &UpdateAccumulator,
        node: NodeId,
        just_created: bool,
        key: SpatialKey,
        level: u8,
    ) -> bool {
        debug_assert!(level >= 1, "merge recursion descends to level 1 at most");
        if !just_created && self.arena.node(node).is_leaf() {
            // Mixed content lands inside a pruned coarse leaf: push its
            // value down so untouched octants keep it
            self.arena.expand(node);
        }
        let child_level = level - 1;
        for octant in 0..8 {
            let child_key = key.with_octant(octant, child_level);
            let state = update.find_at(child_key, child_level);
            if state.is_unknown() {
                continue;
            }
            if state.is_pure() {
                let delta = if state.is_occupied() {
                    self.config.hit_log_odds
                } else {
                    self.config.miss_log_odds
                };
                let child = match self.arena.child(node, octant) {
                    Some(child) => child,
                    None => {
                        if delta < 0.0 && self.config.delete_minimum {
                            // Would be created at the minimum and deleted
                            // again right away
                            continue;
                        }
                        let child = self.arena.alloc(Node::background());
                        self.arena.set_child(node, octant, child);
                        child
                    }
                };
                if self.apply_uniform(child, delta) {
                    self.arena.clear_child(node, octant);
                    self.arena.free_subtree(child);
                }
            } else {
                // Mixed octant: descend one level. At the finest level an
                // INNER mark carries no decision, only presence.
                if child_level == 0 {
                    continue;
                }
                let (child, child_created) = match self.arena.child(node, octant) {
                    Some(child) => (child, false),
                    None => {
                        let child = self.arena.alloc(Node::background());
                        self.arena.set_child(node, octant, child);
                        (child, true)
                    }
                };
                if self.apply_update_recurs(update, child, child_created, child_key, child_level) {
                    self.arena.clear_child(node, octant);
                    self.arena.free_subtree(child);
                }
            }
        }
        if self.arena.release_block_if_empty(node) {
            // Everything below was deleted (or nothing was ever created):
            // do not leave a childless inner node behind
            return true;
        }
        self.arena.refresh_aggregates(node);
        false
    }

    /// Apply one log-odds decision to an entire subtree, equivalent to
    /// updating every descendant leaf identically. Returns true if the
    /// subtree should be deleted (delete-on-minimum policy).
    fn apply_uniform(&mut self, node: NodeId, delta: f32) -> bool {
        if self.arena.node(node).is_leaf() {
            self.apply_leaf_delta(node, delta);
            let leaf = self.arena.node(node);
            return self.config.delete_minimum && leaf.log_odds <= self.config.clamp_min;
        }
        let skip_missing = delta < 0.0 && self.config.delete_minimum;
        for octant in 0..8 {
            let child = match self.arena.child(node, octant) {
                Some(child) => child,
                None => {
                    if skip_missing {
                        continue;
                    }
                    let child = self.arena.alloc(Node::background());
                    self.arena.set_child(node, octant, child);
                    child
                }
            };
            if self.apply_uniform(child, delta) {
                self.arena.clear_child(node, octant);
                self.arena.free_subtree(child);
            }
        }
        if self.arena.release_block_if_empty(node) {
            return true;
        }
        self.arena.refresh_aggregates(node);
        false
    }
}

/// Error merging an accumulator into the tree. The merge rejects the whole
/// batch before touching any node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeError {
    /// Accumulator and tree were built for different depths.
    DepthMismatch {
        /// The tree's depth
        tree: u8,
        /// The accumulator's depth
        update: u8,
    },
    /// The accumulator has not been downsampled (`finish` was not called
    /// after the last mutation).
    NotDownsampled,
}

impl fmt::Display for MergeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MergeError::DepthMismatch { tree, update } => {
                write!(f, "accumulator depth {} does not match tree depth {}", update, tree)
            }
            MergeError::NotDownsampled => {
                write!(f, "accumulator must be finished (downsampled) before merging")
            }
        }
    }
}

impl std::error::Error for MergeError {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DecayConfig, MapConfig, TreeConfig};

    fn small_tree() -> OccupancyTree {
        let config = MapConfig {
            tree: TreeConfig {
                depth: 4,
                ..TreeConfig::default()
            },
            decay: DecayConfig::default(),
        };
        OccupancyTree::new(config).unwrap()
    }

    #[test]
    fn test_update_creates_path() {
        let mut tree = small_tree();
        assert!(tree.is_empty());
        let key = SpatialKey::new(3, 7, 11);
        let node = tree.update_occupancy(key, true).unwrap();
        assert!((node.log_odds - 0.85).abs() < 1e-6);
        assert_eq!(node.expiry, None);
        // Root + 4 levels of descent
        assert_eq!(tree.node_count(), 5);

        let (leaf, level) = tree.search(key).unwrap();
        assert_eq!(level, 0);
        assert!((leaf.log_odds - 0.85).abs() < 1e-6);
    }

    #[test]
    fn test_update_rejects_bad_key() {
        let mut tree = small_tree();
        let err = tree.update_occupancy(SpatialKey::new(16, 0, 0), true);
        assert!(err.is_err());
        assert!(tree.is_empty());
    }

    #[test]
    fn test_log_odds_clamping() {
        let mut tree = small_tree();
        let key = SpatialKey::new(1, 1, 1);
        for _ in 0..20 {
            tree.update_occupancy(key, true).unwrap();
        }
        let (node, _) = tree.search(key).unwrap();
        assert!((node.log_odds - tree.config().clamp_max).abs() < 1e-6);

        for _ in 0..40 {
            tree.update_occupancy(key, false).unwrap();
        }
        let (node, _) = tree.search(key).unwrap();
        assert!((node.log_odds - tree.config().clamp_min).abs() < 1e-6);
    }

    #[test]
    fn test_aggregate_invariant_after_updates() {
        let mut tree = small_tree();
        tree.advance_clock(100);
        tree.update_occupancy(SpatialKey::new(0, 0, 0), true).unwrap();
        tree.advance_clock(200);
        tree.update_occupancy(SpatialKey::new(15, 15, 15), true).unwrap();

        // Root carries the minimum stamp over both leaves
        let root_node = tree.arena.node(tree.root.unwrap());
        assert_eq!(root_node.stamp, 100);
        assert_eq!(root_node.expiry, None);
        assert!(root_node.log_odds >= tree.config().occupancy_threshold);
    }

    #[test]
    fn test_decay_bounded_between_value_and_threshold() {
        let mut tree = small_tree();
        let key = SpatialKey::new(2, 2, 2);
        tree.advance_clock(0);
        for _ in 0..4 {
            tree.update_occupancy(key, true).unwrap();
        }
        let original = tree.search(key).unwrap().0.log_odds;

        // Resolve the expiry, then come back mid-life
        tree.expire_nodes(0);
        let expiry = tree.search(key).unwrap().0.expiry.unwrap();
        let midpoint = expiry / 2;
        tree.advance_clock(midpoint);
        tree.update_occupancy(key, true).unwrap();

        let decayed = tree.search(key).unwrap().0.log_odds;
        let threshold = tree.config().occupancy_threshold;
        // The stored value includes the fresh hit; subtract it to inspect
        // the decayed base
        let base = decayed - tree.config().hit_log_odds;
        assert!(base <= original);
        assert!(base >= threshold);
    }

    #[test]
    fn test_merge_matches_individual_updates() {
        let mut batched = small_tree();
        let mut individual = small_tree();
        batched.advance_clock(50);
        individual.advance_clock(50);

        let occupied = [
            SpatialKey::new(1, 2, 3),
            SpatialKey::new(1, 2, 4),
            SpatialKey::new(9, 9, 9),
        ];
        let free = [
            SpatialKey::new(0, 0, 0),
            SpatialKey::new(5, 5, 5),
            SpatialKey::new(14, 2, 7),
        ];

        let mut update = UpdateAccumulator::new(4);
        update
            .set_bounds(SpatialKey::ZERO, SpatialKey::new(15, 15, 15))
            .unwrap();
        for key in occupied {
            update.insert_occupied(key);
        }
        for key in free {
            update.insert_free(key);
        }
        update.finish();
        batched.apply_update(&update).unwrap();

        for key in occupied {
            individual.update_occupancy(key, true).unwrap();
        }
        for key in free {
            individual.update_occupancy(key, false).unwrap();
        }

        for key in occupied.iter().chain(free.iter()) {
            let (a, level_a) = batched.search(*key).unwrap();
            let (b, level_b) = individual.search(*key).unwrap();
            assert_eq!(level_a, level_b, "level mismatch at {:?}", key);
            assert!(
                (a.log_odds - b.log_odds).abs() < 1e-6,
                "log odds mismatch at {:?}: {} vs {}",
                key,
                a.log_odds,
                b.log_odds
            );
            assert_eq!(a.stamp, b.stamp, "stamp mismatch at {:?}", key);
        }
    }

    #[test]
    fn test_merge_uniform_region_is_single_node() {
        let mut tree = small_tree();
        let mut update = UpdateAccumulator::new(4);
        update
            .set_bounds(SpatialKey::ZERO, SpatialKey::new(15, 15, 15))
            .unwrap();
        // A full 2x2x2 octant collapses to one pure cell at level 1
        for z in 0..2 {
            for y in 0..2 {
                for x in 0..2 {
                    update.insert_occupied(SpatialKey::new(x, y, z));
                }
            }
        }
        update.finish();
        tree.apply_update(&update).unwrap();

        // Root, two inner nodes and one coarse leaf at level 1, instead of
        // a full-depth path to 8 separate leaves
        assert_eq!(tree.node_count(), 4);
        let (node, level) = tree.search(SpatialKey::ZERO).unwrap();
        assert_eq!(level, 1);
        assert!(tree.is_occupied(node));
    }

    #[test]
    fn test_merge_rejected_before_mutation() {
        let mut tree = small_tree();

        let mut wrong_depth = UpdateAccumulator::new(6);
        wrong_depth
            .set_bounds(SpatialKey::ZERO, SpatialKey::new(15, 15, 15))
            .unwrap();
        wrong_depth.insert_occupied(SpatialKey::new(1, 1, 1));
        wrong_depth.finish();
        assert_eq!(
            tree.apply_update(&wrong_depth),
            Err(MergeError::DepthMismatch { tree: 4, update: 6 })
        );
        assert!(tree.is_empty());

        let mut unfinished = UpdateAccumulator::new(4);
        unfinished
            .set_bounds(SpatialKey::ZERO, SpatialKey::new(15, 15, 15))
            .unwrap();
        unfinished.insert_occupied(SpatialKey::new(1, 1, 1));
        assert_eq!(tree.apply_update(&unfinished), Err(MergeError::NotDownsampled));
        assert!(tree.is_empty());
    }

    #[test]
    fn test_delete_minimum_keeps_free_space_sparse() {
        let config = MapConfig {
            tree: TreeConfig {
                depth: 4,
                delete_minimum: true,
                ..TreeConfig::default()
            },
            decay: DecayConfig::default(),
        };
        let mut tree = OccupancyTree::new(config).unwrap();

        let mut update = UpdateAccumulator::new(4);
        update
            .set_bounds(SpatialKey::ZERO, SpatialKey::new(15, 15, 15))
            .unwrap();
        for z in 0..16 {
            for y in 0..16 {
                for x in 0..16 {
                    update.insert_free(SpatialKey::new(x, y, z));
                }
            }
        }
        update.finish();
        tree.apply_update(&update).unwrap();
        // Nothing worth storing: everything went straight to the minimum
        assert!(tree.is_empty());
    }

    #[test]
    fn test_coord_key_round_trip() {
        let tree = small_tree();
        // depth 4: keys 0..16, center offset 8, resolution 0.05
        let key = tree.coord_to_key(WorldPoint::new(0.0, 0.12, -0.07)).unwrap();
        assert_eq!(key, SpatialKey::new(8, 10, 6));
        let center = tree.key_to_coord(key, 0);
        assert!((center.x - 0.025).abs() < 1e-6);
        assert!((center.y - 0.125).abs() < 1e-6);
        assert!((center.z + 0.075).abs() < 1e-6);

        // Out of range
        assert!(tree.coord_to_key(WorldPoint::new(10.0, 0.0, 0.0)).is_err());
    }

    #[test]
    fn test_calculate_bounds_clamps() {
        let tree = small_tree();
        let (min, max) = tree.calculate_bounds(100.0, 100.0, 100.0, WorldPoint::ZERO);
        assert_eq!(min, SpatialKey::ZERO);
        assert_eq!(max, SpatialKey::new(15, 15, 15));

        let (min, max) = tree.calculate_bounds(0.1, 0.05, 0.05, WorldPoint::ZERO);
        assert!(min.x >= 6 && max.x <= 10);
        assert!(min.z >= 6 && max.z <= 9);
    }

    #[test]
    fn test_auxiliary_signal() {
        let mut tree = small_tree();
        let key = SpatialKey::new(3, 3, 3);
        assert!(!tree.update_auxiliary(key, 0.5, 0.3).unwrap());
        tree.update_occupancy(key, true).unwrap();
        assert!(tree.update_auxiliary(key, 0.5, 0.3).unwrap());
        let (node, _) = tree.search(key).unwrap();
        assert!((node.ema - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_unknown_accumulator_is_noop() {
        let mut tree = small_tree();
        let mut update = UpdateAccumulator::new(4);
        update
            .set_bounds(SpatialKey::ZERO, SpatialKey::new(15, 15, 15))
            .unwrap();
        update.finish();
        tree.apply_update(&update).unwrap();
        assert!(tree.is_empty());
    }
}
