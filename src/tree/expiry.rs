//! Maintenance passes: expiry sweep, out-of-bounds eviction and pruning.
//!
//! The expiry sweep is where lazily deferred expiry times get resolved. A
//! leaf touched by an update carries `expiry: None` until the next sweep
//! computes `stamp + c + a * log_odds^2` for it; inner nodes aggregate the
//! minimum over their children, with an unresolved child keeping the whole
//! subtree unresolved so the sweep cannot skip past it.

use super::arena::NodeId;
use super::OccupancyTree;
use crate::core::SpatialKey;

impl OccupancyTree {
    /// Expire every subtree whose lifetime ended at or before `now`,
    /// resolving deferred expiry times along the way. Advances the logical
    /// clock and returns the number of nodes removed.
    ///
    /// Safe to call repeatedly with the same `now`: a second pass finds
    /// nothing left to remove.
    pub fn expire_nodes(&mut self, now: u32) -> usize {
        self.advance_clock(now);
        // Config may have been reloaded between sweeps
        self.a_coeff_log_odds = self.decay.a_coeff_log_odds(self.config.hit_log_odds);
        let root = match self.root {
            Some(root) => root,
            None => return 0,
        };
        let before = self.arena.len();
        if self.expire_recurs(root, now) {
            self.arena.free_subtree(root);
            self.root = None;
        }
        let removed = before - self.arena.len();
        if removed > 0 {
            log::debug!("expiry sweep at t={} removed {} nodes", now, removed);
        }
        removed
    }

    /// Returns true if the caller should detach and release this subtree.
    fn expire_recurs(&mut self, id: NodeId, now: u32) -> bool {
        let node = *self.arena.node(id);
        if node.log_odds >= self.config.occupancy_threshold {
            // A resolved future expiry covers the whole subtree (it is the
            // minimum over all descendants), so nothing below can be stale
            if let Some(expiry) = node.expiry {
                if expiry > now {
                    return false;
                }
            }
            if node.children.is_some() {
                self.expire_children(id, now)
            } else {
                let expiry = match node.expiry {
                    Some(expiry) => expiry,
                    None => {
                        let expiry = self.leaf_expiry(node.stamp, node.log_odds);
                        self.arena.node_mut(id).expiry = Some(expiry);
                        expiry
                    }
                };
                expiry <= now
            }
        } else if let Some(timeout) = self.decay.free_timeout {
            if let Some(expiry) = node.expiry {
                if expiry > now {
                    return false;
                }
            }
            if node.children.is_some() {
                self.expire_children(id, now)
            } else {
                let expiry = match node.expiry {
                    Some(expiry) => expiry,
                    None => {
                        let expiry = node.stamp.saturating_add(timeout);
                        self.arena.node_mut(id).expiry = Some(expiry);
                        expiry
                    }
                };
                expiry <= now
            }
        } else {
            // Free space without a timeout never expires
            false
        }
    }

    fn expire_children(&mut self, id: NodeId, now: u32) -> bool {
        for octant in 0..8 {
            if let Some(child) = self.arena.child(id, octant) {
                if self.expire_recurs(child, now) {
                    self.arena.clear_child(id, octant);
                    self.arena.free_subtree(child);
                }
            }
        }
        if self.arena.release_block_if_empty(id) {
            return true;
        }
        self.arena.refresh_aggregates(id);
        false
    }

    /// Quadratic lifetime rule: more accumulated evidence buys more time.
    fn leaf_expiry(&self, stamp: u32, log_odds: f32) -> u32 {
        (stamp as f64
            + self.decay.c_coeff as f64
            + self.a_coeff_log_odds as f64 * log_odds as f64 * log_odds as f64) as u32
    }

    /// Remove every subtree entirely outside the inclusive key range, e.g.
    /// after the platform moved and the far half of the map went stale.
    /// Coarse leaves straddling the boundary are kept. Returns the number
    /// of nodes removed.
    pub fn expire_out_of_bounds(&mut self, min_key: SpatialKey, max_key: SpatialKey) -> usize {
        let min = min_key.min(max_key);
        let max = min_key.max(max_key);
        let root = match self.root {
            Some(root) => root,
            None => return 0,
        };
        let before = self.arena.len();
        if self.bounds_recurs(root, SpatialKey::ZERO, self.config.depth, min, max) {
            self.arena.free_subtree(root);
            self.root = None;
        }
        let removed = before - self.arena.len();
        if removed > 0 {
            log::debug!("out-of-bounds eviction removed {} nodes", removed);
        }
        removed
    }

    fn bounds_recurs(
        &mut self,
        id: NodeId,
        key: SpatialKey,
        level: u8,
        min: SpatialKey,
        max: SpatialKey,
    ) -> bool {
        let span = if level >= 32 { u32::MAX } else { (1u32 << level) - 1 };
        let node_max = SpatialKey::new(
            key.x.saturating_add(span),
            key.y.saturating_add(span),
            key.z.saturating_add(span),
        );
        let outside = node_max.x < min.x
            || node_max.y < min.y
            || node_max.z < min.z
            || key.x > max.x
            || key.y > max.y
            || key.z > max.z;
        if outside {
            return true;
        }
        let inside = key.x >= min.x
            && key.y >= min.y
            && key.z >= min.z
            && node_max.x <= max.x
            && node_max.y <= max.y
            && node_max.z <= max.z;
        if inside || self.arena.node(id).is_leaf() {
            return false;
        }
        let child_level = level - 1;
        for octant in 0..8 {
            if let Some(child) = self.arena.child(id, octant) {
                let child_key = key.with_octant(octant, child_level);
                if self.bounds_recurs(child, child_key, child_level, min, max) {
                    self.arena.clear_child(id, octant);
                    self.arena.free_subtree(child);
                }
            }
        }
        if self.arena.release_block_if_empty(id) {
            return true;
        }
        self.arena.refresh_aggregates(id);
        false
    }

    /// Merge identical leaf siblings into their parent, bottom-up. A no-op
    /// unless pruning is enabled in the configuration. Returns the number
    /// of nodes removed.
    pub fn prune(&mut self) -> usize {
        if !self.config.prune_enabled {
            return 0;
        }
        let root = match self.root {
            Some(root) => root,
            None => return 0,
        };
        let before = self.arena.len();
        self.prune_recurs(root);
        let removed = before - self.arena.len();
        if removed > 0 {
            log::debug!("prune removed {} nodes", removed);
        }
        removed
    }

    fn prune_recurs(&mut self, id: NodeId) {
        if self.arena.node(id).is_leaf() {
            return;
        }
        for octant in 0..8 {
            if let Some(child) = self.arena.child(id, octant) {
                self.prune_recurs(child);
            }
        }
        // Merge only a complete set of identical leaves; anything less
        // would invent data for missing octants
        let mut merged = None;
        for octant in 0..8 {
            let child = match self.arena.child(id, octant) {
                Some(child) => child,
                None => return,
            };
            let node = *self.arena.node(child);
            if !node.is_leaf() {
                return;
            }
            match &merged {
                None => merged = Some(node),
                Some(first) => {
                    if !first.same_value(&node) {
                        return;
                    }
                }
            }
        }
        let merged = merged.expect("eight identical leaves");
        for octant in 0..8 {
            if let Some(child) = self.arena.child(id, octant) {
                self.arena.clear_child(id, octant);
                self.arena.free(child);
            }
        }
        self.arena.release_block_if_empty(id);
        let node = self.arena.node_mut(id);
        node.log_odds = merged.log_odds;
        node.stamp = merged.stamp;
        node.expiry = merged.expiry;
        node.ema = merged.ema;
        node.emvar = merged.emvar;
    }
}
