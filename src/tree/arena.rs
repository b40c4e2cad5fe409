//! Index-addressed node storage for the occupancy tree.
//!
//! Nodes live in a flat vector and reference each other by [`NodeId`].
//! Child links are held in separate 8-slot blocks so that a node is either
//! childless or owns exactly one block; deleting a subtree returns every
//! node and block index to a free list. This removes the per-path
//! allocate/release discipline that pointer-owned children would need.

/// Handle to a node in the arena.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct NodeId(u32);

impl NodeId {
    #[inline]
    fn index(self) -> usize {
        self.0 as usize
    }
}

/// Handle to an 8-slot child block.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct BlockId(u32);

impl BlockId {
    #[inline]
    fn index(self) -> usize {
        self.0 as usize
    }
}

/// Sentinel for uninitialized EMA/variance extension fields.
pub const EMA_UNSET: f32 = -1.0;

/// A single tree position, inner or leaf.
///
/// A leaf holds a direct observation; an inner node holds aggregates over
/// its children: maximum `log_odds`, minimum `stamp`, minimum `expiry`
/// (unresolved if any child is unresolved) and the plain average of the
/// initialized children's EMA fields.
#[derive(Clone, Copy, Debug)]
pub struct Node {
    /// Signed log-odds of occupancy
    pub log_odds: f32,
    /// Seconds of the last direct update (leaf) or minimum over children
    pub stamp: u32,
    /// Computed staleness time; `None` means "not yet computed"
    pub expiry: Option<u32>,
    /// Experimental: exponentially weighted moving average of an auxiliary
    /// occupancy-like signal; negative while uninitialized
    pub ema: f32,
    /// Experimental: exponentially weighted moving variance of the same
    /// signal; negative while uninitialized
    pub emvar: f32,
    pub(crate) children: Option<BlockId>,
}

impl Node {
    /// A fresh node at the unknown/background value.
    #[inline]
    pub fn background() -> Self {
        Self {
            log_odds: 0.0,
            stamp: 0,
            expiry: None,
            ema: EMA_UNSET,
            emvar: EMA_UNSET,
            children: None,
        }
    }

    /// Whether this node has no children.
    #[inline]
    pub fn is_leaf(&self) -> bool {
        self.children.is_none()
    }

    /// Node equality rule used for pruning: equal value and stamp.
    /// Expiry is compared as well so a prune never silently discards
    /// distinguishing expiry information.
    #[inline]
    pub fn same_value(&self, other: &Node) -> bool {
        self.log_odds == other.log_odds && self.stamp == other.stamp && self.expiry == other.expiry
    }

    /// Fold an auxiliary signal sample into the EMA/variance fields.
    pub fn update_ema(&mut self, value: f32, alpha: f32) {
        if self.ema < 0.0 {
            self.ema = value;
            self.emvar = 0.0;
        } else {
            let delta = value - self.ema;
            self.ema += alpha * delta;
            self.emvar = (1.0 - alpha) * (self.emvar + alpha * delta * delta);
        }
    }
}

/// Arena of tree nodes and child blocks with free-list recycling.
#[derive(Clone, Debug, Default)]
pub(crate) struct NodeArena {
    nodes: Vec<Node>,
    free_nodes: Vec<NodeId>,
    blocks: Vec<[Option<NodeId>; 8]>,
    free_blocks: Vec<BlockId>,
}

impl NodeArena {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live nodes.
    pub fn len(&self) -> usize {
        self.nodes.len() - self.free_nodes.len()
    }

    pub fn clear(&mut self) {
        self.nodes.clear();
        self.free_nodes.clear();
        self.blocks.clear();
        self.free_blocks.clear();
    }

    pub fn alloc(&mut self, node: Node) -> NodeId {
        match self.free_nodes.pop() {
            Some(id) => {
                self.nodes[id.index()] = node;
                id
            }
            None => {
                let id = NodeId(self.nodes.len() as u32);
                self.nodes.push(node);
                id
            }
        }
    }

    /// Release a single childless node.
    pub fn free(&mut self, id: NodeId) {
        debug_assert!(self.nodes[id.index()].children.is_none());
        self.free_nodes.push(id);
    }

    #[inline]
    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.index()]
    }

    #[inline]
    pub fn node_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id.index()]
    }

    #[inline]
    pub fn child(&self, id: NodeId, octant: usize) -> Option<NodeId> {
        let block = self.nodes[id.index()].children?;
        self.blocks[block.index()][octant]
    }

    #[cfg(test)]
    pub fn child_count(&self, id: NodeId) -> usize {
        match self.nodes[id.index()].children {
            Some(block) => self.blocks[block.index()].iter().flatten().count(),
            None => 0,
        }
    }

    /// Attach a child in the given octant slot, allocating the block on
    /// first use. The slot must be empty.
    pub fn set_child(&mut self, id: NodeId, octant: usize, child: NodeId) {
        let block = match self.nodes[id.index()].children {
            Some(block) => block,
            None => {
                let block = match self.free_blocks.pop() {
                    Some(block) => {
                        self.blocks[block.index()] = [None; 8];
                        block
                    }
                    None => {
                        let block = BlockId(self.blocks.len() as u32);
                        self.blocks.push([None; 8]);
                        block
                    }
                };
                self.nodes[id.index()].children = Some(block);
                block
            }
        };
        debug_assert!(self.blocks[block.index()][octant].is_none());
        self.blocks[block.index()][octant] = Some(child);
    }

    /// Detach a child without releasing its storage.
    pub fn clear_child(&mut self, id: NodeId, octant: usize) {
        if let Some(block) = self.nodes[id.index()].children {
            self.blocks[block.index()][octant] = None;
        }
    }

    /// Release the child block if every slot is empty. Returns true if the
    /// node is now childless.
    pub fn release_block_if_empty(&mut self, id: NodeId) -> bool {
        match self.nodes[id.index()].children {
            Some(block) => {
                if self.blocks[block.index()].iter().all(|slot| slot.is_none()) {
                    self.nodes[id.index()].children = None;
                    self.free_blocks.push(block);
                    true
                } else {
                    false
                }
            }
            None => true,
        }
    }

    /// Split a pruned leaf into eight children carrying copies of its data.
    pub fn expand(&mut self, id: NodeId) {
        debug_assert!(self.nodes[id.index()].children.is_none());
        let mut data = self.nodes[id.index()];
        data.children = None;
        for octant in 0..8 {
            let child = self.alloc(data);
            self.set_child(id, octant, child);
        }
    }

    /// Release a whole subtree, returning the number of nodes freed.
    pub fn free_subtree(&mut self, id: NodeId) -> usize {
        let mut freed = 0;
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            if let Some(block) = self.nodes[current.index()].children.take() {
                stack.extend(self.blocks[block.index()].iter().flatten());
                self.free_blocks.push(block);
            }
            self.free_nodes.push(current);
            freed += 1;
        }
        freed
    }

    /// Recompute a node's aggregate fields from its present children:
    /// maximum log-odds, minimum stamp, minimum expiry (unresolved wins)
    /// and plain averages of the initialized EMA fields.
    pub fn refresh_aggregates(&mut self, id: NodeId) {
        let block = match self.nodes[id.index()].children {
            Some(block) => block,
            None => return,
        };
        let mut max_log_odds = f32::NEG_INFINITY;
        let mut min_stamp = u32::MAX;
        let mut min_expiry = Some(u32::MAX);
        let mut ema_sum = 0.0f32;
        let mut emvar_sum = 0.0f32;
        let mut ema_count = 0u32;
        let mut have_children = false;

        for slot in self.blocks[block.index()] {
            let child = match slot {
                Some(child) => &self.nodes[child.index()],
                None => continue,
            };
            have_children = true;
            max_log_odds = max_log_odds.max(child.log_odds);
            min_stamp = min_stamp.min(child.stamp);
            min_expiry = match (min_expiry, child.expiry) {
                (Some(a), Some(b)) => Some(a.min(b)),
                // An unresolved child makes the whole subtree unresolved
                _ => None,
            };
            if child.ema >= 0.0 {
                ema_sum += child.ema;
                emvar_sum += child.emvar;
                ema_count += 1;
            }
        }

        if have_children {
            let node = &mut self.nodes[id.index()];
            node.log_odds = max_log_odds;
            node.stamp = min_stamp;
            node.expiry = min_expiry;
            if ema_count > 0 {
                node.ema = ema_sum / ema_count as f32;
                node.emvar = emvar_sum / ema_count as f32;
            } else {
                node.ema = EMA_UNSET;
                node.emvar = EMA_UNSET;
            }
        }
    }
}
