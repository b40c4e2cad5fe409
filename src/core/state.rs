//! Per-cycle voxel observation states.
//!
//! States are single bits so that groups of eight sibling voxels can be
//! reduced with plain bitwise operations: the OR of an octant answers "does
//! any child hold state X", the AND answers "do all children agree on X".
//! This is what makes the accumulator downsampling step branch-free.

use std::fmt;
use std::ops::{BitAnd, BitOr, BitOrAssign};

/// Observation state of a voxel within one sensor update cycle.
///
/// - [`UNKNOWN`](VoxelState::UNKNOWN): not touched this cycle
/// - [`FREE`](VoxelState::FREE): observed free (ray passed through)
/// - [`OCCUPIED`](VoxelState::OCCUPIED): observed occupied (ray endpoint)
/// - [`INNER`](VoxelState::INNER): summarizes children, not a leaf
///   observation; set by downsampling whenever an octant has any content
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct VoxelState(u8);

impl VoxelState {
    /// No observation this cycle
    pub const UNKNOWN: VoxelState = VoxelState(0);
    /// Observed free
    pub const FREE: VoxelState = VoxelState(1);
    /// Observed occupied
    pub const OCCUPIED: VoxelState = VoxelState(2);
    /// Cell summarizes children rather than holding a leaf observation
    pub const INNER: VoxelState = VoxelState(4);

    /// Raw bit pattern
    #[inline]
    pub fn bits(self) -> u8 {
        self.0
    }

    /// Rebuild from a raw bit pattern
    #[inline]
    pub fn from_bits(bits: u8) -> Self {
        VoxelState(bits)
    }

    /// No bits set at all
    #[inline]
    pub fn is_unknown(self) -> bool {
        self.0 == 0
    }

    /// FREE bit set
    #[inline]
    pub fn is_free(self) -> bool {
        self.0 & Self::FREE.0 != 0
    }

    /// OCCUPIED bit set
    #[inline]
    pub fn is_occupied(self) -> bool {
        self.0 & Self::OCCUPIED.0 != 0
    }

    /// INNER bit set (octant has mixed or summarized content)
    #[inline]
    pub fn has_inner(self) -> bool {
        self.0 & Self::INNER.0 != 0
    }

    /// Exactly one concrete state and no INNER bit.
    ///
    /// A pure cell can be applied to a whole subtree in one update.
    #[inline]
    pub fn is_pure(self) -> bool {
        self == Self::FREE || self == Self::OCCUPIED
    }

    /// Downsample an octant of eight child states into one parent state.
    ///
    /// The AND keeps a concrete state only when all eight children agree, in
    /// which case the parent cell is that pure state and a later merge can
    /// apply it to the whole subtree at once. Otherwise the INNER bit records
    /// that the octant has any content at all, so the merge knows to keep
    /// descending even though no single decision covers the octant.
    #[inline]
    pub fn reduce_octant(children: [VoxelState; 8]) -> VoxelState {
        let mut or = 0u8;
        let mut and = 0xffu8;
        for child in children {
            or |= child.0;
            and &= child.0;
        }
        let concrete = and & (Self::FREE.0 | Self::OCCUPIED.0);
        if concrete != 0 {
            VoxelState(concrete)
        } else {
            VoxelState((((or != 0) as u8) << 2) | (and & Self::INNER.0))
        }
    }
}

impl BitOr for VoxelState {
    type Output = VoxelState;

    #[inline]
    fn bitor(self, rhs: VoxelState) -> VoxelState {
        VoxelState(self.0 | rhs.0)
    }
}

impl BitOrAssign for VoxelState {
    #[inline]
    fn bitor_assign(&mut self, rhs: VoxelState) {
        self.0 |= rhs.0;
    }
}

impl BitAnd for VoxelState {
    type Output = VoxelState;

    #[inline]
    fn bitand(self, rhs: VoxelState) -> VoxelState {
        VoxelState(self.0 & rhs.0)
    }
}

impl fmt::Debug for VoxelState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_unknown() {
            return write!(f, "UNKNOWN");
        }
        let mut parts = Vec::new();
        if self.is_free() {
            parts.push("FREE");
        }
        if self.is_occupied() {
            parts.push("OCCUPIED");
        }
        if self.has_inner() {
            parts.push("INNER");
        }
        write!(f, "{}", parts.join("|"))
    }
}
