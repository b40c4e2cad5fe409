//! Voxel addressing keys for the occupancy octree.
//!
//! A [`SpatialKey`] identifies a voxel at the finest resolution the tree
//! supports. Coarser voxels are addressed by the same key with the low bits
//! cleared; no separate index structure is kept.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Maximum supported tree depth in bits per axis.
pub const MAX_DEPTH: u8 = 16;

/// Integer 3D coordinate of a voxel at the finest tree level.
///
/// Each axis is valid over `depth` bits (at most [`MAX_DEPTH`]). The key of
/// the ancestor voxel at tree level `L` (0 = leaf, `depth` = root) is derived
/// by clearing the low `L` bits of each axis.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct SpatialKey {
    /// X axis component
    pub x: u32,
    /// Y axis component
    pub y: u32,
    /// Z axis component
    pub z: u32,
}

impl SpatialKey {
    /// The all-zero key (corner of the tree's key space)
    pub const ZERO: SpatialKey = SpatialKey { x: 0, y: 0, z: 0 };

    /// Create a new key
    #[inline]
    pub fn new(x: u32, y: u32, z: u32) -> Self {
        Self { x, y, z }
    }

    /// Validate that every axis fits in `depth` bits.
    pub fn checked(self, depth: u8) -> Result<Self, KeyError> {
        let limit = 1u32 << depth;
        for (axis, value) in [('x', self.x), ('y', self.y), ('z', self.z)] {
            if value >= limit {
                return Err(KeyError::OutOfRange { axis, value, limit });
            }
        }
        Ok(self)
    }

    /// Key of the ancestor voxel at the given tree level.
    ///
    /// Level 0 is the key itself; higher levels clear the corresponding
    /// number of low bits per axis.
    #[inline]
    pub fn ancestor_at(self, level: u8) -> Self {
        let mask = !0u32 << level;
        Self {
            x: self.x & mask,
            y: self.y & mask,
            z: self.z & mask,
        }
    }

    /// Octant index (0-7) of this key within its parent at the given level.
    ///
    /// Bit layout is `zyx`: bit 0 from x, bit 1 from y, bit 2 from z, each
    /// taken at bit position `level`.
    #[inline]
    pub fn child_index(self, level: u8) -> usize {
        (((self.z >> level) & 1) << 2 | ((self.y >> level) & 1) << 1 | ((self.x >> level) & 1))
            as usize
    }

    /// Key of the child octant `index` one level below a voxel at `level + 1`
    /// whose corner is this key.
    #[inline]
    pub fn with_octant(self, index: usize, level: u8) -> Self {
        Self {
            x: self.x | ((index as u32 & 1) << level),
            y: self.y | ((index as u32 >> 1 & 1) << level),
            z: self.z | ((index as u32 >> 2 & 1) << level),
        }
    }

    /// Per-axis minimum of two keys
    #[inline]
    pub fn min(self, other: Self) -> Self {
        Self {
            x: self.x.min(other.x),
            y: self.y.min(other.y),
            z: self.z.min(other.z),
        }
    }

    /// Per-axis maximum of two keys
    #[inline]
    pub fn max(self, other: Self) -> Self {
        Self {
            x: self.x.max(other.x),
            y: self.y.max(other.y),
            z: self.z.max(other.z),
        }
    }
}

/// Error for keys that do not fit the tree's depth.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyError {
    /// A key component is outside the representable range for the tree depth.
    OutOfRange {
        /// Axis name ('x', 'y' or 'z')
        axis: char,
        /// Offending component value
        value: u32,
        /// Exclusive upper limit (`1 << depth`)
        limit: u32,
    },
}

impl fmt::Display for KeyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyError::OutOfRange { axis, value, limit } => {
                write!(f, "key {} component {} outside range 0..{}", axis, value, limit)
            }
        }
    }
}

impl std::error::Error for KeyError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ancestor_clears_low_bits() {
        let key = SpatialKey::new(0b1011, 0b0110, 0b1111);
        assert_eq!(key.ancestor_at(0), key);
        assert_eq!(key.ancestor_at(2), SpatialKey::new(0b1000, 0b0100, 0b1100));
        assert_eq!(key.ancestor_at(4), SpatialKey::ZERO);
    }

    #[test]
    fn test_child_index_round_trip() {
        // Corner key of a level-3 voxel: low three bits clear on every axis
        let parent = SpatialKey::new(0b1000, 0, 0b1000);
        assert_eq!(parent.ancestor_at(3), parent);
        for index in 0..8 {
            let child = parent.with_octant(index, 2);
            assert_eq!(child.child_index(2), index);
            assert_eq!(child.ancestor_at(3), parent);
        }
    }

    #[test]
    fn test_checked_rejects_out_of_range() {
        assert!(SpatialKey::new(15, 15, 15).checked(4).is_ok());
        let err = SpatialKey::new(16, 0, 0).checked(4).unwrap_err();
        assert_eq!(
            err,
            KeyError::OutOfRange {
                axis: 'x',
                value: 16,
                limit: 16
            }
        );
        // Full depth accepts the whole u16 range per axis
        assert!(SpatialKey::new(65535, 65535, 65535).checked(16).is_ok());
    }

    #[test]
    fn test_octant_bit_layout() {
        let parent = SpatialKey::ZERO;
        assert_eq!(parent.with_octant(0b101, 0), SpatialKey::new(1, 0, 1));
        assert_eq!(parent.with_octant(0b010, 0), SpatialKey::new(0, 1, 0));
    }
}
