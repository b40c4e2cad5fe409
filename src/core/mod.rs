//! Fundamental value types: voxel keys, observation states, world points
//! and log-odds math.

mod key;
mod point;
mod state;

pub mod math;

pub use key::{KeyError, SpatialKey, MAX_DEPTH};
pub use point::WorldPoint;
pub use state::VoxelState;
