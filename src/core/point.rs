//! World-frame point type.

use serde::{Deserialize, Serialize};

/// A point in world coordinates (meters, f32).
///
/// Coordinates follow the ROS REP-103 convention: X forward, Y left, Z up.
#[derive(Clone, Copy, Debug, PartialEq, Default, Serialize, Deserialize)]
pub struct WorldPoint {
    /// X coordinate in meters
    pub x: f32,
    /// Y coordinate in meters
    pub y: f32,
    /// Z coordinate in meters
    pub z: f32,
}

impl WorldPoint {
    /// The origin
    pub const ZERO: WorldPoint = WorldPoint { x: 0.0, y: 0.0, z: 0.0 };

    /// Create a new point
    #[inline]
    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }
}
