//! # Kala-Map: Time-Aware 3D Occupancy Mapping Library
//!
//! A sparse occupancy voxel map for robots operating in environments that
//! change over time. Each voxel carries a log-odds occupancy estimate and a
//! timestamp; voxels that stop being observed decay and eventually expire,
//! so stale obstacles disappear without an explicit clearing pass.
//!
//! ## Features
//!
//! - **Sparse Octree Storage**: Index-addressed nodes with free-list
//!   recycling; uniform regions collapse to a single coarse leaf
//! - **Quadratic Temporal Decay**: Voxels with more accumulated evidence
//!   live longer; expiry times are computed lazily, off the sensor path
//! - **Batched Updates**: A dense per-cycle accumulator downsamples one
//!   sensor cycle's observations and merges them in a single tree pass
//! - **Bounded Update Regions**: Distance-limited bounds keep per-cycle
//!   memory proportional to sensor range, not map size
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use kala_map::{MapConfig, OccupancyTree, UpdateAccumulator};
//! use kala_map::core::WorldPoint;
//!
//! let config = MapConfig::default();
//! let mut tree = OccupancyTree::new(config).unwrap();
//! let mut update = UpdateAccumulator::new(tree.depth());
//!
//! // One sensor cycle: bound the region, batch the observations, merge
//! let origin = WorldPoint::ZERO;
//! let (min, max) = tree.calculate_bounds(5.0, 1.0, 0.5, origin);
//! update.set_bounds(min, max).unwrap();
//!
//! let hit = tree.coord_to_key(WorldPoint::new(1.0, 0.2, 0.1)).unwrap();
//! update.insert_occupied(hit);
//! update.finish();
//!
//! tree.advance_clock(42);
//! tree.apply_update(&update).unwrap();
//!
//! for leaf in tree.occupied_leaves() {
//!     let center = tree.key_to_coord(leaf.key, leaf.level);
//!     println!("obstacle at ({:.2}, {:.2}, {:.2})", center.x, center.y, center.z);
//! }
//! ```
//!
//! ## Architecture
//!
//! The library is organized into modules:
//!
//! - [`core`]: Fundamental types (SpatialKey, VoxelState, WorldPoint)
//! - [`config`]: Configuration types, YAML-loadable
//! - [`accumulator`]: Per-cycle dense batch of observations
//! - [`tree`]: The persistent occupancy octree and its maintenance passes
//! - [`visit`]: Per-cycle ray visit tracking
//!
//! ## Data Flow
//!
//! ```text
//!                    ┌──────────────────┐
//!                    │   Sensor Cycle   │
//!                    │  (rays, points)  │
//!                    └────────┬─────────┘
//!                             │ coord_to_key()
//!                             ▼
//!      ┌──────────────────────────────────────────┐
//!      │            UpdateAccumulator             │
//!      │  insert_free / insert_occupied per key   │
//!      │  (dense grids, first-write semantics)    │
//!      └────────────────────┬─────────────────────┘
//!                           │ finish(): downsample
//!                           ▼
//!      ┌──────────────────────────────────────────┐
//!      │        Level hierarchy (OR / AND)        │
//!      │  uniform octants collapse to pure cells  │
//!      └────────────────────┬─────────────────────┘
//!                           │ apply_update(): one pass
//!                           ▼
//!      ┌──────────────────────────────────────────┐
//!      │              OccupancyTree               │──► leaves()
//!      │  log-odds + stamp + lazy expiry per node │──► occupied_leaves()
//!      └────────────────────┬─────────────────────┘
//!                           │ on its own cadence
//!                           ▼
//!      ┌──────────────────────────────────────────┐
//!      │            Maintenance passes            │
//!      │  expire_nodes / expire_out_of_bounds /   │
//!      │  prune                                   │
//!      └──────────────────────────────────────────┘
//! ```
//!
//! ## Time Model
//!
//! The tree keeps a logical clock in whole seconds that only moves when the
//! caller advances it ([`OccupancyTree::advance_clock`]) or runs an expiry
//! sweep. All stamps and expiry comparisons use this clock, so a pass sees
//! one consistent time from start to finish.

pub mod accumulator;
pub mod config;
pub mod core;
pub mod tree;
pub mod visit;

// Re-export main types at crate root
pub use accumulator::UpdateAccumulator;
pub use config::{ConfigError, DecayConfig, MapConfig, TreeConfig};
pub use tree::{LeafEntry, MergeError, Node, OccupancyTree};
pub use visit::RayVisitSet;
