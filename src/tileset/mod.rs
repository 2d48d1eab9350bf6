//! 3D Tiles output
//!
//! This module turns sliced meshes into a tile tree and encodes the
//! `tileset.json` descriptor and the per-tile payload files.
//!
//! # Submodules
//! - `config` - Measurement unit and up axis of a conversion
//! - `container` - Header and section layout shared by b3dm and i3dm
//! - `b3dm` - Single-mesh payload
//! - `i3dm` - Instanced payload
//! - `tile` - Tile nodes, bounds, geometric error and JSON emission
//! - `builder` - Containment grouping followed by an SAH partition
//! - `tileset` - The `tileset.json` root object

pub mod b3dm;
pub mod builder;
pub mod config;
pub mod container;
pub mod i3dm;
pub mod tile;
#[allow(clippy::module_inception)]
pub mod tileset;

// Re-export key types for convenience
pub use b3dm::B3dm;
pub use builder::{build_bvh, build_tree, sah_cost, split_group};
pub use config::{Measure, TilingContext, UpAxis};
pub use i3dm::I3dm;
pub use tile::{ContentKind, Refine, Tile, TileContent};
pub use tileset::Tileset;
