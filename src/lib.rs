//! glTF to 3D Tiles conversion
//!
//! Slices every mesh of a glTF 2.0 scene into a standalone payload, arranges
//! the payloads in a bounding-volume tree and writes an OGC 3D Tiles 1.0
//! tileset (`tileset.json` plus `.b3dm` / `.i3dm` files).
//!
//! # Module Structure
//! - `errors` - Library error type
//! - `math` - `Box3` and `Matrix4` value types
//! - `gltf` - Document model, IO, GLB container and the mesh slicer
//! - `tileset` - Tile tree, tree builder and the 3D Tiles containers
//! - `converter` - End-to-end conversion pipelines

pub mod converter;
pub mod errors;
pub mod gltf;
pub mod math;
pub mod tileset;

// Re-export key types for convenience
pub use converter::{gltf_to_b3dm, gltf_to_glb, gltf_to_tileset};
pub use errors::{Result, TilerError};
pub use math::{Box3, Matrix4};
pub use tileset::{Measure, TilingContext, UpAxis};
