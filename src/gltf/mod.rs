//! glTF 2.0 asset handling
//!
//! This module reads glTF/GLB input, models the parts of the asset graph
//! that carry cross references, and slices single meshes out of a scene.
//!
//! # Submodules
//! - `document` - Serde model of the glTF JSON (unknown fields preserved)
//! - `visitor` - Fixed-order walks over material and texture index slots
//! - `io` - Reading `.gltf`/`.glb` files and resolving buffers
//! - `glb` - Binary glTF container encode/decode
//! - `slicer` - Per-mesh extraction with index compaction and buffer repacking

pub mod document;
pub mod glb;
pub mod io;
pub mod slicer;
pub mod visitor;

// Re-export key types for convenience
pub use document::Document;
pub use glb::Glb;
pub use slicer::{Instance, Slice, Slicer, TransformSource};
