//! Geometry primitives shared by the slicer and the tile tree
//!
//! # Submodules
//! - `box3` - Axis-aligned box with an explicit empty state
//! - `matrix4` - 4x4 affine transform

mod box3;
mod matrix4;

pub use box3::Box3;
pub use matrix4::Matrix4;
