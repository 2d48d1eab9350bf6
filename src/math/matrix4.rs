//! 4x4 affine transform
//!
//! Thin value type over [`glam::DMat4`] with column-major storage, matching
//! the layout of glTF `node.matrix` and 3D Tiles `tile.transform`.

use glam::{DMat4, DQuat, DVec3};

const IDENTITY_EPSILON: f64 = 1e-12;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Matrix4(DMat4);

impl Default for Matrix4 {
    fn default() -> Self {
        Matrix4::IDENTITY
    }
}

impl From<DMat4> for Matrix4 {
    fn from(m: DMat4) -> Self {
        Matrix4(m)
    }
}

impl Matrix4 {
    pub const IDENTITY: Matrix4 = Matrix4(DMat4::IDENTITY);

    /// Build from 16 column-major values.
    pub fn from_cols_array(values: &[f64; 16]) -> Self {
        Matrix4(DMat4::from_cols_array(values))
    }

    /// Compose `T * R * S`: scale first, then rotation, then translation.
    ///
    /// `rotation` is a quaternion in glTF `[x, y, z, w]` order.
    pub fn from_trs(
        scale: Option<[f64; 3]>,
        rotation: Option<[f64; 4]>,
        translation: Option<[f64; 3]>,
    ) -> Self {
        let scale = scale.map(DVec3::from_array).unwrap_or(DVec3::ONE);
        let rotation = rotation
            .map(|[x, y, z, w]| DQuat::from_xyzw(x, y, z, w).normalize())
            .unwrap_or(DQuat::IDENTITY);
        let translation = translation.map(DVec3::from_array).unwrap_or(DVec3::ZERO);
        Matrix4(DMat4::from_scale_rotation_translation(scale, rotation, translation))
    }

    /// `self * other`: apply `other`, then `self`.
    pub fn multiply(&self, other: &Matrix4) -> Matrix4 {
        Matrix4(self.0 * other.0)
    }

    /// `other * self`: apply `self`, then `other`.
    pub fn premultiply(&self, other: &Matrix4) -> Matrix4 {
        Matrix4(other.0 * self.0)
    }

    pub fn is_identity(&self) -> bool {
        self.0.abs_diff_eq(DMat4::IDENTITY, IDENTITY_EPSILON)
    }

    pub fn to_cols_array(&self) -> [f64; 16] {
        self.0.to_cols_array()
    }

    pub fn transform_point(&self, point: DVec3) -> DVec3 {
        self.0.transform_point3(point)
    }

    pub fn translation(&self) -> DVec3 {
        self.0.w_axis.truncate()
    }

    /// Split into `(translation, rotation, scale)`.
    pub fn decompose(&self) -> (DVec3, DQuat, DVec3) {
        let (scale, rotation, translation) = self.0.to_scale_rotation_translation();
        (translation, rotation, scale)
    }
}
