//! Axis-aligned bounding box
//!
//! Boxes start out [`Box3::Empty`] and only ever widen through
//! [`Box3::expand_by_point`] and [`Box3::union`], so a fresh instance is a
//! safe accumulator without relying on infinity arithmetic.

use glam::DVec3;

use super::Matrix4;

/// Axis-aligned box in 3-D.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum Box3 {
    /// Contains nothing; the identity element of `union`.
    #[default]
    Empty,
    /// Closed box `[min, max]` with `min <= max` on every axis.
    Bounded { min: DVec3, max: DVec3 },
}

impl Box3 {
    /// Box spanning two corners given in any order.
    pub fn from_min_max(min: [f64; 3], max: [f64; 3]) -> Self {
        let mut b = Box3::Empty;
        b.expand_by_point(DVec3::from_array(min));
        b.expand_by_point(DVec3::from_array(max));
        b
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Box3::Empty)
    }

    pub fn min(&self) -> Option<DVec3> {
        match self {
            Box3::Empty => None,
            Box3::Bounded { min, .. } => Some(*min),
        }
    }

    pub fn max(&self) -> Option<DVec3> {
        match self {
            Box3::Empty => None,
            Box3::Bounded { max, .. } => Some(*max),
        }
    }

    /// Widen the box so that it contains `point`.
    pub fn expand_by_point(&mut self, point: DVec3) -> &mut Self {
        *self = match *self {
            Box3::Empty => Box3::Bounded { min: point, max: point },
            Box3::Bounded { min, max } => Box3::Bounded {
                min: min.min(point),
                max: max.max(point),
            },
        };
        self
    }

    /// Smallest box containing both `self` and `other`.
    pub fn union(&self, other: &Box3) -> Box3 {
        match (*self, *other) {
            (Box3::Empty, b) | (b, Box3::Empty) => b,
            (Box3::Bounded { min: a0, max: a1 }, Box3::Bounded { min: b0, max: b1 }) => {
                Box3::Bounded {
                    min: a0.min(b0),
                    max: a1.max(b1),
                }
            }
        }
    }

    /// Non-strict containment on every axis. Every box contains the empty box.
    pub fn contains(&self, other: &Box3) -> bool {
        match (self, other) {
            (_, Box3::Empty) => true,
            (Box3::Empty, Box3::Bounded { .. }) => false,
            (Box3::Bounded { min: a0, max: a1 }, Box3::Bounded { min: b0, max: b1 }) => {
                a0.cmple(*b0).all() && b1.cmple(*a1).all()
            }
        }
    }

    pub fn center(&self) -> DVec3 {
        match self {
            Box3::Empty => DVec3::ZERO,
            Box3::Bounded { min, max } => (*min + *max) * 0.5,
        }
    }

    pub fn size(&self) -> DVec3 {
        match self {
            Box3::Empty => DVec3::ZERO,
            Box3::Bounded { min, max } => (*max - *min).abs(),
        }
    }

    /// Length of the space diagonal.
    pub fn diagonal(&self) -> f64 {
        self.size().length()
    }

    /// Transform all 8 corners by `matrix` and re-expand from empty.
    ///
    /// Rotated boxes stay axis-aligned; the result may over-approximate
    /// the transformed volume but never under-approximates it.
    pub fn apply_matrix4(&self, matrix: &Matrix4) -> Box3 {
        let (min, max) = match self {
            Box3::Empty => return Box3::Empty,
            Box3::Bounded { min, max } => (*min, *max),
        };
        let corners = [
            DVec3::new(min.x, min.y, min.z),
            DVec3::new(min.x, min.y, max.z),
            DVec3::new(min.x, max.y, min.z),
            DVec3::new(min.x, max.y, max.z),
            DVec3::new(max.x, min.y, min.z),
            DVec3::new(max.x, min.y, max.z),
            DVec3::new(max.x, max.y, min.z),
            DVec3::new(max.x, max.y, max.z),
        ];

        let mut out = Box3::Empty;
        for corner in corners {
            out.expand_by_point(matrix.transform_point(corner));
        }
        out
    }

    /// 3D Tiles `boundingVolume.box` encoding:
    /// `[cx,cy,cz, hx,0,0, 0,hy,0, 0,0,hz]`.
    pub fn to_box_array(&self) -> [f64; 12] {
        let c = self.center();
        let h = self.size() * 0.5;
        [
            c.x, c.y, c.z,
            h.x, 0.0, 0.0,
            0.0, h.y, 0.0,
            0.0, 0.0, h.z,
        ]
    }
}
