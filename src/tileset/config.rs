//! Tiling options threaded through tree construction and serialization

use std::fmt;
use std::str::FromStr;

use crate::math::Matrix4;

/// Length unit of the source model, used to scale geometric error into meters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Measure {
    #[default]
    Meter,
    Foot,
    Millimeter,
}

impl Measure {
    /// Meters per model unit.
    pub fn factor(&self) -> f64 {
        match self {
            Measure::Meter => 1.0,
            Measure::Foot => 0.3048,
            Measure::Millimeter => 0.001,
        }
    }
}

impl FromStr for Measure {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "meter" | "m" => Ok(Measure::Meter),
            "foot" | "ft" => Ok(Measure::Foot),
            "millimeter" | "mm" => Ok(Measure::Millimeter),
            other => Err(format!(
                "unknown measure '{}' (expected meter, foot or millimeter)",
                other
            )),
        }
    }
}

impl fmt::Display for Measure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Measure::Meter => "meter",
            Measure::Foot => "foot",
            Measure::Millimeter => "millimeter",
        };
        f.write_str(name)
    }
}

/// Up axis of the emitted tileset frame. The source glTF is always Y-up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UpAxis {
    #[default]
    Y,
    Z,
}

impl UpAxis {
    /// Express a glTF world transform in the emitted tile frame.
    ///
    /// Y keeps the matrix. Z swaps the first two rows and the first and third
    /// columns of the linear block and rotates the translation `(x,y,z) -> (z,x,y)`.
    /// Tile transforms and i3dm instance transforms both go through here.
    pub fn orient(&self, matrix: &Matrix4) -> Matrix4 {
        match self {
            UpAxis::Y => *matrix,
            UpAxis::Z => {
                let t = matrix.to_cols_array();
                Matrix4::from_cols_array(&[
                    t[9], t[8], t[10], t[11],
                    t[5], t[4], t[6], t[7],
                    t[1], t[0], t[2], t[3],
                    t[14], t[12], t[13], t[15],
                ])
            }
        }
    }
}

impl FromStr for UpAxis {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Y" | "y" => Ok(UpAxis::Y),
            "Z" | "z" => Ok(UpAxis::Z),
            other => Err(format!("unknown up axis '{}' (expected Y or Z)", other)),
        }
    }
}

impl fmt::Display for UpAxis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UpAxis::Y => f.write_str("Y"),
            UpAxis::Z => f.write_str("Z"),
        }
    }
}

/// Options for one tileset conversion.
#[derive(Debug, Clone, Copy, Default)]
pub struct TilingContext {
    pub measure: Measure,
    pub up_axis: UpAxis,
}

impl TilingContext {
    pub fn new(measure: Measure, up_axis: UpAxis) -> Self {
        TilingContext { measure, up_axis }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_measure_parse_and_factor() {
        assert_eq!("foot".parse::<Measure>().unwrap(), Measure::Foot);
        assert_eq!("MM".parse::<Measure>().unwrap(), Measure::Millimeter);
        assert_eq!(Measure::Foot.factor(), 0.3048);
        assert!("yard".parse::<Measure>().is_err());
        assert_eq!(Measure::Millimeter.to_string(), "millimeter");
    }

    #[test]
    fn test_up_axis_defaults_to_y() {
        assert_eq!(TilingContext::default().up_axis, UpAxis::Y);
        assert_eq!("z".parse::<UpAxis>().unwrap(), UpAxis::Z);
        assert!("X".parse::<UpAxis>().is_err());
    }

    #[test]
    fn test_orient_keeps_y_and_rotates_z_translation() {
        let m = Matrix4::from_trs(None, None, Some([1.0, 2.0, 3.0]));
        assert_eq!(UpAxis::Y.orient(&m), m);

        let z = UpAxis::Z.orient(&m).to_cols_array();
        assert_eq!(&z[12..16], &[3.0, 1.0, 2.0, 1.0]);
        // Identity linear block becomes the cyclic rotation x->y->z->x
        assert_eq!(&z[0..3], &[0.0, 0.0, 1.0]);
        assert_eq!(&z[4..7], &[1.0, 0.0, 0.0]);
        assert_eq!(&z[8..11], &[0.0, 1.0, 0.0]);
    }
}
