//! Instanced 3D Model (i3dm) container
//!
//! Header (32 bytes): the b3dm fields plus `gltfFormat` (1 = embedded GLB).
//! The feature table binary holds one record per instance, laid out
//! attribute by attribute (all positions, then all up normals, ...).
//!
//! Two layouts are produced:
//! - components: `POSITION`, `NORMAL_UP`, `NORMAL_RIGHT`, `SCALE_NON_UNIFORM`
//!   (float32 x3 each) when every instance was placed through TRS fields
//! - matrix: `POSITION` + `INSTANCE_MATRIX` (float32 x16, column-major) as
//!   soon as one instance went through a raw node matrix
//!
//! Instance transforms are oriented exactly like a single-instance tile's
//! `transform` (see [`UpAxis::orient`]), so a placement lands in the same spot
//! whichever container carries it.

use byteorder::{LittleEndian, WriteBytesExt};
use glam::DVec3;
use serde_json::{json, Map, Value};

use super::config::UpAxis;
use super::container::{decode_container, ContainerWriter, DecodedContainer, BASE_HEADER_LEN};
use crate::errors::Result;
use crate::gltf::{Instance, TransformSource};
use crate::math::Matrix4;

pub const I3DM_MAGIC: &[u8; 4] = b"i3dm";
pub const I3DM_HEADER_LEN: usize = BASE_HEADER_LEN + 4;
pub const GLTF_FORMAT_EMBEDDED: u32 = 1;

/// One GLB drawn once per instance.
#[derive(Debug, Clone)]
pub struct I3dm {
    glb: Vec<u8>,
    transforms: Vec<Matrix4>,
    use_matrices: bool,
    extras: Vec<Option<Value>>,
}

impl I3dm {
    pub fn new(glb: Vec<u8>, instances: &[Instance], up_axis: UpAxis) -> Self {
        I3dm {
            glb,
            transforms: instances
                .iter()
                .map(|instance| up_axis.orient(&instance.matrix))
                .collect(),
            use_matrices: instances
                .iter()
                .any(|instance| instance.source == TransformSource::Matrix),
            extras: instances.iter().map(|instance| instance.extras.clone()).collect(),
        }
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let (feature_table, feature_binary) = if self.use_matrices {
            self.matrix_layout()?
        } else {
            self.component_layout()?
        };

        let batch_table = if self.extras.iter().any(Option::is_some) {
            let extras: Vec<Value> = self
                .extras
                .iter()
                .map(|e| e.clone().unwrap_or(Value::Null))
                .collect();
            Some(json!({ "extras": extras }))
        } else {
            None
        };

        let mut writer = ContainerWriter::new(I3DM_MAGIC, I3DM_HEADER_LEN);
        writer.set_header_u32(BASE_HEADER_LEN, GLTF_FORMAT_EMBEDDED);
        writer
            .json_section(Some(&feature_table))?
            .binary_section(&feature_binary)?
            .json_section(batch_table.as_ref())?
            .binary_section(&[])?;
        writer.finish(&self.glb)
    }

    fn component_layout(&self) -> Result<(Value, Vec<u8>)> {
        let count = self.transforms.len();
        let decomposed: Vec<_> = self.transforms.iter().map(Matrix4::decompose).collect();

        let mut binary = Vec::with_capacity(count * 48);
        for (translation, _, _) in &decomposed {
            write_vec3(&mut binary, *translation)?;
        }
        for (_, rotation, _) in &decomposed {
            write_vec3(&mut binary, (*rotation * DVec3::Y).normalize_or_zero())?;
        }
        for (_, rotation, _) in &decomposed {
            write_vec3(&mut binary, (*rotation * DVec3::X).normalize_or_zero())?;
        }
        for (_, _, scale) in &decomposed {
            write_vec3(&mut binary, *scale)?;
        }

        let table = feature_table(
            count,
            &[
                ("POSITION", 0),
                ("NORMAL_UP", 12 * count),
                ("NORMAL_RIGHT", 24 * count),
                ("SCALE_NON_UNIFORM", 36 * count),
            ],
        );
        Ok((table, binary))
    }

    fn matrix_layout(&self) -> Result<(Value, Vec<u8>)> {
        let count = self.transforms.len();
        let mut binary = Vec::with_capacity(count * 76);
        for transform in &self.transforms {
            write_vec3(&mut binary, transform.translation())?;
        }
        for transform in &self.transforms {
            for value in transform.to_cols_array() {
                binary.write_f32::<LittleEndian>(value as f32)?;
            }
        }

        let table = feature_table(count, &[("POSITION", 0), ("INSTANCE_MATRIX", 12 * count)]);
        Ok((table, binary))
    }
}

fn feature_table(count: usize, offsets: &[(&str, usize)]) -> Value {
    let mut table = Map::new();
    table.insert("INSTANCES_LENGTH".into(), json!(count));
    for (name, offset) in offsets {
        table.insert((*name).into(), json!({ "byteOffset": offset }));
    }
    Value::Object(table)
}

fn write_vec3(binary: &mut Vec<u8>, v: DVec3) -> Result<()> {
    for value in v.to_array() {
        binary.write_f32::<LittleEndian>(value as f32)?;
    }
    Ok(())
}

/// Split an i3dm payload into its sections; `extra_header[0]` is `gltfFormat`.
pub fn decode_i3dm(data: &[u8]) -> Result<DecodedContainer> {
    decode_container(data, I3DM_MAGIC, I3DM_HEADER_LEN)
}

#[cfg(test)]
mod tests {
    use super::*;
    use byteorder::ByteOrder;

    fn instance(translation: [f64; 3], source: TransformSource, extras: Option<Value>) -> Instance {
        Instance {
            matrix: Matrix4::from_trs(None, None, Some(translation)),
            source,
            extras,
        }
    }

    #[test]
    fn test_component_layout() {
        let instances = vec![
            instance([1.0, 2.0, 3.0], TransformSource::Components, None),
            instance([4.0, 5.0, 6.0], TransformSource::Components, None),
        ];
        let bytes = I3dm::new(vec![0; 8], &instances, UpAxis::Y).to_bytes().unwrap();
        let decoded = decode_i3dm(&bytes).unwrap();

        assert_eq!(decoded.extra_header, vec![1]);
        let table = decoded.feature_table.unwrap();
        assert_eq!(table["INSTANCES_LENGTH"], 2);
        assert_eq!(table["NORMAL_UP"]["byteOffset"], 24);
        assert_eq!(table["SCALE_NON_UNIFORM"]["byteOffset"], 72);
        assert!(table.get("INSTANCE_MATRIX").is_none());
        assert!(decoded.batch_table.is_none());

        // Y-up writes the world translation as is
        let x = LittleEndian::read_f32(&decoded.feature_table_binary[0..4]);
        let y = LittleEndian::read_f32(&decoded.feature_table_binary[4..8]);
        let z = LittleEndian::read_f32(&decoded.feature_table_binary[8..12]);
        assert_eq!((x, y, z), (1.0, 2.0, 3.0));
        assert_eq!(decoded.feature_table_binary.len(), 96);
    }

    #[test]
    fn test_matrix_layout_when_any_raw_matrix() {
        let instances = vec![
            instance([0.0, 0.0, 0.0], TransformSource::Components, Some(json!({"n": 1}))),
            instance([1.0, 0.0, 0.0], TransformSource::Matrix, None),
            instance([2.0, 0.0, 0.0], TransformSource::Components, None),
        ];
        let bytes = I3dm::new(vec![0; 8], &instances, UpAxis::Y).to_bytes().unwrap();
        let decoded = decode_i3dm(&bytes).unwrap();

        let table = decoded.feature_table.unwrap();
        assert_eq!(table["INSTANCES_LENGTH"], 3);
        assert_eq!(table["INSTANCE_MATRIX"]["byteOffset"], 36);
        assert!(table.get("NORMAL_UP").is_none());
        assert_eq!(
            decoded.batch_table,
            Some(json!({"extras": [{"n": 1}, null, null]}))
        );
    }

    fn read_vec3(binary: &[u8], offset: usize) -> [f32; 3] {
        [
            LittleEndian::read_f32(&binary[offset..offset + 4]),
            LittleEndian::read_f32(&binary[offset + 4..offset + 8]),
            LittleEndian::read_f32(&binary[offset + 8..offset + 12]),
        ]
    }

    fn assert_close(actual: [f32; 3], expected: [f32; 3]) {
        for (a, e) in actual.iter().zip(expected.iter()) {
            assert!((a - e).abs() < 1e-6, "got {:?}, expected {:?}", actual, expected);
        }
    }

    #[test]
    fn test_rotated_instance_normals() {
        // 90 degrees about +Z: X goes to +Y and Y goes to -X
        let half = std::f64::consts::FRAC_1_SQRT_2;
        let instances = vec![
            Instance {
                matrix: Matrix4::from_trs(
                    Some([2.0, 3.0, 4.0]),
                    Some([0.0, 0.0, half, half]),
                    Some([1.0, 0.0, 0.0]),
                ),
                source: TransformSource::Components,
                extras: None,
            },
            instance([0.0, 0.0, 0.0], TransformSource::Components, None),
        ];
        let bytes = I3dm::new(vec![0; 8], &instances, UpAxis::Y).to_bytes().unwrap();
        let decoded = decode_i3dm(&bytes).unwrap();
        let binary = &decoded.feature_table_binary;

        assert_close(read_vec3(binary, 0), [1.0, 0.0, 0.0]);
        assert_close(read_vec3(binary, 24), [-1.0, 0.0, 0.0]);
        assert_close(read_vec3(binary, 48), [0.0, 1.0, 0.0]);
        assert_close(read_vec3(binary, 72), [2.0, 3.0, 4.0]);
        // Unrotated instance keeps the axes
        assert_close(read_vec3(binary, 36), [0.0, 1.0, 0.0]);
        assert_close(read_vec3(binary, 60), [1.0, 0.0, 0.0]);
    }

    #[test]
    fn test_instances_oriented_like_tile_transforms() {
        let instances = vec![
            instance([0.0, 5.0, 0.0], TransformSource::Components, None),
            instance([3.0, 0.0, 0.0], TransformSource::Components, None),
        ];
        for up_axis in [UpAxis::Y, UpAxis::Z] {
            let bytes = I3dm::new(vec![0; 8], &instances, up_axis).to_bytes().unwrap();
            let decoded = decode_i3dm(&bytes).unwrap();
            let expected = up_axis.orient(&instances[0].matrix).translation().as_vec3().to_array();
            assert_close(read_vec3(&decoded.feature_table_binary, 0), expected);
        }
        let z = I3dm::new(vec![0; 8], &instances, UpAxis::Z).to_bytes().unwrap();
        assert_close(read_vec3(&decode_i3dm(&z).unwrap().feature_table_binary, 0), [0.0, 0.0, 5.0]);
    }
}
