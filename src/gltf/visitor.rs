//! Closed visitors over index-bearing fields
//!
//! Materials reference textures from a fixed set of slots, textures reference
//! images from `source` and from a few image-format extensions. Each visitor
//! walks its slots in one fixed order and hands out `&mut usize`, so the same
//! function both harvests indices (on a clone) and rewrites them.

use serde_json::{Map, Value};

use super::document::{Material, Texture};
use crate::errors::Result;

/// Material extensions and the texture slots each one declares, in visit order.
pub const MATERIAL_EXTENSION_SLOTS: &[(&str, &[&str])] = &[
    (
        "KHR_materials_pbrSpecularGlossiness",
        &["diffuseTexture", "specularGlossinessTexture"],
    ),
    (
        "KHR_materials_clearcoat",
        &["clearcoatTexture", "clearcoatRoughnessTexture", "clearcoatNormalTexture"],
    ),
    ("KHR_materials_transmission", &["transmissionTexture"]),
    ("KHR_materials_volume", &["thicknessTexture"]),
    ("KHR_materials_sheen", &["sheenColorTexture", "sheenRoughnessTexture"]),
    ("KHR_materials_specular", &["specularTexture", "specularColorTexture"]),
    (
        "KHR_materials_iridescence",
        &["iridescenceTexture", "iridescenceThicknessTexture"],
    ),
    ("KHR_materials_anisotropy", &["anisotropyTexture"]),
];

/// Texture extensions that carry their own `source` image index.
pub const TEXTURE_SOURCE_EXTENSIONS: &[&str] = &[
    "KHR_texture_basisu",
    "EXT_texture_webp",
    "EXT_texture_avif",
    "MSFT_texture_dds",
];

/// Visit every texture index of `material`.
///
/// Order: base color, metallic-roughness, normal, occlusion, emissive, then
/// [`MATERIAL_EXTENSION_SLOTS`] in table order.
pub fn visit_material_textures<F>(material: &mut Material, mut visit: F) -> Result<()>
where
    F: FnMut(&mut usize) -> Result<()>,
{
    if let Some(pbr) = material.pbr_metallic_roughness.as_mut() {
        for info in [
            pbr.base_color_texture.as_mut(),
            pbr.metallic_roughness_texture.as_mut(),
        ]
        .into_iter()
        .flatten()
        {
            visit(&mut info.index)?;
        }
    }

    for info in [
        material.normal_texture.as_mut(),
        material.occlusion_texture.as_mut(),
        material.emissive_texture.as_mut(),
    ]
    .into_iter()
    .flatten()
    {
        visit(&mut info.index)?;
    }

    if let Some(extensions) = material.extensions.as_mut() {
        for (name, slots) in MATERIAL_EXTENSION_SLOTS {
            let Some(extension) = extensions.get_mut(*name) else {
                continue;
            };
            for slot in slots.iter() {
                if let Some(texture_info) = extension.get_mut(*slot) {
                    visit_json_index(texture_info, "index", &mut visit)?;
                }
            }
        }
    }

    Ok(())
}

/// Visit the image indices of `texture`: `source`, then [`TEXTURE_SOURCE_EXTENSIONS`].
pub fn visit_texture_sources<F>(texture: &mut Texture, mut visit: F) -> Result<()>
where
    F: FnMut(&mut usize) -> Result<()>,
{
    if let Some(source) = texture.source.as_mut() {
        visit(source)?;
    }
    if let Some(extensions) = texture.extensions.as_mut() {
        visit_extension_sources(extensions, &mut visit)?;
    }
    Ok(())
}

fn visit_extension_sources<F>(extensions: &mut Map<String, Value>, visit: &mut F) -> Result<()>
where
    F: FnMut(&mut usize) -> Result<()>,
{
    for name in TEXTURE_SOURCE_EXTENSIONS {
        if let Some(extension) = extensions.get_mut(*name) {
            visit_json_index(extension, "source", visit)?;
        }
    }
    Ok(())
}

fn visit_json_index<F>(object: &mut Value, key: &str, visit: &mut F) -> Result<()>
where
    F: FnMut(&mut usize) -> Result<()>,
{
    let Some(slot) = object.get_mut(key) else {
        return Ok(());
    };
    let Some(mut index) = slot.as_u64().map(|i| i as usize) else {
        return Ok(());
    };
    visit(&mut index)?;
    *slot = Value::from(index);
    Ok(())
}

/// Texture indices of `material` in visit order (duplicates kept).
pub fn material_texture_indices(material: &Material) -> Result<Vec<usize>> {
    let mut indices = Vec::new();
    visit_material_textures(&mut material.clone(), |index| {
        indices.push(*index);
        Ok(())
    })?;
    Ok(indices)
}

/// Image indices of `texture` in visit order.
pub fn texture_source_indices(texture: &Texture) -> Result<Vec<usize>> {
    let mut indices = Vec::new();
    visit_texture_sources(&mut texture.clone(), |index| {
        indices.push(*index);
        Ok(())
    })?;
    Ok(indices)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn material() -> Material {
        serde_json::from_str(
            r#"{
                "pbrMetallicRoughness": {
                    "baseColorTexture": {"index": 4},
                    "metallicRoughnessTexture": {"index": 2}
                },
                "normalTexture": {"index": 7, "scale": 0.5},
                "emissiveTexture": {"index": 4},
                "extensions": {
                    "KHR_materials_clearcoat": {
                        "clearcoatFactor": 1.0,
                        "clearcoatNormalTexture": {"index": 9}
                    },
                    "KHR_materials_emissive_strength": {"emissiveStrength": 2.0}
                }
            }"#,
        )
        .unwrap()
    }

    #[test]
    fn test_harvest_order_is_fixed() {
        assert_eq!(material_texture_indices(&material()).unwrap(), vec![4, 2, 7, 4, 9]);
    }

    #[test]
    fn test_rewrite_uses_same_order() {
        let mut m = material();
        let mut counter = 0;
        visit_material_textures(&mut m, |index| {
            *index = counter;
            counter += 1;
            Ok(())
        })
        .unwrap();
        assert_eq!(material_texture_indices(&m).unwrap(), vec![0, 1, 2, 3, 4]);

        let value = serde_json::to_value(&m).unwrap();
        assert_eq!(value["normalTexture"]["scale"], 0.5);
        assert_eq!(
            value["extensions"]["KHR_materials_clearcoat"]["clearcoatNormalTexture"]["index"],
            4
        );
        assert_eq!(value["extensions"]["KHR_materials_clearcoat"]["clearcoatFactor"], 1.0);
    }

    #[test]
    fn test_texture_sources_include_extensions() {
        let texture: Texture = serde_json::from_str(
            r#"{"sampler": 0, "source": 1, "extensions": {"EXT_texture_webp": {"source": 3}}}"#,
        )
        .unwrap();
        assert_eq!(texture_source_indices(&texture).unwrap(), vec![1, 3]);
    }

    #[test]
    fn test_visitor_errors_propagate() {
        let mut m = material();
        let result = visit_material_textures(&mut m, |index| {
            Err(crate::errors::TilerError::dangling("texture", *index, "test"))
        });
        assert!(result.is_err());
    }
}
