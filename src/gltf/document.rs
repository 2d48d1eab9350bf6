//! Typed view of a glTF 2.0 document
//!
//! Only the fields the slicer reads or rewrites are typed. Everything else
//! survives a parse/serialize round trip through the flattened `extra` maps,
//! so materials, samplers and accessors keep their unmodelled properties.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

use crate::errors::{Result, TilerError};

/// Root glTF object. Buffer bytes are held separately (see [`super::io::read`]).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    #[serde(default)]
    pub asset: Asset,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scene: Option<usize>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub scenes: Vec<Scene>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub nodes: Vec<Node>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub meshes: Vec<Mesh>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub accessors: Vec<Accessor>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub buffer_views: Vec<BufferView>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub buffers: Vec<Buffer>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub materials: Vec<Material>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub textures: Vec<Texture>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub samplers: Vec<Sampler>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub images: Vec<Image>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub extensions_used: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub extensions_required: Vec<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Asset {
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generator: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Default for Asset {
    fn default() -> Self {
        Self {
            version: "2.0".to_string(),
            generator: None,
            extra: Map::new(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Scene {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub nodes: Vec<usize>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Node {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mesh: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub matrix: Option<[f64; 16]>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rotation: Option<[f64; 4]>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scale: Option<[f64; 3]>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub translation: Option<[f64; 3]>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extras: Option<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Node {
    pub fn has_trs(&self) -> bool {
        self.scale.is_some() || self.rotation.is_some() || self.translation.is_some()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Mesh {
    pub primitives: Vec<Primitive>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Primitive {
    pub attributes: BTreeMap<String, usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub indices: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub material: Option<usize>,
    /// Morph targets, each a map of attribute name to accessor index.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub targets: Vec<BTreeMap<String, usize>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Primitive {
    /// Every accessor the primitive references: attributes, indices, then morph targets.
    pub fn accessor_indices(&self) -> impl Iterator<Item = usize> + '_ {
        self.attributes
            .values()
            .copied()
            .chain(self.indices)
            .chain(self.targets.iter().flat_map(|t| t.values().copied()))
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Accessor {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub buffer_view: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub byte_offset: Option<u64>,
    pub component_type: u32,
    pub count: u64,
    #[serde(rename = "type")]
    pub type_: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<Vec<f64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<Vec<f64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sparse: Option<Sparse>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Sparse {
    pub count: u64,
    pub indices: SparseView,
    pub values: SparseView,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// `sparse.indices` / `sparse.values`; both point at a buffer view.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SparseView {
    pub buffer_view: usize,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BufferView {
    pub buffer: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub byte_offset: Option<u64>,
    pub byte_length: u64,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Buffer {
    pub byte_length: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uri: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Material {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pbr_metallic_roughness: Option<PbrMetallicRoughness>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub normal_texture: Option<TextureInfo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub occlusion_texture: Option<TextureInfo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub emissive_texture: Option<TextureInfo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extensions: Option<Map<String, Value>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PbrMetallicRoughness {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_color_texture: Option<TextureInfo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metallic_roughness_texture: Option<TextureInfo>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// `textureInfo`, `normalTextureInfo` and `occlusionTextureInfo` share this shape.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TextureInfo {
    pub index: usize,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Texture {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sampler: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extensions: Option<Map<String, Value>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Samplers carry no references and are copied verbatim.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Sampler {
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Image {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uri: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub buffer_view: Option<usize>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Image {
    /// Image stored on disk next to the document (not embedded, not a data URI).
    pub fn file_uri(&self) -> Option<&str> {
        self.uri.as_deref().filter(|uri| !uri.starts_with("data:"))
    }
}

fn lookup<'a, T>(items: &'a [T], kind: &'static str, index: usize, context: &str) -> Result<&'a T> {
    items
        .get(index)
        .ok_or_else(|| TilerError::dangling(kind, index, context))
}

impl Document {
    pub fn node(&self, index: usize, context: &str) -> Result<&Node> {
        lookup(&self.nodes, "node", index, context)
    }

    pub fn mesh(&self, index: usize, context: &str) -> Result<&Mesh> {
        lookup(&self.meshes, "mesh", index, context)
    }

    pub fn accessor(&self, index: usize, context: &str) -> Result<&Accessor> {
        lookup(&self.accessors, "accessor", index, context)
    }

    pub fn buffer_view(&self, index: usize, context: &str) -> Result<&BufferView> {
        lookup(&self.buffer_views, "bufferView", index, context)
    }

    pub fn material(&self, index: usize, context: &str) -> Result<&Material> {
        lookup(&self.materials, "material", index, context)
    }

    pub fn texture(&self, index: usize, context: &str) -> Result<&Texture> {
        lookup(&self.textures, "texture", index, context)
    }

    pub fn sampler(&self, index: usize, context: &str) -> Result<&Sampler> {
        lookup(&self.samplers, "sampler", index, context)
    }

    pub fn image(&self, index: usize, context: &str) -> Result<&Image> {
        lookup(&self.images, "image", index, context)
    }

    /// Root nodes of the default scene.
    ///
    /// Documents without scenes fall back to every node that is nobody's child.
    pub fn root_nodes(&self) -> Result<Vec<usize>> {
        if self.scenes.is_empty() {
            let mut is_child = vec![false; self.nodes.len()];
            for (index, node) in self.nodes.iter().enumerate() {
                for &child in &node.children {
                    let slot = is_child
                        .get_mut(child)
                        .ok_or_else(|| TilerError::dangling("node", child, format!("children of node {}", index)))?;
                    *slot = true;
                }
            }
            return Ok((0..self.nodes.len()).filter(|&i| !is_child[i]).collect());
        }

        let scene_index = self.scene.unwrap_or(0);
        let scene = lookup(&self.scenes, "scene", scene_index, "document.scene")?;
        Ok(scene.nodes.clone())
    }
}
