// Small glTF scenes built in memory for the integration tests
#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use base64::{engine::general_purpose, Engine as _};
use serde_json::Value;

use gltf_tiler::gltf::document::{
    Accessor, Buffer, BufferView, Document, Image, Material, Mesh, Node, PbrMetallicRoughness,
    Primitive, Scene, Texture, TextureInfo,
};

pub const FLOAT: u32 = 5126;
pub const UNSIGNED_SHORT: u32 = 5123;

/// Builds a single-buffer document of one-triangle meshes.
pub struct SceneBuilder {
    pub document: Document,
    pub buffer: Vec<u8>,
}

impl SceneBuilder {
    pub fn new() -> Self {
        let mut document = Document::default();
        document.scene = Some(0);
        document.scenes.push(Scene::default());
        SceneBuilder {
            document,
            buffer: Vec::new(),
        }
    }

    /// Append `bytes` as a new buffer view and keep the buffer 4-byte aligned.
    fn push_view(&mut self, bytes: &[u8]) -> usize {
        let offset = self.buffer.len();
        self.buffer.extend_from_slice(bytes);
        while self.buffer.len() % 4 != 0 {
            self.buffer.push(0);
        }
        self.document.buffer_views.push(BufferView {
            buffer: 0,
            byte_offset: Some(offset as u64),
            byte_length: bytes.len() as u64,
            ..Default::default()
        });
        self.document.buffer_views.len() - 1
    }

    /// One triangle whose POSITION bounds are `[min, min + size]` on every axis.
    /// Indices are u16 so their view needs padding.
    pub fn add_triangle_mesh(&mut self, min: [f32; 3], size: f32) -> usize {
        let [x, y, z] = min;
        let positions = [x, y, z, x + size, y, z, x, y + size, z + size];
        let position_bytes: Vec<u8> = positions.iter().flat_map(|v| v.to_le_bytes()).collect();
        let index_bytes: Vec<u8> = [0u16, 1, 2].iter().flat_map(|v| v.to_le_bytes()).collect();

        let position_view = self.push_view(&position_bytes);
        let index_view = self.push_view(&index_bytes);

        self.document.accessors.push(Accessor {
            buffer_view: Some(position_view),
            component_type: FLOAT,
            count: 3,
            type_: "VEC3".into(),
            min: Some(vec![x as f64, y as f64, z as f64]),
            max: Some(vec![(x + size) as f64, (y + size) as f64, (z + size) as f64]),
            ..Default::default()
        });
        let position_accessor = self.document.accessors.len() - 1;
        self.document.accessors.push(Accessor {
            buffer_view: Some(index_view),
            component_type: UNSIGNED_SHORT,
            count: 3,
            type_: "SCALAR".into(),
            ..Default::default()
        });
        let index_accessor = self.document.accessors.len() - 1;

        let mut primitive = Primitive {
            indices: Some(index_accessor),
            ..Default::default()
        };
        primitive.attributes.insert("POSITION".into(), position_accessor);
        self.document.meshes.push(Mesh {
            primitives: vec![primitive],
            ..Default::default()
        });
        self.document.meshes.len() - 1
    }

    /// Give `mesh` a material whose base color texture reads `uri`.
    pub fn add_textured_material(&mut self, mesh: usize, uri: &str) -> usize {
        self.document.images.push(Image {
            uri: Some(uri.into()),
            ..Default::default()
        });
        self.document.textures.push(Texture {
            source: Some(self.document.images.len() - 1),
            ..Default::default()
        });
        self.document.materials.push(Material {
            pbr_metallic_roughness: Some(PbrMetallicRoughness {
                base_color_texture: Some(TextureInfo {
                    index: self.document.textures.len() - 1,
                    ..Default::default()
                }),
                ..Default::default()
            }),
            ..Default::default()
        });
        let material = self.document.materials.len() - 1;
        for primitive in &mut self.document.meshes[mesh].primitives {
            primitive.material = Some(material);
        }
        material
    }

    /// Add a node and make it a root of the default scene.
    pub fn add_root(&mut self, node: Node) -> usize {
        let index = self.add_node(node);
        self.document.scenes[0].nodes.push(index);
        index
    }

    pub fn add_node(&mut self, node: Node) -> usize {
        self.document.nodes.push(node);
        self.document.nodes.len() - 1
    }

    /// Document with its buffer declared but without a URI, plus the bytes.
    pub fn build(&self) -> (Document, Vec<Vec<u8>>) {
        let mut document = self.document.clone();
        document.buffers = vec![Buffer {
            byte_length: self.buffer.len() as u64,
            ..Default::default()
        }];
        (document, vec![self.buffer.clone()])
    }

    /// Write `<name>.gltf` and `<name>.bin` into `dir` and return the .gltf path.
    pub fn write_gltf(&self, dir: &Path, name: &str) -> PathBuf {
        let (mut document, buffers) = self.build();
        let bin_name = format!("{}.bin", name);
        document.buffers[0].uri = Some(bin_name.clone());
        fs::write(dir.join(&bin_name), &buffers[0]).expect("Failed to write buffer");

        let path = dir.join(format!("{}.gltf", name));
        fs::write(&path, serde_json::to_vec(&document).expect("Failed to encode glTF"))
            .expect("Failed to write glTF");
        path
    }

    /// Write a self-contained `.gltf` with the buffer as a base64 data URI.
    pub fn write_embedded_gltf(&self, dir: &Path, name: &str) -> PathBuf {
        let (mut document, buffers) = self.build();
        document.buffers[0].uri = Some(format!(
            "data:application/octet-stream;base64,{}",
            general_purpose::STANDARD.encode(&buffers[0])
        ));
        let path = dir.join(format!("{}.gltf", name));
        fs::write(&path, serde_json::to_vec(&document).expect("Failed to encode glTF"))
            .expect("Failed to write glTF");
        path
    }
}

pub fn translated(mesh: usize, translation: [f64; 3]) -> Node {
    Node {
        mesh: Some(mesh),
        translation: Some(translation),
        ..Default::default()
    }
}

pub fn with_extras(mut node: Node, extras: Value) -> Node {
    node.extras = Some(extras);
    node
}

/// Fresh, empty directory under the system temp dir.
pub fn temp_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("gltf_tiler_{}_{}", name, std::process::id()));
    if dir.exists() {
        fs::remove_dir_all(&dir).expect("Failed to clean temp dir");
    }
    fs::create_dir_all(&dir).expect("Failed to create temp dir");
    dir
}

/// Raw bytes behind an accessor (tightly packed data only).
pub fn accessor_bytes(document: &Document, buffer: &[u8], accessor: usize, element_size: usize) -> Vec<u8> {
    let accessor = &document.accessors[accessor];
    let view = &document.buffer_views[accessor.buffer_view.expect("accessor has no view")];
    let start = view.byte_offset.unwrap_or(0) as usize + accessor.byte_offset.unwrap_or(0) as usize;
    buffer[start..start + accessor.count as usize * element_size].to_vec()
}
