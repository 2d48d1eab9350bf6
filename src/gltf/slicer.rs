//! Mesh slicing
//!
//! Extracts one mesh together with its full dependency closure (accessors,
//! materials, textures, samplers, images, buffer views and the bytes behind
//! them) into a standalone document whose indices all start at zero and
//! whose single buffer holds only the referenced ranges.
//!
//! Every referenced index must exist. A dangling one aborts the slice with
//! [`TilerError::StructuralIntegrity`]: skipping it would shift every index
//! compacted after it.

use indexmap::IndexSet;
use std::collections::BTreeMap;
use log::warn;
use serde_json::{Map, Value};

use super::document::{
    Accessor, Asset, Buffer, BufferView, Document, Image, Material, Mesh, Node, Primitive, Sampler,
    Scene, Texture,
};
use super::glb::{padded_len, Glb};
use super::visitor::{
    material_texture_indices, texture_source_indices, visit_material_textures,
    visit_texture_sources,
};
use crate::errors::{Result, TilerError};
use crate::math::{Box3, Matrix4};

pub const GENERATOR: &str = concat!("gltf_tiler ", env!("CARGO_PKG_VERSION"));

/// How the scene graph expressed an instance's transform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransformSource {
    /// Every node on the path used scale/rotation/translation fields.
    Components,
    /// At least one node on the path supplied a raw 16-value matrix.
    Matrix,
}

/// One placement of a mesh in the scene.
#[derive(Debug, Clone)]
pub struct Instance {
    /// Accumulated world transform of the referencing node.
    pub matrix: Matrix4,
    pub source: TransformSource,
    /// Nearest `extras` on the path from the scene root.
    pub extras: Option<Value>,
}

/// One mesh extracted into a standalone, locally indexed asset.
#[derive(Debug, Clone)]
pub struct Slice {
    pub mesh_id: usize,
    pub document: Document,
    pub buffer: Vec<u8>,
    /// Union of the POSITION accessor extents, in mesh-local space.
    pub bounding_box: Box3,
    pub instances: Vec<Instance>,
}

impl Slice {
    pub fn to_glb(&self) -> Result<Vec<u8>> {
        Ok(Glb::new(&self.document, self.buffer.clone())?.to_bytes())
    }
}

/// Slices meshes out of a parsed document.
pub struct Slicer<'a> {
    document: &'a Document,
    buffers: &'a [Vec<u8>],
    instances: Vec<Vec<Instance>>,
}

impl<'a> Slicer<'a> {
    /// Walk the default scene and record every mesh instance.
    pub fn new(document: &'a Document, buffers: &'a [Vec<u8>]) -> Result<Self> {
        let mut slicer = Slicer {
            document,
            buffers,
            instances: vec![Vec::new(); document.meshes.len()],
        };

        let mut on_path = vec![false; document.nodes.len()];
        for root in document.root_nodes()? {
            slicer.parse_node(root, &Matrix4::IDENTITY, TransformSource::Components, None, &mut on_path)?;
        }
        Ok(slicer)
    }

    fn parse_node(
        &mut self,
        index: usize,
        parent: &Matrix4,
        parent_source: TransformSource,
        parent_extras: Option<&Value>,
        on_path: &mut [bool],
    ) -> Result<()> {
        let document = self.document;
        let node = document.node(index, "scene graph")?;
        if on_path[index] {
            return Err(TilerError::dangling("node", index, "a cycle in the scene graph"));
        }
        on_path[index] = true;

        let (local, local_source) = local_transform(node, index);
        let matrix = parent.multiply(&local);
        let source = match (parent_source, local_source) {
            (TransformSource::Components, TransformSource::Components) => TransformSource::Components,
            _ => TransformSource::Matrix,
        };
        let extras = node.extras.as_ref().or(parent_extras);

        if let Some(mesh) = node.mesh {
            let slot = self
                .instances
                .get_mut(mesh)
                .ok_or_else(|| TilerError::dangling("mesh", mesh, format!("node {}", index)))?;
            slot.push(Instance {
                matrix,
                source,
                extras: extras.cloned(),
            });
        }

        for &child in &node.children {
            self.parse_node(child, &matrix, source, extras, on_path)?;
        }

        on_path[index] = false;
        Ok(())
    }

    pub fn meshes_count(&self) -> usize {
        self.document.meshes.len()
    }

    pub fn instances(&self, mesh_id: usize) -> &[Instance] {
        self.instances.get(mesh_id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Union of the declared POSITION min/max of every primitive.
    ///
    /// Accessor bounds are trusted, not recomputed from vertex data.
    pub fn bounding_box(&self, mesh_id: usize) -> Result<Box3> {
        let mesh = self.document.mesh(mesh_id, "bounding box")?;
        let mut bounds = Box3::Empty;
        for primitive in &mesh.primitives {
            let Some(&position) = primitive.attributes.get("POSITION") else {
                continue;
            };
            let accessor = self
                .document
                .accessor(position, &format!("POSITION of mesh {}", mesh_id))?;
            match (as_vec3(&accessor.min), as_vec3(&accessor.max)) {
                (Some(min), Some(max)) => bounds = bounds.union(&Box3::from_min_max(min, max)),
                _ => warn!(
                    "mesh {}: POSITION accessor {} has no min/max, ignored in bounds",
                    mesh_id, position
                ),
            }
        }
        Ok(bounds)
    }

    /// Extract mesh `mesh_id` into a standalone slice.
    pub fn slice_mesh(&self, mesh_id: usize) -> Result<Slice> {
        let mesh = self.document.mesh(mesh_id, "slice")?;
        let context = format!("mesh {}", mesh_id);

        let accessor_indices = self.accessor_indices(mesh, &context)?;
        let material_indices = self.material_indices(mesh, &context)?;
        let texture_indices = self.texture_indices(&material_indices)?;
        let sampler_indices = self.sampler_indices(&texture_indices)?;
        let image_indices = self.image_indices(&texture_indices)?;
        let buffer_view_indices = self.buffer_view_indices(&accessor_indices, &image_indices)?;

        let (buffer, buffer_views) = self.pack_buffer_views(&buffer_view_indices)?;
        let accessors = self.accessors(&accessor_indices, &buffer_view_indices)?;
        let materials = self.materials(&material_indices, &texture_indices)?;
        let textures = self.textures(&texture_indices, &sampler_indices, &image_indices)?;
        let samplers = self.samplers(&sampler_indices)?;
        let images = self.images(&image_indices, &buffer_view_indices)?;
        let sliced_mesh = Mesh {
            primitives: self.primitives(mesh, &accessor_indices, &material_indices)?,
            extra: mesh.extra.clone(),
        };

        let document = Document {
            asset: Asset {
                generator: Some(GENERATOR.to_string()),
                ..self.document.asset.clone()
            },
            scene: Some(0),
            scenes: vec![Scene {
                nodes: vec![0],
                ..Default::default()
            }],
            nodes: vec![Node {
                mesh: Some(0),
                ..Default::default()
            }],
            meshes: vec![sliced_mesh],
            accessors,
            buffer_views,
            buffers: if buffer.is_empty() {
                Vec::new()
            } else {
                vec![Buffer {
                    byte_length: buffer.len() as u64,
                    ..Default::default()
                }]
            },
            materials,
            textures,
            samplers,
            images,
            extensions_used: self.document.extensions_used.clone(),
            extensions_required: self.document.extensions_required.clone(),
            extra: Map::new(),
        };

        Ok(Slice {
            mesh_id,
            document,
            buffer,
            bounding_box: self.bounding_box(mesh_id)?,
            instances: self.instances(mesh_id).to_vec(),
        })
    }

    /// Sorted unique accessors of all primitives (attributes, indices, morph targets).
    fn accessor_indices(&self, mesh: &Mesh, context: &str) -> Result<IndexSet<usize>> {
        let mut indices: IndexSet<usize> = IndexSet::new();
        for primitive in &mesh.primitives {
            for index in primitive.accessor_indices() {
                self.document.accessor(index, context)?;
                indices.insert(index);
            }
        }
        indices.sort_unstable();
        Ok(indices)
    }

    fn material_indices(&self, mesh: &Mesh, context: &str) -> Result<IndexSet<usize>> {
        let mut indices = IndexSet::new();
        for index in mesh.primitives.iter().filter_map(|p| p.material) {
            self.document.material(index, context)?;
            indices.insert(index);
        }
        Ok(indices)
    }

    fn texture_indices(&self, material_indices: &IndexSet<usize>) -> Result<IndexSet<usize>> {
        let mut indices = IndexSet::new();
        for &material_index in material_indices {
            let material = self.document.material(material_index, "slice")?;
            for index in material_texture_indices(material)? {
                self.document.texture(index, &format!("material {}", material_index))?;
                indices.insert(index);
            }
        }
        Ok(indices)
    }

    fn sampler_indices(&self, texture_indices: &IndexSet<usize>) -> Result<IndexSet<usize>> {
        let mut indices = IndexSet::new();
        for &texture_index in texture_indices {
            if let Some(index) = self.document.texture(texture_index, "slice")?.sampler {
                self.document.sampler(index, &format!("texture {}", texture_index))?;
                indices.insert(index);
            }
        }
        Ok(indices)
    }

    fn image_indices(&self, texture_indices: &IndexSet<usize>) -> Result<IndexSet<usize>> {
        let mut indices = IndexSet::new();
        for &texture_index in texture_indices {
            let texture = self.document.texture(texture_index, "slice")?;
            for index in texture_source_indices(texture)? {
                self.document.image(index, &format!("texture {}", texture_index))?;
                indices.insert(index);
            }
        }
        Ok(indices)
    }

    /// Sorted unique buffer views behind the selected accessors (sparse
    /// storage included) and buffer-view-embedded images.
    fn buffer_view_indices(
        &self,
        accessor_indices: &IndexSet<usize>,
        image_indices: &IndexSet<usize>,
    ) -> Result<IndexSet<usize>> {
        let mut indices = IndexSet::new();
        for &accessor_index in accessor_indices {
            let accessor = self.document.accessor(accessor_index, "slice")?;
            let context = format!("accessor {}", accessor_index);
            let sparse_views = accessor
                .sparse
                .iter()
                .flat_map(|s| [s.indices.buffer_view, s.values.buffer_view]);
            for index in accessor.buffer_view.into_iter().chain(sparse_views) {
                self.document.buffer_view(index, &context)?;
                indices.insert(index);
            }
        }
        for &image_index in image_indices {
            if let Some(index) = self.document.image(image_index, "slice")?.buffer_view {
                self.document.buffer_view(index, &format!("image {}", image_index))?;
                indices.insert(index);
            }
        }
        indices.sort_unstable();
        Ok(indices)
    }

    /// Concatenate the selected views into one buffer, each range padded to 4 bytes.
    fn pack_buffer_views(&self, view_indices: &IndexSet<usize>) -> Result<(Vec<u8>, Vec<BufferView>)> {
        let mut buffer = Vec::new();
        let mut views = Vec::with_capacity(view_indices.len());

        for &view_index in view_indices {
            let view = self.document.buffer_view(view_index, "slice")?;
            let source = self
                .buffers
                .get(view.buffer)
                .ok_or(TilerError::MissingBuffer { index: view.buffer })?;
            let start = view.byte_offset.unwrap_or(0) as usize;
            let end = start.checked_add(view.byte_length as usize);
            let bytes = end.and_then(|end| source.get(start..end)).ok_or_else(|| {
                TilerError::dangling(
                    "buffer byte",
                    end.unwrap_or(usize::MAX),
                    format!("bufferView {} (buffer {} has {} bytes)", view_index, view.buffer, source.len()),
                )
            })?;

            let offset = buffer.len();
            buffer.extend_from_slice(bytes);
            buffer.resize(offset + padded_len(bytes.len(), 4), 0);

            views.push(BufferView {
                buffer: 0,
                byte_offset: Some(offset as u64),
                ..view.clone()
            });
        }

        Ok((buffer, views))
    }

    fn accessors(
        &self,
        accessor_indices: &IndexSet<usize>,
        view_indices: &IndexSet<usize>,
    ) -> Result<Vec<Accessor>> {
        accessor_indices
            .iter()
            .map(|&index| {
                let mut accessor = self.document.accessor(index, "slice")?.clone();
                if let Some(view) = accessor.buffer_view.as_mut() {
                    *view = local_index(view_indices, *view, "bufferView")?;
                }
                if let Some(sparse) = accessor.sparse.as_mut() {
                    sparse.indices.buffer_view =
                        local_index(view_indices, sparse.indices.buffer_view, "bufferView")?;
                    sparse.values.buffer_view =
                        local_index(view_indices, sparse.values.buffer_view, "bufferView")?;
                }
                Ok(accessor)
            })
            .collect()
    }

    fn materials(
        &self,
        material_indices: &IndexSet<usize>,
        texture_indices: &IndexSet<usize>,
    ) -> Result<Vec<Material>> {
        material_indices
            .iter()
            .map(|&index| {
                let mut material = self.document.material(index, "slice")?.clone();
                visit_material_textures(&mut material, |texture| {
                    *texture = local_index(texture_indices, *texture, "texture")?;
                    Ok(())
                })?;
                Ok(material)
            })
            .collect()
    }

    fn textures(
        &self,
        texture_indices: &IndexSet<usize>,
        sampler_indices: &IndexSet<usize>,
        image_indices: &IndexSet<usize>,
    ) -> Result<Vec<Texture>> {
        texture_indices
            .iter()
            .map(|&index| {
                let mut texture = self.document.texture(index, "slice")?.clone();
                if let Some(sampler) = texture.sampler.as_mut() {
                    *sampler = local_index(sampler_indices, *sampler, "sampler")?;
                }
                visit_texture_sources(&mut texture, |image| {
                    *image = local_index(image_indices, *image, "image")?;
                    Ok(())
                })?;
                Ok(texture)
            })
            .collect()
    }

    fn samplers(&self, sampler_indices: &IndexSet<usize>) -> Result<Vec<Sampler>> {
        sampler_indices
            .iter()
            .map(|&index| self.document.sampler(index, "slice").cloned())
            .collect()
    }

    fn images(
        &self,
        image_indices: &IndexSet<usize>,
        view_indices: &IndexSet<usize>,
    ) -> Result<Vec<Image>> {
        image_indices
            .iter()
            .map(|&index| {
                let mut image = self.document.image(index, "slice")?.clone();
                if let Some(view) = image.buffer_view.as_mut() {
                    *view = local_index(view_indices, *view, "bufferView")?;
                }
                Ok(image)
            })
            .collect()
    }

    fn primitives(
        &self,
        mesh: &Mesh,
        accessor_indices: &IndexSet<usize>,
        material_indices: &IndexSet<usize>,
    ) -> Result<Vec<Primitive>> {
        let remap = |index: usize| local_index(accessor_indices, index, "accessor");
        let remap_map = |map: &BTreeMap<String, usize>| -> Result<BTreeMap<String, usize>> {
            map.iter()
                .map(|(name, &index)| remap(index).map(|local| (name.clone(), local)))
                .collect()
        };

        mesh.primitives
            .iter()
            .map(|primitive| {
                let targets = primitive
                    .targets
                    .iter()
                    .map(remap_map)
                    .collect::<Result<Vec<_>>>()?;
                Ok(Primitive {
                    attributes: remap_map(&primitive.attributes)?,
                    indices: primitive.indices.map(remap).transpose()?,
                    material: primitive
                        .material
                        .map(|m| local_index(material_indices, m, "material"))
                        .transpose()?,
                    targets,
                    extra: primitive.extra.clone(),
                })
            })
            .collect()
    }
}

/// Node-local transform. A raw matrix wins over TRS fields.
fn local_transform(node: &Node, index: usize) -> (Matrix4, TransformSource) {
    match node.matrix {
        Some(values) => {
            if node.has_trs() {
                warn!(
                    "node {} has both matrix and scale/rotation/translation; using the matrix",
                    index
                );
            }
            (Matrix4::from_cols_array(&values), TransformSource::Matrix)
        }
        None => (
            Matrix4::from_trs(node.scale, node.rotation, node.translation),
            TransformSource::Components,
        ),
    }
}

/// Position of `index` in the compacted selection.
fn local_index(selected: &IndexSet<usize>, index: usize, kind: &'static str) -> Result<usize> {
    selected
        .get_index_of(&index)
        .ok_or_else(|| TilerError::dangling(kind, index, "compacted selection"))
}

fn as_vec3(values: &Option<Vec<f64>>) -> Option<[f64; 3]> {
    match values.as_deref() {
        Some([x, y, z, ..]) => Some([*x, *y, *z]),
        _ => None,
    }
}
