//! Tile tree nodes
//!
//! A tile is either a content tile (one sliced mesh, drawn once or per
//! instance) or a group tile whose box covers its children. Group boxes are
//! accumulated from the children's world boxes as they are attached, so a
//! finished tree always satisfies `parent.box_world ⊇ child.box_world`.

use glam::DVec3;
use serde::Serialize;
use serde_json::{json, Map, Value};

use super::b3dm::B3dm;
use super::config::{Measure, TilingContext, UpAxis};
use super::i3dm::I3dm;
use crate::errors::Result;
use crate::gltf::{Instance, Slice};
use crate::math::{Box3, Matrix4};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Refine {
    Add,
    Replace,
}

/// Payload container chosen for a content tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentKind {
    /// Single placement, transform folded into the tile (b3dm).
    Batched,
    /// Several placements carried by the payload itself (i3dm).
    Instanced,
}

impl ContentKind {
    pub fn extension(&self) -> &'static str {
        match self {
            ContentKind::Batched => "b3dm",
            ContentKind::Instanced => "i3dm",
        }
    }
}

/// The mesh behind a content tile.
#[derive(Debug, Clone)]
pub struct TileContent {
    pub id: usize,
    /// Mesh-local bounds of one instance.
    pub instance_box: Box3,
    pub instances: Vec<Instance>,
    pub glb: Vec<u8>,
}

impl TileContent {
    pub fn kind(&self) -> ContentKind {
        if self.instances.len() > 1 {
            ContentKind::Instanced
        } else {
            ContentKind::Batched
        }
    }

    pub fn uri(&self) -> String {
        format!("{}.{}", self.id, self.kind().extension())
    }

    /// Union of every placed copy of the mesh, in the frame `up_axis` emits.
    pub fn placements_box(&self, up_axis: UpAxis) -> Box3 {
        self.instances.iter().fold(Box3::Empty, |acc, instance| {
            acc.union(&self.instance_box.apply_matrix4(&up_axis.orient(&instance.matrix)))
        })
    }

    /// Encode the payload file for this content.
    pub fn encode(&self, up_axis: UpAxis) -> Result<Vec<u8>> {
        match self.kind() {
            ContentKind::Instanced => I3dm::new(self.glb.clone(), &self.instances, up_axis).to_bytes(),
            ContentKind::Batched => B3dm::new(self.glb.clone())
                .with_metadata(self.instances.first().and_then(|i| i.extras.clone()))
                .to_bytes(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Tile {
    bounds: Box3,
    matrix: Matrix4,
    children: Vec<Tile>,
    pub refine: Option<Refine>,
    content: Option<TileContent>,
    box_world: Box3,
}

impl Tile {
    /// Empty group tile; its box grows with every attached child.
    pub fn group() -> Tile {
        Tile {
            bounds: Box3::Empty,
            matrix: Matrix4::IDENTITY,
            children: Vec::new(),
            refine: None,
            content: None,
            box_world: Box3::Empty,
        }
    }

    /// Content tile for one sliced mesh.
    pub fn from_slice(slice: Slice) -> Result<Tile> {
        let glb = slice.to_glb()?;
        Ok(Tile::from_content(TileContent {
            id: slice.mesh_id,
            instance_box: slice.bounding_box,
            instances: slice.instances,
            glb,
        }))
    }

    pub fn from_content(content: TileContent) -> Tile {
        let mut tile = Tile {
            content: Some(content),
            ..Tile::group()
        };
        tile.refresh_box_world();
        tile
    }

    pub fn with_child(mut self, child: Tile) -> Tile {
        self.add_child(child);
        self
    }

    pub fn add_child(&mut self, child: Tile) -> &mut Self {
        self.bounds = self.bounds.union(&child.box_world);
        self.children.push(child);
        self.refresh_box_world();
        self
    }

    pub fn add_children<I: IntoIterator<Item = Tile>>(&mut self, children: I) -> &mut Self {
        for child in children {
            self.add_child(child);
        }
        self
    }

    /// Apply `matrix` after the tile's current transform.
    pub fn apply_matrix4(&mut self, matrix: &Matrix4) -> &mut Self {
        self.matrix = self.matrix.premultiply(matrix);
        self.refresh_box_world();
        self
    }

    pub fn children(&self) -> &[Tile] {
        &self.children
    }

    pub fn content(&self) -> Option<&TileContent> {
        self.content.as_ref()
    }

    pub fn is_content(&self) -> bool {
        self.content.is_some()
    }

    /// Transform emitted for the tile: own matrix, then the single instance's.
    pub fn matrix(&self) -> Matrix4 {
        self.matrix.multiply(&self.content_matrix())
    }

    fn content_matrix(&self) -> Matrix4 {
        match &self.content {
            Some(content) if content.instances.len() == 1 => content.instances[0].matrix,
            _ => Matrix4::IDENTITY,
        }
    }

    /// Bounds of the drawn content in tile space.
    ///
    /// Instanced content folds every placement into the box; single content
    /// keeps the mesh-local box because its placement is in [`Tile::matrix`].
    pub fn content_box(&self) -> Box3 {
        let Some(content) = &self.content else {
            return Box3::Empty;
        };
        if content.kind() == ContentKind::Instanced {
            content.placements_box(UpAxis::Y)
        } else {
            content.instance_box
        }
    }

    /// Tile-local bounding box, as written to `boundingVolume`.
    pub fn bounding_box(&self) -> Box3 {
        if self.content.is_some() {
            self.bounds.union(&self.content_box())
        } else {
            self.bounds
        }
    }

    pub fn box_world(&self) -> Box3 {
        self.box_world
    }

    pub fn centroid_world(&self) -> DVec3 {
        self.box_world.center()
    }

    fn refresh_box_world(&mut self) {
        self.box_world = self.bounding_box().apply_matrix4(&self.matrix());
    }

    /// Recompute every box bottom-up. Call once the tree is complete.
    pub fn finalize(&mut self) {
        if !self.children.is_empty() {
            let mut bounds = Box3::Empty;
            for child in &mut self.children {
                child.finalize();
                bounds = bounds.union(&child.box_world);
            }
            self.bounds = bounds;
        }
        self.refresh_box_world();
    }

    /// Content: instance diagonal in meters. Group: the largest child error.
    pub fn geometric_error(&self, measure: Measure) -> f64 {
        match &self.content {
            Some(content) => content.instance_box.diagonal() * measure.factor(),
            None => self
                .children
                .iter()
                .map(|child| child.geometric_error(measure))
                .fold(0.0, f64::max),
        }
    }

    /// Content tiles of the subtree, depth first.
    pub fn content_tiles(&self) -> Vec<&Tile> {
        let mut tiles = Vec::new();
        self.collect_content(&mut tiles);
        tiles
    }

    fn collect_content<'a>(&'a self, out: &mut Vec<&'a Tile>) {
        if self.content.is_some() {
            out.push(self);
        }
        for child in &self.children {
            child.collect_content(out);
        }
    }

    /// `boundingVolume.box` in the emitted frame.
    ///
    /// Instanced content has no tile transform and its payload carries
    /// oriented instance transforms, so its box is taken from those directly.
    fn bounding_volume(&self, up_axis: UpAxis) -> [f64; 12] {
        match (&self.content, up_axis) {
            (Some(content), UpAxis::Z) if content.kind() == ContentKind::Instanced => {
                content.placements_box(UpAxis::Z).to_box_array()
            }
            (_, UpAxis::Z) => {
                let mut bounding_box = self.bounding_box().to_box_array();
                permute_box_for_z_up(&mut bounding_box, self.is_content());
                bounding_box
            }
            (_, UpAxis::Y) => self.bounding_box().to_box_array(),
        }
    }

    /// `tileset.json` node for this subtree.
    pub fn to_json(&self, ctx: &TilingContext) -> Value {
        let mut node = Map::new();
        node.insert("geometricError".into(), json!(self.geometric_error(ctx.measure)));
        if let Some(refine) = self.refine {
            node.insert("refine".into(), json!(refine));
        }

        node.insert("boundingVolume".into(), json!({ "box": self.bounding_volume(ctx.up_axis) }));

        let matrix = self.matrix();
        if !matrix.is_identity() {
            node.insert("transform".into(), json!(ctx.up_axis.orient(&matrix).to_cols_array()));
        }

        if let Some(content) = &self.content {
            node.insert("content".into(), json!({ "uri": content.uri() }));
        }

        if !self.children.is_empty() {
            let children: Vec<Value> = self.children.iter().map(|c| c.to_json(ctx)).collect();
            node.insert("children".into(), Value::Array(children));
        }

        Value::Object(node)
    }
}

/// Rotate the centre `(c0,c1,c2) -> (c2,c0,c1)` and the half-extent slots.
///
/// Group and content tiles rotate the half extents in opposite directions:
/// groups `(h0,h1,h2) -> (h2,h0,h1)`, content `(h0,h1,h2) -> (h1,h2,h0)`.
fn permute_box_for_z_up(b: &mut [f64; 12], is_content: bool) {
    let [c0, c1, c2] = [b[0], b[1], b[2]];
    b[0] = c2;
    b[1] = c0;
    b[2] = c1;

    let [h0, h1, h2] = [b[3], b[7], b[11]];
    let (n0, n1, n2) = if is_content { (h1, h2, h0) } else { (h2, h0, h1) };
    b[3] = n0;
    b[7] = n1;
    b[11] = n2;
}
