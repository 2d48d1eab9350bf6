//! `tileset.json` descriptor

use serde_json::{json, Value};

use super::config::TilingContext;
use super::tile::Tile;

pub const TILESET_VERSION: &str = "1.0";

pub struct Tileset {
    pub root: Tile,
}

impl Tileset {
    pub fn new(root: Tile) -> Self {
        Tileset { root }
    }

    /// `{asset: {version}, geometricError, root}`; the top-level error is the root's.
    pub fn to_json(&self, ctx: &TilingContext) -> Value {
        json!({
            "asset": { "version": TILESET_VERSION },
            "geometricError": self.root.geometric_error(ctx.measure),
            "root": self.root.to_json(ctx),
        })
    }

    pub fn content_tiles(&self) -> Vec<&Tile> {
        self.root.content_tiles()
    }
}
