//! Conversion pipelines
//!
//! - `gltf_to_tileset`: one payload per mesh plus `tileset.json`
//! - `gltf_to_glb`: whole document as a single GLB
//! - `gltf_to_b3dm`: whole document as a single b3dm

use anyhow::{Context, Result};
use log::{debug, info};
use rayon::prelude::*;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::gltf::document::Image;
use crate::gltf::{io, Glb, Slicer};
use crate::tileset::{build_tree, B3dm, Tile, TilingContext, Tileset};

/// Slice every mesh of `input` into its own tile and write the tileset.
///
/// `output` is the path of the `tileset.json` file; payloads and copied
/// textures land in the same directory.
pub fn gltf_to_tileset(input: &Path, output: &Path, ctx: &TilingContext) -> Result<Tileset> {
    let (document, buffers) =
        io::read(input).with_context(|| format!("Failed to read {}", input.display()))?;

    let out_dir = output_dir(output);
    fs::create_dir_all(&out_dir)
        .with_context(|| format!("Failed to create output directory {}", out_dir.display()))?;

    let slicer = Slicer::new(&document, &buffers).context("Failed to walk the scene graph")?;
    info!("meshes count: {}", slicer.meshes_count());

    let mut tiles = Vec::with_capacity(slicer.meshes_count());
    for mesh_id in 0..slicer.meshes_count() {
        let slice = slicer
            .slice_mesh(mesh_id)
            .with_context(|| format!("Failed to slice mesh {}", mesh_id))?;
        debug!(
            "mesh {}: {} instances, {} buffer bytes",
            mesh_id,
            slice.instances.len(),
            slice.buffer.len()
        );
        tiles.push(Tile::from_slice(slice)?);
    }

    let tileset = Tileset::new(build_tree(tiles));

    let file = File::create(output)
        .with_context(|| format!("Failed to create {}", output.display()))?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer(&mut writer, &tileset.to_json(ctx)).context("Failed to write tileset JSON")?;
    writer.flush().context("Failed to flush tileset JSON")?;
    info!("wrote {}", output.display());

    write_payloads(&tileset, &out_dir, ctx)?;
    io::copy_textures(input, output, &document.images);

    Ok(tileset)
}

/// Encode and write every content payload, in parallel.
fn write_payloads(tileset: &Tileset, out_dir: &Path, ctx: &TilingContext) -> Result<()> {
    let contents: Vec<_> = tileset
        .content_tiles()
        .into_iter()
        .filter_map(Tile::content)
        .collect();

    contents.par_iter().try_for_each(|content| -> Result<()> {
        let path = out_dir.join(content.uri());
        let bytes = content
            .encode(ctx.up_axis)
            .with_context(|| format!("Failed to encode {}", content.uri()))?;
        fs::write(&path, bytes).with_context(|| format!("Failed to write {}", path.display()))?;
        Ok(())
    })?;

    info!("wrote {} tile payloads to {}", contents.len(), out_dir.display());
    Ok(())
}

/// Pack the whole document, every buffer included, into one GLB.
pub fn gltf_to_glb(input: &Path, output: &Path) -> Result<()> {
    let (glb, images) = whole_document_glb(input)?;
    write_output(output, &glb)?;
    io::copy_textures(input, output, &images);
    Ok(())
}

/// Same as [`gltf_to_glb`], wrapped in a b3dm container.
pub fn gltf_to_b3dm(input: &Path, output: &Path) -> Result<()> {
    let (glb, images) = whole_document_glb(input)?;
    let bytes = B3dm::new(glb).to_bytes().context("Failed to encode b3dm")?;
    write_output(output, &bytes)?;
    io::copy_textures(input, output, &images);
    Ok(())
}

fn whole_document_glb(input: &Path) -> Result<(Vec<u8>, Vec<Image>)> {
    let (document, buffers) =
        io::read(input).with_context(|| format!("Failed to read {}", input.display()))?;
    let glb = Glb::from_document(&document, &buffers).context("Failed to pack buffers")?;
    Ok((glb.to_bytes(), document.images))
}

fn write_output(output: &Path, bytes: &[u8]) -> Result<()> {
    let dir = output_dir(output);
    fs::create_dir_all(&dir)
        .with_context(|| format!("Failed to create output directory {}", dir.display()))?;
    fs::write(output, bytes).with_context(|| format!("Failed to write {}", output.display()))?;
    info!("wrote {} ({} bytes)", output.display(), bytes.len());
    Ok(())
}

fn output_dir(output: &Path) -> PathBuf {
    match output.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}
