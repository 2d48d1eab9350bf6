//! Reading glTF documents and their buffers from disk
//!
//! Accepts both `.gltf` (JSON with external or data-URI buffers) and `.glb`
//! input. Buffers are returned detached from the document, indexed like
//! `document.buffers`.

use base64::{engine::general_purpose, Engine as _};
use log::{debug, error};
use std::fs;
use std::path::Path;

use super::document::{Document, Image};
use super::glb::{Glb, GLB_MAGIC};
use crate::errors::{Result, TilerError};

/// Parse the document at `path` and resolve every declared buffer into bytes.
pub fn read<P: AsRef<Path>>(path: P) -> Result<(Document, Vec<Vec<u8>>)> {
    let path = path.as_ref();
    let data = fs::read(path)?;
    let parent = path.parent().unwrap_or(Path::new("."));

    let (mut document, mut embedded) = if data.starts_with(GLB_MAGIC) {
        let glb = Glb::parse(&data)?;
        (glb.document()?, glb.bin)
    } else {
        (serde_json::from_slice::<Document>(&data)?, None)
    };

    let mut buffers = Vec::with_capacity(document.buffers.len());
    for (index, buffer) in document.buffers.iter().enumerate() {
        let bytes = match buffer.uri.as_deref() {
            Some(uri) => read_buffer(uri, parent)?,
            // Only the first buffer of a GLB may omit its URI
            None if index == 0 => embedded.take().ok_or(TilerError::MissingBuffer { index })?,
            None => return Err(TilerError::MissingBuffer { index }),
        };
        debug!("buffer {}: {} bytes", index, bytes.len());
        buffers.push(bytes);
    }

    normalize_image_uris(&mut document.images);
    Ok((document, buffers))
}

/// Resolve a buffer URI relative to the document directory.
pub fn read_buffer(uri: &str, parent: &Path) -> Result<Vec<u8>> {
    if is_data_uri(uri) {
        return decode_data_uri(uri);
    }
    Ok(fs::read(parent.join(uri))?)
}

pub fn is_data_uri(uri: &str) -> bool {
    uri.starts_with("data:")
}

/// Decode `data:[<mediatype>];base64,<payload>`.
pub fn decode_data_uri(uri: &str) -> Result<Vec<u8>> {
    let rest = uri
        .strip_prefix("data:")
        .ok_or_else(|| TilerError::DataUri("missing data: prefix".into()))?;
    let (header, payload) = rest
        .split_once(',')
        .ok_or_else(|| TilerError::DataUri("missing ',' separator".into()))?;
    if !header.ends_with(";base64") {
        return Err(TilerError::DataUri(format!(
            "only base64 data URIs are supported, got '{}'",
            header
        )));
    }
    Ok(general_purpose::STANDARD.decode(payload)?)
}

fn normalize_image_uris(images: &mut [Image]) {
    for image in images {
        if let Some(uri) = image.uri.as_mut() {
            if !is_data_uri(uri) && uri.contains('\\') {
                *uri = uri.replace('\\', "/");
            }
        }
    }
}

/// Copy every file-backed image next to `output`, mirroring relative paths.
///
/// Best effort: a missing or unreadable texture is logged and skipped.
pub fn copy_textures(input: &Path, output: &Path, images: &[Image]) {
    let src_parent = input.parent().unwrap_or(Path::new("."));
    let dest_parent = output.parent().unwrap_or(Path::new("."));
    if src_parent == dest_parent {
        return;
    }

    for uri in images.iter().filter_map(Image::file_uri) {
        let dest = dest_parent.join(uri);
        let copied = dest
            .parent()
            .map_or(Ok(()), fs::create_dir_all)
            .and_then(|_| fs::copy(src_parent.join(uri), &dest));
        match copied {
            Ok(bytes) => debug!("copied texture {} ({} bytes)", uri, bytes),
            Err(e) => error!("failed to copy texture {}: {}", uri, e),
        }
    }
}
