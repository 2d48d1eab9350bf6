//! Binary glTF (GLB) container
//!
//! Format: [header][JSON chunk][BIN chunk]
//! Header: "glTF" magic + version(u32 = 2) + total length(u32)
//! Chunk: length(u32) + type(u32) + payload padded to 4 bytes
//! The JSON chunk is padded with spaces, the BIN chunk with zeros.

use byteorder::{ByteOrder, LittleEndian};

use super::document::{Buffer, Document};
use crate::errors::{Result, TilerError};

pub const GLB_MAGIC: &[u8; 4] = b"glTF";
pub const GLB_VERSION: u32 = 2;
pub const CHUNK_JSON: u32 = 0x4E4F_534A;
pub const CHUNK_BIN: u32 = 0x004E_4942;
const HEADER_LEN: usize = 12;
const CHUNK_HEADER_LEN: usize = 8;

/// Round `len` up to the next multiple of `alignment`.
pub fn padded_len(len: usize, alignment: usize) -> usize {
    len.div_ceil(alignment) * alignment
}

/// Append `fill` bytes until `bytes.len()` is a multiple of `alignment`.
pub fn pad_to(bytes: &mut Vec<u8>, alignment: usize, fill: u8) {
    let target = padded_len(bytes.len(), alignment);
    bytes.resize(target, fill);
}

/// A GLB split into its JSON and BIN chunk payloads.
#[derive(Debug, Clone)]
pub struct Glb {
    pub json: Vec<u8>,
    pub bin: Option<Vec<u8>>,
}

impl Glb {
    /// Wrap a document whose single buffer (index 0, no URI) is `buffer`.
    pub fn new(document: &Document, buffer: Vec<u8>) -> Result<Self> {
        let json = serde_json::to_vec(document)?;
        let bin = if buffer.is_empty() { None } else { Some(buffer) };
        Ok(Glb { json, bin })
    }

    /// Pack every buffer of a whole document into one BIN chunk.
    ///
    /// Buffers are concatenated in order, each padded to 4 bytes, and every
    /// buffer view is rebased onto buffer 0.
    pub fn from_document(document: &Document, buffers: &[Vec<u8>]) -> Result<Self> {
        let mut packed = document.clone();
        let mut bin = Vec::new();
        let mut bases = Vec::with_capacity(buffers.len());

        for index in 0..document.buffers.len() {
            let data = buffers
                .get(index)
                .ok_or(TilerError::MissingBuffer { index })?;
            bases.push(bin.len() as u64);
            bin.extend_from_slice(data);
            pad_to(&mut bin, 4, 0);
        }

        for (view_index, view) in packed.buffer_views.iter_mut().enumerate() {
            let base = bases.get(view.buffer).copied().ok_or_else(|| {
                TilerError::dangling("buffer", view.buffer, format!("bufferView {}", view_index))
            })?;
            let offset = base.checked_add(view.byte_offset.unwrap_or(0)).ok_or_else(|| {
                TilerError::dangling("buffer byte", usize::MAX, format!("bufferView {}", view_index))
            })?;
            view.byte_offset = Some(offset);
            view.buffer = 0;
        }

        packed.buffers = if bin.is_empty() {
            Vec::new()
        } else {
            vec![Buffer {
                byte_length: bin.len() as u64,
                ..Default::default()
            }]
        };

        Glb::new(&packed, bin)
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let json_len = padded_len(self.json.len(), 4);
        let bin_len = self.bin.as_ref().map(|b| padded_len(b.len(), 4));
        let total = HEADER_LEN
            + CHUNK_HEADER_LEN
            + json_len
            + bin_len.map(|len| CHUNK_HEADER_LEN + len).unwrap_or(0);

        let mut buffer = Vec::with_capacity(total);
        buffer.extend_from_slice(GLB_MAGIC);
        buffer.extend_from_slice(&GLB_VERSION.to_le_bytes());
        buffer.extend_from_slice(&(total as u32).to_le_bytes());

        buffer.extend_from_slice(&(json_len as u32).to_le_bytes());
        buffer.extend_from_slice(&CHUNK_JSON.to_le_bytes());
        buffer.extend_from_slice(&self.json);
        pad_to(&mut buffer, 4, b' ');

        if let (Some(bin), Some(len)) = (&self.bin, bin_len) {
            buffer.extend_from_slice(&(len as u32).to_le_bytes());
            buffer.extend_from_slice(&CHUNK_BIN.to_le_bytes());
            buffer.extend_from_slice(bin);
            pad_to(&mut buffer, 4, 0);
        }

        buffer
    }

    /// Split a GLB into its chunks. Unknown chunk types are skipped.
    pub fn parse(data: &[u8]) -> Result<Glb> {
        if data.len() < HEADER_LEN {
            return Err(TilerError::InvalidGlb("file too small for header".into()));
        }
        if &data[0..4] != GLB_MAGIC {
            return Err(TilerError::InvalidGlb(format!("invalid magic: {:?}", &data[0..4])));
        }
        let version = LittleEndian::read_u32(&data[4..8]);
        if version != GLB_VERSION {
            return Err(TilerError::InvalidGlb(format!("unsupported version: {}", version)));
        }
        let length = LittleEndian::read_u32(&data[8..12]) as usize;
        if length > data.len() {
            return Err(TilerError::InvalidGlb(format!(
                "declared length {} exceeds data length {}",
                length,
                data.len()
            )));
        }

        let mut offset = HEADER_LEN;
        let mut json = None;
        let mut bin = None;
        while offset + CHUNK_HEADER_LEN <= length {
            let chunk_len = LittleEndian::read_u32(&data[offset..offset + 4]) as usize;
            let chunk_type = LittleEndian::read_u32(&data[offset + 4..offset + 8]);
            let start = offset + CHUNK_HEADER_LEN;
            let end = start + chunk_len;
            if end > length {
                return Err(TilerError::InvalidGlb(format!(
                    "chunk at {} overruns the file",
                    offset
                )));
            }
            match chunk_type {
                CHUNK_JSON if json.is_none() => json = Some(data[start..end].to_vec()),
                CHUNK_BIN if bin.is_none() => bin = Some(data[start..end].to_vec()),
                _ => {}
            }
            offset = end;
        }

        let json = json.ok_or_else(|| TilerError::InvalidGlb("missing JSON chunk".into()))?;
        Ok(Glb { json, bin })
    }

    pub fn document(&self) -> Result<Document> {
        Ok(serde_json::from_slice(&self.json)?)
    }
}
