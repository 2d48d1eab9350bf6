//! Batched 3D Model (b3dm) container
//!
//! Header (28 bytes): "b3dm" + version + byteLength + ftJSON + ftBin +
//! btJSON + btBin, then the tables, then the embedded GLB.

use serde_json::{json, Value};

use super::container::{decode_container, ContainerWriter, DecodedContainer, BASE_HEADER_LEN};
use crate::errors::Result;

pub const B3DM_MAGIC: &[u8; 4] = b"b3dm";
pub const B3DM_HEADER_LEN: usize = BASE_HEADER_LEN;

/// One GLB wrapped as a single-feature tile payload.
#[derive(Debug, Clone)]
pub struct B3dm {
    glb: Vec<u8>,
    metadata: Option<Value>,
}

impl B3dm {
    pub fn new(glb: Vec<u8>) -> Self {
        B3dm { glb, metadata: None }
    }

    /// Attach per-tile metadata, stored as `{"extras": metadata}` in the batch table.
    pub fn with_metadata(mut self, metadata: Option<Value>) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let feature_table = json!({ "BATCH_LENGTH": 0 });
        let batch_table = self.metadata.as_ref().map(|extras| json!({ "extras": extras }));

        let mut writer = ContainerWriter::new(B3DM_MAGIC, B3DM_HEADER_LEN);
        writer
            .json_section(Some(&feature_table))?
            .binary_section(&[])?
            .json_section(batch_table.as_ref())?
            .binary_section(&[])?;
        writer.finish(&self.glb)
    }
}

/// Split a b3dm payload into its sections; `body` is the GLB.
pub fn decode_b3dm(data: &[u8]) -> Result<DecodedContainer> {
    decode_container(data, B3DM_MAGIC, B3DM_HEADER_LEN)
}
