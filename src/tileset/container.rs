//! Shared layout of the 3D Tiles binary containers (b3dm, i3dm)
//!
//! Format: [header][feature table JSON][feature table binary]
//!         [batch table JSON][batch table binary][body]
//! Header: magic(4) + version(u32 = 1) + byteLength(u32) + four section
//! lengths(u32), followed by any container specific u32 fields.
//! Every section ends on an 8-byte boundary measured from the start of the
//! file: JSON sections are padded with spaces, binary sections with zeros.

use byteorder::{ByteOrder, LittleEndian};
use serde_json::Value;

use crate::errors::{Result, TilerError};
use crate::gltf::glb::pad_to;

pub const CONTAINER_VERSION: u32 = 1;
pub const SECTION_ALIGNMENT: usize = 8;
/// magic + version + byteLength + 4 section lengths
pub const BASE_HEADER_LEN: usize = 28;

/// Sequential writer for one container. Sections must be written in file order.
pub struct ContainerWriter {
    buffer: Vec<u8>,
    next_section: usize,
}

impl ContainerWriter {
    /// Start a container whose header is `header_len` bytes long.
    pub fn new(magic: &[u8; 4], header_len: usize) -> Self {
        let mut buffer = Vec::with_capacity(header_len);
        buffer.extend_from_slice(magic);
        buffer.extend_from_slice(&CONTAINER_VERSION.to_le_bytes());
        buffer.resize(header_len, 0);
        ContainerWriter {
            buffer,
            next_section: 0,
        }
    }

    /// Append a JSON section. `None` leaves it empty (zero length).
    pub fn json_section(&mut self, value: Option<&Value>) -> Result<&mut Self> {
        let start = self.buffer.len();
        if let Some(value) = value {
            serde_json::to_writer(&mut self.buffer, value)?;
            pad_to(&mut self.buffer, SECTION_ALIGNMENT, b' ');
        }
        self.close_section(start)?;
        Ok(self)
    }

    /// Append a binary section padded with zeros.
    pub fn binary_section(&mut self, bytes: &[u8]) -> Result<&mut Self> {
        let start = self.buffer.len();
        if !bytes.is_empty() {
            self.buffer.extend_from_slice(bytes);
            pad_to(&mut self.buffer, SECTION_ALIGNMENT, 0);
        }
        self.close_section(start)?;
        Ok(self)
    }

    fn close_section(&mut self, start: usize) -> Result<()> {
        if self.next_section >= 4 {
            return Err(TilerError::InvalidContainer(
                "more than four table sections written".into(),
            ));
        }
        let len = (self.buffer.len() - start) as u32;
        self.set_header_u32(12 + 4 * self.next_section, len);
        self.next_section += 1;
        Ok(())
    }

    /// Overwrite a header field, e.g. the i3dm `gltfFormat`.
    pub fn set_header_u32(&mut self, offset: usize, value: u32) {
        LittleEndian::write_u32(&mut self.buffer[offset..offset + 4], value);
    }

    /// Append the payload, patch `byteLength` and return the finished bytes.
    pub fn finish(mut self, body: &[u8]) -> Result<Vec<u8>> {
        if self.next_section != 4 {
            return Err(TilerError::InvalidContainer(format!(
                "expected 4 table sections, got {}",
                self.next_section
            )));
        }
        self.buffer.extend_from_slice(body);
        pad_to(&mut self.buffer, SECTION_ALIGNMENT, 0);
        let total = self.buffer.len() as u32;
        self.set_header_u32(8, total);
        Ok(self.buffer)
    }
}

/// A container split back into its sections.
#[derive(Debug, Clone)]
pub struct DecodedContainer {
    pub version: u32,
    pub byte_length: u32,
    /// Header fields after the four section lengths.
    pub extra_header: Vec<u32>,
    pub feature_table: Option<Value>,
    pub feature_table_binary: Vec<u8>,
    pub batch_table: Option<Value>,
    pub batch_table_binary: Vec<u8>,
    pub body: Vec<u8>,
}

/// Split `data` into its sections after checking magic and lengths.
pub fn decode_container(data: &[u8], magic: &[u8; 4], header_len: usize) -> Result<DecodedContainer> {
    if data.len() < header_len {
        return Err(TilerError::InvalidContainer("file too small for header".into()));
    }
    if &data[0..4] != magic {
        return Err(TilerError::InvalidContainer(format!(
            "invalid magic: {:?}",
            &data[0..4]
        )));
    }
    let version = LittleEndian::read_u32(&data[4..8]);
    let byte_length = LittleEndian::read_u32(&data[8..12]);
    if byte_length as usize != data.len() {
        return Err(TilerError::InvalidContainer(format!(
            "byteLength {} does not match data length {}",
            byte_length,
            data.len()
        )));
    }

    let mut lengths = [0usize; 4];
    for (i, len) in lengths.iter_mut().enumerate() {
        *len = LittleEndian::read_u32(&data[12 + 4 * i..16 + 4 * i]) as usize;
    }
    let extra_header = data[BASE_HEADER_LEN..header_len]
        .chunks_exact(4)
        .map(LittleEndian::read_u32)
        .collect();

    let mut offset = header_len;
    let mut sections: Vec<&[u8]> = Vec::with_capacity(4);
    for len in lengths {
        let section = data.get(offset..offset + len).ok_or_else(|| {
            TilerError::InvalidContainer(format!("section at {} overruns the file", offset))
        })?;
        sections.push(section);
        offset += len;
    }

    Ok(DecodedContainer {
        version,
        byte_length,
        extra_header,
        feature_table: parse_json_section(sections[0])?,
        feature_table_binary: sections[1].to_vec(),
        batch_table: parse_json_section(sections[2])?,
        batch_table_binary: sections[3].to_vec(),
        body: data[offset..].to_vec(),
    })
}

fn parse_json_section(bytes: &[u8]) -> Result<Option<Value>> {
    if bytes.is_empty() {
        return Ok(None);
    }
    Ok(Some(serde_json::from_slice(bytes)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_sections_end_on_8_byte_boundaries() {
        let mut writer = ContainerWriter::new(b"test", BASE_HEADER_LEN);
        writer
            .json_section(Some(&json!({"A": 1})))
            .unwrap()
            .binary_section(&[1, 2, 3])
            .unwrap()
            .json_section(None)
            .unwrap()
            .binary_section(&[])
            .unwrap();
        let bytes = writer.finish(&[7; 5]).unwrap();

        assert_eq!(bytes.len() % 8, 0);
        let decoded = decode_container(&bytes, b"test", BASE_HEADER_LEN).unwrap();
        assert_eq!(decoded.version, 1);
        assert_eq!(decoded.feature_table, Some(json!({"A": 1})));
        assert_eq!((BASE_HEADER_LEN + LittleEndian::read_u32(&bytes[12..16]) as usize) % 8, 0);
        assert_eq!(decoded.feature_table_binary, vec![1, 2, 3, 0, 0, 0, 0, 0]);
        assert!(decoded.batch_table.is_none());
        assert!(decoded.batch_table_binary.is_empty());
        assert_eq!(&decoded.body[..5], &[7; 5]);
    }

    #[test]
    fn test_json_padding_uses_spaces() {
        let mut writer = ContainerWriter::new(b"test", BASE_HEADER_LEN);
        writer.json_section(Some(&json!({}))).unwrap();
        writer.binary_section(&[]).unwrap();
        writer.json_section(None).unwrap();
        writer.binary_section(&[]).unwrap();
        let bytes = writer.finish(&[]).unwrap();
        // 28 + "{}" = 30, padded to 32
        assert_eq!(&bytes[28..32], b"{}  ");
    }

    #[test]
    fn test_finish_requires_all_sections() {
        let mut writer = ContainerWriter::new(b"test", BASE_HEADER_LEN);
        writer.json_section(None).unwrap();
        assert!(matches!(writer.finish(&[]), Err(TilerError::InvalidContainer(_))));
    }

    #[test]
    fn test_decode_rejects_wrong_magic() {
        let mut writer = ContainerWriter::new(b"b3dm", BASE_HEADER_LEN);
        for _ in 0..2 {
            writer.json_section(None).unwrap();
            writer.binary_section(&[]).unwrap();
        }
        let bytes = writer.finish(&[]).unwrap();
        assert!(decode_container(&bytes, b"i3dm", BASE_HEADER_LEN).is_err());
    }
}
