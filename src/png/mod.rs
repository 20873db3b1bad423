//! PNG chunk container.
//!
//! # Wire layout
//! ```text
//! 89 50 4E 47 0D 0A 1A 0A                      signature
//! { u32be length | type[4] | data[length] | u32be crc } ...
//! ```
//! `crc = CRC32(type ++ data)`.  The stream logically ends at `IEND`; any
//! trailing bytes after it are ignored.
//!
//! Pixel data is never decoded; chunks are carried through opaquely.

pub mod text;

use byteorder::{BigEndian, ByteOrder};
use log::debug;

use crate::crc::crc32_parts;
use crate::error::ParseError;

pub const PNG_SIGNATURE: [u8; 8] = [0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];

/// Upper bound on a single chunk's declared length (100 MiB).
pub const MAX_CHUNK_SIZE: u32 = 100 * 1024 * 1024;

pub const CHUNK_TEXT: [u8; 4] = *b"tEXt";
pub const CHUNK_IEND: [u8; 4] = *b"IEND";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PngChunk {
    pub length:     u32,
    pub chunk_type: [u8; 4],
    pub data:       Vec<u8>,
    /// CRC as stored on disk.  Never trusted when writing.
    pub crc:        u32,
}

impl PngChunk {
    /// Build a chunk with a freshly computed CRC.
    pub fn new(chunk_type: [u8; 4], data: Vec<u8>) -> Self {
        let crc = crc32_parts(&[&chunk_type, &data]);
        Self { length: data.len() as u32, chunk_type, data, crc }
    }

    pub fn type_str(&self) -> String {
        String::from_utf8_lossy(&self.chunk_type).into_owned()
    }

    pub fn is_type(&self, chunk_type: &[u8; 4]) -> bool {
        &self.chunk_type == chunk_type
    }

    pub fn computed_crc(&self) -> u32 {
        crc32_parts(&[&self.chunk_type, &self.data])
    }

    pub fn crc_valid(&self) -> bool {
        self.computed_crc() == self.crc
    }
}

pub fn is_png(bytes: &[u8]) -> bool {
    bytes.len() >= PNG_SIGNATURE.len() && bytes[..8] == PNG_SIGNATURE
}

/// Parse every chunk up to and including `IEND` (or the end of the buffer).
///
/// CRCs are recorded but not checked here; callers decide whether a
/// mismatch matters.
pub fn read_chunks(bytes: &[u8]) -> Result<Vec<PngChunk>, ParseError> {
    if !is_png(bytes) {
        return Err(ParseError::InvalidSignature);
    }

    let mut chunks = Vec::new();
    let mut offset = PNG_SIGNATURE.len();

    while offset < bytes.len() {
        if offset + 8 > bytes.len() {
            return Err(ParseError::TruncatedChunkHeader { offset });
        }

        let length = BigEndian::read_u32(&bytes[offset..offset + 4]);
        if length > MAX_CHUNK_SIZE {
            return Err(ParseError::ChunkTooLarge { length });
        }

        let mut chunk_type = [0u8; 4];
        chunk_type.copy_from_slice(&bytes[offset + 4..offset + 8]);

        let data_start = offset + 8;
        let data_end = data_start + length as usize;
        if data_end + 4 > bytes.len() {
            return Err(ParseError::ChunkOutOfBounds { offset });
        }

        let data = bytes[data_start..data_end].to_vec();
        let crc = BigEndian::read_u32(&bytes[data_end..data_end + 4]);
        offset = data_end + 4;

        debug!("png chunk {} len={} crc={:#010x}", String::from_utf8_lossy(&chunk_type), length, crc);
        let is_end = chunk_type == CHUNK_IEND;
        chunks.push(PngChunk { length, chunk_type, data, crc });

        if is_end {
            break;
        }
    }

    Ok(chunks)
}

/// Serialize chunks behind a fresh signature.  Lengths and CRCs are
/// recomputed from `chunk_type` and `data`.
pub fn write_chunks(chunks: &[PngChunk]) -> Vec<u8> {
    let total = PNG_SIGNATURE.len() + chunks.iter().map(|c| 12 + c.data.len()).sum::<usize>();
    let mut out = Vec::with_capacity(total);
    out.extend_from_slice(&PNG_SIGNATURE);

    let mut word = [0u8; 4];
    for chunk in chunks {
        BigEndian::write_u32(&mut word, chunk.data.len() as u32);
        out.extend_from_slice(&word);
        out.extend_from_slice(&chunk.chunk_type);
        out.extend_from_slice(&chunk.data);
        BigEndian::write_u32(&mut word, chunk.computed_crc());
        out.extend_from_slice(&word);
    }
    out
}

/// Insert `chunk` immediately before the first `IEND`, or append it.
pub fn insert_before_iend(chunks: &mut Vec<PngChunk>, chunk: PngChunk) {
    match chunks.iter().position(|c| c.is_type(&CHUNK_IEND)) {
        Some(idx) => chunks.insert(idx, chunk),
        None      => chunks.push(chunk),
    }
}
