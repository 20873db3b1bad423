//! Error types shared by every container and pipeline in the crate.
//!
//! Container parsers (PNG, ZIP) fail with [`ParseError`].  The read/write
//! pipelines wrap it in [`CardError`], which additionally carries
//! [`ValidationError`] for structurally valid input with a semantically wrong
//! field.  The repair engine never returns either.

use std::io;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ParseError {
    #[error("Invalid PNG signature")]
    InvalidSignature,
    #[error("Invalid PNG: truncated chunk header at offset {offset}")]
    TruncatedChunkHeader { offset: usize },
    #[error("Invalid PNG: chunk length {length} exceeds maximum allowed size")]
    ChunkTooLarge { length: u32 },
    #[error("Invalid PNG: chunk data extends beyond file bounds at offset {offset}")]
    ChunkOutOfBounds { offset: usize },

    #[error("Invalid ZIP file: {0}")]
    InvalidZip(String),
    #[error("ZIP entry {name:?} exceeds maximum allowed size of {max} bytes ({size} declared)")]
    EntryTooLarge { name: String, size: u64, max: u64 },
    #[error("Unsupported compression method: {0}")]
    UnsupportedCompression(u16),
    #[error("Decompression size mismatch for {name:?}: expected {expected}, got {actual}")]
    SizeMismatch { name: String, expected: u64, actual: u64 },
    #[error("Path traversal detected in {name:?}: {reason}")]
    UnsafePath { name: String, reason: &'static str },

    #[error("Invalid base64: {0}")]
    Base64(#[from] base64::DecodeError),
    #[error("Invalid UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("JSON must be an object")]
    NotAnObject,

    #[error("Unrecognized format: not PNG, JSON, or CHARX")]
    UnrecognizedFormat,
    #[error("Unrecognized card format")]
    UnrecognizedCard,
    #[error("No character card data found in PNG")]
    NoCardData,
    #[error("No lorebook data found in PNG")]
    NoLorebookData,
    #[error("Lorebook data must be PNG or JSON")]
    UnsupportedLorebookInput,
    #[error("Missing card.json in CHARX file")]
    MissingCardJson,
    #[error("CRC mismatch in {keyword} chunk: stored {stored:#010x}, computed {computed:#010x}")]
    CrcMismatch { keyword: String, stored: u32, computed: u32 },

    /// A fixed-size header could not be read in full.
    #[error("Truncated data: {0}")]
    Io(#[from] io::Error),
}

/// A field that is present but has the wrong type or an unacceptable value.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{field}: {expected}")]
pub struct ValidationError {
    /// Dotted JSON path, e.g. `data.tags` or `entries[2].enabled`.
    pub field:    String,
    pub expected: String,
}

impl ValidationError {
    pub fn new(field: impl Into<String>, expected: impl Into<String>) -> Self {
        Self { field: field.into(), expected: expected.into() }
    }
}

#[derive(Error, Debug)]
pub enum CardError {
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationError),
}

impl CardError {
    pub fn is_parse(&self) -> bool {
        matches!(self, CardError::Parse(_))
    }
}

impl From<serde_json::Error> for CardError {
    fn from(e: serde_json::Error) -> Self {
        CardError::Parse(ParseError::Json(e))
    }
}

pub type Result<T> = std::result::Result<T, CardError>;
