//! Minimal ZIP container for CHARX files.
//!
//! # Writer
//! [`create_zip`] only ever produces STORE (method 0) entries: one local
//! header + raw bytes per file, then the central directory, then the EOCD
//! record.  Timestamps are zero, so identical inputs give identical archives.
//!
//! # Reader
//! [`extract_zip`] locates the EOCD record by scanning backward, walks the
//! central directory, and resolves each entry's local header to find its
//! data.  STORE and DEFLATE (method 8) are supported.  Every entry is capped
//! at [`MAX_ENTRY_SIZE`], and every name goes through
//! [`path::sanitize_path`]; a single unsafe name fails the whole extraction.

pub mod header;
pub mod inflate;
pub mod path;

use log::{debug, warn};
use std::io::Cursor;

use crate::crc::crc32;
use crate::encoding::latin1_to_string;
use crate::error::ParseError;
use header::{
    CentralDirectoryHeader, EndOfCentralDirectory, LocalFileHeader, CENTRAL_HEADER_SIGNATURE,
    CENTRAL_HEADER_SIZE, EOCD_SIGNATURE, EOCD_SIZE, FLAG_UTF8, LOCAL_HEADER_SIZE, METHOD_DEFLATE,
    METHOD_STORE, VERSION_NEEDED,
};

/// Upper bound on any single decompressed entry (100 MiB).
pub const MAX_ENTRY_SIZE: u64 = 100 * 1024 * 1024;

// ── ZipFiles ─────────────────────────────────────────────────────────────────

/// Insertion-ordered `name → bytes` map.  Re-inserting a name replaces the
/// earlier bytes in place.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ZipFiles {
    entries: Vec<(String, Vec<u8>)>,
}

impl ZipFiles {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, data: Vec<u8>) {
        let name = name.into();
        match self.entries.iter_mut().find(|(n, _)| *n == name) {
            Some(slot) => slot.1 = data,
            None       => self.entries.push((name, data)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&[u8]> {
        self.entries.iter().find(|(n, _)| n == name).map(|(_, d)| d.as_slice())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(n, _)| n.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[u8])> {
        self.entries.iter().map(|(n, d)| (n.as_str(), d.as_slice()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// ── EntryInfo ────────────────────────────────────────────────────────────────

/// Central-directory view of one entry, returned by [`list_entries`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryInfo {
    pub name:              String,
    pub method:            u16,
    pub crc32:             u32,
    pub compressed_size:   u64,
    pub uncompressed_size: u64,
}

// ── Detection ────────────────────────────────────────────────────────────────

/// True for a local-header signature, or the EOCD signature of an empty archive.
pub fn is_zip(bytes: &[u8]) -> bool {
    bytes.len() >= 4 && (bytes[..4] == *b"PK\x03\x04" || bytes[..4] == *b"PK\x05\x06")
}

// ── Reader ───────────────────────────────────────────────────────────────────

fn find_eocd(bytes: &[u8]) -> Option<usize> {
    if bytes.len() < EOCD_SIZE {
        return None;
    }
    let signature = EOCD_SIGNATURE.to_le_bytes();
    (0..=bytes.len() - EOCD_SIZE).rev().find(|&pos| bytes[pos..pos + 4] == signature)
}

fn decode_name(raw: &[u8], flags: u16) -> Result<String, ParseError> {
    if flags & FLAG_UTF8 != 0 {
        String::from_utf8(raw.to_vec())
            .map_err(|_| ParseError::InvalidZip("entry name flagged UTF-8 is not valid UTF-8".into()))
    } else {
        Ok(latin1_to_string(raw))
    }
}

fn slice<'a>(bytes: &'a [u8], start: usize, len: usize, what: &str) -> Result<&'a [u8], ParseError> {
    start
        .checked_add(len)
        .and_then(|end| bytes.get(start..end))
        .ok_or_else(|| ParseError::InvalidZip(format!("{what} extends beyond file bounds")))
}

/// Walk the central directory.  Stops early at the first record whose
/// signature does not match.
fn central_directory(bytes: &[u8]) -> Result<Vec<(CentralDirectoryHeader, String)>, ParseError> {
    let eocd_pos = find_eocd(bytes)
        .ok_or_else(|| ParseError::InvalidZip("no end of central directory found".into()))?;
    let eocd = EndOfCentralDirectory::read(Cursor::new(&bytes[eocd_pos..]))?;
    debug!("zip eocd at {eocd_pos}: {} entries, cd at {}", eocd.total_entries, eocd.cd_offset);

    let signature = CENTRAL_HEADER_SIGNATURE.to_le_bytes();
    let mut records = Vec::with_capacity(eocd.total_entries as usize);
    let mut offset = eocd.cd_offset as usize;

    for _ in 0..eocd.total_entries {
        if bytes.get(offset..offset + 4) != Some(&signature[..]) {
            debug!("zip central directory ends early at {offset}");
            break;
        }
        let header = CentralDirectoryHeader::read(Cursor::new(&bytes[offset..]))?;
        let raw_name = slice(bytes, offset + CENTRAL_HEADER_SIZE, header.name_len as usize, "entry name")?;
        let name = decode_name(raw_name, header.flags)?;
        offset += header.record_len();
        records.push((header, name));
    }
    Ok(records)
}

/// List entries without decompressing anything.  Names are sanitized.
pub fn list_entries(bytes: &[u8]) -> Result<Vec<EntryInfo>, ParseError> {
    central_directory(bytes)?
        .into_iter()
        .map(|(h, name)| {
            Ok(EntryInfo {
                name:              path::sanitize_path(&name)?,
                method:            h.method,
                crc32:             h.crc32,
                compressed_size:   h.compressed_size as u64,
                uncompressed_size: h.uncompressed_size as u64,
            })
        })
        .collect()
}

fn read_entry(bytes: &[u8], central: &CentralDirectoryHeader, name: &str) -> Result<Vec<u8>, ParseError> {
    let expected = central.uncompressed_size as u64;
    if expected > MAX_ENTRY_SIZE {
        return Err(ParseError::EntryTooLarge { name: name.to_owned(), size: expected, max: MAX_ENTRY_SIZE });
    }

    let local_offset = central.local_header_offset as usize;
    let local_bytes = slice(bytes, local_offset, LOCAL_HEADER_SIZE, "local header")?;
    let local = LocalFileHeader::read(Cursor::new(local_bytes))
        .map_err(|e| ParseError::InvalidZip(format!("local header for {name:?}: {e}")))?;

    let data_start = local_offset + LOCAL_HEADER_SIZE + local.name_len as usize + local.extra_len as usize;
    let raw = slice(bytes, data_start, central.compressed_size as usize, "entry data")?;

    let data = match central.method {
        METHOD_STORE   => raw.to_vec(),
        METHOD_DEFLATE => inflate::inflate(name, raw, expected, MAX_ENTRY_SIZE)?,
        other          => return Err(ParseError::UnsupportedCompression(other)),
    };

    if data.len() as u64 != expected {
        return Err(ParseError::SizeMismatch { name: name.to_owned(), expected, actual: data.len() as u64 });
    }
    let actual_crc = crc32(&data);
    if actual_crc != central.crc32 {
        warn!("zip entry {name:?}: crc {actual_crc:#010x} does not match declared {:#010x}", central.crc32);
    }
    Ok(data)
}

/// Extract every file entry.  Directory entries (names ending in `/`) are
/// skipped.
pub fn extract_zip(bytes: &[u8]) -> Result<ZipFiles, ParseError> {
    let mut files = ZipFiles::new();
    for (central, raw_name) in central_directory(bytes)? {
        if raw_name.ends_with('/') {
            continue;
        }
        let name = path::sanitize_path(&raw_name)?;
        let data = read_entry(bytes, &central, &name)?;
        debug!("zip entry {name:?}: method {} -> {} bytes", central.method, data.len());
        files.insert(name, data);
    }
    Ok(files)
}

// ── Writer ───────────────────────────────────────────────────────────────────

fn too_large(what: &str) -> ParseError {
    ParseError::InvalidZip(format!("{what} exceeds the 32-bit ZIP limits"))
}

/// Pack `files` as STORE entries, in insertion order.
pub fn create_zip(files: &ZipFiles) -> Result<Vec<u8>, ParseError> {
    let entry_count = u16::try_from(files.len()).map_err(|_| too_large("entry count"))?;
    let mut out = Vec::new();
    let mut central = Vec::with_capacity(files.len());

    for (name, data) in files.iter() {
        let offset = u32::try_from(out.len()).map_err(|_| too_large("archive"))?;
        let size = u32::try_from(data.len()).map_err(|_| too_large(name))?;
        let name_len = u16::try_from(name.len()).map_err(|_| too_large("entry name"))?;

        let local = LocalFileHeader {
            version_needed:    VERSION_NEEDED,
            flags:             if name.is_ascii() { 0 } else { FLAG_UTF8 },
            method:            METHOD_STORE,
            mod_time:          0,
            mod_date:          0,
            crc32:             crc32(data),
            compressed_size:   size,
            uncompressed_size: size,
            name_len,
            extra_len:         0,
        };
        local.write(&mut out)?;
        out.extend_from_slice(name.as_bytes());
        out.extend_from_slice(data);
        central.push((CentralDirectoryHeader::for_local(&local, offset), name));
    }

    let cd_offset = u32::try_from(out.len()).map_err(|_| too_large("archive"))?;
    for (header, name) in &central {
        header.write(&mut out)?;
        out.extend_from_slice(name.as_bytes());
    }
    let cd_size = u32::try_from(out.len()).map_err(|_| too_large("archive"))? - cd_offset;

    EndOfCentralDirectory::new(entry_count, cd_size, cd_offset).write(&mut out)?;
    Ok(out)
}
