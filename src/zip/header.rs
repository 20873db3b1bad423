//! Fixed-layout ZIP records.  All fields are little-endian.
//!
//! ```text
//! local file header      PK\x03\x04  30 bytes + name + extra
//! central directory hdr  PK\x01\x02  46 bytes + name + extra + comment
//! end of central dir     PK\x05\x06  22 bytes + comment
//! ```

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{self, Read, Write};

pub const LOCAL_HEADER_SIGNATURE:   u32 = 0x0403_4B50;
pub const CENTRAL_HEADER_SIGNATURE: u32 = 0x0201_4B50;
pub const EOCD_SIGNATURE:           u32 = 0x0605_4B50;

pub const LOCAL_HEADER_SIZE:   usize = 30;
pub const CENTRAL_HEADER_SIZE: usize = 46;
pub const EOCD_SIZE:           usize = 22;

pub const VERSION_NEEDED: u16 = 20;

pub const METHOD_STORE:   u16 = 0;
pub const METHOD_DEFLATE: u16 = 8;

/// General-purpose bit 11: file name is UTF-8.
pub const FLAG_UTF8: u16 = 1 << 11;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalFileHeader {
    pub version_needed:    u16,
    pub flags:             u16,
    pub method:            u16,
    pub mod_time:          u16,
    pub mod_date:          u16,
    pub crc32:             u32,
    pub compressed_size:   u32,
    pub uncompressed_size: u32,
    pub name_len:          u16,
    pub extra_len:         u16,
}

impl LocalFileHeader {
    pub fn write<W: Write>(&self, mut writer: W) -> io::Result<()> {
        writer.write_u32::<LittleEndian>(LOCAL_HEADER_SIGNATURE)?;
        writer.write_u16::<LittleEndian>(self.version_needed)?;
        writer.write_u16::<LittleEndian>(self.flags)?;
        writer.write_u16::<LittleEndian>(self.method)?;
        writer.write_u16::<LittleEndian>(self.mod_time)?;
        writer.write_u16::<LittleEndian>(self.mod_date)?;
        writer.write_u32::<LittleEndian>(self.crc32)?;
        writer.write_u32::<LittleEndian>(self.compressed_size)?;
        writer.write_u32::<LittleEndian>(self.uncompressed_size)?;
        writer.write_u16::<LittleEndian>(self.name_len)?;
        writer.write_u16::<LittleEndian>(self.extra_len)?;
        Ok(())
    }

    /// Reads the fixed part; the signature must already match.
    pub fn read<R: Read>(mut reader: R) -> io::Result<Self> {
        let signature = reader.read_u32::<LittleEndian>()?;
        if signature != LOCAL_HEADER_SIGNATURE {
            return Err(io::Error::new(io::ErrorKind::InvalidData, "bad local header signature"));
        }
        Ok(Self {
            version_needed:    reader.read_u16::<LittleEndian>()?,
            flags:             reader.read_u16::<LittleEndian>()?,
            method:            reader.read_u16::<LittleEndian>()?,
            mod_time:          reader.read_u16::<LittleEndian>()?,
            mod_date:          reader.read_u16::<LittleEndian>()?,
            crc32:             reader.read_u32::<LittleEndian>()?,
            compressed_size:   reader.read_u32::<LittleEndian>()?,
            uncompressed_size: reader.read_u32::<LittleEndian>()?,
            name_len:          reader.read_u16::<LittleEndian>()?,
            extra_len:         reader.read_u16::<LittleEndian>()?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CentralDirectoryHeader {
    pub version_made_by:     u16,
    pub version_needed:      u16,
    pub flags:               u16,
    pub method:              u16,
    pub mod_time:            u16,
    pub mod_date:            u16,
    pub crc32:               u32,
    pub compressed_size:     u32,
    pub uncompressed_size:   u32,
    pub name_len:            u16,
    pub extra_len:           u16,
    pub comment_len:         u16,
    pub disk_start:          u16,
    pub internal_attrs:      u16,
    pub external_attrs:      u32,
    pub local_header_offset: u32,
}

impl CentralDirectoryHeader {
    /// Mirror a local header, adding where it lives in the archive.
    pub fn for_local(local: &LocalFileHeader, local_header_offset: u32) -> Self {
        Self {
            version_made_by:   VERSION_NEEDED,
            version_needed:    local.version_needed,
            flags:             local.flags,
            method:            local.method,
            mod_time:          local.mod_time,
            mod_date:          local.mod_date,
            crc32:             local.crc32,
            compressed_size:   local.compressed_size,
            uncompressed_size: local.uncompressed_size,
            name_len:          local.name_len,
            extra_len:         0,
            comment_len:       0,
            disk_start:        0,
            internal_attrs:    0,
            external_attrs:    0,
            local_header_offset,
        }
    }

    /// Bytes occupied by this record including its variable-length tail.
    pub fn record_len(&self) -> usize {
        CENTRAL_HEADER_SIZE + self.name_len as usize + self.extra_len as usize + self.comment_len as usize
    }

    pub fn write<W: Write>(&self, mut writer: W) -> io::Result<()> {
        writer.write_u32::<LittleEndian>(CENTRAL_HEADER_SIGNATURE)?;
        writer.write_u16::<LittleEndian>(self.version_made_by)?;
        writer.write_u16::<LittleEndian>(self.version_needed)?;
        writer.write_u16::<LittleEndian>(self.flags)?;
        writer.write_u16::<LittleEndian>(self.method)?;
        writer.write_u16::<LittleEndian>(self.mod_time)?;
        writer.write_u16::<LittleEndian>(self.mod_date)?;
        writer.write_u32::<LittleEndian>(self.crc32)?;
        writer.write_u32::<LittleEndian>(self.compressed_size)?;
        writer.write_u32::<LittleEndian>(self.uncompressed_size)?;
        writer.write_u16::<LittleEndian>(self.name_len)?;
        writer.write_u16::<LittleEndian>(self.extra_len)?;
        writer.write_u16::<LittleEndian>(self.comment_len)?;
        writer.write_u16::<LittleEndian>(self.disk_start)?;
        writer.write_u16::<LittleEndian>(self.internal_attrs)?;
        writer.write_u32::<LittleEndian>(self.external_attrs)?;
        writer.write_u32::<LittleEndian>(self.local_header_offset)?;
        Ok(())
    }

    /// Reads the fixed part after the caller has matched the signature.
    pub fn read<R: Read>(mut reader: R) -> io::Result<Self> {
        let signature = reader.read_u32::<LittleEndian>()?;
        if signature != CENTRAL_HEADER_SIGNATURE {
            return Err(io::Error::new(io::ErrorKind::InvalidData, "bad central directory signature"));
        }
        Ok(Self {
            version_made_by:     reader.read_u16::<LittleEndian>()?,
            version_needed:      reader.read_u16::<LittleEndian>()?,
            flags:               reader.read_u16::<LittleEndian>()?,
            method:              reader.read_u16::<LittleEndian>()?,
            mod_time:            reader.read_u16::<LittleEndian>()?,
            mod_date:            reader.read_u16::<LittleEndian>()?,
            crc32:               reader.read_u32::<LittleEndian>()?,
            compressed_size:     reader.read_u32::<LittleEndian>()?,
            uncompressed_size:   reader.read_u32::<LittleEndian>()?,
            name_len:            reader.read_u16::<LittleEndian>()?,
            extra_len:           reader.read_u16::<LittleEndian>()?,
            comment_len:         reader.read_u16::<LittleEndian>()?,
            disk_start:          reader.read_u16::<LittleEndian>()?,
            internal_attrs:      reader.read_u16::<LittleEndian>()?,
            external_attrs:      reader.read_u32::<LittleEndian>()?,
            local_header_offset: reader.read_u32::<LittleEndian>()?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndOfCentralDirectory {
    pub disk_number:     u16,
    pub cd_disk:         u16,
    pub entries_on_disk: u16,
    pub total_entries:   u16,
    pub cd_size:         u32,
    pub cd_offset:       u32,
    pub comment_len:     u16,
}

impl EndOfCentralDirectory {
    pub fn new(entries: u16, cd_size: u32, cd_offset: u32) -> Self {
        Self {
            disk_number:     0,
            cd_disk:         0,
            entries_on_disk: entries,
            total_entries:   entries,
            cd_size,
            cd_offset,
            comment_len:     0,
        }
    }

    pub fn write<W: Write>(&self, mut writer: W) -> io::Result<()> {
        writer.write_u32::<LittleEndian>(EOCD_SIGNATURE)?;
        writer.write_u16::<LittleEndian>(self.disk_number)?;
        writer.write_u16::<LittleEndian>(self.cd_disk)?;
        writer.write_u16::<LittleEndian>(self.entries_on_disk)?;
        writer.write_u16::<LittleEndian>(self.total_entries)?;
        writer.write_u32::<LittleEndian>(self.cd_size)?;
        writer.write_u32::<LittleEndian>(self.cd_offset)?;
        writer.write_u16::<LittleEndian>(self.comment_len)?;
        Ok(())
    }

    pub fn read<R: Read>(mut reader: R) -> io::Result<Self> {
        let signature = reader.read_u32::<LittleEndian>()?;
        if signature != EOCD_SIGNATURE {
            return Err(io::Error::new(io::ErrorKind::InvalidData, "bad end of central directory signature"));
        }
        Ok(Self {
            disk_number:     reader.read_u16::<LittleEndian>()?,
            cd_disk:         reader.read_u16::<LittleEndian>()?,
            entries_on_disk: reader.read_u16::<LittleEndian>()?,
            total_entries:   reader.read_u16::<LittleEndian>()?,
            cd_size:         reader.read_u32::<LittleEndian>()?,
            cd_offset:       reader.read_u32::<LittleEndian>()?,
            comment_len:     reader.read_u16::<LittleEndian>()?,
        })
    }
}
