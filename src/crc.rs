//! CRC-32 (IEEE 802.3, reflected polynomial `0xEDB88320`).
//!
//! Used for PNG chunk integrity (`CRC(type ++ data)`) and for ZIP entry
//! checksums.  The 256-entry lookup table is built on first use and is
//! read-only afterwards; building it twice yields identical tables, so the
//! `OnceLock` guard is the only synchronisation involved.

use std::sync::OnceLock;

const POLYNOMIAL: u32 = 0xEDB8_8320;

static TABLE: OnceLock<[u32; 256]> = OnceLock::new();

fn table() -> &'static [u32; 256] {
    TABLE.get_or_init(|| {
        let mut table = [0u32; 256];
        for (n, slot) in table.iter_mut().enumerate() {
            let mut c = n as u32;
            for _ in 0..8 {
                c = if c & 1 != 0 { POLYNOMIAL ^ (c >> 1) } else { c >> 1 };
            }
            *slot = c;
        }
        table
    })
}

/// Incremental CRC-32 state.
#[derive(Debug, Clone, Copy)]
pub struct Crc32 {
    state: u32,
}

impl Default for Crc32 {
    fn default() -> Self {
        Self::new()
    }
}

impl Crc32 {
    pub fn new() -> Self {
        Self { state: 0xFFFF_FFFF }
    }

    pub fn update(&mut self, data: &[u8]) {
        let table = table();
        let mut crc = self.state;
        for &byte in data {
            crc = table[((crc ^ u32::from(byte)) & 0xFF) as usize] ^ (crc >> 8);
        }
        self.state = crc;
    }

    pub fn finalize(self) -> u32 {
        self.state ^ 0xFFFF_FFFF
    }
}

/// CRC-32 of a single buffer.
pub fn crc32(data: &[u8]) -> u32 {
    let mut hasher = Crc32::new();
    hasher.update(data);
    hasher.finalize()
}

/// CRC-32 over the concatenation of `parts`, without concatenating them.
pub fn crc32_parts(parts: &[&[u8]]) -> u32 {
    let mut hasher = Crc32::new();
    for part in parts {
        hasher.update(part);
    }
    hasher.finalize()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_value() {
        assert_eq!(crc32(b"123456789"), 0xCBF4_3926);
    }

    #[test]
    fn test_empty() {
        assert_eq!(crc32(b""), 0);
        assert_eq!(crc32_parts(&[]), 0);
    }

    #[test]
    fn test_parts_match_whole() {
        let whole = crc32(b"tEXtccv3\0payload");
        assert_eq!(crc32_parts(&[b"tEXt", b"ccv3\0", b"payload"]), whole);
    }

    #[test]
    fn test_matches_crc32fast() {
        let data: Vec<u8> = (0..=255u8).cycle().take(4099).collect();
        let mut oracle = crc32fast::Hasher::new();
        oracle.update(&data);
        assert_eq!(crc32(&data), oracle.finalize());
    }

    #[test]
    fn test_concurrent_first_use() {
        let handles: Vec<_> = (0..8)
            .map(|_| std::thread::spawn(|| crc32(b"123456789")))
            .collect();
        for h in handles {
            assert_eq!(h.join().unwrap(), 0xCBF4_3926);
        }
    }
}
