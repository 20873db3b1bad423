//! DEFLATE (method 8) decoding for ZIP entries.
//!
//! Output is capped at `limit + 1` bytes so a hostile stream cannot expand
//! past the entry cap; the caller compares the result with the declared
//! uncompressed size.

use flate2::read::DeflateDecoder;
use std::io::Read;

use crate::error::ParseError;

pub fn inflate(name: &str, compressed: &[u8], expected: u64, limit: u64) -> Result<Vec<u8>, ParseError> {
    let cap = expected.min(limit);
    // The declared size is untrusted; reserve against the body instead.
    let reserve = cap.min((compressed.len() as u64).saturating_mul(4));
    let mut out = Vec::with_capacity(reserve as usize);
    DeflateDecoder::new(compressed)
        .take(cap + 1)
        .read_to_end(&mut out)
        .map_err(|e| ParseError::InvalidZip(format!("corrupt deflate stream in {name:?}: {e}")))?;
    Ok(out)
}
