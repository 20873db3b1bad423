//! Raw-byte scanner: find card payloads without a parsable PNG structure.
//!
//! When the chunk stream is damaged the `tEXt` payloads are usually still
//! sitting in the file verbatim.  The scanner walks the raw bytes for long
//! base64 runs (at least [`MIN_RUN`] alphabet characters, optionally followed
//! by `=` padding) and reports each one as a repair candidate, in file order.

use regex::bytes::Regex;
use std::sync::OnceLock;

use crate::encoding::latin1_to_string;

/// Shortest run treated as a candidate.  Short runs are almost always
/// chunk-type tags or pixel noise.
pub const MIN_RUN: usize = 50;

static BASE64_RUN: OnceLock<Regex> = OnceLock::new();

fn base64_run_regex() -> &'static Regex {
    BASE64_RUN.get_or_init(|| Regex::new(r"[A-Za-z0-9+/]{50,}={0,2}").expect("Invalid base64 run pattern"))
}

/// One base64-looking run found in the raw bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    /// Byte offset of the run's first character.
    pub offset: usize,
    pub text:   String,
}

/// Every base64 run in `bytes`, in the order they appear.
pub fn scan(bytes: &[u8]) -> Vec<Candidate> {
    base64_run_regex()
        .find_iter(bytes)
        .map(|m| Candidate { offset: m.start(), text: latin1_to_string(m.as_bytes()) })
        .collect()
}
