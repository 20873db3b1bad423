//! Archive entry name checks.  Every name leaving the ZIP reader passes
//! through [`sanitize_path`].

use crate::error::ParseError;

/// Path components that are never accepted, wherever they appear.
pub const FORBIDDEN_COMPONENTS: [&str; 3] = ["__proto__", "constructor", "prototype"];

/// Normalise backslashes to `/` and reject names that could escape the
/// archive root or collide with object-model keys downstream.
pub fn sanitize_path(name: &str) -> Result<String, ParseError> {
    let unsafe_path = |reason| ParseError::UnsafePath { name: name.to_owned(), reason };

    if name.contains('\0') {
        return Err(unsafe_path("null byte in filename"));
    }

    let normalized = name.replace('\\', "/");
    if normalized.starts_with('/') || has_drive_prefix(&normalized) {
        return Err(unsafe_path("absolute path"));
    }

    for component in normalized.split('/') {
        if component == ".." {
            return Err(unsafe_path("parent directory reference"));
        }
        if FORBIDDEN_COMPONENTS.contains(&component) {
            return Err(unsafe_path("forbidden path component"));
        }
    }

    Ok(normalized)
}

fn has_drive_prefix(path: &str) -> bool {
    let bytes = path.as_bytes();
    bytes.len() >= 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':'
}
