//! `tEXt` chunks: `keyword \0 text`, both Latin-1.

use super::{PngChunk, CHUNK_TEXT};
use crate::encoding::latin1_to_string;

/// Canonical V3 card.
pub const KEYWORD_CCV3: &str = "ccv3";
/// V1/V2 card, read by legacy tools.
pub const KEYWORD_CHARA: &str = "chara";
/// Standalone lorebook.
pub const KEYWORD_NAIDATA: &str = "naidata";

/// Keywords whose chunks carry card or lorebook payloads.
pub const CARD_KEYWORDS: [&str; 3] = [KEYWORD_CCV3, KEYWORD_CHARA, KEYWORD_NAIDATA];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextChunk {
    pub keyword:   String,
    pub text:      String,
    pub crc_valid: bool,
}

pub fn create_text_chunk(keyword: &str, text: &str) -> PngChunk {
    let mut data = Vec::with_capacity(keyword.len() + 1 + text.len());
    data.extend_from_slice(keyword.as_bytes());
    data.push(0);
    data.extend_from_slice(text.as_bytes());
    PngChunk::new(CHUNK_TEXT, data)
}

/// Keyword bytes of a `tEXt` chunk, or `None` for any other chunk type.
pub fn keyword(chunk: &PngChunk) -> Option<&[u8]> {
    if !chunk.is_type(&CHUNK_TEXT) {
        return None;
    }
    let end = chunk.data.iter().position(|&b| b == 0).unwrap_or(chunk.data.len());
    Some(&chunk.data[..end])
}

pub fn has_keyword(chunk: &PngChunk, wanted: &[&str]) -> bool {
    keyword(chunk).is_some_and(|k| wanted.iter().any(|w| w.as_bytes() == k))
}

/// Decode a `tEXt` chunk.  A chunk without a separator yields an empty
/// keyword and text and is reported as CRC-invalid.
pub fn parse_text_chunk(chunk: &PngChunk) -> Option<TextChunk> {
    if !chunk.is_type(&CHUNK_TEXT) {
        return None;
    }
    let Some(sep) = chunk.data.iter().position(|&b| b == 0) else {
        return Some(TextChunk { keyword: String::new(), text: String::new(), crc_valid: false });
    };
    Some(TextChunk {
        keyword:   latin1_to_string(&chunk.data[..sep]),
        text:      latin1_to_string(&chunk.data[sep + 1..]),
        crc_valid: chunk.crc_valid(),
    })
}

/// The last `tEXt` chunk in `chunks` with the given keyword.
pub fn find_text(chunks: &[PngChunk], wanted: &str) -> Option<TextChunk> {
    chunks
        .iter()
        .filter_map(parse_text_chunk)
        .filter(|t| t.keyword == wanted)
        .last()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crc::crc32;

    #[test]
    fn test_create_text_chunk() {
        let chunk = create_text_chunk("ccv3", "eyJ9");
        assert_eq!(chunk.data, b"ccv3\0eyJ9");
        assert_eq!(chunk.length, 9);
        assert_eq!(chunk.crc, crc32(b"tEXtccv3\0eyJ9"));
    }

    #[test]
    fn test_parse_text_chunk() {
        let parsed = parse_text_chunk(&create_text_chunk("chara", "abc")).unwrap();
        assert_eq!(parsed.keyword, "chara");
        assert_eq!(parsed.text, "abc");
        assert!(parsed.crc_valid);
    }

    #[test]
    fn test_parse_detects_bad_crc() {
        let mut chunk = create_text_chunk("ccv3", "abc");
        chunk.crc ^= 1;
        assert!(!parse_text_chunk(&chunk).unwrap().crc_valid);
    }

    #[test]
    fn test_missing_separator() {
        let chunk = PngChunk::new(CHUNK_TEXT, b"noseparator".to_vec());
        let parsed = parse_text_chunk(&chunk).unwrap();
        assert_eq!(parsed.keyword, "");
        assert!(!parsed.crc_valid);
        assert_eq!(keyword(&chunk), Some(&b"noseparator"[..]));
    }

    #[test]
    fn test_other_chunk_types_ignored() {
        let chunk = PngChunk::new(*b"IHDR", vec![0; 13]);
        assert!(parse_text_chunk(&chunk).is_none());
        assert!(!has_keyword(&chunk, &CARD_KEYWORDS));
    }

    #[test]
    fn test_find_text_prefers_last() {
        let chunks = vec![create_text_chunk("ccv3", "first"), create_text_chunk("ccv3", "second")];
        assert_eq!(find_text(&chunks, "ccv3").unwrap().text, "second");
        assert!(find_text(&chunks, "chara").is_none());
    }
}
