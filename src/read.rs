//! Read pipeline: format detection and the PNG, JSON and CHARX readers.
//!
//! ```no_run
//! use charcard::read::{read_card, ReadOptions};
//!
//! let bytes = std::fs::read("card.png")?;
//! let card = read_card(&bytes, &ReadOptions::default())?;
//! println!("{}", card.data.name);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use log::{debug, info, warn};
use serde_json::Value;

use crate::card::lorebook::SPEC_LOREBOOK_V3;
use crate::card::normalize::normalize;
use crate::card::{CharacterCard, Lorebook, LorebookEntry};
use crate::encoding::{decode_base64, decode_utf8, encode_base64};
use crate::error::{ParseError, Result};
use crate::png::text::{parse_text_chunk, TextChunk, KEYWORD_CCV3, KEYWORD_CHARA, KEYWORD_NAIDATA};
use crate::png::{self, PngChunk};
use crate::zip;

const CARD_JSON: &str = "card.json";
const OCTET_STREAM_DATA_URI: &str = "data:application/octet-stream;base64,";

// ── ReadOptions ──────────────────────────────────────────────────────────────

/// Configuration for every `read_*` function.
#[derive(Debug, Clone)]
pub struct ReadOptions {
    /// Treat a CRC mismatch on the chosen card chunk as fatal.
    pub strict:           bool,
    /// Split leading `@@` lines out of every lorebook entry.
    pub parse_decorators: bool,
}

impl Default for ReadOptions {
    fn default() -> Self {
        Self { strict: false, parse_decorators: true }
    }
}

// ── CardInput ────────────────────────────────────────────────────────────────

/// Raw file bytes (PNG or CHARX) or JSON text.
#[derive(Debug, Clone, Copy)]
pub enum CardInput<'a> {
    Bytes(&'a [u8]),
    Text(&'a str),
}

impl<'a> From<&'a [u8]> for CardInput<'a> {
    fn from(b: &'a [u8]) -> Self {
        CardInput::Bytes(b)
    }
}

impl<'a> From<&'a Vec<u8>> for CardInput<'a> {
    fn from(b: &'a Vec<u8>) -> Self {
        CardInput::Bytes(b)
    }
}

impl<'a> From<&'a str> for CardInput<'a> {
    fn from(s: &'a str) -> Self {
        CardInput::Text(s)
    }
}

impl<'a> From<&'a String> for CardInput<'a> {
    fn from(s: &'a String) -> Self {
        CardInput::Text(s)
    }
}

// ── Cards ────────────────────────────────────────────────────────────────────

/// Read a card from PNG bytes, CHARX bytes or JSON text.
pub fn read_card<'a>(input: impl Into<CardInput<'a>>, opts: &ReadOptions) -> Result<CharacterCard> {
    match input.into() {
        CardInput::Text(json) => read_card_from_json(json, opts),
        CardInput::Bytes(bytes) if png::is_png(bytes) => {
            info!("reading card from PNG ({} bytes)", bytes.len());
            read_card_from_png(bytes, opts)
        }
        CardInput::Bytes(bytes) if zip::is_zip(bytes) => {
            info!("reading card from CHARX ({} bytes)", bytes.len());
            read_card_from_charx(bytes, opts)
        }
        CardInput::Bytes(_) => Err(ParseError::UnrecognizedFormat.into()),
    }
}

pub fn read_card_from_png(bytes: &[u8], opts: &ReadOptions) -> Result<CharacterCard> {
    let chunks = png::read_chunks(bytes)?;

    let (chunk, text) = last_text(&chunks, KEYWORD_CCV3)
        .filter(|(_, t)| !t.text.is_empty())
        .or_else(|| last_text(&chunks, KEYWORD_CHARA).filter(|(_, t)| !t.text.is_empty()))
        .ok_or(ParseError::NoCardData)?;
    debug!("using {:?} chunk ({} bytes of payload)", text.keyword, text.text.len());

    if !text.crc_valid {
        let (stored, computed) = (chunk.crc, chunk.computed_crc());
        if opts.strict {
            return Err(ParseError::CrcMismatch { keyword: text.keyword, stored, computed }.into());
        }
        warn!("CRC mismatch in {} chunk (stored {stored:#010x}, computed {computed:#010x})", text.keyword);
    }

    let json = decode_utf8(decode_base64(&text.text)?)?;
    read_card_from_json(&json, opts)
}

pub fn read_card_from_json(json: &str, opts: &ReadOptions) -> Result<CharacterCard> {
    let value: Value = serde_json::from_str(json)?;
    Ok(normalize(value, opts.parse_decorators)?)
}

/// Read `card.json` from a CHARX archive.  Assets whose `embeded://` path is
/// present in the archive come back with their bytes inlined as a data URI.
pub fn read_card_from_charx(bytes: &[u8], opts: &ReadOptions) -> Result<CharacterCard> {
    let files = zip::extract_zip(bytes)?;
    let card_json = files.get(CARD_JSON).ok_or(ParseError::MissingCardJson)?;
    let mut card = read_card_from_json(&decode_utf8(card_json.to_vec())?, opts)?;

    if let Some(assets) = card.data.assets.as_mut() {
        for asset in assets.iter_mut() {
            let Some(data) = asset.embedded_path().and_then(|path| files.get(path)) else {
                continue;
            };
            debug!("inlining asset {:?} ({} bytes)", asset.uri, data.len());
            asset.uri = format!("{OCTET_STREAM_DATA_URI}{}", encode_base64(data));
        }
    }
    Ok(card)
}

/// Last `tEXt` chunk carrying `keyword`, with its decoded payload.
fn last_text<'c>(chunks: &'c [PngChunk], keyword: &str) -> Option<(&'c PngChunk, TextChunk)> {
    chunks
        .iter()
        .filter_map(|c| parse_text_chunk(c).map(|t| (c, t)))
        .filter(|(_, t)| t.keyword == keyword)
        .last()
}

// ── Lorebooks ────────────────────────────────────────────────────────────────

/// Read a standalone lorebook from JSON text or a PNG carrying a `naidata`
/// (or, failing that, `chara`) chunk.
pub fn read_lorebook<'a>(input: impl Into<CardInput<'a>>, opts: &ReadOptions) -> Result<Lorebook> {
    let json = match input.into() {
        CardInput::Text(json) => json.to_owned(),
        CardInput::Bytes(bytes) if png::is_png(bytes) => {
            let chunks = png::read_chunks(bytes)?;
            let (_, text) = last_text(&chunks, KEYWORD_NAIDATA)
                .or_else(|| last_text(&chunks, KEYWORD_CHARA))
                .ok_or(ParseError::NoLorebookData)?;
            decode_utf8(decode_base64(&text.text)?)?
        }
        CardInput::Bytes(_) => return Err(ParseError::UnsupportedLorebookInput.into()),
    };

    let book = lorebook_from_json(serde_json::from_str(&json)?)?;
    Ok(if opts.parse_decorators { book.with_parsed_decorators() } else { book })
}

/// `{"spec": "lorebook_v3", "data": ...}`, a bare entry array, or a bare
/// lorebook object.
fn lorebook_from_json(value: Value) -> std::result::Result<Lorebook, ParseError> {
    match value {
        Value::Array(_) => {
            let entries: Vec<LorebookEntry> = serde_json::from_value(value)?;
            Ok(Lorebook { entries, ..Lorebook::default() })
        }
        Value::Object(mut obj) => {
            let wrapped = obj.get("spec").and_then(Value::as_str) == Some(SPEC_LOREBOOK_V3)
                && obj.get("data").is_some_and(|d| !d.is_null());
            let body = if wrapped { obj.remove("data").unwrap_or_default() } else { Value::Object(obj) };
            Ok(serde_json::from_value(body)?)
        }
        _ => Err(ParseError::NotAnObject),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decorator::Decorator;
    use crate::png::tests::minimal_png;
    use crate::png::text::create_text_chunk;
    use crate::png::{insert_before_iend, read_chunks, write_chunks};
    use crate::zip::ZipFiles;
    use serde_json::json;

    fn png_with(chunks: &[(&str, &str)]) -> Vec<u8> {
        let mut all = read_chunks(&minimal_png()).unwrap();
        for (keyword, text) in chunks {
            insert_before_iend(&mut all, create_text_chunk(keyword, text));
        }
        write_chunks(&all)
    }

    fn b64(value: &Value) -> String {
        encode_base64(value.to_string().as_bytes())
    }

    fn v3(name: &str) -> Value {
        json!({"spec": "chara_card_v3", "spec_version": "3.0", "data": {"name": name, "description": "d"}})
    }

    #[test]
    fn test_read_json_text() {
        let card = read_card(v3("Aria").to_string().as_str(), &ReadOptions::default()).unwrap();
        assert_eq!(card.data.name, "Aria");
    }

    #[test]
    fn test_unrecognized_bytes() {
        let err = read_card(&b"GIF89a......"[..], &ReadOptions::default()).unwrap_err();
        assert!(matches!(err, crate::CardError::Parse(ParseError::UnrecognizedFormat)));
    }

    #[test]
    fn test_png_prefers_ccv3_over_chara() {
        let png = png_with(&[("chara", &b64(&v3("Legacy"))), ("ccv3", &b64(&v3("Canonical")))]);
        let card = read_card(&png, &ReadOptions::default()).unwrap();
        assert_eq!(card.data.name, "Canonical");
    }

    #[test]
    fn test_png_falls_back_to_chara() {
        let v2 = json!({"spec": "chara_card_v2", "spec_version": "2.0", "data": {"name": "Old"}});
        let png = png_with(&[("chara", &b64(&v2))]);
        let card = read_card(&png, &ReadOptions::default()).unwrap();
        assert_eq!(card.data.name, "Old");
        assert_eq!(card.spec, "chara_card_v3");
    }

    #[test]
    fn test_png_without_card() {
        let err = read_card(&minimal_png(), &ReadOptions::default()).unwrap_err();
        assert!(matches!(err, crate::CardError::Parse(ParseError::NoCardData)));
    }

    #[test]
    fn test_png_bad_base64() {
        let png = png_with(&[("ccv3", "!!not base64!!")]);
        let err = read_card(&png, &ReadOptions::default()).unwrap_err();
        assert!(matches!(err, crate::CardError::Parse(ParseError::Base64(_))));
    }

    #[test]
    fn test_png_unpadded_and_wrapped_base64() {
        let full = b64(&v3("Ariana"));
        assert!(full.ends_with("=="));

        let unpadded = png_with(&[("ccv3", full.trim_end_matches('='))]);
        assert_eq!(read_card(&unpadded, &ReadOptions::default()).unwrap().data.name, "Ariana");

        let wrapped: String = full
            .as_bytes()
            .chunks(20)
            .map(|line| std::str::from_utf8(line).unwrap())
            .collect::<Vec<_>>()
            .join("\n");
        let png = png_with(&[("ccv3", &wrapped)]);
        assert_eq!(read_card(&png, &ReadOptions::default()).unwrap().data.name, "Ariana");

        let book = json!({"spec": "lorebook_v3", "data": {"name": "Nai", "entries": []}});
        let png = png_with(&[("naidata", b64(&book).trim_end_matches('='))]);
        assert_eq!(read_lorebook(&png, &ReadOptions::default()).unwrap().name.as_deref(), Some("Nai"));
    }

    #[test]
    fn test_strict_crc() {
        let mut png = png_with(&[("ccv3", &b64(&v3("Aria")))]);
        // The ccv3 chunk sits directly before the 12-byte IEND chunk.
        let crc_at = png.len() - 12 - 4;
        png[crc_at] ^= 0xFF;

        let strict = ReadOptions { strict: true, ..ReadOptions::default() };
        let err = read_card(&png, &strict).unwrap_err();
        assert!(matches!(err, crate::CardError::Parse(ParseError::CrcMismatch { .. })));

        let card = read_card(&png, &ReadOptions::default()).unwrap();
        assert_eq!(card.data.name, "Aria");
    }

    #[test]
    fn test_json_path_parses_decorators() {
        let value = json!({"spec": "chara_card_v3", "data": {"name": "A", "character_book": {
            "entries": [{"keys": ["k"], "content": "@@role system\nBody"}]
        }}});
        let card = read_card_from_json(&value.to_string(), &ReadOptions::default()).unwrap();
        let entry = &card.data.character_book.unwrap().entries[0];
        assert_eq!(entry.content, "Body");
        assert_eq!(entry.decorators, Some(vec![Decorator::Role { value: crate::decorator::Role::System }]));
    }

    #[test]
    fn test_charx_inlines_assets() {
        let card = json!({"spec": "chara_card_v3", "data": {"name": "A", "assets": [
            {"type": "icon", "uri": "embeded://assets/icon/main.png", "name": "main", "ext": "png"},
            {"type": "icon", "uri": "embeded://assets/icon/missing.png", "name": "missing", "ext": "png"},
            {"type": "background", "uri": "https://example.com/bg.png", "name": "bg", "ext": "png"}
        ]}});
        let mut files = ZipFiles::new();
        files.insert("assets/icon/main.png", vec![1, 2, 3]);
        files.insert(CARD_JSON, card.to_string().into_bytes());
        let archive = zip::create_zip(&files).unwrap();

        let card = read_card(&archive, &ReadOptions::default()).unwrap();
        let assets = card.data.assets.unwrap();
        assert_eq!(assets[0].uri, "data:application/octet-stream;base64,AQID");
        assert_eq!(assets[1].uri, "embeded://assets/icon/missing.png");
        assert_eq!(assets[2].uri, "https://example.com/bg.png");
    }

    #[test]
    fn test_charx_requires_card_json() {
        let mut files = ZipFiles::new();
        files.insert("readme.txt", b"hi".to_vec());
        let archive = zip::create_zip(&files).unwrap();
        let err = read_card(&archive, &ReadOptions::default()).unwrap_err();
        assert!(matches!(err, crate::CardError::Parse(ParseError::MissingCardJson)));
    }

    #[test]
    fn test_lorebook_json_shapes() {
        let opts = ReadOptions::default();
        let wrapped = json!({"spec": "lorebook_v3", "data": {"name": "World", "entries": [
            {"keys": ["a"], "content": "@@depth 1\nA"}
        ]}});
        let book = read_lorebook(wrapped.to_string().as_str(), &opts).unwrap();
        assert_eq!(book.name.as_deref(), Some("World"));
        assert_eq!(book.entries[0].content, "A");

        let bare = json!([{"keys": ["b"], "content": "B"}]);
        let book = read_lorebook(bare.to_string().as_str(), &opts).unwrap();
        assert_eq!(book.entries.len(), 1);
        assert!(book.extensions.is_empty());

        let direct = json!({"entries": [], "scan_depth": 3});
        let book = read_lorebook(direct.to_string().as_str(), &opts).unwrap();
        assert_eq!(book.scan_depth, Some(3));

        assert!(read_lorebook("42", &opts).is_err());
    }

    #[test]
    fn test_lorebook_png_prefers_naidata() {
        let nai = json!({"spec": "lorebook_v3", "data": {"name": "Nai", "entries": []}});
        let chara = json!({"spec": "lorebook_v3", "data": {"name": "Chara", "entries": []}});
        let png = png_with(&[("naidata", &b64(&nai)), ("chara", &b64(&chara))]);
        let book = read_lorebook(&png, &ReadOptions::default()).unwrap();
        assert_eq!(book.name.as_deref(), Some("Nai"));

        let err = read_lorebook(&minimal_png(), &ReadOptions::default()).unwrap_err();
        assert!(matches!(err, crate::CardError::Parse(ParseError::NoLorebookData)));
        let err = read_lorebook(&b"PK\x03\x04"[..], &ReadOptions::default()).unwrap_err();
        assert!(matches!(err, crate::CardError::Parse(ParseError::UnsupportedLorebookInput)));
    }
}
