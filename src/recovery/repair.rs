//! Layered card recovery.
//!
//! A payload goes through a fixed sequence of decode layers (base64, UTF-8,
//! JSON, card shape).  Each layer either succeeds outright, succeeds through
//! its fallback and records a warning, or fails and ends the attempt with a
//! terminal warning.  Successful sources are merged into one untyped field
//! map, which is then turned into a card one field at a time so a single
//! wrongly-typed field never costs the rest.

use log::{debug, info, warn};
use regex::Regex;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::collections::HashSet;
use std::sync::OnceLock;

use super::scanner;
use super::RepairResult;
use crate::card::{CharacterCard, CharacterData, SPEC_V2, SPEC_V3};
use crate::encoding::{decode_base64, decode_base64_lenient};
use crate::png::text::{has_keyword, parse_text_chunk, CARD_KEYWORDS, KEYWORD_CCV3, KEYWORD_CHARA};
use crate::png::{self, PngChunk, PNG_SIGNATURE};

/// Keys never copied during a merge.
const FORBIDDEN_KEYS: [&str; 3] = ["__proto__", "constructor", "prototype"];

/// Fields pulled out of unparsable JSON, in extraction order.
const PARTIAL_FIELDS: [&str; 4] = ["name", "description", "personality", "first_mes"];

/// Untyped `data` object as recovered from one or more sources.
type Fields = Map<String, Value>;

/// One decoded payload.
#[derive(Debug, Default)]
struct Source {
    fields:  Fields,
    /// `full_card`, `v1_card`, or the field names a partial extraction found.
    markers: Vec<String>,
}

/// Result of running one payload through every layer.
#[derive(Debug, Default)]
struct Attempt {
    source:   Option<Source>,
    warnings: Vec<String>,
}

// ── Entry point ──────────────────────────────────────────────────────────────

/// Recover whatever card data `bytes` still holds.  Never fails and never
/// panics; every degradation is listed in the result's `warnings`.
pub fn repair_card(bytes: &[u8]) -> RepairResult {
    let mut warnings = Vec::new();
    let mut recovered = Vec::new();
    let mut fields = Fields::new();

    let chunks = match png::read_chunks(bytes) {
        Ok(chunks) => chunks,
        Err(e) => {
            warn!("repair: PNG structure unreadable ({e}); scanning raw bytes");
            warnings.push("Failed to parse PNG structure".to_owned());
            let attempt = scan_raw_bytes(bytes);
            warnings.extend(attempt.warnings);
            if let Some(source) = attempt.source {
                fields = source.fields;
                recovered.extend(source.markers);
            }
            Vec::new()
        }
    };

    let mut ccv3 = None;
    let mut chara = None;
    for text in chunks.iter().filter_map(parse_text_chunk) {
        if !text.crc_valid {
            warn!("repair: CRC mismatch in {:?} chunk", text.keyword);
            warnings.push(format!("Invalid CRC in {} chunk", text.keyword));
        }
        match text.keyword.as_str() {
            KEYWORD_CCV3 => ccv3 = Some(text.text),
            KEYWORD_CHARA => chara = Some(text.text),
            _ => {}
        }
    }
    let ccv3 = ccv3.filter(|t| !t.is_empty());
    let chara = chara.filter(|t| !t.is_empty());

    if let Some(primary) = ccv3.as_deref().or(chara.as_deref()) {
        let attempt = decode_card_text(primary);
        warnings.extend(attempt.warnings);
        if let Some(source) = attempt.source {
            merge_fields(&mut fields, source.fields);
            recovered.extend(source.markers);
        }
    }

    if let (Some(_), Some(legacy)) = (&ccv3, &chara) {
        let attempt = decode_card_text(legacy);
        warnings.extend(attempt.warnings);
        if let Some(source) = attempt.source {
            merge_fields(&mut fields, source.fields);
            recovered.extend(source.markers);
            warnings.push("Merged data from multiple chunks".to_owned());
        }
    }

    if !chunks.is_empty() && ccv3.is_none() && chara.is_none() {
        warnings.push("No card data found in PNG".to_owned());
    }

    let card = build_card(&fields, &mut warnings);
    recovered.extend(non_default_fields(&card.data));

    let result = RepairResult {
        card,
        image: clean_image(&chunks),
        warnings: dedup(warnings),
        recovered: dedup(recovered),
    };
    info!("{}", result.summary());
    result
}

// ── Sources ──────────────────────────────────────────────────────────────────

/// Try every base64 run in the raw bytes; keep the first that decodes.
fn scan_raw_bytes(bytes: &[u8]) -> Attempt {
    for candidate in scanner::scan(bytes) {
        let attempt = decode_card_text(&candidate.text);
        if attempt.source.is_some() {
            debug!("repair: raw candidate at offset {} decoded", candidate.offset);
            let mut warnings = vec!["Extracted card data from raw bytes".to_owned()];
            warnings.extend(attempt.warnings);
            return Attempt { source: attempt.source, warnings };
        }
    }
    Attempt { source: None, warnings: vec!["Could not extract card data".to_owned()] }
}

/// Run `text` through the decode layers.
fn decode_card_text(text: &str) -> Attempt {
    let mut warnings = Vec::new();
    match decode_layers(text, &mut warnings) {
        Ok(source) => Attempt { source: Some(source), warnings },
        Err(terminal) => {
            warn!("repair: {terminal}");
            warnings.push(terminal.to_owned());
            Attempt { source: None, warnings }
        }
    }
}

/// Each layer returns its output or the terminal warning for the attempt.
/// Recoverable fallbacks push their warning and carry on.
fn decode_layers(text: &str, warnings: &mut Vec<String>) -> Result<Source, &'static str> {
    let bytes = base64_layer(text, warnings)?;
    let json = utf8_layer(bytes, warnings);
    let value = match serde_json::from_str::<Value>(&json) {
        Ok(value) => value,
        Err(_) => {
            let fields = extract_partial_json(&json).ok_or("Failed to parse JSON")?;
            warnings.push("Partial JSON recovered".to_owned());
            let markers = fields.keys().cloned().collect();
            return Ok(Source { fields, markers });
        }
    };
    shape_layer(value)
}

fn base64_layer(text: &str, warnings: &mut Vec<String>) -> Result<Vec<u8>, &'static str> {
    if let Ok(bytes) = decode_base64(text) {
        return Ok(bytes);
    }
    let mut cleaned: String =
        text.chars().filter(|c| c.is_ascii_alphanumeric() || *c == '+' || *c == '/').collect();
    // A lone trailing sextet cannot encode a byte.
    if cleaned.len() % 4 == 1 {
        cleaned.pop();
    }
    if cleaned.is_empty() {
        return Err("Failed to decode base64");
    }
    while cleaned.len() % 4 != 0 {
        cleaned.push('=');
    }
    let bytes = decode_base64_lenient(&cleaned).map_err(|_| "Failed to decode base64")?;
    warnings.push("Truncated base64 recovered".to_owned());
    Ok(bytes)
}

/// Invalid UTF-8 degrades to ASCII with `?` for every high byte.
fn utf8_layer(bytes: Vec<u8>, warnings: &mut Vec<String>) -> String {
    match String::from_utf8(bytes) {
        Ok(text) => text,
        Err(e) => {
            warnings.push("Malformed UTF-8 recovered".to_owned());
            e.into_bytes().iter().map(|&b| if b.is_ascii() { b as char } else { '?' }).collect()
        }
    }
}

/// Pick the `data` object out of a V2/V3 wrapper, or take a bare V1 object.
fn shape_layer(value: Value) -> Result<Source, &'static str> {
    let Value::Object(mut obj) = value else {
        return Err("Invalid JSON structure");
    };
    let spec = obj.get("spec").and_then(Value::as_str);
    let wrapped = matches!(spec, Some(SPEC_V3) | Some(SPEC_V2));

    match obj.remove("data") {
        Some(Value::Object(data)) if wrapped => Ok(Source { fields: data, markers: vec!["full_card".into()] }),
        data => {
            if let Some(data) = data {
                obj.insert("data".into(), data);
            }
            if obj.contains_key("name") {
                Ok(Source { fields: obj, markers: vec!["v1_card".into()] })
            } else {
                Err("Unknown card format")
            }
        }
    }
}

fn partial_field_regexes() -> &'static [(&'static str, Regex)] {
    static PATTERNS: OnceLock<Vec<(&'static str, Regex)>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        PARTIAL_FIELDS
            .iter()
            .map(|&field| {
                let re = Regex::new(&format!(r#""{field}"\s*:\s*"([^"]*)""#)).expect("Invalid partial JSON pattern");
                (field, re)
            })
            .collect()
    })
}

/// Pull simple string fields out of JSON too damaged to parse.  Empty
/// matches are skipped.
fn extract_partial_json(json: &str) -> Option<Fields> {
    let mut fields = Fields::new();
    for (field, re) in partial_field_regexes() {
        if let Some(value) = re.captures(json).and_then(|c| c.get(1)).filter(|m| !m.as_str().is_empty()) {
            fields.insert((*field).to_owned(), Value::String(value.as_str().to_owned()));
        }
    }
    (!fields.is_empty()).then_some(fields)
}

// ── Merge and build ──────────────────────────────────────────────────────────

/// Copy `incoming` over `into`.  An incoming null or empty string never
/// replaces an existing value.
fn merge_fields(into: &mut Fields, incoming: Fields) {
    for (key, value) in incoming {
        if FORBIDDEN_KEYS.contains(&key.as_str()) {
            continue;
        }
        let blank = value.is_null() || value.as_str().is_some_and(str::is_empty);
        if blank && into.contains_key(&key) {
            continue;
        }
        into.insert(key, value);
    }
}

/// `fields[key]` as `T`, or `T::default()` when missing or of the wrong shape.
fn field<T: DeserializeOwned + Default>(fields: &Fields, key: &str, warnings: &mut Vec<String>) -> T {
    let Some(value) = fields.get(key) else {
        return T::default();
    };
    match T::deserialize(value) {
        Ok(v) => v,
        Err(_) => {
            warnings.push(format!("Discarded malformed {key}"));
            T::default()
        }
    }
}

fn build_card(fields: &Fields, warnings: &mut Vec<String>) -> CharacterCard {
    let mut w = Vec::new();
    let data = CharacterData {
        name:                       field(fields, "name", &mut w),
        description:                field(fields, "description", &mut w),
        personality:                field(fields, "personality", &mut w),
        scenario:                   field(fields, "scenario", &mut w),
        first_mes:                  field(fields, "first_mes", &mut w),
        mes_example:                field(fields, "mes_example", &mut w),
        creator_notes:              field(fields, "creator_notes", &mut w),
        system_prompt:              field(fields, "system_prompt", &mut w),
        post_history_instructions:  field(fields, "post_history_instructions", &mut w),
        alternate_greetings:        field(fields, "alternate_greetings", &mut w),
        tags:                       field(fields, "tags", &mut w),
        creator:                    field(fields, "creator", &mut w),
        character_version:          field(fields, "character_version", &mut w),
        extensions:                 field(fields, "extensions", &mut w),
        nickname:                   field(fields, "nickname", &mut w),
        creator_notes_multilingual: field(fields, "creator_notes_multilingual", &mut w),
        source:                     field(fields, "source", &mut w),
        group_only_greetings:       field(fields, "group_only_greetings", &mut w),
        creation_date:              field(fields, "creation_date", &mut w),
        modification_date:          field(fields, "modification_date", &mut w),
        assets:                     field(fields, "assets", &mut w),
        character_book:             field(fields, "character_book", &mut w),
    };
    for warning in &w {
        warn!("repair: {warning}");
    }
    warnings.extend(w);
    CharacterCard::new(data)
}

/// Top-level `data` keys whose value differs from a default card's.
fn non_default_fields(data: &CharacterData) -> Vec<String> {
    let (Ok(Value::Object(actual)), Ok(Value::Object(default))) =
        (serde_json::to_value(data), serde_json::to_value(CharacterData::default()))
    else {
        return Vec::new();
    };
    actual.into_iter().filter(|(k, v)| default.get(k) != Some(v)).map(|(k, _)| k).collect()
}

// ── Output ───────────────────────────────────────────────────────────────────

/// `chunks` without card-bearing text chunks; the bare signature when there
/// is nothing left to write.
fn clean_image(chunks: &[PngChunk]) -> Vec<u8> {
    let kept: Vec<PngChunk> = chunks.iter().filter(|c| !has_keyword(c, &CARD_KEYWORDS)).cloned().collect();
    if kept.is_empty() {
        return PNG_SIGNATURE.to_vec();
    }
    png::write_chunks(&kept)
}

/// Drop repeats, keeping first occurrences in order.
fn dedup(items: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    items.into_iter().filter(|item| seen.insert(item.clone())).collect()
}
