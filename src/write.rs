//! Write pipeline: embed cards and lorebooks in PNG, JSON and CHARX.

use log::{debug, info};

use crate::card::{Asset, CharacterCard, Lorebook, StandaloneLorebook, EMBEDDED_URI_PREFIX};
use crate::encoding::encode_base64;
use crate::error::Result;
use crate::png::text::{create_text_chunk, has_keyword, KEYWORD_CCV3, KEYWORD_CHARA, KEYWORD_NAIDATA};
use crate::png::{self, insert_before_iend};
use crate::zip::{self, path::sanitize_path, ZipFiles};

const CARD_JSON: &str = "card.json";

// ── Options ──────────────────────────────────────────────────────────────────

/// Configuration for [`write_card_to_png`].
#[derive(Debug, Clone)]
pub struct WritePngOptions {
    /// Also embed a V2 `chara` chunk for legacy readers.
    pub include_v2_chunk:     bool,
    /// Fold parsed decorators back into entry content as `@@` lines.
    pub serialize_decorators: bool,
}

impl Default for WritePngOptions {
    fn default() -> Self {
        Self { include_v2_chunk: true, serialize_decorators: true }
    }
}

/// One binary asset to pack into a CHARX archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetData {
    pub asset_type: String,
    pub name:       String,
    pub ext:        String,
    pub data:       Vec<u8>,
}

impl AssetData {
    /// Archive path: `assets/<type>/<name>.<ext>`.
    pub fn path(&self) -> String {
        format!("assets/{}/{}.{}", self.asset_type, self.name, self.ext)
    }
}

/// Configuration for [`write_card_to_charx`].
///
/// When `assets` is empty the card's own `assets` list is written unchanged;
/// otherwise it is replaced by one `embeded://` entry per asset.
#[derive(Debug, Clone, Default)]
pub struct WriteCharxOptions {
    pub assets: Vec<AssetData>,
}

// ── Cards ────────────────────────────────────────────────────────────────────

/// Embed `card` into `image`.  Existing `ccv3`/`chara` chunks are replaced;
/// every other chunk is kept in order.
pub fn write_card_to_png(card: &CharacterCard, image: &[u8], opts: &WritePngOptions) -> Result<Vec<u8>> {
    let mut chunks = png::read_chunks(image)?;
    let before = chunks.len();
    chunks.retain(|c| !has_keyword(c, &[KEYWORD_CCV3, KEYWORD_CHARA]));
    if chunks.len() != before {
        debug!("replacing {} existing card chunk(s)", before - chunks.len());
    }

    let card = if opts.serialize_decorators {
        card.clone().map_lorebook(Lorebook::with_serialized_decorators)
    } else {
        card.clone()
    };

    let v3 = serde_json::to_string(&card)?;
    insert_before_iend(&mut chunks, create_text_chunk(KEYWORD_CCV3, &encode_base64(v3.as_bytes())));

    if opts.include_v2_chunk {
        let v2 = serde_json::to_string(&card.to_v2())?;
        insert_before_iend(&mut chunks, create_text_chunk(KEYWORD_CHARA, &encode_base64(v2.as_bytes())));
    }

    let out = png::write_chunks(&chunks);
    info!("wrote card {:?} to PNG ({} bytes, v2 chunk: {})", card.data.name, out.len(), opts.include_v2_chunk);
    Ok(out)
}

/// Pretty-printed V3 JSON.
pub fn write_card_to_json(card: &CharacterCard) -> Result<String> {
    Ok(serde_json::to_string_pretty(card)?)
}

/// Pack `card.json` and every asset into a STORE-only ZIP.
pub fn write_card_to_charx(card: &CharacterCard, opts: &WriteCharxOptions) -> Result<Vec<u8>> {
    let mut files = ZipFiles::new();

    let card = if opts.assets.is_empty() {
        card.clone()
    } else {
        let mut assets = Vec::with_capacity(opts.assets.len());
        for asset in &opts.assets {
            let path = sanitize_path(&asset.path())?;
            assets.push(Asset {
                asset_type: asset.asset_type.clone(),
                uri:        format!("{EMBEDDED_URI_PREFIX}{path}"),
                name:       asset.name.clone(),
                ext:        asset.ext.clone(),
            });
            files.insert(path, asset.data.clone());
        }
        card.with_assets(assets)
    };

    files.insert(CARD_JSON, serde_json::to_string_pretty(&card)?.into_bytes());
    let out = zip::create_zip(&files)?;
    info!("wrote card {:?} to CHARX ({} entries, {} bytes)", card.data.name, files.len(), out.len());
    Ok(out)
}

// ── Lorebooks ────────────────────────────────────────────────────────────────

/// Embed `lorebook` as a `naidata` chunk.  Existing `naidata`/`chara` chunks
/// are removed.
pub fn write_lorebook_to_png(lorebook: &Lorebook, image: &[u8]) -> Result<Vec<u8>> {
    let mut chunks = png::read_chunks(image)?;
    chunks.retain(|c| !has_keyword(c, &[KEYWORD_NAIDATA, KEYWORD_CHARA]));

    let wrapped = StandaloneLorebook::new(lorebook.clone().with_serialized_decorators());
    let json = serde_json::to_string(&wrapped)?;
    insert_before_iend(&mut chunks, create_text_chunk(KEYWORD_NAIDATA, &encode_base64(json.as_bytes())));

    let out = png::write_chunks(&chunks);
    info!("wrote lorebook ({} entries) to PNG ({} bytes)", lorebook.entries.len(), out.len());
    Ok(out)
}

/// Pretty-printed `{"spec": "lorebook_v3", "data": ...}`.
pub fn write_lorebook_to_json(lorebook: &Lorebook) -> Result<String> {
    Ok(serde_json::to_string_pretty(&StandaloneLorebook::new(lorebook.clone()))?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::card::LorebookEntry;
    use crate::decorator::Decorator;
    use crate::png::read_chunks;
    use crate::png::tests::minimal_png;
    use crate::png::text::{find_text, parse_text_chunk};
    use crate::read::{read_card, read_lorebook, ReadOptions};
    use crate::encoding::decode_base64;
    use serde_json::Value;

    fn sample_card() -> CharacterCard {
        let mut card = CharacterCard::default();
        card.data.name = "Aria".into();
        card.data.description = "A wandering bard".into();
        card.data.nickname = Some("Ari".into());
        card.data.character_book = Some(Lorebook {
            entries: vec![LorebookEntry {
                keys: vec!["lute".into()],
                content: "An old lute".into(),
                decorators: Some(vec![Decorator::Depth { value: 4 }]),
                ..Default::default()
            }],
            ..Default::default()
        });
        card
    }

    fn decode_chunk(png: &[u8], keyword: &str) -> Value {
        let text = find_text(&read_chunks(png).unwrap(), keyword).unwrap();
        serde_json::from_slice(&decode_base64(&text.text).unwrap()).unwrap()
    }

    #[test]
    fn test_png_embeds_before_iend() {
        let png = write_card_to_png(&sample_card(), &minimal_png(), &WritePngOptions::default()).unwrap();
        let chunks = read_chunks(&png).unwrap();
        let types: Vec<String> = chunks.iter().map(|c| c.type_str()).collect();
        assert_eq!(types, ["IHDR", "IDAT", "tEXt", "tEXt", "IEND"]);
        let keywords: Vec<String> = chunks.iter().filter_map(parse_text_chunk).map(|t| t.keyword).collect();
        assert_eq!(keywords, ["ccv3", "chara"]);
    }

    #[test]
    fn test_png_serializes_decorators_into_content() {
        let png = write_card_to_png(&sample_card(), &minimal_png(), &WritePngOptions::default()).unwrap();
        let v3 = decode_chunk(&png, "ccv3");
        let entry = &v3["data"]["character_book"]["entries"][0];
        assert_eq!(entry["content"], "@@depth 4\nAn old lute");
        assert!(entry.get("decorators").is_none());

        let v2 = decode_chunk(&png, "chara");
        assert_eq!(v2["spec"], "chara_card_v2");
        assert_eq!(v2["data"]["extensions"]["v3_nickname"], "Ari");
    }

    #[test]
    fn test_png_raw_decorators_and_no_v2() {
        let opts = WritePngOptions { include_v2_chunk: false, serialize_decorators: false };
        let png = write_card_to_png(&sample_card(), &minimal_png(), &opts).unwrap();
        assert!(find_text(&read_chunks(&png).unwrap(), "chara").is_none());
        let v3 = decode_chunk(&png, "ccv3");
        let entry = &v3["data"]["character_book"]["entries"][0];
        assert_eq!(entry["content"], "An old lute");
        assert_eq!(entry["decorators"][0]["type"], "depth");
    }

    #[test]
    fn test_png_rewrite_replaces_old_card() {
        let opts = WritePngOptions::default();
        let first = write_card_to_png(&sample_card(), &minimal_png(), &opts).unwrap();
        let mut renamed = sample_card();
        renamed.data.name = "Bea".into();
        let second = write_card_to_png(&renamed, &first, &opts).unwrap();

        let chunks = read_chunks(&second).unwrap();
        assert_eq!(chunks.iter().filter_map(parse_text_chunk).count(), 2);
        assert_eq!(read_card(&second, &ReadOptions::default()).unwrap().data.name, "Bea");
    }

    #[test]
    fn test_png_rejects_non_png_image() {
        assert!(write_card_to_png(&sample_card(), b"not a png", &WritePngOptions::default()).is_err());
    }

    #[test]
    fn test_json_is_pretty() {
        let json = write_card_to_json(&sample_card()).unwrap();
        assert!(json.starts_with("{\n  \"spec\": \"chara_card_v3\""));
    }

    #[test]
    fn test_charx_layout() {
        let opts = WriteCharxOptions {
            assets: vec![AssetData {
                asset_type: "icon".into(),
                name:       "main".into(),
                ext:        "png".into(),
                data:       vec![9, 8, 7],
            }],
        };
        let archive = write_card_to_charx(&sample_card(), &opts).unwrap();
        let files = zip::extract_zip(&archive).unwrap();
        let names: Vec<&str> = files.names().collect();
        assert_eq!(names, ["assets/icon/main.png", "card.json"]);
        assert_eq!(files.get("assets/icon/main.png"), Some(&[9u8, 8, 7][..]));

        let card: Value = serde_json::from_slice(files.get("card.json").unwrap()).unwrap();
        assert_eq!(card["data"]["assets"][0]["uri"], "embeded://assets/icon/main.png");
    }

    #[test]
    fn test_charx_rejects_unsafe_asset_name() {
        let opts = WriteCharxOptions {
            assets: vec![AssetData {
                asset_type: "icon".into(),
                name:       "../../evil".into(),
                ext:        "png".into(),
                data:       Vec::new(),
            }],
        };
        assert!(write_card_to_charx(&sample_card(), &opts).is_err());
    }

    #[test]
    fn test_lorebook_png_roundtrip() {
        let book = sample_card().data.character_book.unwrap();
        let png = write_lorebook_to_png(&book, &minimal_png()).unwrap();
        let raw = decode_chunk(&png, "naidata");
        assert_eq!(raw["spec"], "lorebook_v3");
        assert_eq!(raw["data"]["entries"][0]["content"], "@@depth 4\nAn old lute");

        let back = read_lorebook(&png, &ReadOptions::default()).unwrap();
        assert_eq!(back, book);
    }

    #[test]
    fn test_lorebook_json_wrapped() {
        let book = sample_card().data.character_book.unwrap();
        let json = write_lorebook_to_json(&book).unwrap();
        let value: Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["spec"], "lorebook_v3");
        assert_eq!(read_lorebook(json.as_str(), &ReadOptions::default()).unwrap(), book);
    }
}
