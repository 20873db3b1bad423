//! Character card data model.
//!
//! [`CharacterCard`] is the canonical V3 shape and the only card type that
//! leaves the read pipeline.  [`CharacterCardV2`] and [`CharacterCardV1`]
//! exist for the I/O boundary: they are deserialized from legacy input or
//! produced for the legacy `chara` chunk, and converted immediately.
//!
//! Every collection and string field deserializes with a default, so a
//! normalized card never has an absent field, only an empty one.

pub mod lorebook;
pub mod normalize;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

pub use lorebook::{EntryId, Lorebook, LorebookEntry, StandaloneLorebook};

pub const SPEC_V3: &str = "chara_card_v3";
pub const SPEC_V2: &str = "chara_card_v2";
pub const SPEC_VERSION_V3: &str = "3.0";
pub const SPEC_VERSION_V2: &str = "2.0";

/// Free-form extension data.  A plain ordered string map: keys are data and
/// nothing else.
pub type Extensions = Map<String, Value>;

fn spec_v3() -> String {
    SPEC_V3.to_owned()
}

fn spec_version_v3() -> String {
    SPEC_VERSION_V3.to_owned()
}

fn spec_v2() -> String {
    SPEC_V2.to_owned()
}

fn spec_version_v2() -> String {
    SPEC_VERSION_V2.to_owned()
}

// ── V3 ───────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CharacterCard {
    #[serde(default = "spec_v3")]
    pub spec:         String,
    #[serde(default = "spec_version_v3")]
    pub spec_version: String,
    #[serde(default)]
    pub data:         CharacterData,
}

impl Default for CharacterCard {
    fn default() -> Self {
        Self { spec: spec_v3(), spec_version: spec_version_v3(), data: CharacterData::default() }
    }
}

impl CharacterCard {
    pub fn new(data: CharacterData) -> Self {
        Self { data, ..Self::default() }
    }

    /// Same card with `assets` replaced.
    pub fn with_assets(&self, assets: Vec<Asset>) -> Self {
        let mut card = self.clone();
        card.data.assets = Some(assets);
        card
    }

    /// Same card with `character_book` passed through `f`.
    pub fn map_lorebook(mut self, f: impl FnOnce(Lorebook) -> Lorebook) -> Self {
        self.data.character_book = self.data.character_book.take().map(f);
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CharacterData {
    // V1
    pub name:        String,
    pub description: String,
    pub personality: String,
    pub scenario:    String,
    pub first_mes:   String,
    pub mes_example: String,

    // V2
    pub creator_notes:             String,
    pub system_prompt:             String,
    pub post_history_instructions: String,
    pub alternate_greetings:       Vec<String>,
    pub tags:                      Vec<String>,
    pub creator:                   String,
    pub character_version:         String,
    pub extensions:                Extensions,

    // V3
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nickname:                   Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub creator_notes_multilingual: Option<BTreeMap<String, String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source:                     Option<Vec<String>>,
    pub group_only_greetings:       Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub creation_date:              Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub modification_date:          Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assets:                     Option<Vec<Asset>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub character_book:             Option<Lorebook>,
}

/// `uri` is `embeded://<zip path>`, a `data:` URI, or an external scheme.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Asset {
    #[serde(rename = "type")]
    pub asset_type: String,
    pub uri:        String,
    pub name:       String,
    pub ext:        String,
}

pub const EMBEDDED_URI_PREFIX: &str = "embeded://";

impl Asset {
    /// Archive path for an `embeded://` URI.
    pub fn embedded_path(&self) -> Option<&str> {
        self.uri.strip_prefix(EMBEDDED_URI_PREFIX)
    }
}

// ── V2 ───────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CharacterCardV2 {
    #[serde(default = "spec_v2")]
    pub spec:         String,
    #[serde(default = "spec_version_v2")]
    pub spec_version: String,
    #[serde(default)]
    pub data:         CharacterDataV2,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CharacterDataV2 {
    pub name:                      String,
    pub description:               String,
    pub personality:               String,
    pub scenario:                  String,
    pub first_mes:                 String,
    pub mes_example:               String,
    pub creator_notes:             String,
    pub system_prompt:             String,
    pub post_history_instructions: String,
    pub alternate_greetings:       Vec<String>,
    pub tags:                      Vec<String>,
    pub creator:                   String,
    pub character_version:         String,
    pub extensions:                Extensions,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub character_book:            Option<Lorebook>,
}

// ── V1 ───────────────────────────────────────────────────────────────────────

/// Bare V1 object: no `spec` wrapper.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CharacterCardV1 {
    pub name:        String,
    pub description: String,
    pub personality: String,
    pub scenario:    String,
    pub first_mes:   String,
    pub mes_example: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_defaults_fill_everything() {
        let card: CharacterCard = serde_json::from_value(json!({
            "spec": "chara_card_v3",
            "spec_version": "3.0",
            "data": { "name": "Aria" }
        }))
        .unwrap();
        assert_eq!(card.data.name, "Aria");
        assert_eq!(card.data.description, "");
        assert!(card.data.tags.is_empty());
        assert!(card.data.extensions.is_empty());
        assert!(card.data.group_only_greetings.is_empty());
        assert!(card.data.character_book.is_none());
    }

    #[test]
    fn test_optional_fields_not_serialized_when_absent() {
        let value = serde_json::to_value(CharacterCard::default()).unwrap();
        let data = value["data"].as_object().unwrap();
        assert!(!data.contains_key("assets"));
        assert!(!data.contains_key("nickname"));
        assert!(data.contains_key("group_only_greetings"));
        assert_eq!(value["spec"], "chara_card_v3");
    }

    #[test]
    fn test_asset_type_field_name() {
        let asset = Asset {
            asset_type: "icon".into(),
            uri: "embeded://assets/icon/main.png".into(),
            name: "main".into(),
            ext: "png".into(),
        };
        let value = serde_json::to_value(&asset).unwrap();
        assert_eq!(value["type"], "icon");
        assert_eq!(asset.embedded_path(), Some("assets/icon/main.png"));
    }

    #[test]
    fn test_with_assets_leaves_original() {
        let card = CharacterCard::default();
        let updated = card.with_assets(vec![Asset::default()]);
        assert!(card.data.assets.is_none());
        assert_eq!(updated.data.assets.unwrap().len(), 1);
    }
}
