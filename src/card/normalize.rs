//! Card version detection and conversion to and from the canonical V3 shape.

use serde_json::Value;

use super::{
    CharacterCard, CharacterCardV1, CharacterCardV2, CharacterData, CharacterDataV2, Extensions, SPEC_V2,
    SPEC_V3, SPEC_VERSION_V2,
};
use crate::error::ParseError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CardVersion {
    V1,
    V2,
    V3,
    Unrecognized,
}

/// Classify a parsed JSON value by shape.  V1 has no `spec` and carries both
/// `name` and `description`.
pub fn detect_version(value: &Value) -> CardVersion {
    let Some(obj) = value.as_object() else {
        return CardVersion::Unrecognized;
    };
    match obj.get("spec").and_then(Value::as_str) {
        Some(SPEC_V3) => CardVersion::V3,
        Some(SPEC_V2) => CardVersion::V2,
        _ if !obj.contains_key("spec") && obj.contains_key("name") && obj.contains_key("description") => {
            CardVersion::V1
        }
        _ => CardVersion::Unrecognized,
    }
}

/// Convert any recognised card shape into a V3 card.  With
/// `parse_decorators` set, every lorebook entry has its `@@` lines split out.
pub fn normalize(value: Value, parse_decorators: bool) -> Result<CharacterCard, ParseError> {
    if !value.is_object() {
        return Err(ParseError::NotAnObject);
    }
    let card = match detect_version(&value) {
        CardVersion::V3 => serde_json::from_value::<CharacterCard>(value)?,
        CardVersion::V2 => serde_json::from_value::<CharacterCardV2>(value)?.into(),
        CardVersion::V1 => serde_json::from_value::<CharacterCardV1>(value)?.into(),
        CardVersion::Unrecognized => return Err(ParseError::UnrecognizedCard),
    };
    log::debug!("normalized card {:?}", card.data.name);

    Ok(if parse_decorators { card.map_lorebook(|book| book.with_parsed_decorators()) } else { card })
}

impl From<CharacterCardV1> for CharacterCard {
    fn from(v1: CharacterCardV1) -> Self {
        CharacterCard::new(CharacterData {
            name: v1.name,
            description: v1.description,
            personality: v1.personality,
            scenario: v1.scenario,
            first_mes: v1.first_mes,
            mes_example: v1.mes_example,
            ..CharacterData::default()
        })
    }
}

impl From<CharacterCardV2> for CharacterCard {
    fn from(v2: CharacterCardV2) -> Self {
        let d = v2.data;
        CharacterCard::new(CharacterData {
            name: d.name,
            description: d.description,
            personality: d.personality,
            scenario: d.scenario,
            first_mes: d.first_mes,
            mes_example: d.mes_example,
            creator_notes: d.creator_notes,
            system_prompt: d.system_prompt,
            post_history_instructions: d.post_history_instructions,
            alternate_greetings: d.alternate_greetings,
            tags: d.tags,
            creator: d.creator,
            character_version: d.character_version,
            extensions: d.extensions,
            character_book: d.character_book,
            ..CharacterData::default()
        })
    }
}

impl CharacterCard {
    /// Legacy V2 view of this card.  V3-only fields with no V2 home are kept
    /// under `v3_`-prefixed keys in `extensions`.
    pub fn to_v2(&self) -> CharacterCardV2 {
        let d = &self.data;
        let mut extensions: Extensions = d.extensions.clone();

        if let Some(nickname) = d.nickname.as_ref().filter(|n| !n.is_empty()) {
            extensions.insert("v3_nickname".into(), Value::String(nickname.clone()));
        }
        if !d.group_only_greetings.is_empty() {
            extensions.insert("v3_group_only_greetings".into(), Value::from(d.group_only_greetings.clone()));
        }
        if let Some(assets) = d.assets.as_ref().filter(|a| !a.is_empty()) {
            // Asset is a plain string struct; serializing it cannot fail.
            if let Ok(value) = serde_json::to_value(assets) {
                extensions.insert("v3_assets".into(), value);
            }
        }

        CharacterCardV2 {
            spec:         SPEC_V2.to_owned(),
            spec_version: SPEC_VERSION_V2.to_owned(),
            data:         CharacterDataV2 {
                name: d.name.clone(),
                description: d.description.clone(),
                personality: d.personality.clone(),
                scenario: d.scenario.clone(),
                first_mes: d.first_mes.clone(),
                mes_example: d.mes_example.clone(),
                creator_notes: d.creator_notes.clone(),
                system_prompt: d.system_prompt.clone(),
                post_history_instructions: d.post_history_instructions.clone(),
                alternate_greetings: d.alternate_greetings.clone(),
                tags: d.tags.clone(),
                creator: d.creator.clone(),
                character_version: d.character_version.clone(),
                extensions,
                character_book: d.character_book.clone(),
            },
        }
    }
}
