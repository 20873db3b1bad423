use serde::{Deserialize, Serialize};

use super::Extensions;
use crate::decorator::{parse_decorators, serialize_decorators, Decorator};

pub const SPEC_LOREBOOK_V3: &str = "lorebook_v3";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Lorebook {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name:               Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description:        Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scan_depth:         Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_budget:       Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recursive_scanning: Option<bool>,
    #[serde(default)]
    pub extensions:         Extensions,
    #[serde(default)]
    pub entries:            Vec<LorebookEntry>,
}

/// `{"spec": "lorebook_v3", "data": {...}}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandaloneLorebook {
    pub spec: String,
    pub data: Lorebook,
}

impl StandaloneLorebook {
    pub fn new(data: Lorebook) -> Self {
        Self { spec: SPEC_LOREBOOK_V3.to_owned(), data }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EntryId {
    Number(i64),
    Text(String),
}

fn enabled_default() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LorebookEntry {
    #[serde(default)]
    pub keys:            Vec<String>,
    /// Body text.  Holds no leading `@@` lines once decorators are parsed.
    #[serde(default)]
    pub content:         String,
    #[serde(default = "enabled_default")]
    pub enabled:         bool,
    #[serde(default)]
    pub insertion_order: i64,
    #[serde(default)]
    pub use_regex:       bool,
    #[serde(default)]
    pub extensions:      Extensions,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id:             Option<EntryId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name:           Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment:        Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority:       Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub case_sensitive: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selective:      Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secondary_keys: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub constant:       Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position:       Option<String>,

    /// Set only when decorator parsing was requested on read.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub decorators:     Option<Vec<Decorator>>,
}

impl Default for LorebookEntry {
    fn default() -> Self {
        Self {
            keys:            Vec::new(),
            content:         String::new(),
            enabled:         true,
            insertion_order: 0,
            use_regex:       false,
            extensions:      Extensions::new(),
            id:              None,
            name:            None,
            comment:         None,
            priority:        None,
            case_sensitive:  None,
            selective:       None,
            secondary_keys:  None,
            constant:        None,
            position:        None,
            decorators:      None,
        }
    }
}

impl LorebookEntry {
    /// Move leading `@@` lines out of `content` into `decorators`.  When the
    /// content carries none, any decorators already on the entry are kept.
    pub fn with_parsed_decorators(mut self) -> Self {
        let parsed = parse_decorators(&self.content);
        if parsed.decorators.is_empty() {
            return self;
        }
        self.content = parsed.content;
        self.decorators = Some(parsed.decorators);
        self
    }

    /// Fold `decorators` back into `content` as `@@` lines.  Entries with no
    /// decorators are returned unchanged.
    pub fn with_serialized_decorators(mut self) -> Self {
        match self.decorators.take() {
            Some(decorators) if !decorators.is_empty() => {
                self.content = serialize_decorators(&decorators, &self.content);
            }
            other => self.decorators = other,
        }
        self
    }
}

impl Lorebook {
    pub fn with_parsed_decorators(mut self) -> Self {
        self.entries = self.entries.into_iter().map(LorebookEntry::with_parsed_decorators).collect();
        self
    }

    pub fn with_serialized_decorators(mut self) -> Self {
        self.entries = self.entries.into_iter().map(LorebookEntry::with_serialized_decorators).collect();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn entry(content: &str) -> LorebookEntry {
        LorebookEntry { keys: vec!["k".into()], content: content.into(), ..Default::default() }
    }

    #[test]
    fn test_parse_then_serialize() {
        let parsed = entry("@@depth 4\nBody").with_parsed_decorators();
        assert_eq!(parsed.content, "Body");
        assert_eq!(parsed.decorators, Some(vec![Decorator::Depth { value: 4 }]));

        let back = parsed.with_serialized_decorators();
        assert_eq!(back.content, "@@depth 4\nBody");
        assert!(back.decorators.is_none());
    }

    #[test]
    fn test_serialize_keeps_empty_list() {
        let e = LorebookEntry { decorators: Some(Vec::new()), ..entry("Body") };
        let back = e.clone().with_serialized_decorators();
        assert_eq!(back, e);
    }

    #[test]
    fn test_parse_without_decorator_lines_keeps_entry() {
        let plain = entry("Body").with_parsed_decorators();
        assert_eq!(plain, entry("Body"));

        let tagged = LorebookEntry { decorators: Some(vec![Decorator::Activate]), ..entry("Body") };
        assert_eq!(tagged.clone().with_parsed_decorators(), tagged);
    }

    #[test]
    fn test_entry_defaults() {
        let e: LorebookEntry = serde_json::from_value(json!({"keys": ["a"], "content": "x"})).unwrap();
        assert!(e.enabled);
        assert_eq!(e.insertion_order, 0);
        assert!(!e.use_regex);
        assert!(e.decorators.is_none());
    }

    #[test]
    fn test_entry_id_shapes() {
        let e: LorebookEntry = serde_json::from_value(json!({"id": 3})).unwrap();
        assert_eq!(e.id, Some(EntryId::Number(3)));
        let e: LorebookEntry = serde_json::from_value(json!({"id": "abc"})).unwrap();
        assert_eq!(e.id, Some(EntryId::Text("abc".into())));
    }
}
