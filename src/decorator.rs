//! `@@directive` lines at the head of lorebook entry text.
//!
//! ```text
//! @@depth 4
//! @@role system
//! @@additional_keys dragon, wyrm
//! Entry body starts at the first line that is not a directive.
//! ```
//!
//! Known directive names map to typed [`Decorator`] variants.  Anything else,
//! and any known name whose value does not parse into its payload type, is
//! kept as [`Decorator::Unknown`] so that serialization reproduces the line.

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Assistant,
    System,
    User,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Assistant => "assistant",
            Role::System    => "system",
            Role::User      => "user",
        }
    }

    pub fn from_name(s: &str) -> Option<Self> {
        match s {
            "assistant" => Some(Role::Assistant),
            "system"    => Some(Role::System),
            "user"      => Some(Role::User),
            _           => None,
        }
    }
}

/// One parsed directive.  Serialized as `{"type": "<name>", "value": ...}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Decorator {
    // Activation
    Activate,
    DontActivate,
    ActivateOnlyAfter { value: i64 },
    ActivateOnlyEvery { value: i64 },
    KeepActivateAfterMatch,
    DontActivateAfterMatch,
    // Position
    Depth { value: i64 },
    InstructDepth { value: i64 },
    ReverseDepth { value: i64 },
    Position { value: String },
    Role { value: Role },
    // Scanning
    ScanDepth { value: i64 },
    InstructScanDepth { value: i64 },
    IsGreeting { value: i64 },
    // Matching
    AdditionalKeys { value: Vec<String> },
    ExcludeKeys { value: Vec<String> },
    IsUserIcon { value: String },
    // UI
    IgnoreOnMaxContext,
    DisableUiPrompt { value: String },

    Unknown {
        name:  String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        value: Option<String>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ParsedDecorators {
    pub decorators: Vec<Decorator>,
    pub content:    String,
}

/// Integer prefix parse: optional leading whitespace and sign, then base-10
/// digits, stopping at the first non-digit.  No digits means no value.
pub fn parse_int(s: &str) -> Option<i64> {
    let s = s.trim_start();
    let (negative, rest) = match s.as_bytes().first() {
        Some(b'-') => (true, &s[1..]),
        Some(b'+') => (false, &s[1..]),
        _          => (false, s),
    };
    let digits = rest.bytes().take_while(u8::is_ascii_digit).count();
    if digits == 0 {
        return None;
    }
    let magnitude: i64 = rest[..digits].parse().ok()?;
    Some(if negative { -magnitude } else { magnitude })
}

/// An empty payload is an empty list, not one empty key.
fn split_keys(value: &str) -> Vec<String> {
    if value.trim().is_empty() {
        return Vec::new();
    }
    value.split(',').map(|k| k.trim().to_owned()).collect()
}

fn write_keys(f: &mut fmt::Formatter<'_>, name: &str, keys: &[String]) -> fmt::Result {
    if keys.is_empty() {
        write!(f, "@@{name}")
    } else {
        write!(f, "@@{name} {}", keys.join(","))
    }
}

/// Parse a single trimmed `@@` line.  Returns `None` for a bare `@@`.
fn parse_line(line: &str) -> Option<Decorator> {
    let body = line.strip_prefix("@@")?.trim();
    let (name, value) = match body.find(char::is_whitespace) {
        Some(idx) => (&body[..idx], body[idx..].trim_start()),
        None      => (body, ""),
    };
    if name.is_empty() {
        return None;
    }

    let int = |build: fn(i64) -> Decorator| parse_int(value).map(build);
    let typed = match name {
        "activate"                  => Some(Decorator::Activate),
        "dont_activate"             => Some(Decorator::DontActivate),
        "activate_only_after"       => int(|value| Decorator::ActivateOnlyAfter { value }),
        "activate_only_every"       => int(|value| Decorator::ActivateOnlyEvery { value }),
        "keep_activate_after_match" => Some(Decorator::KeepActivateAfterMatch),
        "dont_activate_after_match" => Some(Decorator::DontActivateAfterMatch),
        "depth"                     => int(|value| Decorator::Depth { value }),
        "instruct_depth"            => int(|value| Decorator::InstructDepth { value }),
        "reverse_depth"             => int(|value| Decorator::ReverseDepth { value }),
        "position"                  => Some(Decorator::Position { value: value.to_owned() }),
        "role"                      => Role::from_name(value).map(|value| Decorator::Role { value }),
        "scan_depth"                => int(|value| Decorator::ScanDepth { value }),
        "instruct_scan_depth"       => int(|value| Decorator::InstructScanDepth { value }),
        "is_greeting"               => int(|value| Decorator::IsGreeting { value }),
        "additional_keys"           => Some(Decorator::AdditionalKeys { value: split_keys(value) }),
        "exclude_keys"              => Some(Decorator::ExcludeKeys { value: split_keys(value) }),
        "is_user_icon"              => Some(Decorator::IsUserIcon { value: value.to_owned() }),
        "ignore_on_max_context"     => Some(Decorator::IgnoreOnMaxContext),
        "disable_ui_prompt"         => Some(Decorator::DisableUiPrompt { value: value.to_owned() }),
        _                           => None,
    };

    Some(typed.unwrap_or_else(|| Decorator::Unknown {
        name:  name.to_owned(),
        value: (!value.is_empty()).then(|| value.to_owned()),
    }))
}

/// Split leading `@@` lines from the body.  The body is every remaining line
/// re-joined with `\n`, untouched.
pub fn parse_decorators(text: &str) -> ParsedDecorators {
    let lines: Vec<&str> = text.split('\n').collect();
    let mut decorators = Vec::new();
    let mut body_start = lines.len();

    for (i, line) in lines.iter().enumerate() {
        let line = line.trim();
        if !line.starts_with("@@") {
            body_start = i;
            break;
        }
        decorators.extend(parse_line(line));
    }

    ParsedDecorators { decorators, content: lines[body_start..].join("\n") }
}

impl fmt::Display for Decorator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Decorator::Activate                       => write!(f, "@@activate"),
            Decorator::DontActivate                   => write!(f, "@@dont_activate"),
            Decorator::ActivateOnlyAfter { value }    => write!(f, "@@activate_only_after {value}"),
            Decorator::ActivateOnlyEvery { value }    => write!(f, "@@activate_only_every {value}"),
            Decorator::KeepActivateAfterMatch         => write!(f, "@@keep_activate_after_match"),
            Decorator::DontActivateAfterMatch         => write!(f, "@@dont_activate_after_match"),
            Decorator::Depth { value }                => write!(f, "@@depth {value}"),
            Decorator::InstructDepth { value }        => write!(f, "@@instruct_depth {value}"),
            Decorator::ReverseDepth { value }         => write!(f, "@@reverse_depth {value}"),
            Decorator::Position { value }             => write!(f, "@@position {value}"),
            Decorator::Role { value }                 => write!(f, "@@role {}", value.as_str()),
            Decorator::ScanDepth { value }            => write!(f, "@@scan_depth {value}"),
            Decorator::InstructScanDepth { value }    => write!(f, "@@instruct_scan_depth {value}"),
            Decorator::IsGreeting { value }           => write!(f, "@@is_greeting {value}"),
            Decorator::AdditionalKeys { value }       => write_keys(f, "additional_keys", value),
            Decorator::ExcludeKeys { value }          => write_keys(f, "exclude_keys", value),
            Decorator::IsUserIcon { value }           => write!(f, "@@is_user_icon {value}"),
            Decorator::IgnoreOnMaxContext             => write!(f, "@@ignore_on_max_context"),
            Decorator::DisableUiPrompt { value }      => write!(f, "@@disable_ui_prompt {value}"),
            Decorator::Unknown { name, value: None }  => write!(f, "@@{name}"),
            Decorator::Unknown { name, value: Some(v) } => write!(f, "@@{name} {v}"),
        }
    }
}

/// Render decorators as `@@` lines followed by `content`.  With no
/// decorators the content is returned as is.
pub fn serialize_decorators(decorators: &[Decorator], content: &str) -> String {
    if decorators.is_empty() {
        return content.to_owned();
    }
    let mut lines: Vec<String> = decorators.iter().map(Decorator::to_string).collect();
    lines.push(content.to_owned());
    lines.join("\n")
}
