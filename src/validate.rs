//! Structural validation of untyped card and lorebook JSON.
//!
//! Validation never fails; every problem found is collected into a
//! [`ValidationResult`].  Permissive mode checks field presence and types;
//! strict mode also rejects empty required strings, unknown extension keys,
//! unsupported asset URI schemes and malformed decorators.

use serde_json::{Map, Value};

use crate::card::SPEC_V3;
use crate::decorator::Decorator;
use crate::error::{CardError, Result, ValidationError};

const REQUIRED_STRINGS: [&str; 6] = ["name", "description", "personality", "scenario", "first_mes", "mes_example"];

const OPTIONAL_STRINGS: [&str; 5] =
    ["creator_notes", "system_prompt", "post_history_instructions", "creator", "character_version"];

const ARRAY_FIELDS: [&str; 3] = ["alternate_greetings", "tags", "group_only_greetings"];

/// Extension keys accepted in strict mode besides any `v3_` key.
const KNOWN_EXTENSIONS: [&str; 3] = ["depth", "talkativeness", "fav"];

const URI_SCHEMES: [&str; 5] = ["http://", "https://", "data:", "embeded://", "ccdefault:"];

#[derive(Debug, Clone, Default)]
pub struct ValidateOptions {
    pub strict: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationResult {
    pub valid:  bool,
    pub errors: Vec<ValidationError>,
}

impl ValidationResult {
    fn from_errors(errors: Vec<ValidationError>) -> Self {
        Self { valid: errors.is_empty(), errors }
    }

    /// `Err` carrying the first error, for callers that want `?`.
    pub fn into_result(self) -> Result<()> {
        match self.errors.into_iter().next() {
            Some(err) => Err(CardError::Validation(err)),
            None => Ok(()),
        }
    }
}

/// JSON type name as reported in messages.
fn type_name(value: Option<&Value>) -> &'static str {
    match value {
        None                    => "missing",
        Some(Value::Null)       => "null",
        Some(Value::Bool(_))    => "boolean",
        Some(Value::Number(_))  => "number",
        Some(Value::String(_))  => "string",
        Some(Value::Array(_))   => "array",
        Some(Value::Object(_))  => "object",
    }
}

fn expected(field: String, kind: &str, got: Option<&Value>) -> ValidationError {
    ValidationError::new(field, format!("expected {kind}, got {}", type_name(got)))
}

// ── Cards ────────────────────────────────────────────────────────────────────

pub fn validate_card(card: &Value, opts: &ValidateOptions) -> ValidationResult {
    let Some(card) = card.as_object() else {
        return ValidationResult::from_errors(vec![ValidationError::new("card", "must be an object")]);
    };

    let mut errors = Vec::new();
    if card.get("spec").and_then(Value::as_str) != Some(SPEC_V3) {
        errors.push(ValidationError::new("spec", format!("expected {SPEC_V3:?}")));
    }
    let Some(data) = card.get("data").and_then(Value::as_object) else {
        errors.push(ValidationError::new("data", "missing or invalid data object"));
        return ValidationResult::from_errors(errors);
    };

    for field in REQUIRED_STRINGS {
        match data.get(field) {
            Some(Value::String(s)) => {
                if opts.strict && s.trim().is_empty() {
                    errors.push(ValidationError::new(format!("data.{field}"), "required string is empty"));
                }
            }
            other => errors.push(expected(format!("data.{field}"), "string", other)),
        }
    }
    for field in OPTIONAL_STRINGS {
        if let Some(v) = data.get(field).filter(|v| !v.is_string()) {
            errors.push(expected(format!("data.{field}"), "string", Some(v)));
        }
    }
    for field in ARRAY_FIELDS {
        if let Some(v) = data.get(field).filter(|v| !v.is_array()) {
            errors.push(expected(format!("data.{field}"), "array", Some(v)));
        }
    }
    if let Some(v) = data.get("extensions").filter(|v| !v.is_object()) {
        errors.push(expected("data.extensions".into(), "object", Some(v)));
    }

    if opts.strict {
        strict_card_checks(data, &mut errors);
    }
    ValidationResult::from_errors(errors)
}

fn strict_card_checks(data: &Map<String, Value>, errors: &mut Vec<ValidationError>) {
    if let Some(extensions) = data.get("extensions").and_then(Value::as_object) {
        for key in extensions.keys() {
            if !KNOWN_EXTENSIONS.contains(&key.as_str()) && !key.starts_with("v3_") {
                errors.push(ValidationError::new(format!("data.extensions.{key}"), "unknown extension key"));
            }
        }
    }

    if let Some(assets) = data.get("assets").and_then(Value::as_array) {
        for (i, asset) in assets.iter().enumerate() {
            let Some(uri) = asset.get("uri").and_then(Value::as_str).filter(|u| !u.is_empty()) else {
                continue;
            };
            if !URI_SCHEMES.iter().any(|scheme| uri.starts_with(scheme)) {
                errors.push(ValidationError::new(format!("data.assets[{i}].uri"), "invalid URI format"));
            }
        }
    }

    let entries = data
        .get("character_book")
        .and_then(|book| book.get("entries"))
        .and_then(Value::as_array);
    for (i, entry) in entries.into_iter().flatten().enumerate() {
        check_decorators(entry.get("decorators"), &format!("data.character_book.entries[{i}]"), errors);
    }
}

/// Every item of an entry's `decorators` must deserialize to a known decorator.
fn check_decorators(decorators: Option<&Value>, path: &str, errors: &mut Vec<ValidationError>) {
    let Some(decorators) = decorators.and_then(Value::as_array) else {
        return;
    };
    for decorator in decorators {
        if serde_json::from_value::<Decorator>(decorator.clone()).is_err() {
            errors.push(ValidationError::new(format!("{path}.decorators"), "invalid decorator"));
        }
    }
}

// ── Lorebooks ────────────────────────────────────────────────────────────────

pub fn validate_lorebook(lorebook: &Value, opts: &ValidateOptions) -> ValidationResult {
    let Some(book) = lorebook.as_object() else {
        return ValidationResult::from_errors(vec![ValidationError::new("lorebook", "must be an object")]);
    };
    let Some(entries) = book.get("entries").and_then(Value::as_array) else {
        return ValidationResult::from_errors(vec![ValidationError::new("entries", "expected array")]);
    };

    let mut errors = Vec::new();
    for (i, entry) in entries.iter().enumerate() {
        let Some(entry) = entry.as_object() else {
            errors.push(ValidationError::new(format!("entries[{i}]"), "must be an object"));
            continue;
        };
        let checks: [(&str, &str, fn(&Value) -> bool); 5] = [
            ("keys", "array", Value::is_array),
            ("content", "string", Value::is_string),
            ("enabled", "boolean", Value::is_boolean),
            ("insertion_order", "number", Value::is_number),
            ("use_regex", "boolean", Value::is_boolean),
        ];
        for (field, kind, ok) in checks {
            let value = entry.get(field);
            if !value.is_some_and(ok) {
                errors.push(expected(format!("entries[{i}].{field}"), kind, value));
            }
        }
        if opts.strict {
            check_decorators(entry.get("decorators"), &format!("entries[{i}]"), &mut errors);
        }
    }

    let optional: [(&str, &str, fn(&Value) -> bool); 6] = [
        ("name", "string", Value::is_string),
        ("description", "string", Value::is_string),
        ("scan_depth", "number", Value::is_number),
        ("token_budget", "number", Value::is_number),
        ("recursive_scanning", "boolean", Value::is_boolean),
        ("extensions", "object", Value::is_object),
    ];
    for (field, kind, ok) in optional {
        if let Some(v) = book.get(field).filter(|v| !ok(v)) {
            errors.push(expected(field.to_owned(), kind, Some(v)));
        }
    }

    ValidationResult::from_errors(errors)
}
