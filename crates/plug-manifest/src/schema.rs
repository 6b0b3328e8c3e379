//! Schema validation for untrusted registry metadata.
//!
//! Third-party registries return arbitrary JSON; nothing about a search hit
//! guarantees the per-version object even resembles a plugin manifest. This
//! module checks a decoded [`serde_json::Value`] against a declared shape and
//! reports failures with the dotted field path, the expected type, and a JSON
//! rendering of what was actually found.

use serde_json::Value;

use crate::error::{Error, Result};

/// Expected type for a single field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    String,
    /// Array whose elements are all strings.
    StringArray,
    /// Object whose values are all strings.
    StringMap,
}

impl FieldKind {
    fn name(self) -> &'static str {
        match self {
            Self::String => "string",
            Self::StringArray => "array of strings",
            Self::StringMap => "object of strings",
        }
    }

    fn matches(self, value: &Value) -> bool {
        match self {
            Self::String => value.is_string(),
            Self::StringArray => match value.as_array() {
                Some(items) => items.iter().all(Value::is_string),
                None => false,
            },
            Self::StringMap => match value.as_object() {
                Some(map) => map.values().all(Value::is_string),
                None => false,
            },
        }
    }
}

/// One field in a schema. `path` is dotted for nested fields
/// (e.g. `engines.hostVersion`).
#[derive(Debug, Clone, Copy)]
pub struct FieldSpec {
    pub path: &'static str,
    pub kind: FieldKind,
}

/// A declared shape: fields that must be present with the right type, and
/// fields that are only type-checked when present.
#[derive(Debug, Clone, Copy)]
pub struct Schema {
    pub required: &'static [FieldSpec],
    pub optional: &'static [FieldSpec],
}

impl Schema {
    /// Check `value` against this schema.
    ///
    /// Returns the first violation as [`Error::TypeMismatch`]. Passing does
    /// not imply the object contains nothing else; unknown fields are
    /// ignored so registries can carry arbitrary extra metadata.
    pub fn check(&self, value: &Value) -> Result<()> {
        if !value.is_object() {
            return Err(Error::TypeMismatch {
                path: String::new(),
                expected: "object",
                actual: render(Some(value)),
            });
        }
        for field in self.required {
            match lookup(value, field.path) {
                Some(found) if field.kind.matches(found) => {}
                found => {
                    return Err(Error::TypeMismatch {
                        path: field.path.to_string(),
                        expected: field.kind.name(),
                        actual: render(found),
                    });
                }
            }
        }
        for field in self.optional {
            if let Some(found) = lookup(value, field.path) {
                if !field.kind.matches(found) {
                    return Err(Error::TypeMismatch {
                        path: field.path.to_string(),
                        expected: field.kind.name(),
                        actual: render(Some(found)),
                    });
                }
            }
        }
        Ok(())
    }
}

/// Follow a dotted path into nested objects.
fn lookup<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    let mut current = value;
    for segment in path.split('.') {
        current = current.as_object()?.get(segment)?;
    }
    Some(current)
}

const RENDER_LIMIT: usize = 120;

/// JSON-ish rendering of a value for error messages; `undefined` for a
/// missing field, truncated so a huge blob cannot flood the message.
fn render(value: Option<&Value>) -> String {
    let Some(value) = value else {
        return "undefined".to_string();
    };
    let mut text = value.to_string();
    if text.len() > RENDER_LIMIT {
        let cut = (0..=RENDER_LIMIT).rev().find(|i| text.is_char_boundary(*i));
        text.truncate(cut.unwrap_or(0));
        text.push('…');
    }
    text
}
