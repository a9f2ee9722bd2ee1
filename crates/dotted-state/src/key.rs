//! Dotted key parsing and value gates
//!
//! A dotted key is `id[.sub.sub...]`. The first segment names a record, the
//! rest (if any) is a sub-path into that record's document. `.` is the only
//! separator and there is no escaping.

use serde::{Deserialize, Serialize};
use serde_json::{Number, Value};

/// Separator between key segments.
pub const SEPARATOR: char = '.';

/// A dotted key split into the record ID and the optional sub-path.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DottedKey {
    /// First segment of the key
    pub id: Option<String>,
    /// Remaining segments rejoined with `.`, `None` for single-segment keys
    pub subpath: Option<String>,
}

impl DottedKey {
    /// Sub-path segments, or `None` when there is nothing to traverse.
    ///
    /// A key with a trailing separator (`"a."`) parses to an empty sub-path,
    /// which addresses the whole document just like a missing one.
    pub fn segments(&self) -> Option<Vec<&str>> {
        match self.subpath.as_deref() {
            Some(path) if !path.is_empty() => Some(path.split(SEPARATOR).collect()),
            _ => None,
        }
    }

    /// Whether the key addresses a location inside the document.
    pub fn has_subpath(&self) -> bool {
        self.segments().is_some()
    }
}

/// True iff `value` can be used as a key.
pub fn is_key(value: &Value) -> bool {
    value.is_string()
}

/// True iff `value` is defined.
///
/// `null` and `0` are storable; a missing value is not. A `Value` never holds
/// `±∞` or NaN: floats are rejected on the way in by [`finite_number`].
pub fn is_value(value: Option<&Value>) -> bool {
    value.is_some()
}

/// Convert a float into a document value, rejecting `±∞` and NaN.
pub fn finite_number(value: f64) -> Option<Value> {
    Number::from_f64(value).map(Value::Number)
}

/// Split a dotted key into its record ID and sub-path.
pub fn parse_key(key: Option<&str>) -> DottedKey {
    let Some(key) = key else {
        return DottedKey::default();
    };

    match key.split_once(SEPARATOR) {
        Some((id, rest)) => DottedKey {
            id: Some(id.to_string()),
            subpath: Some(rest.to_string()),
        },
        None => DottedKey {
            id: Some(key.to_string()),
            subpath: None,
        },
    }
}
