//! Path resolution over in-memory documents
//!
//! Everything here is pure: functions take caller-owned documents and never
//! touch the store. The client layer fetches a record by ID, applies these
//! functions to its `data`, and writes it back.
//!
//! Paths walk objects by key and arrays by decimal index (`"items.0.name"`).

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::StateError;
use crate::key::{parse_key, SEPARATOR};
use crate::schema::Record;
use crate::Result;

/// Most `null` slots a single write may pad an array with.
pub const MAX_ARRAY_GAP: usize = 1 << 16;

/// Options accepted by [`sort`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortOptions {
    /// Dotted path inside each record's `data`, optionally prefixed with `.`
    pub sort: Option<String>,
}

impl SortOptions {
    /// Sort by the value at `path`.
    pub fn by(path: impl Into<String>) -> Self {
        Self {
            sort: Some(path.into()),
        }
    }

    /// Normalized sort path: one leading `.` stripped, split into segments.
    pub fn sort_path(&self) -> Option<Vec<&str>> {
        let path = self.sort.as_deref().filter(|p| !p.is_empty())?;
        let path = path.strip_prefix(SEPARATOR).unwrap_or(path);
        Some(path.split(SEPARATOR).collect())
    }
}

/// Array index segments are canonical decimals: `0`, `7`, `42`, never `07`.
fn as_index(segment: &str) -> Option<usize> {
    let canonical = segment == "0"
        || (!segment.is_empty()
            && !segment.starts_with('0')
            && segment.bytes().all(|b| b.is_ascii_digit()));
    if canonical {
        segment.parse().ok()
    } else {
        None
    }
}

fn child<'a>(node: &'a Value, segment: &str) -> Option<&'a Value> {
    match node {
        Value::Object(map) => map.get(segment),
        Value::Array(items) => as_index(segment).and_then(|i| items.get(i)),
        _ => None,
    }
}

fn child_mut<'a>(node: &'a mut Value, segment: &str) -> Option<&'a mut Value> {
    match node {
        Value::Object(map) => map.get_mut(segment),
        Value::Array(items) => as_index(segment).and_then(move |i| items.get_mut(i)),
        _ => None,
    }
}

fn lookup<'a>(data: &'a Value, segments: &[&str]) -> Option<&'a Value> {
    segments
        .iter()
        .try_fold(data, |node, segment| child(node, segment))
}

/// Slot for `segment` inside `node`, creating it when missing.
///
/// A node that cannot hold `segment` is overwritten: with an array when the
/// segment is an index, with an object otherwise. Scalars are always
/// replaced this way; an existing array addressed by a non-index segment
/// becomes an object. Writing past the end of an array pads it with `null`.
fn entry<'a>(node: &'a mut Value, segment: &str) -> &'a mut Value {
    match (node, as_index(segment)) {
        (Value::Array(items), Some(index)) => {
            if items.len() <= index {
                items.resize(index + 1, Value::Null);
            }
            &mut items[index]
        }
        (Value::Object(map), _) => map.entry(segment).or_insert(Value::Null),
        (node, index) => {
            *node = match index {
                Some(_) => Value::Array(Vec::new()),
                None => Value::Object(Map::new()),
            };
            entry(node, segment)
        }
    }
}

fn can_write_into(root: &Value, first: &str) -> bool {
    match root {
        Value::Object(_) => true,
        Value::Array(_) => as_index(first).is_some(),
        _ => false,
    }
}

/// Walk the path the way [`entry`] would without writing, and refuse any
/// index that would pad an array by more than [`MAX_ARRAY_GAP`] slots.
fn within_growth_limit(data: &Value, segments: &[&str]) -> bool {
    let mut node = Some(data);
    for segment in segments {
        let len = match node {
            Some(Value::Object(_)) => None,
            Some(Value::Array(items)) => Some(items.len()),
            _ => Some(0),
        };
        if let (Some(len), Some(index)) = (len, as_index(segment)) {
            if index.saturating_sub(len) > MAX_ARRAY_GAP {
                return false;
            }
        }
        node = node.and_then(|n| child(n, segment));
    }
    true
}

/// Value at the key's sub-path, or the whole document when the key has none.
pub fn get_data<'a>(key: &str, data: &'a Value) -> Option<&'a Value> {
    let parsed = parse_key(Some(key));
    match parsed.segments() {
        Some(segments) => lookup(data, &segments),
        None => Some(data),
    }
}

/// Assign `value` at the key's sub-path, creating intermediate containers.
///
/// Keys without a sub-path leave `data` untouched; replacing the whole
/// document is up to the caller. The root type and array growth are checked
/// before anything is written, so a `Target` error leaves `data` exactly as
/// it was.
pub fn set_data(key: &str, data: &mut Value, value: Value) -> Result<()> {
    let parsed = parse_key(Some(key));
    let Some(segments) = parsed.segments() else {
        return Ok(());
    };
    let [first, ..] = segments.as_slice() else {
        return Ok(());
    };
    if !can_write_into(data, first) || !within_growth_limit(data, &segments) {
        return Err(StateError::Target {
            key: key.to_string(),
        });
    }

    let slot = segments
        .iter()
        .fold(data, |node, segment| entry(node, segment));
    *slot = value;
    Ok(())
}

/// Remove the value at the key's sub-path, returning it if it existed.
///
/// Array elements are nulled out rather than removed so sibling indices
/// keep addressing the same values. Keys without a sub-path leave `data`
/// untouched; deleting the record is up to the caller.
pub fn unset_data(key: &str, data: &mut Value) -> Result<Option<Value>> {
    let parsed = parse_key(Some(key));
    let Some(segments) = parsed.segments() else {
        return Ok(None);
    };
    if !(data.is_object() || data.is_array()) {
        return Err(StateError::Target {
            key: key.to_string(),
        });
    }
    let Some((last, parents)) = segments.split_last() else {
        return Ok(None);
    };

    let mut node = data;
    for segment in parents {
        let Some(next) = child_mut(node, segment) else {
            return Ok(None);
        };
        node = next;
    }

    let removed = match node {
        Value::Object(map) => map.remove(*last),
        Value::Array(items) => as_index(last)
            .and_then(|i| items.get_mut(i))
            .map(|slot| std::mem::replace(slot, Value::Null)),
        _ => None,
    };
    Ok(removed)
}

fn type_rank(value: Option<&Value>) -> u8 {
    match value {
        None => 0,
        Some(Value::Null) => 1,
        Some(Value::Bool(_)) => 2,
        Some(Value::Number(_)) => 3,
        Some(Value::String(_)) => 4,
        Some(Value::Array(_)) => 5,
        Some(Value::Object(_)) => 6,
    }
}

/// Ascending order used by [`sort`].
///
/// Missing < null < bool < number < string < array < object. Arrays and
/// objects compare equal to others of their kind.
pub fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (Some(Value::Bool(x)), Some(Value::Bool(y))) => x.cmp(y),
        (Some(Value::Number(x)), Some(Value::Number(y))) => {
            match (x.as_f64(), y.as_f64()) {
                (Some(x), Some(y)) => x.total_cmp(&y),
                _ => Ordering::Equal,
            }
        }
        (Some(Value::String(x)), Some(Value::String(y))) => x.cmp(y),
        _ => type_rank(a).cmp(&type_rank(b)),
    }
}

/// Records whose ID starts with `prefix`, optionally ordered by a data path.
///
/// With a sort path the matches are stable-sorted ascending and then
/// reversed, so the result is descending and ties come out in reverse
/// input order. Without one, input order is kept. An empty prefix matches
/// nothing.
pub fn sort(prefix: &str, records: &[Record], options: &SortOptions) -> Vec<Record> {
    if prefix.is_empty() {
        return Vec::new();
    }

    let mut matched: Vec<Record> = records
        .iter()
        .filter(|record| record.id.starts_with(prefix))
        .cloned()
        .collect();

    if let Some(path) = options.sort_path() {
        matched.sort_by(|a, b| compare_values(lookup(&a.data, &path), lookup(&b.data, &path)));
        matched.reverse();
    }

    matched
}
