//! Dot-path traversal and mutation over the generic tree.
//!
//! Three traversal policies share one walk and diverge only on the "missing
//! key" case: [`get_path`] fails, [`get_path_or`] falls back, and
//! [`contains_path`] answers `false`. Traversing *through* a scalar is a
//! shape mismatch and fails under every policy, including the forgiving ones.

use crate::error::{ConfigError, Result};
use crate::value::type_name;
use serde_json::{Map, Value};

/// Split a dot-path into segments, discarding empties.
///
/// `"a..b"`, a leading dot, and a trailing dot all collapse harmlessly; an
/// empty path yields no segments and denotes the tree root.
pub fn split_path(path: &str) -> Vec<&str> {
    path.split('.').filter(|s| !s.is_empty()).collect()
}

/// Parse a segment as an array index: all digits, no leading zeros.
fn array_index(segment: &str) -> Option<usize> {
    if segment.is_empty() {
        return None;
    }
    if segment.len() > 1 && segment.starts_with('0') {
        return None;
    }
    if !segment.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    segment.parse().ok()
}

/// Strict lookup. Never returns a value for a path that does not fully
/// resolve.
pub fn get_path<'a>(tree: &'a Value, path: &str) -> Result<&'a Value> {
    let mut current = tree;
    for segment in split_path(path) {
        current = match current {
            Value::Object(map) => map
                .get(segment)
                .ok_or_else(|| ConfigError::key_not_found(path, segment))?,
            Value::Array(items) => {
                let idx = array_index(segment).ok_or_else(|| {
                    ConfigError::key_not_found(path, format!("{segment} (not a valid array index)"))
                })?;
                items.get(idx).ok_or_else(|| {
                    ConfigError::key_not_found(path, format!("{segment} (index out of range)"))
                })?
            }
            other => {
                return Err(ConfigError::wrong_type(
                    path,
                    "object or array",
                    type_name(other),
                ));
            }
        };
    }
    Ok(current)
}

/// Defaulted lookup: a missing key or out-of-range index yields `fallback`.
///
/// A shape mismatch still fails; absence and malformation are different
/// conditions and the fallback only covers the former.
pub fn get_path_or<'a>(tree: &'a Value, path: &str, fallback: &'a Value) -> Result<&'a Value> {
    let mut current = tree;
    for segment in split_path(path) {
        current = match current {
            Value::Object(map) => match map.get(segment) {
                Some(child) => child,
                None => return Ok(fallback),
            },
            Value::Array(items) => match array_index(segment).and_then(|idx| items.get(idx)) {
                Some(child) => child,
                None => return Ok(fallback),
            },
            other => {
                return Err(ConfigError::wrong_type(
                    path,
                    "object or array",
                    type_name(other),
                ));
            }
        };
    }
    Ok(current)
}

/// Existence check with the same walk as [`get_path`], answering `false` for
/// absence but still failing on a shape mismatch.
pub fn contains_path(tree: &Value, path: &str) -> Result<bool> {
    let mut current = tree;
    for segment in split_path(path) {
        current = match current {
            Value::Object(map) => match map.get(segment) {
                Some(child) => child,
                None => return Ok(false),
            },
            Value::Array(items) => match array_index(segment).and_then(|idx| items.get(idx)) {
                Some(child) => child,
                None => return Ok(false),
            },
            other => {
                return Err(ConfigError::wrong_type(
                    path,
                    "object or array",
                    type_name(other),
                ));
            }
        };
    }
    Ok(true)
}

fn ensure_object<'a>(
    node: &'a mut Value,
    path: &str,
    create_missing: bool,
) -> Result<&'a mut Map<String, Value>> {
    if !node.is_object() {
        if !create_missing {
            return Err(ConfigError::wrong_type(path, "object", type_name(node)));
        }
        // A scalar in the way of a deeper path is destroyed.
        *node = Value::Object(Map::new());
    }
    match node {
        Value::Object(map) => Ok(map),
        _ => unreachable!("node was just replaced with an object"),
    }
}

/// Write `value` at `path`, creating intermediate objects when
/// `create_missing` is set.
///
/// Intermediates must be objects; with `create_missing` a non-object in the
/// way is overwritten with a fresh empty object. An empty path replaces the
/// entire root.
pub fn set_path(tree: &mut Value, path: &str, value: Value, create_missing: bool) -> Result<()> {
    let segments = split_path(path);
    let Some((last, intermediate)) = segments.split_last() else {
        *tree = value;
        return Ok(());
    };

    let mut current = tree;
    for segment in intermediate {
        let map = ensure_object(current, path, create_missing)?;
        if !map.contains_key(*segment) {
            if !create_missing {
                return Err(ConfigError::key_not_found(path, *segment));
            }
        }
        current = map
            .entry((*segment).to_string())
            .or_insert_with(|| Value::Object(Map::new()));
    }

    let map = ensure_object(current, path, create_missing)?;
    map.insert((*last).to_string(), value);
    Ok(())
}
