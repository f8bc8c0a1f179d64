//! Helpers over the generic tree value.
//!
//! `serde_json::Value` is the universal in-memory representation for every
//! configuration source; these helpers add the type naming used in error
//! messages and the leaf flattening used by search and remapping.

use serde_json::Value;
use std::collections::BTreeMap;

/// Human-readable type name of a value, as used in traversal errors.
pub fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(n) => {
            if n.is_f64() {
                "float"
            } else {
                "integer"
            }
        }
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Flatten a tree into a map from dot-path to leaf value.
///
/// Only non-object nodes appear; arrays count as leaves. A scalar root maps
/// from the empty path.
pub fn flatten_leaves(tree: &Value) -> BTreeMap<String, Value> {
    let mut out = BTreeMap::new();
    flatten_into(tree, "", &mut out);
    out
}

fn flatten_into(node: &Value, prefix: &str, out: &mut BTreeMap<String, Value>) {
    match node {
        Value::Object(map) => {
            for (key, child) in map {
                let path = if prefix.is_empty() {
                    key.clone()
                } else {
                    format!("{prefix}.{key}")
                };
                flatten_into(child, &path, out);
            }
        }
        leaf => {
            out.insert(prefix.to_string(), leaf.clone());
        }
    }
}
