//! Precedence-ordered deep merge of configuration trees.
//!
//! Objects merge recursively; any other pairing is replaced wholesale by the
//! incoming side. A `Null` incoming value preserves the base — null means
//! "not specified", not "erase".

use serde_json::{Map, Value};

/// Deep merge two trees, with `incoming` taking precedence over `base`.
///
/// - Objects are merged recursively: keys only in one side survive, keys in
///   both are merged
/// - Arrays, strings, numbers, booleans are replaced entirely
/// - If `incoming` is null, the base value is preserved
pub fn deep_merge(base: Value, incoming: Value) -> Value {
    match (base, incoming) {
        (base, Value::Null) => base,
        (Value::Null, incoming) => incoming,
        (Value::Object(mut base_map), Value::Object(incoming_map)) => {
            for (key, incoming_value) in incoming_map {
                let merged = match base_map.remove(&key) {
                    Some(base_value) => deep_merge(base_value, incoming_value),
                    None => incoming_value,
                };
                base_map.insert(key, merged);
            }
            Value::Object(base_map)
        }
        (_, incoming) => incoming,
    }
}

/// Merge an ordered sequence of trees, later sources winning on conflict.
///
/// The first element seeds the fold; an empty sequence yields an empty
/// object.
pub fn deep_merge_all(sources: impl IntoIterator<Item = Value>) -> Value {
    let mut iter = sources.into_iter();
    let Some(first) = iter.next() else {
        return Value::Object(Map::new());
    };
    iter.fold(first, deep_merge)
}
