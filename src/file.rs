//! Configuration file loading and rendering.
//!
//! JSON and TOML files both load into the same `serde_json::Value` tree so
//! the rest of the engine never cares which format a file came from. TOML's
//! stricter data model forces a few conversions in each direction; those
//! rules live here and nowhere else.

use crate::error::{ConfigError, Result};
use serde_json::{Map, Number, Value};
use std::fs;
use std::path::Path;
use tracing::debug;

/// Lowercased extension of a path, or empty string when it has none.
pub fn file_extension(path: &Path) -> String {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase())
        .unwrap_or_default()
}

fn read_to_string(path: &Path) -> Result<String> {
    fs::read_to_string(path).map_err(|err| {
        if err.kind() == std::io::ErrorKind::NotFound {
            ConfigError::FileNotFound {
                path: path.to_path_buf(),
            }
        } else {
            ConfigError::Io {
                path: path.to_path_buf(),
                source: err,
            }
        }
    })
}

/// Load a JSON file into a tree.
pub fn load_json_file(path: &Path) -> Result<Value> {
    let content = read_to_string(path)?;
    serde_json::from_str(&content).map_err(|err| ConfigError::parse(path, err.to_string()))
}

/// Load a TOML file into a tree, then hoist any root-level scalar defaults
/// that TOML syntax forced into a section (see [`promote_root_keys`]).
pub fn load_toml_file(path: &Path, defaults: &Value) -> Result<Value> {
    let content = read_to_string(path)?;
    let parsed: toml::Value =
        toml::from_str(&content).map_err(|err| ConfigError::parse(path, err.to_string()))?;
    let mut tree = toml_to_json(parsed);
    promote_root_keys(&mut tree, defaults);
    Ok(tree)
}

/// Load a configuration file, dispatching on extension.
pub fn load_config_file(path: &Path, defaults: &Value) -> Result<Value> {
    let extension = file_extension(path);
    debug!(path = %path.display(), %extension, "loading configuration file");
    match extension.as_str() {
        "json" => load_json_file(path),
        "toml" => load_toml_file(path, defaults),
        _ => Err(ConfigError::UnsupportedFormat {
            path: path.to_path_buf(),
            extension,
        }),
    }
}

/// Convert a parsed TOML document to the engine's tree representation.
/// Datetimes have no JSON counterpart and become their string form.
pub fn toml_to_json(value: toml::Value) -> Value {
    match value {
        toml::Value::String(s) => Value::String(s),
        toml::Value::Integer(i) => Value::Number(i.into()),
        toml::Value::Float(f) => Number::from_f64(f).map_or(Value::Null, Value::Number),
        toml::Value::Boolean(b) => Value::Bool(b),
        toml::Value::Datetime(dt) => Value::String(dt.to_string()),
        toml::Value::Array(items) => Value::Array(items.into_iter().map(toml_to_json).collect()),
        toml::Value::Table(table) => Value::Object(
            table
                .into_iter()
                .map(|(key, val)| (key, toml_to_json(val)))
                .collect(),
        ),
    }
}

/// Convert a tree to a TOML value. TOML cannot express null, so `Null`
/// becomes the empty string; non-finite floats were already `Null` on the
/// way in and never reach this function from a loaded tree.
pub fn json_to_toml(value: &Value) -> toml::Value {
    match value {
        Value::Null => toml::Value::String(String::new()),
        Value::Bool(b) => toml::Value::Boolean(*b),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                toml::Value::Integer(i)
            } else {
                toml::Value::Float(n.as_f64().unwrap_or(0.0))
            }
        }
        Value::String(s) => toml::Value::String(s.clone()),
        Value::Array(items) => toml::Value::Array(items.iter().map(json_to_toml).collect()),
        Value::Object(map) => toml::Value::Table(
            map.iter()
                .map(|(key, val)| (key.clone(), json_to_toml(val)))
                .collect(),
        ),
    }
}

/// Hoist mis-nested root-level keys out of TOML sections.
///
/// A TOML author cannot put a bare key after a `[section]` header and have
/// it land at the root, so a key the defaults declare as a root-level
/// scalar often ends up inside the first section of the file. For each
/// root-level non-object default key absent from the parsed root, the first
/// section containing it (in sorted key order) donates its copy; the
/// section is removed entirely if that leaves it empty.
fn promote_root_keys(tree: &mut Value, defaults: &Value) {
    let (Value::Object(tree_map), Value::Object(defaults_map)) = (tree, defaults) else {
        return;
    };

    for (key, default_value) in defaults_map {
        if default_value.is_object() || tree_map.contains_key(key) {
            continue;
        }

        let donor = tree_map.iter().find_map(|(section, node)| {
            node.as_object()
                .filter(|section_map| section_map.contains_key(key))
                .map(|_| section.clone())
        });
        let Some(section) = donor else { continue };

        let Some(Value::Object(section_map)) = tree_map.get_mut(&section) else {
            continue;
        };
        let Some(value) = section_map.remove(key) else {
            continue;
        };
        let emptied = section_map.is_empty();
        debug!(%key, %section, "promoting mis-nested root key");
        if emptied {
            tree_map.remove(&section);
        }
        tree_map.insert(key.clone(), value);
    }
}

/// Render a tree as pretty-printed JSON.
pub fn to_json_string(tree: &Value) -> Result<String> {
    serde_json::to_string_pretty(tree).map_err(|err| ConfigError::Render(err.to_string()))
}

/// Render a tree as TOML. Fails when the root is not an object.
pub fn to_toml_string(tree: &Value) -> Result<String> {
    let toml_value = json_to_toml(tree);
    toml::to_string_pretty(&toml_value).map_err(|err| ConfigError::Render(err.to_string()))
}

/// Serialize a tree to a file, choosing the format from the extension.
pub fn write_config_file(path: &Path, tree: &Value) -> Result<()> {
    let extension = file_extension(path);
    let rendered = match extension.as_str() {
        "json" => to_json_string(tree)?,
        "toml" => to_toml_string(tree)?,
        _ => {
            return Err(ConfigError::UnsupportedFormat {
                path: path.to_path_buf(),
                extension,
            });
        }
    };
    fs::write(path, rendered).map_err(|err| ConfigError::Io {
        path: path.to_path_buf(),
        source: err,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn temp_file(extension: &str, content: &str) -> NamedTempFile {
        let mut file = tempfile::Builder::new()
            .suffix(&format!(".{extension}"))
            .tempfile()
            .unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn json_file_loads_as_tree() {
        let file = temp_file("json", r#"{"database": {"port": 5432}, "debug": true}"#);
        let tree = load_config_file(file.path(), &json!({})).unwrap();
        assert_eq!(tree, json!({"database": {"port": 5432}, "debug": true}));
    }

    #[test]
    fn toml_file_loads_as_tree() {
        let file = temp_file(
            "toml",
            "title = \"svc\"\n\n[database]\nhost = \"localhost\"\nport = 5432\n",
        );
        let tree = load_config_file(file.path(), &json!({})).unwrap();
        assert_eq!(
            tree,
            json!({"title": "svc", "database": {"host": "localhost", "port": 5432}})
        );
    }

    #[test]
    fn toml_datetime_becomes_string() {
        let file = temp_file("toml", "created = 1979-05-27T07:32:00Z\n");
        let tree = load_config_file(file.path(), &json!({})).unwrap();
        assert_eq!(tree, json!({"created": "1979-05-27T07:32:00Z"}));
    }

    #[test]
    fn missing_file_is_its_own_error() {
        let err = load_config_file(Path::new("/nonexistent/app.json"), &json!({})).unwrap_err();
        assert!(matches!(err, ConfigError::FileNotFound { .. }));
    }

    #[test]
    fn malformed_json_is_a_parse_error() {
        let file = temp_file("json", "{not json");
        let err = load_config_file(file.path(), &json!({})).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn unknown_extension_is_rejected() {
        let file = temp_file("yaml", "a: 1");
        let err = load_config_file(file.path(), &json!({})).unwrap_err();
        assert!(matches!(err, ConfigError::UnsupportedFormat { .. }));
    }

    #[test]
    fn mis_nested_root_key_is_promoted() {
        // "debug" belongs at the root per the defaults but the TOML file
        // trapped it inside [database].
        let file = temp_file(
            "toml",
            "[database]\nhost = \"localhost\"\ndebug = true\n",
        );
        let defaults = json!({"debug": false, "database": {"host": "x"}});
        let tree = load_config_file(file.path(), &defaults).unwrap();
        assert_eq!(tree, json!({"debug": true, "database": {"host": "localhost"}}));
    }

    #[test]
    fn promotion_removes_emptied_section() {
        let file = temp_file("toml", "[misc]\ndebug = true\n");
        let defaults = json!({"debug": false});
        let tree = load_config_file(file.path(), &defaults).unwrap();
        assert_eq!(tree, json!({"debug": true}));
    }

    #[test]
    fn promotion_skips_keys_present_at_root() {
        let file = temp_file("toml", "debug = false\n\n[database]\ndebug = true\n");
        let defaults = json!({"debug": false, "database": {}});
        let tree = load_config_file(file.path(), &defaults).unwrap();
        assert_eq!(
            tree,
            json!({"debug": false, "database": {"debug": true}})
        );
    }

    #[test]
    fn promotion_ignores_object_valued_defaults() {
        // An object default is a real section, never promoted.
        let file = temp_file("toml", "[outer]\n[outer.database]\nhost = \"x\"\n");
        let defaults = json!({"database": {"host": "y"}});
        let tree = load_config_file(file.path(), &defaults).unwrap();
        assert_eq!(tree, json!({"outer": {"database": {"host": "x"}}}));
    }

    #[test]
    fn null_renders_as_empty_string_in_toml() {
        let rendered = to_toml_string(&json!({"key": null})).unwrap();
        assert!(rendered.contains("key = \"\""));
    }

    #[test]
    fn round_trip_through_toml_file() {
        let tree = json!({"name": "svc", "limits": {"cpu": 2, "ratio": 0.5}});
        let file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        write_config_file(file.path(), &tree).unwrap();
        let loaded = load_config_file(file.path(), &json!({})).unwrap();
        assert_eq!(loaded, tree);
    }
}
