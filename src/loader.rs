//! Resolution orchestrator.
//!
//! A [`Config`] is built by layering sources in fixed precedence order:
//! defaults, then the configuration file, then environment variables
//! (optionally seeded from a `.env` file), then explicit overrides. Each
//! stage produces a tree that deep-merges over the accumulation, so later
//! sources win key-by-key instead of wholesale.

use crate::dotenv::seed_environment;
use crate::env::{load_env, EnvSnapshot};
use crate::error::{ConfigError, Result};
use crate::file::{load_config_file, to_json_string, to_toml_string};
use crate::merge::deep_merge;
use crate::parse::parse_value;
use crate::path::{contains_path, get_path, get_path_or, set_path};
use crate::value::type_name;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::path::PathBuf;
use tracing::{debug, info};

/// Everything the loader needs to resolve a configuration.
#[derive(Debug, Clone, Default)]
pub struct LoadOptions {
    /// Configuration file to layer over the defaults, if any.
    pub file_path: Option<PathBuf>,
    /// Environment variable prefix. `None` disables environment loading;
    /// an empty string loads every non-system variable.
    pub prefix: Option<String>,
    /// Whether to seed the environment from a `.env` file first.
    pub load_dotenv: bool,
    /// Explicit `.env` path; `None` searches from the current directory.
    pub dotenv_path: Option<PathBuf>,
    /// Baseline tree; must be an object when present.
    pub defaults: Option<Value>,
    /// Highest-precedence key/value pairs. String values are parsed with
    /// the same rules as environment variable values; anything else is
    /// written as-is.
    pub overrides: BTreeMap<String, Value>,
    /// Dot-paths that must resolve to a value after the merge.
    pub mandatory: Vec<String>,
}

impl LoadOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn file(mut self, path: impl Into<PathBuf>) -> Self {
        self.file_path = Some(path.into());
        self
    }

    pub fn prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    pub fn dotenv(mut self, load: bool) -> Self {
        self.load_dotenv = load;
        self
    }

    pub fn dotenv_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.dotenv_path = Some(path.into());
        self.load_dotenv = true;
        self
    }

    pub fn defaults(mut self, defaults: Value) -> Self {
        self.defaults = Some(defaults);
        self
    }

    pub fn override_value(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.overrides.insert(key.into(), value.into());
        self
    }

    pub fn mandatory(mut self, keys: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.mandatory.extend(keys.into_iter().map(Into::into));
        self
    }
}

/// A fully resolved configuration tree.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    data: Value,
}

impl Config {
    /// Wrap an existing tree. The root must be an object.
    pub fn new(data: Value) -> Result<Self> {
        if !data.is_object() {
            return Err(ConfigError::NonObjectRoot {
                actual: type_name(&data),
            });
        }
        Ok(Self { data })
    }

    /// Resolve a configuration from all sources named in `options`,
    /// capturing the environment snapshot from the live process (after
    /// dotenv seeding, so `.env` entries are visible to the mapper).
    pub fn load(options: &LoadOptions) -> Result<Self> {
        let dotenv_loaded = if options.load_dotenv {
            seed_environment(options.dotenv_path.as_deref(), false)?
        } else {
            false
        };
        let snapshot = EnvSnapshot::from_process();
        Self::resolve(options, &snapshot, dotenv_loaded)
    }

    /// Resolve against an explicit environment snapshot instead of the
    /// process environment. No dotenv seeding happens; the caller decides
    /// what the snapshot contains.
    pub fn load_with_env(options: &LoadOptions, snapshot: &EnvSnapshot) -> Result<Self> {
        Self::resolve(options, snapshot, options.load_dotenv)
    }

    fn resolve(options: &LoadOptions, snapshot: &EnvSnapshot, dotenv_active: bool) -> Result<Self> {
        let defaults = match &options.defaults {
            Some(defaults) if defaults.is_object() => defaults.clone(),
            Some(other) => {
                debug!(actual = type_name(other), "ignoring non-object defaults");
                Value::Object(Map::new())
            }
            None => Value::Object(Map::new()),
        };

        let mut data = defaults.clone();

        let file_tree = match &options.file_path {
            Some(path) => {
                let tree = load_config_file(path, &defaults)?;
                info!(path = %path.display(), "loaded configuration file");
                data = deep_merge(data, tree.clone());
                tree
            }
            None => Value::Object(Map::new()),
        };

        let env_tree = load_env(
            snapshot,
            options.prefix.as_deref(),
            &defaults,
            &file_tree,
            dotenv_active,
        );
        if env_tree.as_object().is_some_and(|map| !map.is_empty()) {
            debug!("merging environment overlay");
            data = deep_merge(data, env_tree);
        }

        if !options.overrides.is_empty() {
            let mut overlay = Value::Object(Map::new());
            for (key, value) in &options.overrides {
                let typed = match value {
                    Value::String(raw) => parse_value(raw),
                    other => other.clone(),
                };
                set_path(&mut overlay, key, typed, true)?;
            }
            data = deep_merge(data, overlay);
        }

        let config = Self { data };
        config.require(&options.mandatory)?;
        Ok(config)
    }

    /// Verify every listed dot-path resolves to a value, collecting all
    /// failures instead of stopping at the first.
    pub fn require(&self, keys: &[String]) -> Result<()> {
        let missing: Vec<String> = keys
            .iter()
            .filter(|key| !matches!(contains_path(&self.data, key), Ok(true)))
            .cloned()
            .collect();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::MissingMandatory { keys: missing })
        }
    }

    /// Fetch the value at a dot-path. Fails on absence or on traversal
    /// through a scalar.
    pub fn get(&self, path: &str) -> Result<&Value> {
        get_path(&self.data, path)
    }

    /// Fetch the value at a dot-path, or `fallback` when the path does not
    /// exist. Traversal through a scalar still fails.
    pub fn get_or<'a>(&'a self, path: &str, fallback: &'a Value) -> Result<&'a Value> {
        get_path_or(&self.data, path, fallback)
    }

    /// Whether a dot-path resolves to a value.
    pub fn contains(&self, path: &str) -> Result<bool> {
        contains_path(&self.data, path)
    }

    /// Write a value at a dot-path, creating intermediate objects.
    pub fn set(&mut self, path: &str, value: Value) -> Result<()> {
        set_path(&mut self.data, path, value, true)
    }

    /// Deep-merge another tree over this configuration.
    pub fn merge(&mut self, incoming: Value) {
        let data = std::mem::take(&mut self.data);
        self.data = deep_merge(data, incoming);
    }

    pub fn data(&self) -> &Value {
        &self.data
    }

    pub fn into_data(self) -> Value {
        self.data
    }

    pub fn to_json_string(&self) -> Result<String> {
        to_json_string(&self.data)
    }

    pub fn to_toml_string(&self) -> Result<String> {
        to_toml_string(&self.data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn defaults_alone_resolve() {
        let options = LoadOptions::new().defaults(json!({"a": 1}));
        let config = Config::load_with_env(&options, &EnvSnapshot::default()).unwrap();
        assert_eq!(config.data(), &json!({"a": 1}));
    }

    #[test]
    fn config_requires_an_object_root() {
        let err = Config::new(json!("scalar")).unwrap_err();
        assert!(matches!(err, ConfigError::NonObjectRoot { actual: "string" }));
    }

    #[test]
    fn non_object_defaults_fall_back_to_empty() {
        let options = LoadOptions::new().defaults(json!([1, 2]));
        let config = Config::load_with_env(&options, &EnvSnapshot::default()).unwrap();
        assert_eq!(config.data(), &json!({}));
    }

    #[test]
    fn null_override_preserves_existing_value() {
        let options = LoadOptions::new()
            .defaults(json!({"timeout": 30}))
            .override_value("timeout", "null");
        let config = Config::load_with_env(&options, &EnvSnapshot::default()).unwrap();
        assert_eq!(config.get("timeout").unwrap(), &json!(30));
    }

    #[test]
    fn overrides_beat_environment() {
        let snapshot = EnvSnapshot::from_pairs([("APP_PORT", "8080")]);
        let options = LoadOptions::new()
            .defaults(json!({"port": 80}))
            .prefix("APP")
            .override_value("port", "9090");
        let config = Config::load_with_env(&options, &snapshot).unwrap();
        assert_eq!(config.get("port").unwrap(), &json!(9090));
    }

    #[test]
    fn override_values_are_parsed() {
        let options = LoadOptions::new()
            .override_value("count", "3")
            .override_value("flag", "true")
            .override_value("name", "svc");
        let config = Config::load_with_env(&options, &EnvSnapshot::default()).unwrap();
        assert_eq!(
            config.data(),
            &json!({"count": 3, "flag": true, "name": "svc"})
        );
    }

    #[test]
    fn require_collects_every_missing_key() {
        let options = LoadOptions::new()
            .defaults(json!({"present": 1}))
            .mandatory(["present", "a.b", "c"]);
        let err = Config::load_with_env(&options, &EnvSnapshot::default()).unwrap_err();
        match err {
            ConfigError::MissingMandatory { keys } => {
                assert_eq!(keys, vec!["a.b".to_string(), "c".to_string()]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn require_treats_scalar_traversal_as_missing() {
        let config = Config::new(json!({"a": "scalar"})).unwrap();
        let err = config.require(&["a.b".to_string()]).unwrap_err();
        assert!(matches!(err, ConfigError::MissingMandatory { .. }));
    }

    #[test]
    fn merge_layers_over_existing_data() {
        let mut config = Config::new(json!({"a": {"x": 1, "y": 2}})).unwrap();
        config.merge(json!({"a": {"y": 3}, "b": 4}));
        assert_eq!(config.data(), &json!({"a": {"x": 1, "y": 3}, "b": 4}));
    }

    #[test]
    fn set_creates_intermediate_objects() {
        let mut config = Config::new(json!({})).unwrap();
        config.set("deep.nested.key", json!("v")).unwrap();
        assert_eq!(config.data(), &json!({"deep": {"nested": {"key": "v"}}}));
    }
}
