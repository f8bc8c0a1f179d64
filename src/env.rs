//! Environment variable collection and key remapping.
//!
//! Environment names are flat, uppercase, and underscore-delimited;
//! configuration trees are hierarchical. This module reconciles the two: it
//! filters a snapshot of the environment by prefix (or by a system-variable
//! exclusion list), transforms names into candidate dot-paths, and remaps
//! the candidates against the keys already present in the defaults+file
//! structure. The remap is best-effort, not a bijection — ambiguous names
//! resolve to whichever heuristic matches first in a fixed order.

use crate::parse::parse_value;
use crate::path::{set_path, split_path};
use crate::value::flatten_leaves;
use serde_json::{Map, Value};
use std::collections::BTreeSet;
use tracing::debug;

/// Name prefixes of variables assumed to come from the shell, OS, or
/// toolchain rather than the application. A variable is excluded when its
/// uppercased name starts with any of these (single-character entries
/// therefore also match the whole name).
const SYSTEM_VAR_PREFIXES: &[&str] = &[
    // Shell and system basics
    "PATH", "HOME", "USER", "SHELL", "TERM", "LANG", "LC_", "PWD", "OLDPWD", "HOSTNAME",
    "LOGNAME", "MAIL", "EDITOR", "VISUAL", "TMPDIR", "TMP", "TEMP", "XDG_", "DISPLAY",
    // SSH and security
    "SSH_", "GPG_", "DBUS_",
    // Desktop environments
    "DESKTOP_", "GNOME_", "KDE_", "GTK_", "QT_",
    // Programming languages and tools
    "JAVA_", "PYTHON", "NODE_", "NPM_", "NVM_", "VIRTUAL_ENV", "CONDA_", "PIP_", "CARGO_",
    "RUST", "GO", "RBENV", "GEM_", "BUNDLE_", "RAILS_", "RACK_",
    // Shell prompts and history
    "_", "PS1", "PS2", "PS4", "PROMPT_", "HISTFILE", "HISTSIZE", "SAVEHIST",
    // Pagers and documentation
    "LESS", "MORE", "PAGER", "MANPATH", "INFOPATH",
    // Library paths
    "LD_", "DYLD_", "LIBPATH", "CPATH", "LIBRARY_PATH", "PKG_CONFIG",
    // Build tools
    "CMAKE_", "CC", "CXX", "CFLAGS", "CXXFLAGS", "LDFLAGS", "MAKEFLAGS", "MAKELEVEL", "SHLVL",
    // Terminal colors
    "COLORTERM", "COLORFGBG", "WINDOWID", "TERM_PROGRAM",
    // IDE and editor
    "ITERM_", "VSCODE_", "WSL_", "WSLENV", "WT_", "CONEMU", "ANSICON", "CLICOLOR", "FORCE_",
    "NO_COLOR",
    // Debug and CI
    "DEBUG", "VERBOSE", "CI", "GITHUB_", "GITLAB_", "TRAVIS_", "CIRCLECI", "JENKINS_",
    "BUILDKITE_", "AZURE_",
    // Cloud and containers
    "AWS_", "GOOGLE_", "DOCKER_", "KUBERNETES_", "K8S_", "COMPOSE_",
    // Additional common system vars
    "ZSH_", "LS_", "PYTHONUTF8", "PYTHONPATH", "WINDOWPATH", "QTWEBENGINE_", "MOZ_", "GDK_",
    "BROWSER", "USERNAME", "SYSTEMROOT", "DOMAINNAME", "HOSTTYPE", "OSTYPE", "MACHTYPE",
];

/// Placeholder protecting `__` from the single-underscore pass in
/// [`transform_env_name`]. Never occurs in real variable names.
const UNDERSCORE_MARK: &str = "\u{1f}";

/// An explicit snapshot of environment variables.
///
/// The mapper never reads the live process environment itself; the caller
/// captures one snapshot per `load` so tests can supply deterministic input.
#[derive(Debug, Clone, Default)]
pub struct EnvSnapshot {
    vars: Vec<(String, String)>,
}

impl EnvSnapshot {
    /// Capture the current process environment. Variables with non-UTF-8
    /// names or values are skipped.
    pub fn from_process() -> Self {
        let vars = std::env::vars_os()
            .filter_map(|(name, value)| Some((name.into_string().ok()?, value.into_string().ok()?)))
            .collect();
        Self { vars }
    }

    /// Build a snapshot from explicit pairs.
    pub fn from_pairs<N, V>(pairs: impl IntoIterator<Item = (N, V)>) -> Self
    where
        N: Into<String>,
        V: Into<String>,
    {
        let vars = pairs
            .into_iter()
            .map(|(name, value)| (name.into(), value.into()))
            .collect();
        Self { vars }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.vars.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }
}

/// Whether a variable name belongs to the system-variable exclusion list.
pub fn is_system_variable(name: &str) -> bool {
    let upper = name.to_ascii_uppercase();
    SYSTEM_VAR_PREFIXES
        .iter()
        .any(|prefix| upper.starts_with(prefix))
}

/// Transform an environment variable name into a candidate dot-path.
///
/// Lowercases the name, then treats `__` as a literal underscore inside a
/// key segment and `_` as a nesting boundary: `DATABASE_HOST` becomes
/// `database.host`, `A__B__C_D` becomes `a_b_c.d`.
pub fn transform_env_name(name: &str) -> String {
    name.to_ascii_lowercase()
        .replace("__", UNDERSCORE_MARK)
        .replace('_', ".")
        .replace(UNDERSCORE_MARK, "_")
}

/// Normalize a non-empty prefix: trailing underscores stripped, exactly one
/// appended. `MYAPP` and `MYAPP_` both become `MYAPP_`.
fn normalize_prefix(prefix: &str) -> String {
    let trimmed = prefix.trim_end_matches('_');
    format!("{trimmed}_")
}

fn starts_with_ignore_case(name: &str, prefix: &str) -> bool {
    name.len() >= prefix.len()
        && name.as_bytes()[..prefix.len()].eq_ignore_ascii_case(prefix.as_bytes())
}

/// Collect the variables relevant to configuration loading.
///
/// `None` disables environment loading entirely. An empty prefix keeps every
/// non-system variable; a non-empty prefix keeps only `<PREFIX>_*`
/// (case-insensitively, after normalization).
pub fn collect_env_vars(snapshot: &EnvSnapshot, prefix: Option<&str>) -> Vec<(String, String)> {
    let Some(prefix) = prefix else {
        return Vec::new();
    };

    let normalized = (!prefix.is_empty()).then(|| normalize_prefix(prefix));

    snapshot
        .iter()
        .filter(|(name, _)| match &normalized {
            Some(p) => starts_with_ignore_case(name, p),
            None => !is_system_variable(name),
        })
        .map(|(name, value)| (name.to_string(), value.to_string()))
        .collect()
}

/// Nest collected variables into a fresh tree keyed by transformed names.
///
/// Individual variables whose keys cannot be written are dropped rather than
/// aborting the pass.
fn env_vars_to_nested(vars: &[(String, String)], prefix: Option<&str>) -> Value {
    let normalized = prefix
        .filter(|p| !p.is_empty())
        .map(normalize_prefix);

    let mut nested = Value::Object(Map::new());
    for (name, raw) in vars {
        let remainder = match &normalized {
            Some(p) => {
                if !starts_with_ignore_case(name, p) {
                    continue;
                }
                let rest = &name[p.len()..];
                if rest.is_empty() {
                    continue;
                }
                rest
            }
            None => name.as_str(),
        };

        let dot_key = transform_env_name(remainder);
        let parsed = parse_value(raw);
        if let Err(err) = set_path(&mut nested, &dot_key, parsed, true) {
            debug!(variable = %name, key = %dot_key, %err, "dropping environment variable");
        }
    }
    nested
}

/// All dot-paths present in a tree, including intermediate object paths.
pub fn flatten_keys(tree: &Value) -> BTreeSet<String> {
    let mut keys = BTreeSet::new();
    collect_keys(tree, "", &mut keys);
    keys
}

fn collect_keys(node: &Value, prefix: &str, keys: &mut BTreeSet<String>) {
    if let Value::Object(map) = node {
        for (key, child) in map {
            let path = if prefix.is_empty() {
                key.clone()
            } else {
                format!("{prefix}.{key}")
            };
            keys.insert(path.clone());
            collect_keys(child, &path, keys);
        }
    }
}

/// Remap one candidate dot-path against the set of known base paths.
///
/// Heuristics run in a fixed priority order; ambiguous names resolve to the
/// first match and that ordering must not change. Returns `None` when the
/// candidate should be discarded.
pub fn remap_env_key(
    dot_path: &str,
    base_keys: &BTreeSet<String>,
    prefix: Option<&str>,
    dotenv_active: bool,
) -> Option<String> {
    // 1. Exact match against the base structure.
    if base_keys.contains(dot_path) {
        return Some(dot_path.to_string());
    }

    let flat = dot_path.replace('.', "_");

    // 2. Base keys may themselves contain underscores: split the flat name
    // at each underscore in turn and reinterpret the remainder as dotted or
    // underscored. Recovers e.g. `feature_flags.beta_feature` from a name
    // with no reliable word boundary.
    for (pos, _) in flat.match_indices('_') {
        let root = &flat[..pos];
        let rest = &flat[pos + 1..];

        let dotted = format!("{root}.{}", rest.replace('_', "."));
        if base_keys.contains(&dotted) {
            return Some(dotted);
        }

        let kept = format!("{root}.{rest}");
        if base_keys.contains(&kept) {
            return Some(kept);
        }
    }

    // 3. The fully flat key itself.
    if base_keys.contains(&flat) {
        return Some(flat);
    }

    // 4. Longest-prefix search: underscore-join progressively shorter
    // segment prefixes and look for a base path starting with that prefix
    // followed by a dot; splice the remaining segments back on dotted.
    let segments = split_path(dot_path);
    for prefix_len in (1..=segments.len()).rev() {
        let joined = segments[..prefix_len].join("_");
        for base_key in base_keys {
            let matched = base_key == &joined
                || (base_key.len() > joined.len()
                    && base_key.starts_with(&joined)
                    && base_key.as_bytes()[joined.len()] == b'.');
            if !matched {
                continue;
            }

            if prefix_len == segments.len() {
                return Some(joined);
            }

            let full_key = format!("{joined}.{}", segments[prefix_len..].join("."));
            if base_keys.contains(&full_key) || base_keys.contains(&joined) {
                return Some(full_key);
            }
        }
    }

    // 5. No heuristic matched: the fallback depends on where the variable
    // plausibly came from.
    let empty_prefix = prefix.is_some_and(|p| p.is_empty());
    if empty_prefix && dotenv_active {
        // Conservative mode: an unmatched ambient variable is discarded.
        return None;
    }
    if !empty_prefix && dotenv_active {
        return Some(dot_path.to_string());
    }
    if !empty_prefix && !dotenv_active {
        // A deliberately prefixed real environment variable keeps the flat
        // key rather than a guessed structure.
        return Some(flat);
    }
    Some(dot_path.to_string())
}

/// Flatten the nested env tree and remap each leaf against the combined
/// defaults+file structure.
///
/// Candidates are processed deepest-first; the first candidate to claim a
/// final key wins and later duplicates are dropped.
fn remap_and_flatten(
    nested_env: &Value,
    defaults: &Value,
    file_tree: &Value,
    prefix: Option<&str>,
    dotenv_active: bool,
) -> Vec<(String, Value)> {
    // Base structure: defaults with file top-level keys overlaid.
    let mut base = if defaults.is_object() {
        defaults.clone()
    } else {
        Value::Object(Map::new())
    };
    if let (Value::Object(base_map), Value::Object(file_map)) = (&mut base, file_tree) {
        for (key, value) in file_map {
            base_map.insert(key.clone(), value.clone());
        }
    }
    let base_keys = flatten_keys(&base);

    let mut candidates: Vec<(String, Value)> = flatten_leaves(nested_env)
        .into_iter()
        .filter(|(key, _)| !key.is_empty())
        .collect();
    // Deepest first, stable within equal depth.
    candidates.sort_by_key(|(key, _)| std::cmp::Reverse(key.matches('.').count()));

    let mut assigned = BTreeSet::new();
    let mut result = Vec::new();
    for (dot_key, value) in candidates {
        let Some(final_key) = remap_env_key(&dot_key, &base_keys, prefix, dotenv_active) else {
            debug!(key = %dot_key, "discarding unmatched environment key");
            continue;
        };
        if !assigned.insert(final_key.clone()) {
            continue;
        }
        result.push((final_key, value));
    }
    result
}

/// Run the full mapping pipeline: collect, nest, remap, assemble.
///
/// Returns a tree ready to be deep-merged over the defaults+file
/// accumulation. Per-variable failures are dropped; this function itself
/// never fails.
pub fn load_env(
    snapshot: &EnvSnapshot,
    prefix: Option<&str>,
    defaults: &Value,
    file_tree: &Value,
    dotenv_active: bool,
) -> Value {
    let vars = collect_env_vars(snapshot, prefix);
    if vars.is_empty() {
        return Value::Object(Map::new());
    }
    debug!(count = vars.len(), "collected environment variables");

    let nested = env_vars_to_nested(&vars, prefix);
    let remapped = remap_and_flatten(&nested, defaults, file_tree, prefix, dotenv_active);

    let mut result = Value::Object(Map::new());
    for (key, value) in remapped {
        if let Err(err) = set_path(&mut result, &key, value, true) {
            debug!(%key, %err, "dropping remapped environment key");
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn base_keys_of(tree: &Value) -> BTreeSet<String> {
        flatten_keys(tree)
    }

    #[test]
    fn transform_turns_underscores_into_dots() {
        assert_eq!(transform_env_name("DATABASE_HOST"), "database.host");
        assert_eq!(transform_env_name("A_B_C"), "a.b.c");
        assert_eq!(transform_env_name("Database_Host"), "database.host");
        assert_eq!(transform_env_name("SIMPLE"), "simple");
        assert_eq!(transform_env_name("VAR_123"), "var.123");
    }

    #[test]
    fn transform_protects_double_underscores() {
        assert_eq!(transform_env_name("A__B__C_D"), "a_b_c.d");
        assert_eq!(transform_env_name("A___B"), "a_.b");
        assert_eq!(transform_env_name("__VALUE"), "_value");
        assert_eq!(transform_env_name("_VALUE"), ".value");
        assert_eq!(transform_env_name("VALUE_"), "value.");
    }

    #[test]
    fn transform_is_idempotent_on_dotted_names() {
        for input in ["database.host", "a.b.c", "simple"] {
            assert_eq!(transform_env_name(input), input);
        }
    }

    #[test]
    fn system_variables_are_detected() {
        for name in [
            "PATH",
            "HOME",
            "PYTHONPATH",
            "VIRTUAL_ENV",
            "AWS_ACCESS_KEY",
            "DOCKER_HOST",
            "LC_ALL",
            "_",
            "_UNDERSCORED",
        ] {
            assert!(is_system_variable(name), "{name} should be a system var");
        }
        for name in ["MYAPP_VALUE", "CONFIG_PATH", "APP_DEBUG"] {
            assert!(!is_system_variable(name), "{name} should not be a system var");
        }
    }

    #[test]
    fn collect_disabled_without_prefix_option() {
        let snapshot = EnvSnapshot::from_pairs([("MYAPP_X", "1")]);
        assert!(collect_env_vars(&snapshot, None).is_empty());
    }

    #[test]
    fn collect_with_empty_prefix_excludes_system_vars() {
        let snapshot = EnvSnapshot::from_pairs([
            ("PATH", "/usr/bin"),
            ("HOME", "/root"),
            ("APP_DEBUG", "true"),
        ]);
        let vars = collect_env_vars(&snapshot, Some(""));
        assert_eq!(vars, vec![("APP_DEBUG".to_string(), "true".to_string())]);
    }

    #[test]
    fn collect_with_prefix_filters_case_insensitively() {
        let snapshot = EnvSnapshot::from_pairs([
            ("MYAPP_DB_HOST", "x"),
            ("myapp_db_port", "5432"),
            ("OTHER_KEY", "y"),
        ]);
        let mut vars = collect_env_vars(&snapshot, Some("MYAPP"));
        vars.sort();
        assert_eq!(
            vars,
            vec![
                ("MYAPP_DB_HOST".to_string(), "x".to_string()),
                ("myapp_db_port".to_string(), "5432".to_string()),
            ]
        );
    }

    #[test]
    fn collect_normalizes_trailing_underscores_in_prefix() {
        let snapshot = EnvSnapshot::from_pairs([("MYAPP_KEY", "v")]);
        assert_eq!(collect_env_vars(&snapshot, Some("MYAPP_")).len(), 1);
        assert_eq!(collect_env_vars(&snapshot, Some("MYAPP__")).len(), 1);
    }

    #[test]
    fn remap_exact_match_wins() {
        let base = base_keys_of(&json!({"database": {"host": "x"}}));
        assert_eq!(
            remap_env_key("database.host", &base, Some("MYAPP"), false),
            Some("database.host".to_string())
        );
    }

    #[test]
    fn remap_recovers_underscored_base_keys() {
        let base = base_keys_of(&json!({
            "feature_flags": {"beta": false, "beta_feature": false}
        }));
        // From MYAPP_FEATURE_FLAGS__BETA: transform gives "feature.flags_beta".
        assert_eq!(
            remap_env_key("feature.flags_beta", &base, Some("MYAPP"), false),
            Some("feature_flags.beta".to_string())
        );
        // From MYAPP_FEATURE_FLAGS_BETA_FEATURE: transform gives
        // "feature.flags.beta.feature".
        assert_eq!(
            remap_env_key("feature.flags.beta.feature", &base, Some("MYAPP"), false),
            Some("feature_flags.beta_feature".to_string())
        );
    }

    #[test]
    fn remap_splices_unknown_tail_onto_known_prefix() {
        let base = base_keys_of(&json!({"server_opts": {"timeout": 30}}));
        // "server.opts.retries" has no exact or flat match; the prefix
        // "server_opts" exists, so the tail splices back on.
        assert_eq!(
            remap_env_key("server.opts.retries", &base, Some("MYAPP"), false),
            Some("server_opts.retries".to_string())
        );
    }

    #[test]
    fn remap_fallbacks_depend_on_origin() {
        let base = BTreeSet::new();
        // Ambient variable with dotenv active: discard.
        assert_eq!(remap_env_key("some.thing", &base, Some(""), true), None);
        // Prefixed with dotenv active: keep the dotted candidate.
        assert_eq!(
            remap_env_key("some.thing", &base, Some("MYAPP"), true),
            Some("some.thing".to_string())
        );
        // Prefixed real variable: keep the flat key.
        assert_eq!(
            remap_env_key("some.thing", &base, Some("MYAPP"), false),
            Some("some_thing".to_string())
        );
        // Ambient without dotenv: keep as-is.
        assert_eq!(
            remap_env_key("some.thing", &base, Some(""), false),
            Some("some.thing".to_string())
        );
    }

    #[test]
    fn load_env_remaps_against_base_structure() {
        let snapshot = EnvSnapshot::from_pairs([
            ("MYAPP_DATABASE_HOST", "envhost"),
            ("MYAPP_DATABASE_PORT", "5433"),
            ("MYAPP_FEATURE_FLAGS__BETA", "true"),
        ]);
        let defaults = json!({
            "database": {"host": "default", "port": 5432},
            "feature_flags": {"beta": false}
        });
        let result = load_env(&snapshot, Some("MYAPP"), &defaults, &json!({}), false);
        assert_eq!(result["database"]["host"], json!("envhost"));
        assert_eq!(result["database"]["port"], json!(5433));
        assert_eq!(result["feature_flags"]["beta"], json!(true));
    }

    #[test]
    fn load_env_unmatched_prefixed_var_uses_flat_key() {
        let snapshot = EnvSnapshot::from_pairs([("MYAPP_NEW_VALUE", "42")]);
        let defaults = json!({"database": {"host": "x"}});
        let result = load_env(&snapshot, Some("MYAPP"), &defaults, &json!({}), false);
        assert_eq!(result, json!({"new_value": 42}));
    }

    #[test]
    fn load_env_values_go_through_the_parser() {
        let snapshot = EnvSnapshot::from_pairs([
            ("APP_COUNT", "3"),
            ("APP_RATIO", "0.5"),
            ("APP_NAME", "svc"),
            ("APP_FLAGS", "[1, 2]"),
        ]);
        let result = load_env(&snapshot, Some("APP"), &json!({}), &json!({}), false);
        assert_eq!(result["count"], json!(3));
        assert_eq!(result["ratio"], json!(0.5));
        assert_eq!(result["name"], json!("svc"));
        assert_eq!(result["flags"], json!([1, 2]));
    }

    #[test]
    fn load_env_disabled_returns_empty_object() {
        let snapshot = EnvSnapshot::from_pairs([("MYAPP_X", "1")]);
        let result = load_env(&snapshot, None, &json!({}), &json!({}), false);
        assert_eq!(result, json!({}));
    }

    #[test]
    fn file_keys_overlay_defaults_in_base_structure() {
        // The file contributes "service.endpoint"; the remap must see it.
        let snapshot = EnvSnapshot::from_pairs([("APP_SERVICE_ENDPOINT", "https://x")]);
        let defaults = json!({});
        let file_tree = json!({"service": {"endpoint": "https://default"}});
        let result = load_env(&snapshot, Some("APP"), &defaults, &file_tree, false);
        assert_eq!(result["service"]["endpoint"], json!("https://x"));
    }

    #[test]
    fn deepest_candidate_claims_a_key_first() {
        let base = json!({"a": {"b": {"c": 1}}});
        let snapshot = EnvSnapshot::from_pairs([("APP_A_B_C", "9")]);
        let result = load_env(&snapshot, Some("APP"), &base, &json!({}), false);
        assert_eq!(result, json!({"a": {"b": {"c": 9}}}));
    }
}
