//! CLI command definitions for conflate
//!
//! This module defines the CLI structure using clap's derive macros.
//! The main entry point is the `Cli` struct which contains subcommands.

use crate::loader::LoadOptions;
use crate::parse::parse_json_or_string;
use clap::{Parser, Subcommand, ValueEnum};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;

/// Output format for rendering a resolved tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum ConvertFormat {
    #[default]
    Json,
    Toml,
}

/// Layered configuration resolver
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file (.json or .toml)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Environment variable prefix; pass an empty string to load every
    /// non-system variable
    #[arg(short, long, global = true)]
    pub prefix: Option<String>,

    /// Path to a JSON file containing defaults
    #[arg(long, global = true)]
    pub defaults: Option<PathBuf>,

    /// Comma-separated key:value overrides (quote- and bracket-aware)
    #[arg(long, global = true)]
    pub overrides: Option<String>,

    /// Comma-separated dot-paths that must resolve after the merge
    #[arg(long, global = true)]
    pub mandatory: Option<String>,

    /// Seed the environment from a .env file before loading
    #[arg(long, global = true)]
    pub dotenv: bool,

    /// Explicit .env file path (implies --dotenv)
    #[arg(long, global = true)]
    pub env_file: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Logging output: 0/off, 1/stdout, 2/stderr (default), or filename
    #[arg(short, long, default_value = "2", global = true)]
    pub log: String,

    #[command(subcommand)]
    pub command: Option<Command>,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Print the value at a dot-path
    Get {
        /// Dot-path to read
        path: String,
    },

    /// Write a value into the configuration file (requires --config)
    Set {
        /// Dot-path to write
        path: String,
        /// Value text; JSON when it parses, a plain string otherwise
        value: String,
    },

    /// Print whether a dot-path resolves; exit 0 when it does, 1 when not
    Exists {
        /// Dot-path to test
        path: String,
    },

    /// List resolved leaf entries whose key or value matches a pattern
    Search {
        /// Pattern for the dot-path; glob, regex, or case-insensitive literal
        #[arg(long)]
        key: Option<String>,

        /// Pattern for the value (matched against its JSON rendering)
        #[arg(long)]
        val: Option<String>,

        /// Case-insensitive regex matching
        #[arg(short = 'i', long)]
        ignore_case: bool,
    },

    /// Print the fully resolved tree (default if no subcommand given)
    Dump,

    /// Render the fully resolved tree in another format
    Convert {
        /// Target format
        #[arg(long, value_enum, default_value = "json")]
        to: ConvertFormat,

        /// Output file; stdout when omitted
        #[arg(long)]
        out: Option<PathBuf>,
    },
}

impl Cli {
    /// Translate the global flags into loader options.
    pub fn load_options(&self) -> anyhow::Result<LoadOptions> {
        let mut options = LoadOptions::new();
        options.file_path = self.config.clone();
        options.prefix = self.prefix.clone();
        options.load_dotenv = self.dotenv || self.env_file.is_some();
        options.dotenv_path = self.env_file.clone();

        if let Some(path) = &self.defaults {
            let content = fs::read_to_string(path).map_err(|err| {
                anyhow::anyhow!("could not read defaults file '{}': {err}", path.display())
            })?;
            let defaults: Value = serde_json::from_str(&content).map_err(|err| {
                anyhow::anyhow!("invalid JSON in defaults file '{}': {err}", path.display())
            })?;
            options.defaults = Some(defaults);
        }
        if let Some(raw) = &self.overrides {
            options.overrides = parse_overrides(raw);
        }
        if let Some(raw) = &self.mandatory {
            options.mandatory = raw
                .split(',')
                .map(str::trim)
                .filter(|key| !key.is_empty())
                .map(String::from)
                .collect();
        }
        Ok(options)
    }
}

/// Split a comma-separated `key:value` list into override pairs.
///
/// Commas inside quotes or inside `{}`/`[]` belong to the value, so JSON
/// compounds pass through intact. An entry without `:` is ignored; values
/// are parsed as JSON when possible and kept as plain strings otherwise.
pub fn parse_overrides(raw: &str) -> BTreeMap<String, Value> {
    let mut out = BTreeMap::new();
    let mut current = String::new();
    let mut depth = 0usize;
    let mut in_str = false;
    let mut str_ch = '"';
    let mut prev = '\0';

    let mut flush = |entry: &mut String, out: &mut BTreeMap<String, Value>| {
        let entry = std::mem::take(entry);
        if let Some((key, value)) = entry.split_once(':') {
            let key = key.trim();
            if !key.is_empty() {
                out.insert(key.to_string(), parse_json_or_string(value.trim()));
            }
        }
    };

    for ch in raw.chars() {
        if in_str {
            current.push(ch);
            if ch == str_ch && prev != '\\' {
                in_str = false;
            }
            prev = ch;
            continue;
        }
        match ch {
            '"' | '\'' => {
                in_str = true;
                str_ch = ch;
                current.push(ch);
            }
            '{' | '[' => {
                depth += 1;
                current.push(ch);
            }
            '}' | ']' => {
                depth = depth.saturating_sub(1);
                current.push(ch);
            }
            ',' if depth == 0 => flush(&mut current, &mut out),
            _ => current.push(ch),
        }
        prev = ch;
    }
    if !current.is_empty() {
        flush(&mut current, &mut out);
    }
    out
}

/// Match a text against a search pattern.
///
/// Patterns with glob metacharacters (`*?[]`) are translated to an anchored
/// regex and always match case-insensitively. Patterns with regex
/// metacharacters are used as an unanchored regex, case-insensitive when
/// `ignore_case` is set. Anything else compares as a case-insensitive
/// literal. An empty pattern matches everything; an invalid regex matches
/// nothing.
pub fn match_pattern(pattern: &str, text: &str, ignore_case: bool) -> bool {
    if pattern.is_empty() {
        return true;
    }

    let is_glob = pattern.contains(['*', '?', '[', ']']);
    let is_regex = pattern.contains(['.', '+', '^', '$', '(', ')', '{', '}', '|', '\\']);

    if is_glob {
        let mut rx = String::with_capacity(pattern.len() + 8);
        rx.push('^');
        for ch in pattern.chars() {
            match ch {
                '*' => rx.push_str(".*"),
                '?' => rx.push('.'),
                '.' | '+' | '^' | '$' | '(' | ')' | '{' | '}' | '|' | '\\' | '[' | ']' => {
                    rx.push('\\');
                    rx.push(ch);
                }
                other => rx.push(other),
            }
        }
        rx.push('$');
        return regex_lite::RegexBuilder::new(&rx)
            .case_insensitive(true)
            .build()
            .map(|re| re.is_match(text))
            .unwrap_or(false);
    }

    if is_regex {
        return regex_lite::RegexBuilder::new(pattern)
            .case_insensitive(ignore_case)
            .build()
            .map(|re| re.is_match(text))
            .unwrap_or(false);
    }

    pattern.eq_ignore_ascii_case(text)
}
