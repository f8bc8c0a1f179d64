//! conflate CLI
//!
//! Resolves layered configuration (defaults, file, environment, overrides)
//! and exposes lookup, mutation, search, and format conversion commands.

use anyhow::Result;
use clap::Parser;
use conflate::cli::{match_pattern, Cli, Command, ConvertFormat};
use conflate::error::ConfigError;
use conflate::file::{load_config_file, to_json_string, write_config_file};
use conflate::loader::Config;
use conflate::parse::parse_json_or_string;
use conflate::path::set_path;
use conflate::value::flatten_leaves;
use serde_json::{json, Map, Value};
use std::fs::OpenOptions;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

fn main() {
    let cli = Cli::parse();

    if let Err(err) = init_logging(&cli) {
        eprintln!("Error: {err}");
        std::process::exit(2);
    }

    match run(&cli) {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("Error: {err}");
            std::process::exit(2);
        }
    }
}

/// Initialize logging based on --log option.
fn init_logging(cli: &Cli) -> Result<()> {
    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    match cli.log.as_str() {
        "0" | "off" => {
            // No logging
        }
        "1" | "stdout" => {
            let subscriber = FmtSubscriber::builder()
                .with_max_level(level)
                .with_writer(std::io::stdout)
                .finish();
            tracing::subscriber::set_global_default(subscriber)?;
        }
        "2" | "stderr" => {
            let subscriber = FmtSubscriber::builder()
                .with_max_level(level)
                .with_writer(std::io::stderr)
                .finish();
            tracing::subscriber::set_global_default(subscriber)?;
        }
        filename => {
            // Log to file (append mode)
            let file = OpenOptions::new().create(true).append(true).open(filename)?;
            let subscriber = FmtSubscriber::builder()
                .with_max_level(level)
                .with_writer(file)
                .with_ansi(false)
                .finish();
            tracing::subscriber::set_global_default(subscriber)?;
        }
    }
    Ok(())
}

fn run(cli: &Cli) -> Result<i32> {
    let options = cli.load_options()?;

    match cli.command.as_ref() {
        Some(Command::Get { path }) => {
            let config = Config::load(&options)?;
            match config.get(path) {
                Ok(value) => {
                    println!("{}", to_json_string(value)?);
                    Ok(0)
                }
                Err(ConfigError::KeyNotFound { .. }) => {
                    eprintln!("Key not found: {path}");
                    Ok(1)
                }
                Err(err) => Err(err.into()),
            }
        }
        Some(Command::Set { path, value }) => {
            let Some(file_path) = &cli.config else {
                anyhow::bail!("--config must be provided for 'set'");
            };
            // Edit the raw file, not the resolved tree. Empty defaults so
            // TOML key promotion can't rearrange what gets written back.
            let mut tree = load_config_file(file_path, &json!({}))?;
            let parsed = parse_json_or_string(value);
            set_path(&mut tree, path, parsed.clone(), true)?;
            write_config_file(file_path, &tree)?;
            println!("Set {path} = {parsed} in {}", file_path.display());
            Ok(0)
        }
        Some(Command::Exists { path }) => {
            let config = Config::load(&options)?;
            let found = config.contains(path)?;
            println!("{found}");
            Ok(if found { 0 } else { 1 })
        }
        Some(Command::Search {
            key,
            val,
            ignore_case,
        }) => {
            if key.is_none() && val.is_none() {
                anyhow::bail!("supply --key or --val");
            }
            let config = Config::load(&options)?;
            let key_pat = key.as_deref().unwrap_or("");
            let val_pat = val.as_deref().unwrap_or("");

            let mut found = Map::new();
            for (leaf_key, leaf_value) in flatten_leaves(config.data()) {
                let key_hit = match_pattern(key_pat, &leaf_key, *ignore_case);
                let val_hit = match_pattern(val_pat, &leaf_value.to_string(), *ignore_case);
                if key_hit && val_hit {
                    found.insert(leaf_key, leaf_value);
                }
            }
            if found.is_empty() {
                println!("No matches");
                Ok(1)
            } else {
                println!("{}", to_json_string(&Value::Object(found))?);
                Ok(0)
            }
        }
        Some(Command::Dump) | None => {
            let config = Config::load(&options)?;
            println!("{}", config.to_json_string()?);
            Ok(0)
        }
        Some(Command::Convert { to, out }) => {
            let config = Config::load(&options)?;
            let rendered = match to {
                ConvertFormat::Json => config.to_json_string()?,
                ConvertFormat::Toml => config.to_toml_string()?,
            };
            match out {
                Some(path) => {
                    std::fs::write(path, &rendered)?;
                    let label = match to {
                        ConvertFormat::Json => "JSON",
                        ConvertFormat::Toml => "TOML",
                    };
                    println!("Wrote {label} to {}", path.display());
                }
                None => println!("{rendered}"),
            }
            Ok(0)
        }
    }
}
