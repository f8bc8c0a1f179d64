//! `.env` file seeding.
//!
//! Dotenv files do not feed the tree directly; they populate the process
//! environment before the snapshot is captured, so their entries flow
//! through the same mapper as real variables. A missing file is not an
//! error when no explicit path was given.

use crate::error::{ConfigError, Result};
use std::path::Path;
use tracing::debug;

/// Seed the process environment from a `.env` file.
///
/// With no `path`, searches the current directory and its ancestors for a
/// file named `.env` and silently succeeds when none exists. With an
/// explicit `path`, the file must exist. When `overwrite` is set, dotenv
/// entries replace variables already present in the environment.
///
/// Returns whether a file was actually loaded.
pub fn seed_environment(path: Option<&Path>, overwrite: bool) -> Result<bool> {
    let outcome = match (path, overwrite) {
        (Some(path), false) => dotenvy::from_path(path).map(|_| true),
        (Some(path), true) => dotenvy::from_path_override(path).map(|_| true),
        (None, false) => dotenvy::dotenv().map(|found| {
            debug!(path = %found.display(), "loaded .env file");
            true
        }),
        (None, true) => dotenvy::dotenv_override().map(|found| {
            debug!(path = %found.display(), "loaded .env file");
            true
        }),
    };

    match outcome {
        Ok(loaded) => Ok(loaded),
        Err(dotenvy::Error::Io(err)) if err.kind() == std::io::ErrorKind::NotFound => {
            match path {
                Some(path) => Err(ConfigError::FileNotFound {
                    path: path.to_path_buf(),
                }),
                None => Ok(false),
            }
        }
        Err(err) => Err(ConfigError::Dotenv(err.to_string())),
    }
}
