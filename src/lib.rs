//! conflate: layered configuration resolution.
//!
//! Configuration is assembled from up to five sources in fixed precedence
//! order: programmatic defaults, a JSON or TOML file, a `.env` file,
//! environment variables, and explicit overrides. Every source becomes the
//! same generic tree (`serde_json::Value`) and later sources deep-merge
//! over earlier ones, so overriding one nested key never discards its
//! siblings.
//!
//! ```no_run
//! use conflate::{Config, LoadOptions};
//! use serde_json::json;
//!
//! let options = LoadOptions::new()
//!     .defaults(json!({"database": {"host": "localhost", "port": 5432}}))
//!     .file("app.toml")
//!     .prefix("MYAPP")
//!     .mandatory(["database.host"]);
//! let config = Config::load(&options)?;
//! let port = config.get("database.port")?;
//! # Ok::<(), conflate::ConfigError>(())
//! ```

pub mod cli;
pub mod dotenv;
pub mod env;
pub mod error;
pub mod file;
pub mod loader;
pub mod merge;
pub mod parse;
pub mod path;
pub mod value;

pub use env::EnvSnapshot;
pub use error::{ConfigError, Result};
pub use loader::{Config, LoadOptions};
pub use merge::{deep_merge, deep_merge_all};
pub use parse::parse_value;
