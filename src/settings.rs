//! Settings read from an optional config file and `LOGSIFT__*` environment
//! variables, e.g. `LOGSIFT__SERVER__BIND=0.0.0.0:8080`.

use serde::Deserialize;

use crate::error::Result;
use crate::query::{CompileOptions, UnknownFieldPolicy};
use crate::sql::Dialect;

pub const DEFAULT_CONFIG_FILE: &str = "logsift.toml";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub compiler: CompilerSettings,
    pub store: StoreSettings,
    pub server: ServerSettings,
    pub log: LogSettings,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CompilerSettings {
    pub dialect: Dialect,
    pub unknown_fields: UnknownFieldPolicy,
    pub escape_like_wildcards: bool,
    pub success_status: i64,
}

impl Default for CompilerSettings {
    fn default() -> Self {
        let options = CompileOptions::default();
        Self {
            dialect: Dialect::Sqlite,
            unknown_fields: options.unknown_fields,
            escape_like_wildcards: options.escape_like_wildcards,
            success_status: options.success_status,
        }
    }
}

impl CompilerSettings {
    /// Options for one compilation; `known_tags` is filled in per request.
    pub fn options(&self) -> CompileOptions {
        CompileOptions {
            unknown_fields: self.unknown_fields,
            escape_like_wildcards: self.escape_like_wildcards,
            success_status: self.success_status,
            ..CompileOptions::default()
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct StoreSettings {
    /// SQLite file; in memory when absent.
    pub path: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub bind: String,
    pub max_page_size: u64,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:8080".to_string(),
            max_page_size: 1000,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LogSettings {
    /// Used when `RUST_LOG` is not set.
    pub filter: String,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            filter: "info".to_string(),
        }
    }
}

impl Settings {
    /// Loads `path` (if it exists) overlaid with the environment.
    pub fn load(path: &str) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(path).required(false))
            .add_source(
                config::Environment::with_prefix("LOGSIFT")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;
        Ok(settings)
    }
}
