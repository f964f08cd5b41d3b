//! Mock configuration
//!
//! A flat mapping of option name to value. The two recognized options have
//! typed fields; anything else is kept in `extra` so that callers can stash
//! their own options next to them.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::env;
use std::path::PathBuf;
use tracing::{info, warn};

/// Environment variable overriding `sql_file_base_path`
pub const ENV_SQL_FILE_BASE_PATH: &str = "SQLMOCK_SQL_FILE_BASE_PATH";

/// Environment variable overriding `ignore_failed_connections`
pub const ENV_IGNORE_FAILED_CONNECTIONS: &str = "SQLMOCK_IGNORE_FAILED_CONNECTIONS";

/// Mock configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MockConfig {
    /// Directory relative file mock paths are resolved against
    #[serde(default = "default_sql_file_base_path", alias = "sqlFileBasePath")]
    pub sql_file_base_path: PathBuf,

    /// Treat a failed connection as a successful one
    #[serde(
        default = "default_ignore_failed_connections",
        alias = "ignoreFailedConnections"
    )]
    pub ignore_failed_connections: bool,

    /// Options without a typed field
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

fn default_sql_file_base_path() -> PathBuf {
    env::current_dir().unwrap_or_else(|_| PathBuf::from("."))
}

fn default_ignore_failed_connections() -> bool {
    true
}

impl Default for MockConfig {
    fn default() -> Self {
        Self {
            sql_file_base_path: default_sql_file_base_path(),
            ignore_failed_connections: default_ignore_failed_connections(),
            extra: Map::new(),
        }
    }
}

impl MockConfig {
    /// Defaults overridden by environment variables
    pub fn from_env() -> Self {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Defaults overridden by whatever `lookup` returns for the variables
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(path) = lookup(ENV_SQL_FILE_BASE_PATH) {
            config.sql_file_base_path = PathBuf::from(path);
        }

        if let Some(flag) = lookup(ENV_IGNORE_FAILED_CONNECTIONS) {
            match parse_flag(&flag) {
                Some(value) => config.ignore_failed_connections = value,
                None => warn!("Invalid {} value: {}", ENV_IGNORE_FAILED_CONNECTIONS, flag),
            }
        }

        config
    }

    /// Merge an update over this configuration
    pub fn apply(&mut self, update: MockConfigUpdate) {
        if let Some(path) = update.sql_file_base_path {
            info!("Mock sql_file_base_path set to {}", path.display());
            self.sql_file_base_path = path;
        }
        if let Some(flag) = update.ignore_failed_connections {
            info!("Mock ignore_failed_connections set to {}", flag);
            self.ignore_failed_connections = flag;
        }
        self.extra.extend(update.extra);
    }

    /// Value of an option by name; typed options answer to both spellings
    pub fn value(&self, name: &str) -> Option<Value> {
        match name {
            "sql_file_base_path" | "sqlFileBasePath" => Some(Value::String(
                self.sql_file_base_path.to_string_lossy().into_owned(),
            )),
            "ignore_failed_connections" | "ignoreFailedConnections" => {
                Some(Value::Bool(self.ignore_failed_connections))
            }
            other => self.extra.get(other).cloned(),
        }
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Partial configuration applied by `set_mock_config` and `attach`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MockConfigUpdate {
    /// New SQL file base directory
    #[serde(default, alias = "sql_file_base_path")]
    pub sql_file_base_path: Option<PathBuf>,

    /// New connection failure handling
    #[serde(default, alias = "ignore_failed_connections")]
    pub ignore_failed_connections: Option<bool>,

    /// Other options to set
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl MockConfigUpdate {
    /// Empty update
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the SQL file base directory
    pub fn sql_file_base_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.sql_file_base_path = Some(path.into());
        self
    }

    /// Set connection failure handling
    pub fn ignore_failed_connections(mut self, flag: bool) -> Self {
        self.ignore_failed_connections = Some(flag);
        self
    }

    /// Set an untyped option
    pub fn option(mut self, name: impl Into<String>, value: Value) -> Self {
        self.extra.insert(name.into(), value);
        self
    }
}
