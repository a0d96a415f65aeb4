use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Top-level settings, read from `sqlshift.toml` or `sqlshift.yml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// SQLite database file to migrate.
    pub database: PathBuf,
    pub migrations_dir: PathBuf,
    pub ledger_table: String,
    pub log: LogConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database: PathBuf::from("sqlshift.db"),
            migrations_dir: PathBuf::from("migrations"),
            ledger_table: "schema_migration".to_string(),
            log: LogConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Filter directive used when `RUST_LOG` is unset.
    pub level: String,
    pub json: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}
