//! Engine configuration.

use serde::{Deserialize, Serialize};

/// Display templates for date and time values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FormatConfig {
    pub date_format: String,
    pub time_format: String,
    pub date_time_format: String,
}

impl Default for FormatConfig {
    fn default() -> Self {
        Self {
            date_format: "dd.mm.yyyy".to_string(),
            time_format: "hh:ii:ss".to_string(),
            date_time_format: "dd.mm.yyyy hh:ii:ss".to_string(),
        }
    }
}

/// SQLite database configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Path to the SQLite database file, `:memory:` for an in-memory database
    pub db_path: String,
    /// Display templates handed to every table opened through the database
    pub format: FormatConfig,
    /// Drop scratch-table metadata left over from a previous run
    pub purge_scratch_on_open: bool,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            db_path: ":memory:".to_string(),
            format: FormatConfig::default(),
            purge_scratch_on_open: true,
        }
    }
}

impl DatabaseConfig {
    /// Create a new config for the database file at `db_path`
    pub fn new(db_path: impl Into<String>) -> Self {
        Self {
            db_path: db_path.into(),
            ..Default::default()
        }
    }

    pub fn with_format(mut self, format: FormatConfig) -> Self {
        self.format = format;
        self
    }

    pub fn is_in_memory(&self) -> bool {
        self.db_path == ":memory:"
    }
}
