use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// SQLite store configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SqliteConfig {
    /// Path to the SQLite database file
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    /// How long a statement waits on a locked store before failing with
    /// `Busy`. Zero fails immediately.
    #[serde(default)]
    pub busy_timeout_ms: u64,

    /// Enforce `FOREIGN KEY` clauses on every connection
    #[serde(default = "default_foreign_keys")]
    pub foreign_keys: bool,
}

fn default_db_path() -> PathBuf {
    PathBuf::from("Plant_Parenthood.db")
}

fn default_foreign_keys() -> bool {
    true
}

impl Default for SqliteConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            busy_timeout_ms: 0,
            foreign_keys: default_foreign_keys(),
        }
    }
}

impl SqliteConfig {
    /// Create a new SQLite config for the given database file
    pub fn new(db_path: impl Into<PathBuf>) -> Self {
        Self {
            db_path: db_path.into(),
            ..Default::default()
        }
    }

    pub fn with_busy_timeout(mut self, timeout: Duration) -> Self {
        self.busy_timeout_ms = timeout.as_millis().try_into().unwrap_or(u64::MAX);
        self
    }

    pub fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.busy_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = SqliteConfig::default();
        assert_eq!(config.db_path, PathBuf::from("Plant_Parenthood.db"));
        assert_eq!(config.busy_timeout(), Duration::ZERO);
        assert!(config.foreign_keys);
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: SqliteConfig = toml::from_str(r#"db_path = "/tmp/shop.db""#).unwrap();
        assert_eq!(config.db_path, PathBuf::from("/tmp/shop.db"));
        assert_eq!(config.busy_timeout_ms, 0);
        assert!(config.foreign_keys);
    }

    #[test]
    fn test_busy_timeout_builder() {
        let config = SqliteConfig::new("x.db").with_busy_timeout(Duration::from_millis(250));
        assert_eq!(config.busy_timeout_ms, 250);
    }
}
