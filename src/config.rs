//! Application configuration, loadable from a TOML file.
//!
//! ```toml
//! [database]
//! db_path = "Plant_Parenthood.db"
//! busy_timeout_ms = 0
//!
//! [http]
//! host = "127.0.0.1"
//! port = 5000
//! ```

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::http_server::HttpServerConfig;
use crate::sqlite::SqliteConfig;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub database: SqliteConfig,
    #[serde(default)]
    pub http: HttpServerConfig,
}

impl AppConfig {
    /// Loads configuration from a file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let config: Self = toml::from_str(&content)
            .with_context(|| format!("failed to parse {}", path.display()))?;
        Ok(config)
    }

    /// Serializes configuration to TOML.
    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::path::PathBuf;
    use tempfile::NamedTempFile;

    #[test]
    fn loads_partial_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "[http]\nport = 8081").unwrap();

        let config = AppConfig::from_file(file.path()).unwrap();
        assert_eq!(config.http.port, 8081);
        assert_eq!(config.http.host, "127.0.0.1");
        assert_eq!(config.database, SqliteConfig::default());
    }

    #[test]
    fn toml_round_trips() {
        let config = AppConfig {
            database: SqliteConfig::new(PathBuf::from("/var/lib/shop.db")),
            http: HttpServerConfig::with_port(9000),
        };
        let text = config.to_toml().unwrap();
        let parsed: AppConfig = toml::from_str(&text).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn missing_file_is_an_error() {
        let err = AppConfig::from_file(Path::new("/definitely/not/here.toml")).unwrap_err();
        assert!(err.to_string().contains("failed to read"));
    }
}
