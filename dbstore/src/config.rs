//! Configuration handling for dbstore

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::db::gateway::DriverType;
use crate::error::{Error, Result};
use crate::schema::types::TableSpec;

/// Load configuration from a TOML file
pub fn load_from_file(path: impl AsRef<Path>) -> Result<Config> {
    let path = path.as_ref();
    let config_str = fs::read_to_string(path)
        .map_err(|e| Error::ConfigError(format!("Failed to read config file {}: {}", path.display(), e)))?;

    let config: Config = toml::from_str(&config_str)
        .map_err(|e| Error::ConfigError(format!("Failed to parse config file: {}", e)))?;

    Ok(config)
}

/// Represents the complete dbstore configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct Config {
    pub database: DatabaseConfig,
    pub logging: Option<LoggingConfig>,
    pub schema: Option<SchemaConfig>,
    /// Desired table schemas applied by `sync`
    #[serde(default)]
    pub tables: Vec<TableSpec>,
}

impl Config {
    /// Whether schema changes should only be planned
    pub fn dry_run(&self) -> bool {
        self.schema.as_ref().map(|s| s.dry_run).unwrap_or(false)
    }
}

/// Database connection configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct DatabaseConfig {
    #[serde(default = "default_driver")]
    pub driver: DriverType,
    pub host: Option<String>,
    pub port: Option<u16>,
    pub database: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    #[serde(default = "default_character_set")]
    pub character_set: String,
    pub pool_size: Option<u32>,
    pub timeout_seconds: Option<u64>,
    /// Driver options; override the dialect's connection defaults
    #[serde(default)]
    pub options: IndexMap<String, String>,
}

fn default_driver() -> DriverType {
    DriverType::MySql
}

fn default_character_set() -> String {
    "utf8".to_string()
}

impl DatabaseConfig {
    /// Check that every connection parameter is present
    pub fn validate(&self) -> Result<()> {
        let missing = [&self.host, &self.database, &self.username, &self.password]
            .iter()
            .any(|v| v.as_deref().map_or(true, |s| s.trim().is_empty()));
        if missing {
            return Err(Error::ConfigError(
                "Please define a host, database, username and password before attempting a connection."
                    .to_string(),
            ));
        }
        Ok(())
    }

    /// Port, defaulting per driver
    pub fn port(&self) -> u16 {
        self.port.unwrap_or(if self.driver.is_tds() { 1433 } else { 3306 })
    }

    /// Database name, empty when unset
    pub fn database_name(&self) -> &str {
        self.database.as_deref().unwrap_or_default()
    }

    /// Connection URL with the password masked, for logs and errors
    pub fn display_url(&self) -> String {
        format!(
            "{}://{}:***@{}:{}/{}",
            self.driver,
            self.username.as_deref().unwrap_or_default(),
            self.host.as_deref().unwrap_or_default(),
            self.port(),
            self.database_name()
        )
    }
}

/// Schema reconciliation behavior
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
#[serde(deny_unknown_fields)]
pub struct SchemaConfig {
    /// Print planned statements instead of executing them
    #[serde(default)]
    pub dry_run: bool,
}

/// Logging configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct LoggingConfig {
    #[serde(default = "default_level")]
    pub level: String,
    pub file: Option<String>,
    #[serde(default = "default_format")]
    pub format: String,
    #[serde(default = "default_true")]
    pub stdout: bool,
    #[serde(default = "default_true")]
    pub include_timestamps: bool,
}

fn default_level() -> String {
    "info".to_string()
}

fn default_format() -> String {
    "text".to_string()
}

fn default_true() -> bool {
    true
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
            file: None,
            format: default_format(),
            stdout: true,
            include_timestamps: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Write;

    const SAMPLE: &str = r#"
[database]
host = "localhost"
database = "shop"
username = "app"
password = "secret"

[database.options]
compress = "false"

[logging]
level = "debug"
format = "json"

[schema]
dry_run = true

[[tables]]
name = "users"

[[tables.columns]]
name = "id"
type = "INT"
auto_increment = true
index = "PRIMARY"

[[tables.columns]]
name = "email"
type = "VARCHAR"
length = 255
index = "UNIQUE"
"#;

    #[test]
    fn loads_config_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SAMPLE.as_bytes()).unwrap();

        let config = load_from_file(file.path()).unwrap();
        assert_eq!(config.database.driver, DriverType::MySql);
        assert_eq!(config.database.port(), 3306);
        assert_eq!(config.database.character_set, "utf8");
        assert_eq!(config.database.options.get("compress").map(String::as_str), Some("false"));
        assert!(config.dry_run());
        assert_eq!(config.tables.len(), 1);
        assert_eq!(config.tables[0].columns().unwrap().len(), 2);
        assert_eq!(config.logging.unwrap().format, "json");
        assert!(config.database.validate().is_ok());
    }

    #[test]
    fn rejects_unknown_keys() {
        let parsed: std::result::Result<Config, _> = toml::from_str(
            r#"
[database]
host = "localhost"
hostname = "typo"
"#,
        );
        assert!(parsed.is_err());
    }

    #[test]
    fn missing_credentials_fail_validation() {
        let config: Config = toml::from_str("[database]\nhost = \"db\"\ndatabase = \"shop\"\n").unwrap();
        match config.database.validate() {
            Err(Error::ConfigError(message)) => assert_eq!(
                message,
                "Please define a host, database, username and password before attempting a connection."
            ),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn tds_defaults_to_its_port() {
        let config: Config = toml::from_str("[database]\ndriver = \"sqlsrv\"\n").unwrap();
        assert_eq!(config.database.port(), 1433);
        assert!(config.database.display_url().starts_with("sqlsrv://"));
    }
}
