//! Connection gateway contract
//!
//! The core never opens connections itself. Everything it needs from a live
//! database goes through [`ConnectionGateway`].

use async_trait::async_trait;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};
use crate::value::FieldValue;

/// A result row, column name to value, in select order
pub type Row = IndexMap<String, FieldValue>;

/// Named statement parameters, keyed by marker name without the leading colon
pub type Params = IndexMap<String, FieldValue>;

/// Driver family reported by a gateway
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DriverType {
    MySql,
    SqlSrv,
    DbLib,
}

impl DriverType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DriverType::MySql => "mysql",
            DriverType::SqlSrv => "sqlsrv",
            DriverType::DbLib => "dblib",
        }
    }

    /// SQL Server and Sybase drivers share the TDS dialect
    pub fn is_tds(&self) -> bool {
        matches!(self, DriverType::SqlSrv | DriverType::DbLib)
    }
}

impl fmt::Display for DriverType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DriverType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "mysql" => Ok(DriverType::MySql),
            "sqlsrv" => Ok(DriverType::SqlSrv),
            "dblib" => Ok(DriverType::DbLib),
            other => Err(Error::ConfigError(format!("Unsupported database driver: {}", other))),
        }
    }
}

/// Executes statements against a live connection
#[async_trait]
pub trait ConnectionGateway: Send + Sync {
    /// Run a statement with named `:marker` parameters and return its rows
    async fn query(&self, sql: &str, params: &Params) -> Result<Vec<Row>>;

    /// Run a non-parameterized statement and return the affected row count
    async fn execute(&self, sql: &str) -> Result<u64>;

    /// Id generated by the most recent statement; `None` when it generated none
    fn last_insert_id(&self, sequence: Option<&str>) -> Option<String>;

    fn driver_type(&self) -> DriverType;

    /// Message of the most recent failed statement
    fn last_error(&self) -> Option<String>;
}

/// Look up a row value by column name, falling back to a case-insensitive match
pub fn row_value<'a>(row: &'a Row, key: &str) -> Option<&'a FieldValue> {
    row.get(key).or_else(|| {
        row.iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(key))
            .map(|(_, value)| value)
    })
}

/// Non-null row value rendered as text
pub fn row_text(row: &Row, key: &str) -> Option<String> {
    row_value(row, key)
        .filter(|value| !value.is_null())
        .map(FieldValue::render)
}
