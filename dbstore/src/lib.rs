//! dbstore: a lightweight data-mapper over a relational database
//!
//! dbstore introspects table schemas, reconciles them with desired column
//! lists through dialect-specific DDL, and persists records through
//! parameterized statements.

pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod schema;
pub mod utils;
pub mod value;

// Re-export main types for easier access
pub use config::Config;
pub use db::{ConnectionGateway, Database, DriverType, MySqlGateway, Params, Row, ScriptedGateway};
pub use error::{Error, Result};
pub use models::{CreateOptions, Join, JoinKind, LoadOptions, Record, SaveOutcome, Table};
pub use schema::{Column, ColumnPosition, Dialect, IndexKind, SchemaAnalyzer, SchemaDiff, TableSchema, TableSpec};
pub use value::FieldValue;

/// Load a configuration file, set up logging and connect to its database
pub async fn init(config_path: &str) -> Result<(Config, Database)> {
    let config = config::load_from_file(config_path)?;
    utils::logging::init_logging(config.logging.as_ref())?;
    let database = Database::connect(&config.database).await?;
    Ok((config, database))
}
