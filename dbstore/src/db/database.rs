//! Database facade
//!
//! A [`Database`] pairs a connection gateway with the dialect selected for
//! its driver and hands out [`Table`] handles.

use std::sync::Arc;

use crate::config::DatabaseConfig;
use crate::db::connection::MySqlGateway;
use crate::db::gateway::{ConnectionGateway, DriverType, Params};
use crate::error::Result;
use crate::models::table::{CreateOptions, Table};
use crate::schema::dialect::{for_driver, Dialect};
use crate::schema::types::TableSpec;

/// A named database reached through a gateway
#[derive(Clone)]
pub struct Database {
    gateway: Arc<dyn ConnectionGateway>,
    dialect: Arc<dyn Dialect>,
    name: String,
    character_set: String,
}

impl Database {
    /// Wrap an established gateway; the dialect follows its driver type
    pub fn new(gateway: Arc<dyn ConnectionGateway>, name: &str, character_set: &str) -> Self {
        let dialect = for_driver(gateway.driver_type());
        Self {
            gateway,
            dialect,
            name: name.to_string(),
            character_set: character_set.to_string(),
        }
    }

    /// Connect through sqlx using the configured credentials
    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        let gateway = MySqlGateway::connect(config).await?;
        Ok(Self::new(
            Arc::new(gateway),
            config.database_name(),
            &config.character_set,
        ))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn character_set(&self) -> &str {
        &self.character_set
    }

    pub fn driver(&self) -> DriverType {
        self.gateway.driver_type()
    }

    pub fn dialect(&self) -> &dyn Dialect {
        self.dialect.as_ref()
    }

    pub fn gateway(&self) -> &dyn ConnectionGateway {
        self.gateway.as_ref()
    }

    /// Handle for a table in this database
    pub fn table(&self, name: &str) -> Table {
        Table::new(
            self.gateway.clone(),
            self.dialect.clone(),
            &self.name,
            name,
            &self.character_set,
        )
    }

    pub async fn table_exists(&self, name: &str) -> Result<bool> {
        self.table(name).exists().await
    }

    /// Run `SELECT 1`; a failing statement reports `false`
    pub async fn test_connection(&self) -> Result<bool> {
        match self.gateway.query("SELECT 1", &Params::new()).await {
            Ok(_) => Ok(true),
            Err(e) => {
                tracing::warn!(error = %e, "Connection test failed");
                Ok(false)
            }
        }
    }

    /// Message of the most recent failed statement
    pub fn last_error(&self) -> Option<String> {
        self.gateway.last_error()
    }

    /// Statements [`Database::sync`] would run for a table definition
    pub async fn plan_sync(&self, spec: &TableSpec) -> Result<Vec<String>> {
        let desired = spec.columns()?;
        let table = self.table(&spec.name);
        if spec.recreate || !table.exists().await? {
            table.plan_create(&desired, Self::create_options(spec))
        } else {
            table.plan_alter(&desired).await
        }
    }

    /// Create the table when missing (or marked for recreation), alter it otherwise
    pub async fn sync(&self, spec: &TableSpec) -> Result<Vec<String>> {
        let desired = spec.columns()?;
        let table = self.table(&spec.name);
        if spec.recreate || !table.exists().await? {
            table.create(&desired, Self::create_options(spec)).await
        } else {
            table.alter(&desired).await
        }
    }

    fn create_options(spec: &TableSpec) -> CreateOptions {
        CreateOptions {
            drop: spec.recreate,
            ..CreateOptions::default()
        }
    }
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database")
            .field("name", &self.name)
            .field("character_set", &self.character_set)
            .field("dialect", &self.dialect.name())
            .finish()
    }
}
