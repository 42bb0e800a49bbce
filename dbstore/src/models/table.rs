//! Tables
//!
//! A [`Table`] caches its introspected columns and reconciles them with
//! desired column lists through CREATE and ALTER statements.

use std::sync::{Arc, PoisonError, RwLock};

use crate::db::gateway::{ConnectionGateway, Params, Row};
use crate::error::{Error, Result};
use crate::models::record::Record;
use crate::schema::analyzer::SchemaAnalyzer;
use crate::schema::column::Column;
use crate::schema::dialect::Dialect;
use crate::schema::diff::{ColumnPosition, SchemaDiff};
use crate::schema::generator::DdlGenerator;
use crate::schema::types::{validate_columns, TableSchema};
use crate::utils::naming::strip_non_word;
use crate::value::FieldValue;

/// Options for [`Table::create`]
#[derive(Debug, Clone, Copy)]
pub struct CreateOptions {
    /// Drop any existing table first
    pub drop: bool,
    /// Declare column indexes along with the table
    pub include_index: bool,
}

impl Default for CreateOptions {
    fn default() -> Self {
        Self {
            drop: false,
            include_index: true,
        }
    }
}

/// A table in a database
pub struct Table {
    gateway: Arc<dyn ConnectionGateway>,
    dialect: Arc<dyn Dialect>,
    database: String,
    name: String,
    character_set: String,
    primary_index_field: Option<String>,
    columns: RwLock<Option<Arc<TableSchema>>>,
}

impl Table {
    /// Create a handle; the name is stripped of non-word characters
    pub fn new(
        gateway: Arc<dyn ConnectionGateway>,
        dialect: Arc<dyn Dialect>,
        database: &str,
        name: &str,
        character_set: &str,
    ) -> Self {
        Self {
            gateway,
            dialect,
            database: database.to_string(),
            name: strip_non_word(name),
            character_set: character_set.to_string(),
            primary_index_field: None,
            columns: RwLock::new(None),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn database(&self) -> &str {
        &self.database
    }

    pub fn dialect(&self) -> &dyn Dialect {
        self.dialect.as_ref()
    }

    pub fn gateway(&self) -> &dyn ConnectionGateway {
        self.gateway.as_ref()
    }

    /// Field used as the default record key
    pub fn primary_index_field(&self) -> Option<&str> {
        self.primary_index_field.as_deref()
    }

    pub fn set_primary_index_field(&mut self, field: &str) {
        self.primary_index_field = Some(field.to_string());
    }

    fn generator(&self) -> DdlGenerator<'_> {
        DdlGenerator::new(self.dialect.as_ref(), &self.database, &self.name, &self.character_set)
    }

    fn cached(&self) -> Option<Arc<TableSchema>> {
        self.columns.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Ordered columns, introspected on first use
    ///
    /// An empty schema means the table does not exist; it is not cached.
    pub async fn columns(&self) -> Result<Arc<TableSchema>> {
        match self.cached() {
            Some(schema) => Ok(schema),
            None => self.reload_columns().await,
        }
    }

    /// Introspect the table again, replacing the cache
    pub async fn reload_columns(&self) -> Result<Arc<TableSchema>> {
        let analyzer = SchemaAnalyzer::new(self.gateway.as_ref(), self.dialect.as_ref(), &self.database);
        let loaded = analyzer.load_columns(&self.name).await?;

        let mut cache = self.columns.write().unwrap_or_else(PoisonError::into_inner);
        match loaded {
            Some(schema) => {
                let schema = Arc::new(schema);
                *cache = Some(schema.clone());
                Ok(schema)
            }
            None => {
                *cache = None;
                Ok(Arc::new(TableSchema::new()))
            }
        }
    }

    /// Descriptor of a single column
    pub async fn column(&self, name: &str) -> Result<Option<Column>> {
        Ok(self.columns().await?.get(name).cloned())
    }

    /// Whether the table exists in its database
    pub async fn exists(&self) -> Result<bool> {
        let mut params = Params::new();
        params.insert("schema".to_string(), FieldValue::from(self.database.as_str()));
        params.insert("name".to_string(), FieldValue::from(self.name.as_str()));
        let rows = self.gateway.query(self.dialect.table_exists_query(), &params).await?;
        Ok(!rows.is_empty())
    }

    /// Statements [`Table::create`] would run
    pub fn plan_create(&self, desired: &[Column], options: CreateOptions) -> Result<Vec<String>> {
        TableSchema::from_columns(desired.iter().cloned())?;
        validate_columns(desired)?;

        let generator = self.generator();
        let mut statements = Vec::new();
        if options.drop {
            statements.push(generator.drop_table_sql());
        }
        statements.extend(generator.create_table_sql(desired, options.include_index));
        Ok(statements)
    }

    /// Create the table from a desired column list
    pub async fn create(&self, desired: &[Column], options: CreateOptions) -> Result<Vec<String>> {
        let statements = self.plan_create(desired, options)?;
        tracing::info!(table = %self.name, statements = statements.len(), "Creating table");
        self.run(&statements).await?;
        self.reload_columns().await?;
        Ok(statements)
    }

    /// Statements [`Table::alter`] would run against the live schema
    pub async fn plan_alter(&self, desired: &[Column]) -> Result<Vec<String>> {
        TableSchema::from_columns(desired.iter().cloned())?;
        validate_columns(desired)?;

        let current = self.columns().await?;
        if current.is_empty() {
            return Err(Error::SchemaError(format!(
                "Cannot alter table {}: it does not exist",
                self.name
            )));
        }

        let diff = SchemaDiff::generate(&current, desired, self.dialect.supports_column_positioning());
        Ok(self.generator().alter_sql(&diff))
    }

    /// Converge the live table to a desired column list
    ///
    /// Statements run one by one; a failure stops the sequence and leaves
    /// earlier changes applied.
    pub async fn alter(&self, desired: &[Column]) -> Result<Vec<String>> {
        let statements = self.plan_alter(desired).await?;
        if statements.is_empty() {
            tracing::debug!(table = %self.name, "Table already matches desired columns");
            return Ok(statements);
        }

        tracing::info!(table = %self.name, statements = statements.len(), "Altering table");
        self.run(&statements).await?;
        self.reload_columns().await?;
        Ok(statements)
    }

    /// Add a single column
    pub async fn add_column(&self, column: &Column, position: ColumnPosition) -> Result<Vec<String>> {
        let current = self.columns().await?;
        if current.contains(column.name()) {
            return Err(Error::ValidationError(format!(
                "Column {} already exists in {}",
                column.name(),
                self.name
            )));
        }
        validate_columns(current.iter().chain(std::iter::once(column)))?;

        let statements = self.generator().add_column_sql(column, position);
        tracing::info!(table = %self.name, column = column.name(), "Adding column");
        self.run(&statements).await?;
        self.reload_columns().await?;
        Ok(statements)
    }

    async fn run(&self, statements: &[String]) -> Result<()> {
        for statement in statements {
            self.gateway.execute(statement).await?;
        }
        Ok(())
    }

    /// Run a query against the table's connection
    pub async fn query(&self, sql: &str, params: &Params) -> Result<Vec<Row>> {
        self.gateway.query(sql, params).await
    }

    /// Records returned by a query, `SELECT * FROM <table>` by default
    pub async fn records(&self, sql: Option<&str>, params: &Params) -> Result<Vec<Record<'_>>> {
        let default_sql;
        let sql = match sql {
            Some(sql) => sql,
            None => {
                default_sql = format!("SELECT * FROM {}", self.name);
                &default_sql
            }
        };

        let rows = self.gateway.query(sql, params).await?;
        Ok(rows
            .into_iter()
            .map(|row| {
                let mut record = self.new_record();
                record.set_values(row);
                record.mark_synched(true);
                record
            })
            .collect())
    }

    /// Empty record bound to this table
    pub fn new_record(&self) -> Record<'_> {
        Record::new(self)
    }
}

impl std::fmt::Debug for Table {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Table")
            .field("database", &self.database)
            .field("name", &self.name)
            .field("dialect", &self.dialect.name())
            .finish()
    }
}
