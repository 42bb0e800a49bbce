//! SQL dialects
//!
//! Every piece of backend-specific SQL the core emits is decided here, once
//! per connection. MySQL and the TDS family (SQL Server and Sybase through
//! the `sqlsrv`/`dblib` drivers) are supported.

use std::fmt;
use std::sync::Arc;

use crate::db::gateway::{row_text, row_value, DriverType, Params, Row};
use crate::schema::column::{is_fixed_length_type, IndexKind};
use crate::value::FieldValue;

/// Backend-specific SQL rules
pub trait Dialect: Send + Sync + fmt::Debug {
    /// Dialect identifier
    fn name(&self) -> &'static str;

    /// Quote an identifier in statement column lists
    fn quote_ident(&self, name: &str) -> String;

    /// Database-qualified table name used in DDL
    fn qualify_table(&self, database: &str, table: &str) -> String;

    fn auto_increment_keyword(&self) -> &'static str;

    /// Blob/text types never carry a length clause
    fn is_fixed_length(&self, data_type: &str) -> bool {
        is_fixed_length_type(data_type)
    }

    /// Length used for character types declared without one
    fn default_length(&self, data_type: &str) -> Option<&'static str> {
        match data_type.to_uppercase().as_str() {
            "VARCHAR" | "CHAR" => Some("11"),
            _ => None,
        }
    }

    /// Whether ALTER statements can place a column with `AFTER`/`FIRST`
    fn supports_column_positioning(&self) -> bool;

    /// Column introspection query; binds `:table` and `:database`
    fn columns_query(&self, table: &str) -> String;

    /// Whether an introspected column row describes an auto-increment column
    fn is_auto_increment_row(&self, row: &Row) -> bool;

    /// Index introspection query and its parameters
    fn index_query(&self, database: &str, table: &str) -> (String, Params);

    /// Column name and index kind described by one index row
    fn parse_index_row(&self, row: &Row) -> Option<(String, IndexKind)>;

    /// Table existence query; binds `:schema` and `:name`
    fn table_exists_query(&self) -> &'static str;

    /// Index clause placed inside the CREATE TABLE column list
    fn inline_index_clause(&self, column: &str, kind: IndexKind) -> Option<String>;

    /// Standalone index statement executed after CREATE TABLE
    fn create_index_statement(&self, table: &str, column: &str, kind: IndexKind) -> Option<String>;

    /// Close a CREATE TABLE statement whose column list is still open
    fn finish_create_table(&self, sql: String, character_set: &str) -> String;

    /// Clause introducing an in-place column change
    fn modify_column_clause(&self) -> &'static str;

    /// Clause introducing a new column
    fn add_column_clause(&self) -> &'static str;

    /// Index creation during ALTER
    fn add_index_statement(
        &self,
        qualified_table: &str,
        table: &str,
        column: &str,
        kind: IndexKind,
    ) -> Option<String>;

    /// Index removal during ALTER; `None` when the dialect cannot express it
    fn drop_index_statement(
        &self,
        qualified_table: &str,
        table: &str,
        column: &str,
        kind: IndexKind,
    ) -> Option<String>;

    fn drop_table_statement(&self, table: &str) -> String {
        format!("DROP TABLE IF EXISTS {}", table)
    }

    /// Driver options applied when a connection is opened
    fn connection_defaults(&self, character_set: &str) -> Vec<(&'static str, String)>;
}

/// Pick the dialect for a driver
pub fn for_driver(driver: DriverType) -> Arc<dyn Dialect> {
    match driver {
        DriverType::MySql => Arc::new(MySqlDialect),
        DriverType::SqlSrv | DriverType::DbLib => Arc::new(TdsDialect),
    }
}

/// MySQL / MariaDB
#[derive(Debug, Clone, Copy, Default)]
pub struct MySqlDialect;

impl Dialect for MySqlDialect {
    fn name(&self) -> &'static str {
        "mysql"
    }

    fn quote_ident(&self, name: &str) -> String {
        name.to_string()
    }

    fn qualify_table(&self, database: &str, table: &str) -> String {
        format!("{}.{}", database, table)
    }

    fn auto_increment_keyword(&self) -> &'static str {
        "AUTO_INCREMENT"
    }

    fn supports_column_positioning(&self) -> bool {
        true
    }

    fn columns_query(&self, _table: &str) -> String {
        "SELECT * FROM INFORMATION_SCHEMA.Columns WHERE TABLE_NAME=:table AND TABLE_SCHEMA=:database ORDER BY ORDINAL_POSITION"
            .to_string()
    }

    fn is_auto_increment_row(&self, row: &Row) -> bool {
        row_text(row, "EXTRA")
            .map(|extra| extra.to_lowercase().contains("auto_increment"))
            .unwrap_or(false)
    }

    fn index_query(&self, database: &str, table: &str) -> (String, Params) {
        let mut params = Params::new();
        params.insert("db".to_string(), FieldValue::from(database));
        params.insert("table".to_string(), FieldValue::from(table));
        (
            "SELECT COLUMN_NAME, COLUMN_KEY FROM INFORMATION_SCHEMA.COLUMNS WHERE TABLE_SCHEMA=:db AND TABLE_NAME=:table AND COLUMN_KEY<>''"
                .to_string(),
            params,
        )
    }

    fn parse_index_row(&self, row: &Row) -> Option<(String, IndexKind)> {
        let column = row_text(row, "COLUMN_NAME")?;
        let kind = match row_text(row, "COLUMN_KEY")?.as_str() {
            "" => return None,
            "PRI" => IndexKind::Primary,
            "UNI" => IndexKind::Unique,
            _ => IndexKind::Index,
        };
        Some((column, kind))
    }

    fn table_exists_query(&self) -> &'static str {
        "SELECT TABLE_NAME FROM information_schema.tables WHERE table_schema=:schema AND table_name=:name"
    }

    fn inline_index_clause(&self, column: &str, kind: IndexKind) -> Option<String> {
        Some(match kind {
            IndexKind::Primary => format!("PRIMARY KEY({})", column),
            IndexKind::Unique => format!("UNIQUE({})", column),
            IndexKind::Index => format!("INDEX({})", column),
        })
    }

    fn create_index_statement(&self, _table: &str, _column: &str, _kind: IndexKind) -> Option<String> {
        None
    }

    fn finish_create_table(&self, mut sql: String, character_set: &str) -> String {
        sql.push_str(") CHARACTER SET ");
        sql.push_str(character_set);
        sql
    }

    fn modify_column_clause(&self) -> &'static str {
        "MODIFY"
    }

    fn add_column_clause(&self) -> &'static str {
        "ADD COLUMN"
    }

    fn add_index_statement(
        &self,
        qualified_table: &str,
        _table: &str,
        column: &str,
        kind: IndexKind,
    ) -> Option<String> {
        Some(match kind {
            IndexKind::Primary => format!("ALTER TABLE {} ADD PRIMARY KEY({})", qualified_table, column),
            IndexKind::Unique => format!("ALTER TABLE {} ADD UNIQUE INDEX {}({})", qualified_table, column, column),
            IndexKind::Index => format!("ALTER TABLE {} ADD INDEX {}({})", qualified_table, column, column),
        })
    }

    fn drop_index_statement(
        &self,
        qualified_table: &str,
        _table: &str,
        column: &str,
        kind: IndexKind,
    ) -> Option<String> {
        Some(match kind {
            IndexKind::Primary => format!("ALTER TABLE {} DROP PRIMARY KEY", qualified_table),
            _ => format!("ALTER TABLE {} DROP INDEX {}", qualified_table, column),
        })
    }

    fn connection_defaults(&self, character_set: &str) -> Vec<(&'static str, String)> {
        let charset = character_set.to_lowercase();
        vec![
            ("compress", "true".to_string()),
            ("charset", charset.clone()),
            (
                "init_command",
                format!(
                    "SET NAMES {cs}; SET character_set_results = '{cs}', character_set_client = '{cs}', character_set_connection = '{cs}', character_set_database = '{cs}', character_set_server = '{cs}'",
                    cs = charset
                ),
            ),
        ]
    }
}

/// SQL Server / Sybase (TDS protocol family)
#[derive(Debug, Clone, Copy, Default)]
pub struct TdsDialect;

impl Dialect for TdsDialect {
    fn name(&self) -> &'static str {
        "tds"
    }

    fn quote_ident(&self, name: &str) -> String {
        format!("[{}]", name.replace(']', "]]"))
    }

    fn qualify_table(&self, database: &str, table: &str) -> String {
        format!("{}..{}", database, table)
    }

    fn auto_increment_keyword(&self) -> &'static str {
        "IDENTITY(1,1)"
    }

    fn supports_column_positioning(&self) -> bool {
        false
    }

    fn columns_query(&self, table: &str) -> String {
        format!(
            "SELECT COLUMNPROPERTY(object_id('{}'), COLUMN_NAME, 'IsIdentity') AS AUTO_INCREMENTS, * FROM (SELECT * FROM INFORMATION_SCHEMA.Columns WHERE TABLE_NAME=:table AND TABLE_CATALOG=:database) AS a ORDER BY ORDINAL_POSITION",
            table
        )
    }

    fn is_auto_increment_row(&self, row: &Row) -> bool {
        row_value(row, "AUTO_INCREMENTS")
            .map(FieldValue::is_truthy)
            .unwrap_or(false)
    }

    fn index_query(&self, _database: &str, table: &str) -> (String, Params) {
        (format!("EXEC sp_helpindex {}", table), Params::new())
    }

    fn parse_index_row(&self, row: &Row) -> Option<(String, IndexKind)> {
        let column = row_text(row, "index_keys")?;
        let description = row_text(row, "index_description")
            .unwrap_or_default()
            .to_lowercase();
        // Drop the filegroup suffix, e.g. "located on PRIMARY".
        let description = match description.find(" located on ") {
            Some(at) => &description[..at],
            None => description.as_str(),
        };
        let kind = if description.contains("primary key") {
            IndexKind::Primary
        } else if description.contains("unique") {
            IndexKind::Unique
        } else {
            IndexKind::Index
        };
        Some((column, kind))
    }

    fn table_exists_query(&self) -> &'static str {
        "SELECT TABLE_NAME FROM information_schema.tables WHERE table_catalog=:schema AND table_name=:name"
    }

    fn inline_index_clause(&self, _column: &str, _kind: IndexKind) -> Option<String> {
        None
    }

    fn create_index_statement(&self, table: &str, column: &str, kind: IndexKind) -> Option<String> {
        Some(match kind {
            IndexKind::Primary | IndexKind::Unique => format!(
                "CREATE UNIQUE NONCLUSTERED INDEX {} ON {} ({});",
                column, table, column
            ),
            IndexKind::Index => format!("CREATE NONCLUSTERED INDEX {} ON {} ({});", column, table, column),
        })
    }

    fn finish_create_table(&self, mut sql: String, _character_set: &str) -> String {
        sql.push_str(");");
        sql
    }

    fn modify_column_clause(&self) -> &'static str {
        "ALTER COLUMN"
    }

    fn add_column_clause(&self) -> &'static str {
        "ADD"
    }

    fn add_index_statement(
        &self,
        qualified_table: &str,
        table: &str,
        column: &str,
        kind: IndexKind,
    ) -> Option<String> {
        match kind {
            IndexKind::Primary => Some(format!("ALTER TABLE {} ADD PRIMARY KEY ({})", qualified_table, column)),
            _ => self.create_index_statement(table, column, kind),
        }
    }

    fn drop_index_statement(
        &self,
        _qualified_table: &str,
        table: &str,
        column: &str,
        kind: IndexKind,
    ) -> Option<String> {
        match kind {
            // Primary key constraints are named by the server.
            IndexKind::Primary => None,
            _ => Some(format!("DROP INDEX {} ON {}", column, table)),
        }
    }

    fn connection_defaults(&self, _character_set: &str) -> Vec<(&'static str, String)> {
        Vec::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn selects_dialect_by_driver() {
        assert_eq!(for_driver(DriverType::MySql).name(), "mysql");
        assert_eq!(for_driver(DriverType::SqlSrv).name(), "tds");
        assert_eq!(for_driver(DriverType::DbLib).name(), "tds");
    }

    #[test]
    fn quoting() {
        assert_eq!(MySqlDialect.quote_ident("name"), "name");
        assert_eq!(TdsDialect.quote_ident("name"), "[name]");
        assert_eq!(TdsDialect.quote_ident("a]b"), "[a]]b]");
    }

    #[test]
    fn mysql_index_rows() {
        let mut row = Row::new();
        row.insert("COLUMN_NAME".into(), FieldValue::from("email"));
        row.insert("COLUMN_KEY".into(), FieldValue::from("UNI"));
        assert_eq!(
            MySqlDialect.parse_index_row(&row),
            Some(("email".to_string(), IndexKind::Unique))
        );
        row.insert("COLUMN_KEY".into(), FieldValue::from("MUL"));
        assert_eq!(
            MySqlDialect.parse_index_row(&row),
            Some(("email".to_string(), IndexKind::Index))
        );
    }

    #[test]
    fn tds_index_rows() {
        let mut row = Row::new();
        row.insert("index_keys".into(), FieldValue::from("id"));
        row.insert(
            "index_description".into(),
            FieldValue::from("clustered, unique, primary key located on PRIMARY"),
        );
        assert_eq!(
            TdsDialect.parse_index_row(&row),
            Some(("id".to_string(), IndexKind::Primary))
        );

        row.insert(
            "index_description".into(),
            FieldValue::from("nonclustered, unique located on PRIMARY"),
        );
        assert_eq!(
            TdsDialect.parse_index_row(&row),
            Some(("id".to_string(), IndexKind::Unique))
        );

        row.insert(
            "index_description".into(),
            FieldValue::from("nonclustered located on PRIMARY"),
        );
        assert_eq!(
            TdsDialect.parse_index_row(&row),
            Some(("id".to_string(), IndexKind::Index))
        );
    }

    #[test]
    fn tds_identity_detection() {
        let mut row = Row::new();
        row.insert("AUTO_INCREMENTS".into(), FieldValue::Int(1));
        assert!(TdsDialect.is_auto_increment_row(&row));
        row.insert("AUTO_INCREMENTS".into(), FieldValue::Int(0));
        assert!(!TdsDialect.is_auto_increment_row(&row));
    }
}
