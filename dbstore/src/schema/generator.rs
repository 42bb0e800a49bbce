//! DDL generator
//!
//! This module turns desired column lists and schema diffs into the
//! dialect-specific statements that apply them.

use crate::schema::column::{Column, DdlOptions, IndexKind};
use crate::schema::diff::{ColumnChange, ColumnPosition, IndexChange, SchemaDiff};
use crate::schema::dialect::Dialect;

/// DDL generator for a single table
pub struct DdlGenerator<'a> {
    dialect: &'a dyn Dialect,
    database: &'a str,
    table: &'a str,
    character_set: &'a str,
}

impl<'a> DdlGenerator<'a> {
    /// Create a new generator
    pub fn new(dialect: &'a dyn Dialect, database: &'a str, table: &'a str, character_set: &'a str) -> Self {
        Self {
            dialect,
            database,
            table,
            character_set,
        }
    }

    fn qualified_table(&self) -> String {
        self.dialect.qualify_table(self.database, self.table)
    }

    /// Generate the CREATE TABLE statement followed by any standalone index statements
    pub fn create_table_sql(&self, columns: &[Column], include_index: bool) -> Vec<String> {
        let mut sql = format!("CREATE TABLE {} (\n", self.qualified_table());
        sql.push_str(
            &columns
                .iter()
                .map(|c| c.render_ddl(self.dialect, DdlOptions::default()))
                .collect::<Vec<_>>()
                .join(", "),
        );

        let mut index_statements = Vec::new();
        if include_index {
            for column in columns {
                let Some(kind) = column.index() else { continue };
                if let Some(clause) = self.dialect.inline_index_clause(column.name(), kind) {
                    sql.push_str(", ");
                    sql.push_str(&clause);
                }
                if let Some(statement) = self.dialect.create_index_statement(self.table, column.name(), kind) {
                    index_statements.push(statement);
                }
            }
        }

        let mut statements = vec![self.dialect.finish_create_table(sql, self.character_set)];
        statements.extend(index_statements);
        statements
    }

    /// Generate the DROP TABLE statement
    pub fn drop_table_sql(&self) -> String {
        self.dialect.drop_table_statement(self.table)
    }

    /// Generate the statements that apply a diff, in execution order
    ///
    /// Column changes run first in desired order, then index changes, then
    /// column drops.
    pub fn alter_sql(&self, diff: &SchemaDiff) -> Vec<String> {
        let mut statements: Vec<String> = diff
            .column_changes
            .iter()
            .map(|change| self.column_change_sql(change))
            .collect();

        statements.extend(diff.index_changes.iter().filter_map(|change| self.index_change_sql(change)));

        statements.extend(diff.columns_to_drop.iter().map(|name| self.drop_column_sql(name)));

        statements
    }

    /// Generate the ADD COLUMN statement and its index statement, if any
    pub fn add_column_sql(&self, column: &Column, position: ColumnPosition) -> Vec<String> {
        let mut statements = vec![self.column_change_sql(&ColumnChange::Add {
            column: column.clone(),
            position,
        })];
        if let Some(kind) = column.index().filter(|k| *k != IndexKind::Primary) {
            statements.extend(self.index_change_sql(&IndexChange::Add {
                column: column.name().to_string(),
                kind,
            }));
        }
        statements
    }

    fn column_change_sql(&self, change: &ColumnChange) -> String {
        let (clause, column, position, options) = match change {
            ColumnChange::Add { column, position } => (
                self.dialect.add_column_clause(),
                column,
                position,
                DdlOptions { include_index: true },
            ),
            ColumnChange::Modify { column, position } => (
                self.dialect.modify_column_clause(),
                column,
                position,
                DdlOptions::default(),
            ),
        };

        let position = if self.dialect.supports_column_positioning() {
            position.to_string()
        } else {
            String::new()
        };

        format!(
            "ALTER TABLE {} {} {}{}",
            self.qualified_table(),
            clause,
            column.render_ddl(self.dialect, options),
            position
        )
    }

    fn index_change_sql(&self, change: &IndexChange) -> Option<String> {
        let qualified = self.qualified_table();
        let statement = match change {
            IndexChange::Add { column, kind } => {
                self.dialect.add_index_statement(&qualified, self.table, column, *kind)
            }
            IndexChange::Drop { column, kind } => {
                self.dialect.drop_index_statement(&qualified, self.table, column, *kind)
            }
        };
        if statement.is_none() {
            tracing::warn!(
                table = self.table,
                dialect = self.dialect.name(),
                change = ?change,
                "Index change cannot be expressed in this dialect; skipping"
            );
        }
        statement
    }

    fn drop_column_sql(&self, name: &str) -> String {
        format!("ALTER TABLE {} DROP COLUMN {}", self.qualified_table(), name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::dialect::{MySqlDialect, TdsDialect};
    use crate::schema::types::TableSchema;
    use pretty_assertions::assert_eq;

    fn users() -> Vec<Column> {
        vec![
            Column::new("id", "INT")
                .with_attributes("UNSIGNED")
                .with_auto_increment(true)
                .with_index(IndexKind::Primary),
            Column::new("email", "VARCHAR").with_length("255").with_index(IndexKind::Unique),
            Column::new("active", "ENUM").with_length("0,1").with_default("1"),
        ]
    }

    #[test]
    fn mysql_create_inlines_indexes() {
        let generator = DdlGenerator::new(&MySqlDialect, "app", "users", "utf8");
        assert_eq!(
            generator.create_table_sql(&users(), true),
            vec![
                "CREATE TABLE app.users (\nid INT UNSIGNED NOT NULL AUTO_INCREMENT, email VARCHAR(255) NOT NULL, active ENUM('0','1') NOT NULL DEFAULT '1', PRIMARY KEY(id), UNIQUE(email)) CHARACTER SET utf8"
                    .to_string()
            ]
        );
    }

    #[test]
    fn tds_create_emits_separate_index_statements() {
        let generator = DdlGenerator::new(&TdsDialect, "app", "users", "utf8");
        let statements = generator.create_table_sql(&users(), true);
        assert_eq!(statements.len(), 3);
        assert!(statements[0].starts_with("CREATE TABLE app..users (\nid INT UNSIGNED NOT NULL IDENTITY(1,1)"));
        assert!(statements[0].ends_with(");"));
        assert_eq!(statements[1], "CREATE UNIQUE NONCLUSTERED INDEX id ON users (id);");
        assert_eq!(statements[2], "CREATE UNIQUE NONCLUSTERED INDEX email ON users (email);");
    }

    #[test]
    fn create_without_indexes() {
        let generator = DdlGenerator::new(&MySqlDialect, "app", "t", "latin1");
        let columns = vec![Column::new("code", "CHAR").with_length("2").with_index(IndexKind::Index)];
        assert_eq!(
            generator.create_table_sql(&columns, false),
            vec!["CREATE TABLE app.t (\ncode CHAR(2) NOT NULL) CHARACTER SET latin1".to_string()]
        );
    }

    #[test]
    fn alter_orders_columns_then_indexes_then_drops() {
        let generator = DdlGenerator::new(&MySqlDialect, "app", "users", "utf8");
        let current = TableSchema::from_columns(vec![
            Column::new("id", "INT").with_index(IndexKind::Primary),
            Column::new("legacy", "TEXT").with_nullable(true),
        ])
        .unwrap();
        let desired = vec![
            Column::new("id", "INT").with_index(IndexKind::Primary),
            Column::new("email", "VARCHAR").with_length("255").with_index(IndexKind::Unique),
        ];
        let diff = SchemaDiff::generate(&current, &desired, true);
        assert_eq!(
            generator.alter_sql(&diff),
            vec![
                "ALTER TABLE app.users ADD COLUMN email VARCHAR(255) NOT NULL AFTER id".to_string(),
                "ALTER TABLE app.users ADD UNIQUE INDEX email(email)".to_string(),
                "ALTER TABLE app.users DROP COLUMN legacy".to_string(),
            ]
        );
    }

    #[test]
    fn tds_alter_has_no_positions() {
        let generator = DdlGenerator::new(&TdsDialect, "app", "users", "utf8");
        let statements = generator.add_column_sql(&Column::new("note", "TEXT").with_nullable(true), ColumnPosition::First);
        assert_eq!(statements, vec!["ALTER TABLE app..users ADD note TEXT NULL".to_string()]);
    }

    #[test]
    fn new_primary_column_is_declared_inline() {
        let generator = DdlGenerator::new(&MySqlDialect, "app", "t", "utf8");
        let statements = generator.add_column_sql(
            &Column::new("id", "INT").with_index(IndexKind::Primary),
            ColumnPosition::First,
        );
        assert_eq!(
            statements,
            vec!["ALTER TABLE app.t ADD COLUMN id INT NOT NULL PRIMARY KEY FIRST".to_string()]
        );
    }
}
