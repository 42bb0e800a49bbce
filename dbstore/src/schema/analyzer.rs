//! Live schema introspection
//!
//! This module materializes the current column set of a table from the
//! backend's information-schema views.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::db::gateway::{row_text, ConnectionGateway, Params, Row};
use crate::error::Result;
use crate::schema::column::{is_integer_type, Column, IndexKind};
use crate::schema::dialect::Dialect;
use crate::schema::types::TableSchema;
use crate::value::FieldValue;

static COLUMN_TYPE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^([A-Za-z]+)(\(([^\)]+)\))?( ([A-Za-z]+))?").expect("valid column type pattern")
});

/// Pieces of a native full column type such as `decimal(10,2) unsigned`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedType {
    pub base: String,
    pub length: Option<String>,
    pub attribute: Option<String>,
}

/// Split a full column type into base type, length and trailing attribute
pub fn parse_column_type(full_type: &str) -> Option<ParsedType> {
    let captures = COLUMN_TYPE.captures(full_type.trim())?;
    Some(ParsedType {
        base: captures.get(1)?.as_str().to_string(),
        length: captures.get(3).map(|m| m.as_str().to_string()),
        attribute: captures.get(5).map(|m| m.as_str().to_uppercase()),
    })
}

/// Schema analyzer for table introspection
pub struct SchemaAnalyzer<'a> {
    gateway: &'a dyn ConnectionGateway,
    dialect: &'a dyn Dialect,
    database: &'a str,
}

impl<'a> SchemaAnalyzer<'a> {
    /// Create a new schema analyzer
    pub fn new(gateway: &'a dyn ConnectionGateway, dialect: &'a dyn Dialect, database: &'a str) -> Self {
        Self {
            gateway,
            dialect,
            database,
        }
    }

    /// Load the ordered columns of a table
    ///
    /// Returns `None` when the table has no columns, which is how callers
    /// detect that it does not exist.
    pub async fn load_columns(&self, table: &str) -> Result<Option<TableSchema>> {
        let mut params = Params::new();
        params.insert("table".to_string(), FieldValue::from(table));
        params.insert("database".to_string(), FieldValue::from(self.database));

        let rows = self
            .gateway
            .query(&self.dialect.columns_query(table), &params)
            .await?;

        if rows.is_empty() {
            tracing::debug!(table = table, "Table has no columns");
            return Ok(None);
        }

        let mut schema = TableSchema::new();
        for row in &rows {
            if let Some(column) = self.column_from_row(row) {
                schema.push(column)?;
            }
        }

        let (sql, params) = self.dialect.index_query(self.database, table);
        for row in self.gateway.query(&sql, &params).await? {
            if let Some((name, kind)) = self.dialect.parse_index_row(&row) {
                if let Some(column) = schema.get_mut(&name) {
                    let current = column.index();
                    if current.map_or(true, |c| rank(kind) > rank(c)) {
                        column.set_index(Some(kind));
                    }
                }
            }
        }

        tracing::debug!(table = table, columns = schema.len(), "Loaded table columns");

        if schema.is_empty() {
            Ok(None)
        } else {
            Ok(Some(schema))
        }
    }

    fn column_from_row(&self, row: &Row) -> Option<Column> {
        let name = row_text(row, "COLUMN_NAME")?;
        let data_type = row_text(row, "DATA_TYPE").unwrap_or_default();
        let parsed = row_text(row, "COLUMN_TYPE").and_then(|t| parse_column_type(&t));

        let is_list_type = matches!(data_type.to_lowercase().as_str(), "enum" | "set");
        let length = if is_list_type {
            parsed.as_ref().and_then(|p| p.length.clone())
        } else {
            match row_text(row, "CHARACTER_MAXIMUM_LENGTH") {
                Some(length) if length == "-1" => Some("MAX".to_string()),
                Some(length) => Some(length),
                None if !is_integer_type(&data_type) => parsed.as_ref().and_then(|p| p.length.clone()),
                None => None,
            }
        };

        let mut column = Column::new(&name, &data_type)
            .with_nullable(row_text(row, "IS_NULLABLE").as_deref() == Some("YES"))
            .with_auto_increment(self.dialect.is_auto_increment_row(row));

        if let Some(length) = length {
            column = column.with_length(length);
        }
        if let Some(attribute) = parsed.and_then(|p| p.attribute) {
            column = column.with_attributes(attribute);
        }
        if let Some(default) = row_text(row, "COLUMN_DEFAULT") {
            column = column.with_default(default);
        }
        if let Some(extra) = row_text(row, "EXTRA").map(|e| strip_extra_markers(&e)) {
            column = column.with_extra(extra);
        }

        Some(column)
    }
}

/// Remove the markers the server reports in EXTRA that are not column DDL
fn strip_extra_markers(extra: &str) -> String {
    extra
        .split_whitespace()
        .filter(|token| {
            !token.eq_ignore_ascii_case("auto_increment") && !token.eq_ignore_ascii_case("DEFAULT_GENERATED")
        })
        .collect::<Vec<_>>()
        .join(" ")
}

fn rank(kind: IndexKind) -> u8 {
    match kind {
        IndexKind::Index => 0,
        IndexKind::Unique => 1,
        IndexKind::Primary => 2,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    #[rstest]
    #[case("decimal(10,2) unsigned", "decimal", Some("10,2"), Some("UNSIGNED"))]
    #[case("int(11)", "int", Some("11"), None)]
    #[case("enum('0','1')", "enum", Some("'0','1'"), None)]
    #[case("text", "text", None, None)]
    #[case("bigint unsigned", "bigint", None, Some("UNSIGNED"))]
    fn parses_full_types(
        #[case] full: &str,
        #[case] base: &str,
        #[case] length: Option<&str>,
        #[case] attribute: Option<&str>,
    ) {
        let parsed = parse_column_type(full).unwrap();
        assert_eq!(parsed.base, base);
        assert_eq!(parsed.length.as_deref(), length);
        assert_eq!(parsed.attribute.as_deref(), attribute);
    }

    #[test]
    fn strips_server_markers_from_extra() {
        assert_eq!(strip_extra_markers("auto_increment"), "");
        assert_eq!(
            strip_extra_markers("DEFAULT_GENERATED on update CURRENT_TIMESTAMP"),
            "on update CURRENT_TIMESTAMP"
        );
    }
}
