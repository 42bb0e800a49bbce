//! Shared helpers for integration tests
//!
//! The helpers answer catalog queries the way a MySQL or SQL Server
//! reports a table built from the given columns.

#![allow(dead_code)]

use std::sync::Arc;

use dbstore::schema::column::quote_enum_values;
use dbstore::{Column, Database, DriverType, FieldValue, IndexKind, Row, ScriptedGateway};

pub const COLUMNS_QUERY: &str = "INFORMATION_SCHEMA.Columns";
pub const INDEX_QUERY: &str = "COLUMN_KEY<>''";
pub const EXISTS_QUERY: &str = "information_schema.tables";

pub fn row<const N: usize>(values: [(&str, FieldValue); N]) -> Row {
    values
        .into_iter()
        .map(|(name, value)| (name.to_string(), value))
        .collect()
}

fn column_type(column: &Column) -> String {
    let base = if column.data_type().is_empty() {
        "varchar".to_string()
    } else {
        column.data_type().to_lowercase()
    };
    let mut full = base.clone();
    if let Some(length) = column.length() {
        if base == "enum" || base == "set" {
            full.push_str(&format!("({})", quote_enum_values(length)));
        } else {
            full.push_str(&format!("({})", length));
        }
    }
    if let Some(attributes) = column.attributes() {
        full.push(' ');
        full.push_str(&attributes.to_lowercase());
    }
    full
}

/// information_schema.COLUMNS row for a column
pub fn column_row(column: &Column) -> Row {
    let data_type = if column.data_type().is_empty() {
        "varchar".to_string()
    } else {
        column.data_type().to_lowercase()
    };
    let max_length = match data_type.as_str() {
        "char" | "varchar" | "binary" | "varbinary" => FieldValue::from(column.length()),
        _ => FieldValue::Null,
    };
    let mut extra = Vec::new();
    if column.is_auto_increment() {
        extra.push("auto_increment".to_string());
    }
    if let Some(more) = column.extra() {
        extra.push(more.to_string());
    }
    let key = match column.index() {
        Some(IndexKind::Primary) => "PRI",
        Some(IndexKind::Unique) => "UNI",
        Some(IndexKind::Index) => "MUL",
        None => "",
    };

    row([
        ("COLUMN_NAME", FieldValue::from(column.name())),
        ("DATA_TYPE", FieldValue::from(data_type)),
        ("COLUMN_TYPE", FieldValue::from(column_type(column))),
        ("CHARACTER_MAXIMUM_LENGTH", max_length),
        ("IS_NULLABLE", FieldValue::from(if column.is_nullable() { "YES" } else { "NO" })),
        ("COLUMN_DEFAULT", FieldValue::from(column.default_value())),
        ("EXTRA", FieldValue::from(extra.join(" "))),
        ("COLUMN_KEY", FieldValue::from(key)),
    ])
}

/// Answer catalog queries as if `columns` were the live table
pub fn install_schema(gateway: &ScriptedGateway, table: &str, columns: &[Column]) {
    let rows: Vec<Row> = columns.iter().map(column_row).collect();
    let keyed: Vec<Row> = rows
        .iter()
        .filter(|r| r.get("COLUMN_KEY").map_or(false, |k| !k.render().is_empty()))
        .cloned()
        .collect();
    let exists = if columns.is_empty() {
        Vec::new()
    } else {
        vec![row([("TABLE_NAME", FieldValue::from(table))])]
    };

    gateway.on_query(COLUMNS_QUERY, rows);
    gateway.on_query(INDEX_QUERY, keyed);
    gateway.on_query(EXISTS_QUERY, exists);
}

/// Answer catalog queries the way SQL Server reports `columns`
///
/// Index rows mimic `sp_helpindex`, filegroup suffix included.
pub fn install_tds_schema(gateway: &ScriptedGateway, table: &str, columns: &[Column]) {
    let rows: Vec<Row> = columns
        .iter()
        .map(|column| {
            let mut catalog = column_row(column);
            catalog.shift_remove("COLUMN_TYPE");
            catalog.shift_remove("EXTRA");
            catalog.shift_remove("COLUMN_KEY");
            catalog.insert(
                "AUTO_INCREMENTS".to_string(),
                FieldValue::Int(i64::from(column.is_auto_increment())),
            );
            catalog
        })
        .collect();
    let indexes: Vec<Row> = columns
        .iter()
        .filter_map(|column| {
            let description = match column.index()? {
                IndexKind::Primary => "clustered, unique, primary key located on PRIMARY",
                IndexKind::Unique => "nonclustered, unique located on PRIMARY",
                IndexKind::Index => "nonclustered located on PRIMARY",
            };
            Some(row([
                ("index_name", FieldValue::from(format!("IX_{}", column.name()))),
                ("index_description", FieldValue::from(description)),
                ("index_keys", FieldValue::from(column.name())),
            ]))
        })
        .collect();

    gateway.on_query(COLUMNS_QUERY, rows);
    gateway.on_query("sp_helpindex", indexes);
    gateway.on_query(EXISTS_QUERY, vec![row([("TABLE_NAME", FieldValue::from(table))])]);
}

pub fn tds_database() -> (Arc<ScriptedGateway>, Database) {
    let gateway = Arc::new(ScriptedGateway::new(DriverType::SqlSrv));
    let database = Database::new(gateway.clone(), "shop", "utf8");
    (gateway, database)
}

pub fn mysql_database() -> (Arc<ScriptedGateway>, Database) {
    let gateway = Arc::new(ScriptedGateway::new(DriverType::MySql));
    let database = Database::new(gateway.clone(), "shop", "utf8");
    (gateway, database)
}

pub fn users_columns() -> Vec<Column> {
    vec![
        Column::new("id", "INT")
            .with_attributes("UNSIGNED")
            .with_auto_increment(true)
            .with_index(IndexKind::Primary),
        Column::new("email", "VARCHAR").with_length("255").with_index(IndexKind::Unique),
        Column::new("name", "VARCHAR").with_length("100").with_nullable(true),
        Column::new("active", "ENUM").with_length("0,1").with_default("1"),
        Column::new("balance", "DECIMAL").with_length("10,2").with_default("0.00"),
        Column::new("bio", "TEXT").with_nullable(true),
        Column::new("born", "DATE").with_nullable(true),
        Column::new("created", "DATETIME").with_default("CURRENT_TIMESTAMP"),
    ]
}
