//! Column descriptors
//!
//! A [`Column`] describes one table column independently of any stored value.
//! It renders its own DDL fragment for a given [`Dialect`] and classifies its
//! declared type for value normalization and record projection.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};
use crate::schema::dialect::Dialect;

/// Index kind attached to a single column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum IndexKind {
    Primary,
    Unique,
    Index,
}

impl IndexKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            IndexKind::Primary => "PRIMARY",
            IndexKind::Unique => "UNIQUE",
            IndexKind::Index => "INDEX",
        }
    }
}

impl fmt::Display for IndexKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for IndexKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_uppercase().as_str() {
            "PRIMARY" => Ok(IndexKind::Primary),
            "UNIQUE" => Ok(IndexKind::Unique),
            "INDEX" => Ok(IndexKind::Index),
            other => Err(Error::ValidationError(format!("Unknown index kind: {}", other))),
        }
    }
}

/// Coarse classification of a declared column type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeFamily {
    Integer,
    Decimal,
    Bit,
    Date,
    DateTime,
    Time,
    Year,
    Enum,
    Other,
}

/// Options for rendering a column DDL fragment
#[derive(Debug, Clone, Copy, Default)]
pub struct DdlOptions {
    /// Append `PRIMARY KEY` to a column indexed as primary
    pub include_index: bool,
}

const FIXED_LENGTH_TYPES: [&str; 8] = [
    "TINYBLOB", "BLOB", "MEDIUMBLOB", "LONGBLOB", "TINYTEXT", "TEXT", "MEDIUMTEXT", "LONGTEXT",
];

/// Types whose length is a display width rather than a storage constraint
const INTEGER_TYPES: [&str; 6] = ["INT", "INTEGER", "TINYINT", "SMALLINT", "MEDIUMINT", "BIGINT"];

const DECIMAL_TYPES: [&str; 4] = ["DECIMAL", "NUMERIC", "FLOAT", "DOUBLE"];

/// Returns true for blob/text types that never carry a length clause
pub fn is_fixed_length_type(data_type: &str) -> bool {
    FIXED_LENGTH_TYPES.contains(&data_type.trim().to_uppercase().as_str())
}

/// Returns true for integer family types
pub fn is_integer_type(data_type: &str) -> bool {
    INTEGER_TYPES.contains(&data_type.trim().to_uppercase().as_str())
}

/// Describes one column of a table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    name: String,
    data_type: String,
    length: Option<String>,
    default: Option<String>,
    nullable: bool,
    auto_increment: bool,
    index: Option<IndexKind>,
    attributes: Option<String>,
    extra: Option<String>,
}

impl Column {
    /// Create a NOT NULL column with the given name and type
    pub fn new(name: &str, data_type: &str) -> Self {
        Self {
            name: name.to_string(),
            data_type: data_type.to_string(),
            length: None,
            default: None,
            nullable: false,
            auto_increment: false,
            index: None,
            attributes: None,
            extra: None,
        }
    }

    pub fn with_length(mut self, length: impl Into<String>) -> Self {
        self.length = non_empty(length.into());
        self
    }

    pub fn with_default(mut self, default: impl Into<String>) -> Self {
        self.default = non_empty(default.into());
        self
    }

    pub fn with_nullable(mut self, nullable: bool) -> Self {
        self.nullable = nullable;
        self
    }

    pub fn with_auto_increment(mut self, auto_increment: bool) -> Self {
        self.auto_increment = auto_increment;
        self
    }

    pub fn with_index(mut self, index: IndexKind) -> Self {
        self.index = Some(index);
        self
    }

    pub fn with_attributes(mut self, attributes: impl Into<String>) -> Self {
        self.attributes = non_empty(attributes.into());
        self
    }

    pub fn with_extra(mut self, extra: impl Into<String>) -> Self {
        self.extra = non_empty(extra.into());
        self
    }

    pub(crate) fn set_index(&mut self, index: Option<IndexKind>) {
        self.index = index;
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Declared type as given; empty means `VARCHAR`
    pub fn data_type(&self) -> &str {
        &self.data_type
    }

    pub fn length(&self) -> Option<&str> {
        self.length.as_deref()
    }

    pub fn default_value(&self) -> Option<&str> {
        self.default.as_deref()
    }

    pub fn is_nullable(&self) -> bool {
        self.nullable
    }

    pub fn is_auto_increment(&self) -> bool {
        self.auto_increment
    }

    pub fn index(&self) -> Option<IndexKind> {
        self.index
    }

    pub fn attributes(&self) -> Option<&str> {
        self.attributes.as_deref()
    }

    pub fn extra(&self) -> Option<&str> {
        self.extra.as_deref()
    }

    fn upper_type(&self) -> String {
        let data_type = self.data_type.trim();
        if data_type.is_empty() {
            "VARCHAR".to_string()
        } else {
            data_type.to_uppercase()
        }
    }

    /// Render the column definition used in CREATE and ALTER statements
    pub fn render_ddl(&self, dialect: &dyn Dialect, options: DdlOptions) -> String {
        let data_type = self.upper_type();
        let mut sql = format!("{} {}", self.name, data_type);

        match self.length.as_deref() {
            Some(length) if !dialect.is_fixed_length(&data_type) => {
                if data_type == "ENUM" || data_type == "SET" {
                    sql.push_str(&format!("({})", quote_enum_values(length)));
                } else {
                    sql.push_str(&format!("({})", length));
                }
            }
            None => {
                if let Some(length) = dialect.default_length(&data_type) {
                    sql.push_str(&format!("({})", length));
                }
            }
            _ => {}
        }

        if let Some(attributes) = &self.attributes {
            sql.push(' ');
            sql.push_str(attributes);
        }

        sql.push_str(if self.nullable { " NULL" } else { " NOT NULL" });

        if self.auto_increment {
            sql.push(' ');
            sql.push_str(dialect.auto_increment_keyword());
        }

        if let Some(extra) = &self.extra {
            sql.push(' ');
            sql.push_str(extra);
        }

        if options.include_index && self.index == Some(IndexKind::Primary) {
            sql.push_str(" PRIMARY KEY");
        }

        if let Some(default) = &self.default {
            sql.push_str(" DEFAULT ");
            let upper = default.to_uppercase();
            match upper.as_str() {
                "NULL" | "CURRENT_TIMESTAMP" => sql.push_str(&upper),
                // Known limitation: embedded quotes are not escaped.
                _ => sql.push_str(&format!("'{}'", default)),
            }
        }

        sql
    }

    /// Coarse type family used for value normalization
    pub fn family(&self) -> TypeFamily {
        let data_type = self.upper_type();
        match data_type.as_str() {
            t if INTEGER_TYPES.contains(&t) => TypeFamily::Integer,
            t if DECIMAL_TYPES.contains(&t) => TypeFamily::Decimal,
            "BIT" => TypeFamily::Bit,
            "DATE" => TypeFamily::Date,
            "DATETIME" | "TIMESTAMP" => TypeFamily::DateTime,
            "TIME" => TypeFamily::Time,
            "YEAR" => TypeFamily::Year,
            "ENUM" => TypeFamily::Enum,
            _ => TypeFamily::Other,
        }
    }

    /// Two-valued `ENUM('0','1')` or `BIT(1)`
    pub fn is_boolean(&self) -> bool {
        let data_type = self.upper_type();
        let length = self.length.as_deref().map(strip_enum_quotes);
        match data_type.as_str() {
            "ENUM" => matches!(length.as_deref(), Some("0,1") | Some("1,0")),
            "BIT" => length.as_deref() == Some("1"),
            _ => false,
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(
            self.upper_type().as_str(),
            "INT"
                | "INTEGER"
                | "TINYINT"
                | "SMALLINT"
                | "MEDIUMINT"
                | "BIGINT"
                | "FLOAT"
                | "DOUBLE"
                | "DOUBLE PRECISION"
                | "REAL"
                | "DECIMAL"
                | "NUMERIC"
                | "BIT"
        )
    }

    pub fn is_date(&self) -> bool {
        matches!(
            self.upper_type().as_str(),
            "DATE" | "DATETIME" | "TIMESTAMP" | "TIME" | "YEAR"
        )
    }

    pub fn is_date_time(&self) -> bool {
        matches!(self.upper_type().as_str(), "DATETIME" | "TIMESTAMP")
    }

    pub fn is_time(&self) -> bool {
        matches!(self.upper_type().as_str(), "DATETIME" | "TIMESTAMP" | "TIME")
    }

    pub fn is_text(&self) -> bool {
        matches!(
            self.upper_type().as_str(),
            "TINYTEXT" | "TEXT" | "MEDIUMTEXT" | "LONGTEXT"
        )
    }

    /// Whether two descriptors would produce the same live column
    ///
    /// Index kind is not part of the definition; it is reconciled separately.
    pub fn same_definition(&self, other: &Column) -> bool {
        canonical_type(&self.upper_type()) == canonical_type(&other.upper_type())
            && self.comparable_length() == other.comparable_length()
            && self.nullable == other.nullable
            && self.auto_increment == other.auto_increment
            && comparable_default(self.default.as_deref()) == comparable_default(other.default.as_deref())
            && comparable_text(self.attributes.as_deref()) == comparable_text(other.attributes.as_deref())
            && comparable_text(self.extra.as_deref()) == comparable_text(other.extra.as_deref())
    }

    fn comparable_length(&self) -> Option<String> {
        let data_type = self.upper_type();
        if is_fixed_length_type(&data_type) || is_integer_type(&data_type) {
            return None;
        }
        match self.length.as_deref() {
            Some(length) => Some(strip_enum_quotes(length)),
            None if data_type == "VARCHAR" || data_type == "CHAR" => Some("11".to_string()),
            None => None,
        }
    }
}

fn non_empty(value: String) -> Option<String> {
    if value.trim().is_empty() {
        None
    } else {
        Some(value)
    }
}

/// Single-quote every bare token of an enum value list
///
/// Tokens that already contain a quote character are left untouched.
pub fn quote_enum_values(values: &str) -> String {
    values
        .split(',')
        .map(|token| {
            if token.is_empty() || token.contains('\'') || token.contains('"') {
                token.to_string()
            } else {
                format!("'{}'", token)
            }
        })
        .collect::<Vec<_>>()
        .join(",")
}

fn strip_enum_quotes(values: &str) -> String {
    values
        .chars()
        .filter(|c| *c != '\'' && *c != '"' && !c.is_whitespace())
        .collect()
}

fn canonical_type(data_type: &str) -> &str {
    match data_type {
        "INTEGER" => "INT",
        "DEC" => "DECIMAL",
        "DOUBLE PRECISION" => "DOUBLE",
        "BOOL" | "BOOLEAN" => "TINYINT",
        other => other,
    }
}

fn comparable_default(default: Option<&str>) -> Option<String> {
    let default = default?.trim();
    let default = default
        .strip_prefix('\'')
        .and_then(|d| d.strip_suffix('\''))
        .unwrap_or(default);
    let upper = default.to_uppercase();
    match upper.as_str() {
        "NULL" => None,
        "CURRENT_TIMESTAMP" | "CURRENT_TIMESTAMP()" => Some("CURRENT_TIMESTAMP".to_string()),
        _ => Some(default.to_string()),
    }
}

fn comparable_text(text: Option<&str>) -> Option<String> {
    text.map(|t| t.trim().to_uppercase()).filter(|t| !t.is_empty())
}
