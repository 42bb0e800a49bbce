//! Table schemas and their declarative specifications

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::schema::column::{Column, IndexKind};

/// Ordered, name-unique set of column descriptors
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TableSchema {
    columns: IndexMap<String, Column>,
}

impl TableSchema {
    /// Create an empty schema
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a schema from columns in order, rejecting duplicate names
    pub fn from_columns(columns: impl IntoIterator<Item = Column>) -> Result<Self> {
        let mut schema = Self::new();
        for column in columns {
            schema.push(column)?;
        }
        Ok(schema)
    }

    /// Append a column
    pub fn push(&mut self, column: Column) -> Result<()> {
        if column.name().trim().is_empty() {
            return Err(Error::ValidationError("Column name must not be empty".to_string()));
        }
        if self.columns.contains_key(column.name()) {
            return Err(Error::ValidationError(format!(
                "Duplicate column name: {}",
                column.name()
            )));
        }
        self.columns.insert(column.name().to_string(), column);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&Column> {
        self.columns.get(name)
    }

    pub(crate) fn get_mut(&mut self, name: &str) -> Option<&mut Column> {
        self.columns.get_mut(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.columns.contains_key(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Column> {
        self.columns.values()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.columns.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Check the auto-increment rule
    ///
    /// A table has at most one auto-increment column and that column carries
    /// a PRIMARY or UNIQUE index.
    pub fn validate(&self) -> Result<()> {
        validate_columns(self.iter())
    }
}

impl<'a> IntoIterator for &'a TableSchema {
    type Item = &'a Column;
    type IntoIter = indexmap::map::Values<'a, String, Column>;

    fn into_iter(self) -> Self::IntoIter {
        self.columns.values()
    }
}

pub(crate) fn validate_columns<'a>(columns: impl IntoIterator<Item = &'a Column>) -> Result<()> {
    let auto: Vec<&Column> = columns.into_iter().filter(|c| c.is_auto_increment()).collect();
    if auto.len() > 1 {
        return Err(Error::ValidationError(format!(
            "Only one auto-increment column is allowed, found: {}",
            auto.iter().map(|c| c.name()).collect::<Vec<_>>().join(", ")
        )));
    }
    if let Some(column) = auto.first() {
        if !matches!(column.index(), Some(IndexKind::Primary) | Some(IndexKind::Unique)) {
            return Err(Error::ValidationError(format!(
                "Auto-increment column {} must carry a PRIMARY or UNIQUE index",
                column.name()
            )));
        }
    }
    Ok(())
}

/// Column length as written in configuration: `255` or `"10,2"`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LengthSpec {
    Number(u64),
    Text(String),
}

impl LengthSpec {
    fn into_string(self) -> String {
        match self {
            LengthSpec::Number(n) => n.to_string(),
            LengthSpec::Text(s) => s,
        }
    }
}

/// Declarative column definition; unknown keys are rejected
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ColumnSpec {
    pub name: String,
    #[serde(rename = "type", default)]
    pub data_type: String,
    pub length: Option<LengthSpec>,
    pub default: Option<String>,
    #[serde(default)]
    pub nullable: bool,
    #[serde(default)]
    pub auto_increment: bool,
    pub index: Option<IndexKind>,
    pub attributes: Option<String>,
    pub extra: Option<String>,
}

impl TryFrom<ColumnSpec> for Column {
    type Error = Error;

    fn try_from(spec: ColumnSpec) -> Result<Self> {
        if spec.name.trim().is_empty() {
            return Err(Error::ValidationError("Column name must not be empty".to_string()));
        }
        let mut column = Column::new(&spec.name, &spec.data_type)
            .with_nullable(spec.nullable)
            .with_auto_increment(spec.auto_increment);
        if let Some(length) = spec.length {
            column = column.with_length(length.into_string());
        }
        if let Some(default) = spec.default {
            column = column.with_default(default);
        }
        if let Some(index) = spec.index {
            column = column.with_index(index);
        }
        if let Some(attributes) = spec.attributes {
            column = column.with_attributes(attributes);
        }
        if let Some(extra) = spec.extra {
            column = column.with_extra(extra);
        }
        Ok(column)
    }
}

/// Declarative table definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TableSpec {
    pub name: String,
    /// Drop and recreate the table instead of altering it
    #[serde(default)]
    pub recreate: bool,
    pub columns: Vec<ColumnSpec>,
}

impl TableSpec {
    /// Desired columns in declaration order
    pub fn columns(&self) -> Result<Vec<Column>> {
        let schema = TableSchema::from_columns(
            self.columns
                .iter()
                .cloned()
                .map(Column::try_from)
                .collect::<Result<Vec<_>>>()?,
        )?;
        schema.validate()?;
        Ok(schema.iter().cloned().collect())
    }
}
