//! Records
//!
//! A [`Record`] is one row of a [`Table`], addressed by its key fields. It
//! normalizes its values against the table's columns before writing and
//! decides between INSERT and UPDATE by probing for an existing row.

use chrono::NaiveDateTime;
use indexmap::IndexMap;
use std::collections::HashSet;
use std::fmt;

use crate::db::gateway::{Params, Row};
use crate::error::Result;
use crate::models::export;
use crate::models::normalize::{self, bind_value, normalize_field};
use crate::models::table::Table;
use crate::utils::naming::{is_qualified, qualify, strip_non_word};
use crate::value::FieldValue;

/// Join type used when loading a record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum JoinKind {
    #[default]
    Inner,
    Left,
    Right,
}

impl JoinKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            JoinKind::Inner => "INNER",
            JoinKind::Left => "LEFT",
            JoinKind::Right => "RIGHT",
        }
    }
}

impl fmt::Display for JoinKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A table joined into record loads
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Join {
    pub table: String,
    /// Field of the record's table; qualified with it when bare
    pub field1: String,
    /// Field of the joined table; qualified with it when bare
    pub field2: String,
    pub kind: JoinKind,
}

/// Options for [`Record::load`]
#[derive(Debug, Clone, Default)]
pub struct LoadOptions {
    /// Replace the key fields and their values before loading
    pub keys: Option<IndexMap<String, FieldValue>>,
    /// Column list to select; `*` when unset
    pub columns: Option<String>,
}

/// Statement issued by [`Record::save`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveOutcome {
    Inserted,
    Updated,
}

/// A row of a table
#[derive(Debug)]
pub struct Record<'t> {
    table: &'t Table,
    fields: IndexMap<String, FieldValue>,
    key_fields: Vec<String>,
    joins: Vec<Join>,
    type_name: String,
    /// Fields whose current value already went through column normalization
    normalized: HashSet<String>,
    is_new: bool,
    loaded_from_db: bool,
    synched: bool,
}

impl<'t> Record<'t> {
    /// Create an empty record keyed by the table's primary index field, if set
    pub fn new(table: &'t Table) -> Self {
        Self {
            table,
            fields: IndexMap::new(),
            key_fields: table.primary_index_field().map(|f| vec![f.to_string()]).unwrap_or_default(),
            joins: Vec::new(),
            type_name: "Record".to_string(),
            normalized: HashSet::new(),
            is_new: true,
            loaded_from_db: false,
            synched: false,
        }
    }

    /// Root element name used by [`Record::to_xml`]
    pub fn with_type_name(mut self, name: &str) -> Self {
        self.type_name = name.to_string();
        self
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn table(&self) -> &'t Table {
        self.table
    }

    /// Join another table into loads
    pub fn join(&mut self, table: &str, field1: &str, field2: &str, kind: JoinKind) {
        self.joins.push(Join {
            table: table.to_string(),
            field1: field1.to_string(),
            field2: field2.to_string(),
            kind,
        });
    }

    pub fn fields(&self) -> &IndexMap<String, FieldValue> {
        &self.fields
    }

    pub fn value(&self, field: &str) -> Option<&FieldValue> {
        self.fields.get(field)
    }

    /// Set a field; any change clears the synched flag
    pub fn set_value(&mut self, field: &str, value: impl Into<FieldValue>) {
        let value = value.into();
        let unchanged = matches!(self.fields.get(field), Some(existing) if !existing.is_null() && *existing == value);
        if !unchanged {
            self.fields.insert(field.to_string(), value);
            self.normalized.remove(field);
            self.synched = false;
        }
    }

    pub fn set_values<I, K, V>(&mut self, values: I)
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<FieldValue>,
    {
        for (field, value) in values {
            self.set_value(field.as_ref(), value);
        }
    }

    /// Replace the key fields; non-null values are stored as field values
    pub fn set_keys<I, K, V>(&mut self, keys: I)
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<FieldValue>,
    {
        self.key_fields.clear();
        for (field, value) in keys {
            let field = field.as_ref();
            self.key_fields.push(field.to_string());
            let value = value.into();
            if !value.is_null() {
                self.set_value(field, value);
            }
        }
    }

    pub fn key_fields(&self) -> &[String] {
        &self.key_fields
    }

    /// Key values, or `None` unless every key field has a non-null value
    pub fn keys(&self) -> Option<IndexMap<String, FieldValue>> {
        if self.key_fields.is_empty() {
            return None;
        }
        self.key_fields
            .iter()
            .map(|field| match self.fields.get(field) {
                Some(value) if !value.is_null() => Some((field.clone(), value.clone())),
                _ => None,
            })
            .collect()
    }

    /// Key values joined with `-`
    pub fn id(&self) -> Option<String> {
        if self.key_fields.is_empty() {
            return None;
        }
        Some(
            self.key_fields
                .iter()
                .map(|field| self.fields.get(field).map(FieldValue::render).unwrap_or_default())
                .collect::<Vec<_>>()
                .join("-"),
        )
    }

    /// Set the value of the first key field
    pub fn set_id(&mut self, id: impl Into<FieldValue>) -> bool {
        match self.key_fields.first().cloned() {
            Some(field) => {
                self.set_value(&field, id);
                true
            }
            None => false,
        }
    }

    /// Remove all field values
    pub fn clear(&mut self) {
        self.fields.clear();
        self.normalized.clear();
        self.synched = false;
        self.loaded_from_db = false;
    }

    pub fn is_new(&self) -> bool {
        self.is_new
    }

    pub fn is_synched(&self) -> bool {
        self.synched
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded_from_db
    }

    /// Mark the record as matching (or not) the stored row
    ///
    /// A synched record came from the table, so it is no longer new.
    pub fn mark_synched(&mut self, synched: bool) {
        self.synched = synched;
        if synched {
            self.loaded_from_db = true;
            self.is_new = false;
        }
    }

    fn table_sql(&self) -> String {
        let name = self.table.name();
        let mut sql = name.to_string();
        for join in &self.joins {
            let field1 = if is_qualified(&join.field1) {
                join.field1.clone()
            } else {
                qualify(name, &join.field1)
            };
            let field2 = if is_qualified(&join.field2) {
                join.field2.clone()
            } else {
                qualify(&join.table, &join.field2)
            };
            sql.push_str(&format!(" {} JOIN {} ON {}={}", join.kind, join.table, field1, field2));
        }
        sql
    }

    fn key_conditions(&self, keys: &IndexMap<String, FieldValue>, qualified: bool, params: &mut Params) -> String {
        keys.iter()
            .map(|(field, value)| {
                let marker = strip_non_word(field);
                params.insert(marker.clone(), value.clone());
                if qualified && !is_qualified(field) {
                    format!("{}=:{}", qualify(self.table.name(), field), marker)
                } else {
                    format!("{}=:{}", field, marker)
                }
            })
            .collect::<Vec<_>>()
            .join(" AND ")
    }

    async fn select_row(&self, columns: &str, keys: &IndexMap<String, FieldValue>) -> Result<Option<Row>> {
        let mut params = Params::new();
        let conditions = self.key_conditions(keys, !self.joins.is_empty(), &mut params);
        let sql = format!("SELECT {} FROM {} WHERE {}", columns, self.table_sql(), conditions);
        Ok(self.table.query(&sql, &params).await?.into_iter().next())
    }

    /// Load the row addressed by the key fields
    ///
    /// Returns `Ok(false)` when a key value is missing or no row matches.
    pub async fn load(&mut self, options: LoadOptions) -> Result<bool> {
        if self.loaded_from_db {
            return Ok(true);
        }
        if let Some(keys) = options.keys {
            self.set_keys(keys);
        }
        let Some(keys) = self.keys() else {
            return Ok(false);
        };

        let columns = options.columns.as_deref().unwrap_or("*");
        match self.select_row(columns, &keys).await? {
            Some(row) => {
                self.is_new = false;
                self.set_values(row);
                self.synched = true;
                self.loaded_from_db = true;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Apply values, then save
    pub async fn save_with<I, K, V>(&mut self, values: I) -> Result<SaveOutcome>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<FieldValue>,
    {
        self.set_values(values);
        self.save().await
    }

    /// Insert or update the row
    ///
    /// The row is updated when one already exists for the key values, and
    /// inserted otherwise. Key fields are never part of an UPDATE's SET list.
    pub async fn save(&mut self) -> Result<SaveOutcome> {
        let schema = self.table.columns().await?;
        let keys = self.keys();

        let exists = match &keys {
            Some(keys) => {
                let first = keys.keys().next().map(String::as_str).unwrap_or("*");
                self.select_row(first, keys).await?.is_some()
            }
            None => false,
        };
        let outcome = if exists {
            self.is_new = false;
            SaveOutcome::Updated
        } else {
            SaveOutcome::Inserted
        };

        let names: Vec<String> = self.fields.keys().cloned().collect();
        for name in &names {
            if self.normalized.contains(name) {
                continue;
            }
            let column = schema.get(name);
            if column.is_none() {
                tracing::warn!(table = %self.table.name(), field = %name, "Field has no column; value discarded");
            }
            let value = self.fields.get(name).cloned().unwrap_or_default();
            self.set_value(name, normalize_field(column, value));
            self.normalized.insert(name.clone());
        }

        let dialect = self.table.dialect();
        let mut assignments: Vec<(String, String)> = Vec::new();
        let mut params = Params::new();
        for (field, value) in &self.fields {
            let Some(column) = schema.get(field) else { continue };
            if outcome == SaveOutcome::Updated && self.key_fields.contains(field) {
                continue;
            }
            if value.is_null() {
                assignments.push((field.clone(), "NULL".to_string()));
            } else {
                let marker = strip_non_word(field);
                params.insert(marker.clone(), bind_value(column, value));
                assignments.push((field.clone(), format!(":{}", marker)));
            }
        }

        let sql = match outcome {
            SaveOutcome::Inserted => Some(format!(
                "INSERT INTO {}({}) VALUES ({})",
                self.table.name(),
                assignments
                    .iter()
                    .map(|(field, _)| dialect.quote_ident(field))
                    .collect::<Vec<_>>()
                    .join(", "),
                assignments
                    .iter()
                    .map(|(_, marker)| marker.as_str())
                    .collect::<Vec<_>>()
                    .join(", ")
            )),
            SaveOutcome::Updated if assignments.is_empty() => None,
            SaveOutcome::Updated => {
                let set = assignments
                    .iter()
                    .map(|(field, marker)| format!("{}={}", dialect.quote_ident(field), marker))
                    .collect::<Vec<_>>()
                    .join(", ");
                let conditions = match &keys {
                    Some(keys) => self.key_conditions(keys, false, &mut params),
                    None => String::new(),
                };
                Some(format!("UPDATE {} SET {} WHERE {}", self.table.name(), set, conditions))
            }
        };

        match sql {
            Some(sql) => {
                tracing::debug!(table = %self.table.name(), outcome = ?outcome, "Saving record");
                self.table.query(&sql, &params).await?;
            }
            None => tracing::debug!(table = %self.table.name(), "Nothing to update"),
        }
        self.is_new = false;

        let generated_key = match (outcome, self.key_fields.as_slice()) {
            (SaveOutcome::Inserted, [key]) => {
                let empty = !self.fields.get(key).map_or(false, FieldValue::is_truthy);
                let auto = schema.get(key).map_or(false, |c| c.is_auto_increment());
                if empty && auto {
                    self.table.gateway().last_insert_id(None).map(|id| (key.clone(), id))
                } else {
                    None
                }
            }
            _ => None,
        };

        match generated_key {
            Some((key, id)) => {
                let value = id.parse::<i64>().map(FieldValue::Int).unwrap_or(FieldValue::Text(id));
                self.set_value(&key, value);
            }
            None => {
                if let Some(keys) = keys {
                    self.set_values(keys);
                }
            }
        }

        self.synched = true;
        Ok(outcome)
    }

    /// Delete the row addressed by the key fields
    ///
    /// Field values are kept, and the record becomes new again.
    pub async fn delete(&mut self) -> Result<bool> {
        let Some(keys) = self.keys() else {
            return Ok(false);
        };
        let mut params = Params::new();
        let conditions = self.key_conditions(&keys, false, &mut params);
        let sql = format!("DELETE FROM {} WHERE {}", self.table.name(), conditions);
        self.table.query(&sql, &params).await?;
        self.is_new = true;
        Ok(true)
    }

    /// Set a date-family field from a date, a Unix timestamp or free text
    pub async fn set_date_time_value(&mut self, field: &str, value: impl Into<FieldValue>) -> Result<()> {
        let value = value.into();
        match self.table.column(field).await? {
            Some(column) => self.set_value(field, normalize::coerce_date_time(&column, &value)),
            None => self.set_value(field, value),
        }
        Ok(())
    }

    /// Field value as a date, when one can be derived
    pub fn date_time_value(&self, field: &str) -> Option<NaiveDateTime> {
        self.fields.get(field).and_then(normalize::date_time_value)
    }

    /// JSON object of the fields; `None` when the record has no fields
    pub async fn to_json(&self) -> Result<Option<String>> {
        let schema = self.table.columns().await?;
        export::to_json(&self.fields, &schema)
    }

    /// XML element named after the record type
    pub async fn to_xml(&self) -> Result<String> {
        let schema = self.table.columns().await?;
        Ok(export::to_xml(&self.type_name, &self.fields, &schema))
    }
}
