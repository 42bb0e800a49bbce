//! Scalar values exchanged with the gateway and held by records

use chrono::{NaiveDate, NaiveDateTime};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;

static NUMERIC: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*[+-]?(\d+(\.\d*)?|\.\d+)([eE][+-]?\d+)?\s*$").expect("valid numeric pattern")
});

static LEADING_INT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*[+-]?\d+").expect("valid integer prefix pattern"));

/// A single field value
///
/// Values are loosely typed the way rows come back from a driver: a column
/// declared `INT` may well hold `Text("42")` until the record is normalized.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    DateTime(NaiveDateTime),
}

impl FieldValue {
    pub fn is_null(&self) -> bool {
        matches!(self, FieldValue::Null)
    }

    /// Loose truthiness: empty strings, `"0"`, zero and null are false
    pub fn is_truthy(&self) -> bool {
        match self {
            FieldValue::Null => false,
            FieldValue::Bool(b) => *b,
            FieldValue::Int(i) => *i != 0,
            FieldValue::Float(f) => *f != 0.0,
            FieldValue::Text(s) => !(s.is_empty() || s == "0"),
            FieldValue::DateTime(_) => true,
        }
    }

    /// Whether the value is a number or a numeric string
    pub fn is_numeric(&self) -> bool {
        match self {
            FieldValue::Int(_) | FieldValue::Float(_) | FieldValue::Bool(_) => true,
            FieldValue::Text(s) => NUMERIC.is_match(s),
            FieldValue::Null | FieldValue::DateTime(_) => false,
        }
    }

    /// Numeric value, if the value is numeric
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            FieldValue::Int(i) => Some(*i as f64),
            FieldValue::Float(f) => Some(*f),
            FieldValue::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            FieldValue::Text(s) if NUMERIC.is_match(s) => s.trim().parse::<f64>().ok(),
            _ => None,
        }
    }

    /// Integer conversion that never fails; non-numeric input becomes 0
    pub fn to_int_lossy(&self) -> i64 {
        match self {
            FieldValue::Null | FieldValue::DateTime(_) => 0,
            FieldValue::Bool(b) => i64::from(*b),
            FieldValue::Int(i) => *i,
            FieldValue::Float(f) => f.trunc() as i64,
            FieldValue::Text(s) => {
                if let Some(f) = self.as_f64() {
                    return f.trunc() as i64;
                }
                LEADING_INT
                    .find(s)
                    .and_then(|m| m.as_str().trim().parse::<i64>().ok())
                    .unwrap_or(0)
            }
        }
    }

    /// String rendering used in generated JSON/XML and in date parsing
    pub fn render(&self) -> String {
        match self {
            FieldValue::Null => String::new(),
            FieldValue::Bool(true) => "1".to_string(),
            FieldValue::Bool(false) => String::new(),
            FieldValue::Int(i) => i.to_string(),
            FieldValue::Float(f) => f.to_string(),
            FieldValue::Text(s) => s.clone(),
            FieldValue::DateTime(dt) => dt.format("%Y-%m-%d %H:%M:%S").to_string(),
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::Text(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::Text(value)
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        FieldValue::Bool(value)
    }
}

impl From<i32> for FieldValue {
    fn from(value: i32) -> Self {
        FieldValue::Int(i64::from(value))
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        FieldValue::Int(value)
    }
}

impl From<u32> for FieldValue {
    fn from(value: u32) -> Self {
        FieldValue::Int(i64::from(value))
    }
}

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        FieldValue::Float(value)
    }
}

impl From<NaiveDateTime> for FieldValue {
    fn from(value: NaiveDateTime) -> Self {
        FieldValue::DateTime(value)
    }
}

impl From<NaiveDate> for FieldValue {
    fn from(value: NaiveDate) -> Self {
        FieldValue::DateTime(value.and_time(chrono::NaiveTime::MIN))
    }
}

impl<T: Into<FieldValue>> From<Option<T>> for FieldValue {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(FieldValue::Null)
    }
}
