//! Naming utilities for dbstore
//!
//! This module provides helpers for table, field and marker names.

use once_cell::sync::Lazy;
use regex::Regex;

static QUALIFIED: Lazy<Regex> = Lazy::new(|| Regex::new(r"\w\.\w").expect("valid qualified pattern"));

/// Remove every character outside `[A-Za-z0-9_]`
pub fn strip_non_word(name: &str) -> String {
    name.chars().filter(|c| c.is_ascii_alphanumeric() || *c == '_').collect()
}

/// Whether a field reference already names its table (`table.field`)
pub fn is_qualified(field: &str) -> bool {
    QUALIFIED.is_match(field)
}

/// Prefix a field with its table name
pub fn qualify(table: &str, field: &str) -> String {
    format!("{}.{}", table, field)
}
