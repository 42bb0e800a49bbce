//! Schema module for dbstore
//!
//! This module handles column descriptors, dialect rules, live schema
//! introspection, and DDL generation.

pub mod analyzer;
pub mod column;
pub mod dialect;
pub mod diff;
pub mod generator;
pub mod types;

// Re-export key types
pub use analyzer::{parse_column_type, ParsedType, SchemaAnalyzer};
pub use column::{Column, DdlOptions, IndexKind, TypeFamily};
pub use dialect::{Dialect, MySqlDialect, TdsDialect};
pub use diff::{ColumnChange, ColumnPosition, IndexChange, SchemaDiff};
pub use generator::DdlGenerator;
pub use types::{ColumnSpec, LengthSpec, TableSchema, TableSpec};
