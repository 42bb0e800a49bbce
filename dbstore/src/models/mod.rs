//! Models module for dbstore
//!
//! This module maps table rows to records and back.

pub mod export;
pub mod normalize;
pub mod record;
pub mod table;

// Re-export key types
pub use record::{Join, JoinKind, LoadOptions, Record, SaveOutcome};
pub use table::{CreateOptions, Table};
