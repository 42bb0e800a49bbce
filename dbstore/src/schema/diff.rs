//! Schema difference calculator
//!
//! This module compares the live columns of a table with a desired column
//! list and calculates the smallest set of changes that converges them.

use std::fmt;

use crate::schema::column::{Column, IndexKind};
use crate::schema::types::TableSchema;

/// Placement of a column inside the table
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ColumnPosition {
    /// Leave placement to the server (appended)
    #[default]
    End,
    First,
    After(String),
}

impl ColumnPosition {
    fn following(prev: Option<&str>) -> Self {
        match prev {
            Some(name) => ColumnPosition::After(name.to_string()),
            None => ColumnPosition::First,
        }
    }
}

impl fmt::Display for ColumnPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ColumnPosition::End => Ok(()),
            ColumnPosition::First => f.write_str(" FIRST"),
            ColumnPosition::After(name) => write!(f, " AFTER {}", name),
        }
    }
}

/// Represents a change to one surviving or new column
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnChange {
    Add { column: Column, position: ColumnPosition },
    Modify { column: Column, position: ColumnPosition },
}

impl ColumnChange {
    pub fn column(&self) -> &Column {
        match self {
            ColumnChange::Add { column, .. } | ColumnChange::Modify { column, .. } => column,
        }
    }
}

/// Represents a change to the index carried by one column
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IndexChange {
    Add { column: String, kind: IndexKind },
    Drop { column: String, kind: IndexKind },
}

/// Represents changes needed to converge a table to a desired column list
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SchemaDiff {
    pub column_changes: Vec<ColumnChange>,
    pub index_changes: Vec<IndexChange>,
    pub columns_to_drop: Vec<String>,
}

impl SchemaDiff {
    /// Generate the diff between the live schema and the desired columns
    ///
    /// With `track_position` set, column order is reconciled too: every
    /// desired column must directly follow the desired column before it.
    /// Live order is simulated as changes are planned, so a column only
    /// moves when its predecessor among the surviving columns differs.
    pub fn generate(current: &TableSchema, desired: &[Column], track_position: bool) -> Self {
        let mut diff = SchemaDiff::default();

        let mut live: Vec<&str> = current
            .names()
            .filter(|name| desired.iter().any(|c| c.name() == *name))
            .collect();

        let mut prev: Option<&str> = None;

        for column in desired {
            let name = column.name();
            let position = if track_position {
                ColumnPosition::following(prev)
            } else {
                ColumnPosition::End
            };

            match current.get(name) {
                Some(existing) => {
                    let slot = live.iter().position(|n| *n == name);
                    let predecessor = slot.and_then(|i| i.checked_sub(1)).map(|i| live[i]);
                    let moved = track_position && predecessor != prev;

                    if moved || !column.same_definition(existing) {
                        diff.column_changes.push(ColumnChange::Modify {
                            column: column.clone(),
                            position,
                        });
                        if moved {
                            if let Some(i) = slot {
                                live.remove(i);
                            }
                            place_after(&mut live, prev, name);
                        }
                    }

                    match (existing.index(), column.index()) {
                        (current_kind, desired_kind) if current_kind == desired_kind => {}
                        (None, Some(kind)) => diff.index_changes.push(IndexChange::Add {
                            column: name.to_string(),
                            kind,
                        }),
                        (Some(kind), None) => diff.index_changes.push(IndexChange::Drop {
                            column: name.to_string(),
                            kind,
                        }),
                        (Some(from), Some(to)) => {
                            diff.index_changes.push(IndexChange::Drop {
                                column: name.to_string(),
                                kind: from,
                            });
                            diff.index_changes.push(IndexChange::Add {
                                column: name.to_string(),
                                kind: to,
                            });
                        }
                        (None, None) => {}
                    }
                }
                None => {
                    diff.column_changes.push(ColumnChange::Add {
                        column: column.clone(),
                        position,
                    });
                    // Primary keys are declared inline with the new column.
                    if let Some(kind @ (IndexKind::Unique | IndexKind::Index)) = column.index() {
                        diff.index_changes.push(IndexChange::Add {
                            column: name.to_string(),
                            kind,
                        });
                    }
                    if track_position {
                        place_after(&mut live, prev, name);
                    } else {
                        live.push(name);
                    }
                }
            }

            prev = Some(name);
        }

        diff.columns_to_drop = current
            .names()
            .filter(|name| !desired.iter().any(|c| c.name() == *name))
            .map(str::to_string)
            .collect();

        diff
    }

    /// Returns true if there are no changes
    pub fn is_empty(&self) -> bool {
        self.column_changes.is_empty() && self.index_changes.is_empty() && self.columns_to_drop.is_empty()
    }

    /// Total number of planned changes
    pub fn len(&self) -> usize {
        self.column_changes.len() + self.index_changes.len() + self.columns_to_drop.len()
    }
}

fn place_after<'a>(live: &mut Vec<&'a str>, prev: Option<&str>, name: &'a str) {
    let at = match prev {
        Some(p) => live.iter().position(|n| *n == p).map_or(live.len(), |i| i + 1),
        None => 0,
    };
    live.insert(at, name);
}
