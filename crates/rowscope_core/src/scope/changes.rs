//! Queued entity writes.

use crate::metadata::sql::{numbered_conditions, quote_ident};
use crate::repo::error::{RepoError, RepoResult};
use rusqlite::types::Value;
use rusqlite::{params_from_iter, Connection};

/// One write waiting for `Scope::submit_changes`.
#[derive(Debug, Clone, PartialEq)]
pub enum PendingChange {
    Insert {
        table: &'static str,
        columns: Vec<&'static str>,
        values: Vec<Value>,
    },
    Update {
        table: &'static str,
        columns: Vec<&'static str>,
        values: Vec<Value>,
        key_columns: Vec<&'static str>,
        key_values: Vec<Value>,
    },
    Delete {
        table: &'static str,
        key_columns: Vec<&'static str>,
        key_values: Vec<Value>,
    },
}

impl PendingChange {
    pub fn table(&self) -> &'static str {
        match self {
            Self::Insert { table, .. } | Self::Update { table, .. } | Self::Delete { table, .. } => {
                *table
            }
        }
    }

    pub fn operation(&self) -> &'static str {
        match self {
            Self::Insert { .. } => "insert",
            Self::Update { .. } => "update",
            Self::Delete { .. } => "delete",
        }
    }

    /// Renders the statement and its positional parameters.
    ///
    /// Returns `None` for an update with nothing to assign.
    pub fn statement(&self) -> Option<(String, Vec<Value>)> {
        match self {
            Self::Insert {
                table,
                columns,
                values,
            } => {
                let column_sql = columns
                    .iter()
                    .map(|column| quote_ident(column))
                    .collect::<Vec<_>>()
                    .join(", ");
                let placeholders = (1..=columns.len())
                    .map(|index| format!("?{index}"))
                    .collect::<Vec<_>>()
                    .join(", ");
                Some((
                    format!(
                        "INSERT INTO {} ({column_sql}) VALUES ({placeholders});",
                        quote_ident(table)
                    ),
                    values.clone(),
                ))
            }
            Self::Update {
                table,
                columns,
                values,
                key_columns,
                key_values,
            } => {
                if columns.is_empty() {
                    return None;
                }
                let assignments = columns
                    .iter()
                    .enumerate()
                    .map(|(index, column)| format!("{} = ?{}", quote_ident(column), index + 1))
                    .collect::<Vec<_>>()
                    .join(", ");
                let filter = numbered_conditions(key_columns.iter().copied(), columns.len() + 1);
                let mut bound = values.clone();
                bound.extend(key_values.iter().cloned());
                Some((
                    format!(
                        "UPDATE {} SET {assignments} WHERE {filter};",
                        quote_ident(table)
                    ),
                    bound,
                ))
            }
            Self::Delete {
                table,
                key_columns,
                key_values,
            } => Some((
                format!(
                    "DELETE FROM {} WHERE {};",
                    quote_ident(table),
                    numbered_conditions(key_columns.iter().copied(), 1)
                ),
                key_values.clone(),
            )),
        }
    }

    pub(crate) fn apply(&self, conn: &Connection) -> RepoResult<()> {
        let Some((sql, values)) = self.statement() else {
            return Ok(());
        };
        let changed = conn.execute(&sql, params_from_iter(values))?;
        if changed == 0 && !matches!(self, Self::Insert { .. }) {
            return Err(RepoError::ChangeConflict {
                table: self.table(),
                operation: self.operation(),
            });
        }
        Ok(())
    }
}
