//! Repository error taxonomy.
//!
//! # Invariants
//! - Driver faults surface as `Db` with the original error as `source()`.
//! - Absent rows on read paths are `Ok(None)`, never an error.

use crate::db::DbError;
use crate::metadata::SchemaError;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type RepoResult<T> = Result<T, RepoError>;

#[derive(Debug)]
pub enum RepoError {
    /// Required argument missing, empty or rejected by `Entity::validate`.
    Validation(String),
    /// Entity type cannot be mapped.
    Schema(SchemaError),
    /// A zero-or-one fetch matched more rows.
    AmbiguousResult { table: &'static str, matched: usize },
    /// Update target has no persisted row.
    NotFound { table: &'static str, key: String },
    /// A queued write affected no rows when submitted.
    ChangeConflict {
        table: &'static str,
        operation: &'static str,
    },
    /// Load directive names a field that is not a relationship.
    UnknownRelationship { entity: &'static str, field: String },
    /// Persisted or supplied value cannot be mapped onto the entity.
    InvalidData(String),
    Db(DbError),
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(message) => write!(f, "validation failed: {message}"),
            Self::Schema(err) => write!(f, "{err}"),
            Self::AmbiguousResult { table, matched } => write!(
                f,
                "expected at most one row from `{table}`, matched {matched} or more"
            ),
            Self::NotFound { table, key } => write!(f, "no row in `{table}` with key {key}"),
            Self::ChangeConflict { table, operation } => write!(
                f,
                "{operation} on `{table}` affected no rows; the row changed or vanished"
            ),
            Self::UnknownRelationship { entity, field } => {
                write!(f, "`{field}` is not a relationship of `{entity}`")
            }
            Self::InvalidData(message) => write!(f, "invalid entity data: {message}"),
            Self::Db(err) => write!(f, "{err}"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Schema(err) => Some(err),
            Self::Db(err) => Some(err),
            Self::Validation(_)
            | Self::AmbiguousResult { .. }
            | Self::NotFound { .. }
            | Self::ChangeConflict { .. }
            | Self::UnknownRelationship { .. }
            | Self::InvalidData(_) => None,
        }
    }
}

impl From<SchemaError> for RepoError {
    fn from(value: SchemaError) -> Self {
        Self::Schema(value)
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Fails with `Validation` when `condition` holds.
pub(crate) fn fail_if(condition: bool, message: &str) -> RepoResult<()> {
    if condition {
        return Err(RepoError::Validation(message.to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{fail_if, RepoError};
    use crate::metadata::SchemaError;
    use std::error::Error;

    #[test]
    fn driver_errors_keep_their_source() {
        let err = RepoError::from(rusqlite::Error::InvalidQuery);
        assert!(err.source().is_some());
        assert!(matches!(err, RepoError::Db(_)));
    }

    #[test]
    fn schema_errors_convert() {
        let err = RepoError::from(SchemaError::MissingPrimaryKey { entity: "Memo" });
        assert!(err.to_string().contains("Memo"));
    }

    #[test]
    fn fail_if_only_fails_on_true() {
        assert!(fail_if(false, "unused").is_ok());
        let err = fail_if(true, "parameter `entities` cannot be empty").unwrap_err();
        assert!(matches!(err, RepoError::Validation(message) if message.contains("entities")));
    }
}
