//! Entity trait and field descriptors.
//!
//! # Responsibility
//! - Let record types describe their table, keys and relationships without
//!   runtime type introspection.
//! - Move single field values in and out of records by name.
//!
//! # Invariants
//! - Only `Key` and `Scalar` fields are columns; `Relationship` fields are
//!   populated by eager loading and never persisted.
//! - `field_value` returns `Some` for every column field.

use crate::query::load::LoadDirective;
use crate::repo::error::{RepoError, RepoResult};
use crate::scope::Scope;
use rusqlite::types::{FromSql, Value, ValueRef};
use rusqlite::Row;

/// Storage role of one entity field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldRole {
    /// Part of the primary key; never copied by partial updates.
    Key,
    /// Plain column value.
    Scalar,
    /// Navigation to related records; not a column.
    Relationship,
}

/// One row of an entity's field table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldDescriptor {
    pub name: &'static str,
    pub role: FieldRole,
    /// Audit columns are written on insert but never overwritten by update.
    pub audit: bool,
}

impl FieldDescriptor {
    pub const fn key(name: &'static str) -> Self {
        Self {
            name,
            role: FieldRole::Key,
            audit: false,
        }
    }

    pub const fn scalar(name: &'static str) -> Self {
        Self {
            name,
            role: FieldRole::Scalar,
            audit: false,
        }
    }

    pub const fn audit(name: &'static str) -> Self {
        Self {
            name,
            role: FieldRole::Scalar,
            audit: true,
        }
    }

    pub const fn relationship(name: &'static str) -> Self {
        Self {
            name,
            role: FieldRole::Relationship,
            audit: false,
        }
    }

    pub fn is_column(&self) -> bool {
        self.role != FieldRole::Relationship
    }
}

/// A record type mapped to one table.
///
/// Implementors list every field in `FIELDS`; the order of `Key` fields is
/// the positional order used when binding composite keys.
pub trait Entity: Sized + 'static {
    const TABLE: &'static str;
    const FIELDS: &'static [FieldDescriptor];

    /// Builds a record from a row selected with every column field.
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self>;

    /// Reads one column field by its declared name.
    fn field_value(&self, field: &str) -> Option<Value>;

    /// Writes one column field by its declared name.
    fn set_field_value(&mut self, field: &str, value: Value) -> RepoResult<()>;

    /// Checked before an insert or update is queued.
    fn validate(&self) -> Result<(), String> {
        Ok(())
    }

    /// Populates one relationship field inside the caller's scope.
    fn load_related(&mut self, directive: &LoadDirective, _scope: &Scope) -> RepoResult<()> {
        Err(RepoError::UnknownRelationship {
            entity: Self::TABLE,
            field: directive.field().to_string(),
        })
    }
}

/// Converts a dynamic column value into a typed field value.
///
/// Intended for `Entity::set_field_value` implementations.
pub fn value_as<T: FromSql>(field: &str, value: &Value) -> RepoResult<T> {
    T::column_result(ValueRef::from(value)).map_err(|err| {
        RepoError::InvalidData(format!("cannot assign value to field `{field}`: {err}"))
    })
}

/// Error for `set_field_value` called with a name the entity does not own.
pub fn unknown_field<E: Entity>(field: &str) -> RepoError {
    RepoError::InvalidData(format!(
        "entity `{}` has no column field `{field}`",
        E::TABLE
    ))
}
