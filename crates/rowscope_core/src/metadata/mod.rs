//! Entity metadata resolution and caching.
//!
//! # Responsibility
//! - Derive table name, key fields and the single-row lookup statement
//!   from an entity's field table.
//! - Memoize the result once per entity type for the whole process.
//!
//! # Invariants
//! - Every resolved entity has at least one key field.
//! - Key fields keep declaration order; `single_row_sql` binds `?1..?n`
//!   in that order.
//! - A failed resolution caches nothing.

use crate::model::entity::{Entity, FieldDescriptor, FieldRole};
use std::error::Error;
use std::fmt::{Display, Formatter};

mod registry;
pub mod sql;

pub use registry::{cached_entity_count, resolve};

/// Schema facts about one entity type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityMetadata {
    /// Rust type name, for diagnostics only.
    pub entity: &'static str,
    pub table_name: &'static str,
    pub key_fields: Vec<FieldDescriptor>,
    /// Key and scalar fields in declaration order.
    pub column_fields: Vec<FieldDescriptor>,
    pub relationship_fields: Vec<FieldDescriptor>,
    /// `SELECT <columns> FROM <table>` without a filter.
    pub select_sql: String,
    /// `select_sql` restricted to one key, positional parameters `?1..?n`.
    pub single_row_sql: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchemaError {
    MissingPrimaryKey { entity: &'static str },
    EmptyTableName { entity: &'static str },
    DuplicateField {
        entity: &'static str,
        field: &'static str,
    },
}

impl Display for SchemaError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingPrimaryKey { entity } => write!(
                f,
                "entity `{entity}` does not declare a primary key; a primary key is required"
            ),
            Self::EmptyTableName { entity } => {
                write!(f, "entity `{entity}` is not mapped to a table")
            }
            Self::DuplicateField { entity, field } => {
                write!(f, "entity `{entity}` declares field `{field}` more than once")
            }
        }
    }
}

impl Error for SchemaError {}

impl EntityMetadata {
    /// Builds metadata for `E` without touching the process cache.
    pub fn for_entity<E: Entity>() -> Result<Self, SchemaError> {
        Self::build(std::any::type_name::<E>(), E::TABLE, E::FIELDS)
    }

    pub fn build(
        entity: &'static str,
        table_name: &'static str,
        fields: &'static [FieldDescriptor],
    ) -> Result<Self, SchemaError> {
        if table_name.trim().is_empty() {
            return Err(SchemaError::EmptyTableName { entity });
        }
        for (index, field) in fields.iter().enumerate() {
            let repeated = fields[..index]
                .iter()
                .any(|earlier| earlier.name.eq_ignore_ascii_case(field.name));
            if repeated {
                return Err(SchemaError::DuplicateField {
                    entity,
                    field: field.name,
                });
            }
        }

        let key_fields: Vec<FieldDescriptor> = fields
            .iter()
            .copied()
            .filter(|field| field.role == FieldRole::Key)
            .collect();
        if key_fields.is_empty() {
            return Err(SchemaError::MissingPrimaryKey { entity });
        }

        let column_fields: Vec<FieldDescriptor> =
            fields.iter().copied().filter(FieldDescriptor::is_column).collect();
        let relationship_fields = fields
            .iter()
            .copied()
            .filter(|field| field.role == FieldRole::Relationship)
            .collect();

        let select_sql = sql::select_statement(table_name, &column_fields);
        let single_row_sql = format!(
            "{select_sql} WHERE {}",
            sql::key_predicate(&key_fields)
        );

        Ok(Self {
            entity,
            table_name,
            key_fields,
            column_fields,
            relationship_fields,
            select_sql,
            single_row_sql,
        })
    }

    pub fn is_key_field(&self, name: &str) -> bool {
        self.key_fields
            .iter()
            .any(|field| field.name.eq_ignore_ascii_case(name))
    }

    pub fn relationship(&self, name: &str) -> Option<&FieldDescriptor> {
        self.relationship_fields
            .iter()
            .find(|field| field.name.eq_ignore_ascii_case(name))
    }
}

#[cfg(test)]
mod tests {
    use super::{EntityMetadata, SchemaError};
    use crate::model::entity::FieldDescriptor;

    const LINE_FIELDS: &[FieldDescriptor] = &[
        FieldDescriptor::key("order_id"),
        FieldDescriptor::scalar("qty"),
        FieldDescriptor::key("line_no"),
        FieldDescriptor::relationship("order"),
    ];

    const NO_KEY_FIELDS: &[FieldDescriptor] = &[FieldDescriptor::scalar("body")];

    const DUPLICATE_FIELDS: &[FieldDescriptor] =
        &[FieldDescriptor::key("id"), FieldDescriptor::scalar("ID")];

    #[test]
    fn key_fields_follow_declaration_order() {
        let metadata = EntityMetadata::build("Line", "order_lines", LINE_FIELDS).unwrap();
        let keys: Vec<&str> = metadata.key_fields.iter().map(|f| f.name).collect();
        assert_eq!(keys, vec!["order_id", "line_no"]);
        assert_eq!(
            metadata.single_row_sql,
            "SELECT \"order_id\", \"qty\", \"line_no\" FROM \"order_lines\" \
             WHERE \"order_id\" = ?1 AND \"line_no\" = ?2"
        );
        assert!(metadata.relationship("ORDER").is_some());
        assert!(metadata.is_key_field("Line_No"));
    }

    #[test]
    fn missing_key_is_schema_error() {
        let err = EntityMetadata::build("Memo", "memos", NO_KEY_FIELDS).unwrap_err();
        assert_eq!(err, SchemaError::MissingPrimaryKey { entity: "Memo" });
        assert!(err.to_string().contains("primary key is required"));
    }

    #[test]
    fn blank_table_and_duplicate_fields_are_rejected() {
        assert_eq!(
            EntityMetadata::build("Line", " ", LINE_FIELDS).unwrap_err(),
            SchemaError::EmptyTableName { entity: "Line" }
        );
        assert_eq!(
            EntityMetadata::build("Dup", "dups", DUPLICATE_FIELDS).unwrap_err(),
            SchemaError::DuplicateField {
                entity: "Dup",
                field: "ID"
            }
        );
    }
}
