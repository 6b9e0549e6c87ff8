//! Composite primary keys.
//!
//! # Responsibility
//! - Carry the key of one row as ordered field-name/value pairs.
//! - Reorder caller-built keys into declaration order before binding.
//!
//! # Invariants
//! - Keys are derived on demand and never persisted.
//! - Bound values always follow `EntityMetadata::key_fields` order.

use crate::metadata::EntityMetadata;
use crate::model::entity::Entity;
use crate::repo::error::{RepoError, RepoResult};
use rusqlite::types::Value;
use std::fmt::{Display, Formatter};

/// Primary key of one row.
#[derive(Debug, Clone, PartialEq)]
pub enum CompositeKey {
    /// Bare value for entities with exactly one key field.
    Single(Value),
    /// Field-name/value pairs, one per key field.
    Named(Vec<(String, Value)>),
}

impl CompositeKey {
    pub fn single(value: impl Into<Value>) -> Self {
        Self::Single(value.into())
    }

    pub fn named() -> Self {
        Self::Named(Vec::new())
    }

    /// Appends one named part; a `Single` key is replaced by the new part.
    pub fn with(self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        match self {
            Self::Named(mut parts) => {
                parts.push((field.into(), value.into()));
                Self::Named(parts)
            }
            Self::Single(_) => Self::Named(vec![(field.into(), value.into())]),
        }
    }

    /// Derives the key of `entity` in key-declaration order.
    pub fn of<E: Entity>(entity: &E, metadata: &EntityMetadata) -> RepoResult<Self> {
        let mut parts = Vec::with_capacity(metadata.key_fields.len());
        for field in &metadata.key_fields {
            let value = entity.field_value(field.name).ok_or_else(|| {
                RepoError::InvalidData(format!(
                    "entity `{}` did not expose key field `{}`",
                    metadata.table_name, field.name
                ))
            })?;
            parts.push((field.name.to_string(), value));
        }
        Ok(Self::Named(parts))
    }

    pub fn len(&self) -> usize {
        match self {
            Self::Single(_) => 1,
            Self::Named(parts) => parts.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns key values positioned for `metadata.single_row_sql`.
    pub fn ordered_values(&self, metadata: &EntityMetadata) -> RepoResult<Vec<Value>> {
        let expected = metadata.key_fields.len();
        match self {
            Self::Single(value) => {
                if expected != 1 {
                    return Err(RepoError::Validation(format!(
                        "table `{}` has a {expected}-field primary key; a single key value is not enough",
                        metadata.table_name
                    )));
                }
                Ok(vec![value.clone()])
            }
            Self::Named(parts) => {
                if parts.is_empty() {
                    return Err(RepoError::Validation(
                        "parameter `key` cannot be empty".to_string(),
                    ));
                }
                if parts.len() != expected {
                    return Err(RepoError::Validation(format!(
                        "table `{}` expects {expected} key fields, got {}",
                        metadata.table_name,
                        parts.len()
                    )));
                }
                metadata
                    .key_fields
                    .iter()
                    .map(|field| {
                        let mut matches = parts
                            .iter()
                            .filter(|(name, _)| name.eq_ignore_ascii_case(field.name));
                        match (matches.next(), matches.next()) {
                            (Some((_, value)), None) => Ok(value.clone()),
                            (None, _) => Err(RepoError::Validation(format!(
                                "key for table `{}` is missing field `{}`",
                                metadata.table_name, field.name
                            ))),
                            (Some(_), Some(_)) => Err(RepoError::Validation(format!(
                                "key for table `{}` repeats field `{}`",
                                metadata.table_name, field.name
                            ))),
                        }
                    })
                    .collect()
            }
        }
    }
}

impl Display for CompositeKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Single(value) => write!(f, "{}", display_value(value)),
            Self::Named(parts) => {
                for (index, (name, value)) in parts.iter().enumerate() {
                    if index > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{name}={}", display_value(value))?;
                }
                Ok(())
            }
        }
    }
}

fn display_value(value: &Value) -> String {
    match value {
        Value::Null => "NULL".to_string(),
        Value::Integer(number) => number.to_string(),
        Value::Real(number) => number.to_string(),
        Value::Text(text) => format!("'{text}'"),
        Value::Blob(bytes) => format!("<{} bytes>", bytes.len()),
    }
}

#[cfg(test)]
mod tests {
    use super::CompositeKey;
    use crate::metadata::EntityMetadata;
    use crate::model::entity::FieldDescriptor;
    use crate::repo::error::RepoError;
    use rusqlite::types::Value;

    const FIELDS: &[FieldDescriptor] = &[
        FieldDescriptor::key("order_id"),
        FieldDescriptor::key("line_no"),
        FieldDescriptor::scalar("qty"),
    ];

    fn metadata() -> EntityMetadata {
        EntityMetadata::build("lines", "order_lines", FIELDS).unwrap()
    }

    #[test]
    fn named_key_is_reordered_to_declaration_order() {
        let key = CompositeKey::named().with("LINE_NO", 2).with("order_id", "A-1".to_string());
        let values = key.ordered_values(&metadata()).unwrap();
        assert_eq!(
            values,
            vec![Value::Text("A-1".to_string()), Value::Integer(2)]
        );
    }

    #[test]
    fn single_key_rejected_for_composite_table() {
        let err = CompositeKey::single(1).ordered_values(&metadata()).unwrap_err();
        assert!(matches!(err, RepoError::Validation(_)));
    }

    #[test]
    fn missing_or_empty_parts_are_rejected() {
        let empty = CompositeKey::named().ordered_values(&metadata()).unwrap_err();
        assert!(matches!(empty, RepoError::Validation(message) if message.contains("empty")));

        let wrong = CompositeKey::named()
            .with("order_id", "A-1".to_string())
            .with("qty", 3)
            .ordered_values(&metadata())
            .unwrap_err();
        assert!(matches!(wrong, RepoError::Validation(message) if message.contains("line_no")));
    }

    #[test]
    fn display_lists_parts() {
        let key = CompositeKey::named().with("order_id", "A-1".to_string()).with("line_no", 2);
        assert_eq!(key.to_string(), "order_id='A-1', line_no=2");
    }
}
