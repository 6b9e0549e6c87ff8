//! Selective scalar-field copy used by partial updates.
//!
//! # Invariants
//! - Fields are considered in `Entity::FIELDS` order.
//! - A field is skipped, checked in this order, when it is a key, when it
//!   is a relationship, when an allow-list is given without it, or when it
//!   is an audit field (descriptor flag or configured name).
//! - Name matching against the allow-list and audit list ignores ASCII case.
//! - Audit fields are skipped even when the allow-list names them.

use crate::config::DataAccessConfig;
use crate::model::entity::{Entity, FieldRole};
use crate::repo::error::{RepoError, RepoResult};

/// Why a field was not copied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    Key,
    Relationship,
    NotRequested,
    Audit,
}

/// Copies eligible column values from `source` onto `target`.
///
/// Returns the names of the copied fields in declaration order.
pub fn copy_scalar_fields<E: Entity>(
    source: &E,
    target: &mut E,
    fields: Option<&[&str]>,
    config: &DataAccessConfig,
) -> RepoResult<Vec<&'static str>> {
    let mut copied = Vec::new();
    for field in E::FIELDS {
        if skip_reason(field.name, field.role, field.audit, fields, config).is_some() {
            continue;
        }
        let value = source.field_value(field.name).ok_or_else(|| {
            RepoError::InvalidData(format!(
                "entity `{}` did not expose field `{}`",
                E::TABLE,
                field.name
            ))
        })?;
        target.set_field_value(field.name, value)?;
        copied.push(field.name);
    }
    Ok(copied)
}

pub(crate) fn skip_reason(
    name: &str,
    role: FieldRole,
    audit: bool,
    fields: Option<&[&str]>,
    config: &DataAccessConfig,
) -> Option<SkipReason> {
    match role {
        FieldRole::Key => return Some(SkipReason::Key),
        FieldRole::Relationship => return Some(SkipReason::Relationship),
        FieldRole::Scalar => {}
    }
    if let Some(allowed) = fields {
        if !allowed.iter().any(|wanted| wanted.eq_ignore_ascii_case(name)) {
            return Some(SkipReason::NotRequested);
        }
    }
    if audit || config.is_audit_field(name) {
        return Some(SkipReason::Audit);
    }
    None
}
