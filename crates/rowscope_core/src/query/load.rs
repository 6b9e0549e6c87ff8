//! Eager-load directives.
//!
//! # Invariants
//! - Directives name relationship fields only; anything else is rejected
//!   before the pipeline reaches the store.
//! - Directives run per loaded record, inside the scope that loaded it.

use super::filter::Predicate;
use crate::metadata::EntityMetadata;
use crate::repo::error::{RepoError, RepoResult};

/// Request to populate one relationship field after loading.
#[derive(Debug)]
pub struct LoadDirective {
    field: String,
    filter: Option<Box<dyn Predicate>>,
}

impl LoadDirective {
    pub fn field(&self) -> &str {
        &self.field
    }

    /// Restricts which related rows are attached, when present.
    pub fn filter(&self) -> Option<&dyn Predicate> {
        self.filter.as_deref()
    }
}

/// Ordered set of eager-load directives.
#[derive(Debug, Default)]
pub struct LoadOptions {
    directives: Vec<LoadDirective>,
}

impl LoadOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads every related row for `field`.
    pub fn load_with(mut self, field: impl Into<String>) -> Self {
        self.directives.push(LoadDirective {
            field: field.into(),
            filter: None,
        });
        self
    }

    /// Loads only related rows matching `filter` for `field`.
    pub fn associate_with(mut self, field: impl Into<String>, filter: impl Predicate + 'static) -> Self {
        self.directives.push(LoadDirective {
            field: field.into(),
            filter: Some(Box::new(filter)),
        });
        self
    }

    pub fn directives(&self) -> &[LoadDirective] {
        &self.directives
    }

    pub fn is_empty(&self) -> bool {
        self.directives.is_empty()
    }

    pub(crate) fn extend(&mut self, other: LoadOptions) {
        self.directives.extend(other.directives);
    }

    pub(crate) fn validate(&self, metadata: &EntityMetadata) -> RepoResult<()> {
        for directive in &self.directives {
            if metadata.relationship(&directive.field).is_none() {
                return Err(RepoError::UnknownRelationship {
                    entity: metadata.table_name,
                    field: directive.field.clone(),
                });
            }
        }
        Ok(())
    }
}
